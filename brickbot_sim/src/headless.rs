// brickbot_sim/src/headless.rs

//! Drives a world without a window: frames arrive on a synthetic clock and
//! telemetry goes to the log.

use brickbot_core::controllers::ev3::Ev3Telemetry;
use brickbot_core::world::World;
use tracing::{info, warn};

/// Telemetry is logged once per this much simulation time (ms).
const TELEMETRY_PERIOD_MS: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadlessRun {
    pub frames: u64,
    /// Duration of one frame in milliseconds.
    pub frame_ms: f64,
}

impl HeadlessRun {
    pub fn new(frames: u64, frame_ms: f64) -> Self {
        Self { frames, frame_ms }
    }

    /// Starts `world`, steps it `frames` times and leaves it paused.
    ///
    /// Returns the telemetry after the last frame, or `None` if the world was
    /// never initialized.
    pub fn run(&self, world: &mut World) -> Option<Ev3Telemetry> {
        world.start();
        if !world.is_running() {
            warn!("Headless: world is {:?}, nothing to run", world.state());
            return None;
        }

        info!(
            "Headless: running {} frames of {:.2} ms",
            self.frames, self.frame_ms
        );
        let mut next_report = TELEMETRY_PERIOD_MS;
        for frame in 0..self.frames {
            world.step(frame as f64 * self.frame_ms);
            if world.elapsed_time() >= next_report {
                if let Some(telemetry) = world.telemetry() {
                    info!("{}", telemetry);
                }
                next_report += TELEMETRY_PERIOD_MS;
            }
        }
        world.pause();

        for entry in world.console().entries() {
            info!(
                "console [{}] {:.0} ms: {}",
                entry.level, entry.timestamp, entry.message
            );
        }
        world.telemetry()
    }
}
