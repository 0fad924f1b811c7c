// brickbot_core/src/time.rs

use std::fmt;
use tracing::trace;

use crate::config::TimeConfig;

/// Timing of the frame being stepped. Times are in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimingInfo {
    /// Host timestamp handed to `World::step`.
    pub timestamp: f64,
    /// Simulation time committed before this frame.
    pub elapsed: f64,
    /// Simulation time this frame advances by.
    pub frame_duration: f64,
    /// Number of frames committed before this one.
    pub frame: u64,
}

impl TimingInfo {
    pub fn dt_seconds(&self) -> f64 {
        self.frame_duration / 1000.0
    }

    /// Simulation time at the end of this frame, in seconds. This is the clock
    /// the feedback loops run on.
    pub fn simulation_seconds(&self) -> f64 {
        (self.elapsed + self.frame_duration) / 1000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeoutId(u64);

pub type TimeoutCallback = Box<dyn FnOnce() + Send + Sync>;

struct Timeout {
    id: TimeoutId,
    due: f64,
    callback: TimeoutCallback,
}

impl fmt::Debug for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeout")
            .field("id", &self.id)
            .field("due", &self.due)
            .finish_non_exhaustive()
    }
}

/// The simulation clock.
///
/// Elapsed time only moves when a frame is committed, so it stands still while
/// the world is paused. Host timestamps are turned into frame durations here,
/// clamped to `max_frame_ms`.
#[derive(Debug)]
pub struct TimeController {
    max_frame_ms: f64,
    elapsed: f64,
    frame_time: f64,
    frame: u64,
    last_timestamp: Option<f64>,
    next_timeout: u64,
    timeouts: Vec<Timeout>,
}

impl TimeController {
    pub fn new(config: &TimeConfig) -> Self {
        Self {
            max_frame_ms: config.max_frame_ms.max(0.0),
            elapsed: 0.0,
            frame_time: 0.0,
            frame: 0,
            last_timestamp: None,
            next_timeout: 0,
            timeouts: Vec::new(),
        }
    }

    /// Simulation time in milliseconds.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Duration of the last committed frame, in milliseconds.
    pub fn frame_time(&self) -> f64 {
        self.frame_time
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn pending_timeouts(&self) -> usize {
        self.timeouts.len()
    }

    /// Back to zero. Pending timeouts are dropped.
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.frame_time = 0.0;
        self.frame = 0;
        self.last_timestamp = None;
        self.timeouts.clear();
    }

    /// Forgets the last host timestamp, so the gap spent paused is not
    /// counted when frames resume.
    pub fn halt(&mut self) {
        self.last_timestamp = None;
    }

    /// Derives the timing of the next frame from a host timestamp.
    pub fn begin_frame(&mut self, timestamp: f64) -> TimingInfo {
        let frame_duration = self
            .last_timestamp
            .map_or(0.0, |last| (timestamp - last).clamp(0.0, self.max_frame_ms));
        self.last_timestamp = Some(timestamp);

        TimingInfo {
            timestamp,
            elapsed: self.elapsed,
            frame_duration,
            frame: self.frame,
        }
    }

    /// Advances the clock by a finished frame and hands back the timeouts that
    /// came due, earliest first.
    pub fn commit(&mut self, timing: &TimingInfo) -> Vec<TimeoutCallback> {
        self.elapsed += timing.frame_duration;
        self.frame_time = timing.frame_duration;
        self.frame += 1;
        trace!(
            "TimeController: frame {} committed at {:.3} ms",
            self.frame,
            self.elapsed
        );

        let now = self.elapsed;
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.timeouts.drain(..).partition(|t| t.due <= now);
        self.timeouts = pending;
        due.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.id.cmp(&b.id)));
        due.into_iter().map(|t| t.callback).collect()
    }

    /// Schedules `callback` to run once `delay_ms` of simulation time has passed.
    pub fn set_timeout(&mut self, callback: TimeoutCallback, delay_ms: f64) -> TimeoutId {
        let id = TimeoutId(self.next_timeout);
        self.next_timeout += 1;
        self.timeouts.push(Timeout {
            id,
            due: self.elapsed + delay_ms.max(0.0),
            callback,
        });
        id
    }

    /// Returns false if the timeout already fired or never existed.
    pub fn clear_timeout(&mut self, id: TimeoutId) -> bool {
        let before = self.timeouts.len();
        self.timeouts.retain(|t| t.id != id);
        self.timeouts.len() != before
    }
}
