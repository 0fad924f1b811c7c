// brickbot_sim/src/cli.rs

use bevy::prelude::Resource;
use clap::Parser;
use std::path::PathBuf;

/// Brickbot: a simulated EV3 driving base.
///
/// Runs a scenario either in a window or headless, optionally driven by a
/// command program.
#[derive(Parser, Debug, Resource, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The scenario TOML file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    pub scenario: Option<PathBuf>,

    /// A command program for the robot. The robot idles when omitted.
    #[arg(short, long)]
    pub program: Option<PathBuf>,

    /// Run without a window, stepping on synthetic timestamps.
    #[arg(long, default_value_t = false)]
    pub headless: bool,

    /// Number of frames to run in headless mode.
    #[arg(long, default_value_t = 600)]
    pub frames: u64,

    /// Frame rate of the headless clock, in Hz.
    #[arg(long, default_value_t = 60.0)]
    pub frame_rate: f64,
}

impl Cli {
    /// Duration of one headless frame in milliseconds.
    pub fn frame_ms(&self) -> Option<f64> {
        (self.frame_rate.is_finite() && self.frame_rate > 0.0).then(|| 1000.0 / self.frame_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_run_ten_seconds_at_sixty_hertz() {
        let cli = Cli::parse_from(["brickbot", "--headless"]);
        assert!(cli.headless);
        assert!(cli.scenario.is_none());
        assert_eq!(cli.frames, 600);
        assert_eq!(cli.frame_ms(), Some(1000.0 / 60.0));
    }

    #[test]
    fn rejects_a_zero_frame_rate() {
        let cli = Cli::parse_from(["brickbot", "--frame-rate", "0"]);
        assert_eq!(cli.frame_ms(), None);
    }

    #[test]
    fn paths_are_taken_as_given() {
        let cli = Cli::parse_from([
            "brickbot",
            "-s",
            "scenarios/default.toml",
            "--program",
            "programs/approach_wall.txt",
        ]);
        assert_eq!(cli.scenario, Some(PathBuf::from("scenarios/default.toml")));
        assert_eq!(cli.program, Some(PathBuf::from("programs/approach_wall.txt")));
    }
}
