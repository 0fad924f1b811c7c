// brickbot_sim/src/prelude.rs

// Re-export the entire Bevy prelude for convenience.
pub use bevy::prelude::*;

// Re-export the core prelude so hosts reach `World`, `Ev3`, `DriveCommand`, etc.
pub use brickbot_core::prelude::*;

pub use crate::cli::Cli;
pub use crate::error::{HostError, HostResult};
pub use crate::headless::HeadlessRun;
pub use crate::render::{BevyRenderBackend, SceneMirror};
pub use crate::{BrickbotSet, BrickbotSimulationPlugin, SimulationWorld};
