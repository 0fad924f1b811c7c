// brickbot_sim/src/lib.rs

use bevy::prelude::*;
use brickbot_core::world::World;

use crate::render::{mirror_scene, SceneMirror};
use crate::systems::{keyboard_control, log_telemetry, setup_scene, step_world};

// This prelude is for convenience for other files WITHIN the brickbot_sim crate.
pub mod prelude;

pub mod cli;
pub mod config;
pub mod error;
pub mod headless;
pub mod logging;
pub mod render;
pub mod systems;

/// The simulation world, owned by the Bevy app. The app's frame loop is the
/// only thing that steps it.
#[derive(Resource, Debug)]
pub struct SimulationWorld(World);

impl SimulationWorld {
    pub fn new(world: World) -> Self {
        Self(world)
    }

    pub fn world(&self) -> &World {
        &self.0
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.0
    }

    pub fn into_inner(self) -> World {
        self.0
    }
}

/// Per-frame ordering of the host systems.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum BrickbotSet {
    /// Keyboard and other host input turned into robot commands.
    Input,
    /// One `World::step`.
    Step,
    /// Copies the core scene graph onto Bevy entities.
    Mirror,
    Telemetry,
}

/// The windowed front end. Expects a [`SimulationWorld`] backed by a
/// [`render::BevyRenderBackend`] to be inserted by the caller.
pub struct BrickbotSimulationPlugin;

impl Plugin for BrickbotSimulationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SceneMirror>()
            .configure_sets(
                Update,
                (
                    BrickbotSet::Input,
                    BrickbotSet::Step,
                    BrickbotSet::Mirror,
                    BrickbotSet::Telemetry,
                )
                    .chain(),
            )
            .add_systems(Startup, setup_scene)
            .add_systems(
                Update,
                (
                    keyboard_control.in_set(BrickbotSet::Input),
                    step_world.in_set(BrickbotSet::Step),
                    mirror_scene.in_set(BrickbotSet::Mirror),
                    log_telemetry.in_set(BrickbotSet::Telemetry),
                ),
            );
    }
}
