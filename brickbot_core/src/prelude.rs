// brickbot_core/src/prelude.rs

// --- Core Abstractions (The main contracts of the library) ---
pub use crate::backend::{PhysicsBackend, RenderBackend};
pub use crate::controllers::sensors::{Sensor, SensorReading};
pub use crate::controllers::{Controller, ControllerMap, PartKey, PartMut, PartRef, SenseContext};
pub use crate::program::{ProgramContext, ProgramController};

// --- Core Data Structures (The "nouns" of the library) ---
pub use crate::config::SimulationConfig;
pub use crate::console::RobotConsole;
pub use crate::entity::Entity;
pub use crate::error::{BackendError, ProgramError, SimError};
pub use crate::feedback::pid::{PidConfig, PidController, PidSnapshot};
pub use crate::physics_object::PhysicsObject;
pub use crate::time::{TimeController, TimingInfo};
pub use crate::types::{BodyHandle, ColliderHandle, MeshHandle, Orientation, Rgb};
pub use crate::world::{World, WorldFactory, WorldState};

// --- Concrete Implementations (Export common ones for convenience) ---
pub use crate::backend::physics::RapierPhysics;
pub use crate::backend::render::HeadlessRenderer;
pub use crate::controllers::ev3::{DriveCommand, Ev3, Ev3Part};
pub use crate::program::{CommandProgram, IdleProgram};
