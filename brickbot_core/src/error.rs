// brickbot_core/src/error.rs

use thiserror::Error;

use crate::types::{BodyHandle, ColliderHandle, MeshHandle};

/// Errors raised by a physics or render backend.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    #[error("backend failed to initialize: {0}")]
    Init(String),
    #[error("unknown rigid body {0:?}")]
    UnknownBody(BodyHandle),
    #[error("unknown collider {0:?}")]
    UnknownCollider(ColliderHandle),
    #[error("unknown mesh {0:?}")]
    UnknownMesh(MeshHandle),
}

/// Errors raised while loading or running a robot program.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProgramError {
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("unknown robot part '{0}'")]
    UnknownPart(String),
}

/// The public error type of the simulation core.
#[derive(Debug, Error)]
pub enum SimError {
    /// A second World was requested while the first one is still alive.
    #[error("only one instance of world is allowed")]
    DuplicateWorld,

    /// A ControllerMap lookup used a name outside its declared key set.
    #[error("controller not found: '{name}'")]
    ControllerNotFound { name: String },

    /// The World has not finished `init()` yet.
    #[error("world not initialized")]
    NotInitialized,

    #[error("{backend} backend failed to initialize")]
    BackendInit {
        backend: &'static str,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("program error: {0}")]
    Program(#[from] ProgramError),
}

pub type SimResult<T> = Result<T, SimError>;
