// brickbot_sim/src/error.rs

use std::path::PathBuf;

use brickbot_core::error::SimError;
use thiserror::Error;

/// Failures of the host before or around the simulation itself.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("scenario file '{0}' does not exist")]
    ScenarioNotFound(PathBuf),

    #[error("invalid scenario configuration: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("could not read program '{path}': {source}")]
    Program {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("frame rate must be positive, got {0}")]
    FrameRate(f64),

    #[error(transparent)]
    Sim(#[from] SimError),
}

impl From<figment::Error> for HostError {
    fn from(e: figment::Error) -> Self {
        HostError::Config(Box::new(e))
    }
}

pub type HostResult<T> = Result<T, HostError>;
