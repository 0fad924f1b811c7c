// brickbot_core/src/controllers/sensors/mod.rs

pub mod color;
pub mod ultrasonic;

use super::SenseContext;

/// A value stamped with the simulation time it was read at (ms).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading<T> {
    pub timestamp: f64,
    pub value: T,
}

/// A read-only environment query.
///
/// `sense` re-queries the backends on every call and never mutates the world,
/// so repeated reads between two steps return the same value.
pub trait Sensor {
    type Value;

    fn sense(&self, ctx: &SenseContext<'_>) -> SensorReading<Self::Value>;
}
