// brickbot_core/src/controllers/mod.rs

//! Robot parts and the named registry a robot is assembled from.

pub mod chassis;
pub mod ev3;
pub mod motor;
pub mod sensors;
pub mod wheel;

use std::fmt::Debug;

use crate::backend::{PhysicsBackend, RenderBackend};
use crate::error::{SimError, SimResult};
use crate::time::TimingInfo;

use self::chassis::{Chassis, ChassisMesh};
use self::motor::Motor;
use self::sensors::color::ColorSensor;
use self::sensors::ultrasonic::UltrasonicSensor;
use self::wheel::Wheel;

// =========================================================================
// == Contexts ==
// =========================================================================

/// Read-only view of the world handed to sensors and programs.
#[derive(Clone, Copy)]
pub struct SenseContext<'a> {
    pub physics: &'a dyn PhysicsBackend,
    pub render: &'a dyn RenderBackend,
    /// Simulation time in milliseconds, used to stamp readings.
    pub elapsed: f64,
}

// =========================================================================
// == Controller ==
// =========================================================================

/// The per-step hooks of a robot part. The world calls them in a fixed order:
/// `update` (orchestration), `fixed_update` (control decision against the
/// previous frame's physics state), then after the physics step `sync`
/// (visuals from the freshly resolved state).
pub trait Controller {
    fn update(&mut self, _timing: &TimingInfo) {}

    fn fixed_update(&mut self, _physics: &mut dyn PhysicsBackend, _timing: &TimingInfo) {}

    fn sync(&mut self, _physics: &dyn PhysicsBackend, _render: &mut dyn RenderBackend) {}
}

// =========================================================================
// == Controller Map ==
// =========================================================================

/// A closed set of part names.
pub trait PartKey: Copy + Eq + Debug + 'static {
    /// Every key, in the order parts are stepped.
    const ALL: &'static [Self];

    fn name(self) -> &'static str;

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|key| key.name() == name)
    }
}

/// A borrowed robot part.
#[derive(Debug, Clone, Copy)]
pub enum PartRef<'a> {
    Chassis(&'a Chassis),
    Mesh(&'a ChassisMesh),
    Wheel(&'a Wheel),
    Motor(&'a Motor),
    ColorSensor(&'a ColorSensor),
    UltrasonicSensor(&'a UltrasonicSensor),
}

impl<'a> PartRef<'a> {
    pub fn kind(&self) -> &'static str {
        match self {
            PartRef::Chassis(_) => "chassis",
            PartRef::Mesh(_) => "mesh",
            PartRef::Wheel(_) => "wheel",
            PartRef::Motor(_) => "motor",
            PartRef::ColorSensor(_) => "color sensor",
            PartRef::UltrasonicSensor(_) => "ultrasonic sensor",
        }
    }

    pub fn as_wheel(&self) -> Option<&'a Wheel> {
        match *self {
            PartRef::Wheel(wheel) => Some(wheel),
            _ => None,
        }
    }

    pub fn as_motor(&self) -> Option<&'a Motor> {
        match *self {
            PartRef::Motor(motor) => Some(motor),
            _ => None,
        }
    }

    pub fn as_color_sensor(&self) -> Option<&'a ColorSensor> {
        match *self {
            PartRef::ColorSensor(sensor) => Some(sensor),
            _ => None,
        }
    }

    pub fn as_ultrasonic_sensor(&self) -> Option<&'a UltrasonicSensor> {
        match *self {
            PartRef::UltrasonicSensor(sensor) => Some(sensor),
            _ => None,
        }
    }
}

/// A mutably borrowed robot part.
#[derive(Debug)]
pub enum PartMut<'a> {
    Chassis(&'a mut Chassis),
    Mesh(&'a mut ChassisMesh),
    Wheel(&'a mut Wheel),
    Motor(&'a mut Motor),
    ColorSensor(&'a mut ColorSensor),
    UltrasonicSensor(&'a mut UltrasonicSensor),
}

impl<'a> PartMut<'a> {
    pub fn into_controller(self) -> &'a mut dyn Controller {
        match self {
            PartMut::Chassis(part) => part,
            PartMut::Mesh(part) => part,
            PartMut::Wheel(part) => part,
            PartMut::Motor(part) => part,
            PartMut::ColorSensor(part) => part,
            PartMut::UltrasonicSensor(part) => part,
        }
    }

    pub fn into_wheel(self) -> Option<&'a mut Wheel> {
        match self {
            PartMut::Wheel(wheel) => Some(wheel),
            _ => None,
        }
    }

    pub fn into_motor(self) -> Option<&'a mut Motor> {
        match self {
            PartMut::Motor(motor) => Some(motor),
            _ => None,
        }
    }
}

/// A robot assembled from a fixed set of named parts.
///
/// Typed lookups through [`ControllerMap::part`] cannot fail. Lookups by name
/// fail with [`SimError::ControllerNotFound`] for names outside the key set.
/// There is no way to add or remove parts after assembly.
pub trait ControllerMap {
    type Key: PartKey;

    fn part(&self, key: Self::Key) -> PartRef<'_>;

    fn part_mut(&mut self, key: Self::Key) -> PartMut<'_>;

    fn keys(&self) -> &'static [Self::Key] {
        Self::Key::ALL
    }

    fn get(&self, name: &str) -> SimResult<PartRef<'_>> {
        let key = Self::Key::from_name(name).ok_or_else(|| SimError::ControllerNotFound {
            name: name.to_string(),
        })?;
        Ok(self.part(key))
    }

    fn get_mut(&mut self, name: &str) -> SimResult<PartMut<'_>> {
        let key = Self::Key::from_name(name).ok_or_else(|| SimError::ControllerNotFound {
            name: name.to_string(),
        })?;
        Ok(self.part_mut(key))
    }

    fn update_parts(&mut self, timing: &TimingInfo) {
        for &key in Self::Key::ALL {
            self.part_mut(key).into_controller().update(timing);
        }
    }

    fn fixed_update_parts(&mut self, physics: &mut dyn PhysicsBackend, timing: &TimingInfo) {
        for &key in Self::Key::ALL {
            self.part_mut(key).into_controller().fixed_update(physics, timing);
        }
    }

    fn sync_parts(&mut self, physics: &dyn PhysicsBackend, render: &mut dyn RenderBackend) {
        for &key in Self::Key::ALL {
            self.part_mut(key).into_controller().sync(physics, render);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_rig {
    use nalgebra::Vector3;

    use super::chassis::{Chassis, ChassisRef};
    use super::SenseContext;
    use crate::backend::physics::RapierPhysics;
    use crate::backend::render::HeadlessRenderer;
    use crate::backend::PhysicsBackend;
    use crate::config::{ChassisConfig, PhysicsConfig, Pose};
    use crate::entity::EntityCuboidOptions;
    use crate::physics_object::{add_cuboid_physics_object, CuboidObjectOptions};
    use crate::time::TimingInfo;
    use crate::types::{Orientation, Rgb};

    /// Zero-gravity world with a white floor whose top face is at y = 0 and a
    /// default-sized chassis hovering at the requested height.
    pub(crate) struct Rig {
        pub physics: RapierPhysics,
        pub render: HeadlessRenderer,
        pub chassis: ChassisRef,
    }

    impl Rig {
        pub fn new(chassis_height: f64) -> Self {
            let mut physics = RapierPhysics::new(PhysicsConfig {
                gravity: Vector3::zeros(),
                ..PhysicsConfig::default()
            });
            let mut render = HeadlessRenderer::new();
            add_cuboid_physics_object(
                &mut physics,
                &mut render,
                &CuboidObjectOptions {
                    entity: EntityCuboidOptions::fixed(
                        Orientation::from_position(Vector3::new(0.0, -0.5, 0.0)),
                        20.0,
                        1.0,
                        20.0,
                    ),
                    color: Rgb::WHITE,
                    wireframe: false,
                },
            )
            .unwrap();
            let chassis = Chassis::new(
                &mut physics,
                &mut render,
                &ChassisConfig {
                    pose: Pose::at(0.0, chassis_height, 0.0),
                    ..ChassisConfig::default()
                },
            )
            .unwrap()
            .reference();
            Self {
                physics,
                render,
                chassis,
            }
        }

        pub fn add_obstacle(&mut self, centre: Vector3<f64>, size: Vector3<f64>) {
            add_cuboid_physics_object(
                &mut self.physics,
                &mut self.render,
                &CuboidObjectOptions {
                    entity: EntityCuboidOptions::fixed(
                        Orientation::from_position(centre),
                        size.x,
                        size.y,
                        size.z,
                    ),
                    color: Rgb::BLACK,
                    wireframe: false,
                },
            )
            .unwrap();
        }

        pub fn timing(&self, frame_duration: f64) -> TimingInfo {
            TimingInfo {
                timestamp: frame_duration,
                elapsed: 0.0,
                frame_duration,
                frame: 0,
            }
        }

        pub fn sense_context(&self, elapsed: f64) -> SenseContext<'_> {
            SenseContext {
                physics: &self.physics,
                render: &self.render,
                elapsed,
            }
        }

        pub fn chassis_velocity(&self) -> Vector3<f64> {
            let centre = self.physics.resolve_orientation(self.chassis.body()).unwrap().position;
            self.physics
                .velocity_at_point(self.chassis.body(), &centre)
                .unwrap()
        }
    }
}
