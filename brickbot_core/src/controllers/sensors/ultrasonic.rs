// brickbot_core/src/controllers/sensors/ultrasonic.rs

use nalgebra::{Unit, UnitQuaternion, Vector3};
use tracing::warn;

use super::{Sensor, SensorReading};
use crate::backend::{Material, MeshShape, PhysicsBackend, RenderBackend};
use crate::config::UltrasonicSensorConfig;
use crate::controllers::chassis::ChassisRef;
use crate::controllers::{Controller, SenseContext};
use crate::geometry::Ray;
use crate::types::{MeshHandle, Orientation, Rgb};

/// Range finder: casts a physics ray from its mount along its direction.
#[derive(Debug, Clone)]
pub struct UltrasonicSensor {
    chassis: ChassisRef,
    displacement: Vector3<f64>,
    direction: Unit<Vector3<f64>>,
    max_range: f64,
    /// Debug arrow showing the ray. Purely visual.
    arrow: Option<MeshHandle>,
}

impl UltrasonicSensor {
    pub fn new(
        render: &mut dyn RenderBackend,
        chassis: ChassisRef,
        config: &UltrasonicSensorConfig,
    ) -> Self {
        let direction = Unit::try_new(config.direction.0, 1e-9).unwrap_or_else(|| {
            warn!("UltrasonicSensor: zero direction configured, facing forward");
            Vector3::z_axis()
        });

        let arrow = config.debug.then(|| {
            let mesh = render.create_mesh(
                MeshShape::Arrow {
                    length: config.max_range,
                },
                Material::wireframe(Rgb::new(1.0, 0.0, 0.0)),
            );
            render.add_to_scene(mesh);
            mesh
        });

        Self {
            chassis,
            displacement: config.displacement.0,
            direction,
            max_range: config.max_range,
            arrow,
        }
    }

    /// Distance reported when nothing is within range, in metres.
    pub fn max_range(&self) -> f64 {
        self.max_range
    }

    pub fn is_debug(&self) -> bool {
        self.arrow.is_some()
    }

    fn ray(&self, pose: &Orientation) -> Ray {
        Ray::new(
            pose.world_point(&self.displacement),
            Unit::new_normalize(pose.world_direction(&self.direction)),
        )
    }
}

impl Sensor for UltrasonicSensor {
    /// Distance to the first obstacle in metres.
    type Value = f64;

    fn sense(&self, ctx: &SenseContext<'_>) -> SensorReading<f64> {
        let value = match self.chassis.orientation(ctx.physics) {
            Some(pose) => ctx
                .physics
                .cast_ray(&self.ray(&pose), self.max_range, Some(self.chassis.collider()))
                .map_or(self.max_range, |hit| hit.distance),
            None => {
                warn!("UltrasonicSensor: chassis body {:?} missing", self.chassis.body());
                self.max_range
            }
        };
        SensorReading {
            timestamp: ctx.elapsed,
            value,
        }
    }
}

impl Controller for UltrasonicSensor {
    fn sync(&mut self, physics: &dyn PhysicsBackend, render: &mut dyn RenderBackend) {
        let Some(arrow) = self.arrow else {
            return;
        };
        let Some(pose) = self.chassis.orientation(physics) else {
            return;
        };
        let ray = self.ray(&pose);
        // Arrow meshes point along local +Z.
        let rotation = UnitQuaternion::rotation_between(&Vector3::z(), &ray.direction.into_inner())
            .unwrap_or_else(|| UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::PI));
        render.set_transform(arrow, &ray.origin, &rotation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_rig::Rig;
    use approx::assert_abs_diff_eq;

    fn sensor(rig: &mut Rig, debug: bool) -> UltrasonicSensor {
        UltrasonicSensor::new(
            &mut rig.render,
            rig.chassis,
            &UltrasonicSensorConfig {
                debug,
                ..UltrasonicSensorConfig::default()
            },
        )
    }

    #[test]
    fn empty_space_reads_max_range() {
        let mut rig = Rig::new(0.5);
        let sensor = sensor(&mut rig, false);
        let reading = sensor.sense(&rig.sense_context(42.0));
        assert_abs_diff_eq!(reading.value, 2.55);
        assert_abs_diff_eq!(reading.timestamp, 42.0);
    }

    #[test]
    fn obstacle_at_half_range_is_measured() {
        let mut rig = Rig::new(0.5);
        let sensor = sensor(&mut rig, false);
        // The sensor sits at z = 0.095 on a chassis centred at the origin.
        let face = 0.095 + 2.55 / 2.0;
        rig.add_obstacle(Vector3::new(0.04, 0.5, face + 0.05), Vector3::new(0.5, 0.5, 0.1));

        let reading = sensor.sense(&rig.sense_context(0.0));
        assert!(reading.value < 2.55);
        assert_abs_diff_eq!(reading.value, 2.55 / 2.0, epsilon = 1e-9);
    }

    #[test]
    fn repeated_reads_agree_and_debug_arrow_does_not_interfere() {
        let mut rig = Rig::new(0.5);
        let mut sensor = sensor(&mut rig, true);
        rig.add_obstacle(Vector3::new(0.0, 0.5, 1.0), Vector3::new(1.0, 1.0, 0.1));

        let first = sensor.sense(&rig.sense_context(0.0));
        sensor.sync(&rig.physics, &mut rig.render);
        let second = sensor.sense(&rig.sense_context(0.0));
        assert_eq!(first, second);
        assert!(sensor.is_debug());
    }
}
