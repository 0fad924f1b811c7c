// brickbot_core/src/controllers/wheel.rs

use nalgebra::{Unit, UnitQuaternion, Vector3};
use std::f64::consts::FRAC_PI_2;
use tracing::warn;

use super::chassis::ChassisRef;
use super::Controller;
use crate::backend::{Material, MeshShape, PhysicsBackend, RenderBackend};
use crate::config::WheelConfig;
use crate::feedback::pid::{PidController, PidSnapshot};
use crate::geometry::Ray;
use crate::time::TimingInfo;
use crate::types::{MeshHandle, Orientation};

/// Rotation, in the chassis frame, of a wheel mesh turned `spin` radians about
/// its axle. Cylinder meshes are built along local Y; axles run along chassis X.
pub(crate) fn axle_rotation(spin: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::x_axis(), spin)
        * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -FRAC_PI_2)
}

/// A ray-cast suspension wheel.
///
/// Each step it measures the distance from its mount to the ground below and
/// pushes the chassis up along the contact normal to hold that distance at the
/// ride height. An airborne wheel applies nothing.
#[derive(Debug, Clone)]
pub struct Wheel {
    label: &'static str,
    chassis: ChassisRef,
    displacement: Vector3<f64>,
    pid: PidController,
    ride_height: f64,
    max_ray_distance: f64,
    lateral_grip: f64,
    radius: f64,
    visual: MeshHandle,
    suspension_length: Option<f64>,
    force: f64,
}

impl Wheel {
    pub fn new(
        label: &'static str,
        render: &mut dyn RenderBackend,
        chassis: ChassisRef,
        displacement: Vector3<f64>,
        config: &WheelConfig,
    ) -> Self {
        let visual = render.create_mesh(
            MeshShape::Cylinder {
                radius: config.radius,
                width: config.width,
            },
            Material::solid(config.color),
        );
        render.add_to_scene(visual);

        Self {
            label,
            chassis,
            displacement,
            pid: PidController::new(config.pid),
            ride_height: config.ride_height,
            max_ray_distance: config.max_ray_distance,
            lateral_grip: config.lateral_grip,
            radius: config.radius,
            visual,
            suspension_length: None,
            force: 0.0,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn displacement(&self) -> &Vector3<f64> {
        &self.displacement
    }

    /// Target suspension length in metres.
    pub fn ride_height(&self) -> f64 {
        self.ride_height
    }

    /// Takes effect at this wheel's next control decision.
    pub fn set_ride_height(&mut self, ride_height: f64) {
        self.ride_height = ride_height.clamp(0.0, self.max_ray_distance);
    }

    /// Last measured mount-to-ground distance; `None` while airborne.
    pub fn suspension_length(&self) -> Option<f64> {
        self.suspension_length
    }

    pub fn in_contact(&self) -> bool {
        self.suspension_length.is_some()
    }

    /// Suspension force (N) applied in the last step.
    pub fn force(&self) -> f64 {
        self.force
    }

    pub fn pid(&self) -> PidSnapshot {
        self.pid.snapshot()
    }

    pub fn visual(&self) -> MeshHandle {
        self.visual
    }

    fn suspension_ray(&self, pose: &Orientation) -> (Vector3<f64>, Ray) {
        let mount = pose.world_point(&self.displacement);
        let down = Unit::new_normalize(pose.world_direction(&-Vector3::y()));
        (mount, Ray::new(mount, down))
    }
}

impl Controller for Wheel {
    fn fixed_update(&mut self, physics: &mut dyn PhysicsBackend, timing: &TimingInfo) {
        let Some(pose) = self.chassis.orientation(physics) else {
            warn!("Wheel '{}': chassis body {:?} missing", self.label, self.chassis.body());
            return;
        };
        let (mount, ray) = self.suspension_ray(&pose);

        let Some(hit) = physics.cast_ray(&ray, self.max_ray_distance, Some(self.chassis.collider()))
        else {
            self.suspension_length = None;
            self.force = 0.0;
            return;
        };

        self.suspension_length = Some(hit.distance);
        self.force = self
            .pid
            .calculate(hit.distance, self.ride_height, timing.simulation_seconds());
        let mut total = hit.normal * self.force;

        if self.lateral_grip > 0.0 {
            if let Some(velocity) = physics.velocity_at_point(self.chassis.body(), &mount) {
                let side = pose.world_direction(&Vector3::x());
                total -= side * (velocity.dot(&side) * self.lateral_grip);
            }
        }

        if let Err(e) = physics.apply_force_at_point(self.chassis.body(), &total, &mount) {
            warn!("Wheel '{}': {}", self.label, e);
        }
    }

    fn sync(&mut self, physics: &dyn PhysicsBackend, render: &mut dyn RenderBackend) {
        let Some(pose) = self.chassis.orientation(physics) else {
            return;
        };
        let (_, ray) = self.suspension_ray(&pose);
        let travel = physics
            .cast_ray(&ray, self.max_ray_distance, Some(self.chassis.collider()))
            .map_or(self.ride_height, |hit| hit.distance);
        let centre = ray.point_at(travel - self.radius);
        render.set_transform(self.visual, &centre, &(pose.rotation * axle_rotation(0.0)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_rig::Rig;
    use approx::assert_abs_diff_eq;

    fn wheel(rig: &mut Rig) -> Wheel {
        let config = WheelConfig {
            lateral_grip: 0.0,
            ..WheelConfig::default()
        };
        Wheel::new(
            "frontLeftWheel",
            &mut rig.render,
            rig.chassis,
            Vector3::new(0.07, -0.045, 0.06),
            &config,
        )
    }

    #[test]
    fn compressed_suspension_pushes_chassis_up() {
        let mut rig = Rig::new(0.07);
        let mut wheel = wheel(&mut rig);
        let timing = rig.timing(16.0);
        wheel.fixed_update(&mut rig.physics, &timing);

        // Mount sits at 0.07 - 0.045 above the floor.
        assert_abs_diff_eq!(wheel.suspension_length().unwrap(), 0.025, epsilon = 1e-9);
        assert!(wheel.force() > 0.0);

        rig.physics.step(0.016);
        let v = rig.chassis_velocity();
        assert!(v.y > 0.0);
    }

    #[test]
    fn airborne_wheel_applies_no_force() {
        let mut rig = Rig::new(1.0);
        let mut wheel = wheel(&mut rig);
        let timing = rig.timing(16.0);
        wheel.fixed_update(&mut rig.physics, &timing);

        assert!(!wheel.in_contact());
        assert_abs_diff_eq!(wheel.force(), 0.0);
        rig.physics.step(0.016);
        assert_abs_diff_eq!(rig.chassis_velocity().norm(), 0.0);
    }

    #[test]
    fn ride_height_is_limited_to_suspension_travel() {
        let mut rig = Rig::new(0.07);
        let mut wheel = wheel(&mut rig);
        wheel.set_ride_height(5.0);
        assert_abs_diff_eq!(wheel.ride_height(), WheelConfig::default().max_ray_distance);
    }
}
