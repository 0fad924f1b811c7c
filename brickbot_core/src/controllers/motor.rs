// brickbot_core/src/controllers/motor.rs

use nalgebra::Vector3;
use tracing::{debug, warn};

use super::chassis::ChassisRef;
use super::wheel::axle_rotation;
use super::Controller;
use crate::backend::{Material, MeshShape, PhysicsBackend, RenderBackend};
use crate::config::MotorConfig;
use crate::feedback::pid::{PidController, PidSnapshot};
use crate::time::TimingInfo;
use crate::types::MeshHandle;

/// A bounded rotation requested through `run_to_relative_position`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RunGoal {
    start: f64,
    angle: f64,
}

/// A drive motor with its wheel.
///
/// The motor tracks a target wheel angular velocity (rad/s). The sensed value
/// is the chassis velocity at the mount along chassis-forward, divided by the
/// wheel radius. The PID output is wheel torque. The chassis receives the
/// resulting traction force `torque / radius` at the mount plus the opposite
/// torque about the axle, which is the same load as traction at the contact patch.
#[derive(Debug, Clone)]
pub struct Motor {
    label: &'static str,
    chassis: ChassisRef,
    displacement: Vector3<f64>,
    pid: PidController,
    wheel_radius: f64,
    visual: MeshHandle,
    target_velocity: f64,
    velocity: f64,
    torque: f64,
    /// Accumulated wheel rotation in radians.
    rotation: f64,
    goal: Option<RunGoal>,
}

impl Motor {
    pub fn new(
        label: &'static str,
        render: &mut dyn RenderBackend,
        chassis: ChassisRef,
        displacement: Vector3<f64>,
        config: &MotorConfig,
    ) -> Self {
        let visual = render.create_mesh(
            MeshShape::Cylinder {
                radius: config.wheel_radius,
                width: config.wheel_width,
            },
            Material::solid(config.color),
        );
        render.add_to_scene(visual);

        Self {
            label,
            chassis,
            displacement,
            pid: PidController::new(config.pid),
            wheel_radius: config.wheel_radius,
            visual,
            target_velocity: 0.0,
            velocity: 0.0,
            torque: 0.0,
            rotation: 0.0,
            goal: None,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn displacement(&self) -> &Vector3<f64> {
        &self.displacement
    }

    pub fn wheel_radius(&self) -> f64 {
        self.wheel_radius
    }

    /// Target wheel angular velocity in rad/s.
    pub fn target_velocity(&self) -> f64 {
        self.target_velocity
    }

    /// Runs continuously at `velocity` rad/s. Cancels a pending relative run.
    pub fn set_target_velocity(&mut self, velocity: f64) {
        self.goal = None;
        self.target_velocity = velocity;
    }

    /// Turns the wheel by `angle` radians at `speed` rad/s, then stops.
    /// The sign of `angle` sets the direction.
    pub fn run_to_relative_position(&mut self, angle: f64, speed: f64) {
        if angle == 0.0 || speed == 0.0 {
            self.stop();
            return;
        }
        self.goal = Some(RunGoal {
            start: self.rotation,
            angle,
        });
        self.target_velocity = speed.abs() * angle.signum();
    }

    pub fn stop(&mut self) {
        self.goal = None;
        self.target_velocity = 0.0;
    }

    pub fn is_running_to_position(&self) -> bool {
        self.goal.is_some()
    }

    /// Sensed wheel angular velocity from the last step, in rad/s.
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Wheel torque (N·m) applied in the last step.
    pub fn torque(&self) -> f64 {
        self.torque
    }

    /// Accumulated wheel rotation in radians.
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn pid(&self) -> PidSnapshot {
        self.pid.snapshot()
    }

    pub fn visual(&self) -> MeshHandle {
        self.visual
    }
}

impl Controller for Motor {
    fn update(&mut self, _timing: &TimingInfo) {
        if let Some(goal) = self.goal {
            if (self.rotation - goal.start).abs() >= goal.angle.abs() {
                debug!("Motor '{}': relative run of {:.3} rad complete", self.label, goal.angle);
                self.stop();
            }
        }
    }

    fn fixed_update(&mut self, physics: &mut dyn PhysicsBackend, timing: &TimingInfo) {
        let Some(pose) = self.chassis.orientation(physics) else {
            warn!("Motor '{}': chassis body {:?} missing", self.label, self.chassis.body());
            return;
        };
        let mount = pose.world_point(&self.displacement);
        let forward = pose.world_direction(&Vector3::z());

        let Some(point_velocity) = physics.velocity_at_point(self.chassis.body(), &mount) else {
            warn!("Motor '{}': no velocity for chassis body", self.label);
            return;
        };
        self.velocity = point_velocity.dot(&forward) / self.wheel_radius;
        self.rotation += self.velocity * timing.dt_seconds();

        self.torque = self.pid.calculate(
            self.velocity,
            self.target_velocity,
            timing.simulation_seconds(),
        );
        let traction = forward * (self.torque / self.wheel_radius);
        let reaction = pose.world_direction(&Vector3::x()) * -self.torque;
        let applied = physics
            .apply_force_at_point(self.chassis.body(), &traction, &mount)
            .and_then(|()| physics.apply_torque(self.chassis.body(), &reaction));
        if let Err(e) = applied {
            warn!("Motor '{}': {}", self.label, e);
        }
    }

    fn sync(&mut self, physics: &dyn PhysicsBackend, render: &mut dyn RenderBackend) {
        let Some(pose) = self.chassis.orientation(physics) else {
            return;
        };
        render.set_transform(
            self.visual,
            &pose.world_point(&self.displacement),
            &(pose.rotation * axle_rotation(self.rotation)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_rig::Rig;
    use approx::assert_abs_diff_eq;

    fn motor(rig: &mut Rig) -> Motor {
        Motor::new(
            "leftMotor",
            &mut rig.render,
            rig.chassis,
            Vector3::new(0.058, 0.0, 0.055),
            &MotorConfig::default(),
        )
    }

    #[test]
    fn positive_target_pushes_chassis_forward() {
        let mut rig = Rig::new(0.5);
        let mut motor = motor(&mut rig);
        motor.set_target_velocity(10.0);
        let timing = rig.timing(16.0);
        motor.fixed_update(&mut rig.physics, &timing);
        assert!(motor.torque() > 0.0);

        rig.physics.step(0.016);
        assert!(rig.chassis_velocity().z > 0.0);
    }

    #[test]
    fn forward_drive_pitches_the_nose_up() {
        let mut rig = Rig::new(0.5);
        let mut motor = motor(&mut rig);
        motor.set_target_velocity(10.0);
        let timing = rig.timing(16.0);
        motor.fixed_update(&mut rig.physics, &timing);
        rig.physics.step(0.016);

        // The wheel's reaction torque acts about -X: rotating +Z towards +Y.
        let spin = rig.physics.angular_velocity(rig.chassis.body()).unwrap();
        assert!(spin.x < 0.0, "pitch rate {}", spin.x);
    }

    #[test]
    fn torque_respects_the_output_clamp() {
        let mut rig = Rig::new(0.5);
        let mut motor = motor(&mut rig);
        motor.set_target_velocity(1_000.0);
        let timing = rig.timing(16.0);
        motor.fixed_update(&mut rig.physics, &timing);
        assert_abs_diff_eq!(motor.torque(), 0.05);
    }

    #[test]
    fn relative_run_stops_after_the_requested_angle() {
        let mut rig = Rig::new(0.5);
        let mut motor = motor(&mut rig);
        motor.run_to_relative_position(std::f64::consts::PI, 10.0);
        assert_abs_diff_eq!(motor.target_velocity(), 10.0);

        let mut elapsed = 0.0;
        for _ in 0..600 {
            let timing = TimingInfo {
                timestamp: elapsed,
                elapsed,
                frame_duration: 10.0,
                frame: 0,
            };
            motor.update(&timing);
            if !motor.is_running_to_position() {
                break;
            }
            motor.fixed_update(&mut rig.physics, &timing);
            rig.physics.step(timing.dt_seconds());
            elapsed += timing.frame_duration;
        }

        assert!(!motor.is_running_to_position());
        assert_abs_diff_eq!(motor.target_velocity(), 0.0);
        assert!(motor.rotation() >= std::f64::consts::PI);
    }

    #[test]
    fn reverse_relative_run_uses_angle_sign() {
        let mut rig = Rig::new(0.5);
        let mut motor = motor(&mut rig);
        motor.run_to_relative_position(-1.0, 5.0);
        assert_abs_diff_eq!(motor.target_velocity(), -5.0);
        motor.stop();
        assert!(!motor.is_running_to_position());
    }
}
