// brickbot_core/src/controllers/ev3.rs

use nalgebra::Vector3;
use std::fmt;
use tracing::{debug, info};

use super::chassis::{Chassis, ChassisMesh, ChassisRef};
use super::motor::Motor;
use super::sensors::color::{ColorReading, ColorSensor};
use super::sensors::ultrasonic::UltrasonicSensor;
use super::sensors::Sensor;
use super::wheel::Wheel;
use super::{ControllerMap, PartKey, PartMut, PartRef, SenseContext};
use crate::backend::{PhysicsBackend, RenderBackend};
use crate::config::Ev3Config;
use crate::error::BackendError;
use crate::feedback::pid::PidSnapshot;
use crate::time::TimingInfo;

// =========================================================================
// == Part Keys ==
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ev3Part {
    Chassis,
    Mesh,
    FrontLeftWheel,
    FrontRightWheel,
    BackLeftWheel,
    BackRightWheel,
    LeftMotor,
    RightMotor,
    ColorSensor,
    UltrasonicSensor,
}

impl Ev3Part {
    pub const WHEELS: [Ev3Part; 4] = [
        Ev3Part::FrontLeftWheel,
        Ev3Part::FrontRightWheel,
        Ev3Part::BackLeftWheel,
        Ev3Part::BackRightWheel,
    ];

    pub const MOTORS: [Ev3Part; 2] = [Ev3Part::LeftMotor, Ev3Part::RightMotor];
}

impl PartKey for Ev3Part {
    const ALL: &'static [Self] = &[
        Ev3Part::Chassis,
        Ev3Part::Mesh,
        Ev3Part::FrontLeftWheel,
        Ev3Part::FrontRightWheel,
        Ev3Part::BackLeftWheel,
        Ev3Part::BackRightWheel,
        Ev3Part::LeftMotor,
        Ev3Part::RightMotor,
        Ev3Part::ColorSensor,
        Ev3Part::UltrasonicSensor,
    ];

    fn name(self) -> &'static str {
        match self {
            Ev3Part::Chassis => "chassis",
            Ev3Part::Mesh => "mesh",
            Ev3Part::FrontLeftWheel => "frontLeftWheel",
            Ev3Part::FrontRightWheel => "frontRightWheel",
            Ev3Part::BackLeftWheel => "backLeftWheel",
            Ev3Part::BackRightWheel => "backRightWheel",
            Ev3Part::LeftMotor => "leftMotor",
            Ev3Part::RightMotor => "rightMotor",
            Ev3Part::ColorSensor => "colorSensor",
            Ev3Part::UltrasonicSensor => "ultrasonicSensor",
        }
    }
}

// =========================================================================
// == Drive Command ==
// =========================================================================

/// Robot-level motion request for the differential drive.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriveCommand {
    /// Forward speed in m/s.
    pub linear_speed: f64,
    /// Yaw rate in rad/s, positive turns left.
    pub turn_rate: f64,
}

impl DriveCommand {
    pub fn new(linear_speed: f64, turn_rate: f64) -> Self {
        Self {
            linear_speed,
            turn_rate,
        }
    }

    pub fn stop() -> Self {
        Self::default()
    }
}

// =========================================================================
// == Ev3 ==
// =========================================================================

/// The stock EV3 driving base.
#[derive(Debug, Clone)]
pub struct Ev3 {
    chassis: Chassis,
    mesh: ChassisMesh,
    front_left_wheel: Wheel,
    front_right_wheel: Wheel,
    back_left_wheel: Wheel,
    back_right_wheel: Wheel,
    left_motor: Motor,
    right_motor: Motor,
    color_sensor: ColorSensor,
    ultrasonic_sensor: UltrasonicSensor,
    /// Distance between the two drive wheels.
    track_width: f64,
    pending_drive: Option<DriveCommand>,
    last_drive: Option<DriveCommand>,
}

impl Ev3 {
    /// Creates every part in the given backends.
    pub fn assemble(
        physics: &mut dyn PhysicsBackend,
        render: &mut dyn RenderBackend,
        config: &Ev3Config,
    ) -> Result<Self, BackendError> {
        let chassis = Chassis::new(physics, render, &config.chassis)?;
        let chassis_ref = chassis.reference();
        let mesh = ChassisMesh::new(render, &chassis, &config.mesh);

        let wheels = &config.wheel.displacements;
        let mut wheel = |part: Ev3Part, displacement: Vector3<f64>| {
            Wheel::new(part.name(), render, chassis_ref, displacement, &config.wheel)
        };
        let front_left_wheel = wheel(Ev3Part::FrontLeftWheel, wheels.front_left_wheel.0);
        let front_right_wheel = wheel(Ev3Part::FrontRightWheel, wheels.front_right_wheel.0);
        let back_left_wheel = wheel(Ev3Part::BackLeftWheel, wheels.back_left_wheel.0);
        let back_right_wheel = wheel(Ev3Part::BackRightWheel, wheels.back_right_wheel.0);

        let motors = &config.motor.displacements;
        let left_motor = Motor::new(
            Ev3Part::LeftMotor.name(),
            render,
            chassis_ref,
            motors.left_motor.0,
            &config.motor,
        );
        let right_motor = Motor::new(
            Ev3Part::RightMotor.name(),
            render,
            chassis_ref,
            motors.right_motor.0,
            &config.motor,
        );
        let track_width = (motors.left_motor.0.x - motors.right_motor.0.x).abs();

        let color_sensor = ColorSensor::new(render, chassis_ref, &config.color_sensor);
        let ultrasonic_sensor = UltrasonicSensor::new(render, chassis_ref, &config.ultrasonic_sensor);

        info!(
            "Ev3: assembled with {} parts, track width {:.3} m",
            Ev3Part::ALL.len(),
            track_width
        );
        Ok(Self {
            chassis,
            mesh,
            front_left_wheel,
            front_right_wheel,
            back_left_wheel,
            back_right_wheel,
            left_motor,
            right_motor,
            color_sensor,
            ultrasonic_sensor,
            track_width,
            pending_drive: None,
            last_drive: None,
        })
    }

    // --- Accessors ---

    pub fn chassis(&self) -> &Chassis {
        &self.chassis
    }

    pub fn chassis_ref(&self) -> ChassisRef {
        self.chassis.reference()
    }

    pub fn wheel(&self, part: Ev3Part) -> Option<&Wheel> {
        self.part(part).as_wheel()
    }

    pub fn wheel_mut(&mut self, part: Ev3Part) -> Option<&mut Wheel> {
        self.part_mut(part).into_wheel()
    }

    pub fn wheels(&self) -> [&Wheel; 4] {
        [
            &self.front_left_wheel,
            &self.front_right_wheel,
            &self.back_left_wheel,
            &self.back_right_wheel,
        ]
    }

    pub fn left_motor(&self) -> &Motor {
        &self.left_motor
    }

    pub fn left_motor_mut(&mut self) -> &mut Motor {
        &mut self.left_motor
    }

    pub fn right_motor(&self) -> &Motor {
        &self.right_motor
    }

    pub fn right_motor_mut(&mut self) -> &mut Motor {
        &mut self.right_motor
    }

    pub fn motor_mut(&mut self, part: Ev3Part) -> Option<&mut Motor> {
        self.part_mut(part).into_motor()
    }

    pub fn color_sensor(&self) -> &ColorSensor {
        &self.color_sensor
    }

    pub fn ultrasonic_sensor(&self) -> &UltrasonicSensor {
        &self.ultrasonic_sensor
    }

    pub fn track_width(&self) -> f64 {
        self.track_width
    }

    // --- Robot-level control ---

    /// Queues a drive command. It is turned into motor targets at the next step.
    pub fn drive(&mut self, command: DriveCommand) {
        self.pending_drive = Some(command);
    }

    /// Stops both motors immediately and drops any queued drive command.
    pub fn stop(&mut self) {
        self.pending_drive = None;
        self.last_drive = Some(DriveCommand::stop());
        self.left_motor.stop();
        self.right_motor.stop();
    }

    pub fn last_drive(&self) -> Option<DriveCommand> {
        self.last_drive
    }

    pub fn set_ride_height(&mut self, ride_height: f64) {
        for part in Ev3Part::WHEELS {
            if let Some(wheel) = self.wheel_mut(part) {
                wheel.set_ride_height(ride_height);
            }
        }
    }

    /// Robot-level orchestration: converts a queued drive command into motor
    /// targets, then lets every part update.
    pub fn update(&mut self, timing: &TimingInfo) {
        if let Some(command) = self.pending_drive.take() {
            let half_track = self.track_width / 2.0;
            // +X is left, so the left wheel is on the inside of a left turn.
            let left = command.linear_speed - command.turn_rate * half_track;
            let right = command.linear_speed + command.turn_rate * half_track;
            self.left_motor
                .set_target_velocity(left / self.left_motor.wheel_radius());
            self.right_motor
                .set_target_velocity(right / self.right_motor.wheel_radius());
            debug!(
                "Ev3: drive {:.3} m/s, {:.3} rad/s -> wheels {:.3} / {:.3} m/s",
                command.linear_speed, command.turn_rate, left, right
            );
            self.last_drive = Some(command);
        }
        self.update_parts(timing);
    }

    // --- Monitoring ---

    pub fn telemetry(&self, ctx: &SenseContext<'_>) -> Ev3Telemetry {
        let pose = self.chassis.orientation();
        let forward = pose.world_direction(&Vector3::z());
        Ev3Telemetry {
            timestamp: ctx.elapsed,
            position: pose.position,
            heading: forward.x.atan2(forward.z).to_degrees(),
            wheels: Ev3Part::WHEELS
                .iter()
                .filter_map(|&part| self.wheel(part))
                .map(|wheel| WheelTelemetry {
                    name: wheel.label(),
                    suspension_length: wheel.suspension_length(),
                    force: wheel.force(),
                    pid: wheel.pid(),
                })
                .collect(),
            motors: [&self.left_motor, &self.right_motor]
                .into_iter()
                .map(|motor| MotorTelemetry {
                    name: motor.label(),
                    target_velocity: motor.target_velocity(),
                    velocity: motor.velocity(),
                    rotation: motor.rotation(),
                    pid: motor.pid(),
                })
                .collect(),
            distance: self.ultrasonic_sensor.sense(ctx).value,
            color: self.color_sensor.sense(ctx).value,
        }
    }
}

impl ControllerMap for Ev3 {
    type Key = Ev3Part;

    fn part(&self, key: Ev3Part) -> PartRef<'_> {
        match key {
            Ev3Part::Chassis => PartRef::Chassis(&self.chassis),
            Ev3Part::Mesh => PartRef::Mesh(&self.mesh),
            Ev3Part::FrontLeftWheel => PartRef::Wheel(&self.front_left_wheel),
            Ev3Part::FrontRightWheel => PartRef::Wheel(&self.front_right_wheel),
            Ev3Part::BackLeftWheel => PartRef::Wheel(&self.back_left_wheel),
            Ev3Part::BackRightWheel => PartRef::Wheel(&self.back_right_wheel),
            Ev3Part::LeftMotor => PartRef::Motor(&self.left_motor),
            Ev3Part::RightMotor => PartRef::Motor(&self.right_motor),
            Ev3Part::ColorSensor => PartRef::ColorSensor(&self.color_sensor),
            Ev3Part::UltrasonicSensor => PartRef::UltrasonicSensor(&self.ultrasonic_sensor),
        }
    }

    fn part_mut(&mut self, key: Ev3Part) -> PartMut<'_> {
        match key {
            Ev3Part::Chassis => PartMut::Chassis(&mut self.chassis),
            Ev3Part::Mesh => PartMut::Mesh(&mut self.mesh),
            Ev3Part::FrontLeftWheel => PartMut::Wheel(&mut self.front_left_wheel),
            Ev3Part::FrontRightWheel => PartMut::Wheel(&mut self.front_right_wheel),
            Ev3Part::BackLeftWheel => PartMut::Wheel(&mut self.back_left_wheel),
            Ev3Part::BackRightWheel => PartMut::Wheel(&mut self.back_right_wheel),
            Ev3Part::LeftMotor => PartMut::Motor(&mut self.left_motor),
            Ev3Part::RightMotor => PartMut::Motor(&mut self.right_motor),
            Ev3Part::ColorSensor => PartMut::ColorSensor(&mut self.color_sensor),
            Ev3Part::UltrasonicSensor => PartMut::UltrasonicSensor(&mut self.ultrasonic_sensor),
        }
    }
}

// =========================================================================
// == Telemetry ==
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct WheelTelemetry {
    pub name: &'static str,
    pub suspension_length: Option<f64>,
    pub force: f64,
    pub pid: PidSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotorTelemetry {
    pub name: &'static str,
    pub target_velocity: f64,
    pub velocity: f64,
    pub rotation: f64,
    pub pid: PidSnapshot,
}

/// Snapshot of the robot for monitoring.
#[derive(Debug, Clone, PartialEq)]
pub struct Ev3Telemetry {
    /// Simulation time in milliseconds.
    pub timestamp: f64,
    pub position: Vector3<f64>,
    /// Heading in degrees, 0 along world +Z, positive towards +X.
    pub heading: f64,
    pub wheels: Vec<WheelTelemetry>,
    pub motors: Vec<MotorTelemetry>,
    /// Ultrasonic distance in metres.
    pub distance: f64,
    pub color: ColorReading,
}

impl fmt::Display for Ev3Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:.2}s pos=({:.3}, {:.3}, {:.3}) heading={:.1}° distance={:.3}m color={} light={}%",
            self.timestamp / 1000.0,
            self.position.x,
            self.position.y,
            self.position.z,
            self.heading,
            self.distance,
            self.color.color,
            self.color.reflected_light,
        )?;
        for motor in &self.motors {
            write!(
                f,
                " {}={:.2}/{:.2}rad/s",
                motor.name, motor.velocity, motor.target_velocity
            )?;
        }
        Ok(())
    }
}
