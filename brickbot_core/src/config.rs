// brickbot_core/src/config.rs

use nalgebra::{UnitQuaternion, Vector3};
use serde::Deserialize;

use crate::feedback::pid::PidConfig;
use crate::types::{Orientation, Rgb};
use crate::utils::serde_helpers;

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

/// # SimulationConfig
/// Every assembly-time input of a simulation run. Any missing section falls
/// back to the stock EV3 setup, so an empty scenario file is valid.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub physics: PhysicsConfig,
    pub time: TimeConfig,
    pub robot: Ev3Config,
    pub environment: EnvironmentConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhysicsConfig {
    /// Global gravity vector in m/s^2 (Y up).
    #[serde(with = "serde_helpers::vec3_from_array")]
    pub gravity: Vector3<f64>,
    /// Longest sub-step the integrator may take, in seconds.
    pub timestep: f64,
    pub linear_damping: f64,
    pub angular_damping: f64,
    /// Coulomb friction coefficient given to every collider.
    pub friction: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vector3::new(0.0, -9.81, 0.0),
            timestep: 1.0 / 120.0,
            linear_damping: 0.0,
            angular_damping: 0.5,
            friction: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeConfig {
    /// Frames longer than this (ms) are shortened, e.g. after the host stalled.
    pub max_frame_ms: f64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self { max_frame_ms: 100.0 }
    }
}

// =========================================================================
// == Helper Structs ==
// =========================================================================

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(deny_unknown_fields)]
pub struct Pose {
    #[serde(with = "serde_helpers::vec3_from_array", default = "Vector3::zeros")]
    pub translation: Vector3<f64>,

    /// Roll, pitch, yaw in degrees.
    #[serde(with = "serde_helpers::quat_from_euler_deg", default = "UnitQuaternion::identity")]
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

impl Pose {
    pub fn at(x: f64, y: f64, z: f64) -> Self {
        Self {
            translation: Vector3::new(x, y, z),
            ..Self::default()
        }
    }

    pub fn to_orientation(&self) -> Orientation {
        Orientation::new(self.translation, self.rotation)
    }
}

/// A point given as `[x, y, z]` in the chassis frame (+X left, +Y up, +Z forward).
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(transparent)]
pub struct Displacement(#[serde(with = "serde_helpers::vec3_from_array")] pub Vector3<f64>);

impl Displacement {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self(Vector3::new(x, y, z))
    }
}

// =========================================================================
// == Robot ==
// =========================================================================

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Ev3Config {
    pub chassis: ChassisConfig,
    pub mesh: MeshConfig,
    pub wheel: WheelConfig,
    pub motor: MotorConfig,
    pub color_sensor: ColorSensorConfig,
    pub ultrasonic_sensor: UltrasonicSensorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChassisConfig {
    pub pose: Pose,
    pub width: f64,
    pub height: f64,
    pub length: f64,
    pub mass: f64,
    /// Draw the collider as a wireframe box.
    pub debug: bool,
}

impl Default for ChassisConfig {
    fn default() -> Self {
        Self {
            pose: Pose::at(0.0, 0.0775, 0.0),
            width: 0.145,
            height: 0.09,
            length: 0.18,
            mass: 0.6,
            debug: false,
        }
    }
}

/// The cosmetic body drawn over the chassis.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeshConfig {
    pub width: f64,
    pub height: f64,
    pub length: f64,
    pub offset: Displacement,
    pub color: Rgb,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            width: 0.145,
            height: 0.095,
            length: 0.18,
            offset: Displacement::new(0.0, 0.0025, 0.0),
            color: Rgb::from_hex(0xd9d9d9),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WheelDisplacements {
    pub front_left_wheel: Displacement,
    pub front_right_wheel: Displacement,
    pub back_left_wheel: Displacement,
    pub back_right_wheel: Displacement,
}

impl Default for WheelDisplacements {
    fn default() -> Self {
        Self {
            front_left_wheel: Displacement::new(0.0715, -0.045, 0.0628),
            front_right_wheel: Displacement::new(-0.0715, -0.045, 0.0628),
            back_left_wheel: Displacement::new(0.0715, -0.045, -0.0631),
            back_right_wheel: Displacement::new(-0.0715, -0.045, -0.0631),
        }
    }
}

/// Suspension wheels: a ray-cast spring at each corner of the chassis.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WheelConfig {
    pub displacements: WheelDisplacements,
    /// Force (N) per metre of suspension error.
    pub pid: PidConfig,
    /// Target distance between mount point and ground, in metres.
    pub ride_height: f64,
    /// Suspension travel. Beyond this the wheel is airborne.
    pub max_ray_distance: f64,
    /// Sideways damping at the contact (N per m/s of lateral slip).
    pub lateral_grip: f64,
    pub radius: f64,
    pub width: f64,
    pub color: Rgb,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            displacements: WheelDisplacements::default(),
            pid: PidConfig::new(80.0, 40.0, 3.0).with_output_range(0.0, 12.0),
            ride_height: 0.0325,
            max_ray_distance: 0.1,
            lateral_grip: 3.0,
            radius: 0.02,
            width: 0.015,
            color: Rgb::from_hex(0x333333),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotorDisplacements {
    pub left_motor: Displacement,
    pub right_motor: Displacement,
}

impl Default for MotorDisplacements {
    fn default() -> Self {
        Self {
            left_motor: Displacement::new(0.058, 0.0, 0.055),
            right_motor: Displacement::new(-0.058, 0.0, 0.055),
        }
    }
}

/// Drive motors: velocity-tracking wheel torque.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotorConfig {
    pub displacements: MotorDisplacements,
    /// Torque (N·m) per rad/s of velocity error.
    pub pid: PidConfig,
    pub wheel_radius: f64,
    pub wheel_width: f64,
    pub color: Rgb,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            displacements: MotorDisplacements::default(),
            pid: PidConfig::new(0.002, 0.01, 0.0).with_output_limit(0.05),
            wheel_radius: 0.028,
            wheel_width: 0.018,
            color: Rgb::from_hex(0x1a1a1a),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorSensorConfig {
    pub displacement: Displacement,
    /// How far below the sensor a surface can still be read, in metres.
    pub max_distance: f64,
    pub debug: bool,
}

impl Default for ColorSensorConfig {
    fn default() -> Self {
        Self {
            displacement: Displacement::new(0.04, -0.02, 0.07),
            max_distance: 0.1,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UltrasonicSensorConfig {
    pub displacement: Displacement,
    pub direction: Displacement,
    /// Reported when nothing is hit, in metres.
    pub max_range: f64,
    pub debug: bool,
}

impl Default for UltrasonicSensorConfig {
    fn default() -> Self {
        Self {
            displacement: Displacement::new(0.04, 0.0, 0.095),
            direction: Displacement::new(0.0, 0.0, 1.0),
            max_range: 2.55,
            debug: false,
        }
    }
}

// =========================================================================
// == Environment ==
// =========================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    pub floor: CuboidConfig,
    #[serde(default)]
    pub obstacles: Vec<CuboidConfig>,
    /// Flat coloured sheets on the floor. Visible to the colour sensor, no collider.
    #[serde(default)]
    pub papers: Vec<PaperConfig>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            floor: CuboidConfig {
                pose: Pose::at(0.0, -0.5, 0.0),
                width: 20.0,
                height: 1.0,
                length: 20.0,
                color: Rgb::WHITE,
            },
            obstacles: Vec::new(),
            papers: Vec::new(),
        }
    }
}

/// A fixed box in the world.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CuboidConfig {
    #[serde(default)]
    pub pose: Pose,
    pub width: f64,
    pub height: f64,
    pub length: f64,
    #[serde(default = "default_obstacle_color")]
    pub color: Rgb,
}

fn default_obstacle_color() -> Rgb {
    Rgb::from_hex(0x8c6239)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaperConfig {
    /// Centre of the sheet on the floor, `[x, z]`.
    pub position: [f64; 2],
    pub width: f64,
    pub length: f64,
    pub color: Rgb,
}
