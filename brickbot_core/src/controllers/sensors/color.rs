// brickbot_core/src/controllers/sensors/color.rs

use nalgebra::{Unit, UnitQuaternion, Vector3};
use std::f64::consts::PI;
use std::fmt;
use tracing::warn;

use super::{Sensor, SensorReading};
use crate::backend::{Material, MeshShape, PhysicsBackend, RenderBackend};
use crate::config::ColorSensorConfig;
use crate::controllers::chassis::ChassisRef;
use crate::controllers::{Controller, SenseContext};
use crate::geometry::Ray;
use crate::types::{MeshHandle, Orientation, Rgb};

/// The colours an EV3 colour sensor distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorClass {
    #[default]
    NoColor,
    Black,
    Blue,
    Green,
    Yellow,
    Red,
    White,
    Brown,
}

impl ColorClass {
    const PALETTE: [(ColorClass, Rgb); 7] = [
        (ColorClass::Black, Rgb::new(0.0, 0.0, 0.0)),
        (ColorClass::Blue, Rgb::new(0.0, 0.0, 1.0)),
        (ColorClass::Green, Rgb::new(0.0, 0.6, 0.0)),
        (ColorClass::Yellow, Rgb::new(1.0, 1.0, 0.0)),
        (ColorClass::Red, Rgb::new(1.0, 0.0, 0.0)),
        (ColorClass::White, Rgb::new(1.0, 1.0, 1.0)),
        (ColorClass::Brown, Rgb::new(0.55, 0.27, 0.07)),
    ];

    /// Nearest palette entry.
    pub fn classify(rgb: &Rgb) -> Self {
        Self::PALETTE
            .iter()
            .min_by(|a, b| rgb.distance_squared(&a.1).total_cmp(&rgb.distance_squared(&b.1)))
            .map_or(ColorClass::NoColor, |(class, _)| *class)
    }

    /// The numeric code the EV3 firmware reports.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ColorClass::NoColor => "none",
            ColorClass::Black => "black",
            ColorClass::Blue => "blue",
            ColorClass::Green => "green",
            ColorClass::Yellow => "yellow",
            ColorClass::Red => "red",
            ColorClass::White => "white",
            ColorClass::Brown => "brown",
        }
    }
}

impl fmt::Display for ColorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColorReading {
    /// Raw sampled colour, `None` if no surface is within range.
    pub rgb: Option<Rgb>,
    pub color: ColorClass,
    /// Reflected light intensity in percent.
    pub reflected_light: u8,
}

impl ColorReading {
    pub fn from_sample(sample: Option<Rgb>) -> Self {
        match sample {
            Some(rgb) => Self {
                rgb: Some(rgb),
                color: ColorClass::classify(&rgb),
                reflected_light: (rgb.luminance() * 100.0).round().clamp(0.0, 100.0) as u8,
            },
            None => Self::default(),
        }
    }
}

/// Looks straight down from its mount into the rendered scene.
#[derive(Debug, Clone)]
pub struct ColorSensor {
    chassis: ChassisRef,
    displacement: Vector3<f64>,
    max_distance: f64,
    marker: Option<MeshHandle>,
}

impl ColorSensor {
    pub fn new(render: &mut dyn RenderBackend, chassis: ChassisRef, config: &ColorSensorConfig) -> Self {
        let marker = config.debug.then(|| {
            let mesh = render.create_mesh(
                MeshShape::Arrow {
                    length: config.max_distance,
                },
                Material::wireframe(Rgb::new(0.0, 0.0, 1.0)),
            );
            render.add_to_scene(mesh);
            mesh
        });

        Self {
            chassis,
            displacement: config.displacement.0,
            max_distance: config.max_distance,
            marker,
        }
    }

    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    fn ray(&self, pose: &Orientation) -> Ray {
        Ray::new(
            pose.world_point(&self.displacement),
            Unit::new_normalize(pose.world_direction(&-Vector3::y())),
        )
    }
}

impl Sensor for ColorSensor {
    type Value = ColorReading;

    fn sense(&self, ctx: &SenseContext<'_>) -> SensorReading<ColorReading> {
        let sample = match self.chassis.orientation(ctx.physics) {
            Some(pose) => ctx.render.sample_color(&self.ray(&pose), self.max_distance),
            None => {
                warn!("ColorSensor: chassis body {:?} missing", self.chassis.body());
                None
            }
        };
        SensorReading {
            timestamp: ctx.elapsed,
            value: ColorReading::from_sample(sample),
        }
    }
}

impl Controller for ColorSensor {
    fn sync(&mut self, physics: &dyn PhysicsBackend, render: &mut dyn RenderBackend) {
        let (Some(marker), Some(pose)) = (self.marker, self.chassis.orientation(physics)) else {
            return;
        };
        // Arrow meshes point along local +Z; tip it over to look down.
        let rotation = pose.rotation * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), PI / 2.0);
        render.set_transform(marker, &pose.world_point(&self.displacement), &rotation);
    }
}
