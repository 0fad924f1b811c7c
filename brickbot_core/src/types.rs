// brickbot_core/src/types.rs

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use serde::Deserialize;

// --- Core Identifiers ---
// Handles are opaque indices handed out by a backend. They are only meaningful
// to the backend that created them.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColliderHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u32);

// =========================================================================
// == Orientation ==
// =========================================================================

/// A resolved 3-D pose: position plus unit-quaternion rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Orientation {
    fn default() -> Self {
        Self::identity()
    }
}

impl Orientation {
    pub fn new(position: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), UnitQuaternion::identity())
    }

    pub fn from_position(position: Vector3<f64>) -> Self {
        Self::new(position, UnitQuaternion::identity())
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.position), self.rotation)
    }

    /// Transforms a point given in this pose's local frame into the world frame.
    pub fn world_point(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.position + self.rotation * local
    }

    /// Rotates a direction given in this pose's local frame into the world frame.
    pub fn world_direction(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }
}

impl From<Isometry3<f64>> for Orientation {
    fn from(iso: Isometry3<f64>) -> Self {
        Self::new(iso.translation.vector, iso.rotation)
    }
}

// =========================================================================
// == Colour ==
// =========================================================================

/// Linear RGB colour with channels in `[0, 1]`. Written as `[r, g, b]` in config.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f32; 3]")]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Builds a colour from a `0xRRGGBB` literal.
    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
        Self::new(channel(16), channel(8), channel(0))
    }

    /// Relative luminance (Rec. 709 weights), in `[0, 1]`.
    pub fn luminance(&self) -> f32 {
        0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b
    }

    pub fn distance_squared(&self, other: &Rgb) -> f32 {
        let (dr, dg, db) = (self.r - other.r, self.g - other.g, self.b - other.b);
        dr * dr + dg * dg + db * db
    }
}

impl From<[f32; 3]> for Rgb {
    fn from(arr: [f32; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn world_point_applies_rotation_before_translation() {
        let pose = Orientation::new(
            Vector3::new(1.0, 0.0, 0.0),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2),
        );
        // +Z rotated a quarter turn about +Y points along +X.
        let p = pose.world_point(&Vector3::new(0.0, 0.0, 1.0));
        assert_abs_diff_eq!(p.x, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn hex_colours_decode_per_channel() {
        let c = Rgb::from_hex(0xff8000);
        assert_abs_diff_eq!(c.r, 1.0);
        assert_abs_diff_eq!(c.g, 128.0 / 255.0);
        assert_abs_diff_eq!(c.b, 0.0);
    }
}
