// brickbot_core/src/geometry.rs

use nalgebra::{Isometry3, Point3, Unit, Vector3};
use rapier3d::parry::query::{Ray as ShapeRay, RayCast};
use rapier3d::parry::shape::Cuboid;

/// Direction vectors shorter than this cannot be normalized.
const MIN_DIRECTION_NORM: f64 = 1e-12;

/// A half-line used for ray casting. The direction is always unit length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vector3<f64>,
    pub direction: Unit<Vector3<f64>>,
}

impl Ray {
    pub fn new(origin: Vector3<f64>, direction: Unit<Vector3<f64>>) -> Self {
        Self { origin, direction }
    }

    /// Builds a ray from an arbitrary direction vector. Returns `None` for a zero vector.
    pub fn try_new(origin: Vector3<f64>, direction: Vector3<f64>) -> Option<Self> {
        Unit::try_new(direction, MIN_DIRECTION_NORM).map(|direction| Self { origin, direction })
    }

    pub fn point_at(&self, distance: f64) -> Vector3<f64> {
        self.origin + self.direction.into_inner() * distance
    }
}

/// The first intersection of a ray with a box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxHit {
    pub distance: f64,
    /// Outward surface normal at the hit point, in world space.
    pub normal: Vector3<f64>,
}

/// Intersects a ray with an oriented box (`pose` + half extents).
///
/// With `solid == true` a ray starting inside the box hits at distance zero, the
/// returned normal then points back along the ray. With `solid == false` such a
/// ray misses.
pub fn ray_cuboid(
    ray: &Ray,
    pose: &Isometry3<f64>,
    half_extents: &Vector3<f64>,
    max_distance: f64,
    solid: bool,
) -> Option<BoxHit> {
    let local_origin = pose.inverse_transform_point(&Point3::from(ray.origin));
    let inside = local_origin
        .coords
        .iter()
        .zip(half_extents.iter())
        .all(|(o, h)| o.abs() < *h);
    if inside {
        return solid.then(|| BoxHit {
            distance: 0.0,
            normal: -ray.direction.into_inner(),
        });
    }

    let shape_ray = ShapeRay::new(Point3::from(ray.origin), ray.direction.into_inner());
    Cuboid::new(*half_extents)
        .cast_ray_and_get_normal(pose, &shape_ray, max_distance, true)
        .map(|hit| BoxHit {
            distance: hit.time_of_impact,
            normal: hit.normal,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Translation3, UnitQuaternion};
    use std::f64::consts::FRAC_PI_4;

    fn unit_box_at(x: f64, y: f64, z: f64) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::new(x, y, z), UnitQuaternion::identity())
    }

    #[test]
    fn ray_hits_near_face_with_outward_normal() {
        let ray = Ray::new(Vector3::zeros(), Vector3::z_axis());
        let hit = ray_cuboid(&ray, &unit_box_at(0.0, 0.0, 5.0), &Vector3::repeat(0.5), 10.0, true)
            .expect("box straight ahead");
        assert_abs_diff_eq!(hit.distance, 4.5, epsilon = 1e-12);
        assert_abs_diff_eq!(hit.normal, Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-12);
    }

    #[test]
    fn ray_misses_box_beyond_max_distance() {
        let ray = Ray::new(Vector3::zeros(), Vector3::z_axis());
        assert!(ray_cuboid(&ray, &unit_box_at(0.0, 0.0, 5.0), &Vector3::repeat(0.5), 4.0, true).is_none());
    }

    #[test]
    fn ray_misses_box_behind_origin() {
        let ray = Ray::new(Vector3::zeros(), Vector3::z_axis());
        assert!(ray_cuboid(&ray, &unit_box_at(0.0, 0.0, -5.0), &Vector3::repeat(0.5), 10.0, true).is_none());
    }

    #[test]
    fn origin_inside_box_depends_on_solidity() {
        let ray = Ray::new(Vector3::zeros(), -Vector3::y_axis());
        let pose = unit_box_at(0.0, 0.0, 0.0);
        let hit = ray_cuboid(&ray, &pose, &Vector3::repeat(1.0), 10.0, true).expect("solid hit");
        assert_abs_diff_eq!(hit.distance, 0.0);
        assert!(ray_cuboid(&ray, &pose, &Vector3::repeat(1.0), 10.0, false).is_none());
    }

    #[test]
    fn rotated_box_reports_rotated_normal() {
        // A box rotated 45 degrees about Y, hit along +X: the near face is a diagonal.
        let pose = Isometry3::from_parts(
            Translation3::new(3.0, 0.0, 0.0),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_4),
        );
        let ray = Ray::new(Vector3::zeros(), Vector3::x_axis());
        let hit = ray_cuboid(&ray, &pose, &Vector3::repeat(0.5), 10.0, true).expect("hit");
        // The corner of the rotated box sits half a diagonal in front of its centre.
        assert_abs_diff_eq!(hit.distance, 3.0 - 0.5 * 2f64.sqrt(), epsilon = 1e-9);
        assert!(hit.normal.x < 0.0);
    }
}
