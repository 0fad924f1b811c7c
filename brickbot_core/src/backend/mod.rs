// brickbot_core/src/backend/mod.rs

//! The contracts the simulation core consumes from its physics and render engines.
//!
//! The core never talks to a concrete engine. Hosts inject one implementation of
//! each trait when they create the [`World`](crate::world::World).
//! [`physics::RapierPhysics`] is the shipped rigid-body engine; the
//! [`render::HeadlessRenderer`] keeps a scene graph without drawing anything.

pub mod physics;
pub mod render;

use nalgebra::{UnitQuaternion, Vector3};
use std::any::Any;
use std::fmt::Debug;

use crate::error::BackendError;
use crate::geometry::Ray;
use crate::types::{BodyHandle, ColliderHandle, MeshHandle, Orientation, Rgb};

// =========================================================================
// == Physics ==
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RigidBodyKind {
    /// Never moves; ignores forces and gravity.
    Fixed,
    #[default]
    Dynamic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RigidBodyDesc {
    pub kind: RigidBodyKind,
    pub orientation: Orientation,
    pub linear_damping: f64,
    pub angular_damping: f64,
}

impl RigidBodyDesc {
    pub fn new(kind: RigidBodyKind, orientation: Orientation) -> Self {
        Self {
            kind,
            orientation,
            linear_damping: 0.0,
            angular_damping: 0.0,
        }
    }

    pub fn fixed(orientation: Orientation) -> Self {
        Self::new(RigidBodyKind::Fixed, orientation)
    }

    pub fn dynamic(orientation: Orientation) -> Self {
        Self::new(RigidBodyKind::Dynamic, orientation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColliderDesc {
    /// Half extents of the cuboid along the body's local axes.
    pub half_extents: Vector3<f64>,
    /// Mass contributed to the owning body, in kg.
    pub mass: f64,
}

impl ColliderDesc {
    pub fn cuboid(half_x: f64, half_y: f64, half_z: f64) -> Self {
        Self {
            half_extents: Vector3::new(half_x, half_y, half_z),
            mass: 0.0,
        }
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }
}

/// The result of a physics ray cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f64,
    pub normal: Vector3<f64>,
    pub collider: ColliderHandle,
}

/// A rigid-body engine as seen by the simulation core.
///
/// Implementations should be `Send + Sync` so a host may store the world in a
/// shared resource; the core itself only ever calls them from one thread.
pub trait PhysicsBackend: Debug + Send + Sync {
    /// (Re)initializes the engine into an empty world.
    fn init(&mut self) -> Result<(), BackendError>;

    fn create_rigid_body(&mut self, desc: &RigidBodyDesc) -> BodyHandle;

    fn create_collider(
        &mut self,
        desc: &ColliderDesc,
        body: BodyHandle,
    ) -> Result<ColliderHandle, BackendError>;

    /// Returns the closest hit within `max_distance`, skipping `exclude`.
    fn cast_ray(
        &self,
        ray: &Ray,
        max_distance: f64,
        exclude: Option<ColliderHandle>,
    ) -> Option<RayHit>;

    /// Advances the world by `dt` seconds and clears accumulated forces.
    fn step(&mut self, dt: f64);

    /// The pose the engine resolved for `body` during the last step.
    fn resolve_orientation(&self, body: BodyHandle) -> Option<Orientation>;

    /// Velocity of the material point of `body` currently at world position `point`.
    fn velocity_at_point(&self, body: BodyHandle, point: &Vector3<f64>) -> Option<Vector3<f64>>;

    fn angular_velocity(&self, body: BodyHandle) -> Option<Vector3<f64>>;

    /// Adds a world-space force at a world-space point for the next step.
    fn apply_force_at_point(
        &mut self,
        body: BodyHandle,
        force: &Vector3<f64>,
        point: &Vector3<f64>,
    ) -> Result<(), BackendError>;

    /// Adds a world-space torque about the body's centre of mass for the next step.
    fn apply_torque(&mut self, body: BodyHandle, torque: &Vector3<f64>) -> Result<(), BackendError>;
}

// =========================================================================
// == Rendering ==
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeshShape {
    Cuboid { width: f64, height: f64, length: f64 },
    /// A cylinder whose axis is the mesh's local Y axis.
    Cylinder { radius: f64, width: f64 },
    /// A thin debug arrow starting at the mesh origin and pointing along local +Z.
    Arrow { length: f64 },
}

impl MeshShape {
    /// Half extents of the shape's bounding box, in the mesh's local frame.
    pub fn half_extents(&self) -> Vector3<f64> {
        match *self {
            MeshShape::Cuboid { width, height, length } => {
                Vector3::new(width / 2.0, height / 2.0, length / 2.0)
            }
            MeshShape::Cylinder { radius, width } => Vector3::new(radius, width / 2.0, radius),
            MeshShape::Arrow { length } => Vector3::new(0.0, 0.0, length / 2.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub color: Rgb,
    /// Wireframe materials are debug aids: drawn, but never sampled by sensors.
    pub wireframe: bool,
}

impl Material {
    pub fn solid(color: Rgb) -> Self {
        Self { color, wireframe: false }
    }

    pub fn wireframe(color: Rgb) -> Self {
        Self { color, wireframe: true }
    }
}

/// Where a render backend should present its frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSurface {
    pub label: String,
    pub width: u32,
    pub height: u32,
}

impl Default for RenderSurface {
    fn default() -> Self {
        Self {
            label: "brickbot".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// A scene-graph renderer as seen by the simulation core.
pub trait RenderBackend: Send + Sync {
    fn init(&mut self) -> Result<(), BackendError>;

    fn create_mesh(&mut self, shape: MeshShape, material: Material) -> MeshHandle;

    fn add_to_scene(&mut self, mesh: MeshHandle);

    fn set_transform(
        &mut self,
        mesh: MeshHandle,
        position: &Vector3<f64>,
        rotation: &UnitQuaternion<f64>,
    );

    fn draw(&mut self);

    fn attach_output(&mut self, surface: RenderSurface);

    /// Colour of the first solid surface the ray meets in the rendered scene.
    fn sample_color(&self, ray: &Ray, max_distance: f64) -> Option<Rgb>;

    /// Allows hosts to downcast to their concrete backend.
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
