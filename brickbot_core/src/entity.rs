// brickbot_core/src/entity.rs

use nalgebra::{UnitQuaternion, Vector3};
use tracing::warn;

use crate::backend::{ColliderDesc, PhysicsBackend, RigidBodyDesc, RigidBodyKind};
use crate::error::BackendError;
use crate::types::{BodyHandle, ColliderHandle, Orientation};

/// One rigid body plus its collider, bound to the pose the physics backend
/// resolved for it.
///
/// The pose is written at construction and afterwards only by [`Entity::refresh`],
/// which copies it from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    body: BodyHandle,
    collider: ColliderHandle,
    orientation: Orientation,
}

impl Entity {
    pub fn new(
        physics: &mut dyn PhysicsBackend,
        body_desc: &RigidBodyDesc,
        collider_desc: &ColliderDesc,
    ) -> Result<Self, BackendError> {
        let body = physics.create_rigid_body(body_desc);
        let collider = physics.create_collider(collider_desc, body)?;
        Ok(Self {
            body,
            collider,
            orientation: body_desc.orientation,
        })
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    pub fn collider(&self) -> ColliderHandle {
        self.collider
    }

    pub fn orientation(&self) -> &Orientation {
        &self.orientation
    }

    pub fn position(&self) -> &Vector3<f64> {
        &self.orientation.position
    }

    pub fn rotation(&self) -> &UnitQuaternion<f64> {
        &self.orientation.rotation
    }

    pub(crate) fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    /// Copies the backend's resolved pose. If the body is gone the last known
    /// pose is kept and `false` is returned.
    pub fn refresh(&mut self, physics: &dyn PhysicsBackend) -> bool {
        match physics.resolve_orientation(self.body) {
            Some(orientation) => {
                self.set_orientation(orientation);
                true
            }
            None => {
                warn!("Entity: body {:?} no longer exists, keeping last pose", self.body);
                false
            }
        }
    }
}

/// Options for [`add_cuboid`].
#[derive(Debug, Clone)]
pub struct EntityCuboidOptions {
    pub kind: RigidBodyKind,
    pub orientation: Orientation,
    pub width: f64,
    pub height: f64,
    pub length: f64,
    pub mass: f64,
}

impl EntityCuboidOptions {
    pub fn fixed(orientation: Orientation, width: f64, height: f64, length: f64) -> Self {
        Self {
            kind: RigidBodyKind::Fixed,
            orientation,
            width,
            height,
            length,
            mass: 0.0,
        }
    }

    pub fn dynamic(orientation: Orientation, width: f64, height: f64, length: f64, mass: f64) -> Self {
        Self {
            kind: RigidBodyKind::Dynamic,
            orientation,
            width,
            height,
            length,
            mass,
        }
    }
}

/// Creates a box-shaped entity: width along X, height along Y, length along Z.
pub fn add_cuboid(
    physics: &mut dyn PhysicsBackend,
    options: &EntityCuboidOptions,
) -> Result<Entity, BackendError> {
    let body_desc = RigidBodyDesc::new(options.kind, options.orientation);
    let collider_desc =
        ColliderDesc::cuboid(options.width / 2.0, options.height / 2.0, options.length / 2.0)
            .with_mass(options.mass);
    Entity::new(physics, &body_desc, &collider_desc)
}
