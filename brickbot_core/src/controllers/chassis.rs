// brickbot_core/src/controllers/chassis.rs

use super::Controller;
use crate::backend::{Material, MeshShape, PhysicsBackend, RenderBackend};
use crate::config::{ChassisConfig, MeshConfig};
use crate::entity::{add_cuboid, EntityCuboidOptions};
use crate::error::BackendError;
use crate::physics_object::PhysicsObject;
use crate::types::{BodyHandle, ColliderHandle, MeshHandle, Orientation, Rgb};

/// Non-owning handle to the chassis body, held by every part mounted on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChassisRef {
    body: BodyHandle,
    collider: ColliderHandle,
}

impl ChassisRef {
    pub fn new(body: BodyHandle, collider: ColliderHandle) -> Self {
        Self { body, collider }
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    pub fn collider(&self) -> ColliderHandle {
        self.collider
    }

    /// Current chassis pose, straight from the backend.
    pub fn orientation(&self, physics: &dyn PhysicsBackend) -> Option<Orientation> {
        physics.resolve_orientation(self.body)
    }
}

/// The robot's main rigid body. Every actuator pushes on it.
#[derive(Debug, Clone)]
pub struct Chassis {
    object: PhysicsObject,
    debug: bool,
}

impl Chassis {
    pub fn new(
        physics: &mut dyn PhysicsBackend,
        render: &mut dyn RenderBackend,
        config: &ChassisConfig,
    ) -> Result<Self, BackendError> {
        let entity = add_cuboid(
            physics,
            &EntityCuboidOptions::dynamic(
                config.pose.to_orientation(),
                config.width,
                config.height,
                config.length,
                config.mass,
            ),
        )?;

        // The collider outline is only put on screen in debug mode.
        let mesh = render.create_mesh(
            MeshShape::Cuboid {
                width: config.width,
                height: config.height,
                length: config.length,
            },
            Material::wireframe(Rgb::new(0.0, 1.0, 0.0)),
        );
        if config.debug {
            render.add_to_scene(mesh);
        }

        let object = PhysicsObject::new(entity, mesh);
        object.sync_visual(render);
        Ok(Self {
            object,
            debug: config.debug,
        })
    }

    pub fn reference(&self) -> ChassisRef {
        let entity = self.object.entity();
        ChassisRef::new(entity.body(), entity.collider())
    }

    pub fn object(&self) -> &PhysicsObject {
        &self.object
    }

    /// Pose resolved at the end of the last step.
    pub fn orientation(&self) -> &Orientation {
        self.object.orientation()
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }
}

impl Controller for Chassis {
    fn sync(&mut self, physics: &dyn PhysicsBackend, render: &mut dyn RenderBackend) {
        self.object.step(physics, render);
    }
}

/// The cosmetic robot body drawn around the chassis.
///
/// It shares the chassis entity and draws its own mesh at a fixed offset in
/// the chassis frame.
#[derive(Debug, Clone)]
pub struct ChassisMesh {
    object: PhysicsObject,
}

impl ChassisMesh {
    pub fn new(render: &mut dyn RenderBackend, chassis: &Chassis, config: &MeshConfig) -> Self {
        let mesh = render.create_mesh(
            MeshShape::Cuboid {
                width: config.width,
                height: config.height,
                length: config.length,
            },
            Material::solid(config.color),
        );
        render.add_to_scene(mesh);

        let object = PhysicsObject::new(chassis.object().entity().clone(), mesh)
            .with_mesh_offset(config.offset.0);
        object.sync_visual(render);
        Self { object }
    }

    pub fn mesh(&self) -> MeshHandle {
        self.object.mesh()
    }
}

impl Controller for ChassisMesh {
    fn sync(&mut self, physics: &dyn PhysicsBackend, render: &mut dyn RenderBackend) {
        self.object.step(physics, render);
    }
}
