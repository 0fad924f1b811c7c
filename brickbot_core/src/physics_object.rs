// brickbot_core/src/physics_object.rs

use nalgebra::Vector3;

use crate::backend::{Material, MeshShape, PhysicsBackend, RenderBackend};
use crate::entity::{add_cuboid, Entity, EntityCuboidOptions};
use crate::error::BackendError;
use crate::types::{MeshHandle, Orientation, Rgb};

/// An [`Entity`] with a mesh that follows it.
///
/// Synchronisation only ever runs physics to render. The mesh transform is
/// never read back.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsObject {
    entity: Entity,
    mesh: MeshHandle,
    /// Offset of the mesh origin in the body frame.
    mesh_offset: Vector3<f64>,
}

impl PhysicsObject {
    pub fn new(entity: Entity, mesh: MeshHandle) -> Self {
        Self {
            entity,
            mesh,
            mesh_offset: Vector3::zeros(),
        }
    }

    pub fn with_mesh_offset(mut self, offset: Vector3<f64>) -> Self {
        self.mesh_offset = offset;
        self
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn mesh(&self) -> MeshHandle {
        self.mesh
    }

    pub fn orientation(&self) -> &Orientation {
        self.entity.orientation()
    }

    /// Pulls the resolved pose from physics and writes it to the mesh.
    ///
    /// Calling this again without a physics step in between writes the same
    /// transform, so ready-state re-renders show the last resolved pose.
    pub fn step(&mut self, physics: &dyn PhysicsBackend, render: &mut dyn RenderBackend) {
        self.entity.refresh(physics);
        self.sync_visual(render);
    }

    /// Writes the entity's current pose to the mesh without consulting physics.
    pub fn sync_visual(&self, render: &mut dyn RenderBackend) {
        let pose = self.entity.orientation();
        let position = pose.world_point(&self.mesh_offset);
        render.set_transform(self.mesh, &position, &pose.rotation);
    }
}

/// Options for [`add_cuboid_physics_object`].
#[derive(Debug, Clone)]
pub struct CuboidObjectOptions {
    pub entity: EntityCuboidOptions,
    pub color: Rgb,
    pub wireframe: bool,
}

/// Creates a box entity together with a matching box mesh, already in the scene.
pub fn add_cuboid_physics_object(
    physics: &mut dyn PhysicsBackend,
    render: &mut dyn RenderBackend,
    options: &CuboidObjectOptions,
) -> Result<PhysicsObject, BackendError> {
    let entity = add_cuboid(physics, &options.entity)?;
    let shape = MeshShape::Cuboid {
        width: options.entity.width,
        height: options.entity.height,
        length: options.entity.length,
    };
    let material = if options.wireframe {
        Material::wireframe(options.color)
    } else {
        Material::solid(options.color)
    };
    let mesh = render.create_mesh(shape, material);
    render.add_to_scene(mesh);

    let object = PhysicsObject::new(entity, mesh);
    object.sync_visual(render);
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::physics::RapierPhysics;
    use crate::backend::render::HeadlessRenderer;
    use crate::config::PhysicsConfig;

    fn falling_box() -> (RapierPhysics, HeadlessRenderer, PhysicsObject) {
        let mut physics = RapierPhysics::new(PhysicsConfig::default());
        let mut render = HeadlessRenderer::new();
        let object = add_cuboid_physics_object(
            &mut physics,
            &mut render,
            &CuboidObjectOptions {
                entity: EntityCuboidOptions::dynamic(
                    Orientation::from_position(Vector3::new(0.0, 1.0, 0.0)),
                    0.2,
                    0.2,
                    0.2,
                    1.0,
                ),
                color: Rgb::WHITE,
                wireframe: false,
            },
        )
        .unwrap();
        (physics, render, object)
    }

    #[test]
    fn mesh_follows_resolved_pose() {
        let (mut physics, mut render, mut object) = falling_box();
        physics.step(0.1);
        object.step(&physics, &mut render);

        let resolved = physics.resolve_orientation(object.entity().body()).unwrap();
        let node = render.scene().node(object.mesh()).unwrap();
        assert_eq!(node.position, resolved.position);
        assert_eq!(node.rotation, resolved.rotation);
    }

    #[test]
    fn step_is_idempotent_without_physics_advance() {
        let (mut physics, mut render, mut object) = falling_box();
        physics.step(0.05);

        object.step(&physics, &mut render);
        let once = render.scene().node(object.mesh()).cloned().unwrap();
        object.step(&physics, &mut render);
        let twice = render.scene().node(object.mesh()).cloned().unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn mesh_offset_is_applied_in_body_frame() {
        let (physics, mut render, object) = falling_box();
        let mut object = object.with_mesh_offset(Vector3::new(0.0, 0.5, 0.0));
        object.step(&physics, &mut render);
        let node = render.scene().node(object.mesh()).unwrap();
        assert_eq!(node.position, Vector3::new(0.0, 1.5, 0.0));
    }
}
