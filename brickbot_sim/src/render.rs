// brickbot_sim/src/render.rs

//! The Bevy side of rendering: a render backend that records the core scene
//! graph, and a system that mirrors it into Bevy mesh entities.

use std::any::Any;

use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use brickbot_core::backend::render::{SceneGraph, SceneNode};
use brickbot_core::backend::{Material, MeshShape, RenderBackend, RenderSurface};
use brickbot_core::error::BackendError;
use brickbot_core::geometry::Ray;
use brickbot_core::types::{MeshHandle, Rgb};
use nalgebra::{UnitQuaternion, Vector3};
use tracing::{debug, trace, warn};

use crate::SimulationWorld;

/// Cross-section of the debug arrow shaft, in metres.
const ARROW_THICKNESS: f32 = 0.004;

// =========================================================================
// == Backend ==
// =========================================================================

/// Render backend for the windowed host. The core writes into the scene graph;
/// [`mirror_scene`] turns it into Bevy entities every frame.
#[derive(Debug, Default)]
pub struct BevyRenderBackend {
    scene: SceneGraph,
    /// Bumped on every `init`, so the mirror knows to start over.
    generation: u64,
    frames_drawn: u64,
    output: Option<RenderSurface>,
    pending_output: Option<RenderSurface>,
}

impl BevyRenderBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn output(&self) -> Option<&RenderSurface> {
        self.output.as_ref()
    }

    /// The surface attached since the last call, if any.
    pub fn take_output_change(&mut self) -> Option<RenderSurface> {
        self.pending_output.take()
    }
}

impl RenderBackend for BevyRenderBackend {
    fn init(&mut self) -> Result<(), BackendError> {
        self.scene.clear();
        self.generation += 1;
        self.frames_drawn = 0;
        debug!("BevyRenderBackend: scene generation {}", self.generation);
        Ok(())
    }

    fn create_mesh(&mut self, shape: MeshShape, material: Material) -> MeshHandle {
        self.scene.create(shape, material)
    }

    fn add_to_scene(&mut self, mesh: MeshHandle) {
        if let Err(e) = self.scene.add_to_scene(mesh) {
            warn!("BevyRenderBackend: {}", e);
        }
    }

    fn set_transform(
        &mut self,
        mesh: MeshHandle,
        position: &Vector3<f64>,
        rotation: &UnitQuaternion<f64>,
    ) {
        if let Err(e) = self.scene.set_transform(mesh, position, rotation) {
            warn!("BevyRenderBackend: {}", e);
        }
    }

    fn draw(&mut self) {
        self.frames_drawn += 1;
        trace!("BevyRenderBackend: frame {}", self.frames_drawn);
    }

    fn attach_output(&mut self, surface: RenderSurface) {
        self.pending_output = Some(surface.clone());
        self.output = Some(surface);
    }

    fn sample_color(&self, ray: &Ray, max_distance: f64) -> Option<Rgb> {
        self.scene.sample_color(ray, max_distance)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// =========================================================================
// == Conversions ==
// =========================================================================

pub fn to_bevy_transform(position: &Vector3<f64>, rotation: &UnitQuaternion<f64>) -> Transform {
    let r = rotation.coords;
    Transform::from_xyz(position.x as f32, position.y as f32, position.z as f32).with_rotation(
        Quat::from_xyzw(r.x as f32, r.y as f32, r.z as f32, r.w as f32),
    )
}

fn to_bevy_material(material: &Material) -> StandardMaterial {
    let Rgb { r, g, b } = material.color;
    if material.wireframe {
        StandardMaterial {
            base_color: Color::linear_rgba(r, g, b, 0.3),
            alpha_mode: AlphaMode::Blend,
            unlit: true,
            ..default()
        }
    } else {
        StandardMaterial {
            base_color: Color::linear_rgb(r, g, b),
            perceptual_roughness: 0.8,
            ..default()
        }
    }
}

fn visibility(node: &SceneNode) -> Visibility {
    if node.in_scene {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    }
}

// =========================================================================
// == Mirror ==
// =========================================================================

/// Bevy entity of every scene node, indexed by [`MeshHandle`].
#[derive(Resource, Debug, Default)]
pub struct SceneMirror {
    generation: u64,
    entities: Vec<Entity>,
}

impl SceneMirror {
    pub fn entity(&self, mesh: MeshHandle) -> Option<Entity> {
        self.entities.get(mesh.0 as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

fn spawn_node(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    node: &SceneNode,
) -> Entity {
    let material = MeshMaterial3d(materials.add(to_bevy_material(&node.material)));
    let transform = to_bevy_transform(&node.position, &node.rotation);

    match node.shape {
        MeshShape::Cuboid { width, height, length } => {
            let mesh = meshes.add(Cuboid::new(width as f32, height as f32, length as f32));
            commands
                .spawn((Mesh3d(mesh), material, transform, visibility(node)))
                .id()
        }
        MeshShape::Cylinder { radius, width } => {
            let mesh = meshes.add(Cylinder::new(radius as f32, width as f32));
            commands
                .spawn((Mesh3d(mesh), material, transform, visibility(node)))
                .id()
        }
        MeshShape::Arrow { length } => {
            // The shaft starts at the node origin, so it hangs off a pivot.
            let length = length as f32;
            let mesh = meshes.add(Cuboid::new(ARROW_THICKNESS, ARROW_THICKNESS, length));
            commands
                .spawn((transform, visibility(node)))
                .with_children(|pivot| {
                    pivot.spawn((
                        Mesh3d(mesh),
                        material,
                        Transform::from_xyz(0.0, 0.0, length / 2.0),
                    ));
                })
                .id()
        }
    }
}

/// Spawns entities for new scene nodes and copies every node's pose and
/// visibility onto its entity.
pub fn mirror_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut mirror: ResMut<SceneMirror>,
    mut sim: ResMut<SimulationWorld>,
    mut nodes: Query<(&mut Transform, &mut Visibility)>,
    mut windows: Query<&mut Window, With<PrimaryWindow>>,
) {
    let Some(backend) = sim
        .world_mut()
        .render_backend_mut()
        .as_any_mut()
        .downcast_mut::<BevyRenderBackend>()
    else {
        return;
    };

    if let Some(surface) = backend.take_output_change() {
        for mut window in &mut windows {
            window.title = surface.label.clone();
            window.resolution.set(surface.width as f32, surface.height as f32);
        }
    }

    if mirror.generation != backend.generation() {
        for entity in mirror.entities.drain(..) {
            commands.entity(entity).despawn();
        }
        mirror.generation = backend.generation();
    }

    for (mesh, node) in backend.scene().iter() {
        match mirror.entity(mesh) {
            Some(entity) => {
                if let Ok((mut transform, mut vis)) = nodes.get_mut(entity) {
                    *transform = to_bevy_transform(&node.position, &node.rotation);
                    *vis = visibility(node);
                }
            }
            None => {
                let entity = spawn_node(&mut commands, &mut meshes, &mut materials, node);
                mirror.entities.push(entity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use brickbot_core::prelude::*;

    #[test]
    fn transform_conversion_keeps_pose() {
        let rotation = UnitQuaternion::from_euler_angles(0.1, 0.7, -0.3);
        let transform = to_bevy_transform(&Vector3::new(1.0, 2.0, 3.0), &rotation);
        assert_eq!(transform.translation, Vec3::new(1.0, 2.0, 3.0));

        let expected = rotation * Vector3::z();
        let actual = transform.rotation * Vec3::Z;
        assert_abs_diff_eq!(actual.x as f64, expected.x, epsilon = 1e-6);
        assert_abs_diff_eq!(actual.y as f64, expected.y, epsilon = 1e-6);
        assert_abs_diff_eq!(actual.z as f64, expected.z, epsilon = 1e-6);
    }

    #[test]
    fn init_starts_a_new_generation() {
        let mut backend = BevyRenderBackend::new();
        backend.init().unwrap();
        backend.create_mesh(
            MeshShape::Cuboid { width: 1.0, height: 1.0, length: 1.0 },
            Material::solid(Rgb::WHITE),
        );
        assert_eq!(backend.scene().len(), 1);

        backend.init().unwrap();
        assert_eq!(backend.generation(), 2);
        assert!(backend.scene().is_empty());
    }

    #[test]
    fn attached_output_is_reported_once() {
        let mut backend = BevyRenderBackend::new();
        backend.attach_output(RenderSurface::default());
        assert_eq!(backend.take_output_change(), Some(RenderSurface::default()));
        assert_eq!(backend.take_output_change(), None);
        assert_eq!(backend.output(), Some(&RenderSurface::default()));
    }

    #[test]
    fn mirror_spawns_one_entity_per_scene_node() {
        let factory = WorldFactory::new();
        let config = SimulationConfig::default();
        let physics = Box::new(RapierPhysics::new(config.physics));
        let mut world = factory
            .create(config, physics, Box::new(BevyRenderBackend::new()), Box::new(IdleProgram))
            .unwrap();
        world.init("").unwrap();
        let nodes = world
            .render_backend()
            .as_any()
            .downcast_ref::<BevyRenderBackend>()
            .unwrap()
            .scene()
            .len();

        let mut app = App::new();
        app.init_resource::<Assets<Mesh>>()
            .init_resource::<Assets<StandardMaterial>>()
            .init_resource::<SceneMirror>()
            .insert_resource(SimulationWorld::new(world))
            .add_systems(Update, mirror_scene);
        app.update();

        assert_eq!(app.world().resource::<SceneMirror>().len(), nodes);
        // A second pass only updates what is already there.
        app.update();
        assert_eq!(app.world().resource::<SceneMirror>().len(), nodes);
    }
}
