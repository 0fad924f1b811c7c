// brickbot_core/src/backend/render.rs

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use std::any::Any;
use tracing::{debug, trace, warn};

use super::{Material, MeshShape, RenderBackend, RenderSurface};
use crate::error::BackendError;
use crate::geometry::{ray_cuboid, Ray};
use crate::types::{MeshHandle, Rgb};

/// One mesh of the scene graph.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub shape: MeshShape,
    pub material: Material,
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub in_scene: bool,
}

impl SceneNode {
    fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.position), self.rotation)
    }

    /// Only solid, visible boxes and cylinders can be seen by a colour sensor.
    fn is_sampleable(&self) -> bool {
        self.in_scene && !self.material.wireframe && !matches!(self.shape, MeshShape::Arrow { .. })
    }
}

/// Engine-independent scene state shared by every render backend in this workspace.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn create(&mut self, shape: MeshShape, material: Material) -> MeshHandle {
        let handle = MeshHandle(self.nodes.len() as u32);
        self.nodes.push(SceneNode {
            shape,
            material,
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            in_scene: false,
        });
        handle
    }

    pub fn node(&self, mesh: MeshHandle) -> Option<&SceneNode> {
        self.nodes.get(mesh.0 as usize)
    }

    fn node_mut(&mut self, mesh: MeshHandle) -> Result<&mut SceneNode, BackendError> {
        self.nodes
            .get_mut(mesh.0 as usize)
            .ok_or(BackendError::UnknownMesh(mesh))
    }

    pub fn add_to_scene(&mut self, mesh: MeshHandle) -> Result<(), BackendError> {
        self.node_mut(mesh)?.in_scene = true;
        Ok(())
    }

    pub fn set_transform(
        &mut self,
        mesh: MeshHandle,
        position: &Vector3<f64>,
        rotation: &UnitQuaternion<f64>,
    ) -> Result<(), BackendError> {
        let node = self.node_mut(mesh)?;
        node.position = *position;
        node.rotation = *rotation;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (MeshHandle, &SceneNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (MeshHandle(index as u32), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Colour of the nearest sampleable mesh along the ray. Meshes containing the
    /// ray origin are ignored, so a sensor never sees the inside of its own housing.
    pub fn sample_color(&self, ray: &Ray, max_distance: f64) -> Option<Rgb> {
        self.nodes
            .iter()
            .filter(|node| node.is_sampleable())
            .filter_map(|node| {
                ray_cuboid(ray, &node.isometry(), &node.shape.half_extents(), max_distance, false)
                    .map(|hit| (hit.distance, node.material.color))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, color)| color)
    }
}

/// A render backend that keeps the scene graph in memory and draws nothing.
/// Used by the headless host and by tests.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    scene: SceneGraph,
    frames_drawn: u64,
    output: Option<RenderSurface>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn output(&self) -> Option<&RenderSurface> {
        self.output.as_ref()
    }
}

impl RenderBackend for HeadlessRenderer {
    fn init(&mut self) -> Result<(), BackendError> {
        self.scene.clear();
        self.frames_drawn = 0;
        Ok(())
    }

    fn create_mesh(&mut self, shape: MeshShape, material: Material) -> MeshHandle {
        self.scene.create(shape, material)
    }

    fn add_to_scene(&mut self, mesh: MeshHandle) {
        if let Err(e) = self.scene.add_to_scene(mesh) {
            warn!("HeadlessRenderer: {}", e);
        }
    }

    fn set_transform(
        &mut self,
        mesh: MeshHandle,
        position: &Vector3<f64>,
        rotation: &UnitQuaternion<f64>,
    ) {
        if let Err(e) = self.scene.set_transform(mesh, position, rotation) {
            warn!("HeadlessRenderer: {}", e);
        }
    }

    fn draw(&mut self) {
        self.frames_drawn += 1;
        trace!("HeadlessRenderer: frame {}", self.frames_drawn);
    }

    fn attach_output(&mut self, surface: RenderSurface) {
        debug!(
            "HeadlessRenderer: output attached to '{}' ({}x{})",
            surface.label, surface.width, surface.height
        );
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
