// brickbot_core/src/backend/physics.rs

use std::fmt;

use nalgebra::{Point3, Vector3};
use rapier3d::prelude::{
    CCDSolver, ColliderBuilder, ColliderSet, DefaultBroadPhase, ImpulseJointSet,
    IntegrationParameters, IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline,
    QueryFilter, QueryPipeline, Ray as ShapeRay, RigidBodyBuilder, RigidBodyHandle, RigidBodySet,
};
use tracing::debug;

use super::{ColliderDesc, PhysicsBackend, RayHit, RigidBodyDesc, RigidBodyKind};
use crate::config::PhysicsConfig;
use crate::error::BackendError;
use crate::geometry::Ray;
use crate::types::{BodyHandle, ColliderHandle, Orientation};

/// Normals shorter than this come from rays that start inside a collider.
const DEGENERATE_NORMAL: f64 = 1e-9;

/// Rigid-body physics on top of rapier.
///
/// The pipeline is stepped manually by the world, once per frame, in equal
/// sub-steps no longer than the configured timestep. User forces and torques
/// last for exactly one `step`.
///
/// Handles given out to the core are dense indices. Colliders carry their
/// index in `user_data` so ray hits can be mapped back.
pub struct RapierPhysics {
    config: PhysicsConfig,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    body_handles: Vec<RigidBodyHandle>,
    collider_handles: Vec<rapier3d::prelude::ColliderHandle>,
}

impl RapierPhysics {
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            config,
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            body_handles: Vec::new(),
            collider_handles: Vec::new(),
        }
    }

    pub fn body_count(&self) -> usize {
        self.body_handles.len()
    }

    fn body_handle(&self, handle: BodyHandle) -> Option<RigidBodyHandle> {
        self.body_handles.get(handle.0 as usize).copied()
    }

    fn body(&self, handle: BodyHandle) -> Option<&rapier3d::prelude::RigidBody> {
        self.body_handle(handle)
            .and_then(|h| self.rigid_body_set.get(h))
    }

    fn body_mut(
        &mut self,
        handle: BodyHandle,
    ) -> Result<&mut rapier3d::prelude::RigidBody, BackendError> {
        self.body_handle(handle)
            .and_then(|h| self.rigid_body_set.get_mut(h))
            .ok_or(BackendError::UnknownBody(handle))
    }

    fn substep(&mut self) {
        self.physics_pipeline.step(
            &self.config.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }
}

impl fmt::Debug for RapierPhysics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RapierPhysics")
            .field("config", &self.config)
            .field("bodies", &self.body_handles.len())
            .field("colliders", &self.collider_handles.len())
            .finish_non_exhaustive()
    }
}

impl PhysicsBackend for RapierPhysics {
    fn init(&mut self) -> Result<(), BackendError> {
        debug!(
            "RapierPhysics: reset ({} bodies dropped)",
            self.body_handles.len()
        );
        *self = Self::new(self.config);
        Ok(())
    }

    fn create_rigid_body(&mut self, desc: &RigidBodyDesc) -> BodyHandle {
        let builder = match desc.kind {
            RigidBodyKind::Fixed => RigidBodyBuilder::fixed(),
            RigidBodyKind::Dynamic => RigidBodyBuilder::dynamic()
                .linear_damping(desc.linear_damping.max(self.config.linear_damping))
                .angular_damping(desc.angular_damping.max(self.config.angular_damping))
                .can_sleep(false),
        };
        let body = builder.position(desc.orientation.to_isometry()).build();

        let handle = BodyHandle(self.body_handles.len() as u32);
        self.body_handles.push(self.rigid_body_set.insert(body));
        handle
    }

    fn create_collider(
        &mut self,
        desc: &ColliderDesc,
        body: BodyHandle,
    ) -> Result<ColliderHandle, BackendError> {
        let parent = self
            .body_handle(body)
            .ok_or(BackendError::UnknownBody(body))?;

        let handle = ColliderHandle(self.collider_handles.len() as u32);
        let mut builder = ColliderBuilder::cuboid(
            desc.half_extents.x,
            desc.half_extents.y,
            desc.half_extents.z,
        )
        .friction(self.config.friction)
        .user_data(handle.0 as u128);
        if desc.mass > 0.0 {
            builder = builder.mass(desc.mass);
        }

        let inserted =
            self.collider_set
                .insert_with_parent(builder.build(), parent, &mut self.rigid_body_set);
        self.collider_handles.push(inserted);
        // Keeps ray casts issued before the first step in sync with the new collider.
        self.query_pipeline.update(&self.collider_set);
        Ok(handle)
    }

    fn cast_ray(
        &self,
        ray: &Ray,
        max_distance: f64,
        exclude: Option<ColliderHandle>,
    ) -> Option<RayHit> {
        let mut filter = QueryFilter::default();
        if let Some(excluded) = exclude.and_then(|c| self.collider_handles.get(c.0 as usize)) {
            filter = filter.exclude_collider(*excluded);
        }

        let shape_ray = ShapeRay::new(Point3::from(ray.origin), ray.direction.into_inner());
        let (hit_collider, intersection) = self.query_pipeline.cast_ray_and_get_normal(
            &self.rigid_body_set,
            &self.collider_set,
            &shape_ray,
            max_distance,
            true,
            filter,
        )?;

        let collider = self.collider_set.get(hit_collider)?;
        let normal = if intersection.normal.norm() < DEGENERATE_NORMAL {
            -ray.direction.into_inner()
        } else {
            intersection.normal
        };
        Some(RayHit {
            distance: intersection.time_of_impact,
            normal,
            collider: ColliderHandle(collider.user_data as u32),
        })
    }

    fn step(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }

        let max_substep = self.config.timestep.max(1e-6);
        let substeps = (dt / max_substep).ceil().max(1.0) as usize;
        self.integration_parameters.dt = dt / substeps as f64;

        for _ in 0..substeps {
            self.substep();
        }

        for body in self.rigid_body_set.iter_mut().map(|(_, body)| body) {
            body.reset_forces(false);
            body.reset_torques(false);
        }
    }

    fn resolve_orientation(&self, body: BodyHandle) -> Option<Orientation> {
        self.body(body).map(|b| Orientation::from(*b.position()))
    }

    fn velocity_at_point(&self, body: BodyHandle, point: &Vector3<f64>) -> Option<Vector3<f64>> {
        self.body(body)
            .map(|b| b.velocity_at_point(&Point3::from(*point)))
    }

    fn angular_velocity(&self, body: BodyHandle) -> Option<Vector3<f64>> {
        self.body(body).map(|b| *b.angvel())
    }

    fn apply_force_at_point(
        &mut self,
        body: BodyHandle,
        force: &Vector3<f64>,
        point: &Vector3<f64>,
    ) -> Result<(), BackendError> {
        self.body_mut(body)?
            .add_force_at_point(*force, Point3::from(*point), true);
        Ok(())
    }

    fn apply_torque(&mut self, body: BodyHandle, torque: &Vector3<f64>) -> Result<(), BackendError> {
        self.body_mut(body)?.add_torque(*torque, true);
        Ok(())
    }
}
