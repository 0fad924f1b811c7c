// brickbot_core/src/world.rs

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use nalgebra::{UnitQuaternion, Vector3};
use tracing::{debug, info, trace, warn};

use crate::backend::physics::RapierPhysics;
use crate::backend::render::HeadlessRenderer;
use crate::backend::{Material, MeshShape, PhysicsBackend, RayHit, RenderBackend, RenderSurface};
use crate::config::SimulationConfig;
use crate::console::RobotConsole;
use crate::controllers::ev3::{Ev3, Ev3Telemetry};
use crate::controllers::{ControllerMap, PartRef, SenseContext};
use crate::entity::EntityCuboidOptions;
use crate::error::{SimError, SimResult};
use crate::geometry::Ray;
use crate::physics_object::{add_cuboid_physics_object, CuboidObjectOptions, PhysicsObject};
use crate::program::{ProgramContext, ProgramController};
use crate::time::{TimeController, TimeoutCallback, TimeoutId};

/// Thickness of the render-only paper sheets laid on the floor.
const PAPER_THICKNESS: f64 = 0.001;

// =========================================================================
// == State ==
// =========================================================================

/// Lifecycle of a [`World`].
///
/// `Uninitialized -> Loading -> Ready <-> Running`. `Loading` is left only by
/// a successful `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorldState {
    #[default]
    Uninitialized,
    Loading,
    Ready,
    Running,
}

// =========================================================================
// == Factory ==
// =========================================================================

/// Clears the factory's live flag when the world holding it is dropped.
struct LiveToken(Arc<AtomicBool>);

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Hands out at most one live [`World`] at a time.
///
/// A second request while the first world is alive fails with
/// [`SimError::DuplicateWorld`]; the first world is not touched. Dropping the
/// world frees the slot.
#[derive(Debug, Default)]
pub struct WorldFactory {
    live: Arc<AtomicBool>,
}

impl WorldFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide factory.
    pub fn global() -> &'static WorldFactory {
        static GLOBAL: OnceLock<WorldFactory> = OnceLock::new();
        GLOBAL.get_or_init(WorldFactory::new)
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub fn create(
        &self,
        config: SimulationConfig,
        physics: Box<dyn PhysicsBackend>,
        render: Box<dyn RenderBackend>,
        program: Box<dyn ProgramController>,
    ) -> SimResult<World> {
        if self
            .live
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("WorldFactory: refused to create a second world");
            return Err(SimError::DuplicateWorld);
        }

        debug!("WorldFactory: world created");
        Ok(World {
            state: WorldState::Uninitialized,
            time: TimeController::new(&config.time),
            config,
            physics,
            render,
            program,
            console: RobotConsole::default(),
            objects: Vec::new(),
            robot: None,
            _token: LiveToken(Arc::clone(&self.live)),
        })
    }

    /// A world backed by [`RapierPhysics`] and [`HeadlessRenderer`].
    pub fn create_headless(
        &self,
        config: SimulationConfig,
        program: Box<dyn ProgramController>,
    ) -> SimResult<World> {
        let physics = Box::new(RapierPhysics::new(config.physics));
        self.create(config, physics, Box::new(HeadlessRenderer::new()), program)
    }
}

// =========================================================================
// == World ==
// =========================================================================

/// The simulation: backends, environment, robot, program and clock, advanced
/// one fixed-order step per frame while running.
///
/// The world never schedules itself; the host calls [`World::step`] once per
/// frame and decides whether to keep going.
pub struct World {
    state: WorldState,
    config: SimulationConfig,
    physics: Box<dyn PhysicsBackend>,
    render: Box<dyn RenderBackend>,
    program: Box<dyn ProgramController>,
    time: TimeController,
    console: RobotConsole,
    objects: Vec<PhysicsObject>,
    robot: Option<Ev3>,
    _token: LiveToken,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("state", &self.state)
            .field("elapsed", &self.time.elapsed())
            .field("objects", &self.objects.len())
            .field("robot", &self.robot.is_some())
            .finish_non_exhaustive()
    }
}

impl World {
    // --- Lifecycle ---

    /// Builds the world from scratch: backends, program, environment, robot
    /// and clock. Ignored while running.
    ///
    /// On failure the world stays in `Loading`. Retrying is up to the caller.
    pub fn init(&mut self, source: &str) -> SimResult<()> {
        if self.state == WorldState::Running {
            debug!("World: init ignored while running");
            return Ok(());
        }

        self.state = WorldState::Loading;
        info!("World: loading");
        self.robot = None;
        self.objects.clear();

        self.physics
            .init()
            .map_err(|source| SimError::BackendInit { backend: "physics", source })?;
        self.render
            .init()
            .map_err(|source| SimError::BackendInit { backend: "render", source })?;
        self.program.init(source)?;

        self.build_environment()?;
        let mut robot = Ev3::assemble(&mut *self.physics, &mut *self.render, &self.config.robot)?;

        self.time.reset();
        self.console.clear();

        robot.sync_parts(&*self.physics, &mut *self.render);
        self.robot = Some(robot);
        self.render.draw();

        self.state = WorldState::Ready;
        info!(
            "World: ready ({} environment objects)",
            self.objects.len()
        );
        Ok(())
    }

    fn build_environment(&mut self) -> SimResult<()> {
        let env = &self.config.environment;
        for cuboid in std::iter::once(&env.floor).chain(env.obstacles.iter()) {
            let object = add_cuboid_physics_object(
                &mut *self.physics,
                &mut *self.render,
                &CuboidObjectOptions {
                    entity: EntityCuboidOptions::fixed(
                        cuboid.pose.to_orientation(),
                        cuboid.width,
                        cuboid.height,
                        cuboid.length,
                    ),
                    color: cuboid.color,
                    wireframe: false,
                },
            )?;
            self.objects.push(object);
        }

        // Papers only exist for the renderer: the colour sensor sees them,
        // nothing collides with them.
        let floor_top = env.floor.pose.translation.y + env.floor.height / 2.0;
        for (index, paper) in env.papers.iter().enumerate() {
            let mesh = self.render.create_mesh(
                MeshShape::Cuboid {
                    width: paper.width,
                    height: PAPER_THICKNESS,
                    length: paper.length,
                },
                Material::solid(paper.color),
            );
            self.render.add_to_scene(mesh);
            // Later papers lie on top of earlier ones.
            let y = floor_top + PAPER_THICKNESS * (index as f64 + 0.5);
            self.render.set_transform(
                mesh,
                &Vector3::new(paper.position[0], y, paper.position[1]),
                &UnitQuaternion::identity(),
            );
        }
        Ok(())
    }

    pub fn start(&mut self) {
        if self.state != WorldState::Ready {
            debug!("World: start ignored in state {:?}", self.state);
            return;
        }
        // The first frame after (re)starting has zero duration.
        self.time.halt();
        self.state = WorldState::Running;
        info!("World: running at {:.1} ms", self.time.elapsed());
    }

    /// Takes effect before the next step. Elapsed time is kept.
    pub fn pause(&mut self) {
        if self.state != WorldState::Running {
            debug!("World: pause ignored in state {:?}", self.state);
            return;
        }
        self.time.halt();
        self.state = WorldState::Ready;
        info!("World: paused at {:.1} ms", self.time.elapsed());
    }

    pub fn stop(&mut self) {
        self.pause();
    }

    /// Runs one frame. Returns `false`, touching nothing, unless running.
    ///
    /// Order: program, robot orchestration, actuators, physics, visual sync,
    /// draw, clock.
    pub fn step(&mut self, timestamp: f64) -> bool {
        if self.state != WorldState::Running {
            trace!("World: step ignored in state {:?}", self.state);
            return false;
        }
        let Some(robot) = self.robot.as_mut() else {
            return false;
        };

        let timing = self.time.begin_frame(timestamp);

        let mut ctx = ProgramContext {
            sense: SenseContext {
                physics: &*self.physics,
                render: &*self.render,
                elapsed: timing.elapsed,
            },
            console: &mut self.console,
        };
        self.program.step(&timing, robot, &mut ctx);

        robot.update(&timing);
        robot.fixed_update_parts(&mut *self.physics, &timing);

        self.physics.step(timing.dt_seconds());

        for object in &mut self.objects {
            object.step(&*self.physics, &mut *self.render);
        }
        robot.sync_parts(&*self.physics, &mut *self.render);

        self.render.draw();

        if self.state == WorldState::Running {
            for callback in self.time.commit(&timing) {
                callback();
            }
        }
        true
    }

    /// Redraws the last resolved state without advancing physics. Useful after
    /// attaching a new output while paused.
    pub fn render_frame(&mut self) -> bool {
        if !matches!(self.state, WorldState::Ready | WorldState::Running) {
            return false;
        }
        for object in &mut self.objects {
            object.step(&*self.physics, &mut *self.render);
        }
        if let Some(robot) = self.robot.as_mut() {
            robot.sync_parts(&*self.physics, &mut *self.render);
        }
        self.render.draw();
        true
    }

    pub fn set_renderer_output(&mut self, surface: RenderSurface) {
        self.render.attach_output(surface);
        self.render_frame();
    }

    // --- Accessors ---

    pub fn state(&self) -> WorldState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == WorldState::Running
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Simulation time in milliseconds. Frozen while paused.
    pub fn elapsed_time(&self) -> f64 {
        self.time.elapsed()
    }

    /// Duration of the last frame in milliseconds.
    pub fn frame_time(&self) -> f64 {
        self.time.frame_time()
    }

    pub fn frame(&self) -> u64 {
        self.time.frame()
    }

    pub fn robot(&self) -> Option<&Ev3> {
        self.robot.as_ref()
    }

    pub fn robot_mut(&mut self) -> Option<&mut Ev3> {
        self.robot.as_mut()
    }

    /// Looks a robot part up by name.
    pub fn part(&self, name: &str) -> SimResult<PartRef<'_>> {
        self.robot.as_ref().ok_or(SimError::NotInitialized)?.get(name)
    }

    pub fn sense_context(&self) -> SenseContext<'_> {
        SenseContext {
            physics: &*self.physics,
            render: &*self.render,
            elapsed: self.time.elapsed(),
        }
    }

    pub fn telemetry(&self) -> Option<Ev3Telemetry> {
        let ctx = self.sense_context();
        self.robot.as_ref().map(|robot| robot.telemetry(&ctx))
    }

    pub fn console(&self) -> &RobotConsole {
        &self.console
    }

    pub fn cast_ray(&self, ray: &Ray, max_distance: f64) -> Option<RayHit> {
        self.physics.cast_ray(ray, max_distance, None)
    }

    /// Adds a box to the environment. Cleared by the next `init`.
    pub fn add_cuboid(&mut self, options: &CuboidObjectOptions) -> SimResult<&PhysicsObject> {
        if !matches!(self.state, WorldState::Ready | WorldState::Running) {
            return Err(SimError::NotInitialized);
        }
        let object = add_cuboid_physics_object(&mut *self.physics, &mut *self.render, options)?;
        self.objects.push(object);
        Ok(&self.objects[self.objects.len() - 1])
    }

    pub fn physics_objects(&self) -> &[PhysicsObject] {
        &self.objects
    }

    pub fn physics_backend(&self) -> &dyn PhysicsBackend {
        &*self.physics
    }

    pub fn render_backend(&self) -> &dyn RenderBackend {
        &*self.render
    }

    pub fn render_backend_mut(&mut self) -> &mut dyn RenderBackend {
        &mut *self.render
    }

    /// Runs `callback` once `delay_ms` of simulation time has passed.
    pub fn set_timeout(&mut self, callback: TimeoutCallback, delay_ms: f64) -> TimeoutId {
        self.time.set_timeout(callback, delay_ms)
    }

    pub fn clear_timeout(&mut self, id: TimeoutId) -> bool {
        self.time.clear_timeout(id)
    }

    /// Suspends the robot program for `duration_ms` of simulation time.
    pub fn pause_program(&mut self, duration_ms: f64) {
        self.program.pause(duration_ms);
    }

    pub fn is_program_finished(&self) -> bool {
        self.program.is_finished()
    }
}
