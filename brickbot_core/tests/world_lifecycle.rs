// brickbot_core/tests/world_lifecycle.rs

use approx::assert_abs_diff_eq;
use brickbot_core::backend::render::HeadlessRenderer;
use brickbot_core::backend::{Material, MeshShape, RenderSurface};
use brickbot_core::config::{CuboidConfig, Pose};
use brickbot_core::geometry::Ray;
use brickbot_core::prelude::*;
use nalgebra::{UnitQuaternion, Vector3};
use std::any::Any;

/// A renderer whose `init` fails a set number of times before it recovers.
struct FlakyRenderer {
    inner: HeadlessRenderer,
    failures_left: u32,
}

impl RenderBackend for FlakyRenderer {
    fn init(&mut self) -> Result<(), BackendError> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(BackendError::Init("no graphics device".to_string()));
        }
        self.inner.init()
    }

    fn create_mesh(&mut self, shape: MeshShape, material: Material) -> MeshHandle {
        self.inner.create_mesh(shape, material)
    }

    fn add_to_scene(&mut self, mesh: MeshHandle) {
        self.inner.add_to_scene(mesh)
    }

    fn set_transform(&mut self, mesh: MeshHandle, position: &Vector3<f64>, rotation: &UnitQuaternion<f64>) {
        self.inner.set_transform(mesh, position, rotation)
    }

    fn draw(&mut self) {
        self.inner.draw()
    }

    fn attach_output(&mut self, surface: RenderSurface) {
        self.inner.attach_output(surface)
    }

    fn sample_color(&self, ray: &Ray, max_distance: f64) -> Option<Rgb> {
        self.inner.sample_color(ray, max_distance)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn headless(factory: &WorldFactory) -> World {
    factory
        .create_headless(SimulationConfig::default(), Box::new(IdleProgram))
        .expect("first world")
}

fn run_frames(world: &mut World, from: f64, frames: usize, frame_ms: f64) -> f64 {
    let mut t = from;
    for _ in 0..frames {
        world.step(t);
        t += frame_ms;
    }
    t
}

#[test]
fn pause_then_start_resumes_from_the_same_elapsed_time() {
    let factory = WorldFactory::new();
    let mut world = headless(&factory);
    world.init("").unwrap();
    world.start();
    let t = run_frames(&mut world, 0.0, 30, 16.0);
    let paused_at = world.elapsed_time();
    assert!(paused_at > 0.0);

    world.pause();
    assert_eq!(world.state(), WorldState::Ready);
    // Frames keep arriving while paused; none of them count.
    run_frames(&mut world, t, 30, 16.0);
    assert_abs_diff_eq!(world.elapsed_time(), paused_at);

    world.start();
    // The first frame after resuming has zero duration, whatever the wall-clock gap.
    world.step(t + 60_000.0);
    assert_abs_diff_eq!(world.elapsed_time(), paused_at);
    world.step(t + 60_016.0);
    assert_abs_diff_eq!(world.elapsed_time(), paused_at + 16.0);
}

#[test]
fn second_world_is_refused_and_first_is_untouched() {
    let factory = WorldFactory::new();
    let mut first = headless(&factory);
    first.init("").unwrap();
    first.start();
    run_frames(&mut first, 0.0, 5, 16.0);
    let elapsed = first.elapsed_time();

    let second = factory.create_headless(SimulationConfig::default(), Box::new(IdleProgram));
    assert!(matches!(second, Err(SimError::DuplicateWorld)));
    assert_eq!(first.state(), WorldState::Running);
    assert_abs_diff_eq!(first.elapsed_time(), elapsed);

    drop(first);
    assert!(!factory.is_live());
    assert!(factory
        .create_headless(SimulationConfig::default(), Box::new(IdleProgram))
        .is_ok());
}

#[test]
fn failed_init_stays_loading_until_retried() {
    let factory = WorldFactory::new();
    let config = SimulationConfig::default();
    let physics = Box::new(RapierPhysics::new(config.physics));
    let render = Box::new(FlakyRenderer {
        inner: HeadlessRenderer::new(),
        failures_left: 1,
    });
    let mut world = factory
        .create(config, physics, render, Box::new(IdleProgram))
        .unwrap();

    let err = world.init("").unwrap_err();
    assert!(matches!(err, SimError::BackendInit { backend: "render", .. }));
    assert_eq!(world.state(), WorldState::Loading);
    assert!(world.robot().is_none());

    // Not ready, so nothing starts or steps.
    world.start();
    assert_eq!(world.state(), WorldState::Loading);
    assert!(!world.step(0.0));

    world.init("").unwrap();
    assert_eq!(world.state(), WorldState::Ready);
}

#[test]
fn program_parse_error_is_reported_from_init() {
    let factory = WorldFactory::new();
    let mut world = factory
        .create_headless(SimulationConfig::default(), Box::new(CommandProgram::new()))
        .unwrap();
    let err = world.init("drive 0.1 0\njump").unwrap_err();
    assert!(matches!(err, SimError::Program(ProgramError::Parse { line: 2, .. })));
    assert_eq!(world.state(), WorldState::Loading);
}

#[test]
fn controller_map_lookup_by_name() {
    let factory = WorldFactory::new();
    let mut world = headless(&factory);
    assert!(matches!(world.part("frontLeftWheel"), Err(SimError::NotInitialized)));

    world.init("").unwrap();
    let wheel = world.part("frontLeftWheel").unwrap();
    assert!(wheel.as_wheel().is_some());

    match world.part("nonexistentPart") {
        Err(SimError::ControllerNotFound { name }) => assert_eq!(name, "nonexistentPart"),
        other => panic!("expected ControllerNotFound, got {:?}", other.map(|p| p.kind())),
    }
}

#[test]
fn ultrasonic_reads_sentinel_in_empty_space_and_obstacle_at_half_range() {
    let factory = WorldFactory::new();
    let mut world = headless(&factory);
    world.init("").unwrap();

    let robot = world.robot().unwrap();
    let max_range = robot.ultrasonic_sensor().max_range();
    let reading = robot.ultrasonic_sensor().sense(&world.sense_context());
    assert_abs_diff_eq!(reading.value, max_range);
    drop(world);

    let mut config = SimulationConfig::default();
    let mount = config.robot.ultrasonic_sensor.displacement.0 + config.robot.chassis.pose.translation;
    let face = mount.z + max_range / 2.0;
    config.environment.obstacles.push(CuboidConfig {
        pose: Pose::at(mount.x, mount.y, face + 0.05),
        width: 0.5,
        height: 0.3,
        length: 0.1,
        color: Rgb::BLACK,
    });
    let mut world = factory
        .create_headless(config, Box::new(IdleProgram))
        .unwrap();
    world.init("").unwrap();
    let reading = world
        .robot()
        .unwrap()
        .ultrasonic_sensor()
        .sense(&world.sense_context());
    assert!(reading.value < max_range);
    assert_abs_diff_eq!(reading.value, max_range / 2.0, epsilon = 1e-9);
}

#[test]
fn attaching_an_output_rerenders_without_moving_anything() {
    let factory = WorldFactory::new();
    let mut world = headless(&factory);
    world.init("").unwrap();
    let pose = *world.robot().unwrap().chassis().orientation();

    world.set_renderer_output(RenderSurface {
        label: "monitor".to_string(),
        width: 320,
        height: 240,
    });

    let renderer = world
        .render_backend()
        .as_any()
        .downcast_ref::<HeadlessRenderer>()
        .unwrap();
    assert_eq!(renderer.output().map(|s| s.width), Some(320));
    assert_eq!(renderer.frames_drawn(), 2);
    assert_eq!(*world.robot().unwrap().chassis().orientation(), pose);
    assert_abs_diff_eq!(world.elapsed_time(), 0.0);
}

#[test]
fn command_program_drives_the_robot_forward() {
    let factory = WorldFactory::new();
    let mut world = factory
        .create_headless(SimulationConfig::default(), Box::new(CommandProgram::new()))
        .unwrap();
    world
        .init("log start\ndrive 0.15 0\npause 2000\nstop\nlog done")
        .unwrap();
    world.start();
    run_frames(&mut world, 0.0, 180, 1000.0 / 60.0);

    let position = world.robot().unwrap().chassis().orientation().position;
    assert!(position.z > 0.1, "robot only reached z = {}", position.z);
    assert!(position.y > 0.0, "chassis fell through the floor: y = {}", position.y);
    assert!(world.is_program_finished());
    let messages: Vec<_> = world.console().entries().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["start", "done"]);
}
