// brickbot_sim/src/main.rs

use std::fs;
use std::process::ExitCode;

use bevy::log::LogPlugin;
use bevy::prelude::*;
use brickbot_core::backend::physics::RapierPhysics;
use brickbot_core::backend::RenderSurface;
use brickbot_core::config::SimulationConfig;
use brickbot_core::prelude::{CommandProgram, IdleProgram, ProgramController, WorldFactory};
use brickbot_core::world::World;
use clap::Parser;
use tracing::{error, info};

use brickbot_sim::cli::Cli;
use brickbot_sim::config::load_scenario;
use brickbot_sim::error::{HostError, HostResult};
use brickbot_sim::headless::HeadlessRun;
use brickbot_sim::render::BevyRenderBackend;
use brickbot_sim::{logging, BrickbotSimulationPlugin, SimulationWorld};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> HostResult<()> {
    let config = load_scenario(cli.scenario.as_deref())?;
    let (program, source): (Box<dyn ProgramController>, String) = match &cli.program {
        Some(path) => {
            let source = fs::read_to_string(path).map_err(|source| HostError::Program {
                path: path.clone(),
                source,
            })?;
            info!("Loaded program from: {}", path.display());
            (Box::new(CommandProgram::new()), source)
        }
        None => (Box::new(IdleProgram), String::new()),
    };

    if cli.headless {
        let frame_ms = cli.frame_ms().ok_or(HostError::FrameRate(cli.frame_rate))?;
        let mut world = WorldFactory::global().create_headless(config, program)?;
        world.init(&source)?;
        if let Some(telemetry) = HeadlessRun::new(cli.frames, frame_ms).run(&mut world) {
            info!("Final: {}", telemetry);
        }
        return Ok(());
    }

    let world = windowed_world(config, program, &source)?;
    run_windowed(world);
    Ok(())
}

fn windowed_world(
    config: SimulationConfig,
    program: Box<dyn ProgramController>,
    source: &str,
) -> HostResult<World> {
    let physics = Box::new(RapierPhysics::new(config.physics));
    let mut world = WorldFactory::global().create(
        config,
        physics,
        Box::new(BevyRenderBackend::new()),
        program,
    )?;
    world.init(source)?;
    world.set_renderer_output(RenderSurface::default());
    world.start();
    Ok(world)
}

fn run_windowed(world: World) {
    let surface = RenderSurface::default();
    info!("Starting Brickbot. Space pauses, arrow keys drive.");

    let exit = App::new()
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: surface.label,
                        resolution: (surface.width as f32, surface.height as f32).into(),
                        ..default()
                    }),
                    ..default()
                })
                // Logging is already set up by `logging::init`.
                .disable::<LogPlugin>(),
        )
        .insert_resource(ClearColor(Color::srgb(0.75, 0.8, 0.85)))
        .insert_resource(SimulationWorld::new(world))
        .add_plugins(BrickbotSimulationPlugin)
        .run();
    if exit.is_error() {
        error!("Brickbot exited with {:?}", exit);
    }
}
