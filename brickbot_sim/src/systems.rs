// brickbot_sim/src/systems.rs

use bevy::prelude::*;
use brickbot_core::controllers::ev3::DriveCommand;
use tracing::info;

use crate::SimulationWorld;

/// Forward speed while an arrow key is held, in m/s.
pub const DRIVE_SPEED: f64 = 0.15;
/// Yaw rate while an arrow key is held, in rad/s.
pub const TURN_RATE: f64 = 1.5;

const ARROWS: [KeyCode; 4] = [
    KeyCode::ArrowUp,
    KeyCode::ArrowDown,
    KeyCode::ArrowLeft,
    KeyCode::ArrowRight,
];

pub fn setup_scene(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.8, 0.7, -0.8).looking_at(Vec3::new(0.0, 0.0, 0.3), Vec3::Y),
    ));
    commands.spawn((
        DirectionalLight {
            illuminance: 8_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(2.0, 4.0, -1.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

/// The drive command the held arrow keys ask for.
pub fn drive_command(keys: &ButtonInput<KeyCode>) -> DriveCommand {
    let axis = |positive: KeyCode, negative: KeyCode| {
        f64::from(keys.pressed(positive) as u8) - f64::from(keys.pressed(negative) as u8)
    };
    DriveCommand::new(
        DRIVE_SPEED * axis(KeyCode::ArrowUp, KeyCode::ArrowDown),
        TURN_RATE * axis(KeyCode::ArrowLeft, KeyCode::ArrowRight),
    )
}

/// Space toggles start/pause. Arrow keys drive; releasing them stops the robot.
/// With no arrow key involved the robot is left to its program.
pub fn keyboard_control(keys: Res<ButtonInput<KeyCode>>, mut sim: ResMut<SimulationWorld>) {
    let world = sim.world_mut();

    if keys.just_pressed(KeyCode::Space) {
        if world.is_running() {
            world.pause();
        } else {
            world.start();
        }
    }

    if !keys.any_pressed(ARROWS) && !keys.any_just_released(ARROWS) {
        return;
    }
    let command = drive_command(&keys);
    if let Some(robot) = world.robot_mut() {
        if robot.last_drive() != Some(command) {
            robot.drive(command);
        }
    }
}

pub fn step_world(time: Res<Time>, mut sim: ResMut<SimulationWorld>) {
    sim.world_mut().step(time.elapsed_secs_f64() * 1000.0);
}

/// Logs the robot's telemetry once per simulated second.
pub fn log_telemetry(sim: Res<SimulationWorld>, mut last_second: Local<u64>) {
    let world = sim.world();
    let second = (world.elapsed_time() / 1000.0) as u64;
    if second == *last_second {
        return;
    }
    *last_second = second;
    if let Some(telemetry) = world.telemetry() {
        info!("{}", telemetry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn no_keys_means_stop() {
        let keys = ButtonInput::<KeyCode>::default();
        assert_eq!(drive_command(&keys), DriveCommand::stop());
    }

    #[test]
    fn arrow_keys_combine() {
        let mut keys = ButtonInput::<KeyCode>::default();
        keys.press(KeyCode::ArrowUp);
        keys.press(KeyCode::ArrowLeft);
        let command = drive_command(&keys);
        assert_abs_diff_eq!(command.linear_speed, DRIVE_SPEED);
        assert_abs_diff_eq!(command.turn_rate, TURN_RATE);

        // Opposite keys cancel out.
        keys.press(KeyCode::ArrowDown);
        keys.press(KeyCode::ArrowRight);
        assert_eq!(drive_command(&keys), DriveCommand::stop());
    }
}
