// brickbot_core/src/program.rs

//! The robot program: the externally authored logic that drives the robot.

use tracing::debug;

use crate::console::RobotConsole;
use crate::controllers::ev3::{DriveCommand, Ev3, Ev3Part};
use crate::controllers::sensors::Sensor;
use crate::controllers::{PartKey, SenseContext};
use crate::error::ProgramError;
use crate::time::TimingInfo;

/// What a program may touch besides the robot itself.
pub struct ProgramContext<'a> {
    pub sense: SenseContext<'a>,
    pub console: &'a mut RobotConsole,
}

/// A robot program as seen by the world. It runs first in every step and may
/// change actuator targets; it never advances time itself.
pub trait ProgramController: Send + Sync {
    /// Loads the program source. Called once per `World::init`.
    fn init(&mut self, source: &str) -> Result<(), ProgramError>;

    fn step(&mut self, timing: &TimingInfo, robot: &mut Ev3, ctx: &mut ProgramContext<'_>);

    /// Suspends execution for `duration_ms` of simulation time.
    fn pause(&mut self, duration_ms: f64);

    fn is_finished(&self) -> bool;
}

/// A program that does nothing, for worlds driven from the host.
#[derive(Debug, Default)]
pub struct IdleProgram;

impl ProgramController for IdleProgram {
    fn init(&mut self, _source: &str) -> Result<(), ProgramError> {
        Ok(())
    }

    fn step(&mut self, _timing: &TimingInfo, _robot: &mut Ev3, _ctx: &mut ProgramContext<'_>) {}

    fn pause(&mut self, _duration_ms: f64) {}

    fn is_finished(&self) -> bool {
        true
    }
}

// =========================================================================
// == Command Program ==
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Ultrasonic,
    Color,
    Reflected,
}

#[derive(Debug, Clone, PartialEq)]
enum Statement {
    MotorSpeed { motor: Ev3Part, speed: f64 },
    MotorRun { motor: Ev3Part, angle: f64, speed: f64 },
    MotorStop { motor: Ev3Part },
    Drive(DriveCommand),
    Stop,
    RideHeight(f64),
    Pause(f64),
    Log(String),
    Print(Probe),
}

/// A line-oriented robot script.
///
/// ```text
/// # square-ish path
/// drive 0.2 0
/// pause 1000
/// motor leftMotor run 360 180
/// pause 2500
/// print ultrasonic
/// stop
/// ```
///
/// Angles are in degrees, speeds in m/s or deg/s, pauses in milliseconds of
/// simulation time. Statements run in order until a `pause` or the end.
#[derive(Debug, Default)]
pub struct CommandProgram {
    statements: Vec<Statement>,
    cursor: usize,
    resume_at: Option<f64>,
    pending_pause: f64,
}

impl CommandProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    fn execute(statement: &Statement, timing: &TimingInfo, robot: &mut Ev3, ctx: &mut ProgramContext<'_>) {
        match statement {
            Statement::MotorSpeed { motor, speed } => {
                if let Some(motor) = robot.motor_mut(*motor) {
                    motor.set_target_velocity(speed.to_radians());
                }
            }
            Statement::MotorRun { motor, angle, speed } => {
                if let Some(motor) = robot.motor_mut(*motor) {
                    motor.run_to_relative_position(angle.to_radians(), speed.to_radians());
                }
            }
            Statement::MotorStop { motor } => {
                if let Some(motor) = robot.motor_mut(*motor) {
                    motor.stop();
                }
            }
            Statement::Drive(command) => robot.drive(*command),
            Statement::Stop => robot.stop(),
            Statement::RideHeight(height) => robot.set_ride_height(*height),
            Statement::Log(text) => ctx.console.info(timing.elapsed, text.clone()),
            Statement::Print(probe) => {
                let message = match probe {
                    Probe::Ultrasonic => {
                        let reading = robot.ultrasonic_sensor().sense(&ctx.sense);
                        format!("ultrasonic: {:.3} m", reading.value)
                    }
                    Probe::Color => {
                        let reading = robot.color_sensor().sense(&ctx.sense);
                        format!("color: {} ({})", reading.value.color, reading.value.color.code())
                    }
                    Probe::Reflected => {
                        let reading = robot.color_sensor().sense(&ctx.sense);
                        format!("reflected light: {}%", reading.value.reflected_light)
                    }
                };
                ctx.console.info(timing.elapsed, message);
            }
            Statement::Pause(_) => {}
        }
    }
}

impl ProgramController for CommandProgram {
    fn init(&mut self, source: &str) -> Result<(), ProgramError> {
        let statements = parse(source)?;
        debug!("CommandProgram: loaded {} statements", statements.len());
        *self = Self {
            statements,
            ..Self::default()
        };
        Ok(())
    }

    fn step(&mut self, timing: &TimingInfo, robot: &mut Ev3, ctx: &mut ProgramContext<'_>) {
        let now = timing.elapsed;
        if self.pending_pause > 0.0 {
            let from = self.resume_at.map_or(now, |at| at.max(now));
            self.resume_at = Some(from + self.pending_pause);
            self.pending_pause = 0.0;
        }
        if let Some(at) = self.resume_at {
            if now < at {
                return;
            }
            self.resume_at = None;
        }

        while let Some(statement) = self.statements.get(self.cursor) {
            self.cursor += 1;
            if let Statement::Pause(duration) = statement {
                self.resume_at = Some(now + duration);
                return;
            }
            Self::execute(statement, timing, robot, ctx);
        }
    }

    fn pause(&mut self, duration_ms: f64) {
        self.pending_pause += duration_ms.max(0.0);
    }

    fn is_finished(&self) -> bool {
        self.cursor >= self.statements.len() && self.resume_at.is_none() && self.pending_pause == 0.0
    }
}

// --- Parsing ---

fn parse(source: &str) -> Result<Vec<Statement>, ProgramError> {
    source
        .lines()
        .enumerate()
        .filter_map(|(index, raw)| {
            let line = raw.split('#').next().unwrap_or_default().trim();
            (!line.is_empty()).then(|| parse_line(index + 1, line))
        })
        .collect()
}

fn parse_line(line: usize, text: &str) -> Result<Statement, ProgramError> {
    let error = |message: String| ProgramError::Parse { line, message };
    let number = |token: Option<&str>, what: &str| -> Result<f64, ProgramError> {
        let token = token.ok_or_else(|| error(format!("missing {}", what)))?;
        token
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| error(format!("invalid {} '{}'", what, token)))
    };

    let mut tokens = text.split_whitespace();
    let keyword = tokens.next().unwrap_or_default();
    let statement = match keyword {
        "motor" => {
            let name = tokens.next().ok_or_else(|| error("missing motor name".into()))?;
            let motor = Ev3Part::from_name(name)
                .ok_or_else(|| ProgramError::UnknownPart(name.to_string()))?;
            if !Ev3Part::MOTORS.contains(&motor) {
                return Err(error(format!("'{}' is not a motor", name)));
            }
            match tokens.next() {
                Some("speed") => Statement::MotorSpeed {
                    motor,
                    speed: number(tokens.next(), "speed")?,
                },
                Some("run") => Statement::MotorRun {
                    motor,
                    angle: number(tokens.next(), "angle")?,
                    speed: number(tokens.next(), "speed")?,
                },
                Some("stop") => Statement::MotorStop { motor },
                other => {
                    return Err(error(format!(
                        "unknown motor action '{}'",
                        other.unwrap_or_default()
                    )))
                }
            }
        }
        "drive" => {
            let speed = number(tokens.next(), "speed")?;
            let turn = number(tokens.next(), "turn rate")?;
            Statement::Drive(DriveCommand::new(speed, turn.to_radians()))
        }
        "stop" => Statement::Stop,
        "ride_height" => Statement::RideHeight(number(tokens.next(), "height")?),
        "pause" => {
            let duration = number(tokens.next(), "duration")?;
            if duration < 0.0 {
                return Err(error("pause duration must not be negative".into()));
            }
            Statement::Pause(duration)
        }
        "log" => {
            let message = text[keyword.len()..].trim();
            Statement::Log(message.to_string())
        }
        "print" => match tokens.next() {
            Some("ultrasonic") => Statement::Print(Probe::Ultrasonic),
            Some("color") => Statement::Print(Probe::Color),
            Some("reflected") => Statement::Print(Probe::Reflected),
            other => return Err(error(format!("unknown sensor '{}'", other.unwrap_or_default()))),
        },
        other => return Err(error(format!("unknown statement '{}'", other))),
    };

    // `log` swallows the rest of the line; everything else must be fully consumed.
    if keyword != "log" {
        if let Some(extra) = tokens.next() {
            return Err(error(format!("unexpected '{}'", extra)));
        }
    }
    Ok(statement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::physics::RapierPhysics;
    use crate::backend::render::HeadlessRenderer;
    use crate::config::{Ev3Config, PhysicsConfig};
    use approx::assert_abs_diff_eq;

    struct Harness {
        physics: RapierPhysics,
        render: HeadlessRenderer,
        robot: Ev3,
        console: RobotConsole,
    }

    impl Harness {
        fn new() -> Self {
            let mut physics = RapierPhysics::new(PhysicsConfig::default());
            let mut render = HeadlessRenderer::new();
            let robot = Ev3::assemble(&mut physics, &mut render, &Ev3Config::default()).unwrap();
            Self {
                physics,
                render,
                robot,
                console: RobotConsole::default(),
            }
        }

        fn run(&mut self, program: &mut dyn ProgramController, elapsed: f64) {
            let timing = TimingInfo {
                timestamp: elapsed,
                elapsed,
                frame_duration: 10.0,
                frame: 0,
            };
            let mut ctx = ProgramContext {
                sense: SenseContext {
                    physics: &self.physics,
                    render: &self.render,
                    elapsed,
                },
                console: &mut self.console,
            };
            program.step(&timing, &mut self.robot, &mut ctx);
        }
    }

    #[test]
    fn parse_errors_report_the_line() {
        let mut program = CommandProgram::new();
        let err = program.init("# header\nstop\ndrive fast 0\n").unwrap_err();
        assert_eq!(
            err,
            ProgramError::Parse {
                line: 3,
                message: "invalid speed 'fast'".to_string()
            }
        );
    }

    #[test]
    fn unknown_and_non_motor_parts_are_rejected() {
        let mut program = CommandProgram::new();
        assert_eq!(
            program.init("motor middleMotor speed 10").unwrap_err(),
            ProgramError::UnknownPart("middleMotor".to_string())
        );
        assert!(matches!(
            program.init("motor colorSensor stop"),
            Err(ProgramError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn statements_run_until_a_pause() {
        let mut harness = Harness::new();
        let mut program = CommandProgram::new();
        program
            .init("motor leftMotor speed 180\npause 100\nmotor rightMotor speed -90 # reverse\nlog done")
            .unwrap();
        assert_eq!(program.len(), 4);

        harness.run(&mut program, 0.0);
        assert_abs_diff_eq!(harness.robot.left_motor().target_velocity(), std::f64::consts::PI);
        assert_abs_diff_eq!(harness.robot.right_motor().target_velocity(), 0.0);

        harness.run(&mut program, 50.0);
        assert_abs_diff_eq!(harness.robot.right_motor().target_velocity(), 0.0);
        assert!(!program.is_finished());

        harness.run(&mut program, 100.0);
        assert_abs_diff_eq!(
            harness.robot.right_motor().target_velocity(),
            -std::f64::consts::FRAC_PI_2
        );
        assert!(program.is_finished());
        assert_eq!(harness.console.last().map(|e| e.message.as_str()), Some("done"));
    }

    #[test]
    fn external_pause_delays_the_next_statement() {
        let mut harness = Harness::new();
        let mut program = CommandProgram::new();
        program.init("pause 0\nstop\nlog resumed").unwrap();

        harness.run(&mut program, 0.0);
        program.pause(200.0);
        harness.run(&mut program, 100.0);
        assert!(harness.console.is_empty());
        harness.run(&mut program, 300.0);
        assert_eq!(harness.console.len(), 1);
    }

    #[test]
    fn print_writes_sensor_readings_to_the_console() {
        let mut harness = Harness::new();
        let mut program = CommandProgram::new();
        program.init("print ultrasonic\nprint color\nprint reflected").unwrap();
        harness.run(&mut program, 0.0);

        let messages: Vec<_> = harness.console.entries().map(|e| e.message.clone()).collect();
        assert_eq!(messages[0], "ultrasonic: 2.550 m");
        assert!(messages[1].starts_with("color: "));
        assert!(messages[2].starts_with("reflected light: "));
    }
}
