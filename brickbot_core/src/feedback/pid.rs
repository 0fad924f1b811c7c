// brickbot_core/src/feedback/pid.rs

use serde::Deserialize;

/// Gains and output limits of a PID loop, as written in config files.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PidConfig {
    pub proportional_gain: f64,
    #[serde(default)]
    pub integral_gain: f64,
    #[serde(default)]
    pub derivative_gain: f64,
    /// Lower bound of the controller output. Unbounded if absent.
    #[serde(default)]
    pub output_min: Option<f64>,
    /// Upper bound of the controller output. Unbounded if absent.
    #[serde(default)]
    pub output_max: Option<f64>,
}

impl PidConfig {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            proportional_gain: kp,
            integral_gain: ki,
            derivative_gain: kd,
            output_min: None,
            output_max: None,
        }
    }

    /// Symmetric output clamp `[-limit, limit]`.
    pub fn with_output_limit(self, limit: f64) -> Self {
        self.with_output_range(-limit.abs(), limit.abs())
    }

    pub fn with_output_range(mut self, min: f64, max: f64) -> Self {
        self.output_min = Some(min);
        self.output_max = Some(max);
        self
    }

    fn clamp(&self, raw: f64) -> f64 {
        let lower = self.output_min.map_or(raw, |min| raw.max(min));
        self.output_max.map_or(lower, |max| lower.min(max))
    }
}

/// The values produced by the most recent `calculate` call, for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PidSnapshot {
    pub target: f64,
    pub measured: f64,
    pub error: f64,
    pub integral: f64,
    pub derivative: f64,
    pub output: f64,
    /// True if the output hit the clamp and integration was suppressed.
    pub saturated: bool,
}

/// A stateful proportional-integral-derivative controller.
///
/// Time is passed in explicitly (seconds of simulation time), so the controller
/// never reads a clock itself. The first call after construction or `reset`
/// has no time delta: it produces a purely proportional output.
#[derive(Debug, Clone)]
pub struct PidController {
    config: PidConfig,
    integral: f64,
    previous_error: Option<f64>,
    previous_time: Option<f64>,
    last: PidSnapshot,
}

impl PidController {
    pub fn new(config: PidConfig) -> Self {
        Self {
            config,
            integral: 0.0,
            previous_error: None,
            previous_time: None,
            last: PidSnapshot::default(),
        }
    }

    pub fn config(&self) -> &PidConfig {
        &self.config
    }

    /// Runs one control decision and returns the clamped output.
    pub fn calculate(&mut self, measured: f64, target: f64, time: f64) -> f64 {
        let error = target - measured;

        // No usable dt on the first call or when time did not move forward.
        let dt = self
            .previous_time
            .map(|previous| time - previous)
            .filter(|dt| *dt > 0.0);

        let (candidate_integral, derivative) = match dt {
            Some(dt) => (
                self.integral + error * dt,
                self.previous_error.map_or(0.0, |previous| (error - previous) / dt),
            ),
            None => (self.integral, 0.0),
        };

        let raw = self.config.proportional_gain * error
            + self.config.integral_gain * candidate_integral
            + self.config.derivative_gain * derivative;
        let output = self.config.clamp(raw);
        let saturated = output != raw;

        // Anti-windup: a saturated step does not accumulate.
        if !saturated {
            self.integral = candidate_integral;
        }

        self.previous_error = Some(error);
        self.previous_time = Some(time);
        self.last = PidSnapshot {
            target,
            measured,
            error,
            integral: self.integral,
            derivative,
            output,
            saturated,
        };
        output
    }

    pub fn snapshot(&self) -> PidSnapshot {
        self.last
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = None;
        self.previous_time = None;
        self.last = PidSnapshot::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const DT: f64 = 0.01;

    /// First-order plant `x' = (u - x) / tau`, integrated with explicit Euler.
    fn run_first_order_plant(pid: &mut PidController, target: f64, steps: usize) -> f64 {
        let tau = 0.5;
        let mut x = 0.0;
        for i in 0..steps {
            let u = pid.calculate(x, target, i as f64 * DT);
            x += (u - x) / tau * DT;
        }
        x
    }

    #[test]
    fn first_call_is_purely_proportional() {
        let mut pid = PidController::new(PidConfig::new(2.0, 100.0, 100.0));
        let out = pid.calculate(1.0, 3.0, 0.0);
        assert_abs_diff_eq!(out, 4.0);
        assert_abs_diff_eq!(pid.snapshot().derivative, 0.0);
        assert_abs_diff_eq!(pid.snapshot().integral, 0.0);
    }

    #[test]
    fn repeated_timestamp_does_not_divide_by_zero() {
        let mut pid = PidController::new(PidConfig::new(1.0, 1.0, 1.0));
        pid.calculate(0.0, 1.0, 0.5);
        let out = pid.calculate(0.5, 1.0, 0.5);
        assert!(out.is_finite());
        assert_abs_diff_eq!(pid.snapshot().derivative, 0.0);
    }

    #[test]
    fn integral_and_derivative_follow_time_delta() {
        let mut pid = PidController::new(PidConfig::new(0.0, 1.0, 1.0));
        pid.calculate(0.0, 1.0, 0.0); // error 1
        let out = pid.calculate(0.5, 1.0, 0.5); // error 0.5, dt 0.5
        let snap = pid.snapshot();
        assert_abs_diff_eq!(snap.integral, 0.25);
        assert_abs_diff_eq!(snap.derivative, -1.0);
        assert_abs_diff_eq!(out, 0.25 - 1.0);
    }

    #[test]
    fn saturated_output_stops_integral_windup() {
        let mut pid = PidController::new(PidConfig::new(1.0, 1.0, 0.0).with_output_limit(0.5));
        for i in 0..100 {
            let out = pid.calculate(0.0, 10.0, i as f64 * DT);
            assert!(out <= 0.5);
        }
        let snap = pid.snapshot();
        assert!(snap.saturated);
        assert_abs_diff_eq!(snap.integral, 0.0);
    }

    #[test]
    fn pi_loop_converges_on_constant_target() {
        let mut pid = PidController::new(PidConfig::new(1.5, 2.0, 0.05).with_output_limit(10.0));
        let x = run_first_order_plant(&mut pid, 3.0, 3000);
        assert_abs_diff_eq!(x, 3.0, epsilon = 1e-3);
    }

    #[test]
    fn proportional_only_loop_keeps_steady_state_error() {
        let mut pid = PidController::new(PidConfig::new(1.0, 0.0, 0.0));
        let x = run_first_order_plant(&mut pid, 2.0, 3000);
        // x = kp / (1 + kp) * target for this plant.
        assert_abs_diff_eq!(x, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn reset_forgets_history() {
        let mut pid = PidController::new(PidConfig::new(1.0, 1.0, 1.0));
        pid.calculate(0.0, 1.0, 0.0);
        pid.calculate(0.0, 1.0, 1.0);
        pid.reset();
        assert_eq!(pid.snapshot(), PidSnapshot::default());
        assert_abs_diff_eq!(pid.calculate(0.0, 1.0, 5.0), 1.0);
    }
}
