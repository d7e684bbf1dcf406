//! Incremental PID corrector for motor speed / thrust regulation
//!
//! Velocity-form controller: every tick adds a bounded correction to the
//! previous output instead of recomputing it, so a gain change made between
//! ticks takes effect smoothly on the next one.
//!
//! ```text
//!   error  = target - measurement
//!   change = measurement - previous            (derivative on measurement)
//!   sum    = limit(sum + error, ±integral_max) (anti-windup)
//!   output = limit(output + P + limit(D, ±20) + limit(I, ±20), min, max)
//! ```
//!
//! Proportional and integral gains are stored pre-multiplied by the tick
//! period so loop behaviour does not depend on the sample rate for a given
//! user gain.  The derivative gain is used as entered.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::limit;
use crate::config::{BenchConfig, ControlMode};
use crate::error::ConfigError;

/// Symmetric bound on the derivative and integral contributions of a
/// single tick.
pub const TERM_LIMIT: f64 = 20.0;

/// Selects one of the three gains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gain {
    Proportional,
    Integral,
    Derivative,
}

/// Construction parameters.  Gains are in user (tick-independent) units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidParams {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub target: f64,
    pub integral_max: f64,
    pub output_min: f64,
    pub output_max: f64,
    pub initial_output: f64,
    pub tick_secs: f64,
}

impl PidParams {
    /// Parameters for `mode`, starting from the spin-up output.
    pub fn from_config(config: &BenchConfig, mode: ControlMode) -> Self {
        let profile = config.profiles.get(mode);
        Self {
            kp: profile.kp,
            ki: profile.ki,
            kd: profile.kd,
            target: profile.target,
            integral_max: config.integral_max,
            output_min: config.output_min,
            output_max: config.output_max,
            initial_output: config.spinup_output,
            tick_secs: config.tick_secs,
        }
    }
}

/// Live controller state.
///
/// Invariants (hold after construction and after every mutation):
/// `integral ∈ [-integral_max, integral_max]` and
/// `output ∈ [output_min, output_max]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    target: f64,
    previous_measurement: f64,
    integral: f64,
    integral_max: f64,
    kp: f64,
    ki: f64,
    kd: f64,
    output_min: f64,
    output_max: f64,
    output: f64,
}

impl ControllerState {
    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn previous_measurement(&self) -> f64 {
        self.previous_measurement
    }

    /// Integral accumulator (sum of errors, not yet scaled by `ki`).
    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn integral_max(&self) -> f64 {
        self.integral_max
    }

    /// Tick-scaled proportional gain.
    pub fn kp_internal(&self) -> f64 {
        self.kp
    }

    /// Tick-scaled integral gain.
    pub fn ki_internal(&self) -> f64 {
        self.ki
    }

    pub fn kd(&self) -> f64 {
        self.kd
    }

    pub fn output_range(&self) -> (f64, f64) {
        (self.output_min, self.output_max)
    }

    pub fn output(&self) -> f64 {
        self.output
    }
}

/// Contributions computed on the most recent tick (for logging).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CorrectionTerms {
    pub error: f64,
    /// `measurement - previous_measurement`.
    pub change: f64,
    pub proportional: f64,
    /// Bounded integral contribution.
    pub integral: f64,
    /// Bounded derivative contribution.
    pub derivative: f64,
    pub output: f64,
}

/// PID corrector.
///
/// Not thread-safe: drive it from the single control thread only.
#[derive(Debug, Clone)]
pub struct PidCorrector {
    state: ControllerState,
    tick_secs: f64,
    last: CorrectionTerms,
}

impl PidCorrector {
    pub fn new(params: PidParams) -> Result<Self, ConfigError> {
        if !(params.tick_secs.is_finite() && params.tick_secs > 0.0) {
            return Err(ConfigError::InvalidValue("tick_secs"));
        }
        if !(params.output_min.is_finite()
            && params.output_max.is_finite()
            && params.output_min <= params.output_max)
        {
            return Err(ConfigError::InvalidValue("output range"));
        }
        if !(params.integral_max.is_finite() && params.integral_max >= 0.0) {
            return Err(ConfigError::InvalidValue("integral_max"));
        }
        for (value, field) in [
            (params.kp, "kp"),
            (params.ki, "ki"),
            (params.kd, "kd"),
            (params.target, "target"),
            (params.initial_output, "initial_output"),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::InvalidValue(field));
            }
        }

        let output = limit(params.initial_output, params.output_min, params.output_max);
        Ok(Self {
            state: ControllerState {
                target: params.target,
                previous_measurement: 0.0,
                integral: 0.0,
                integral_max: params.integral_max,
                kp: params.kp * params.tick_secs,
                ki: params.ki * params.tick_secs,
                kd: params.kd,
                output_min: params.output_min,
                output_max: params.output_max,
                output,
            },
            tick_secs: params.tick_secs,
            last: CorrectionTerms {
                output,
                ..CorrectionTerms::default()
            },
        })
    }

    /// Compute the corrected output for one sample.
    ///
    /// The first call after construction or [`reset`](Self::reset) uses a
    /// previous measurement of zero, so its derivative term reflects the
    /// full measurement (bounded by [`TERM_LIMIT`]).
    pub fn correct(&mut self, measurement: f64) -> f64 {
        if !measurement.is_finite() {
            debug!("PID: ignoring non-finite measurement");
            return self.state.output;
        }
        let s = &mut self.state;

        let error = s.target - measurement;
        let change = measurement - s.previous_measurement;

        s.integral = limit(s.integral + error, -s.integral_max, s.integral_max);

        let proportional = error * s.kp;
        let derivative = limit(-change * s.kd, -TERM_LIMIT, TERM_LIMIT);
        let integral = limit(s.integral * s.ki, -TERM_LIMIT, TERM_LIMIT);

        s.output = limit(
            s.output + proportional + derivative + integral,
            s.output_min,
            s.output_max,
        );
        s.previous_measurement = measurement;

        self.last = CorrectionTerms {
            error,
            change,
            proportional,
            integral,
            derivative,
            output: s.output,
        };
        s.output
    }

    /// Clear the dynamic state and restart from `output`.  Gains, target and
    /// limits are kept.
    pub fn reset(&mut self, output: f64) {
        let s = &mut self.state;
        s.integral = 0.0;
        s.previous_measurement = 0.0;
        if output.is_finite() {
            s.output = limit(output, s.output_min, s.output_max);
        }
        self.last = CorrectionTerms {
            output: s.output,
            ..CorrectionTerms::default()
        };
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn terms(&self) -> &CorrectionTerms {
        &self.last
    }

    pub fn tick_secs(&self) -> f64 {
        self.tick_secs
    }

    pub fn output(&self) -> f64 {
        self.state.output
    }

    // ── Operator tuning ───────────────────────────────────────

    pub fn target(&self) -> f64 {
        self.state.target
    }

    pub fn set_target(&mut self, target: f64) {
        if target.is_finite() {
            self.state.target = target;
            info!("PID: target {:.2}", target);
        }
    }

    pub fn adjust_target(&mut self, delta: f64) {
        self.set_target(self.state.target + delta);
    }

    /// Gain in user units.
    pub fn gain(&self, gain: Gain) -> f64 {
        match gain {
            Gain::Proportional => self.state.kp / self.tick_secs,
            Gain::Integral => self.state.ki / self.tick_secs,
            Gain::Derivative => self.state.kd,
        }
    }

    /// Set a gain given in user units.  Non-finite values are ignored.
    pub fn set_gain(&mut self, gain: Gain, value: f64) {
        if !value.is_finite() {
            return;
        }
        match gain {
            Gain::Proportional => self.state.kp = value * self.tick_secs,
            Gain::Integral => self.state.ki = value * self.tick_secs,
            Gain::Derivative => self.state.kd = value,
        }
        info!("PID: {:?} gain {:.5}", gain, value);
    }

    pub fn scale_gain(&mut self, gain: Gain, factor: f64) {
        self.set_gain(gain, self.gain(gain) * factor);
    }

    /// Change the anti-windup bound; the accumulator is re-clamped so the
    /// invariant holds immediately.
    pub fn set_integral_max(&mut self, integral_max: f64) {
        if !(integral_max.is_finite() && integral_max >= 0.0) {
            return;
        }
        let s = &mut self.state;
        s.integral_max = integral_max;
        s.integral = limit(s.integral, -integral_max, integral_max);
        info!("PID: integral max {:.1}", integral_max);
    }

    pub fn scale_integral_max(&mut self, factor: f64) {
        self.set_integral_max(self.state.integral_max * factor);
    }
}
