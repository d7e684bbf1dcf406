//! Bench configuration parameters
//!
//! All tunable parameters for a test run.  Defaults reproduce the stock
//! bench scripts; values can be overridden from a JSON file.

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelId, Protocol};
use crate::error::ConfigError;

/// Which measured quantity the closed loop regulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Optical rotational speed (RPM).
    #[default]
    Speed,
    /// Load-cell thrust.
    Thrust,
}

/// Gains and setpoint for one control mode.  Gains are in user units,
/// independent of the tick period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainProfile {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub target: f64,
    /// Additive setpoint change applied by the "raise/lower target" keys.
    pub target_step: f64,
}

/// Per-mode gain profiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeProfiles {
    pub speed: GainProfile,
    pub thrust: GainProfile,
}

impl ModeProfiles {
    pub fn get(&self, mode: ControlMode) -> &GainProfile {
        match mode {
            ControlMode::Speed => &self.speed,
            ControlMode::Thrust => &self.thrust,
        }
    }

    pub fn get_mut(&mut self, mode: ControlMode) -> &mut GainProfile {
        match mode {
            ControlMode::Speed => &mut self.speed,
            ControlMode::Thrust => &mut self.thrust,
        }
    }
}

/// Polar sweep parameters (plateau, ramp up, plateau, return).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarConfig {
    /// Low plateau / ramp start value (µs).
    pub min_value: f64,
    /// High plateau / ramp end value (µs).
    pub max_value: f64,
    /// Ramp duration (seconds).
    pub ramp_secs: f64,
    /// Time spent at each plateau (seconds).
    pub plateau_secs: f64,
}

/// Core bench configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    // --- Loop timing ---
    /// Control tick period (seconds).
    pub tick_secs: f64,
    /// Samples averaged by the sensor source per reading.
    pub sample_count: u32,
    /// Interval between console regulation summaries (seconds).
    pub status_interval_secs: f64,

    // --- Output ---
    /// Output the closed loop drives.
    pub channel: ChannelId,
    /// Signalling protocol of the output bank.
    pub protocol: Protocol,
    /// Lower bound of the regulated output (µs).
    pub output_min: f64,
    /// Upper bound of the regulated output (µs).
    pub output_max: f64,
    /// Value written when regulation stops.
    pub safe_output: f64,

    // --- Start-up sequence ---
    /// ESC arming value (µs).
    pub arm_output: f64,
    /// ESC arming duration (seconds).
    pub arm_secs: f64,
    /// Open-loop spin-up value; also the corrector's initial output (µs).
    pub spinup_output: f64,
    /// Spin-up duration before the loop closes (seconds).
    pub spinup_secs: f64,

    // --- Controller ---
    /// Anti-windup bound on the integral accumulator.
    pub integral_max: f64,
    /// Multiplicative gain step used by the tuning keys.
    pub gain_step_factor: f64,
    /// Mode used by runs that do not name one.
    pub default_mode: ControlMode,
    pub profiles: ModeProfiles,

    // --- Polar sweep ---
    pub polar: PolarConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            // Timing
            tick_secs: 0.025, // 40 Hz
            sample_count: 1,
            status_interval_secs: 1.0,

            // Output
            channel: ChannelId::EscA,
            protocol: Protocol::Pwm50,
            output_min: 1050.0,
            output_max: 1950.0,
            safe_output: 1050.0,

            // Start-up
            arm_output: 1000.0,
            arm_secs: 2.0,
            spinup_output: 1150.0,
            spinup_secs: 4.0,

            // Controller
            integral_max: 1000.0,
            gain_step_factor: 1.1,
            default_mode: ControlMode::Speed,
            profiles: ModeProfiles {
                speed: GainProfile {
                    kp: 0.1,
                    ki: 0.001,
                    kd: 0.01,
                    target: 2500.0,
                    target_step: 50.0,
                },
                thrust: GainProfile {
                    kp: 10.0,
                    ki: 0.0,
                    kd: 1.0,
                    target: 1.0,
                    target_step: 1.0,
                },
            },

            polar: PolarConfig {
                min_value: 1100.0,
                max_value: 1920.0,
                ramp_secs: 60.0,
                plateau_secs: 5.0,
            },
        }
    }
}

impl BenchConfig {
    /// Range-check every field the control path depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tick_secs.is_finite() && self.tick_secs > 0.0) {
            return Err(ConfigError::InvalidValue("tick_secs"));
        }
        if self.sample_count == 0 {
            return Err(ConfigError::InvalidValue("sample_count"));
        }
        if !(self.output_min.is_finite()
            && self.output_max.is_finite()
            && self.output_min <= self.output_max)
        {
            return Err(ConfigError::InvalidValue("output_min/output_max"));
        }
        if !(self.integral_max.is_finite() && self.integral_max >= 0.0) {
            return Err(ConfigError::InvalidValue("integral_max"));
        }
        if !(self.gain_step_factor.is_finite() && self.gain_step_factor > 0.0) {
            return Err(ConfigError::InvalidValue("gain_step_factor"));
        }
        for secs in [self.arm_secs, self.spinup_secs, self.status_interval_secs] {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(ConfigError::InvalidDuration);
            }
        }
        if !(self.polar.ramp_secs.is_finite() && self.polar.ramp_secs >= 0.0)
            || !(self.polar.plateau_secs.is_finite() && self.polar.plateau_secs >= 0.0)
        {
            return Err(ConfigError::InvalidDuration);
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid bench config: {e}"))?;
        Ok(config)
    }
}
