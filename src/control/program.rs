//! Setpoint program for endurance runs.
//!
//! An ordered list of `(target, duration)` steps, played `repeat` times.
//! While a program is attached to a regulating run, the corrector's target
//! follows [`SetpointProgram::target_at`]; once it returns `None` the run ends.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Maximum number of steps in one program cycle.
pub const MAX_PROGRAM_STEPS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgramStep {
    pub target: f64,
    pub secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetpointProgram {
    steps: heapless::Vec<ProgramStep, MAX_PROGRAM_STEPS>,
    repeat: u32,
}

impl SetpointProgram {
    pub fn new(steps: &[ProgramStep], repeat: u32) -> Result<Self, ConfigError> {
        if steps.is_empty() {
            return Err(ConfigError::InvalidValue("program steps"));
        }
        if repeat == 0 {
            return Err(ConfigError::InvalidValue("program repeat"));
        }
        for step in steps {
            if !(step.secs.is_finite() && step.secs >= 0.0) {
                return Err(ConfigError::InvalidDuration);
            }
            if !step.target.is_finite() {
                return Err(ConfigError::InvalidValue("program target"));
            }
        }
        let steps = heapless::Vec::from_slice(steps)
            .map_err(|_| ConfigError::InvalidValue("program steps"))?;
        Ok(Self { steps, repeat })
    }

    pub fn steps(&self) -> &[ProgramStep] {
        &self.steps
    }

    pub fn repeat(&self) -> u32 {
        self.repeat
    }

    /// Duration of one pass through the steps.
    pub fn cycle_secs(&self) -> f64 {
        self.steps.iter().map(|s| s.secs).sum()
    }

    pub fn total_secs(&self) -> f64 {
        self.cycle_secs() * f64::from(self.repeat)
    }

    /// Target in force `elapsed` seconds after the program started, or
    /// `None` once every repetition has played out.
    pub fn target_at(&self, elapsed: f64) -> Option<f64> {
        self.locate(elapsed).map(|p| p.target)
    }

    /// Step in force at `elapsed`, with the time already spent in it.
    pub fn locate(&self, elapsed: f64) -> Option<ProgramPosition> {
        if !elapsed.is_finite() || elapsed >= self.total_secs() {
            return None;
        }
        let cycle = self.cycle_secs();
        let mut t = if cycle > 0.0 {
            elapsed.max(0.0) % cycle
        } else {
            0.0
        };
        for (index, step) in self.steps.iter().enumerate() {
            if t < step.secs {
                return Some(ProgramPosition {
                    index,
                    target: step.target,
                    step_elapsed: t,
                });
            }
            t -= step.secs;
        }
        None
    }
}

/// Where a program stands at a given time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgramPosition {
    pub index: usize,
    pub target: f64,
    pub step_elapsed: f64,
}
