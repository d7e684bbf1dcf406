//! Polar profile: hold the low value, ramp to the high value, hold it, then
//! drop back to the low value.
//!
//! ```text
//!  max ┤            ┌──────┐
//!      │          ╱        │
//!  min ┤ ────────╱         └── (final write)
//!      └ plateau  ramp  plateau
//! ```

use log::info;

use super::ramp::{Ramp, TrajectorySpec};
use crate::app::ports::ActuatorPort;
use crate::channel::ChannelId;
use crate::config::PolarConfig;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolarPhase {
    LowPlateau,
    Ramping,
    HighPlateau,
    Done,
}

#[derive(Debug, Clone)]
enum Stage {
    LowPlateau { until: f64 },
    Ramping(Ramp),
    HighPlateau { until: f64 },
    Done,
}

#[derive(Debug, Clone)]
pub struct PolarProfile {
    channel: ChannelId,
    config: PolarConfig,
    stage: Stage,
}

impl PolarProfile {
    /// Write the low value and start the first plateau.
    pub fn start(
        channel: ChannelId,
        config: PolarConfig,
        now: f64,
        hw: &mut impl ActuatorPort,
    ) -> Result<Self, ConfigError> {
        // Validates values and ramp duration up front.
        TrajectorySpec::new(&[channel], &[config.min_value], &[config.max_value], config.ramp_secs)?;
        if !(config.plateau_secs.is_finite() && config.plateau_secs >= 0.0) {
            return Err(ConfigError::InvalidDuration);
        }
        info!("Polar: start plateau at {:.0}", config.min_value);
        hw.write_one(channel, config.min_value);
        Ok(Self {
            channel,
            config,
            stage: Stage::LowPlateau {
                until: now + config.plateau_secs,
            },
        })
    }

    /// Advance to `now`.  Returns `true` on the tick the profile completes.
    pub fn advance(&mut self, now: f64, hw: &mut impl ActuatorPort) -> bool {
        loop {
            match &self.stage {
                Stage::LowPlateau { until } => {
                    if now < *until {
                        return false;
                    }
                    info!("Polar: ramping up over {:.0}s", self.config.ramp_secs);
                    let spec = TrajectorySpec::new(
                        &[self.channel],
                        &[self.config.min_value],
                        &[self.config.max_value],
                        self.config.ramp_secs,
                    );
                    match spec {
                        Ok(spec) => self.stage = Stage::Ramping(Ramp::new(spec, now)),
                        Err(_) => self.stage = Stage::HighPlateau { until: now },
                    }
                }
                Stage::Ramping(ramp) => {
                    if !ramp.drive(now, hw) {
                        return false;
                    }
                    info!("Polar: up plateau");
                    self.stage = Stage::HighPlateau {
                        until: now + self.config.plateau_secs,
                    };
                }
                Stage::HighPlateau { until } => {
                    if now < *until {
                        return false;
                    }
                    hw.write_one(self.channel, self.config.min_value);
                    info!("Polar: done");
                    self.stage = Stage::Done;
                    return true;
                }
                Stage::Done => return false,
            }
        }
    }

    pub fn phase(&self) -> PolarPhase {
        match self.stage {
            Stage::LowPlateau { .. } => PolarPhase::LowPlateau,
            Stage::Ramping(_) => PolarPhase::Ramping,
            Stage::HighPlateau { .. } => PolarPhase::HighPlateau,
            Stage::Done => PolarPhase::Done,
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }
}
