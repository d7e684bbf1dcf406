//! Linear multi-channel ramp.
//!
//! Interpolates every channel from `from` to `to` over a fixed duration.
//! Each host tick samples the ramp and writes all channels in one call.

use log::debug;

use crate::app::ports::ActuatorPort;
use crate::channel::{ChannelId, Channels, Values, channels_from, values_from};
use crate::control::limit;
use crate::error::ConfigError;

/// Validated ramp description.  `channels`, `from` and `to` have equal
/// length, at least one.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectorySpec {
    channels: Channels,
    from: Values,
    to: Values,
    duration_secs: f64,
}

impl TrajectorySpec {
    pub fn new(
        channels: &[ChannelId],
        from: &[f64],
        to: &[f64],
        duration_secs: f64,
    ) -> Result<Self, ConfigError> {
        if channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        let channels = channels_from(channels)?;
        if from.len() != channels.len() || to.len() != channels.len() {
            return Err(ConfigError::LengthMismatch);
        }
        if !(duration_secs.is_finite() && duration_secs >= 0.0) {
            return Err(ConfigError::InvalidDuration);
        }
        if from.iter().chain(to).any(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidValue("ramp value"));
        }
        Ok(Self {
            channels,
            from: values_from(from)?,
            to: values_from(to)?,
            duration_secs,
        })
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    pub fn from_values(&self) -> &[f64] {
        &self.from
    }

    pub fn to_values(&self) -> &[f64] {
        &self.to
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// Ramp over already-validated channels and endpoints.
    pub(crate) fn between(channels: Channels, from: Values, to: Values, duration_secs: f64) -> Self {
        Self {
            channels,
            from,
            to,
            duration_secs: duration_secs.max(0.0),
        }
    }
}

/// Longest time any channel needs to cover `from → to` without exceeding
/// its slew rate.  Channels with a slew rate `<= 0` are not limited.
pub fn rate_limited_duration(from: &[f64], to: &[f64], slew_rates: &[f64]) -> f64 {
    from.iter()
        .zip(to)
        .zip(slew_rates)
        .map(|((f, t), rate)| if *rate > 0.0 { (t - f).abs() / rate } else { 0.0 })
        .fold(0.0, f64::max)
}

/// A ramp in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct Ramp {
    spec: TrajectorySpec,
    started_at: f64,
}

impl Ramp {
    pub fn new(spec: TrajectorySpec, started_at: f64) -> Self {
        debug!(
            "Ramp: {:?} -> {:?} over {:.2}s",
            spec.from.as_slice(),
            spec.to.as_slice(),
            spec.duration_secs
        );
        Self { spec, started_at }
    }

    pub fn spec(&self) -> &TrajectorySpec {
        &self.spec
    }

    pub fn started_at(&self) -> f64 {
        self.started_at
    }

    /// Outputs `elapsed` seconds into the ramp, and whether it has finished.
    /// A finished ramp returns `to` exactly.
    pub fn advance(&self, elapsed: f64) -> (Values, bool) {
        let fraction = if self.spec.duration_secs > 0.0 {
            limit(elapsed / self.spec.duration_secs, 0.0, 1.0)
        } else {
            1.0
        };
        if fraction >= 1.0 {
            return (self.spec.to.clone(), true);
        }
        let values = self
            .spec
            .from
            .iter()
            .zip(&self.spec.to)
            .map(|(f, t)| f + fraction * (t - f))
            .collect();
        (values, false)
    }

    /// Sample the ramp at `now` and write every channel in one call.
    /// Returns `true` once the final (`to`) values have been written.
    pub fn drive(&self, now: f64, hw: &mut impl ActuatorPort) -> bool {
        let (values, done) = self.advance(now - self.started_at);
        hw.write(&self.spec.channels, &values);
        done
    }
}
