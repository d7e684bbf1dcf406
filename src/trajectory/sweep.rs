//! Stepped sweep: `N` rate-limited ramps between evenly spaced setpoints,
//! each followed by a settle delay, with an optional cooldown between steps.
//!
//! ```text
//!            ramp done            settle elapsed
//! Stepping(k) ───────▶ Settling ───────────────▶ StepSettled{k, last}
//!      ▲                                              │
//!      │       resume(handle)                         │ last
//!      ├──────────────────────────────────────────────┤──────▶ Done
//!      │                                              │ (+ Finished)
//!      │  hold elapsed   ┌─────────────┐  resume, hot │
//!      └─────────────────│ CoolingDown │◀─────────────┘
//!                        └─────────────┘
//! ```
//!
//! Ramp durations come from the per-channel slew rates
//! ([`rate_limited_duration`]), not from the base trajectory's duration.

use log::info;

use super::ramp::{Ramp, TrajectorySpec, rate_limited_duration};
use crate::app::ports::ActuatorPort;
use crate::channel::{Values, values_from};
use crate::error::ConfigError;

/// Events produced by [`Sweep::advance`] in one tick (at most two).
pub type SweepEvents = heapless::Vec<SweepEvent, 2>;

#[derive(Debug, Clone, PartialEq)]
pub struct CooldownParams {
    /// Values ramped to between steps.
    pub target_values: Values,
    /// Time held at `target_values` before the next step; `0` disables the
    /// cooldown.
    pub hold_secs: f64,
    /// Cooldown only runs when the highest previous output is at least this.
    pub min_threshold: f64,
}

impl CooldownParams {
    pub fn new(target_values: &[f64], hold_secs: f64, min_threshold: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            target_values: values_from(target_values)?,
            hold_secs,
            min_threshold,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepParams {
    pub step_count: u32,
    pub settle_secs: f64,
    pub cooldown: Option<CooldownParams>,
    /// Per-channel maximum slew rate (units/s); `<= 0` disables limiting.
    pub slew_rates: Values,
}

impl SweepParams {
    /// Bench defaults for `channels` outputs: 5 steps, 2 s settle,
    /// no cooldown, 100 µs/s slew.
    pub fn for_channels(channels: usize) -> Self {
        Self {
            step_count: 5,
            settle_secs: 2.0,
            cooldown: None,
            slew_rates: core::iter::repeat_n(100.0, channels.min(crate::channel::MAX_CHANNELS))
                .collect(),
        }
    }
}

/// Validated sweep description.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSpec {
    base: TrajectorySpec,
    params: SweepParams,
}

impl SweepSpec {
    pub fn new(base: TrajectorySpec, params: SweepParams) -> Result<Self, ConfigError> {
        let n = base.channels().len();
        if params.step_count == 0 {
            return Err(ConfigError::ZeroSteps);
        }
        if params.slew_rates.len() != n {
            return Err(ConfigError::SlewRateLengthMismatch);
        }
        if params.slew_rates.iter().any(|r| !r.is_finite()) {
            return Err(ConfigError::InvalidValue("slew rate"));
        }
        if !(params.settle_secs.is_finite() && params.settle_secs >= 0.0) {
            return Err(ConfigError::InvalidDuration);
        }
        if let Some(c) = &params.cooldown {
            if c.target_values.len() != n {
                return Err(ConfigError::CooldownLengthMismatch);
            }
            if !(c.hold_secs.is_finite() && c.hold_secs >= 0.0) {
                return Err(ConfigError::InvalidDuration);
            }
            if c.target_values.iter().any(|v| !v.is_finite()) || !c.min_threshold.is_finite() {
                return Err(ConfigError::InvalidValue("cooldown"));
            }
        }
        Ok(Self { base, params })
    }

    pub fn base(&self) -> &TrajectorySpec {
        &self.base
    }

    pub fn params(&self) -> &SweepParams {
        &self.params
    }

    pub fn step_count(&self) -> u32 {
        self.params.step_count
    }

    /// Setpoint of 1-based step `k`.  The last step (and the only step of a
    /// single-step sweep) is exactly `to`.
    pub fn step_target(&self, k: u32) -> Values {
        let from = self.base.from_values();
        let to = self.base.to_values();
        if k >= self.params.step_count || self.params.step_count == 1 {
            return to.iter().copied().collect();
        }
        let fraction = f64::from(k.saturating_sub(1)) / f64::from(self.params.step_count - 1);
        from.iter()
            .zip(to)
            .map(|(f, t)| f + (t - f) * fraction)
            .collect()
    }
}

/// Token handed out with a settled step; passing it back to
/// [`Sweep::resume`] continues the sweep.  Handles from an earlier step or
/// another sweep are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepHandle {
    sweep_id: u32,
    step: u32,
}

impl StepHandle {
    pub fn sweep_id(&self) -> u32 {
        self.sweep_id
    }

    pub fn step(&self) -> u32 {
        self.step
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepEvent {
    /// Step `handle.step()` has settled.  Unless `last`, the sweep waits
    /// for [`Sweep::resume`].
    StepSettled { handle: StepHandle, last: bool },
    /// Emitted exactly once, after the last step settles.
    Finished { sweep_id: u32 },
}

/// Externally visible phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPhase {
    Stepping,
    Settling,
    CoolingDown,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Stepping(Ramp),
    Settling { until: f64, notified: bool },
    CoolingDown { ramp: Ramp, hold_until: Option<f64> },
    Done,
}

/// Running sweep.  Owns its run state; driven by [`advance`](Self::advance)
/// once per host tick.
#[derive(Debug, Clone)]
pub struct Sweep {
    spec: SweepSpec,
    id: u32,
    /// 1-based; 0 before the first step.
    step: u32,
    previous: Values,
    phase: Phase,
}

impl Sweep {
    /// Begin at step 1, ramping from the base `from` values.
    pub fn start(spec: SweepSpec, id: u32, now: f64) -> Self {
        let previous = spec.base.from_values().iter().copied().collect();
        let mut sweep = Self {
            spec,
            id,
            step: 0,
            previous,
            phase: Phase::Done,
        };
        info!(
            "Sweep {}: {} steps on {:?}",
            id,
            sweep.spec.step_count(),
            sweep.spec.base.channels()
        );
        sweep.begin_step(1, now);
        sweep
    }

    /// Advance to `now`, writing outputs while a ramp is in flight.
    pub fn advance(&mut self, now: f64, hw: &mut impl ActuatorPort) -> SweepEvents {
        let mut events = SweepEvents::new();
        loop {
            match &mut self.phase {
                Phase::Stepping(ramp) => {
                    if !ramp.drive(now, hw) {
                        break;
                    }
                    let settle = self.spec.params.settle_secs;
                    if settle > 0.0 {
                        info!("Sweep {}: step {} settling {:.1}s", self.id, self.step, settle);
                    }
                    self.phase = Phase::Settling {
                        until: now + settle,
                        notified: false,
                    };
                }
                Phase::Settling { until, notified } => {
                    if *notified || now < *until {
                        break;
                    }
                    let last = self.step >= self.spec.step_count();
                    let handle = StepHandle {
                        sweep_id: self.id,
                        step: self.step,
                    };
                    let _ = events.push(SweepEvent::StepSettled { handle, last });
                    if last {
                        self.previous = self.spec.base.to_values().iter().copied().collect();
                        self.phase = Phase::Done;
                        info!("Sweep {}: finished", self.id);
                        let _ = events.push(SweepEvent::Finished { sweep_id: self.id });
                    } else {
                        *notified = true;
                    }
                    break;
                }
                Phase::CoolingDown { ramp, hold_until } => match *hold_until {
                    None => {
                        if !ramp.drive(now, hw) {
                            break;
                        }
                        let hold = self.spec.params.cooldown.as_ref().map_or(0.0, |c| c.hold_secs);
                        *hold_until = Some(now + hold);
                    }
                    Some(t) if now >= t => self.begin_step(self.step + 1, now),
                    Some(_) => break,
                },
                Phase::Done => break,
            }
        }
        events
    }

    /// Continue after a settled step.  Returns `false` for a stale handle
    /// or when the sweep is not waiting.
    pub fn resume(&mut self, handle: StepHandle, now: f64) -> bool {
        let waiting = matches!(self.phase, Phase::Settling { notified: true, .. });
        if !waiting || handle.sweep_id != self.id || handle.step != self.step {
            return false;
        }

        let hottest = self.previous.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        match &self.spec.params.cooldown {
            Some(c) if c.hold_secs > 0.0 && hottest >= c.min_threshold => {
                info!("Sweep {}: cooling down for {:.1}s", self.id, c.hold_secs);
                let target = c.target_values.clone();
                let duration =
                    rate_limited_duration(&self.previous, &target, &self.spec.params.slew_rates);
                let spec = TrajectorySpec::between(
                    self.spec.base.channels().iter().copied().collect(),
                    self.previous.clone(),
                    target.clone(),
                    duration,
                );
                self.previous = target;
                self.phase = Phase::CoolingDown {
                    ramp: Ramp::new(spec, now),
                    hold_until: None,
                };
            }
            _ => self.begin_step(self.step + 1, now),
        }
        true
    }

    fn begin_step(&mut self, k: u32, now: f64) {
        let target = self.spec.step_target(k);
        let duration = rate_limited_duration(&self.previous, &target, &self.spec.params.slew_rates);
        info!(
            "Sweep {}: step {} of {} (val: {:?})",
            self.id,
            k,
            self.spec.step_count(),
            target.as_slice()
        );
        let spec = TrajectorySpec::between(
            self.spec.base.channels().iter().copied().collect(),
            self.previous.clone(),
            target.clone(),
            duration,
        );
        self.step = k;
        self.previous = target;
        self.phase = Phase::Stepping(Ramp::new(spec, now));
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn spec(&self) -> &SweepSpec {
        &self.spec
    }

    pub fn current_step(&self) -> u32 {
        self.step
    }

    pub fn previous_values(&self) -> &[f64] {
        &self.previous
    }

    pub fn phase(&self) -> SweepPhase {
        match self.phase {
            Phase::Stepping(_) => SweepPhase::Stepping,
            Phase::Settling { .. } => SweepPhase::Settling,
            Phase::CoolingDown { .. } => SweepPhase::CoolingDown,
            Phase::Done => SweepPhase::Done,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }

    /// Settled and waiting for [`resume`](Self::resume).
    pub fn awaiting_resume(&self) -> Option<StepHandle> {
        match self.phase {
            Phase::Settling { notified: true, .. } => Some(StepHandle {
                sweep_id: self.id,
                step: self.step,
            }),
            _ => None,
        }
    }
}
