//! Sample scheduler.
//!
//! Drives the PID corrector at a fixed period.  Each due tick performs
//! `read sensor → correct → write actuator`; the caller polls with the
//! current time and nothing here blocks.
//!
//! ```text
//!            start(now)
//!   ┌──────┐ ─────────▶ ┌──────────────────┐
//!   │ Idle │            │ Running{next_due} │──┐ poll(now ≥ next_due)
//!   └──────┘ ◀───────── └──────────────────┘ ◀┘  read → correct → write
//!            stop(safe)
//! ```
//!
//! Ticks are scheduled against the intended boundary
//! (`next_due += tick`), so a slow loop does not accumulate drift.  If the
//! caller falls more than one period behind, the missed ticks are dropped
//! and the schedule restarts from `now`.

use log::{info, warn};

use crate::app::ports::{ActuatorPort, SensorChannel, SensorPort};
use crate::channel::ChannelId;
use crate::control::pid::{CorrectionTerms, PidCorrector};
use crate::error::{ConfigError, SensorError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchedulerState {
    Idle,
    Running { next_due: f64 },
}

/// Outcome of a due tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickReport {
    /// No measurement was obtained; nothing was written.
    Skipped(SensorError),
    Corrected {
        measurement: f64,
        output: f64,
        terms: CorrectionTerms,
    },
}

#[derive(Debug, Clone)]
pub struct SampleScheduler {
    tick_secs: f64,
    sample_count: u32,
    feedback: SensorChannel,
    channel: ChannelId,
    state: SchedulerState,
    ticks: u64,
}

impl SampleScheduler {
    pub fn new(
        tick_secs: f64,
        sample_count: u32,
        feedback: SensorChannel,
        channel: ChannelId,
    ) -> Result<Self, ConfigError> {
        if !(tick_secs.is_finite() && tick_secs > 0.0) {
            return Err(ConfigError::InvalidValue("tick_secs"));
        }
        Ok(Self {
            tick_secs,
            sample_count: sample_count.max(1),
            feedback,
            channel,
            state: SchedulerState::Idle,
            ticks: 0,
        })
    }

    /// Begin ticking; the first tick is due immediately.
    /// Returns `false` (and changes nothing) if already running.
    pub fn start(&mut self, now: f64) -> bool {
        if self.is_running() {
            return false;
        }
        self.state = SchedulerState::Running { next_due: now };
        self.ticks = 0;
        info!(
            "Scheduler: started, tick {:.3}s on {} ({:?})",
            self.tick_secs, self.channel, self.feedback
        );
        true
    }

    /// Stop ticking and write `safe_value`.  No write follows this call.
    pub fn stop(&mut self, hw: &mut impl ActuatorPort, safe_value: f64) {
        hw.write_one(self.channel, safe_value);
        if self.is_running() {
            info!("Scheduler: stopped after {} ticks", self.ticks);
        }
        self.state = SchedulerState::Idle;
    }

    /// Go idle without writing (another control source takes over).
    pub fn halt(&mut self) {
        self.state = SchedulerState::Idle;
    }

    /// Run the tick if one is due.
    pub fn poll<H>(&mut self, now: f64, hw: &mut H, corrector: &mut PidCorrector) -> Option<TickReport>
    where
        H: SensorPort + ActuatorPort,
    {
        let SchedulerState::Running { next_due } = self.state else {
            return None;
        };
        if now < next_due {
            return None;
        }

        let mut next = next_due + self.tick_secs;
        if next <= now {
            next = now + self.tick_secs;
        }
        self.state = SchedulerState::Running { next_due: next };

        let measurement = match hw
            .read(self.sample_count)
            .and_then(|m| m.get(self.feedback).ok_or(SensorError::MissingChannel))
        {
            Ok(v) => v,
            Err(e) => {
                warn!("Scheduler: tick skipped, {}", e);
                return Some(TickReport::Skipped(e));
            }
        };

        let output = corrector.correct(measurement);
        hw.write_one(self.channel, output);
        self.ticks += 1;

        Some(TickReport::Corrected {
            measurement,
            output,
            terms: *corrector.terms(),
        })
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SchedulerState::Running { .. })
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn tick_secs(&self) -> f64 {
        self.tick_secs
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn feedback(&self) -> SensorChannel {
        self.feedback
    }

    pub fn set_feedback(&mut self, feedback: SensorChannel) {
        self.feedback = feedback;
    }
}
