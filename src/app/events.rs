//! Outbound application events.
//!
//! The [`BenchService`](super::service::BenchService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: print to the console, forward the
//! start/end signals to the host application, etc.

use crate::config::ControlMode;
use crate::dispatch::{RunLabel, Signal};
use crate::trajectory::StepHandle;

/// Which control source currently owns the outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Idle,
    /// Arming / spin-up stages before the loop closes.
    Startup,
    Regulating,
    Ramp,
    Sweep,
    Polar,
}

/// Periodic regulation summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusData {
    pub mode: ControlMode,
    pub target: f64,
    pub measurement: f64,
    pub output: f64,
    pub error: f64,
    pub proportional: f64,
    pub integral: f64,
    pub derivative: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The active control source changed.
    SourceChanged { from: SourceKind, to: SourceKind },

    /// A host-requested run began (log file name for the run).
    RunStarted { label: RunLabel, mode: Option<ControlMode> },

    /// Periodic regulation status.
    Status(StatusData),

    /// A sweep step settled.  Pass the handle to
    /// [`BenchService::resume_sweep`](super::service::BenchService::resume_sweep)
    /// to continue.
    StepSettled { handle: StepHandle, last: bool },

    /// The sweep issued its last step and is done.
    SweepFinished,

    /// A ramp reached its end values.
    RampFinished,

    /// The polar profile completed.
    PolarFinished,

    /// The setpoint program finished and regulation stopped.
    ProgramFinished,

    /// Out-of-band signal for the host application.
    Signal(Signal),

    /// Load cells were tared.
    Tared,
}
