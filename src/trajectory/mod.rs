//! Open-loop trajectories that drive the outputs directly.
//!
//! A trajectory is mutually exclusive with the PID loop: the
//! [`BenchService`](crate::app::service::BenchService) runs at most one
//! control source at a time.

pub mod polar;
pub mod ramp;
pub mod sweep;

pub use polar::{PolarPhase, PolarProfile};
pub use ramp::{Ramp, TrajectorySpec, rate_limited_duration};
pub use sweep::{CooldownParams, StepHandle, Sweep, SweepEvent, SweepParams, SweepPhase, SweepSpec};
