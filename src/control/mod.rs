//! Closed-loop control primitives.
//!
//! ```text
//!   measurement ──▶ PidCorrector ──▶ limit(min, max) ──▶ output
//!                        ▲
//!                        └── SetpointProgram (optional target schedule)
//! ```

pub mod limit;
pub mod pid;
pub mod program;

pub use limit::limit;
