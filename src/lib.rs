//! Rotorbench: closed-loop motor test-bench controller.
//!
//! Pure control logic (PID regulation, ramps, stepped sweeps, operator
//! dispatch) behind hexagonal port traits, plus in-memory and simulated
//! adapters.  Everything advances only when the host calls in with the
//! current time; nothing here blocks or spawns threads.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod channel;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod error;
pub mod mailbox;
pub mod scheduler;
pub mod timer;
pub mod trajectory;

pub use error::{Error, Result};
