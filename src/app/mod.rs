//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the bench orchestration: the single active control
//! source, the run start-up sequence, operator event handling and data-log
//! records.  All interaction with the stand happens through **port traits**
//! defined in [`ports`], keeping this layer fully testable without hardware.

pub mod events;
pub mod ports;
pub mod service;
