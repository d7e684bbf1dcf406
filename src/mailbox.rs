//! Bench event mailbox.
//!
//! Uses an `embassy-sync` bounded channel to carry operator input from I/O
//! threads (stdin, host link) into the control loop, which drains it between
//! ticks.  All controller mutation therefore happens on the control thread.
//!
//! ```text
//! ┌──────────────┐  BenchEvent  ┌──────────────┐
//! │  I/O thread  │─────────────▶│ Control loop │
//! └──────────────┘   (bounded)  └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::dispatch::HostMessage;

/// Discrete operator event.
#[derive(Debug, Clone, PartialEq)]
pub enum BenchEvent {
    /// Key code (upper-case ASCII).
    Key(u8),
    Message(HostMessage),
}

/// Channel depth.
pub const MAILBOX_DEPTH: usize = 16;

pub type Mailbox = Channel<CriticalSectionRawMutex, BenchEvent, MAILBOX_DEPTH>;

/// Process-wide inbox: I/O threads → control loop.
pub static BENCH_EVENTS: Mailbox = Channel::new();

/// Queue an event.  Returns `false` when the mailbox is full and the event
/// was dropped.
pub fn post(mailbox: &Mailbox, event: BenchEvent) -> bool {
    mailbox.try_send(event).is_ok()
}

/// Take the next queued event, if any.
pub fn next(mailbox: &Mailbox) -> Option<BenchEvent> {
    mailbox.try_receive().ok()
}
