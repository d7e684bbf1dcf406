//! In-memory output bank.
//!
//! Implements [`ActuatorPort`] over the four physical output slots.  A write
//! is validated as a whole and then committed in one step, so a multi-channel
//! update is never observed half-applied.  A value outside the protocol's
//! range switches that slot off instead of failing.

use log::warn;

use crate::app::ports::ActuatorPort;
use crate::channel::{ChannelId, MAX_CHANNELS, Protocol};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OutputSlot {
    /// Last accepted command value.
    pub value: f64,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct OutputBank {
    protocol: Protocol,
    slots: [OutputSlot; MAX_CHANNELS],
    writes: u64,
}

impl OutputBank {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            slots: [OutputSlot::default(); MAX_CHANNELS],
            writes: 0,
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Changing protocol switches every output off.
    pub fn set_protocol(&mut self, protocol: Protocol) {
        self.protocol = protocol;
        self.slots = [OutputSlot::default(); MAX_CHANNELS];
    }

    pub fn slot(&self, channel: ChannelId) -> OutputSlot {
        self.slots[channel.slot()]
    }

    /// Commanded value of an active output.
    pub fn value(&self, channel: ChannelId) -> Option<f64> {
        let slot = self.slot(channel);
        slot.active.then_some(slot.value)
    }

    pub fn is_active(&self, channel: ChannelId) -> bool {
        self.slot(channel).active
    }

    /// Number of `write` calls accepted so far.
    pub fn write_count(&self) -> u64 {
        self.writes
    }
}

impl ActuatorPort for OutputBank {
    fn write(&mut self, channels: &[ChannelId], values: &[f64]) {
        if channels.len() != values.len() {
            warn!(
                "OutputBank: {} channels but {} values, write ignored",
                channels.len(),
                values.len()
            );
            return;
        }
        let mut next = self.slots;
        for (channel, value) in channels.iter().zip(values) {
            let slot = &mut next[channel.slot()];
            if self.protocol.accepts(*value) {
                *slot = OutputSlot {
                    value: *value,
                    active: true,
                };
            } else {
                if slot.active {
                    warn!("OutputBank: {} = {} out of range, output off", channel, value);
                }
                slot.active = false;
            }
        }
        self.slots = next;
        self.writes += 1;
    }
}
