//! Output channel identities and control protocols.
//!
//! The bench exposes four physical output slots.  Single-motor stands name
//! them `esc` / `servo1..3`; coaxial stands name them `escA` / `servoA` /
//! `escB` / `servoB`.  Both naming schemes address the same four slots.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Number of addressable output slots.
pub const MAX_CHANNELS: usize = 4;

/// Per-channel values (one entry per channel of a trajectory).
pub type Values = heapless::Vec<f64, MAX_CHANNELS>;

/// Ordered channel list of a trajectory.
pub type Channels = heapless::Vec<ChannelId, MAX_CHANNELS>;

/// An addressable actuator output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelId {
    Esc,
    Servo1,
    Servo2,
    Servo3,
    EscA,
    ServoA,
    EscB,
    ServoB,
}

impl ChannelId {
    /// Physical output slot this name maps onto (0..MAX_CHANNELS).
    pub const fn slot(self) -> usize {
        match self {
            Self::Esc | Self::EscA => 0,
            Self::Servo1 | Self::ServoA => 1,
            Self::Servo2 | Self::EscB => 2,
            Self::Servo3 | Self::ServoB => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Esc => "esc",
            Self::Servo1 => "servo1",
            Self::Servo2 => "servo2",
            Self::Servo3 => "servo3",
            Self::EscA => "escA",
            Self::ServoA => "servoA",
            Self::EscB => "escB",
            Self::ServoB => "servoB",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChannelId {
    type Err = ConfigError;

    /// Channel names are case-insensitive (`"ESCA"` == `"escA"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [ChannelId; 8] = [
            ChannelId::Esc,
            ChannelId::Servo1,
            ChannelId::Servo2,
            ChannelId::Servo3,
            ChannelId::EscA,
            ChannelId::ServoA,
            ChannelId::EscB,
            ChannelId::ServoB,
        ];
        ALL.into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or(ConfigError::InvalidValue("channel id"))
    }
}

/// Output signalling protocol.  Determines the valid command range; any
/// value outside it switches the channel off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    #[default]
    Pwm50,
    Pwm100,
    Pwm200,
    Pwm300,
    Pwm400,
    Pwm500,
    Dshot150,
    Dshot300,
    Dshot600,
    Dshot1200,
    Multishot,
    Oneshot42,
    Oneshot125,
}

impl Protocol {
    /// Inclusive `(min, max)` command range.
    pub const fn valid_range(self) -> (f64, f64) {
        match self {
            Self::Pwm50 | Self::Pwm100 | Self::Pwm200 | Self::Pwm300 | Self::Pwm400
            | Self::Pwm500 => (700.0, 2300.0),
            Self::Dshot150 | Self::Dshot300 | Self::Dshot600 | Self::Dshot1200 => (0.0, 2047.0),
            Self::Multishot => (5.0, 25.0),
            Self::Oneshot42 => (42.0, 84.0),
            Self::Oneshot125 => (125.0, 250.0),
        }
    }

    pub fn accepts(self, value: f64) -> bool {
        let (min, max) = self.valid_range();
        value >= min && value <= max
    }
}

/// Build a [`Values`] vector from a slice, rejecting overlong input.
pub fn values_from(slice: &[f64]) -> Result<Values, ConfigError> {
    Values::from_slice(slice).map_err(|_| ConfigError::TooManyChannels)
}

/// Build a [`Channels`] list from a slice, rejecting overlong input.
pub fn channels_from(slice: &[ChannelId]) -> Result<Channels, ConfigError> {
    Channels::from_slice(slice).map_err(|_| ConfigError::TooManyChannels)
}
