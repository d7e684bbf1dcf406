//! Unified error types for the bench controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control loop's error handling uniform.  All variants are `Copy` so they
//! can be passed through the service and the trajectory executors without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// A trajectory, sweep or bench configuration is malformed.
    /// Raised at construction, before any actuator write.
    Config(ConfigError),
    /// A timer was armed with a non-positive or non-finite delay.
    /// The arming call has no effect.
    InvalidDelay(f64),
    /// The sensor source could not deliver a measurement.
    Sensor(SensorError),
    /// A host message could not be parsed.
    Message(MessageError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration: {e}"),
            Self::InvalidDelay(d) => write!(f, "invalid delay: {d}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Message(e) => write!(f, "host message: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A trajectory names no output channel.
    NoChannels,
    /// More channels than the output bank can address.
    TooManyChannels,
    /// `from`/`to` value arrays differ in length from the channel list.
    LengthMismatch,
    /// A sweep was requested with zero steps.
    ZeroSteps,
    /// The slew-rate array differs in length from the channel list.
    SlewRateLengthMismatch,
    /// The cooldown target array differs in length from the channel list.
    CooldownLengthMismatch,
    /// A duration is negative or not finite.
    InvalidDuration,
    /// A named field holds an out-of-range or non-finite value.
    InvalidValue(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoChannels => write!(f, "no output channel given"),
            Self::TooManyChannels => write!(f, "too many output channels"),
            Self::LengthMismatch => write!(f, "from/to length differs from channel count"),
            Self::ZeroSteps => write!(f, "minimum step count is 1"),
            Self::SlewRateLengthMismatch => {
                write!(f, "slew rate array length differs from channel count")
            }
            Self::CooldownLengthMismatch => {
                write!(f, "cooldown target array length differs from channel count")
            }
            Self::InvalidDuration => write!(f, "duration must be finite and non-negative"),
            Self::InvalidValue(field) => write!(f, "invalid value for {field}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The sensor source failed to produce a reading this tick.
    Unavailable,
    /// The reading does not carry the channel the loop regulates on.
    MissingChannel,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "reading unavailable"),
            Self::MissingChannel => write!(f, "feedback channel missing from reading"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Host message errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageError {
    /// The leading keyword is not recognised.
    UnknownCommand,
    /// A `Start` message names no known run kind.
    UnknownRunKind,
    /// A required comma-separated field is absent.
    MissingField(usize),
    /// A numeric field does not parse as a finite number.
    BadNumber(usize),
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand => write!(f, "unknown command"),
            Self::UnknownRunKind => write!(f, "start message names no run kind"),
            Self::MissingField(i) => write!(f, "field {i} missing"),
            Self::BadNumber(i) => write!(f, "field {i} is not a number"),
        }
    }
}

impl From<MessageError> for Error {
    fn from(e: MessageError) -> Self {
        Self::Message(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
