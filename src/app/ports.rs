//! Port traits: the hexagonal boundary between the bench core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ BenchService (domain)
//! ```
//!
//! Driven adapters (sensor boards, ESC/servo outputs, log files, consoles)
//! implement these traits.  The [`BenchService`](super::service::BenchService)
//! consumes them via generics, so the control code never touches hardware.

use core::fmt;

use crate::channel::ChannelId;
use crate::dispatch::LABEL_LEN;
use crate::error::SensorError;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Maximum number of named readings in one [`Measurement`].
pub const MAX_READINGS: usize = 8;

/// Named quantity carried by a [`Measurement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorChannel {
    /// Optical rotational speed (RPM).
    MotorSpeed,
    /// Load-cell thrust.
    Thrust,
    Torque,
    Voltage,
    Current,
}

/// One named reading with its raw ("working") value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub channel: SensorChannel,
    pub working_value: f64,
}

/// One averaged reading of every sensor the source exposes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measurement {
    readings: heapless::Vec<Reading, MAX_READINGS>,
}

impl Measurement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; a reading for an existing channel replaces it.
    /// Readings past capacity are dropped.
    #[must_use]
    pub fn with(mut self, channel: SensorChannel, working_value: f64) -> Self {
        self.insert(channel, working_value);
        self
    }

    pub fn insert(&mut self, channel: SensorChannel, working_value: f64) {
        if let Some(r) = self.readings.iter_mut().find(|r| r.channel == channel) {
            r.working_value = working_value;
        } else {
            let _ = self.readings.push(Reading {
                channel,
                working_value,
            });
        }
    }

    pub fn get(&self, channel: SensorChannel) -> Option<f64> {
        self.readings
            .iter()
            .find(|r| r.channel == channel)
            .map(|r| r.working_value)
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }
}

/// Read-side port: the domain calls this once per tick.
pub trait SensorPort {
    /// Return exactly one reading averaged over `sample_count` samples.
    fn read(&mut self, sample_count: u32) -> Result<Measurement, SensorError>;

    /// Zero the load cells.  Sources without a tare do nothing.
    fn tare(&mut self) {}
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to command the outputs.
///
/// Implementations must apply all `values` together; a partially applied
/// multi-channel write must never be observable.  A value outside the active
/// protocol's range deactivates that channel instead of failing.
pub trait ActuatorPort {
    /// `channels` and `values` have equal length.
    fn write(&mut self, channels: &[ChannelId], values: &[f64]);

    fn write_one(&mut self, channel: ChannelId, value: f64) {
        self.write(&[channel], &[value]);
    }
}

// ───────────────────────────────────────────────────────────────
// Log sink port (driven adapter: domain → data log)
// ───────────────────────────────────────────────────────────────

/// Maximum number of fields in one [`LogRecord`].
pub const MAX_LOG_FIELDS: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    /// Sized to hold a full run label.
    Text(heapless::String<LABEL_LEN>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Flat, ordered record of named fields; one per completed correction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogRecord {
    fields: heapless::Vec<(&'static str, FieldValue), MAX_LOG_FIELDS>,
}

impl LogRecord {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn number(mut self, name: &'static str, value: f64) -> Self {
        let _ = self.fields.push((name, FieldValue::Number(value)));
        self
    }

    /// Text is truncated to the field capacity.
    #[must_use]
    pub fn text(mut self, name: &'static str, value: &str) -> Self {
        let mut s = heapless::String::new();
        for c in value.chars() {
            if s.push(c).is_err() {
                break;
            }
        }
        let _ = self.fields.push((name, FieldValue::Text(s)));
        self
    }

    pub fn fields(&self) -> &[(&'static str, FieldValue)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn number_of(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(FieldValue::Number(v)) => Some(*v),
            _ => None,
        }
    }
}

/// Receives one [`LogRecord`] per completed correction.  The core does not
/// depend on the record's on-disk format.
pub trait LogSink {
    fn record(&mut self, record: &LogRecord);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → console / host)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (console, host link).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
