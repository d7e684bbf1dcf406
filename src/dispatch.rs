//! Command dispatcher.
//!
//! Maps discrete operator events onto controller mutations.  Key presses go
//! through a data-driven [`DispatchTable`] (`key → Effect`); textual host
//! messages are parsed into [`HostMessage`]s.  Both are applied through a
//! [`TuningContext`] that borrows the live corrector and the per-mode gain
//! profiles, so the active profile always mirrors the corrector.
//!
//! Effects that reach beyond the controller (run start, stop, tare, signals
//! to the host) are returned as an [`Outcome`] for the service to act on.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{ControlMode, ModeProfiles};
use crate::control::pid::{Gain, PidCorrector};
use crate::error::{ConfigError, MessageError};

// ═══════════════════════════════════════════════════════════════
//  Effects and the dispatch table
// ═══════════════════════════════════════════════════════════════

/// Out-of-band signal to the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Start,
    End,
}

impl Signal {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// Multiply a gain (user units) by `factor`.
    ScaleGain { gain: Gain, factor: f64 },
    /// Multiply the integral anti-windup bound by `factor`.
    ScaleIntegralLimit { factor: f64 },
    /// Move the setpoint by `steps` multiples of the active profile's step.
    StepTarget { steps: f64 },
    SetTarget { value: f64 },
    SetGain { gain: Gain, value: f64 },
    /// Set the mark column written to every log record.
    SetMark { value: f64 },
    Notify { signal: Signal },
    Tare,
    Stop,
}

/// Maximum number of key bindings.
pub const MAX_BINDINGS: usize = 32;

/// Key-code → effect bindings.  Key codes are upper-case ASCII.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchTable {
    entries: heapless::Vec<(u8, Effect), MAX_BINDINGS>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default operator keyboard:
    ///
    /// | Keys | Effect |
    /// |---|---|
    /// | E / D | kp × / ÷ `factor` |
    /// | W / S | kd × / ÷ `factor` |
    /// | Q / A | ki × / ÷ `factor` |
    /// | T / G | integral limit × / ÷ `factor` |
    /// | R / F | setpoint ± one step |
    /// | H / I | send start / end to the host |
    /// | 0–9 | log mark |
    pub fn keyboard(factor: f64) -> Self {
        let mut table = Self::new();
        let inverse = 1.0 / factor;
        let bindings = [
            (b'E', Effect::ScaleGain { gain: Gain::Proportional, factor }),
            (b'D', Effect::ScaleGain { gain: Gain::Proportional, factor: inverse }),
            (b'W', Effect::ScaleGain { gain: Gain::Derivative, factor }),
            (b'S', Effect::ScaleGain { gain: Gain::Derivative, factor: inverse }),
            (b'Q', Effect::ScaleGain { gain: Gain::Integral, factor }),
            (b'A', Effect::ScaleGain { gain: Gain::Integral, factor: inverse }),
            (b'T', Effect::ScaleIntegralLimit { factor }),
            (b'G', Effect::ScaleIntegralLimit { factor: inverse }),
            (b'R', Effect::StepTarget { steps: 1.0 }),
            (b'F', Effect::StepTarget { steps: -1.0 }),
            (b'H', Effect::Notify { signal: Signal::Start }),
            (b'I', Effect::Notify { signal: Signal::End }),
        ];
        for (key, effect) in bindings {
            let _ = table.bind(key, effect);
        }
        for digit in b'0'..=b'9' {
            let _ = table.bind(
                digit,
                Effect::SetMark {
                    value: f64::from(digit - b'0'),
                },
            );
        }
        table
    }

    /// Bind `key`, replacing any existing binding.
    pub fn bind(&mut self, key: u8, effect: Effect) -> Result<(), ConfigError> {
        let key = key.to_ascii_uppercase();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = effect;
            return Ok(());
        }
        self.entries
            .push((key, effect))
            .map_err(|_| ConfigError::InvalidValue("too many key bindings"))
    }

    pub fn lookup(&self, key: u8) -> Option<&Effect> {
        let key = key.to_ascii_uppercase();
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Host messages
// ═══════════════════════════════════════════════════════════════

/// Capacity of a run label.
pub const LABEL_LEN: usize = 48;

pub type RunLabel = heapless::String<LABEL_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// Closed-loop regulation in the given mode.
    Constant(ControlMode),
    Polar,
}

/// Parameters of a host-requested run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub kind: RunKind,
    /// `Run_<id><name>_<tag>`.
    pub label: RunLabel,
    pub speed_target: Option<f64>,
    pub thrust_target: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostMessage {
    Start(RunRequest),
    SetTarget { mode: ControlMode, value: f64 },
    SetKp { mode: ControlMode, value: f64 },
    Mark(f64),
    Stop,
    Tare,
}

impl HostMessage {
    /// Parse one comma-separated message, e.g. `RPM,2500` or
    /// `Start,12,2500,prop,a,x,Constant_RPM,1.5`.
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        let text = text.trim();
        let field = |i: usize| text.split(',').nth(i).map(str::trim);
        let number = |i: usize| -> Result<f64, MessageError> {
            let raw = field(i).ok_or(MessageError::MissingField(i))?;
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or(MessageError::BadNumber(i))
        };
        let optional = |i: usize| field(i).and_then(|f| f.parse::<f64>().ok()).filter(|v| v.is_finite());

        if text.starts_with("Start,") {
            let kind = if text.contains("Constant_RPM") {
                RunKind::Constant(ControlMode::Speed)
            } else if text.contains("Constant_Thrust") {
                RunKind::Constant(ControlMode::Thrust)
            } else if text.contains("Polar") {
                RunKind::Polar
            } else {
                return Err(MessageError::UnknownRunKind);
            };
            let mut label = RunLabel::new();
            for part in ["Run_", field(1).unwrap_or(""), field(3).unwrap_or(""), "_", field(4).unwrap_or("")] {
                for c in part.chars() {
                    if label.push(c).is_err() {
                        break;
                    }
                }
            }
            Ok(Self::Start(RunRequest {
                kind,
                label,
                speed_target: optional(2),
                thrust_target: optional(7),
            }))
        } else if text.starts_with("RPM") {
            Ok(Self::SetTarget {
                mode: ControlMode::Speed,
                value: number(1)?,
            })
        } else if text.starts_with("Thrust") {
            Ok(Self::SetTarget {
                mode: ControlMode::Thrust,
                value: number(1)?,
            })
        } else if text.starts_with("Mark") {
            Ok(Self::Mark(number(1)?))
        } else if text.starts_with("kpT") {
            Ok(Self::SetKp {
                mode: ControlMode::Thrust,
                value: number(1)?,
            })
        } else if text.starts_with("kp") {
            Ok(Self::SetKp {
                mode: ControlMode::Speed,
                value: number(1)?,
            })
        } else if text.starts_with("Stop") {
            Ok(Self::Stop)
        } else if text.starts_with("Tare") {
            Ok(Self::Tare)
        } else {
            Err(MessageError::UnknownCommand)
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Dispatcher
// ═══════════════════════════════════════════════════════════════

/// What the service must do after an event was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Controller state changed (or nothing else to do).
    Applied,
    Notify(Signal),
    StartRun(RunRequest),
    Stop,
    Tare,
    /// No binding for the key.
    Unmapped,
}

/// Mutable view of everything the dispatcher may change.
pub struct TuningContext<'a> {
    pub corrector: &'a mut PidCorrector,
    pub profiles: &'a mut ModeProfiles,
    /// Mode the corrector is currently regulating.
    pub mode: ControlMode,
    pub mark: &'a mut f64,
}

impl TuningContext<'_> {
    /// Copy the live gains and setpoint into the active profile.
    fn sync_profile(&mut self) {
        let profile = self.profiles.get_mut(self.mode);
        profile.kp = self.corrector.gain(Gain::Proportional);
        profile.ki = self.corrector.gain(Gain::Integral);
        profile.kd = self.corrector.gain(Gain::Derivative);
        profile.target = self.corrector.target();
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    table: DispatchTable,
}

impl Dispatcher {
    pub fn new(table: DispatchTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    pub fn on_key(&self, key: u8, ctx: &mut TuningContext<'_>) -> Outcome {
        match self.table.lookup(key) {
            Some(effect) => apply(effect, ctx),
            None => Outcome::Unmapped,
        }
    }

    pub fn on_message(&self, message: &HostMessage, ctx: &mut TuningContext<'_>) -> Outcome {
        match message {
            HostMessage::Start(request) => Outcome::StartRun(request.clone()),
            HostMessage::SetTarget { mode, value } => {
                ctx.profiles.get_mut(*mode).target = *value;
                if *mode == ctx.mode {
                    ctx.corrector.set_target(*value);
                }
                info!("Dispatch: {:?} target {:.2}", mode, value);
                Outcome::Applied
            }
            HostMessage::SetKp { mode, value } => {
                ctx.profiles.get_mut(*mode).kp = *value;
                if *mode == ctx.mode {
                    ctx.corrector.set_gain(Gain::Proportional, *value);
                }
                info!("Dispatch: {:?} kp {:.5}", mode, value);
                Outcome::Applied
            }
            HostMessage::Mark(value) => apply(&Effect::SetMark { value: *value }, ctx),
            HostMessage::Stop => Outcome::Stop,
            HostMessage::Tare => Outcome::Tare,
        }
    }
}

/// Apply one effect to the controller.
pub fn apply(effect: &Effect, ctx: &mut TuningContext<'_>) -> Outcome {
    match *effect {
        Effect::ScaleGain { gain, factor } => {
            ctx.corrector.scale_gain(gain, factor);
            ctx.sync_profile();
        }
        Effect::ScaleIntegralLimit { factor } => ctx.corrector.scale_integral_max(factor),
        Effect::StepTarget { steps } => {
            let step = ctx.profiles.get(ctx.mode).target_step;
            ctx.corrector.adjust_target(steps * step);
            ctx.sync_profile();
        }
        Effect::SetTarget { value } => {
            ctx.corrector.set_target(value);
            ctx.sync_profile();
        }
        Effect::SetGain { gain, value } => {
            ctx.corrector.set_gain(gain, value);
            ctx.sync_profile();
        }
        Effect::SetMark { value } => {
            if value.is_finite() {
                *ctx.mark = value;
                info!("Mark: {}", value);
            } else {
                warn!("Mark: ignoring non-finite value");
            }
        }
        Effect::Notify { signal } => return Outcome::Notify(signal),
        Effect::Tare => return Outcome::Tare,
        Effect::Stop => return Outcome::Stop,
    }
    Outcome::Applied
}
