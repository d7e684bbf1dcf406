//! Bench service: the hexagonal core.
//!
//! [`BenchService`] owns the controller state, the sample scheduler, the
//! dispatcher and the single active control source.  All I/O flows through
//! port traits injected at call sites, making the whole service testable
//! with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │         BenchService         │
//! ActuatorPort ◀──│  PID · Ramp · Sweep · Polar  │ ──▶ LogSink
//!                 └──────────────────────────────┘
//! ```
//!
//! Exactly one [`ControlSource`] drives the outputs at a time.  Starting a
//! new source cancels the previous one: its pending timer stage is discarded
//! and it issues no further writes.

use log::{debug, info, warn};

use crate::channel::{Channels, Values};
use crate::config::{BenchConfig, ControlMode};
use crate::control::pid::{CorrectionTerms, Gain, PidCorrector, PidParams};
use crate::control::program::SetpointProgram;
use crate::dispatch::{DispatchTable, Dispatcher, Outcome, RunKind, RunLabel, TuningContext};
use crate::error::Error;
use crate::mailbox::BenchEvent;
use crate::scheduler::{SampleScheduler, TickReport};
use crate::timer::OneShot;
use crate::trajectory::{PolarProfile, Ramp, StepHandle, Sweep, SweepEvent, SweepSpec, TrajectorySpec};

use super::events::{AppEvent, SourceKind, StatusData};
use super::ports::{ActuatorPort, EventSink, LogRecord, LogSink, SensorChannel, SensorPort};

// ───────────────────────────────────────────────────────────────
// Control sources
// ───────────────────────────────────────────────────────────────

/// Timed stages of the run start-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartupStage {
    /// Arming done: write the spin-up value.
    SpinUp,
    /// Spin-up done: close the loop.
    CloseLoop,
    /// Arming done: begin the polar profile.
    BeginPolar,
}

/// The one thing currently allowed to write the outputs.
#[derive(Debug, Clone)]
pub enum ControlSource {
    Idle,
    Startup { kind: RunKind },
    Regulating,
    Ramp(Ramp),
    Sweep(Sweep),
    Polar(PolarProfile),
}

impl ControlSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Idle => SourceKind::Idle,
            Self::Startup { .. } => SourceKind::Startup,
            Self::Regulating => SourceKind::Regulating,
            Self::Ramp(_) => SourceKind::Ramp,
            Self::Sweep(_) => SourceKind::Sweep,
            Self::Polar(_) => SourceKind::Polar,
        }
    }
}

/// Sensor channel the loop regulates on in `mode`.
pub fn feedback_for(mode: ControlMode) -> SensorChannel {
    match mode {
        ControlMode::Speed => SensorChannel::MotorSpeed,
        ControlMode::Thrust => SensorChannel::Thrust,
    }
}

// ───────────────────────────────────────────────────────────────
// BenchService
// ───────────────────────────────────────────────────────────────

pub struct BenchService {
    config: BenchConfig,
    mode: ControlMode,
    corrector: PidCorrector,
    scheduler: SampleScheduler,
    dispatcher: Dispatcher,
    source: ControlSource,
    stage_timer: OneShot<StartupStage>,
    program: Option<SetpointProgram>,
    program_started: Option<f64>,
    mark: f64,
    run_label: RunLabel,
    run_started_at: f64,
    next_status: f64,
    next_sweep_id: u32,
    tick_count: u64,
}

impl BenchService {
    /// Construct the service from a validated configuration.  Nothing is
    /// written until a control source is started.
    pub fn new(config: BenchConfig) -> Result<Self, Error> {
        config.validate()?;
        let mode = config.default_mode;
        let corrector = PidCorrector::new(PidParams::from_config(&config, mode))?;
        let scheduler = SampleScheduler::new(
            config.tick_secs,
            config.sample_count,
            feedback_for(mode),
            config.channel,
        )?;
        let dispatcher = Dispatcher::new(DispatchTable::keyboard(config.gain_step_factor));
        info!(
            "BenchService: {} on {:?}, tick {:.3}s, mode {:?}",
            config.channel, config.protocol, config.tick_secs, mode
        );
        Ok(Self {
            config,
            mode,
            corrector,
            scheduler,
            dispatcher,
            source: ControlSource::Idle,
            stage_timer: OneShot::new(),
            program: None,
            program_started: None,
            mark: 0.0,
            run_label: RunLabel::new(),
            run_started_at: 0.0,
            next_status: 0.0,
            next_sweep_id: 1,
            tick_count: 0,
        })
    }

    /// Replace the key bindings.
    #[must_use]
    pub fn with_dispatch_table(mut self, table: DispatchTable) -> Self {
        self.dispatcher = Dispatcher::new(table);
        self
    }

    /// Attach (or clear) the setpoint program used by the next regulation.
    pub fn set_program(&mut self, program: Option<SetpointProgram>) {
        self.program = program;
    }

    // ── Starting control sources ──────────────────────────────

    /// Begin a run: arm the ESC, then either spin up and close the loop
    /// (`Constant`) or start the polar profile (`Polar`).
    pub fn start_run(
        &mut self,
        kind: RunKind,
        now: f64,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        let stage = match kind {
            RunKind::Constant(mode) => {
                self.select_mode(mode)?;
                StartupStage::SpinUp
            }
            RunKind::Polar => StartupStage::BeginPolar,
        };
        self.set_source(ControlSource::Startup { kind }, sink);
        self.run_started_at = now;
        info!(
            "Run: arming {} at {:.0} for {:.1}s",
            self.config.channel, self.config.arm_output, self.config.arm_secs
        );
        hw.write_one(self.config.channel, self.config.arm_output);
        self.stage_timer.after(now, self.config.arm_secs, stage)?;
        Ok(())
    }

    /// Close the loop in `mode` immediately, seeding the corrector at the
    /// spin-up value.  Gains and setpoint are kept.
    pub fn regulate(
        &mut self,
        mode: ControlMode,
        now: f64,
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        if mode != self.mode {
            self.select_mode(mode)?;
        }
        if !matches!(self.source, ControlSource::Startup { .. }) {
            self.run_started_at = now;
        }
        self.corrector.reset(self.config.spinup_output);
        self.set_source(ControlSource::Regulating, sink);
        self.scheduler.start(now);
        self.program_started = self.program.as_ref().map(|_| now);
        self.next_status = now;
        Ok(())
    }

    pub fn start_ramp(&mut self, spec: TrajectorySpec, now: f64, sink: &mut impl EventSink) {
        self.set_source(ControlSource::Ramp(Ramp::new(spec, now)), sink);
    }

    /// Start a stepped sweep; returns its id.
    pub fn start_sweep(&mut self, spec: SweepSpec, now: f64, sink: &mut impl EventSink) -> u32 {
        let id = self.next_sweep_id;
        self.next_sweep_id = self.next_sweep_id.wrapping_add(1);
        self.set_source(ControlSource::Sweep(Sweep::start(spec, id, now)), sink);
        id
    }

    /// Continue a settled sweep step.  Stale handles are ignored.
    pub fn resume_sweep(&mut self, handle: StepHandle, now: f64) -> bool {
        match &mut self.source {
            ControlSource::Sweep(sweep) => {
                let resumed = sweep.resume(handle, now);
                if !resumed {
                    debug!("Sweep: ignoring stale resume for step {}", handle.step());
                }
                resumed
            }
            _ => false,
        }
    }

    // ── Stopping ──────────────────────────────────────────────

    /// Stop whatever is running and write the safe value to every output the
    /// source was driving.  Nothing is written after this returns.
    pub fn stop(&mut self, hw: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        let channels: Channels = match &self.source {
            ControlSource::Ramp(r) => r.spec().channels().iter().copied().collect(),
            ControlSource::Sweep(s) => s.spec().base().channels().iter().copied().collect(),
            _ => Channels::new(),
        };
        info!("Run: stop, writing safe value {:.0}", self.config.safe_output);
        self.scheduler.stop(hw, self.config.safe_output);
        if !channels.is_empty() {
            let values: Values = channels.iter().map(|_| self.config.safe_output).collect();
            hw.write(&channels, &values);
        }
        self.set_source(ControlSource::Idle, sink);
    }

    /// Abandon the active source between ticks without writing; the outputs
    /// keep their last written values.
    pub fn cancel(&mut self, sink: &mut impl EventSink) {
        self.set_source(ControlSource::Idle, sink);
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Advance the active control source to `now`.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`ActuatorPort`], which avoids a double mutable borrow while keeping
    /// the port boundary explicit.
    pub fn tick<H>(&mut self, now: f64, hw: &mut H, log: &mut impl LogSink, sink: &mut impl EventSink)
    where
        H: SensorPort + ActuatorPort,
    {
        self.tick_count += 1;

        if let Some(stage) = self.stage_timer.poll(now) {
            self.run_stage(stage, now, hw, sink);
        }

        match &mut self.source {
            ControlSource::Idle | ControlSource::Startup { .. } => {}
            ControlSource::Regulating => self.regulation_tick(now, hw, log, sink),
            ControlSource::Ramp(ramp) => {
                if ramp.drive(now, hw) {
                    sink.emit(&AppEvent::RampFinished);
                    self.set_source(ControlSource::Idle, sink);
                }
            }
            ControlSource::Sweep(sweep) => {
                let events = sweep.advance(now, hw);
                for event in events {
                    match event {
                        SweepEvent::StepSettled { handle, last } => {
                            sink.emit(&AppEvent::StepSettled { handle, last });
                        }
                        SweepEvent::Finished { .. } => {
                            sink.emit(&AppEvent::SweepFinished);
                            self.set_source(ControlSource::Idle, sink);
                        }
                    }
                }
            }
            ControlSource::Polar(polar) => {
                if polar.advance(now, hw) {
                    sink.emit(&AppEvent::PolarFinished);
                    self.set_source(ControlSource::Idle, sink);
                }
            }
        }
    }

    // ── Event handling ────────────────────────────────────────

    /// Apply one operator event (key press or host message).
    pub fn handle_event<H>(&mut self, event: &BenchEvent, now: f64, hw: &mut H, sink: &mut impl EventSink)
    where
        H: SensorPort + ActuatorPort,
    {
        let outcome = {
            let mut ctx = TuningContext {
                corrector: &mut self.corrector,
                profiles: &mut self.config.profiles,
                mode: self.mode,
                mark: &mut self.mark,
            };
            match event {
                BenchEvent::Key(key) => self.dispatcher.on_key(*key, &mut ctx),
                BenchEvent::Message(message) => self.dispatcher.on_message(message, &mut ctx),
            }
        };
        // The next mode select rebuilds the corrector from the config.
        self.config.integral_max = self.corrector.state().integral_max();

        match outcome {
            Outcome::Applied => {}
            Outcome::Unmapped => debug!("Dispatch: unmapped event {:?}", event),
            Outcome::Notify(signal) => {
                info!("Send {}", signal.as_str());
                sink.emit(&AppEvent::Signal(signal));
            }
            Outcome::StartRun(request) => {
                if let Some(v) = request.speed_target {
                    self.config.profiles.speed.target = v;
                }
                if let Some(v) = request.thrust_target {
                    self.config.profiles.thrust.target = v;
                }
                self.run_label = request.label.clone();
                let mode = match request.kind {
                    RunKind::Constant(mode) => Some(mode),
                    RunKind::Polar => None,
                };
                sink.emit(&AppEvent::RunStarted {
                    label: request.label,
                    mode,
                });
                if let Err(e) = self.start_run(request.kind, now, hw, sink) {
                    warn!("Run: start failed: {}", e);
                }
            }
            Outcome::Stop => self.stop(hw, sink),
            Outcome::Tare => {
                hw.tare();
                sink.emit(&AppEvent::Tared);
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn source(&self) -> &ControlSource {
        &self.source
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn corrector(&self) -> &PidCorrector {
        &self.corrector
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn mark(&self) -> f64 {
        self.mark
    }

    pub fn run_label(&self) -> &str {
        &self.run_label
    }

    pub fn scheduler(&self) -> &SampleScheduler {
        &self.scheduler
    }

    /// Total ticks executed since construction.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Internal ──────────────────────────────────────────────

    fn set_source(&mut self, next: ControlSource, sink: &mut impl EventSink) {
        self.stage_timer.cancel();
        self.scheduler.halt();
        if !matches!(next, ControlSource::Regulating) {
            self.program_started = None;
        }
        let from = self.source.kind();
        let to = next.kind();
        self.source = next;
        if from != to {
            info!("Source: {:?} -> {:?}", from, to);
            sink.emit(&AppEvent::SourceChanged { from, to });
        }
    }

    fn select_mode(&mut self, mode: ControlMode) -> Result<(), Error> {
        self.corrector = PidCorrector::new(PidParams::from_config(&self.config, mode))?;
        self.scheduler.set_feedback(feedback_for(mode));
        self.mode = mode;
        Ok(())
    }

    fn run_stage<H>(&mut self, stage: StartupStage, now: f64, hw: &mut H, sink: &mut impl EventSink)
    where
        H: SensorPort + ActuatorPort,
    {
        match stage {
            StartupStage::SpinUp => {
                info!(
                    "Run: spin-up at {:.0} for {:.1}s",
                    self.config.spinup_output, self.config.spinup_secs
                );
                hw.write_one(self.config.channel, self.config.spinup_output);
                if let Err(e) = self
                    .stage_timer
                    .after(now, self.config.spinup_secs, StartupStage::CloseLoop)
                {
                    warn!("Run: {}", e);
                    self.stop(hw, sink);
                }
            }
            StartupStage::CloseLoop => {
                if let Err(e) = self.regulate(self.mode, now, sink) {
                    warn!("Run: {}", e);
                    self.stop(hw, sink);
                }
            }
            StartupStage::BeginPolar => {
                match PolarProfile::start(self.config.channel, self.config.polar, now, hw) {
                    Ok(polar) => self.set_source(ControlSource::Polar(polar), sink),
                    Err(e) => {
                        warn!("Polar: {}", e);
                        self.stop(hw, sink);
                    }
                }
            }
        }
    }

    fn regulation_tick<H>(&mut self, now: f64, hw: &mut H, log: &mut impl LogSink, sink: &mut impl EventSink)
    where
        H: SensorPort + ActuatorPort,
    {
        let mut step_time = 0.0;
        if let (Some(program), Some(started)) = (&self.program, self.program_started) {
            match program.locate(now - started) {
                Some(pos) => {
                    step_time = pos.step_elapsed;
                    if pos.target != self.corrector.target() {
                        self.corrector.set_target(pos.target);
                        self.config.profiles.get_mut(self.mode).target = pos.target;
                    }
                }
                None => {
                    info!("Program: finished");
                    self.stop(hw, sink);
                    sink.emit(&AppEvent::ProgramFinished);
                    return;
                }
            }
        }

        let Some(TickReport::Corrected {
            measurement,
            output,
            terms,
        }) = self.scheduler.poll(now, hw, &mut self.corrector)
        else {
            return;
        };

        log.record(&self.log_record(now, &terms, step_time));

        if now >= self.next_status {
            self.next_status = now + self.config.status_interval_secs;
            let status = StatusData {
                mode: self.mode,
                target: self.corrector.target(),
                measurement,
                output,
                error: terms.error,
                proportional: terms.proportional,
                integral: terms.integral,
                derivative: terms.derivative,
            };
            sink.emit(&AppEvent::Status(status));
        }
    }

    /// One data-log row: the run label followed by the controller terms.
    fn log_record(&self, now: f64, terms: &CorrectionTerms, step_time: f64) -> LogRecord {
        let state = self.corrector.state();
        LogRecord::new()
            .text("run", &self.run_label)
            .number("time", now - self.run_started_at)
            .number("output", terms.output)
            .number("target", state.target())
            .number("change", terms.change)
            .number("integral", state.integral())
            .number("p", terms.proportional)
            .number("i", terms.integral)
            .number("d", terms.derivative)
            .number("kp", self.corrector.gain(Gain::Proportional))
            .number("ki", self.corrector.gain(Gain::Integral))
            .number("kd", self.corrector.gain(Gain::Derivative))
            .number("mark", self.mark)
            .number("step_time", step_time)
    }
}
