//! Integration tests for the BenchService → scheduler → outputs pipeline.
//!
//! These run on the host and drive the service with explicit timestamps,
//! checking the full chain from an operator event or a due tick down to the
//! actuator writes, data-log records and outbound events.

use super::mock_bench::{MockBench, RecordingLog, RecordingSink};

use rotorbench::app::events::{AppEvent, SourceKind};
use rotorbench::app::ports::FieldValue;
use rotorbench::app::service::BenchService;
use rotorbench::channel::ChannelId;
use rotorbench::config::{BenchConfig, ControlMode, PolarConfig};
use rotorbench::control::pid::Gain;
use rotorbench::control::program::{ProgramStep, SetpointProgram};
use rotorbench::dispatch::{HostMessage, RunKind, Signal};
use rotorbench::mailbox::BenchEvent;

const TICK: f64 = 0.025;

fn make_service() -> (BenchService, MockBench, RecordingLog, RecordingSink) {
    let svc = BenchService::new(BenchConfig::default()).unwrap();
    (svc, MockBench::new(), RecordingLog::new(), RecordingSink::new())
}

/// Timestamp of the `k`-th tick after `start`, nudged past the due time.
fn tick_at(start: f64, k: u32) -> f64 {
    start + f64::from(k) * TICK + 1e-6
}

fn message(text: &str) -> BenchEvent {
    BenchEvent::Message(HostMessage::parse(text).unwrap())
}

// ── Start-up sequence ────────────────────────────────────────

#[test]
fn constant_run_arms_spins_up_and_closes_loop() {
    let (mut svc, mut hw, mut log, mut sink) = make_service();

    svc.start_run(RunKind::Constant(ControlMode::Speed), 0.0, &mut hw, &mut sink)
        .unwrap();
    assert_eq!(hw.values_on(ChannelId::EscA), vec![1000.0]);
    assert_eq!(svc.source_kind(), SourceKind::Startup);

    // Still arming.
    svc.tick(1.0, &mut hw, &mut log, &mut sink);
    assert_eq!(hw.writes.len(), 1);

    svc.tick(2.0, &mut hw, &mut log, &mut sink);
    assert_eq!(hw.last_value(ChannelId::EscA), Some(1150.0));
    assert_eq!(svc.source_kind(), SourceKind::Startup);
    assert!(log.records.is_empty(), "no records before the loop closes");

    svc.tick(6.0, &mut hw, &mut log, &mut sink);
    assert_eq!(svc.source_kind(), SourceKind::Regulating);
    assert_eq!(log.records.len(), 1);

    // First correction from the spin-up value: P 1.25, D clipped to -20,
    // I 0.0125.
    let output = hw.last_value(ChannelId::EscA).unwrap();
    assert!((output - 1131.2625).abs() < 1e-9, "got {output}");

    assert_eq!(
        sink.events.first(),
        Some(&AppEvent::SourceChanged {
            from: SourceKind::Idle,
            to: SourceKind::Startup
        })
    );
    assert!(sink.events.contains(&AppEvent::SourceChanged {
        from: SourceKind::Startup,
        to: SourceKind::Regulating
    }));
}

#[test]
fn log_record_carries_controller_terms_in_order() {
    let (mut svc, mut hw, mut log, mut sink) = make_service();
    svc.regulate(ControlMode::Speed, 0.0, &mut sink).unwrap();
    svc.tick(0.0, &mut hw, &mut log, &mut sink);

    let record = &log.records[0];
    let names: Vec<&str> = record.fields().iter().map(|(n, _)| *n).collect();
    assert_eq!(
        names,
        vec![
            "run", "time", "output", "target", "change", "integral", "p", "i", "d", "kp", "ki",
            "kd", "mark", "step_time"
        ]
    );
    assert_eq!(record.number_of("target"), Some(2500.0));
    assert_eq!(record.number_of("change"), Some(2000.0));
    assert_eq!(record.number_of("integral"), Some(500.0));
    assert_eq!(record.number_of("d"), Some(-20.0));
    assert_eq!(record.number_of("kp"), Some(svc.corrector().gain(Gain::Proportional)));
}

// ── Stopping ─────────────────────────────────────────────────

#[test]
fn stop_writes_safe_value_then_nothing() {
    let (mut svc, mut hw, mut log, mut sink) = make_service();
    svc.regulate(ControlMode::Speed, 0.0, &mut sink).unwrap();
    for k in 0..4 {
        svc.tick(tick_at(0.0, k), &mut hw, &mut log, &mut sink);
    }
    assert_eq!(hw.writes.len(), 4);

    svc.stop(&mut hw, &mut sink);
    assert_eq!(hw.last_value(ChannelId::EscA), Some(1050.0));
    assert_eq!(svc.source_kind(), SourceKind::Idle);

    let writes = hw.writes.len();
    let records = log.records.len();
    for k in 4..40 {
        svc.tick(tick_at(0.0, k), &mut hw, &mut log, &mut sink);
    }
    assert_eq!(hw.writes.len(), writes, "no write after stop");
    assert_eq!(log.records.len(), records);
}

#[test]
fn host_stop_message_stops_run() {
    let (mut svc, mut hw, mut log, mut sink) = make_service();
    svc.regulate(ControlMode::Speed, 0.0, &mut sink).unwrap();
    svc.tick(0.0, &mut hw, &mut log, &mut sink);

    svc.handle_event(&message("Stop"), 0.01, &mut hw, &mut sink);
    assert_eq!(svc.source_kind(), SourceKind::Idle);
    assert_eq!(hw.last_value(ChannelId::EscA), Some(1050.0));
}

#[test]
fn stop_during_startup_discards_pending_spinup() {
    let (mut svc, mut hw, mut log, mut sink) = make_service();
    svc.start_run(RunKind::Constant(ControlMode::Speed), 0.0, &mut hw, &mut sink)
        .unwrap();
    svc.stop(&mut hw, &mut sink);

    svc.tick(2.5, &mut hw, &mut log, &mut sink);
    svc.tick(7.0, &mut hw, &mut log, &mut sink);
    assert_eq!(hw.values_on(ChannelId::EscA), vec![1000.0, 1050.0]);
    assert_eq!(svc.source_kind(), SourceKind::Idle);
}

// ── Sensor failures ──────────────────────────────────────────

#[test]
fn sensor_failure_skips_tick_without_write_or_record() {
    let (mut svc, mut hw, mut log, mut sink) = make_service();
    svc.regulate(ControlMode::Speed, 0.0, &mut sink).unwrap();
    svc.tick(tick_at(0.0, 0), &mut hw, &mut log, &mut sink);
    let output = svc.corrector().output();

    hw.failing = true;
    svc.tick(tick_at(0.0, 1), &mut hw, &mut log, &mut sink);
    assert_eq!(hw.writes.len(), 1);
    assert_eq!(log.records.len(), 1);
    assert_eq!(svc.corrector().output(), output, "controller state untouched");

    hw.failing = false;
    svc.tick(tick_at(0.0, 2), &mut hw, &mut log, &mut sink);
    assert_eq!(hw.writes.len(), 2);
    assert_eq!(log.records.len(), 2);
    assert_eq!(svc.source_kind(), SourceKind::Regulating);
}

// ── Operator events ──────────────────────────────────────────

#[test]
fn tuning_keys_adjust_live_gains_and_profile() {
    let (mut svc, mut hw, _log, mut sink) = make_service();
    svc.regulate(ControlMode::Speed, 0.0, &mut sink).unwrap();
    let kp = svc.corrector().gain(Gain::Proportional);

    svc.handle_event(&BenchEvent::Key(b'E'), 0.0, &mut hw, &mut sink);
    let raised = svc.corrector().gain(Gain::Proportional);
    assert!((raised - kp * 1.1).abs() < 1e-12);
    assert!((svc.config().profiles.speed.kp - raised).abs() < 1e-12);

    svc.handle_event(&BenchEvent::Key(b'R'), 0.0, &mut hw, &mut sink);
    svc.handle_event(&BenchEvent::Key(b'R'), 0.0, &mut hw, &mut sink);
    assert_eq!(svc.corrector().target(), 2600.0);
    assert_eq!(svc.config().profiles.speed.target, 2600.0);

    svc.handle_event(&BenchEvent::Key(b'4'), 0.0, &mut hw, &mut sink);
    assert_eq!(svc.mark(), 4.0);

    // Tuning never writes outputs by itself.
    assert!(hw.writes.is_empty());
}

#[test]
fn integral_limit_tuning_survives_run_start() {
    let (mut svc, mut hw, _log, mut sink) = make_service();
    svc.handle_event(&BenchEvent::Key(b'T'), 0.0, &mut hw, &mut sink);
    svc.handle_event(&BenchEvent::Key(b'E'), 0.0, &mut hw, &mut sink);
    let integral_max = svc.corrector().state().integral_max();
    let kp = svc.corrector().gain(Gain::Proportional);
    assert!((integral_max - 1100.0).abs() < 1e-9);

    svc.start_run(RunKind::Constant(ControlMode::Speed), 1.0, &mut hw, &mut sink)
        .unwrap();
    assert_eq!(svc.corrector().state().integral_max(), integral_max);
    assert!((svc.corrector().gain(Gain::Proportional) - kp).abs() < 1e-12);
    assert_eq!(svc.config().integral_max, integral_max);

    // Also kept across a switch to the other mode.
    svc.start_run(RunKind::Constant(ControlMode::Thrust), 2.0, &mut hw, &mut sink)
        .unwrap();
    assert_eq!(svc.corrector().state().integral_max(), integral_max);
}

#[test]
fn signal_keys_emit_start_and_end() {
    let (mut svc, mut hw, _log, mut sink) = make_service();
    svc.handle_event(&BenchEvent::Key(b'H'), 0.0, &mut hw, &mut sink);
    svc.handle_event(&BenchEvent::Key(b'I'), 0.0, &mut hw, &mut sink);
    assert_eq!(
        sink.events,
        vec![AppEvent::Signal(Signal::Start), AppEvent::Signal(Signal::End)]
    );
}

#[test]
fn unmapped_key_changes_nothing() {
    let (mut svc, mut hw, _log, mut sink) = make_service();
    let before = svc.corrector().state().clone();
    svc.handle_event(&BenchEvent::Key(b'Z'), 0.0, &mut hw, &mut sink);
    assert_eq!(*svc.corrector().state(), before);
    assert!(sink.events.is_empty());
}

#[test]
fn host_target_for_inactive_mode_only_updates_profile() {
    let (mut svc, mut hw, _log, mut sink) = make_service();
    svc.handle_event(&message("Thrust,2.5"), 0.0, &mut hw, &mut sink);
    assert_eq!(svc.config().profiles.thrust.target, 2.5);
    assert_eq!(svc.corrector().target(), 2500.0);

    svc.handle_event(&message("RPM,3100"), 0.0, &mut hw, &mut sink);
    assert_eq!(svc.corrector().target(), 3100.0);
}

#[test]
fn host_start_message_labels_run_and_seeds_targets() {
    let (mut svc, mut hw, mut log, mut sink) = make_service();
    let start = message("Start,12,2600,prop,a,x,Constant_RPM,1.5");
    svc.handle_event(&start, 0.0, &mut hw, &mut sink);

    assert_eq!(svc.run_label(), "Run_12prop_a");
    assert_eq!(svc.source_kind(), SourceKind::Startup);
    assert_eq!(svc.config().profiles.thrust.target, 1.5);
    assert!(matches!(
        sink.events.first(),
        Some(AppEvent::RunStarted { label, mode: Some(ControlMode::Speed) }) if label.as_str() == "Run_12prop_a"
    ));

    svc.tick(2.0, &mut hw, &mut log, &mut sink);
    svc.tick(6.0, &mut hw, &mut log, &mut sink);
    assert_eq!(svc.corrector().target(), 2600.0);
    match log.records[0].get("run") {
        Some(FieldValue::Text(run)) => assert_eq!(run.as_str(), "Run_12prop_a"),
        other => panic!("unexpected run field {other:?}"),
    }
}

#[test]
fn thrust_run_regulates_on_thrust() {
    let (mut svc, mut hw, mut log, mut sink) = make_service();
    svc.start_run(RunKind::Constant(ControlMode::Thrust), 0.0, &mut hw, &mut sink)
        .unwrap();
    svc.tick(2.0, &mut hw, &mut log, &mut sink);
    svc.tick(6.0, &mut hw, &mut log, &mut sink);

    assert_eq!(svc.mode(), ControlMode::Thrust);
    let record = &log.records[0];
    assert_eq!(record.number_of("target"), Some(1.0));
    assert_eq!(record.number_of("change"), Some(0.5));
}

#[test]
fn tare_message_reaches_load_cells() {
    let (mut svc, mut hw, _log, mut sink) = make_service();
    svc.handle_event(&message("Tare"), 0.0, &mut hw, &mut sink);
    assert!(hw.tared);
    assert_eq!(sink.events, vec![AppEvent::Tared]);
}

// ── Status and programs ──────────────────────────────────────

#[test]
fn status_emitted_once_per_interval() {
    let (mut svc, mut hw, mut log, mut sink) = make_service();
    svc.regulate(ControlMode::Speed, 0.0, &mut sink).unwrap();
    for k in 0..70 {
        svc.tick(tick_at(0.0, k), &mut hw, &mut log, &mut sink);
    }
    let statuses = sink.count(|e| matches!(e, AppEvent::Status(_)));
    assert_eq!(statuses, 2);
    assert_eq!(log.records.len(), 70);

    let Some(AppEvent::Status(first)) = sink.events.iter().find(|e| matches!(e, AppEvent::Status(_)))
    else {
        unreachable!()
    };
    assert_eq!(first.mode, ControlMode::Speed);
    assert_eq!(first.measurement, 2000.0);
    assert_eq!(first.target, 2500.0);
}

#[test]
fn setpoint_program_steps_target_then_stops() {
    let (mut svc, mut hw, mut log, mut sink) = make_service();
    let program = SetpointProgram::new(
        &[
            ProgramStep { target: 2400.0, secs: 0.1 },
            ProgramStep { target: 2600.0, secs: 0.1 },
        ],
        1,
    )
    .unwrap();
    svc.set_program(Some(program));
    svc.regulate(ControlMode::Speed, 0.0, &mut sink).unwrap();

    svc.tick(0.0, &mut hw, &mut log, &mut sink);
    assert_eq!(svc.corrector().target(), 2400.0);

    svc.tick(0.15, &mut hw, &mut log, &mut sink);
    assert_eq!(svc.corrector().target(), 2600.0);
    let step_time = log.records.last().and_then(|r| r.number_of("step_time")).unwrap();
    assert!((step_time - 0.05).abs() < 1e-9);

    svc.tick(0.25, &mut hw, &mut log, &mut sink);
    assert_eq!(svc.source_kind(), SourceKind::Idle);
    assert_eq!(hw.last_value(ChannelId::EscA), Some(1050.0));
    assert_eq!(sink.events.last(), Some(&AppEvent::ProgramFinished));
}

// ── Polar runs ───────────────────────────────────────────────

#[test]
fn polar_run_plateaus_ramps_and_returns() {
    let config = BenchConfig {
        polar: PolarConfig {
            min_value: 1100.0,
            max_value: 1900.0,
            ramp_secs: 1.0,
            plateau_secs: 0.5,
        },
        ..BenchConfig::default()
    };
    let mut svc = BenchService::new(config).unwrap();
    let (mut hw, mut log, mut sink) = (MockBench::new(), RecordingLog::new(), RecordingSink::new());

    svc.start_run(RunKind::Polar, 0.0, &mut hw, &mut sink).unwrap();
    for now in [2.0, 2.5, 3.0, 3.5] {
        svc.tick(now, &mut hw, &mut log, &mut sink);
    }
    assert_eq!(svc.source_kind(), SourceKind::Polar);

    svc.tick(4.0, &mut hw, &mut log, &mut sink);
    assert_eq!(svc.source_kind(), SourceKind::Idle);
    assert_eq!(
        hw.values_on(ChannelId::EscA),
        vec![1000.0, 1100.0, 1100.0, 1500.0, 1900.0, 1100.0]
    );
    assert_eq!(sink.count(|e| *e == AppEvent::PolarFinished), 1);
    assert!(log.records.is_empty(), "polar runs are open loop");
}

// ── Ramps ────────────────────────────────────────────────────

#[test]
fn ramp_replaces_regulation_and_finishes_exactly() {
    use rotorbench::trajectory::TrajectorySpec;

    let (mut svc, mut hw, mut log, mut sink) = make_service();
    svc.regulate(ControlMode::Speed, 0.0, &mut sink).unwrap();
    svc.tick(0.0, &mut hw, &mut log, &mut sink);

    let spec = TrajectorySpec::new(
        &[ChannelId::EscA, ChannelId::ServoA],
        &[1100.0, 1500.0],
        &[1300.0, 1000.0],
        2.0,
    )
    .unwrap();
    svc.start_ramp(spec, 1.0, &mut sink);
    assert!(!svc.scheduler().is_running());

    svc.tick(2.0, &mut hw, &mut log, &mut sink);
    let mid = hw.last_write().unwrap();
    assert_eq!(mid.channels, vec![ChannelId::EscA, ChannelId::ServoA]);
    assert_eq!(mid.values, vec![1200.0, 1250.0]);

    svc.tick(3.5, &mut hw, &mut log, &mut sink);
    assert_eq!(hw.last_write().unwrap().values, vec![1300.0, 1000.0]);
    assert_eq!(svc.source_kind(), SourceKind::Idle);
    assert_eq!(sink.count(|e| *e == AppEvent::RampFinished), 1);
    assert_eq!(log.records.len(), 1);
}
