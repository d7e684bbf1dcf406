//! Integration tests for stepped sweeps driven through the BenchService.
//!
//! A sweep pauses after every settled step until the operator resumes it
//! with the handle from the `StepSettled` event.

use super::mock_bench::{MockBench, RecordingLog, RecordingSink};

use rotorbench::app::events::{AppEvent, SourceKind};
use rotorbench::app::service::{BenchService, ControlSource};
use rotorbench::channel::ChannelId;
use rotorbench::config::BenchConfig;
use rotorbench::trajectory::{CooldownParams, StepHandle, SweepParams, SweepPhase, SweepSpec, TrajectorySpec};

const CHANNELS: [ChannelId; 2] = [ChannelId::EscA, ChannelId::ServoA];

fn sweep_spec(cooldown: Option<CooldownParams>) -> SweepSpec {
    let base = TrajectorySpec::new(&CHANNELS, &[1000.0, 1000.0], &[1400.0, 1200.0], 0.0).unwrap();
    let params = SweepParams {
        step_count: 3,
        settle_secs: 1.0,
        cooldown,
        ..SweepParams::for_channels(CHANNELS.len())
    };
    SweepSpec::new(base, params).unwrap()
}

struct Bench {
    svc: BenchService,
    hw: MockBench,
    log: RecordingLog,
    sink: RecordingSink,
}

impl Bench {
    fn new() -> Self {
        Self {
            svc: BenchService::new(BenchConfig::default()).unwrap(),
            hw: MockBench::new(),
            log: RecordingLog::new(),
            sink: RecordingSink::new(),
        }
    }

    fn tick(&mut self, now: f64) {
        self.svc.tick(now, &mut self.hw, &mut self.log, &mut self.sink);
    }

    fn last_values(&self) -> Vec<f64> {
        self.hw.last_write().map(|w| w.values.clone()).unwrap_or_default()
    }

    /// Handle from the most recent `StepSettled` event.
    fn last_settled(&self) -> Option<(StepHandle, bool)> {
        self.sink.events.iter().rev().find_map(|e| match e {
            AppEvent::StepSettled { handle, last } => Some((*handle, *last)),
            _ => None,
        })
    }

    fn sweep_phase(&self) -> Option<SweepPhase> {
        match self.svc.source() {
            ControlSource::Sweep(sweep) => Some(sweep.phase()),
            _ => None,
        }
    }
}

#[test]
fn sweep_walks_every_step_and_finishes_once() {
    let mut b = Bench::new();
    let id = b.svc.start_sweep(sweep_spec(None), 0.0, &mut b.sink);
    assert_eq!(b.svc.source_kind(), SourceKind::Sweep);

    // Step 1 sits at the start values.
    b.tick(0.0);
    assert_eq!(b.last_values(), vec![1000.0, 1000.0]);
    assert_eq!(b.hw.last_write().unwrap().channels, CHANNELS.to_vec());
    b.tick(1.0);
    let (h1, last) = b.last_settled().unwrap();
    assert_eq!((h1.sweep_id(), h1.step(), last), (id, 1, false));

    // Waits for the operator; no further writes.
    let writes = b.hw.writes.len();
    b.tick(1.5);
    assert_eq!(b.hw.writes.len(), writes);
    assert_eq!(b.sweep_phase(), Some(SweepPhase::Settling));

    // Step 2 is slew limited: 200 units at 100/s.
    assert!(b.svc.resume_sweep(h1, 1.5));
    b.tick(2.5);
    assert_eq!(b.last_values(), vec![1100.0, 1050.0]);
    b.tick(3.5);
    assert_eq!(b.last_values(), vec![1200.0, 1100.0]);
    b.tick(4.5);
    let (h2, last) = b.last_settled().unwrap();
    assert_eq!((h2.step(), last), (2, false));

    assert!(b.svc.resume_sweep(h2, 4.5));
    b.tick(6.5);
    assert_eq!(b.last_values(), vec![1400.0, 1200.0]);
    b.tick(7.5);
    let (h3, last) = b.last_settled().unwrap();
    assert_eq!((h3.step(), last), (3, true));
    assert_eq!(b.svc.source_kind(), SourceKind::Idle);

    for now in [8.0, 9.0, 10.0] {
        b.tick(now);
    }
    assert_eq!(b.sink.count(|e| *e == AppEvent::SweepFinished), 1);
    assert!(!b.svc.resume_sweep(h3, 10.0));
    assert!(b.log.records.is_empty());
}

#[test]
fn stale_handles_are_ignored() {
    let mut b = Bench::new();
    b.svc.start_sweep(sweep_spec(None), 0.0, &mut b.sink);
    b.tick(0.0);
    b.tick(1.0);
    let (h1, _) = b.last_settled().unwrap();

    assert!(b.svc.resume_sweep(h1, 1.0));
    // Already resumed: the same handle is now stale.
    assert!(!b.svc.resume_sweep(h1, 1.0));
    assert_eq!(b.sweep_phase(), Some(SweepPhase::Stepping));

    b.tick(3.0);
    b.tick(4.0);
    let (h2, _) = b.last_settled().unwrap();
    assert!(!b.svc.resume_sweep(h1, 4.0), "earlier step's handle");
    assert_eq!(b.sweep_phase(), Some(SweepPhase::Settling));
    assert!(b.svc.resume_sweep(h2, 4.0));
}

#[test]
fn new_sweep_invalidates_previous_handles() {
    let mut b = Bench::new();
    let first = b.svc.start_sweep(sweep_spec(None), 0.0, &mut b.sink);
    b.tick(0.0);
    b.tick(1.0);
    let (old, _) = b.last_settled().unwrap();

    let second = b.svc.start_sweep(sweep_spec(None), 2.0, &mut b.sink);
    assert_ne!(first, second);
    b.tick(2.0);
    b.tick(3.0);
    let (fresh, _) = b.last_settled().unwrap();
    assert_eq!(fresh.sweep_id(), second);

    assert!(!b.svc.resume_sweep(old, 3.0));
    assert!(b.svc.resume_sweep(fresh, 3.0));
}

#[test]
fn cooldown_runs_between_hot_steps_only() {
    let cooldown = CooldownParams::new(&[1000.0, 1000.0], 0.5, 1150.0).unwrap();
    let mut b = Bench::new();
    b.svc.start_sweep(sweep_spec(Some(cooldown)), 0.0, &mut b.sink);
    b.tick(0.0);
    b.tick(1.0);

    // Step 1 peaked at 1000, below the threshold: straight to step 2.
    let (h1, _) = b.last_settled().unwrap();
    assert!(b.svc.resume_sweep(h1, 1.0));
    assert_eq!(b.sweep_phase(), Some(SweepPhase::Stepping));
    b.tick(3.0);
    b.tick(4.0);

    // Step 2 peaked at 1200: ramp down to the cooldown values and hold.
    let (h2, _) = b.last_settled().unwrap();
    assert!(b.svc.resume_sweep(h2, 4.0));
    assert_eq!(b.sweep_phase(), Some(SweepPhase::CoolingDown));
    b.tick(5.0);
    assert_eq!(b.last_values(), vec![1100.0, 1050.0]);
    b.tick(6.0);
    assert_eq!(b.last_values(), vec![1000.0, 1000.0]);
    b.tick(6.25);
    assert_eq!(b.sweep_phase(), Some(SweepPhase::CoolingDown));

    // Hold over: step 3 ramps up from the cooldown values.
    b.tick(6.5);
    assert_eq!(b.sweep_phase(), Some(SweepPhase::Stepping));
    assert_eq!(b.last_values(), vec![1000.0, 1000.0]);
    b.tick(10.5);
    assert_eq!(b.last_values(), vec![1400.0, 1200.0]);
    b.tick(11.5);
    assert_eq!(b.last_settled().map(|(h, last)| (h.step(), last)), Some((3, true)));
    assert_eq!(b.sink.count(|e| *e == AppEvent::SweepFinished), 1);
}

#[test]
fn stop_mid_sweep_writes_safe_values_to_sweep_channels() {
    let mut b = Bench::new();
    b.svc.start_sweep(sweep_spec(None), 0.0, &mut b.sink);
    b.tick(0.0);
    b.tick(1.0);
    let (h1, _) = b.last_settled().unwrap();
    assert!(b.svc.resume_sweep(h1, 1.0));
    b.tick(2.0);

    b.svc.stop(&mut b.hw, &mut b.sink);
    assert_eq!(b.hw.last_write().unwrap().channels, CHANNELS.to_vec());
    assert_eq!(b.last_values(), vec![1050.0, 1050.0]);
    assert_eq!(b.svc.source_kind(), SourceKind::Idle);

    let writes = b.hw.writes.len();
    for now in [3.0, 4.0, 5.0] {
        b.tick(now);
    }
    assert_eq!(b.hw.writes.len(), writes);
    assert!(!b.svc.resume_sweep(h1, 5.0));
}

#[test]
fn cancel_leaves_outputs_untouched() {
    let mut b = Bench::new();
    b.svc.start_sweep(sweep_spec(None), 0.0, &mut b.sink);
    b.tick(0.0);
    let writes = b.hw.writes.len();

    b.svc.cancel(&mut b.sink);
    b.tick(1.0);
    b.tick(2.0);
    assert_eq!(b.hw.writes.len(), writes);
    assert_eq!(b.svc.source_kind(), SourceKind::Idle);
    assert_eq!(b.sink.count(|e| matches!(e, AppEvent::StepSettled { .. })), 0);
}
