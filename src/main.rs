//! Rotorbench simulator: drives the bench core against a simulated stand.
//!
//! ```text
//! ┌──────────────┐  BenchEvent   ┌──────────────────────────────────┐
//! │ stdin thread │──────────────▶│ control loop (fixed rate)        │
//! │ keys / !msg  │   mailbox     │  BenchService ◀──▶ SimBench      │
//! └──────────────┘               │       │ LogEventSink/RecordSink  │
//!                                └──────────────────────────────────┘
//! ```
//!
//! Usage: `rotorbench-sim [config.json]`.  Each character typed on stdin is
//! a key press (E/D, W/S, Q/A, T/G, R/F, H/I, 0-9); a line starting with `!`
//! is a host message, e.g. `!RPM,3000` or `!Stop`.  Closing stdin stops any
//! active run, writing the safe output, and exits.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{info, warn};

use rotorbench::adapters::log_sink::{LogEventSink, LogRecordSink};
use rotorbench::adapters::sim::{MotorModel, SimBench};
use rotorbench::app::events::SourceKind;
use rotorbench::app::service::BenchService;
use rotorbench::config::BenchConfig;
use rotorbench::dispatch::{HostMessage, RunKind};
use rotorbench::mailbox::{self, BENCH_EVENTS, BenchEvent};

static INPUT_CLOSED: AtomicBool = AtomicBool::new(false);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let app_name = env!("CARGO_PKG_NAME").replace('-', "_");
            format!("{app_name}=info").into()
        }))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            BenchConfig::from_json(&text).with_context(|| format!("loading {path}"))?
        }
        None => BenchConfig::default(),
    };

    let tick = Duration::from_secs_f64(config.tick_secs);
    let mut bench = SimBench::new(MotorModel::default(), config.channel, config.protocol);
    let mut service = BenchService::new(config.clone())?;
    let mut events = LogEventSink::new();
    let mut data = LogRecordSink::new();

    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(read_operator_input)
        .context("spawning stdin reader")?;

    let start = Instant::now();
    service.start_run(RunKind::Constant(config.default_mode), 0.0, &mut bench, &mut events)?;
    info!("Simulator running; type keys or !messages, close stdin to quit.");

    let mut last = 0.0;
    loop {
        let now = start.elapsed().as_secs_f64();
        bench.advance(now - last);
        last = now;

        while let Some(event) = mailbox::next(&BENCH_EVENTS) {
            service.handle_event(&event, now, &mut bench, &mut events);
        }
        service.tick(now, &mut bench, &mut data, &mut events);

        if INPUT_CLOSED.load(Ordering::Acquire) {
            // Input posted just before EOF still applies.
            while let Some(event) = mailbox::next(&BENCH_EVENTS) {
                service.handle_event(&event, now, &mut bench, &mut events);
            }
            shut_down(&mut service, &mut bench, &mut events);
            break;
        }
        std::thread::sleep(tick);
    }

    info!("Simulator done: {} ticks, {} data rows", service.tick_count(), data.rows());
    Ok(())
}

/// Stop whatever is still driving the outputs once the operator is gone.
fn shut_down(service: &mut BenchService, bench: &mut SimBench, events: &mut LogEventSink) {
    if service.source_kind() != SourceKind::Idle {
        info!("Input closed; stopping {:?}", service.source_kind());
        service.stop(bench, events);
    }
}

/// Forward stdin to the mailbox until EOF.
fn read_operator_input() {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let event_ok = if let Some(text) = line.strip_prefix('!') {
            match HostMessage::parse(text) {
                Ok(message) => mailbox::post(&BENCH_EVENTS, BenchEvent::Message(message)),
                Err(e) => {
                    warn!("Ignoring host message {:?}: {}", text, e);
                    true
                }
            }
        } else {
            line.bytes()
                .filter(|b| !b.is_ascii_whitespace())
                .all(|b| mailbox::post(&BENCH_EVENTS, BenchEvent::Key(b.to_ascii_uppercase())))
        };
        if !event_ok {
            warn!("Mailbox full, input dropped");
        }
    }
    INPUT_CLOSED.store(true, Ordering::Release);
}
