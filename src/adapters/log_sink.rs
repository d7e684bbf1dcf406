//! Log-based sink adapters.
//!
//! [`LogEventSink`] writes structured application events to the `log`
//! facade; [`LogRecordSink`] writes one comma-separated data row per
//! correction under the `rotorbench::data` target, preceded by a header row.
//! A file or host-link adapter would implement the same traits.

use core::fmt::Write as _;

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, LogRecord, LogSink};

/// Adapter that logs every [`AppEvent`] to the console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Status(s) => {
                info!(
                    "STATUS | {:?} | target={:.2} meas={:.2} | pwm={:.0} | err={:.2} | \
                     P={:.3} I={:.3} D={:.3}",
                    s.mode,
                    s.target,
                    s.measurement,
                    s.output,
                    s.error,
                    s.proportional,
                    s.integral,
                    s.derivative,
                );
            }
            AppEvent::SourceChanged { from, to } => {
                info!("SOURCE | {:?} -> {:?}", from, to);
            }
            AppEvent::RunStarted { label, mode } => {
                info!("RUN | {} | mode={:?}", label, mode);
            }
            AppEvent::StepSettled { handle, last } => {
                info!("SWEEP | step {} settled | last={}", handle.step(), last);
            }
            AppEvent::SweepFinished => info!("SWEEP | finished"),
            AppEvent::RampFinished => info!("RAMP | finished"),
            AppEvent::PolarFinished => info!("POLAR | finished"),
            AppEvent::ProgramFinished => info!("PROGRAM | finished"),
            AppEvent::Signal(signal) => info!("HOST | send {}", signal.as_str()),
            AppEvent::Tared => info!("SENSORS | tared"),
        }
    }
}

/// Data-log adapter: CSV rows through the `log` facade.
#[derive(Debug, Default)]
pub struct LogRecordSink {
    header_written: bool,
    rows: u64,
}

impl LogRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }
}

/// Render `record` as one CSV row (values only, or names with `header`).
pub fn csv_row(record: &LogRecord, header: bool) -> String {
    let mut line = String::new();
    for (i, (name, value)) in record.fields().iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        if header {
            line.push_str(name);
        } else {
            let _ = write!(line, "{value}");
        }
    }
    line
}

impl LogSink for LogRecordSink {
    fn record(&mut self, record: &LogRecord) {
        if !self.header_written {
            info!(target: "rotorbench::data", "{}", csv_row(record, true));
            self.header_written = true;
        }
        info!(target: "rotorbench::data", "{}", csv_row(record, false));
        self.rows += 1;
    }
}
