//! Fuzz target: `Dispatcher::on_key` + `PidCorrector::correct`
//!
//! Interprets the input as alternating key presses and measurements and
//! checks the corrector's bounds after every step.
//!
//! cargo fuzz run fuzz_dispatch

#![no_main]

use libfuzzer_sys::fuzz_target;
use rotorbench::config::{BenchConfig, ControlMode};
use rotorbench::control::pid::{PidCorrector, PidParams};
use rotorbench::dispatch::{DispatchTable, Dispatcher, TuningContext};

fuzz_target!(|data: &[u8]| {
    let mut config = BenchConfig::default();
    let Ok(mut pid) = PidCorrector::new(PidParams::from_config(&config, ControlMode::Speed)) else {
        return;
    };
    let dispatcher = Dispatcher::new(DispatchTable::keyboard(config.gain_step_factor));
    let mut mark = 0.0;

    for pair in data.chunks(2) {
        let mut ctx = TuningContext {
            corrector: &mut pid,
            profiles: &mut config.profiles,
            mode: ControlMode::Speed,
            mark: &mut mark,
        };
        dispatcher.on_key(pair[0], &mut ctx);

        // Second byte is a measurement in RPM / 20.
        let measurement = f64::from(pair.get(1).copied().unwrap_or(0)) * 20.0;
        let out = pid.correct(measurement);
        assert!((config.output_min..=config.output_max).contains(&out));
        let state = pid.state();
        assert!(state.integral().abs() <= state.integral_max());
    }
});
