//! Fuzz target: `HostMessage::parse`
//!
//! Feeds arbitrary text into the host message parser and asserts that it
//! never panics and that a parsed start request keeps its label within
//! capacity.
//!
//! cargo fuzz run fuzz_host_message

#![no_main]

use libfuzzer_sys::fuzz_target;
use rotorbench::dispatch::{HostMessage, LABEL_LEN};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    match HostMessage::parse(text) {
        Ok(HostMessage::Start(request)) => {
            assert!(request.label.len() <= LABEL_LEN);
            assert!(request.label.starts_with("Run_"));
        }
        Ok(HostMessage::SetTarget { value, .. } | HostMessage::SetKp { value, .. }) => {
            assert!(value.is_finite(), "parser must reject non-finite numbers");
        }
        Ok(HostMessage::Mark(value)) => assert!(value.is_finite()),
        Ok(_) | Err(_) => {}
    }
});
