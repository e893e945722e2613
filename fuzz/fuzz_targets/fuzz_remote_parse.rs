//! Fuzz target: `Topics::parse`
//!
//! Splits the input into a topic and a payload at the first NUL and checks
//! that parsing never panics and never yields an empty update URL or an
//! oversized terminal line.
//!
//! cargo fuzz run fuzz_remote_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use powerreset::adapters::remote::Topics;
use powerreset::app::events::RemoteEvent;

fuzz_target!(|data: &[u8]| {
    let topics = Topics::new("relay1");
    let (topic, payload) = match data.iter().position(|b| *b == 0) {
        Some(split) => (&data[..split], &data[split + 1..]),
        None => (&data[..0], data),
    };
    let Ok(topic) = core::str::from_utf8(topic) else {
        return;
    };

    // Also hit the known topics with the same payload.
    for t in [
        topic.to_string(),
        topics.button_set(),
        topics.terminal_in(),
        topics.ota(),
    ] {
        match topics.parse(&t, payload) {
            Some(RemoteEvent::UpdateRequested(url)) => assert!(!url.is_empty()),
            Some(RemoteEvent::Console(line)) => assert!(line.len() <= 512),
            _ => {}
        }
    }
});
