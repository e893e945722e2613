//! Boot, pulse, sleep and console flows of the arbiter against the mock
//! platform.  Simulated time only advances through the arbiter's own delays,
//! so every timestamp asserted below is exact.

use std::time::Duration;

use powerreset::app::events::RemoteEvent;
use powerreset::arbiter::{Arbiter, Mode, Terminal};
use powerreset::config::{AfterPulse, DeviceConfig, PulseWait};
use powerreset::pins::virtual_pins;

use crate::mock_hw::{Call, MockPlatform, poll_until};

// Default boot on a connected device: clock already synced at t=0, session
// up at t=10, button sync settles at t=2010, first decision at t=2020.
const FIRST_DECISION_MS: u64 = 2_020;
const PULSE_MS: u64 = 10_000;

fn pressed_on_boot() -> MockPlatform {
    let mut hw = MockPlatform::new();
    hw.retained_button = Some(true);
    hw
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn relay_released_before_anything_else() {
    let mut hw = MockPlatform::new();
    Arbiter::new(DeviceConfig::default()).run(&mut hw);
    assert_eq!(hw.calls[0], (0, Call::Release));
}

#[test]
fn idle_boot_sleeps_for_configured_interval() {
    let mut hw = MockPlatform::new();
    let mut arb = Arbiter::new(DeviceConfig::default());

    assert_eq!(arb.run(&mut hw), Terminal::Sleeping);
    assert_eq!(arb.mode(), &Mode::Sleeping);
    assert_eq!(hw.sleeps(), vec![Duration::from_secs(900)]);
    assert!(hw.pulses().is_empty());
    assert_eq!(hw.count(&Call::RequestButtonSync), 1);
}

#[test]
fn sleep_marker_flushed_before_teardown_and_power_down() {
    let mut hw = MockPlatform::new();
    Arbiter::new(DeviceConfig::default()).run(&mut hw);

    let marker = hw.status_index("sleeping").unwrap();
    let flush = marker + 1;
    let (disconnect, _) = hw.find(|c| *c == Call::Disconnect).unwrap();
    let (sleep, sleep_at) = hw.find(|c| matches!(c, Call::DeepSleep(_))).unwrap();

    assert_eq!(hw.calls[flush].1, Call::Flush);
    assert!(flush < disconnect && disconnect < sleep);
    assert_eq!(sleep, hw.calls.len() - 1, "deep sleep must be the last call");
    assert!(sleep_at >= FIRST_DECISION_MS);
}

#[test]
fn status_lines_carry_local_timestamp() {
    let mut hw = MockPlatform::new();
    Arbiter::new(DeviceConfig::default()).run(&mut hw);
    let lines = hw.console_lines();
    assert_eq!(lines[0], "[2025-06-01 12:00:00] - sleeping");
}

#[test]
fn offline_boot_waits_out_both_timeouts_then_sleeps() {
    let mut hw = MockPlatform::offline();
    let mut arb = Arbiter::new(DeviceConfig::default());

    assert_eq!(arb.run(&mut hw), Terminal::Sleeping);

    let (_, sleep_at) = hw.find(|c| matches!(c, Call::DeepSleep(_))).unwrap();
    // 3 s clock sync + 5 s connect window.
    assert!(sleep_at >= 8_000, "slept at {sleep_at}");
    assert_eq!(hw.count(&Call::RequestButtonSync), 0);
    assert!(hw.calls.iter().all(|(_, c)| !matches!(c, Call::WriteVirtual(..))));
    assert_eq!(hw.console_lines(), vec!["[1970-01-01 02:00:00] - sleeping".to_string()]);
}

#[test]
fn device_info_published_after_connect() {
    let mut hw = MockPlatform::new();
    Arbiter::new(DeviceConfig::default()).run(&mut hw);

    assert_eq!(hw.virtual_writes(virtual_pins::IP_ADDRESS), vec!["192.168.1.50"]);
    assert_eq!(hw.virtual_writes(virtual_pins::SIGNAL_STRENGTH), vec!["-60"]);
    assert_eq!(
        hw.virtual_writes(virtual_pins::FIRMWARE_VERSION),
        vec![env!("CARGO_PKG_VERSION")]
    );
}

#[test]
fn button_released_value_does_not_pulse() {
    let mut hw = MockPlatform::new();
    hw.retained_button = Some(false);
    let mut arb = Arbiter::new(DeviceConfig::default());

    assert_eq!(arb.run(&mut hw), Terminal::Sleeping);
    assert_eq!(hw.count(&Call::Energize), 0);
}

// ── Pulse ─────────────────────────────────────────────────────

#[test]
fn synced_button_press_pulses_for_full_duration() {
    let mut hw = pressed_on_boot();
    let mut arb = Arbiter::new(DeviceConfig::default());

    assert_eq!(arb.run(&mut hw), Terminal::Sleeping);
    assert_eq!(
        hw.pulses(),
        vec![(FIRST_DECISION_MS, FIRST_DECISION_MS + PULSE_MS)]
    );
    assert_eq!(arb.pulses_completed(), 1);

    let start = hw.status_index("reset start").unwrap();
    let done = hw.status_index("reset done").unwrap();
    let sleeping = hw.status_index("sleeping").unwrap();
    assert!(start < done && done < sleeping);
}

#[test]
fn completed_pulse_acknowledges_remote_button() {
    let mut hw = pressed_on_boot();
    Arbiter::new(DeviceConfig::default()).run(&mut hw);

    assert_eq!(hw.virtual_writes(virtual_pins::BUTTON), vec!["0"]);
    let (ack, _) = hw
        .find(|c| *c == Call::WriteVirtual(virtual_pins::BUTTON, "0".into()))
        .unwrap();
    assert_eq!(hw.calls[ack - 1].1, Call::Release, "relay released before the ack");
}

#[test]
fn press_during_boot_is_latched() {
    let mut hw = MockPlatform::new();
    hw.deliver_at(500, RemoteEvent::Button(true));
    let mut arb = Arbiter::new(DeviceConfig::default());

    arb.run(&mut hw);
    assert_eq!(hw.pulses().len(), 1);
}

#[test]
fn timer_callback_pulse_keeps_servicing_events() {
    let config = DeviceConfig {
        pulse_wait: PulseWait::TimerCallback,
        ..DeviceConfig::default()
    };
    let mut hw = pressed_on_boot();
    hw.console_at(4_000, "foo");
    let mut arb = Arbiter::new(config);

    assert_eq!(arb.run(&mut hw), Terminal::Sleeping);

    let pulses = hw.pulses();
    assert_eq!(pulses, vec![(FIRST_DECISION_MS, FIRST_DECISION_MS + PULSE_MS)]);
    let (_, echoed_at) = hw
        .find(|c| *c == Call::Console("Unknown command: foo".into()))
        .unwrap();
    assert!(pulses[0].0 < echoed_at && echoed_at < pulses[0].1);
}

#[test]
fn connectivity_loss_mid_pulse_is_only_counted() {
    let mut hw = pressed_on_boot();
    hw.deliver_at(5_000, RemoteEvent::ConnectivityLost);
    let mut arb = Arbiter::new(DeviceConfig::default());

    arb.run(&mut hw);
    assert_eq!(arb.connectivity_losses(), 1);
    assert_eq!(
        hw.pulses(),
        vec![(FIRST_DECISION_MS, FIRST_DECISION_MS + PULSE_MS)]
    );
}

#[test]
fn pulse_on_boot_applies_to_first_decision_only() {
    let config = DeviceConfig {
        pulse_on_boot: true,
        ..DeviceConfig::default()
    };
    let mut hw = MockPlatform::new();
    let mut arb = Arbiter::new(config);

    assert_eq!(arb.run(&mut hw), Terminal::Sleeping);
    assert_eq!(arb.pulses_completed(), 1);
    assert_eq!(hw.sleeps().len(), 1);
}

// ── Resident ──────────────────────────────────────────────────

#[test]
fn stay_resident_never_sleeps_and_takes_further_presses() {
    let config = DeviceConfig {
        after_pulse: AfterPulse::StayResident,
        ..DeviceConfig::default()
    };
    let mut hw = pressed_on_boot();
    hw.deliver_at(30_000, RemoteEvent::Button(true));
    let mut arb = Arbiter::new(config);

    arb.start(&mut hw);
    poll_until(&mut arb, &mut hw, 60_000);

    assert_eq!(arb.mode(), &Mode::Resident);
    assert!(hw.sleeps().is_empty());
    assert_eq!(arb.pulses_completed(), 2);

    let pulses = hw.pulses();
    assert_eq!(pulses.len(), 2);
    assert!((30_000..=30_020).contains(&pulses[1].0));
    assert_eq!(pulses[1].1 - pulses[1].0, PULSE_MS);
    assert_eq!(hw.virtual_writes(virtual_pins::BUTTON), vec!["0", "0"]);
    assert_eq!(hw.virtual_writes(virtual_pins::FIRMWARE_VERSION).len(), 1);
}

#[test]
fn resident_device_publishes_info_once_it_connects() {
    let config = DeviceConfig {
        after_pulse: AfterPulse::StayResident,
        pulse_on_boot: true,
        ..DeviceConfig::default()
    };
    let mut hw = MockPlatform::new();
    hw.connected = false;
    let mut arb = Arbiter::new(config);

    arb.start(&mut hw);
    poll_until(&mut arb, &mut hw, 20_000);
    assert_eq!(arb.mode(), &Mode::Resident);
    assert!(hw.virtual_writes(virtual_pins::IP_ADDRESS).is_empty());

    hw.connected = true;
    poll_until(&mut arb, &mut hw, 21_000);
    assert_eq!(hw.virtual_writes(virtual_pins::IP_ADDRESS), vec!["192.168.1.50"]);
    assert_eq!(hw.virtual_writes(virtual_pins::SIGNAL_STRENGTH), vec!["-60"]);
    assert_eq!(hw.virtual_writes(virtual_pins::FIRMWARE_VERSION).len(), 1);
}

// ── Console ───────────────────────────────────────────────────

#[test]
fn restart_command_reboots() {
    let mut hw = MockPlatform::new();
    hw.console_at(100, "RESTART");
    let mut arb = Arbiter::new(DeviceConfig::default());

    assert_eq!(arb.run(&mut hw), Terminal::Rebooting);
    assert_eq!(hw.restarts(), 1);
    assert!(hw.sleeps().is_empty());

    let line = hw.status_index("restarting").unwrap();
    let (restart, _) = hw.find(|c| *c == Call::Restart).unwrap();
    assert!(line < restart);
}

#[test]
fn unknown_command_echoed_verbatim_and_blank_lines_ignored() {
    let mut hw = MockPlatform::new();
    hw.console_at(100, "foo");
    hw.console_at(150, "   ");
    let mut arb = Arbiter::new(DeviceConfig::default());

    assert_eq!(arb.run(&mut hw), Terminal::Sleeping);
    let lines = hw.console_lines();
    assert_eq!(lines[0], "Unknown command: foo");
    assert_eq!(lines.len(), 2, "only the echo and the sleep marker: {lines:?}");
}

// ── Terminal ──────────────────────────────────────────────────

#[test]
fn poll_after_terminal_is_inert() {
    let mut hw = MockPlatform::new();
    let mut arb = Arbiter::new(DeviceConfig::default());
    arb.run(&mut hw);

    let before = hw.calls.len();
    hw.deliver_at(0, RemoteEvent::Button(true));
    arb.poll(&mut hw);
    arb.poll(&mut hw);
    assert_eq!(hw.calls.len(), before);
    assert_eq!(arb.mode(), &Mode::Sleeping);
}
