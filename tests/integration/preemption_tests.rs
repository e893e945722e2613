//! Firmware update against pulse, button and deadline.

use powerreset::app::events::UpdateOutcome;
use powerreset::arbiter::{Arbiter, Mode, Terminal};
use powerreset::config::{DeviceConfig, PulseWait};

use crate::mock_hw::{Call, MockPlatform, poll_until};

const URL: &str = "http://fw.example/powerreset.bin";
const FIRST_DECISION_MS: u64 = 2_020;

/// True when the most recent relay call before `index` was a release.
fn released_before(hw: &MockPlatform, index: usize) -> bool {
    hw.calls[..index]
        .iter()
        .rev()
        .find_map(|(_, c)| match c {
            Call::Energize => Some(false),
            Call::Release => Some(true),
            _ => None,
        })
        .unwrap_or(true)
}

fn assert_preempted_at(hw: &MockPlatform, at_ms: u64) {
    assert_eq!(hw.pulses(), vec![(FIRST_DECISION_MS, at_ms)]);

    let interrupted = hw.status_index("OTA interrupted reset").unwrap();
    let started = hw.status_index("OTA started").unwrap();
    let (begin, _) = hw.find(|c| matches!(c, Call::BeginUpdate(_))).unwrap();

    assert!(released_before(hw, interrupted), "relay still energized at preemption");
    assert!(interrupted < started && started < begin);
    assert!(!hw.has_status("reset done"));
    assert!(hw.console_lines().contains(&format!("URL: {URL}")));
}

// ── Preemption ────────────────────────────────────────────────

#[test]
fn update_preempts_busy_wait_pulse() {
    let mut hw = MockPlatform::new();
    hw.retained_button = Some(true);
    hw.update_request_at(5_000, URL);
    let mut arb = Arbiter::new(DeviceConfig::default());

    assert_eq!(arb.run(&mut hw), Terminal::Sleeping);

    assert_preempted_at(&hw, 5_000);
    assert_eq!(arb.pulses_completed(), 0);
    assert!(hw.has_status("OTA: No updates available"));
    assert_eq!(hw.sleeps().len(), 1);
}

#[test]
fn update_preempts_timer_callback_pulse() {
    let config = DeviceConfig {
        pulse_wait: PulseWait::TimerCallback,
        ..DeviceConfig::default()
    };
    let mut hw = MockPlatform::new();
    hw.retained_button = Some(true);
    hw.update_request_at(5_000, URL);
    let mut arb = Arbiter::new(config);

    assert_eq!(arb.run(&mut hw), Terminal::Sleeping);

    assert_preempted_at(&hw, 5_000);
    // The cancelled completion timer never fires a second release.
    assert_eq!(hw.count(&Call::Energize), 1);
    assert_eq!(arb.pulses_completed(), 0);
}

// ── Outcomes ──────────────────────────────────────────────────

#[test]
fn request_during_boot_is_held_until_first_decision() {
    let mut hw = MockPlatform::new();
    hw.update_request_at(100, URL);
    let mut arb = Arbiter::new(DeviceConfig::default());

    arb.start(&mut hw);
    poll_until(&mut arb, &mut hw, 1_000);
    assert_eq!(arb.pending_update(), Some(URL));
    assert_eq!(hw.count(&Call::BeginUpdate(URL.into())), 0);

    poll_until(&mut arb, &mut hw, FIRST_DECISION_MS + 10);
    assert!(arb.mode().is_updating());
    assert_eq!(arb.pending_update(), None);
    let (_, began_at) = hw.find(|c| matches!(c, Call::BeginUpdate(_))).unwrap();
    assert_eq!(began_at, FIRST_DECISION_MS);
}

#[test]
fn first_held_request_wins() {
    let mut hw = MockPlatform::new();
    hw.update_request_at(100, URL);
    hw.update_request_at(200, "http://other.example/fw.bin");
    let mut arb = Arbiter::new(DeviceConfig::default());

    arb.run(&mut hw);
    assert_eq!(
        hw.calls
            .iter()
            .filter(|(_, c)| matches!(c, Call::BeginUpdate(_)))
            .count(),
        1
    );
    assert_eq!(hw.count(&Call::BeginUpdate(URL.into())), 1);
}

#[test]
fn second_request_ignored_while_updating() {
    let mut hw = MockPlatform::new();
    hw.update_script = None;
    hw.update_request_at(100, URL);
    hw.update_request_at(2_500, "http://other.example/fw.bin");
    let mut arb = Arbiter::new(DeviceConfig::default());

    arb.start(&mut hw);
    poll_until(&mut arb, &mut hw, 5_000);

    match arb.mode() {
        Mode::UpdatingFirmware(update) => assert_eq!(update.source_url, URL),
        other => panic!("expected update in progress, got {other:?}"),
    }
    assert_eq!(hw.count(&Call::BeginUpdate(URL.into())), 1);
    let started = hw
        .console_lines()
        .iter()
        .filter(|l| l.ends_with("] - OTA started"))
        .count();
    assert_eq!(started, 1);
}

#[test]
fn update_wins_over_button_and_button_survives_it() {
    let mut hw = MockPlatform::new();
    hw.retained_button = Some(true);
    hw.update_request_at(100, URL);
    let mut arb = Arbiter::new(DeviceConfig::default());

    assert_eq!(arb.run(&mut hw), Terminal::Sleeping);

    let (begin, began_at) = hw.find(|c| matches!(c, Call::BeginUpdate(_))).unwrap();
    let (energize, _) = hw.find(|c| *c == Call::Energize).unwrap();
    assert!(begin < energize);
    assert_eq!(began_at, FIRST_DECISION_MS);

    // NoUpdates 1 s after start, then the latched press runs.
    let resume = FIRST_DECISION_MS + 1_000;
    assert_eq!(hw.pulses(), vec![(resume, resume + 10_000)]);
    assert_eq!(arb.pulses_completed(), 1);
}

#[test]
fn failure_reports_reason_and_resumes() {
    let mut hw = MockPlatform::new();
    hw.update_script = Some((500, UpdateOutcome::Failed("HTTP 404".into())));
    hw.update_request_at(100, URL);
    let mut arb = Arbiter::new(DeviceConfig::default());

    assert_eq!(arb.run(&mut hw), Terminal::Sleeping);
    assert!(hw.has_status("OTA FAILED: HTTP 404"));
    assert_eq!(hw.restarts(), 0);
}

#[test]
fn success_reboots_into_new_image() {
    let mut hw = MockPlatform::new();
    hw.update_script = Some((500, UpdateOutcome::Succeeded));
    hw.update_request_at(100, URL);
    let mut arb = Arbiter::new(DeviceConfig::default());

    assert_eq!(arb.run(&mut hw), Terminal::Rebooting);
    assert_eq!(hw.restarts(), 1);
    assert!(hw.sleeps().is_empty());

    let ok = hw.status_index("OTA: Update OK, rebooting...").unwrap();
    let (restart, _) = hw.find(|c| *c == Call::Restart).unwrap();
    assert!(ok < restart);
    assert!(released_before(&hw, restart));
}

#[test]
fn deadline_gives_up_on_silent_updater() {
    let config = DeviceConfig {
        update_deadline_ms: 1_000,
        ..DeviceConfig::default()
    };
    let mut hw = MockPlatform::new();
    hw.update_script = None;
    hw.update_request_at(100, URL);
    let mut arb = Arbiter::new(config);

    assert_eq!(arb.run(&mut hw), Terminal::Sleeping);

    let timeout = hw.status_index("OTA timeout, continuing normal operation").unwrap();
    assert_eq!(hw.calls[timeout].0, FIRST_DECISION_MS + 1_000);
    assert!(timeout < hw.status_index("sleeping").unwrap());
}

#[test]
fn outcome_after_deadline_is_dropped() {
    let config = DeviceConfig {
        update_deadline_ms: 1_000,
        ..DeviceConfig::default()
    };
    let mut hw = MockPlatform::new();
    hw.update_script = None;
    hw.update_request_at(100, URL);
    let mut arb = Arbiter::new(config);
    arb.run(&mut hw);

    arb.end_update(&mut hw, UpdateOutcome::Succeeded);
    assert_eq!(hw.restarts(), 0);
    assert_eq!(arb.mode(), &Mode::Sleeping);
}
