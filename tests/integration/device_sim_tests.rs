//! End-to-end runs of the arbiter over the real adapter stack in its host
//! simulation: relay driver on probe pins, loopback control channel,
//! simulated WiFi, updater and power.  Timings are shortened so each run
//! takes a fraction of a second of wall time.

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;
use std::time::Duration;

use embedded_hal::digital::{ErrorType, OutputPin};
use powerreset::adapters::device::DeviceAdapter;
use powerreset::adapters::ota::HttpUpdater;
use powerreset::adapters::remote::{RemoteLink, Topics};
use powerreset::adapters::system::SystemPower;
use powerreset::adapters::time::SystemClock;
use powerreset::adapters::wifi::WifiAdapter;
use powerreset::app::events::{RemoteEvent, UpdateOutcome};
use powerreset::app::ports::{RelayPort, RemoteChannel, SessionPort};
use powerreset::arbiter::{Arbiter, Terminal};
use powerreset::config::DeviceConfig;
use powerreset::drivers::relay::{Polarity, RelayDriver};

const NAMESPACE: &str = "relay1";

// ── Probe pins ────────────────────────────────────────────────

#[derive(Clone, Default)]
struct ProbePin {
    levels: Rc<RefCell<Vec<bool>>>,
}

impl ProbePin {
    fn history(&self) -> Vec<bool> {
        self.levels.borrow().clone()
    }
}

impl ErrorType for ProbePin {
    type Error = Infallible;
}

impl OutputPin for ProbePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.borrow_mut().push(true);
        Ok(())
    }
}

type SimDevice = DeviceAdapter<RelayDriver<ProbePin, ProbePin>>;

// ── Fixtures ──────────────────────────────────────────────────

fn fast_config() -> DeviceConfig {
    DeviceConfig {
        pulse_duration_ms: 50,
        busy_wait_step_ms: 5,
        update_deadline_ms: 200,
        sleep_interval_secs: 60,
        connect_timeout_ms: 200,
        button_sync_settle_ms: 20,
        time_sync_timeout_ms: 100,
        ..DeviceConfig::default()
    }
}

/// Device with WiFi associating and the broker up.  Returns the relay probe.
fn sim_device(config: &DeviceConfig) -> (SimDevice, ProbePin) {
    let relay_pin = ProbePin::default();
    let relay = RelayDriver::new(relay_pin.clone(), ProbePin::default(), Polarity::ActiveLow);

    let mut wifi = WifiAdapter::new();
    wifi.set_sim_link(true);
    wifi.set_credentials("Workshop", "correct-horse").unwrap();
    wifi.connect().unwrap();

    let mut remote = RemoteLink::new(Topics::new(NAMESPACE));
    remote.set_sim_connected(true);

    let device = DeviceAdapter::new(
        relay,
        SystemClock::new(),
        wifi,
        remote,
        HttpUpdater::new(&config.firmware_version),
        SystemPower::new(),
    );
    (device, relay_pin)
}

fn terminal_lines(device: &mut SimDevice) -> Vec<String> {
    let topic = device.remote_mut().topics().terminal_out();
    device
        .remote_mut()
        .published()
        .iter()
        .filter(|(t, _)| *t == topic)
        .map(|(_, line)| line.clone())
        .collect()
}

// ── Scenarios ─────────────────────────────────────────────────

#[test]
fn retained_press_power_cycles_then_sleeps() {
    let config = fast_config();
    let (mut device, relay_pin) = sim_device(&config);
    let topic = device.remote_mut().topics().button_set();
    device.remote_mut().inject(&topic, "1");

    let mut arb = Arbiter::new(config);
    assert_eq!(arb.run(&mut device), Terminal::Sleeping);

    // Active-low: construction high, pulse low, release high again.
    let levels = relay_pin.history();
    assert_eq!(levels.first(), Some(&true));
    assert!(levels.contains(&false));
    assert_eq!(levels.last(), Some(&true));
    assert!(!device.relay().is_energized());

    assert_eq!(device.power().sleeps(), &[Duration::from_secs(60)]);
    assert!(!device.remote_mut().is_connected(), "broker session left open");
    assert!(!device.wifi_mut().is_connected());

    let published = device.remote_mut().published().to_vec();
    assert!(published.contains(&(format!("{NAMESPACE}/v0"), "0".to_string())));
    assert!(published.contains(&(format!("{NAMESPACE}/v2"), "192.168.4.2".to_string())));
    assert!(published.contains(&(format!("{NAMESPACE}/v3"), "-60".to_string())));

    let lines = terminal_lines(&mut device);
    let suffixes: Vec<&str> = lines
        .iter()
        .filter_map(|l| l.split_once("] - ").map(|(_, text)| text))
        .collect();
    assert_eq!(suffixes, vec!["reset start", "reset done", "sleeping"]);
}

#[test]
fn acknowledged_press_does_not_repeat_on_next_wake() {
    let config = fast_config();
    let (mut device, relay_pin) = sim_device(&config);
    let topic = device.remote_mut().topics().button_set();
    device.remote_mut().inject(&topic, "1");

    assert_eq!(Arbiter::new(config.clone()).run(&mut device), Terminal::Sleeping);
    let first_lifetime = relay_pin.history().len();
    assert!(relay_pin.history().contains(&false));
    assert!(
        device
            .remote_mut()
            .published()
            .contains(&(topic.clone(), "0".to_string()))
    );

    // Wake: associate again and run a fresh lifetime on the same device.
    device.wifi_mut().connect().unwrap();
    device.remote_mut().set_sim_connected(true);
    assert_eq!(Arbiter::new(config).run(&mut device), Terminal::Sleeping);

    let second = &relay_pin.history()[first_lifetime..];
    assert!(!second.contains(&false), "relay energized again: {second:?}");
    assert_eq!(device.power().sleeps().len(), 2);
}

#[test]
fn update_over_broker_reboots_on_success() {
    let config = fast_config();
    let (mut device, relay_pin) = sim_device(&config);
    device
        .updater_mut()
        .set_sim_outcome(Some(UpdateOutcome::Succeeded));
    let topic = device.remote_mut().topics().ota();
    device.remote_mut().inject(&topic, "http://fw.local/1.0.5.bin");

    let mut arb = Arbiter::new(config);
    assert_eq!(arb.run(&mut device), Terminal::Rebooting);

    assert_eq!(device.power().restarts(), 1);
    assert!(device.power().sleeps().is_empty());
    assert!(!relay_pin.history().contains(&false));

    let lines = terminal_lines(&mut device);
    assert!(lines.contains(&"URL: http://fw.local/1.0.5.bin".to_string()));
    assert!(lines.iter().any(|l| l.ends_with("OTA: Update OK, rebooting...")));
}

#[test]
fn hung_update_times_out_and_device_sleeps() {
    let config = fast_config();
    let (mut device, _) = sim_device(&config);
    device.updater_mut().set_sim_outcome(None);
    let topic = device.remote_mut().topics().ota();
    device.remote_mut().inject(&topic, "http://fw.local/1.0.5.bin");

    let mut arb = Arbiter::new(config);
    assert_eq!(arb.run(&mut device), Terminal::Sleeping);

    let lines = terminal_lines(&mut device);
    let timeout = lines
        .iter()
        .position(|l| l.ends_with("OTA timeout, continuing normal operation"))
        .unwrap();
    let sleeping = lines.iter().position(|l| l.ends_with("] - sleeping")).unwrap();
    assert!(timeout < sleeping);
}

#[test]
fn terminal_restart_command_over_broker() {
    let config = fast_config();
    let (mut device, _) = sim_device(&config);
    let topic = device.remote_mut().topics().terminal_in();
    device.remote_mut().inject(&topic, "Reset");

    let mut arb = Arbiter::new(config);
    assert_eq!(arb.run(&mut device), Terminal::Rebooting);
    assert_eq!(device.power().restarts(), 1);
}

#[test]
fn wifi_drop_surfaces_as_connectivity_lost() {
    let (mut device, _) = sim_device(&fast_config());

    device.service();
    assert!(device.is_connected());

    device.wifi_mut().set_sim_link(false);
    device.service();
    assert!(!device.is_connected());
    assert_eq!(device.next_event(), Some(RemoteEvent::ConnectivityLost));
}
