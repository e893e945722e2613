//! PowerReset Firmware: Main Entry Point
//!
//! Power-cycles an attached device on a remote button press, takes
//! firmware updates over HTTP, and otherwise sleeps.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  RelayDriver    SystemClock    WifiAdapter    RemoteLink       │
//! │  (RelayPort)    (Clock+Wall)   (Session)      (RemoteChannel)  │
//! │  HttpUpdater    SystemPower    ConfigStore                     │
//! │  (UpdaterPort)  (PowerPort)    (NVS blob)                      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              Arbiter (pure logic)                      │    │
//! │  │  Mode · ButtonLatch · OneShotTimers · SleepScheduler   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::PinDriver;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::EspWifi;
use log::{info, warn};

use powerreset::adapters::device::DeviceAdapter;
use powerreset::adapters::nvs::ConfigStore;
use powerreset::adapters::ota::{self, HttpUpdater};
use powerreset::adapters::remote::{RemoteLink, Topics};
use powerreset::adapters::system::SystemPower;
use powerreset::adapters::time::SystemClock;
use powerreset::adapters::wifi::WifiAdapter;
use powerreset::arbiter::Arbiter;
use powerreset::config::DeviceConfig;
use powerreset::drivers::relay::{Polarity, RelayDriver};
use powerreset::pins;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  PowerReset v{}                   ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    ota::confirm_running_image();

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Relay first, so the attached device stays powered ──
    let relay = RelayDriver::new(
        PinDriver::output(peripherals.pins.gpio5)?,
        PinDriver::output(peripherals.pins.gpio2)?,
        Polarity::ActiveLow,
    );
    info!(
        "Relay on GPIO{} (LED GPIO{}), released",
        pins::RELAY_GPIO,
        pins::STATUS_LED_GPIO
    );

    // ── 3. Config from NVS (or defaults) ──────────────────────
    let config = match ConfigStore::open(nvs_partition.clone()).and_then(|store| store.load()) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            DeviceConfig::default()
        }
    };

    // ── 4. Network ────────────────────────────────────────────
    let mut wifi = WifiAdapter::new();
    wifi.attach(EspWifi::new(peripherals.modem, sysloop, Some(nvs_partition))?);
    match wifi.set_credentials(&config.wifi_ssid, &config.wifi_password) {
        Ok(()) => {
            if let Err(e) = wifi.connect() {
                warn!("WiFi: {}", e);
            }
        }
        Err(e) => warn!("WiFi: {}, running offline", e),
    }

    let mut clock = SystemClock::new();
    clock.start_time_sync();

    let mut remote = RemoteLink::new(Topics::new(&config.device_topic));
    if let Err(e) = remote.open(&config.broker_url, &config.device_topic, &config.auth_token) {
        warn!("Remote: {}, running without control channel", e);
    }

    // ── 5. Arbiter ────────────────────────────────────────────
    let mut device = DeviceAdapter::new(
        relay,
        clock,
        wifi,
        remote,
        HttpUpdater::new(&config.firmware_version),
        SystemPower::new(),
    );
    let mut arbiter = Arbiter::new(config);

    info!("System ready. Entering poll loop.");
    let terminal = arbiter.run(&mut device);

    // Only reached if the platform primitive returned.
    warn!("Arbiter ended in {:?} but the platform did not", terminal);
    Ok(())
}
