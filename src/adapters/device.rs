//! Device adapter: bridges the concrete adapters to the port traits.
//!
//! Owns the relay, clock, WiFi link, control channel, updater and power
//! primitives, and implements every port the arbiter needs, so one
//! `&mut DeviceAdapter` satisfies [`Platform`](crate::app::ports::Platform).

use core::net::Ipv4Addr;
use core::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::app::events::{RemoteEvent, UpdateOutcome};
use crate::app::ports::{
    Clock, PowerPort, RelayPort, RemoteChannel, SessionPort, UpdaterPort, WallClock,
};

use super::ota::HttpUpdater;
use super::remote::RemoteLink;
use super::system::SystemPower;
use super::time::SystemClock;
use super::wifi::WifiAdapter;

/// Concrete adapter that combines all device I/O behind port traits.
pub struct DeviceAdapter<R> {
    relay: R,
    clock: SystemClock,
    wifi: WifiAdapter,
    remote: RemoteLink,
    updater: HttpUpdater,
    power: SystemPower,
}

impl<R: RelayPort> DeviceAdapter<R> {
    pub fn new(
        relay: R,
        clock: SystemClock,
        wifi: WifiAdapter,
        remote: RemoteLink,
        updater: HttpUpdater,
        power: SystemPower,
    ) -> Self {
        Self {
            relay,
            clock,
            wifi,
            remote,
            updater,
            power,
        }
    }

    pub fn wifi_mut(&mut self) -> &mut WifiAdapter {
        &mut self.wifi
    }

    pub fn remote_mut(&mut self) -> &mut RemoteLink {
        &mut self.remote
    }

    pub fn updater_mut(&mut self) -> &mut HttpUpdater {
        &mut self.updater
    }

    pub fn power(&self) -> &SystemPower {
        &self.power
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }
}

// ── RelayPort ─────────────────────────────────────────────────

impl<R: RelayPort> RelayPort for DeviceAdapter<R> {
    fn energize(&mut self) {
        self.relay.energize();
    }

    fn release(&mut self) {
        self.relay.release();
    }

    fn is_energized(&self) -> bool {
        self.relay.is_energized()
    }
}

// ── Time ──────────────────────────────────────────────────────

impl<R> Clock for DeviceAdapter<R> {
    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

impl<R> DelayNs for DeviceAdapter<R> {
    fn delay_ns(&mut self, ns: u32) {
        self.clock.delay_ns(ns);
    }
}

impl<R> WallClock for DeviceAdapter<R> {
    fn unix_time(&self) -> Option<i64> {
        self.clock.unix_time()
    }
}

// ── SessionPort ───────────────────────────────────────────────

impl<R> SessionPort for DeviceAdapter<R> {
    fn service(&mut self) {
        let now = self.clock.now_ms();
        if self.wifi.poll(now) {
            self.remote.notify_link_lost();
        }
        self.remote.service();
    }

    fn is_connected(&self) -> bool {
        self.wifi.is_connected() && self.remote.is_connected()
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        self.wifi.local_ip()
    }

    fn rssi(&self) -> Option<i8> {
        self.wifi.rssi()
    }

    fn disconnect(&mut self) {
        self.remote.close();
        self.wifi.disconnect();
    }
}

// ── RemoteChannel ─────────────────────────────────────────────

impl<R> RemoteChannel for DeviceAdapter<R> {
    fn next_event(&mut self) -> Option<RemoteEvent> {
        self.remote.next_event()
    }

    fn request_button_sync(&mut self) {
        self.remote.request_button_sync();
    }

    fn write_virtual(&mut self, pin: u8, value: &str) {
        self.remote.write_virtual(pin, value);
    }

    fn console_write(&mut self, line: &str) {
        self.remote.console_write(line);
    }

    fn console_flush(&mut self) {
        self.remote.console_flush();
    }
}

// ── UpdaterPort ───────────────────────────────────────────────

impl<R> UpdaterPort for DeviceAdapter<R> {
    fn begin_update(&mut self, url: &str) {
        self.updater.begin_update(url);
    }

    fn poll_outcome(&mut self) -> Option<UpdateOutcome> {
        self.updater.poll_outcome()
    }
}

// ── PowerPort ─────────────────────────────────────────────────

impl<R> PowerPort for DeviceAdapter<R> {
    fn deep_sleep(&mut self, duration: Duration) {
        self.power.deep_sleep(duration);
    }

    fn restart(&mut self) {
        self.power.restart();
    }
}
