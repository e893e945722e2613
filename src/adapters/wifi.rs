//! WiFi station-mode adapter.
//!
//! Owns the link under the control session: credentials, association and
//! reconnection.  [`DeviceAdapter`](super::device::DeviceAdapter) exposes it
//! to the arbiter as part of [`SessionPort`](crate::app::ports::SessionPort).
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//!   Association is non-blocking; the arbiter polls `is_connected()`.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## Reconnection policy
//!
//! On link loss the adapter retries with exponential backoff (2 s → 4 s →
//! 8 s … capped at 60 s).

use core::net::Ipv4Addr;

use log::{error, info, warn};

use crate::error::ConnectivityError;

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32, retry_at_ms: u64 },
}

const INITIAL_BACKOFF_SECS: u32 = 2;
const MAX_BACKOFF_SECS: u32 = 60;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    backoff_secs: u32,
    #[cfg(target_os = "espidf")]
    driver: Option<esp_idf_svc::wifi::EspWifi<'static>>,
    /// Simulation: whether the fake access point is reachable.
    #[cfg(not(target_os = "espidf"))]
    sim_link_up: bool,
}

impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl WifiAdapter {
    pub fn new() -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_secs: INITIAL_BACKOFF_SECS,
            #[cfg(target_os = "espidf")]
            driver: None,
            #[cfg(not(target_os = "espidf"))]
            sim_link_up: true,
        }
    }

    /// Hand over the driver built from the modem peripheral.
    #[cfg(target_os = "espidf")]
    pub fn attach(&mut self, driver: esp_idf_svc::wifi::EspWifi<'static>) {
        self.driver = Some(driver);
    }

    /// Simulation: make the access point reachable or not.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_sim_link(&mut self, up: bool) {
        self.sim_link_up = up;
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|()| ConnectivityError::InvalidSsid)?;
        self.password.clear();
        self.password
            .push_str(password)
            .map_err(|()| ConnectivityError::InvalidPassword)?;
        info!("WiFi: credentials set (SSID='{}')", self.ssid);
        Ok(())
    }

    /// Start associating.  Completion is observed through [`Self::is_connected`].
    pub fn connect(&mut self) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        if self.state == WifiState::Connected {
            return Err(ConnectivityError::AlreadyConnected);
        }

        info!("WiFi: connecting to '{}'", self.ssid);
        self.state = WifiState::Connecting;
        if let Err(e) = self.platform_connect() {
            error!("WiFi: connect failed: {}", e);
            self.state = WifiState::Disconnected;
            return Err(e);
        }
        Ok(())
    }

    /// Advance the link state machine.  Returns `true` on the poll where
    /// an established link was lost.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        let up = self.platform_is_connected();
        match self.state {
            WifiState::Connecting if up => {
                self.state = WifiState::Connected;
                self.backoff_secs = INITIAL_BACKOFF_SECS;
                info!("WiFi: connected (RSSI={:?})", self.rssi());
            }
            WifiState::Connected if !up => {
                warn!("WiFi: link lost, retrying in {} s", self.backoff_secs);
                self.schedule_retry(now_ms, 0);
                return true;
            }
            WifiState::Reconnecting { attempt, retry_at_ms } if now_ms >= retry_at_ms => {
                info!("WiFi: reconnect attempt {}", attempt + 1);
                match self.platform_connect() {
                    Ok(()) => self.state = WifiState::Connecting,
                    Err(_) => {
                        self.backoff_secs = (self.backoff_secs * 2).min(MAX_BACKOFF_SECS);
                        self.schedule_retry(now_ms, attempt + 1);
                    }
                }
            }
            _ => {}
        }
        false
    }

    pub fn disconnect(&mut self) {
        self.platform_disconnect();
        self.state = WifiState::Disconnected;
        info!("WiFi: disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.state == WifiState::Connected && self.platform_is_connected()
    }

    pub fn local_ip(&self) -> Option<Ipv4Addr> {
        if !self.is_connected() {
            return None;
        }
        self.platform_ip()
    }

    pub fn rssi(&self) -> Option<i8> {
        if !self.platform_is_connected() {
            return None;
        }
        self.platform_rssi()
    }

    fn schedule_retry(&mut self, now_ms: u64, attempt: u32) {
        self.state = WifiState::Reconnecting {
            attempt,
            retry_at_ms: now_ms + u64::from(self.backoff_secs) * 1_000,
        };
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};

        let Some(driver) = self.driver.as_mut() else {
            return Err(ConnectivityError::ConnectionFailed);
        };
        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };
        let conf = Configuration::Client(ClientConfiguration {
            ssid: self
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidSsid)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });

        let started = driver.is_started().unwrap_or(false);
        let result = driver
            .set_configuration(&conf)
            .and_then(|()| if started { Ok(()) } else { driver.start() })
            .and_then(|()| driver.connect());
        result.map_err(|e| {
            warn!("WiFi(espidf): {:?}", e);
            ConnectivityError::ConnectionFailed
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        if self.sim_link_up {
            Ok(())
        } else {
            Err(ConnectivityError::ConnectionFailed)
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        if let Some(driver) = self.driver.as_mut() {
            if let Err(e) = driver.disconnect().and_then(|()| driver.stop()) {
                warn!("WiFi(espidf): teardown: {:?}", e);
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {}

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.driver.as_ref().is_some_and(|d| {
            d.is_connected().unwrap_or(false) && d.sta_netif().is_up().unwrap_or(false)
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_link_up && !matches!(self.state, WifiState::Disconnected)
    }

    #[cfg(target_os = "espidf")]
    fn platform_ip(&self) -> Option<Ipv4Addr> {
        let driver = self.driver.as_ref()?;
        driver.sta_netif().get_ip_info().ok().map(|info| info.ip)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_ip(&self) -> Option<Ipv4Addr> {
        Some(Ipv4Addr::new(192, 168, 4, 2))
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        let mut ap_info: esp_idf_svc::sys::wifi_ap_record_t = unsafe { core::mem::zeroed() };
        // SAFETY: `ap_info` is a valid, writable record for the duration of the call.
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        (ret == esp_idf_svc::sys::ESP_OK).then_some(ap_info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        Some(-60)
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
