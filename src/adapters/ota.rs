//! HTTP fetch-and-flash firmware updater: backed by `esp-ota`.
//!
//! Flow: GET url → stream body into the inactive partition → finalize →
//! set boot partition.  The download runs on its own thread so the
//! arbiter keeps polling; the result comes back through an mpsc channel
//! and is reported exactly once by [`UpdaterPort::poll_outcome`].
//!
//! The request carries the running version in `x-firmware-version`; a
//! server with nothing newer answers `304 Not Modified`.
//!
//! Reboot is left to the arbiter.

use std::sync::mpsc::{self, Receiver, TryRecvError};

use log::{info, warn};

use crate::app::events::UpdateOutcome;
use crate::app::ports::UpdaterPort;
use crate::error::UpdateError;

pub struct HttpUpdater {
    firmware_version: String,
    rx: Option<Receiver<UpdateOutcome>>,
    /// Simulation: what the next update reports.
    #[cfg(not(target_os = "espidf"))]
    sim_outcome: Option<UpdateOutcome>,
    /// Simulation: sender held open for an update that never resolves.
    #[cfg(not(target_os = "espidf"))]
    sim_hung: Option<mpsc::Sender<UpdateOutcome>>,
}

impl HttpUpdater {
    pub fn new(firmware_version: &str) -> Self {
        Self {
            firmware_version: firmware_version.to_string(),
            rx: None,
            #[cfg(not(target_os = "espidf"))]
            sim_outcome: Some(UpdateOutcome::NoUpdates),
            #[cfg(not(target_os = "espidf"))]
            sim_hung: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.rx.is_some()
    }

    /// Simulation: outcome reported by the next update, `None` to hang.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_sim_outcome(&mut self, outcome: Option<UpdateOutcome>) {
        self.sim_outcome = outcome;
    }

    #[cfg(target_os = "espidf")]
    fn spawn(&mut self, url: &str) -> Result<Receiver<UpdateOutcome>, UpdateError> {
        let (tx, rx) = mpsc::channel();
        let url = url.to_string();
        let version = self.firmware_version.clone();
        std::thread::Builder::new()
            .name("ota-fetch".into())
            .stack_size(16 * 1024)
            .spawn(move || {
                let outcome = match fetch_and_flash(&url, &version) {
                    Ok(Some(bytes)) => {
                        info!("OTA: {} bytes flashed", bytes);
                        UpdateOutcome::Succeeded
                    }
                    Ok(None) => UpdateOutcome::NoUpdates,
                    Err(e) => UpdateOutcome::Failed(e.into_reason()),
                };
                let _ = tx.send(outcome);
            })
            .map_err(|e| UpdateError::Failed(format!("spawn: {e}")))?;
        Ok(rx)
    }

    #[cfg(not(target_os = "espidf"))]
    fn spawn(&mut self, url: &str) -> Result<Receiver<UpdateOutcome>, UpdateError> {
        let (tx, rx) = mpsc::channel();
        info!("OTA(sim): fetching {} (running {})", url, self.firmware_version);
        if let Some(outcome) = self.sim_outcome.clone() {
            tx.send(outcome)
                .map_err(|_| UpdateError::Failed("channel closed".into()))?;
        } else {
            self.sim_hung = Some(tx);
        }
        Ok(rx)
    }
}

impl UpdaterPort for HttpUpdater {
    fn begin_update(&mut self, url: &str) {
        match self.spawn(url) {
            Ok(rx) => self.rx = Some(rx),
            Err(e) => {
                warn!("OTA: {}", e);
                let (tx, rx) = mpsc::channel();
                let _ = tx.send(UpdateOutcome::Failed(e.into_reason()));
                self.rx = Some(rx);
            }
        }
    }

    fn poll_outcome(&mut self) -> Option<UpdateOutcome> {
        let rx = self.rx.as_ref()?;
        match rx.try_recv() {
            Ok(outcome) => {
                self.rx = None;
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.rx = None;
                Some(UpdateOutcome::Failed("updater stopped without a result".into()))
            }
        }
    }
}

/// Download `url` into the inactive partition.  `Ok(None)` when the
/// server has nothing newer.
#[cfg(target_os = "espidf")]
fn fetch_and_flash(url: &str, version: &str) -> Result<Option<u64>, UpdateError> {
    use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
    use esp_idf_svc::http::Method;

    const CHUNK: usize = 4096;

    let conf = Configuration {
        timeout: Some(core::time::Duration::from_secs(20)),
        crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
        ..Default::default()
    };
    let http_err = |e: esp_idf_svc::sys::EspError| UpdateError::Failed(format!("HTTP error: {e}"));

    let mut conn = EspHttpConnection::new(&conf).map_err(http_err)?;
    conn.initiate_request(Method::Get, url, &[("x-firmware-version", version)])
        .map_err(http_err)?;
    conn.initiate_response().map_err(http_err)?;

    match conn.status() {
        304 => return Ok(None),
        200..=299 => {}
        status => return Err(UpdateError::Failed(format!("HTTP {status}"))),
    }

    let mut update = esp_ota::OtaUpdate::begin()
        .map_err(|e| UpdateError::Failed(format!("no OTA partition: {e:?}")))?;
    let mut buf = [0u8; CHUNK];
    let mut total = 0u64;
    loop {
        let n = conn.read(&mut buf).map_err(http_err)?;
        if n == 0 {
            break;
        }
        update
            .write(&buf[..n])
            .map_err(|e| UpdateError::Failed(format!("flash write: {e:?}")))?;
        total += n as u64;
    }
    if total == 0 {
        return Err(UpdateError::Failed("empty image".into()));
    }

    let mut completed = update
        .finalize()
        .map_err(|e| UpdateError::Failed(format!("verify: {e:?}")))?;
    completed
        .set_as_boot_partition()
        .map_err(|e| UpdateError::Failed(format!("set boot partition: {e:?}")))?;
    Ok(Some(total))
}

/// Mark the running image valid so the bootloader does not roll back.
#[cfg(target_os = "espidf")]
pub fn confirm_running_image() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: running image marked valid"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn confirm_running_image() {
    info!("OTA(sim): image confirmation skipped");
}
