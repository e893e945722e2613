//! NVS (Non-Volatile Storage) config store.
//!
//! Holds the provisioning blob: a JSON-encoded [`DeviceConfig`] under one
//! key.  A missing blob means "use defaults"; a present but unparsable or
//! out-of-range blob is an error the caller decides about.
//!
//! - **`target_os = "espidf"`**: `EspNvs` on the default partition.
//! - **all other targets**: in-memory map (dev/test only).

use log::info;

use crate::config::DeviceConfig;
use crate::error::ConfigError;

const CONFIG_NAMESPACE: &str = "powerreset";
const CONFIG_KEY: &str = "devcfg";
const MAX_BLOB_SIZE: usize = 1024;

pub struct ConfigStore {
    #[cfg(target_os = "espidf")]
    nvs: esp_idf_svc::nvs::EspNvs<esp_idf_svc::nvs::NvsDefault>,
    #[cfg(not(target_os = "espidf"))]
    blob: Option<Vec<u8>>,
}

impl ConfigStore {
    #[cfg(target_os = "espidf")]
    pub fn open(partition: esp_idf_svc::nvs::EspDefaultNvsPartition) -> Result<Self, ConfigError> {
        let nvs = esp_idf_svc::nvs::EspNvs::new(partition, CONFIG_NAMESPACE, true).map_err(|e| {
            log::warn!("ConfigStore: open '{}' failed: {:?}", CONFIG_NAMESPACE, e);
            ConfigError::IoError
        })?;
        info!("ConfigStore: NVS namespace '{}' open", CONFIG_NAMESPACE);
        Ok(Self { nvs })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn open() -> Result<Self, ConfigError> {
        info!("ConfigStore: simulation backend");
        Ok(Self { blob: None })
    }

    /// Stored config, or defaults when nothing was provisioned.
    pub fn load(&self) -> Result<DeviceConfig, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        match self.read_blob(&mut buf)? {
            Some(bytes) => {
                let config = DeviceConfig::from_json(bytes)?;
                info!("ConfigStore: loaded provisioned config");
                Ok(config)
            }
            None => {
                info!("ConfigStore: nothing provisioned, using defaults");
                Ok(DeviceConfig::default())
            }
        }
    }

    /// Validate and persist `config`.
    pub fn save(&mut self, config: &DeviceConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = serde_json::to_vec(config).map_err(|_| ConfigError::Corrupted)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::ValidationFailed("config blob too large"));
        }
        self.write_blob(&bytes)?;
        info!("ConfigStore: saved {} bytes", bytes.len());
        Ok(())
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn read_blob<'a>(&self, buf: &'a mut [u8]) -> Result<Option<&'a [u8]>, ConfigError> {
        self.nvs.get_raw(CONFIG_KEY, buf).map_err(|e| {
            log::warn!("ConfigStore: read failed: {:?}", e);
            ConfigError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob<'a>(&self, buf: &'a mut [u8]) -> Result<Option<&'a [u8]>, ConfigError> {
        let Some(blob) = self.blob.as_deref() else {
            return Ok(None);
        };
        let dst = buf.get_mut(..blob.len()).ok_or(ConfigError::Corrupted)?;
        dst.copy_from_slice(blob);
        Ok(Some(dst))
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&mut self, bytes: &[u8]) -> Result<(), ConfigError> {
        self.nvs.set_raw(CONFIG_KEY, bytes).map(|_| ()).map_err(|e| {
            log::warn!("ConfigStore: write failed: {:?}", e);
            ConfigError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&mut self, bytes: &[u8]) -> Result<(), ConfigError> {
        self.blob = Some(bytes.to_vec());
        Ok(())
    }

    /// Simulation: store raw bytes, bypassing validation.
    #[cfg(not(target_os = "espidf"))]
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.blob = Some(bytes.to_vec());
    }
}
