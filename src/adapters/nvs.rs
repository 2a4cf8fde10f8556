//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] for the TankWatch system.
//!
//! The configuration is stored as one `postcard` blob prefixed with a
//! format-version byte.  A missing blob loads as defaults; a blob that fails
//! to decode, carries an unknown version or fails validation is reported,
//! never silently patched.
//!
//! - **`espidf`** — ESP-IDF NVS, namespace `tankwatch`, key `syscfg`.
//!   Commits are atomic per `nvs_commit()`.
//! - **host** — in-memory blob (dev/test only).

use crate::app::ports::ConfigPort;
use crate::config::SystemConfig;
use crate::error::ConfigError;
use log::{info, warn};

#[cfg(feature = "espidf")]
use esp_idf_svc::sys::*;

/// Bumped whenever `SystemConfig`'s serialized layout changes.
pub const CONFIG_FORMAT_VERSION: u8 = 1;

#[cfg(feature = "espidf")]
const CONFIG_NAMESPACE: &[u8] = b"tankwatch\0";
#[cfg(feature = "espidf")]
const CONFIG_KEY: &[u8] = b"syscfg\0";

/// Upper bound on a stored blob; anything larger is treated as corrupt.
pub const MAX_BLOB_SIZE: usize = 512;

/// Serialize a config into its stored form.
pub fn encode_config(cfg: &SystemConfig) -> Result<Vec<u8>, ConfigError> {
    let mut bytes = vec![CONFIG_FORMAT_VERSION];
    let body = postcard::to_allocvec(cfg).map_err(|_| ConfigError::IoError)?;
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Decode and validate a stored blob.
pub fn decode_config(bytes: &[u8]) -> Result<SystemConfig, ConfigError> {
    if bytes.len() > MAX_BLOB_SIZE {
        return Err(ConfigError::Corrupted);
    }
    let (&version, body) = bytes.split_first().ok_or(ConfigError::Corrupted)?;
    if version != CONFIG_FORMAT_VERSION {
        warn!(
            "NvsAdapter: config format v{} (expected v{})",
            version, CONFIG_FORMAT_VERSION
        );
        return Err(ConfigError::Corrupted);
    }
    let cfg: SystemConfig = postcard::from_bytes(body).map_err(|_| ConfigError::Corrupted)?;
    cfg.validate()?;
    Ok(cfg)
}

pub struct NvsAdapter {
    #[cfg(not(feature = "espidf"))]
    blob: std::cell::RefCell<Option<Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is erased
    /// and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(feature = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS
            // access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(feature = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(feature = "espidf"))]
            blob: std::cell::RefCell::new(None),
        })
    }

    /// Replace the stored blob verbatim (simulation only).
    #[cfg(not(feature = "espidf"))]
    pub fn inject_raw(&self, bytes: &[u8]) {
        *self.blob.borrow_mut() = Some(bytes.to_vec());
    }

    /// Open the config namespace, run `f` with the handle, then close.
    #[cfg(feature = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let ret = unsafe { nvs_open(CONFIG_NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(feature = "espidf")]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let result = Self::with_nvs_handle(false, |handle| {
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    CONFIG_KEY.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    CONFIG_KEY.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(buf)
        });

        match result {
            Ok(bytes) => Ok(Some(bytes)),
            // A fresh partition has no namespace yet either.
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
            Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH => Err(ConfigError::Corrupted),
            Err(e) => {
                warn!("NvsAdapter: NVS read error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(not(feature = "espidf"))]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self.blob.borrow().clone())
    }

    #[cfg(feature = "espidf")]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        let result = Self::with_nvs_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    CONFIG_KEY.as_ptr() as *const _,
                    bytes.as_ptr() as *const _,
                    bytes.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        });
        result.map_err(|e| {
            warn!("NvsAdapter: NVS write error {}", e);
            ConfigError::IoError
        })
    }

    #[cfg(not(feature = "espidf"))]
    fn write_blob(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        *self.blob.borrow_mut() = Some(bytes.to_vec());
        Ok(())
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        match self.read_blob()? {
            Some(bytes) => {
                let cfg = decode_config(&bytes)?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            None => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = encode_config(config)?;
        self.write_blob(&bytes)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

#[cfg(all(test, not(feature = "espidf")))]
mod tests {
    use super::*;
    use crate::config::{PumpMode, TankMode};

    #[test]
    fn missing_blob_loads_defaults() {
        let nvs = NvsAdapter::new().unwrap();
        assert_eq!(nvs.load().unwrap(), SystemConfig::default());
    }

    #[test]
    fn save_then_load() {
        let nvs = NvsAdapter::new().unwrap();
        let mut cfg = SystemConfig::default();
        cfg.tank_mode = TankMode::Dual;
        cfg.pump.mode = PumpMode::Automatic;
        cfg.tank1.calibration.empty_cm = 150.0;
        nvs.save(&cfg).unwrap();
        assert_eq!(nvs.load().unwrap(), cfg);
    }

    #[test]
    fn save_rejects_invalid_config() {
        let nvs = NvsAdapter::new().unwrap();
        let mut cfg = SystemConfig::default();
        cfg.pump.thresholds.auto_on_threshold = 95.0;
        assert!(matches!(
            nvs.save(&cfg),
            Err(ConfigError::ValidationFailed(_))
        ));
        // Nothing was written.
        assert_eq!(nvs.load().unwrap(), SystemConfig::default());
    }

    #[test]
    fn garbage_blob_is_corrupted() {
        let nvs = NvsAdapter::new().unwrap();
        nvs.inject_raw(&[CONFIG_FORMAT_VERSION, 0xFF, 0xFF, 0xFF]);
        assert_eq!(nvs.load(), Err(ConfigError::Corrupted));
        nvs.inject_raw(&[]);
        assert_eq!(nvs.load(), Err(ConfigError::Corrupted));
    }

    #[test]
    fn unknown_version_is_corrupted() {
        let mut bytes = encode_config(&SystemConfig::default()).unwrap();
        bytes[0] = CONFIG_FORMAT_VERSION + 1;
        assert_eq!(decode_config(&bytes), Err(ConfigError::Corrupted));
    }

    #[test]
    fn stored_but_invalid_config_fails_validation() {
        let mut cfg = SystemConfig::default();
        cfg.sensor.sample_count = 42;
        let mut bytes = vec![CONFIG_FORMAT_VERSION];
        bytes.extend(postcard::to_allocvec(&cfg).unwrap());
        assert!(matches!(
            decode_config(&bytes),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn encoded_default_fits_blob_limit() {
        let bytes = encode_config(&SystemConfig::default()).unwrap();
        assert!(bytes.len() < MAX_BLOB_SIZE);
    }
}
