//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`StoragePort`] by keeping the whole parameter tree as one
//! JSON blob in the `brewctl` namespace.  NVS commits are atomic per
//! `nvs_commit()`, so a power cut leaves either the old or the new tree.
//!
//! On host targets a `HashMap` stands in for the flash partition.

use core::ffi::CStr;

use log::{info, warn};

use crate::app::ports::{StorageError, StoragePort};
use crate::config::ParameterStore;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const NAMESPACE: &CStr = c"brewctl";
const PARAMS_KEY: &CStr = c"params";

/// NVS blobs are limited to roughly one page set; keep well below it.
const MAX_BLOB_SIZE: usize = 8_000;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: HashMap<String, Vec<u8>>,
}

#[cfg(not(target_os = "espidf"))]
fn host_key() -> String {
    format!("{}::{}", NAMESPACE.to_string_lossy(), PARAMS_KEY.to_string_lossy())
}

impl NvsAdapter {
    /// Initialise NVS flash.  On first boot or after a layout change the
    /// partition is erased and re-initialised.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS
            // access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                let ret = unsafe { nvs_flash_erase() };
                if ret != ESP_OK {
                    return Err(StorageError::Io(ret));
                }
                let ret = unsafe { nvs_flash_init() };
                if ret != ESP_OK {
                    return Err(StorageError::Io(ret));
                }
            } else if ret != ESP_OK {
                return Err(StorageError::Io(ret));
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: HashMap::new(),
        })
    }

    /// Open the namespace, run `f` with the handle, close it again.
    #[cfg(target_os = "espidf")]
    fn with_handle<T>(write: bool, f: impl FnOnce(nvs_handle_t) -> Result<T, i32>) -> Result<T, i32> {
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        let ret = unsafe { nvs_open(NAMESPACE.as_ptr(), mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, StorageError> {
        let key = PARAMS_KEY;
        let result = Self::with_handle(false, |handle| {
            let mut size: usize = 0;
            let ret = unsafe { nvs_get_blob(handle, key.as_ptr(), core::ptr::null_mut(), &mut size) };
            if ret != ESP_OK {
                return Err(ret);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe { nvs_get_blob(handle, key.as_ptr(), buf.as_mut_ptr().cast(), &mut size) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(buf)
        });
        match result {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.store.get(&host_key()).cloned())
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        let key = PARAMS_KEY;
        Self::with_handle(true, |handle| {
            let ret = unsafe { nvs_set_blob(handle, key.as_ptr(), bytes.as_ptr().cast(), bytes.len()) };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(StorageError::Io)
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        self.store
            .insert(host_key(), bytes.to_vec());
        Ok(())
    }

    /// Overwrite the stored blob with raw bytes (host tests only).
    #[cfg(not(target_os = "espidf"))]
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.store
            .insert(host_key(), bytes.to_vec());
    }
}

impl StoragePort for NvsAdapter {
    fn load(&self) -> Result<ParameterStore, StorageError> {
        let Some(bytes) = self.read_blob()? else {
            info!("NvsAdapter: no stored parameters, using defaults");
            return Ok(ParameterStore::defaults());
        };
        let text = core::str::from_utf8(&bytes).map_err(|_| StorageError::Corrupted)?;
        let params = ParameterStore::from_json(text).map_err(|e| {
            warn!("NvsAdapter: stored parameters unreadable: {}", e);
            StorageError::Corrupted
        })?;
        info!("NvsAdapter: loaded parameters ({} bytes)", bytes.len());
        Ok(params)
    }

    fn save(&mut self, params: &ParameterStore) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(params.as_value()).map_err(|_| StorageError::Corrupted)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(StorageError::TooLarge);
        }
        self.write_blob(&bytes)?;
        info!("NvsAdapter: parameters saved ({} bytes)", bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::ConfigPort;
    use crate::config::keys;

    #[test]
    fn empty_store_loads_defaults() {
        let nvs = NvsAdapter::new().unwrap();
        assert_eq!(nvs.load().unwrap(), ParameterStore::defaults());
    }

    #[test]
    fn saved_edits_survive_reload() {
        let mut nvs = NvsAdapter::new().unwrap();
        let mut params = ParameterStore::defaults();
        params.set(keys::BACKFLUSH_CYCLES, 3).unwrap();
        nvs.save(&params).unwrap();

        let loaded = nvs.load().unwrap();
        assert_eq!(loaded.get::<i32>(keys::BACKFLUSH_CYCLES).unwrap(), 3);
    }

    #[test]
    fn garbage_blob_is_corrupted() {
        let mut nvs = NvsAdapter::new().unwrap();
        nvs.write_raw(b"\xff\x00 not json");
        assert_eq!(nvs.load(), Err(StorageError::Corrupted));
        nvs.write_raw(b"[1, 2]");
        assert_eq!(nvs.load(), Err(StorageError::Corrupted));
    }
}
