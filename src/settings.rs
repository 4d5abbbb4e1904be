//! Per-scope configuration store.
//!
//! A scope's settings block is materialized with defaults the first time the
//! scope is referenced; individual keys are overwritten by `set`, which
//! persists the whole document immediately. Range validation is the caller's
//! job — this store only guarantees the documented defaults and durability.

use parking_lot::Mutex;
use tracing::info;

use crate::models::{ScopeSettings, SettingKey};
use crate::storage::{SettingsBackend, SettingsMap, StorageError};

pub struct SettingsStore {
    backend: Box<dyn SettingsBackend>,
    scopes: Mutex<SettingsMap>,
}

impl SettingsStore {
    /// Load the settings document and build the store.
    pub fn new(backend: Box<dyn SettingsBackend>) -> Result<Self, StorageError> {
        let scopes = backend.load()?;
        Ok(Self {
            backend,
            scopes: Mutex::new(scopes),
        })
    }

    /// One setting for a scope; defaults are applied lazily on first access.
    pub fn get(&self, scope_id: &str, key: SettingKey) -> i64 {
        self.scope(scope_id).get(key)
    }

    /// Snapshot of a scope's full settings block.
    pub fn scope(&self, scope_id: &str) -> ScopeSettings {
        let mut scopes = self.scopes.lock();
        scopes
            .entry(scope_id.to_string())
            .or_default()
            .clone()
    }

    /// Overwrite one key and persist the document. A failed save rolls the
    /// in-memory value back.
    pub fn set(&self, scope_id: &str, key: SettingKey, value: i64) -> Result<(), StorageError> {
        let mut scopes = self.scopes.lock();
        let block = scopes.entry(scope_id.to_string()).or_default();
        let prev = block.get(key);
        block.set(key, value);

        if let Err(e) = self.backend.save(&scopes) {
            if let Some(block) = scopes.get_mut(scope_id) {
                block.set(key, prev);
            }
            return Err(e);
        }
        info!(scope = scope_id, key = key.as_str(), value, "setting updated");
        Ok(())
    }
}
