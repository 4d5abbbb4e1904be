//! Persistence boundary for the two JSON documents.
//!
//! The stores hold no business rules: they load a snapshot once and save a
//! snapshot on demand. I/O failures propagate to the caller as
//! `StorageError` — never silently dropped — and the bank treats a failed
//! save as an aborted mutation.
//!
//! Accounts document: `scope_id -> owner_id -> {name, balance, created_at}`.
//! Settings document: `scope_id -> {PAYDAY_TIME, ..., REGISTER_CREDITS}`.
//!
//! An older accounts format kept balances keyed by owner id alone at the top
//! level. Those entries are surfaced by `load` as a separate legacy-import
//! map and are consumed once at registration, outside the bank's steady-state
//! contract.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use crate::models::{Account, ScopeSettings, CREATED_AT_FORMAT};

/// In-memory accounts snapshot: scope_id -> owner_id -> account.
pub type AccountMap = HashMap<String, HashMap<String, Account>>;

/// In-memory settings snapshot: scope_id -> settings block.
pub type SettingsMap = HashMap<String, ScopeSettings>;

/// Result of loading the accounts document.
#[derive(Debug, Clone, Default)]
pub struct LoadedLedger {
    pub accounts: AccountMap,
    /// Balances from the pre-scope document format, keyed by owner id.
    /// Consumed once at registration, then dropped.
    pub legacy_balances: HashMap<String, i64>,
}

/// Persistence failures. Distinct from business-rule errors; the caller
/// decides whether to retry.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// Filesystem I/O failed.
    Io { path: String, message: String },
    /// The document exists but could not be decoded.
    Corrupt { path: String, message: String },
    /// The backing store refused the operation.
    Unavailable(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => write!(f, "i/o error on {}: {}", path, message),
            Self::Corrupt { path, message } => {
                write!(f, "corrupt document {}: {}", path, message)
            }
            Self::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

/// Durable key-value backing for accounts. Loaded once, flushed on mutation.
pub trait LedgerStore: Send + Sync {
    fn load(&self) -> Result<LoadedLedger, StorageError>;
    fn save(&self, accounts: &AccountMap) -> Result<(), StorageError>;
}

/// Durable backing for the per-scope settings document.
pub trait SettingsBackend: Send + Sync {
    fn load(&self) -> Result<SettingsMap, StorageError>;
    fn save(&self, settings: &SettingsMap) -> Result<(), StorageError>;
}

/// Serialized account record, matching the on-disk document field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccountRecord {
    name: String,
    balance: i64,
    created_at: String,
}

fn io_err(path: &Path, e: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

fn corrupt_err(path: &Path, message: impl Into<String>) -> StorageError {
    StorageError::Corrupt {
        path: path.display().to_string(),
        message: message.into(),
    }
}

/// Write a document via a temp file and rename, so a crash mid-write never
/// leaves a truncated document behind.
fn write_atomic(path: &Path, contents: &str) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| io_err(path, e))?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

// ============================================================================
// JSON file stores
// ============================================================================

/// Accounts document stored as a JSON file.
pub struct JsonFileLedger {
    path: PathBuf,
}

impl JsonFileLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LedgerStore for JsonFileLedger {
    fn load(&self) -> Result<LoadedLedger, StorageError> {
        if !self.path.exists() {
            return Ok(LoadedLedger::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))?;
        if raw.trim().is_empty() {
            return Ok(LoadedLedger::default());
        }
        let doc: HashMap<String, serde_json::Value> =
            serde_json::from_str(&raw).map_err(|e| corrupt_err(&self.path, e.to_string()))?;

        let mut loaded = LoadedLedger::default();
        for (key, value) in doc {
            // Legacy entries carry a balance directly; scope entries map
            // owner ids to records.
            if value.get("balance").is_some() {
                let balance = value
                    .get("balance")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0)
                    .max(0);
                loaded.legacy_balances.insert(key, balance);
                continue;
            }
            let records: HashMap<String, AccountRecord> = serde_json::from_value(value)
                .map_err(|e| corrupt_err(&self.path, format!("scope {}: {}", key, e)))?;
            let mut scope_accounts = HashMap::with_capacity(records.len());
            for (owner_id, record) in records {
                let created_at =
                    NaiveDateTime::parse_from_str(&record.created_at, CREATED_AT_FORMAT).map_err(
                        |e| corrupt_err(&self.path, format!("created_at for {}: {}", owner_id, e)),
                    )?;
                scope_accounts.insert(
                    owner_id.clone(),
                    Account {
                        scope_id: key.clone(),
                        owner_id,
                        display_name: record.name,
                        balance: record.balance,
                        created_at,
                    },
                );
            }
            loaded.accounts.insert(key, scope_accounts);
        }
        debug!(
            path = %self.path.display(),
            scopes = loaded.accounts.len(),
            legacy = loaded.legacy_balances.len(),
            "loaded accounts document"
        );
        Ok(loaded)
    }

    fn save(&self, accounts: &AccountMap) -> Result<(), StorageError> {
        let mut doc: HashMap<&str, HashMap<&str, AccountRecord>> =
            HashMap::with_capacity(accounts.len());
        for (scope_id, owners) in accounts {
            let records = owners
                .iter()
                .map(|(owner_id, account)| {
                    (
                        owner_id.as_str(),
                        AccountRecord {
                            name: account.display_name.clone(),
                            balance: account.balance,
                            created_at: account.created_at.format(CREATED_AT_FORMAT).to_string(),
                        },
                    )
                })
                .collect();
            doc.insert(scope_id.as_str(), records);
        }
        let contents = serde_json::to_string_pretty(&doc)
            .map_err(|e| corrupt_err(&self.path, e.to_string()))?;
        write_atomic(&self.path, &contents)
    }
}

/// Settings document stored as a JSON file.
pub struct JsonFileSettings {
    path: PathBuf,
}

impl JsonFileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettingsBackend for JsonFileSettings {
    fn load(&self) -> Result<SettingsMap, StorageError> {
        if !self.path.exists() {
            return Ok(SettingsMap::new());
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))?;
        if raw.trim().is_empty() {
            return Ok(SettingsMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| corrupt_err(&self.path, e.to_string()))
    }

    fn save(&self, settings: &SettingsMap) -> Result<(), StorageError> {
        let contents = serde_json::to_string_pretty(settings)
            .map_err(|e| corrupt_err(&self.path, e.to_string()))?;
        write_atomic(&self.path, &contents)
    }
}

// ============================================================================
// In-memory stores (tests and ephemeral use)
// ============================================================================

/// In-memory ledger store with injectable save failure.
#[derive(Default)]
pub struct MemoryLedger {
    saved: Mutex<AccountMap>,
    legacy: Mutex<HashMap<String, i64>>,
    fail_saves: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed legacy balances for migration tests.
    pub fn with_legacy(legacy: HashMap<String, i64>) -> Self {
        Self {
            saved: Mutex::new(AccountMap::new()),
            legacy: Mutex::new(legacy),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `save` fail with `StorageError::Unavailable`.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Last successfully saved snapshot.
    pub fn snapshot(&self) -> AccountMap {
        self.saved.lock().clone()
    }
}

impl LedgerStore for MemoryLedger {
    fn load(&self) -> Result<LoadedLedger, StorageError> {
        Ok(LoadedLedger {
            accounts: self.saved.lock().clone(),
            legacy_balances: self.legacy.lock().clone(),
        })
    }

    fn save(&self, accounts: &AccountMap) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("save disabled".into()));
        }
        *self.saved.lock() = accounts.clone();
        Ok(())
    }
}

/// In-memory settings backend with injectable save failure.
#[derive(Default)]
pub struct MemorySettings {
    saved: Mutex<SettingsMap>,
    fail_saves: AtomicBool,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> SettingsMap {
        self.saved.lock().clone()
    }
}

impl SettingsBackend for MemorySettings {
    fn load(&self) -> Result<SettingsMap, StorageError> {
        Ok(self.saved.lock().clone())
    }

    fn save(&self, settings: &SettingsMap) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("save disabled".into()));
        }
        *self.saved.lock() = settings.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn test_account(scope: &str, owner: &str, balance: i64) -> Account {
        Account {
            scope_id: scope.to_string(),
            owner_id: owner.to_string(),
            display_name: format!("user-{}", owner),
            balance,
            created_at: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(12, 30, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileLedger::new(dir.path().join("bank.json"));
        let loaded = store.load().unwrap();
        assert!(loaded.accounts.is_empty());
        assert!(loaded.legacy_balances.is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bank.json");
        let store = JsonFileLedger::new(&path);

        let mut accounts = AccountMap::new();
        accounts
            .entry("guild-1".to_string())
            .or_default()
            .insert("alice".to_string(), test_account("guild-1", "alice", 260));
        store.save(&accounts).unwrap();

        let loaded = store.load().unwrap();
        let acc = &loaded.accounts["guild-1"]["alice"];
        assert_eq!(acc.balance, 260);
        assert_eq!(acc.display_name, "user-alice");
        assert_eq!(
            acc.created_at.format(CREATED_AT_FORMAT).to_string(),
            "2024-03-01 12:30:00"
        );
    }

    #[test]
    fn test_document_field_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bank.json");
        let store = JsonFileLedger::new(&path);

        let mut accounts = AccountMap::new();
        accounts
            .entry("s".to_string())
            .or_default()
            .insert("o".to_string(), test_account("s", "o", 5));
        store.save(&accounts).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let record = &raw["s"]["o"];
        assert!(record.get("name").is_some());
        assert!(record.get("balance").is_some());
        assert_eq!(record["created_at"], "2024-03-01 12:30:00");
    }

    #[test]
    fn test_legacy_entries_split_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bank.json");
        fs::write(
            &path,
            r#"{
                "guild-1": {
                    "alice": {"name": "alice", "balance": 100, "created_at": "2024-01-01 00:00:00"}
                },
                "12345": {"name": "old-user", "balance": 777, "created_at": "2016-01-01 00:00:00"}
            }"#,
        )
        .unwrap();

        let loaded = JsonFileLedger::new(&path).load().unwrap();
        assert_eq!(loaded.accounts.len(), 1);
        assert_eq!(loaded.accounts["guild-1"]["alice"].balance, 100);
        assert_eq!(loaded.legacy_balances.get("12345"), Some(&777));
    }

    #[test]
    fn test_corrupt_document_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bank.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonFileLedger::new(&path).load(),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_settings_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileSettings::new(dir.path().join("settings.json"));
        assert!(store.load().unwrap().is_empty());

        let mut settings = SettingsMap::new();
        let mut block = ScopeSettings::default();
        block.slot_max = 9999;
        settings.insert("guild-1".to_string(), block);
        store.save(&settings).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded["guild-1"].slot_max, 9999);
        assert_eq!(loaded["guild-1"].payday_credits, 120);
    }

    #[test]
    fn test_memory_ledger_failure_injection() {
        let store = MemoryLedger::new();
        let accounts = AccountMap::new();
        store.save(&accounts).unwrap();
        store.set_fail_saves(true);
        assert!(matches!(
            store.save(&accounts),
            Err(StorageError::Unavailable(_))
        ));
    }
}
