//! Local persistence adapter
//!
//! Caches plain operation metadata in a key-value store so the pending and
//! executed lists survive a session restart. Nothing here is a source of
//! truth: signable objects and signatures are never written, and storage
//! failures degrade to "nothing persists this session" with a warning.

use covault_types::{AccAddress, EngineError, PersistedOperation, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Minimal key-value storage seam
pub trait KvStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory storage, the default for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStorage for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| EngineError::PersistenceUnavailable(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| EngineError::PersistenceUnavailable(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// File-backed storage, one file per key under the given directory
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Storage under the default config directory (`~/.covault/state`)
    pub fn default_dir() -> Self {
        let dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".covault")
            .join("state");
        Self::new(dir)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // keys contain addresses and slashes; keep the file name flat
        let sanitized: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(format!("{sanitized}.json"))
    }
}

impl KvStorage for FileKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(path)
            .map(Some)
            .map_err(|e| EngineError::PersistenceUnavailable(e.to_string()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| EngineError::PersistenceUnavailable(e.to_string()))?;
        std::fs::write(self.path_for(key), value)
            .map_err(|e| EngineError::PersistenceUnavailable(e.to_string()))
    }
}

/// Best-effort operation-metadata cache over a [`KvStorage`]
#[derive(Clone)]
pub struct PersistenceAdapter {
    storage: Arc<dyn KvStorage>,
}

impl PersistenceAdapter {
    pub fn new(storage: Arc<dyn KvStorage>) -> Self {
        Self { storage }
    }

    fn key(account: &AccAddress) -> String {
        format!("covault/operations/{account}")
    }

    /// Load the persisted operation list for an account. Unavailable or
    /// corrupt storage yields an empty list, never an error.
    pub fn load(&self, account: &AccAddress) -> Vec<PersistedOperation> {
        let raw = match self.storage.get(&Self::key(account)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(account = %account, error = %e, "persistence read failed, starting empty");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(ops) => ops,
            Err(e) => {
                warn!(account = %account, error = %e, "persisted state unreadable, starting empty");
                Vec::new()
            }
        }
    }

    /// Write the operation list for an account. Failures are logged and
    /// swallowed; callers must not depend on the write landing.
    pub fn save(&self, account: &AccAddress, operations: &[PersistedOperation]) {
        let raw = match serde_json::to_string(operations) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(account = %account, error = %e, "failed to serialize persisted state");
                return;
            }
        };
        if let Err(e) = self.storage.set(&Self::key(account), &raw) {
            warn!(account = %account, error = %e, "persistence write failed, state not saved");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covault_types::{CallType, Operation, Substrate, TrackedOperation};

    /// Storage that fails every call, as private browsing would
    struct BrokenKv;

    impl KvStorage for BrokenKv {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(EngineError::PersistenceUnavailable("quota".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(EngineError::PersistenceUnavailable("quota".to_string()))
        }
    }

    fn account() -> AccAddress {
        AccAddress::from_pubkey(&[1u8; 33])
    }

    fn persisted() -> PersistedOperation {
        let op = Operation {
            account: account(),
            chain_id: "covault-test".to_string(),
            to: AccAddress::from_pubkey(&[2u8; 33]),
            value: 9,
            payload: vec![1],
            call_type: CallType::Direct,
            nonce: 0,
        };
        let tracked = TrackedOperation::new(&op, Substrate::Local, 2);
        PersistedOperation::from_tracked(&tracked, &op.account, &op.chain_id)
    }

    #[test]
    fn test_roundtrip_through_memory_kv() {
        let adapter = PersistenceAdapter::new(Arc::new(MemoryKv::new()));
        let account = account();
        assert!(adapter.load(&account).is_empty());

        adapter.save(&account, &[persisted()]);
        let loaded = adapter.load(&account);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].value, "9");
    }

    #[test]
    fn test_broken_storage_degrades_silently() {
        let adapter = PersistenceAdapter::new(Arc::new(BrokenKv));
        let account = account();
        // neither call panics or errors out
        adapter.save(&account, &[persisted()]);
        assert!(adapter.load(&account).is_empty());
    }

    #[test]
    fn test_corrupt_state_starts_empty() {
        let kv = Arc::new(MemoryKv::new());
        let account = account();
        kv.set(&PersistenceAdapter::key(&account), "{not json").unwrap();

        let adapter = PersistenceAdapter::new(kv);
        assert!(adapter.load(&account).is_empty());
    }

    #[test]
    fn test_file_kv_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileKv::new(dir.path().to_path_buf());
        assert_eq!(kv.get("covault/operations/x").unwrap(), None);
        kv.set("covault/operations/x", "[1,2]").unwrap();
        assert_eq!(
            kv.get("covault/operations/x").unwrap().as_deref(),
            Some("[1,2]")
        );
    }
}
