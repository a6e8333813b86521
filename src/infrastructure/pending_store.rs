//! Pending-Audit Store
//!
//! Stages exactly one [`PendingAuditPayload`] per client under
//! `auditdash.pending_audit:<client id>` in a key-value storage, so an audit
//! computed before sign-in survives the trip through the auth flow.
//!
//! The public `save` / `load` / `clear` calls never fail: storage errors are
//! logged at debug level and dropped, because losing a pending preview must
//! not block navigation. The `try_*` variants expose the outcome.
//!
//! Several store instances over the same storage are not coordinated; the
//! last `save` wins and a `clear` from one instance removes what another
//! saved.

use crate::domain::audit::PendingAuditPayload;
use crate::domain::session::ClientId;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub const PENDING_AUDIT_KEY: &str = "auditdash.pending_audit";

pub fn pending_key(client: &ClientId) -> String {
    format!("{}:{}", PENDING_AUDIT_KEY, client)
}

/// Synchronous string key-value storage that may fail at any call.
pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> io::Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove_item(&self, key: &str) -> io::Result<()>;
}

/// Outcome of a write-side storage operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOutcome {
    Stored,
    Removed,
    Failed(String),
}

impl StorageOutcome {
    pub fn is_ok(&self) -> bool {
        !matches!(self, StorageOutcome::Failed(_))
    }
}

/// Outcome of reading the pending slot.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Found(PendingAuditPayload),
    Absent,
    Unreadable(String),
    Failed(String),
}

impl LoadOutcome {
    pub fn into_payload(self) -> Option<PendingAuditPayload> {
        match self {
            LoadOutcome::Found(payload) => Some(payload),
            _ => None,
        }
    }
}

pub struct PendingAuditStore {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
}

impl PendingAuditStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self::with_key(storage, PENDING_AUDIT_KEY)
    }

    pub fn for_client(storage: Arc<dyn KeyValueStorage>, client: &ClientId) -> Self {
        Self::with_key(storage, &pending_key(client))
    }

    pub fn with_key(storage: Arc<dyn KeyValueStorage>, key: &str) -> Self {
        Self {
            storage,
            key: key.to_string(),
        }
    }

    pub fn try_save(&self, payload: &PendingAuditPayload) -> StorageOutcome {
        let serialized = match serde_json::to_string(payload) {
            Ok(serialized) => serialized,
            Err(e) => return StorageOutcome::Failed(format!("serialize: {e}")),
        };
        match self.storage.set_item(&self.key, &serialized) {
            Ok(()) => StorageOutcome::Stored,
            Err(e) => StorageOutcome::Failed(format!("write: {e}")),
        }
    }

    pub fn try_load(&self) -> LoadOutcome {
        match self.storage.get_item(&self.key) {
            Ok(None) => LoadOutcome::Absent,
            Ok(Some(raw)) => match serde_json::from_str::<PendingAuditPayload>(&raw) {
                Ok(payload) => LoadOutcome::Found(payload),
                Err(e) => LoadOutcome::Unreadable(e.to_string()),
            },
            Err(e) => LoadOutcome::Failed(e.to_string()),
        }
    }

    pub fn try_clear(&self) -> StorageOutcome {
        match self.storage.remove_item(&self.key) {
            Ok(()) => StorageOutcome::Removed,
            Err(e) => StorageOutcome::Failed(format!("remove: {e}")),
        }
    }

    /// Best-effort save; overwrites any previous payload.
    pub fn save(&self, payload: &PendingAuditPayload) {
        if let StorageOutcome::Failed(reason) = self.try_save(payload) {
            debug!(key = %self.key, reason = %reason, "Pending audit not saved");
        }
    }

    /// The staged payload, or `None` if absent, unparseable or unreadable.
    pub fn load(&self) -> Option<PendingAuditPayload> {
        match self.try_load() {
            LoadOutcome::Found(payload) => Some(payload),
            LoadOutcome::Absent => None,
            LoadOutcome::Unreadable(reason) | LoadOutcome::Failed(reason) => {
                debug!(key = %self.key, reason = %reason, "Pending audit not loaded");
                None
            }
        }
    }

    pub fn clear(&self) {
        if let StorageOutcome::Failed(reason) = self.try_clear() {
            debug!(key = %self.key, reason = %reason, "Pending audit not cleared");
        }
    }
}

/// One file per key under a directory. Writes go through a temp file and a
/// rename so a crash never leaves a half-written payload.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let target = self.path_for(key);
        let tmp = target.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &target)
    }

    fn remove_item(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// In-process storage with an optional byte quota, mirroring browser
/// storage that rejects writes once full.
#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn items(&self) -> io::Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.items
            .lock()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.items()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> io::Result<()> {
        let mut items = self.items()?;
        if let Some(quota) = self.quota_bytes {
            let used: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    "storage quota exceeded",
                ));
            }
        }
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> io::Result<()> {
        self.items()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::{Finding, SeverityCounts, UserType};
    use crate::domain::taxonomy::Severity;
    use serde_json::json;
    use tempfile::TempDir;

    struct BrokenStorage;

    impl KeyValueStorage for BrokenStorage {
        fn get_item(&self, _key: &str) -> io::Result<Option<String>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "storage disabled"))
        }
        fn set_item(&self, _key: &str, _value: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "storage disabled"))
        }
        fn remove_item(&self, _key: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "storage disabled"))
        }
    }

    fn payload(score: f64) -> PendingAuditPayload {
        let findings = vec![Finding {
            severity: Severity::High,
            title: "Unchecked call".to_string(),
            description: "Return value of low-level call ignored".to_string(),
            remediation: Some("Check the return value".to_string()),
        }];
        PendingAuditPayload {
            score: Some(score),
            summary_md: "## Summary".to_string(),
            counts: SeverityCounts::from_findings(&findings),
            baseline_findings: findings,
            analytics: json!({"answered": 14}),
            meta: json!({
                "developer_responses": [{"question": "Q1", "options": ["yes"]}]
            }),
            user_type: UserType::Developer,
        }
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let store = PendingAuditStore::new(Arc::new(MemoryStorage::new()));
        let p = payload(81.5);
        store.save(&p);
        assert_eq!(store.load(), Some(p));
    }

    #[test]
    fn test_full_precision_score_round_trips() {
        let store = PendingAuditStore::new(Arc::new(MemoryStorage::new()));
        for score in [0.10148678317123007, 1.0 / 3.0, 99.99999999999999, f64::MIN_POSITIVE] {
            let p = payload(score);
            store.save(&p);
            let loaded = store.load().unwrap();
            assert_eq!(loaded.score.unwrap().to_bits(), score.to_bits());
            assert_eq!(loaded, p);
        }
    }

    #[test]
    fn test_clear_then_load_is_none() {
        let store = PendingAuditStore::new(Arc::new(MemoryStorage::new()));
        store.save(&payload(10.0));
        store.clear();
        assert_eq!(store.load(), None);
        // Clearing an empty slot is fine.
        assert_eq!(store.try_clear(), StorageOutcome::Removed);
    }

    #[test]
    fn test_save_overwrites() {
        let store = PendingAuditStore::new(Arc::new(MemoryStorage::new()));
        store.save(&payload(10.0));
        store.save(&payload(20.0));
        assert_eq!(store.load().unwrap().score, Some(20.0));
    }

    #[test]
    fn test_broken_storage_never_panics() {
        let store = PendingAuditStore::new(Arc::new(BrokenStorage));
        store.save(&payload(1.0));
        store.clear();
        assert_eq!(store.load(), None);
        assert!(!store.try_save(&payload(1.0)).is_ok());
        assert!(matches!(store.try_load(), LoadOutcome::Failed(_)));
    }

    #[test]
    fn test_quota_exceeded_keeps_previous_value() {
        let storage = Arc::new(MemoryStorage::with_quota(1024));
        let store = PendingAuditStore::new(storage);
        let small = payload(5.0);
        store.save(&small);

        let mut big = payload(6.0);
        big.summary_md = "x".repeat(4096);
        assert!(matches!(store.try_save(&big), StorageOutcome::Failed(_)));
        store.save(&big);

        // Either the previous payload or nothing, never an error.
        let loaded = store.load();
        assert!(loaded.is_none() || loaded == Some(small));
    }

    #[test]
    fn test_unparseable_value_loads_as_none() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(PENDING_AUDIT_KEY, "{not json").unwrap();
        let store = PendingAuditStore::new(storage);
        assert!(matches!(store.try_load(), LoadOutcome::Unreadable(_)));
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_file_storage_survives_new_instance() {
        let dir = TempDir::new().unwrap();
        let p = payload(42.0);
        PendingAuditStore::new(Arc::new(FileStorage::new(dir.path()))).save(&p);

        let reopened = PendingAuditStore::new(Arc::new(FileStorage::new(dir.path())));
        assert_eq!(reopened.load(), Some(p));

        reopened.clear();
        assert_eq!(reopened.load(), None);
        assert!(!dir.path().join(format!("{PENDING_AUDIT_KEY}.json")).exists());
    }

    #[test]
    fn test_file_storage_in_missing_dir_is_created() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = PendingAuditStore::new(Arc::new(FileStorage::new(&nested)));
        assert_eq!(store.try_save(&payload(3.0)), StorageOutcome::Stored);
        assert!(store.load().is_some());
    }

    // Two tabs sharing one storage are not coordinated. This documents the
    // accepted behavior rather than a guarantee: last writer wins and either
    // side may clear the other's payload.
    #[test]
    fn test_uncoordinated_instances_last_write_wins() {
        let shared: Arc<dyn KeyValueStorage> = Arc::new(MemoryStorage::new());
        let tab_a = PendingAuditStore::new(shared.clone());
        let tab_b = PendingAuditStore::new(shared);

        tab_a.save(&payload(1.0));
        tab_b.save(&payload(2.0));
        assert_eq!(tab_a.load().unwrap().score, Some(2.0));

        tab_a.clear();
        assert_eq!(tab_b.load(), None);
    }

    #[test]
    fn test_clients_get_separate_files() {
        let tmp = TempDir::new().unwrap();
        let shared: Arc<dyn KeyValueStorage> = Arc::new(FileStorage::new(tmp.path()));
        let alice = ClientId::parse(Some("alice")).unwrap();
        let bob = ClientId::parse(Some("bob")).unwrap();

        PendingAuditStore::for_client(shared.clone(), &alice).save(&payload(1.0));
        assert_eq!(PendingAuditStore::for_client(shared.clone(), &bob).load(), None);
        assert!(tmp.path().join("auditdash.pending_audit_alice.json").exists());

        PendingAuditStore::for_client(shared.clone(), &bob).clear();
        assert!(PendingAuditStore::for_client(shared, &alice).load().is_some());
    }

    #[test]
    fn test_distinct_keys_are_independent() {
        let shared: Arc<dyn KeyValueStorage> = Arc::new(MemoryStorage::new());
        let a = PendingAuditStore::with_key(shared.clone(), "a");
        let b = PendingAuditStore::with_key(shared, "b");
        a.save(&payload(1.0));
        assert_eq!(b.load(), None);
        assert!(a.load().is_some());
    }
}
