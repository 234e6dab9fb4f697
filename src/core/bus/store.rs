//=========================================================================
// Snapshot Store
//=========================================================================
//
// Durable key/value snapshots: the last full state per entity and the
// last value of every setting. Last write wins.
//
// Consumers read it only at cold start and on an explicit init; the bus
// carries steady-state changes.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
use thiserror::Error;

//=== StoreError ==========================================================

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("snapshot store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be decoded.
    #[error("snapshot {key:?} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
}

//=== SnapshotStore =======================================================

/// Durable string key/value store shared across processes.
pub trait SnapshotStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Reads `key` and parses it, treating a missing key as `None`.
pub fn get_parsed<T>(store: &dyn SnapshotStore, key: &str) -> Result<Option<T>, StoreError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match store.get(key)? {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e: T::Err| StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}

//=== MemoryStore =========================================================

/// In-memory snapshot store.
///
/// Can be switched offline to exercise the cold-start retry path.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    online: RwLock<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            online: RwLock::new(true),
        }
    }

    /// Makes every later call fail with [`StoreError::Unavailable`] while
    /// `online` is false.
    pub fn set_online(&self, online: bool) {
        *self.online.write() = online;
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if *self.online.read() {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".into()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_online()?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check_online()?;
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins() {
        let store = MemoryStore::new();
        store.set("mode", "overview").unwrap();
        store.set("mode", "gamecast").unwrap();
        assert_eq!(store.get("mode").unwrap().as_deref(), Some("gamecast"));
    }

    #[test]
    fn missing_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("num_games").unwrap(), None);
        assert_eq!(get_parsed::<usize>(&store, "num_games").unwrap(), None);
    }

    #[test]
    fn parsed_reads_report_corruption() {
        let store = MemoryStore::new();
        store.set("num_games", "twelve").unwrap();
        assert!(matches!(
            get_parsed::<usize>(&store, "num_games"),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn offline_store_is_unavailable() {
        let store = MemoryStore::new();
        store.set_online(false);
        assert!(matches!(store.get("0"), Err(StoreError::Unavailable(_))));

        store.set_online(true);
        assert!(store.get("0").is_ok());
    }
}
