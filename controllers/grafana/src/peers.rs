//! Peer-shared state.
//!
//! Cooperating instances of the same deployment share exactly one piece of
//! mutable state: the resolved admin password. The store is modeled as a
//! conflict-free single-key register, not a lock: reads prefer whatever a
//! peer has already published, and the last explicit write wins.
//!
//! [`FilePeerStore`] is the machine-deployment implementation: the
//! deployment substrate replicates the backing file between instances.
//! [`InMemoryPeerStore`] backs unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

/// Peer-state failures. Not fatal: callers degrade to local behavior.
#[derive(Debug, Error)]
pub enum PeerStoreError {
    /// The instance is not (yet) part of a group
    #[error("peer state unavailable: {0}")]
    Unavailable(String),

    /// Backing file unreadable/unwritable
    #[error("peer state I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backing file corrupt
    #[error("peer state decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Single-key store shared among cooperating instances.
#[async_trait]
pub trait PeerStore: Send + Sync {
    /// Read a shared key, `None` when no peer has published it yet.
    async fn get(&self, key: &str) -> Result<Option<String>, PeerStoreError>;

    /// Publish a shared key (last writer wins).
    async fn set(&self, key: &str, value: &str) -> Result<(), PeerStoreError>;
}

/// File-backed peer store.
///
/// The file is a flat JSON object. A missing parent directory means the
/// instance has not joined the group yet and reads/writes fail with
/// [`PeerStoreError::Unavailable`].
#[derive(Debug, Clone)]
pub struct FilePeerStore {
    path: PathBuf,
}

impl FilePeerStore {
    /// Create a store backed by `path`.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Result<HashMap<String, String>, PeerStoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn group_joined(&self) -> Result<(), PeerStoreError> {
        let parent = self.path.parent().unwrap_or(&self.path);
        if !parent.exists() {
            return Err(PeerStoreError::Unavailable(format!(
                "{} does not exist",
                parent.display()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PeerStore for FilePeerStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PeerStoreError> {
        self.group_joined()?;
        Ok(self.load()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PeerStoreError> {
        self.group_joined()?;
        let mut data = self.load()?;
        data.insert(key.to_string(), value.to_string());
        let encoded = serde_json::to_vec_pretty(&data)?;
        std::fs::write(&self.path, encoded)?;
        debug!("Published peer key {key}");
        Ok(())
    }
}

/// In-memory peer store for tests; can be shared between "instances" by
/// cloning, and switched unavailable to exercise the fallback path.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPeerStore {
    data: Arc<Mutex<HashMap<String, String>>>,
    unavailable: Arc<Mutex<bool>>,
}

impl InMemoryPeerStore {
    /// Empty, available store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent operations fail as if the group were not formed.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }
}

#[async_trait]
impl PeerStore for InMemoryPeerStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PeerStoreError> {
        if *self.unavailable.lock().unwrap() {
            return Err(PeerStoreError::Unavailable("not in a group".to_string()));
        }
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PeerStoreError> {
        if *self.unavailable.lock().unwrap() {
            return Err(PeerStoreError::Unavailable("not in a group".to_string()));
        }
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePeerStore::new(dir.path().join("peer.json"));

        assert_eq!(store.get("admin_password").await.unwrap(), None);
        store.set("admin_password", "hunter2").await.unwrap();
        assert_eq!(
            store.get("admin_password").await.unwrap().as_deref(),
            Some("hunter2")
        );
    }

    #[tokio::test]
    async fn test_file_store_unavailable_before_group_formation() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePeerStore::new(dir.path().join("missing/peer.json"));

        assert!(matches!(
            store.get("admin_password").await,
            Err(PeerStoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.set("admin_password", "x").await,
            Err(PeerStoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let store = InMemoryPeerStore::new();
        store.set("k", "first").await.unwrap();
        store.set("k", "second").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("second"));
    }
}
