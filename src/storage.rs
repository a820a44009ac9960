//! Secure storage port
//!
//! The engine reads and writes opaque byte blobs through the [`SecureStore`]
//! trait; encryption-at-rest and OS credential-store mechanics belong to the
//! implementing collaborator. Per user the engine persists a single
//! [`UserVault`] holding the enrollment baseline and the lockout state, so
//! each decision issues at most one read and one write.
//!
//! The serialized layout is implementation-internal JSON and is not
//! guaranteed stable across versions.

use crate::error::{AuthError, StoreError};
use crate::types::{EnrollmentBaseline, LockoutState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Storage port consumed by the engine. Implementations own encryption.
pub trait SecureStore: Send + Sync {
    /// Fetch the blob for a user, `None` if absent
    fn get(&self, user_id: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store (or replace) the blob for a user
    fn put(&self, user_id: &str, blob: Vec<u8>) -> Result<(), StoreError>;

    /// Remove the blob for a user; absent users are not an error
    fn delete(&self, user_id: &str) -> Result<(), StoreError>;
}

impl<S: SecureStore + ?Sized> SecureStore for std::sync::Arc<S> {
    fn get(&self, user_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(user_id)
    }

    fn put(&self, user_id: &str, blob: Vec<u8>) -> Result<(), StoreError> {
        (**self).put(user_id, blob)
    }

    fn delete(&self, user_id: &str) -> Result<(), StoreError> {
        (**self).delete(user_id)
    }
}

/// Everything the engine persists for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserVault {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<EnrollmentBaseline>,
    pub lockout: LockoutState,
}

impl UserVault {
    pub fn new(lockout: LockoutState) -> Self {
        Self {
            baseline: None,
            lockout,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, AuthError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AuthError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// In-memory store for tests and embedding scenarios without a platform
/// credential store
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureStore for MemoryStore {
    fn get(&self, user_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))?;
        Ok(blobs.get(user_id).cloned())
    }

    fn put(&self, user_id: &str, blob: Vec<u8>) -> Result<(), StoreError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))?;
        blobs.insert(user_id.to_string(), blob);
        Ok(())
    }

    fn delete(&self, user_id: &str) -> Result<(), StoreError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))?;
        blobs.remove(user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LockoutState;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("alice").unwrap(), None);

        store.put("alice", vec![1, 2, 3]).unwrap();
        assert_eq!(store.get("alice").unwrap(), Some(vec![1, 2, 3]));

        store.put("alice", vec![4]).unwrap();
        assert_eq!(store.get("alice").unwrap(), Some(vec![4]));

        store.delete("alice").unwrap();
        assert_eq!(store.get("alice").unwrap(), None);
    }

    #[test]
    fn test_delete_missing_user_is_ok() {
        let store = MemoryStore::new();
        assert!(store.delete("nobody").is_ok());
    }

    #[test]
    fn test_vault_round_trip() {
        let vault = UserVault::new(LockoutState::new(2));
        let bytes = vault.to_bytes().unwrap();
        let loaded = UserVault::from_bytes(&bytes).unwrap();
        assert_eq!(vault, loaded);
        assert!(loaded.baseline.is_none());
    }

    #[test]
    fn test_vault_rejects_garbage() {
        assert!(UserVault::from_bytes(b"not json").is_err());
    }
}
