use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::errors::{FlAuthError, Result};

/// Durable key-value storage for session secrets
///
/// Implementations must persist values across restarts and keep them
/// encrypted at rest. Read failures are reported as absent values; the
/// implementation logs the cause.
#[async_trait::async_trait]
pub trait SecureStore: Send + Sync {
    /// Read a secret by key
    async fn get(&self, key: &str) -> Option<String>;

    /// Write a secret, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a secret. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// In-memory secure store for testing and simple use cases
#[derive(Debug, Clone, Default)]
pub struct MemorySecureStore {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored secrets
    pub fn len(&self) -> usize {
        self.values.read().map(|v| v.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl SecureStore for MemorySecureStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.values.read().ok()?.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .map_err(|_| FlAuthError::Storage("Lock poisoned".to_string()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values
            .write()
            .map_err(|_| FlAuthError::Storage("Lock poisoned".to_string()))?
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemorySecureStore::new();
        assert!(store.get("k").await.is_none());

        store.set("k", "v1").await.unwrap();
        store.set("k", "v2").await.unwrap();
        assert_eq!(store.get("k").await.as_deref(), Some("v2"));
        assert_eq!(store.len(), 1);

        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let store = MemorySecureStore::new();
        let other = store.clone();
        store.set("access", "token").await.unwrap();
        assert_eq!(other.get("access").await.as_deref(), Some("token"));
    }
}
