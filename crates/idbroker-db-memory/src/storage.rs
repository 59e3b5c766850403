use std::sync::Arc;

use async_trait::async_trait;
use idbroker_storage::{KeyValueStorage, StorageError};
use papaya::HashMap as PapayaHashMap;

/// In-memory key-value backend using papaya lock-free HashMap.
///
/// This storage implementation provides:
/// - Lock-free concurrent access via papaya::HashMap
/// - Prefix listing in ascending key order
///
/// Contents live only as long as the process; it is meant for development
/// hosts and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStorage {
    data: Arc<PapayaHashMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    /// Creates a new, empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.data.pin().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::invalid_key(key));
    }
    Ok(())
}

#[async_trait]
impl KeyValueStorage for InMemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let guard = self.data.pin();
        Ok(guard.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        check_key(key)?;
        let guard = self.data.pin();
        guard.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let guard = self.data.pin();
        guard.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let guard = self.data.pin();
        let mut keys: Vec<String> = guard
            .iter()
            .filter_map(|(k, _)| k.strip_prefix(prefix))
            .map(str::to_string)
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let storage = InMemoryStorage::new();
        assert!(storage.get("config").await.unwrap().is_none());

        storage.put("config", b"{}".to_vec()).await.unwrap();
        assert_eq!(storage.get("config").await.unwrap(), Some(b"{}".to_vec()));
        assert_eq!(storage.len(), 1);

        storage.delete("config").await.unwrap();
        assert!(storage.get("config").await.unwrap().is_none());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let storage = InMemoryStorage::new();
        assert!(storage.delete("role/ghost").await.is_ok());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let storage = InMemoryStorage::new();
        storage.put("role/dev", b"1".to_vec()).await.unwrap();
        storage.put("role/dev", b"2".to_vec()).await.unwrap();
        assert_eq!(storage.get("role/dev").await.unwrap(), Some(b"2".to_vec()));
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let storage = InMemoryStorage::new();
        let err = storage.put("", Vec::new()).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey { .. }));
    }

    #[tokio::test]
    async fn test_list_strips_prefix_and_sorts() {
        let storage = InMemoryStorage::new();
        storage.put("role/ops", Vec::new()).await.unwrap();
        storage.put("role/dev", Vec::new()).await.unwrap();
        storage.put("config", Vec::new()).await.unwrap();

        let roles = storage.list("role/").await.unwrap();
        assert_eq!(roles, vec!["dev".to_string(), "ops".to_string()]);

        assert!(storage.list("missing/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let storage = InMemoryStorage::new();
        let other = storage.clone();
        storage.put("config", b"x".to_vec()).await.unwrap();
        assert!(other.get("config").await.unwrap().is_some());
    }
}
