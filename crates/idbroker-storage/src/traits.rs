//! Storage traits for the key-value storage abstraction layer.
//!
//! This module defines the trait that all storage backends must implement.

use async_trait::async_trait;

use crate::error::StorageError;

/// The storage trait the identity broker reads and writes its state through.
///
/// Keys are slash-separated paths (`config`, `role/dev`). Values are opaque
/// bytes; callers decide the encoding. Implementations must be thread-safe
/// (`Send + Sync`) and impose their own consistency guarantees: the broker
/// performs plain read-then-use and never holds a lock across calls.
///
/// # Example
///
/// ```ignore
/// use idbroker_storage::{KeyValueStorage, StorageError};
///
/// async fn role_names(storage: &dyn KeyValueStorage) -> Result<Vec<String>, StorageError> {
///     storage.list("role/").await
/// }
/// ```
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// Returns `None` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing keys.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidKey` for an empty key.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

    /// Removes `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Lists the keys starting with `prefix`, with the prefix stripped,
    /// in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
