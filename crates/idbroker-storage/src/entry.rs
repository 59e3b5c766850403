//! JSON-encoded storage entries.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StorageError;
use crate::traits::KeyValueStorage;

/// A key together with its encoded value, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    /// Storage key.
    pub key: String,
    /// Encoded value.
    pub value: Vec<u8>,
}

impl StorageEntry {
    /// Encodes `value` as JSON under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if `value` cannot be encoded.
    pub fn json<T: Serialize>(key: impl Into<String>, value: &T) -> Result<Self, StorageError> {
        let key = key.into();
        let value = serde_json::to_vec(value)
            .map_err(|e| StorageError::serialization(&key, e.to_string()))?;
        Ok(Self { key, value })
    }

    /// Decodes the entry's value as JSON.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the bytes are not valid JSON for `T`.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, StorageError> {
        decode_json(&self.key, &self.value)
    }

    /// Writes this entry to `storage`.
    ///
    /// # Errors
    ///
    /// Propagates the backend error.
    pub async fn put_into(self, storage: &dyn KeyValueStorage) -> Result<(), StorageError> {
        storage.put(&self.key, self.value).await
    }
}

/// Decodes JSON bytes read from `key`.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the bytes are not valid JSON for `T`.
pub fn decode_json<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::serialization(key, e.to_string()))
}

/// Reads and decodes the JSON value stored under `key`.
///
/// # Errors
///
/// Propagates backend errors and returns `StorageError::Serialization` for
/// undecodable values.
pub async fn get_json<T: DeserializeOwned>(
    storage: &dyn KeyValueStorage,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match storage.get(key).await? {
        Some(bytes) => decode_json(key, &bytes).map(Some),
        None => Ok(None),
    }
}
