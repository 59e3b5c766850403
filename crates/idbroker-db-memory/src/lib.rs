//! In-memory storage backend for the identity broker.
//!
//! This crate provides an in-memory implementation of the `KeyValueStorage`
//! trait from `idbroker-storage`, using papaya lock-free HashMap for concurrent access.
//!
//! # Example
//!
//! ```ignore
//! use idbroker_db_memory::InMemoryStorage;
//! use idbroker_storage::KeyValueStorage;
//!
//! let storage = InMemoryStorage::new();
//! storage.put("role/dev", b"{}".to_vec()).await?;
//! assert_eq!(storage.list("role/").await?, vec!["dev"]);
//! ```

pub mod storage;

// Re-export the storage trait for convenience
pub use idbroker_storage::{DynStorage, KeyValueStorage, StorageError};

pub use storage::InMemoryStorage;

/// Creates a new shareable in-memory storage instance.
pub fn create_storage() -> DynStorage {
    std::sync::Arc::new(InMemoryStorage::new())
}
