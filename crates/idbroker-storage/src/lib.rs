//! # idbroker-storage
//!
//! Storage abstraction layer for the identity broker.
//!
//! This crate defines the trait and types that all storage backends must implement.
//! It does not contain any implementations - those are provided by separate crates.
//!
//! ## Overview
//!
//! The main trait is [`KeyValueStorage`], a plain key-value contract:
//! - `get` / `put` / `delete` by key
//! - `list` by prefix
//!
//! Values are opaque bytes. [`StorageEntry`] and [`get_json`] cover the common
//! case of JSON-encoded records.
//!
//! ## Example
//!
//! ```ignore
//! use idbroker_storage::{KeyValueStorage, StorageEntry, get_json};
//!
//! async fn roundtrip(storage: &dyn KeyValueStorage, role: &Role) -> StorageResult<Option<Role>> {
//!     StorageEntry::json("role/dev", role)?.put_into(storage).await?;
//!     get_json(storage, "role/dev").await
//! }
//! ```

mod entry;
mod error;
mod traits;

pub use entry::{StorageEntry, decode_json, get_json};
pub use error::{ErrorCategory, StorageError};
pub use traits::KeyValueStorage;

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared storage trait object.
pub type DynStorage = std::sync::Arc<dyn KeyValueStorage>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use idbroker_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::entry::{StorageEntry, decode_json, get_json};
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::traits::KeyValueStorage;
    pub use crate::{DynStorage, StorageResult};
}
