//! Nanostore storage layer
//!
//! - **types**: configuration, markers, results and stats
//! - **transcoder**: base64 transport encoding
//! - **provider**: compression primitives behind a capability probe
//! - **codec**: value ↔ framed record
//! - **backend**: underlying key-value stores
//! - **engine**: the namespaced, compressing store
//! - **error**: error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   value → JSON → (size >= threshold ? compress : raw) → marker + base64 → store[prefix + key]
//!
//! Read Path:
//!   store[prefix + key] → marker → base64 decode → (decompress) → JSON → value
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use nanostore::storage::{CompressedStore, MemoryStore, StoreOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = CompressedStore::new(MemoryStore::new(), StoreOptions::new().threshold(256));
//!
//!     store.set_item("settings", &vec!["dark", "compact"]).await?;
//!     let settings: Option<Vec<String>> = store.get_item("settings").await?;
//!
//!     println!("{:?} ({})", settings, store.get_stats().await?);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod codec;
pub mod engine;
pub mod error;
pub mod provider;
pub mod transcoder;
pub mod types;

// Re-export commonly used types
pub use backend::{FileStore, KeyValueStore, MemoryStore};
pub use codec::{circular_reference, compress, decompress, is_supported, Codec, EncodePath};
pub use engine::{default_store, CompressedStore};
pub use error::{BackendError, BackendResult, StorageError, StorageResult};
pub use provider::{CompressionProvider, Flate2Provider, NoCompression};
pub use types::{
    Algorithm, CompressionResult, ItemMeta, Marker, ResolvedConfig, StorageStats, StoreOptions,
    DEFAULT_KEY_PREFIX, DEFAULT_THRESHOLD, FORMAT_VERSION,
};
