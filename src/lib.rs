//! # Nanostore
//!
//! A transparent compression layer over a simple string key-value store.
//! Values are serialized to JSON, compressed once they reach a size
//! threshold, framed with a one-character marker and stored as base64
//! text. Reads reverse the process automatically.
//!
//! ## Features
//!
//! - **Self-describing records**: `R` (raw), `G` (gzip) or `D` (deflate) marker + base64
//! - **Threshold-based compression**: small values skip compression entirely
//! - **Graceful fallback**: hosts without compression store everything raw
//! - **Namespacing**: several stores can share one backend under different prefixes
//! - **Statistics**: original vs. stored size, even over undecodable entries
//!
//! ## Modules
//!
//! - [`storage`]: codec, stores and the compressed store itself
//! - [`config`]: TOML/environment configuration for the CLI
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nanostore::storage::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = CompressedStore::new(
//!         MemoryStore::with_quota(5 * 1024 * 1024),
//!         StoreOptions::new().algorithm(Algorithm::Deflate).key_prefix("app:"),
//!     );
//!
//!     let result = store.set_item("notes", &"lorem ipsum ".repeat(200)).await?;
//!     println!("{} → {} bytes", result.original_size, result.compressed_size);
//!
//!     let notes: Option<String> = store.get_item("notes").await?;
//!     println!("Restored {} chars", notes.map(|n| n.len()).unwrap_or(0));
//!
//!     // Process-wide instance with default settings
//!     default_store().set_item("visits", &1).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod storage;

// Re-export top-level types for convenience
pub use storage::{
    default_store, Algorithm, Codec, CompressedStore, CompressionResult, FileStore, ItemMeta,
    KeyValueStore, MemoryStore, StorageError, StorageResult, StorageStats, StoreOptions,
};

pub use config::{Config, ConfigError, LoggingConfig, StoreConfig};
