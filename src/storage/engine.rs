//! Compressed key-value store
//!
//! Wraps a [`KeyValueStore`] behind a private key namespace:
//! - Write path: value → Codec (JSON → compress? → frame) → `prefix + key`
//! - Read path: `prefix + key` → framed record → Codec → value
//!
//! Keys outside the prefix are never read, listed or removed. Enumerating
//! managed keys scans every key in the underlying store, so `clear`,
//! `keys`, `length` and `get_stats` cost time proportional to the whole
//! store.
//!
//! Batch operations run strictly one key at a time and are not atomic:
//! the first failure aborts the batch and earlier keys stay applied.

use crate::storage::backend::{KeyValueStore, MemoryStore};
use crate::storage::codec::Codec;
use crate::storage::error::{BackendError, StorageError, StorageResult};
use crate::storage::transcoder;
use crate::storage::types::{CompressionResult, ItemMeta, ResolvedConfig, StorageStats, StoreOptions};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;

/// Namespaced, compressing view over a key-value store
pub struct CompressedStore<S: KeyValueStore = MemoryStore> {
    /// Underlying store, possibly shared with other namespaces
    store: S,
    /// Immutable configuration
    config: ResolvedConfig,
    /// Record encoder/decoder
    codec: Codec,
    /// Metadata for items written through this instance
    meta: RwLock<HashMap<String, ItemMeta>>,
}

impl<S: KeyValueStore> CompressedStore<S> {
    /// Create a store with flate2 compression
    pub fn new(store: S, options: StoreOptions) -> Self {
        Self::with_codec(store, options, Codec::new())
    }

    /// Create a store with an explicit codec (e.g. one without compression support)
    pub fn with_codec(store: S, options: StoreOptions, codec: Codec) -> Self {
        Self {
            store,
            config: options.resolve(),
            codec,
            meta: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// The wrapped store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether values above the threshold will actually be compressed
    pub fn is_supported(&self) -> bool {
        self.codec.is_supported()
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    /// Managed keys with the prefix stripped, found by scanning the whole store
    fn managed_keys(&self) -> StorageResult<Vec<String>> {
        let prefix = self.config.key_prefix.as_str();
        Ok(self
            .store
            .keys()?
            .into_iter()
            .filter_map(|key| key.strip_prefix(prefix).map(str::to_string))
            .collect())
    }

    /// Encode and store a value
    pub async fn set_item<T>(&self, key: &str, value: &T) -> StorageResult<CompressionResult>
    where
        T: Serialize + ?Sized,
    {
        let result = self.codec.compress(value, &self.config)?;

        match self.store.set(&self.namespaced(key), &result.data) {
            Ok(()) => {}
            Err(BackendError::QuotaExceeded { .. }) => {
                tracing::debug!(key, size = result.compressed_size, "Store refused write: full");
                return Err(StorageError::StorageFull {
                    attempted_size: result.compressed_size,
                });
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(
            key,
            original_size = result.original_size,
            compressed_size = result.compressed_size,
            compressed = result.was_compressed,
            "Stored item"
        );

        self.meta
            .write()
            .await
            .insert(key.to_string(), ItemMeta::new(result.original_size));

        Ok(result)
    }

    /// Read and decode a value; `None` if the key is absent
    pub async fn get_item<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.store.get(&self.namespaced(key))? {
            Some(data) => Ok(Some(self.codec.decompress(&data)?)),
            None => Ok(None),
        }
    }

    pub async fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.store.remove(&self.namespaced(key))?;
        self.meta.write().await.remove(key);
        Ok(())
    }

    pub async fn has_item(&self, key: &str) -> StorageResult<bool> {
        Ok(self.store.get(&self.namespaced(key))?.is_some())
    }

    /// Remove every managed key; other keys in the store are untouched
    pub async fn clear(&self) -> StorageResult<()> {
        let keys = self.managed_keys()?;
        for key in &keys {
            self.store.remove(&self.namespaced(key))?;
        }

        self.meta.write().await.clear();
        tracing::debug!(prefix = %self.config.key_prefix, count = keys.len(), "Cleared namespace");
        Ok(())
    }

    /// Managed keys with the prefix stripped
    pub async fn keys(&self) -> StorageResult<Vec<String>> {
        self.managed_keys()
    }

    /// Number of managed keys
    pub async fn length(&self) -> StorageResult<usize> {
        Ok(self.managed_keys()?.len())
    }

    /// Metadata recorded when `key` was last written through this instance
    pub async fn item_meta(&self, key: &str) -> Option<ItemMeta> {
        self.meta.read().await.get(key).cloned()
    }

    /// Aggregate stored vs. original size over the namespace
    ///
    /// Entries that cannot be decoded count their stored size as their
    /// original size, so the report stays computable over foreign or
    /// corrupted records.
    pub async fn get_stats(&self) -> StorageResult<StorageStats> {
        let keys = self.managed_keys()?;
        let mut compressed_size = 0;
        let mut original_size = 0;

        for key in &keys {
            let Some(data) = self.store.get(&self.namespaced(key))? else {
                continue;
            };

            let stored = transcoder::byte_length(&data);
            compressed_size += stored;

            match self.codec.decode_json(&data) {
                Ok(json) => original_size += transcoder::byte_length(&json),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Undecodable entry, estimating original size");
                    original_size += stored;
                }
            }
        }

        Ok(StorageStats::new(keys.len(), compressed_size, original_size))
    }

    /// Visit every managed entry in turn
    ///
    /// The callback is awaited before the next key is read. A decode
    /// failure stops iteration and is returned; keys removed while
    /// iterating are skipped.
    pub async fn for_each<T, F, Fut>(&self, mut callback: F) -> StorageResult<()>
    where
        T: DeserializeOwned,
        F: FnMut(T, String) -> Fut,
        Fut: Future<Output = ()>,
    {
        for key in self.managed_keys()? {
            if let Some(value) = self.get_item::<T>(&key).await? {
                callback(value, key).await;
            }
        }
        Ok(())
    }

    /// Read several keys in order, `None` for absent ones
    pub async fn get_items<T, I, K>(&self, keys: I) -> StorageResult<Vec<(String, Option<T>)>>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut items = Vec::new();
        for key in keys {
            let key = key.as_ref();
            let value = self.get_item(key).await?;
            items.push((key.to_string(), value));
        }
        Ok(items)
    }

    /// Write several values in order; stops at the first failure
    pub async fn set_items<T, I, K>(&self, items: I) -> StorageResult<()>
    where
        T: Serialize,
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
    {
        let mut written = 0usize;
        for (key, value) in items {
            self.set_item(key.as_ref(), &value).await?;
            written += 1;
        }
        tracing::debug!(count = written, "Stored batch");
        Ok(())
    }
}

static DEFAULT_STORE: OnceLock<CompressedStore<Arc<MemoryStore>>> = OnceLock::new();

/// Process-wide store with default configuration over a shared in-memory map
///
/// Created on first use. Construct a [`CompressedStore`] directly for any
/// other configuration.
pub fn default_store() -> &'static CompressedStore<Arc<MemoryStore>> {
    DEFAULT_STORE.get_or_init(|| {
        tracing::info!("Initializing default compressed store");
        CompressedStore::new(Arc::new(MemoryStore::new()), StoreOptions::default())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::provider::NoCompression;
    use crate::storage::types::Algorithm;
    use serde::Deserialize;
    use serde_json::{json, Value};

    fn shared() -> (Arc<MemoryStore>, CompressedStore<Arc<MemoryStore>>) {
        let backend = Arc::new(MemoryStore::new());
        let store = CompressedStore::new(backend.clone(), StoreOptions::default());
        (backend, store)
    }

    fn big_text() -> String {
        "lorem ipsum dolor sit amet ".repeat(100)
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        tags: Vec<String>,
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let (backend, store) = shared();

        let profile = Profile {
            name: "ada".to_string(),
            tags: vec!["admin".to_string()],
        };
        let result = store.set_item("user", &profile).await.unwrap();
        assert!(!result.was_compressed);

        let restored: Option<Profile> = store.get_item("user").await.unwrap();
        assert_eq!(restored, Some(profile));

        // stored under the namespaced key
        let raw = backend.get("ns:user").unwrap().unwrap();
        assert!(raw.starts_with('R'));
        assert_eq!(backend.get("user").unwrap(), None);
    }

    #[tokio::test]
    async fn test_large_value_compressed() {
        let (backend, store) = shared();
        let text = big_text();

        let result = store.set_item("doc", &text).await.unwrap();
        assert!(result.was_compressed);
        assert!(result.compressed_size < result.original_size);
        assert!(backend.get("ns:doc").unwrap().unwrap().starts_with('G'));

        let restored: Option<String> = store.get_item("doc").await.unwrap();
        assert_eq!(restored, Some(text));
    }

    #[tokio::test]
    async fn test_deflate_configuration() {
        let backend = Arc::new(MemoryStore::new());
        let store = CompressedStore::new(
            backend.clone(),
            StoreOptions::new().algorithm(Algorithm::Deflate).threshold(0),
        );

        store.set_item("n", &1).await.unwrap();
        assert!(backend.get("ns:n").unwrap().unwrap().starts_with('D'));
        assert_eq!(store.get_item::<i32>("n").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let (_, store) = shared();
        assert_eq!(store.get_item::<Value>("nope").await.unwrap(), None);
        assert!(!store.has_item("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_stored_null_is_a_value() {
        let (_, store) = shared();
        store.set_item("empty", &Value::Null).await.unwrap();
        assert!(store.has_item("empty").await.unwrap());
        assert_eq!(store.get_item::<Value>("empty").await.unwrap(), Some(Value::Null));
    }

    #[tokio::test]
    async fn test_remove_and_has() {
        let (_, store) = shared();
        store.set_item("a", &1).await.unwrap();
        assert!(store.has_item("a").await.unwrap());

        store.remove_item("a").await.unwrap();
        assert!(!store.has_item("a").await.unwrap());
        assert!(store.item_meta("a").await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_propagates_decode_error() {
        let (backend, store) = shared();
        backend.set("ns:bad", "Zgarbage").unwrap();

        let err = store.get_item::<Value>("bad").await.unwrap_err();
        assert!(err.is_decode());
    }

    #[tokio::test]
    async fn test_namespace_isolation() {
        let backend = Arc::new(MemoryStore::new());
        backend.set("theme", "dark").unwrap();
        backend.set("other:a", "x").unwrap();

        let store = CompressedStore::new(backend.clone(), StoreOptions::new().key_prefix("app:"));
        store.set_item("a", &1).await.unwrap();
        store.set_item("b", &2).await.unwrap();

        let mut keys = store.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(store.length().await.unwrap(), 2);

        store.clear().await.unwrap();
        assert_eq!(store.length().await.unwrap(), 0);
        assert_eq!(backend.get("theme").unwrap(), Some("dark".to_string()));
        assert_eq!(backend.get("other:a").unwrap(), Some("x".to_string()));
        assert_eq!(backend.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_two_namespaces_share_a_store() {
        let backend = Arc::new(MemoryStore::new());
        let left = CompressedStore::new(backend.clone(), StoreOptions::new().key_prefix("l:"));
        let right = CompressedStore::new(backend.clone(), StoreOptions::new().key_prefix("r:"));

        left.set_item("k", "left").await.unwrap();
        right.set_item("k", "right").await.unwrap();

        assert_eq!(left.get_item::<String>("k").await.unwrap().as_deref(), Some("left"));
        left.clear().await.unwrap();
        assert_eq!(right.get_item::<String>("k").await.unwrap().as_deref(), Some("right"));
    }

    #[tokio::test]
    async fn test_storage_full_carries_attempted_size() {
        let store = CompressedStore::new(MemoryStore::with_quota(64), StoreOptions::default());

        let err = store.set_item("big", &"x".repeat(200)).await.unwrap_err();
        match err {
            StorageError::StorageFull { attempted_size } => {
                let expected = Codec::new()
                    .compress(&"x".repeat(200), store.config())
                    .unwrap()
                    .compressed_size;
                assert_eq!(attempted_size, expected);
            }
            other => panic!("expected StorageFull, got {}", other),
        }
        assert!(!store.has_item("big").await.unwrap());
    }

    #[tokio::test]
    async fn test_other_backend_errors_pass_through() {
        struct Broken;

        impl KeyValueStore for Broken {
            fn get(&self, _key: &str) -> Result<Option<String>, BackendError> {
                Ok(None)
            }
            fn set(&self, _key: &str, _value: &str) -> Result<(), BackendError> {
                Err(BackendError::Lock("poisoned".to_string()))
            }
            fn remove(&self, _key: &str) -> Result<(), BackendError> {
                Ok(())
            }
            fn keys(&self) -> Result<Vec<String>, BackendError> {
                Ok(Vec::new())
            }
            fn len(&self) -> Result<usize, BackendError> {
                Ok(0)
            }
        }

        let store = CompressedStore::new(Broken, StoreOptions::default());
        let err = store.set_item("a", &1).await.unwrap_err();
        assert!(matches!(err, StorageError::Backend(BackendError::Lock(_))));
    }

    #[tokio::test]
    async fn test_stats_empty_namespace() {
        let backend = Arc::new(MemoryStore::new());
        backend.set("unrelated", "value").unwrap();
        let store = CompressedStore::new(backend, StoreOptions::default());

        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats, StorageStats::new(0, 0, 0));
        assert_eq!(stats.compression_ratio, 1.0);
    }

    #[tokio::test]
    async fn test_stats_sum_sizes() {
        let (_, store) = shared();
        let small = store.set_item("small", &json!({"a": 1})).await.unwrap();
        let large = store.set_item("large", &big_text()).await.unwrap();

        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.total_items, 2);
        assert_eq!(stats.compressed_size, small.compressed_size + large.compressed_size);
        assert_eq!(stats.original_size, small.original_size + large.original_size);
        assert!(stats.compression_ratio < 1.0);
    }

    #[tokio::test]
    async fn test_stats_fall_back_for_undecodable_entries() {
        let (backend, store) = shared();
        let good = store.set_item("good", &json!([1, 2, 3])).await.unwrap();
        backend.set("ns:foreign", "plain text").unwrap();
        backend.set("ns:corrupt", "G!!!!").unwrap();

        let stats = store.get_stats().await.unwrap();
        let foreign = "plain text".len();
        let corrupt = "G!!!!".len();

        assert_eq!(stats.total_items, 3);
        assert_eq!(stats.compressed_size, good.compressed_size + foreign + corrupt);
        assert_eq!(stats.original_size, good.original_size + foreign + corrupt);
    }

    #[tokio::test]
    async fn test_for_each_visits_sequentially() {
        let (_, store) = shared();
        store.set_items([("a", 1), ("b", 2), ("c", 3)]).await.unwrap();

        let mut seen = Vec::new();
        store
            .for_each(|value: i32, key| {
                seen.push((key, value));
                async {
                    tokio::task::yield_now().await;
                }
            })
            .await
            .unwrap();

        seen.sort();
        assert_eq!(
            seen,
            vec![("a".to_string(), 1), ("b".to_string(), 2), ("c".to_string(), 3)]
        );
    }

    #[tokio::test]
    async fn test_for_each_stops_on_decode_error() {
        let (backend, store) = shared();
        store.set_item("a", &1).await.unwrap();
        backend.set("ns:b", "Xbroken").unwrap();
        store.set_item("c", &3).await.unwrap();

        let mut visited = Vec::new();
        let err = store
            .for_each(|value: i32, key| {
                visited.push((key, value));
                async {}
            })
            .await
            .unwrap_err();

        assert!(err.is_decode());
        // keys enumerate in sorted order: a visited, b fails, c never reached
        assert_eq!(visited, vec![("a".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_get_items_in_input_order() {
        let (_, store) = shared();
        store.set_items(vec![("x", "1"), ("y", "2")]).await.unwrap();

        let items: Vec<(String, Option<String>)> =
            store.get_items(["y", "missing", "x"]).await.unwrap();
        assert_eq!(
            items,
            vec![
                ("y".to_string(), Some("2".to_string())),
                ("missing".to_string(), None),
                ("x".to_string(), Some("1".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_set_items_not_atomic() {
        // quota fits two small records but not the third, large one
        let backend = Arc::new(MemoryStore::with_quota(60));
        let store = CompressedStore::new(backend.clone(), StoreOptions::new().threshold(usize::MAX));

        let big = "z".repeat(100);
        let err = store
            .set_items(vec![("k1", "a"), ("k2", "b"), ("k3", big.as_str()), ("k4", "d")])
            .await
            .unwrap_err();

        let expected = Codec::new().compress(&big, store.config()).unwrap().compressed_size;
        assert!(matches!(
            err,
            StorageError::StorageFull { attempted_size } if attempted_size == expected
        ));

        assert!(store.has_item("k1").await.unwrap());
        assert!(store.has_item("k2").await.unwrap());
        assert!(!store.has_item("k3").await.unwrap());
        assert!(!store.has_item("k4").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_items_aborts_on_decode_error() {
        let (backend, store) = shared();
        backend.set("ns:bad", "R%%").unwrap();
        let err = store.get_items::<Value, _, _>(["bad"]).await.unwrap_err();
        assert!(err.is_decode());
    }

    #[tokio::test]
    async fn test_item_meta_tracks_original_size() {
        let (_, store) = shared();
        let result = store.set_item("doc", &big_text()).await.unwrap();

        let meta = store.item_meta("doc").await.unwrap();
        assert_eq!(meta.original_size, result.original_size);
        assert_eq!(meta.version, crate::storage::types::FORMAT_VERSION);

        store.clear().await.unwrap();
        assert!(store.item_meta("doc").await.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_host_stores_raw() {
        let backend = Arc::new(MemoryStore::new());
        let store = CompressedStore::with_codec(
            backend.clone(),
            StoreOptions::new().threshold(0),
            Codec::with_provider(Arc::new(NoCompression)),
        );
        assert!(!store.is_supported());

        let result = store.set_item("doc", &big_text()).await.unwrap();
        assert!(!result.was_compressed);
        assert!(backend.get("ns:doc").unwrap().unwrap().starts_with('R'));
        assert_eq!(store.get_item::<String>("doc").await.unwrap(), Some(big_text()));
    }

    #[tokio::test]
    async fn test_default_store_is_shared() {
        let first = default_store();
        let second = default_store();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.config(), &ResolvedConfig::default());

        first.set_item("default-store-test", &true).await.unwrap();
        assert_eq!(second.get_item::<bool>("default-store-test").await.unwrap(), Some(true));
        second.remove_item("default-store-test").await.unwrap();
    }
}
