//! Memoizing cache for expensive fetched assets.
//!
//! The first successful producer call for a key populates the store; every
//! later lookup for that key is served from the store. A failed producer
//! leaves the key unset so the next call retries.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::store::{KeyValueStore, KeyValueStoreExt};

/// Logical keys used for syntax assets.
pub mod asset_keys {
    /// Key for a TextMate grammar, e.g. `textmate_lang_rust`.
    pub fn grammar(language: &str) -> String {
        format!("textmate_lang_{language}")
    }

    /// Key for a TextMate theme, e.g. `textmate_theme_nord`.
    pub fn theme(theme: &str) -> String {
        format!("textmate_theme_{theme}")
    }
}

/// Write-once, read-many cache over a [`KeyValueStore`].
pub struct AssetCache {
    store: Arc<dyn KeyValueStore>,
    /// Per-key gates so concurrent misses for one key run a single producer.
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AssetCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.store.get_as(key).await
    }

    pub async fn set<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        self.store.set_as(key, value).await
    }

    /// Return the cached value for `key`, or run `producer`, store its result and return it.
    pub async fn with_cache<T, F, Fut>(&self, key: &str, producer: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if let Some(hit) = self.get::<T>(key).await? {
            debug!(cache.key = key, "asset cache hit");
            return Ok(hit);
        }

        let gate = self.gate(key)?;
        let _held = gate.lock().await;

        // Another caller may have filled the key while we waited on the gate
        if let Some(hit) = self.get::<T>(key).await? {
            debug!(cache.key = key, "asset cache filled while waiting");
            self.release_gate(key);
            return Ok(hit);
        }

        info!(cache.key = key, "asset cache miss, invoking producer");
        let value = producer().await.map_err(|source| StoreError::Producer {
            key: key.to_string(),
            source,
        })?;

        self.set(key, &value).await?;
        // Stored keys take the fast path, so the gate is no longer needed
        self.release_gate(key);
        Ok(value)
    }

    fn gate(&self, key: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut gates = self
            .gates
            .lock()
            .map_err(|_| StoreError::Unavailable("asset cache gate poisoned".to_string()))?;
        Ok(Arc::clone(gates.entry(key.to_string()).or_default()))
    }

    fn release_gate(&self, key: &str) {
        if let Ok(mut gates) = self.gates.lock() {
            gates.remove(key);
        }
    }

    #[cfg(test)]
    fn open_gates(&self) -> usize {
        self.gates.lock().map(|g| g.len()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Namespace;
    use crate::store::{FileStore, MemoryStore};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn memory_cache() -> AssetCache {
        AssetCache::new(Arc::new(MemoryStore::new(Namespace::assets("test"))))
    }

    #[test]
    fn test_asset_keys() {
        assert_eq!(asset_keys::grammar("rust"), "textmate_lang_rust");
        assert_eq!(asset_keys::theme("nord"), "textmate_theme_nord");
    }

    #[tokio::test]
    async fn test_producer_runs_once_per_key() -> anyhow::Result<()> {
        let cache = memory_cache();
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        let produce = move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(json!({ "scopeName": "source.x" }))
            } else {
                anyhow::bail!("producer must not run twice")
            }
        };

        let first: Value = cache.with_cache("lang_x", produce).await?;
        let second: Value = cache.with_cache("lang_x", produce).await?;

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_producer_leaves_key_unset() -> anyhow::Result<()> {
        let cache = memory_cache();

        let failed: Result<Value> = cache
            .with_cache("lang_y", || async { anyhow::bail!("network down") })
            .await;
        let err = failed.unwrap_err();
        assert!(matches!(err, StoreError::Producer { .. }));
        assert!(err.to_string().contains("lang_y"));
        assert!(cache.get::<Value>("lang_y").await?.is_none());
        assert_eq!(cache.open_gates(), 1);

        let retried: Value = cache
            .with_cache("lang_y", || async { Ok(json!("grammar")) })
            .await?;
        assert_eq!(retried, json!("grammar"));
        assert_eq!(cache.get::<Value>("lang_y").await?, Some(json!("grammar")));
        assert_eq!(cache.open_gates(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_producer() -> anyhow::Result<()> {
        let cache = Arc::new(memory_cache());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .with_cache::<Value, _, _>("theme_z", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(json!({ "name": "z" }))
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await??, json!({ "name": "z" }));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.open_gates(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_cache_survives_reopen() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        {
            let store = FileStore::at_path(temp.path(), Namespace::assets("home"))?;
            let cache = AssetCache::new(Arc::new(store));
            let _: Value = cache
                .with_cache(&asset_keys::grammar("rust"), || async { Ok(json!(1)) })
                .await?;
        }

        let store = FileStore::at_path(temp.path(), Namespace::assets("home"))?;
        let cache = AssetCache::new(Arc::new(store));
        let value: Value = cache
            .with_cache(&asset_keys::grammar("rust"), || async {
                anyhow::bail!("should be served from disk")
            })
            .await?;
        assert_eq!(value, json!(1));
        Ok(())
    }
}
