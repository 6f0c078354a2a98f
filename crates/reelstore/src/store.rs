//! Key-value stores: the trait, a filesystem backend, and an in-memory backend.
//!
//! FileStore layout:
//! ```text
//! {base_path}/{scope}/{name}/
//! ├── .staging/            # in-flight writes
//! ├── 3f/
//! │   └── a9c1...json      # {"key": "order", "value": [...]}
//! └── 7b/
//!     └── 04de...json
//! ```

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, warn};

use crate::config::{FileStoreConfig, Namespace};
use crate::digest::KeyDigest;
use crate::entry::StoredEntry;
use crate::error::{Result, StoreError};
use crate::staging::write_atomic;

/// Trait for key-value storage backends.
///
/// Every store is bound to exactly one [`Namespace`].
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// The namespace this store reads and writes.
    fn namespace(&self) -> &Namespace;

    /// Fetch the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key was never written or was removed.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Remove `key`. Returns whether anything was removed.
    async fn remove(&self, key: &str) -> Result<bool>;

    /// All logical keys currently stored, sorted.
    async fn keys(&self) -> Result<Vec<String>>;
}

/// Typed access on top of any [`KeyValueStore`].
#[async_trait]
pub trait KeyValueStoreExt: KeyValueStore {
    /// Fetch and deserialize a value.
    async fn get_as<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StoreError::Corrupt {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Serialize and store a value.
    async fn set_as<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(value).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.set(key, value).await
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}

/// Filesystem-backed store, one JSON document per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    config: FileStoreConfig,
}

impl FileStore {
    /// Create a new FileStore with the given configuration.
    ///
    /// Creates the namespace directory if it doesn't exist (unless read-only).
    pub fn new(config: FileStoreConfig) -> Result<Self> {
        if !config.read_only {
            let dir = config.namespace_dir();
            std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }

        Ok(Self { config })
    }

    /// Create a writable FileStore under a specific base path.
    pub fn at_path(path: impl Into<PathBuf>, namespace: Namespace) -> Result<Self> {
        Self::new(FileStoreConfig::with_base_path(path, namespace))
    }

    /// Create a read-only FileStore under a specific base path.
    pub fn read_only_at(path: impl Into<PathBuf>, namespace: Namespace) -> Result<Self> {
        Self::new(FileStoreConfig::read_only(path, namespace))
    }

    pub fn config(&self) -> &FileStoreConfig {
        &self.config
    }

    /// Path where the document for `key` is stored.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        let digest = KeyDigest::of(key);
        self.config
            .namespace_dir()
            .join(digest.prefix())
            .join(format!("{}.json", digest.remainder()))
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.config.read_only {
            return Err(StoreError::ReadOnly {
                namespace: self.config.namespace.to_string(),
            });
        }
        Ok(())
    }

    async fn read_entry(&self, path: &PathBuf) -> Result<Option<StoredEntry>> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: path.display().to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    fn namespace(&self) -> &Namespace {
        &self.config.namespace
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.entry_path(key);

        match self.read_entry(&path).await? {
            Some(entry) if entry.key == key => Ok(Some(entry.value)),
            Some(entry) => Err(StoreError::Corrupt {
                key: key.to_string(),
                message: format!("document holds key {:?}", entry.key),
            }),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.ensure_writable()?;

        let entry = StoredEntry::new(key, value);
        let data = serde_json::to_vec(&entry).map_err(|source| StoreError::Serialize {
            key: key.to_string(),
            source,
        })?;

        let path = self.entry_path(key);
        write_atomic(&self.config.staging_dir(), &path, &data).await?;

        debug!(
            store.namespace = %self.config.namespace,
            store.key = key,
            store.bytes = data.len(),
            "stored entry"
        );

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        self.ensure_writable()?;

        let path = self.entry_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let root = self.config.namespace_dir();
        let mut keys = Vec::new();

        let mut shards = match fs::read_dir(&root).await {
            Ok(shards) => shards,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(StoreError::io(root, e)),
        };

        while let Some(shard) = shards
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&root, e))?
        {
            let shard_path = shard.path();
            let is_shard = shard_path.is_dir()
                && shard
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.len() == 2 && !name.starts_with('.'));
            if !is_shard {
                continue;
            }

            let mut files = fs::read_dir(&shard_path)
                .await
                .map_err(|e| StoreError::io(&shard_path, e))?;

            while let Some(file) = files
                .next_entry()
                .await
                .map_err(|e| StoreError::io(&shard_path, e))?
            {
                let path = file.path();
                match self.read_entry(&path).await {
                    Ok(Some(entry)) => keys.push(entry.key),
                    Ok(None) => {}
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable entry"),
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// In-process store. Nothing survives the process.
#[derive(Debug)]
pub struct MemoryStore {
    namespace: Namespace,
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned(&self) -> StoreError {
        StoreError::Unavailable(format!("memory store {} lock poisoned", self.namespace))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self.entries.read().map_err(|_| self.poisoned())?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| self.poisoned())?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.write().map_err(|_| self.poisoned())?;
        Ok(entries.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(|_| self.poisoned())?;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
