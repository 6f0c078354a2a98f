//! Namespaced durable key-value storage for codereel.
//!
//! Two consumers share this crate:
//! - the **project store**, holding the serialized slide timeline and settings
//! - the **asset cache**, memoizing fetched grammar and theme definitions
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reelstore::{AssetCache, FileStore, KeyValueStore, KeyValueStoreExt, Namespace};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let project = FileStore::at_path("/tmp/codereel", Namespace::project("local"))?;
//! project.set_as("order", &vec!["a1", "b2"]).await?;
//! let order: Option<Vec<String>> = project.get_as("order").await?;
//!
//! let assets = AssetCache::new(Arc::new(FileStore::at_path(
//!     "/tmp/codereel",
//!     Namespace::assets("local"),
//! )?));
//! let grammar: serde_json::Value = assets
//!     .with_cache("textmate_lang_rust", || async { Ok(serde_json::json!({})) })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! Environment variables (see [`FileStoreConfig::from_env`]):
//! - `CODEREEL_STORE_PATH`: Base path for all namespaces
//! - `CODEREEL_STORE_READONLY`: Set to "true" for read-only mode

pub mod cache;
pub mod config;
pub mod digest;
pub mod entry;
pub mod error;
pub mod staging;
pub mod store;

pub use cache::{asset_keys, AssetCache};
pub use config::{FileStoreConfig, Namespace};
pub use digest::{DigestError, KeyDigest};
pub use entry::StoredEntry;
pub use error::{Result, StoreError};
pub use store::{FileStore, KeyValueStore, KeyValueStoreExt, MemoryStore};
