//! Store configuration with environment variable loading.
//!
//! Environment variables:
//! - `CODEREEL_STORE_PATH`: Base path for all namespaces
//! - `CODEREEL_STORE_READONLY`: Set to "true" for read-only mode
//!
//! Default path: `~/.local/share/codereel`

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;

/// A logical store namespace, scoped to one installation.
///
/// Two namespaces with the same name but different scopes never see each
/// other's keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    pub scope: String,
}

impl Namespace {
    pub fn new(name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: scope.into(),
        }
    }

    /// Namespace for the serialized timeline and settings.
    pub fn project(scope: impl Into<String>) -> Self {
        Self::new("project_data", scope)
    }

    /// Namespace for fetched grammar and theme payloads.
    pub fn assets(scope: impl Into<String>) -> Self {
        Self::new("http_cache", scope)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.name)
    }
}

/// Configuration for a filesystem-backed namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStoreConfig {
    /// Base path shared by all namespaces.
    /// Entries live in `{base_path}/{scope}/{name}/`.
    pub base_path: PathBuf,

    pub namespace: Namespace,

    /// Read-only mode - rejects every write.
    #[serde(default)]
    pub read_only: bool,
}

/// Default base path (~/.local/share/codereel).
fn default_store_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".local/share/codereel"))
        .unwrap_or_else(|| PathBuf::from(".local/share/codereel"))
}

impl FileStoreConfig {
    /// Load base path and read-only flag from the environment.
    pub fn from_env(namespace: Namespace) -> Self {
        let base_path = env::var("CODEREEL_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_store_path());

        let read_only = env::var("CODEREEL_STORE_READONLY")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        Self {
            base_path,
            namespace,
            read_only,
        }
    }

    /// Create a writable config under a specific base path.
    pub fn with_base_path(path: impl Into<PathBuf>, namespace: Namespace) -> Self {
        Self {
            base_path: path.into(),
            namespace,
            read_only: false,
        }
    }

    /// Create a read-only config under a specific base path.
    pub fn read_only(path: impl Into<PathBuf>, namespace: Namespace) -> Self {
        Self {
            base_path: path.into(),
            namespace,
            read_only: true,
        }
    }

    /// Directory holding this namespace's entries.
    pub fn namespace_dir(&self) -> PathBuf {
        self.base_path
            .join(&self.namespace.scope)
            .join(&self.namespace.name)
    }

    /// Directory for in-flight writes, renamed into place once complete.
    pub fn staging_dir(&self) -> PathBuf {
        self.namespace_dir().join(".staging")
    }
}
