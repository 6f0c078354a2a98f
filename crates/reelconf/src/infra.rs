//! Infrastructure configuration - things that cannot change at runtime.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem paths for codereel state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory for persisted project data and the asset cache.
    /// Default: ~/.local/share/codereel
    #[serde(default = "PathsConfig::default_state_dir")]
    pub state_dir: PathBuf,
}

impl PathsConfig {
    fn default_state_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local/share/codereel"))
            .unwrap_or_else(|| PathBuf::from(".local/share/codereel"))
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: Self::default_state_dir(),
        }
    }
}

/// Store namespaces. Every namespace lives under one installation scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Installation-scoped identifier that prefixes every namespace.
    #[serde(default = "StoreConfig::default_scope")]
    pub scope: String,

    /// Namespace holding the serialized timeline and settings.
    #[serde(default = "StoreConfig::default_project_namespace")]
    pub project_namespace: String,

    /// Namespace holding fetched grammar/theme payloads.
    #[serde(default = "StoreConfig::default_asset_namespace")]
    pub asset_namespace: String,
}

impl StoreConfig {
    fn default_scope() -> String {
        "local".to_string()
    }

    fn default_project_namespace() -> String {
        "project_data".to_string()
    }

    fn default_asset_namespace() -> String {
        "http_cache".to_string()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            scope: Self::default_scope(),
            project_namespace: Self::default_project_namespace(),
            asset_namespace: Self::default_asset_namespace(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level or full filter directive (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

/// Infrastructure configuration container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfraConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl InfraConfig {
    /// Directory holding one store namespace for the configured scope.
    pub fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.paths
            .state_dir
            .join(&self.store.scope)
            .join(namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths_under_home() {
        let paths = PathsConfig::default();
        assert!(paths.state_dir.to_string_lossy().contains("codereel"));
    }

    #[test]
    fn test_namespace_dir_includes_scope() {
        let mut infra = InfraConfig::default();
        infra.paths.state_dir = PathBuf::from("/data/reel");
        infra.store.scope = "studio".to_string();

        assert_eq!(
            infra.namespace_dir("project_data"),
            PathBuf::from("/data/reel/studio/project_data")
        );
    }
}
