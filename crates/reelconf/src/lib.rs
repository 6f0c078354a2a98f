//! Layered configuration loading for codereel.
//!
//! Settings fall in two groups:
//!
//! - [`InfraConfig`] is fixed for the life of the process: where state lives,
//!   which store namespaces to use and how verbose logging is.
//! - [`BootstrapConfig`] only provides starting values (language, theme,
//!   timing). Once a session is up, its settings container owns them.
//!
//! ```rust,no_run
//! use reelconf::ReelConfig;
//!
//! # fn main() -> Result<(), reelconf::ConfigError> {
//! let config = ReelConfig::load()?;
//! println!("state dir: {}", config.infra.paths.state_dir.display());
//! println!("interval: {:?}", config.bootstrap.playback.slide_interval());
//! # Ok(())
//! # }
//! ```
//!
//! Sources are merged in this order, each overriding the one before:
//! compiled defaults, `/etc/codereel/config.toml`,
//! `~/.config/codereel/config.toml`, `./codereel.toml` (or the file given on
//! the command line), then `CODEREEL_*` environment variables.
//!
//! ```toml
//! [paths]
//! state_dir = "~/.local/share/codereel"
//!
//! [store]
//! scope = "workstation"
//!
//! [editor]
//! language = "rust"
//! theme = "nord"
//!
//! [playback]
//! slide_interval_ms = 1500
//! step_timeout_ms = 5000
//! ```

pub mod bootstrap;
pub mod infra;
pub mod loader;

pub use bootstrap::{
    AnimationConfig, AutosaveConfig, BootstrapConfig, CaptureConfig, EditorConfig, PlaybackConfig,
};
pub use infra::{InfraConfig, PathsConfig, StoreConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config in {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Both config groups, flattened into one TOML document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReelConfig {
    #[serde(flatten)]
    pub infra: InfraConfig,

    #[serde(flatten)]
    pub bootstrap: BootstrapConfig,
}

impl ReelConfig {
    /// Merge every discovered source. See the crate docs for the order.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Like [`ReelConfig::load`], with `path` standing in for `./codereel.toml`.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_sources_from(path).map(|(config, _)| config)
    }

    /// Load and report which files and variables contributed.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path) {
            let table = loader::read_table(&path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let mut config = loader::table_to_config(merged, sources.files.last())?;
        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Render the effective config as TOML.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        let body = toml::to_string_pretty(self)?;
        Ok(format!("# codereel configuration\n\n{body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReelConfig::default();
        assert_eq!(config.bootstrap.editor.language, "typescript");
        assert_eq!(config.bootstrap.playback.slide_interval_ms, 2000);
        assert_eq!(config.bootstrap.autosave.interval_ms, 5000);
        assert_eq!(config.infra.store.project_namespace, "project_data");
    }

    #[test]
    fn test_to_toml_round_trips() {
        let config = ReelConfig::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("[paths]"));
        assert!(text.contains("[playback]"));
        assert!(text.contains("[capture]"));

        let restored: ReelConfig = toml::from_str(&text).unwrap();
        assert_eq!(restored, config);
    }
}
