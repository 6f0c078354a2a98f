//! Config file discovery, merging, and environment variable overlay.

use crate::{ConfigError, ReelConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Provenance of a loaded config, for `config show`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSources {
    /// Files merged, earliest first.
    pub files: Vec<PathBuf>,
    /// Names of the environment variables that were applied.
    pub env_overrides: Vec<String>,
}

/// Existing config files in the default locations, in merge order.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Existing config files in merge order: system, user, then local.
///
/// An existing `cli_path` takes the place of `./codereel.toml`.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let user = directories::BaseDirs::new().map(|dirs| dirs.config_dir().join("codereel/config.toml"));
    let local = match cli_path {
        Some(path) if path.exists() => path.to_path_buf(),
        _ => PathBuf::from("codereel.toml"),
    };

    [Some(PathBuf::from("/etc/codereel/config.toml")), user, Some(local)]
        .into_iter()
        .flatten()
        .filter(|path| path.exists())
        .collect()
}

/// Read a TOML file as a raw table.
pub fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_table(&contents, path)
}

fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    contents
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Deep-merge `overlay` into `base`. Nested tables merge key by key; any other value replaces.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Deserialize a merged table, expanding `~` and `$VAR` in the state directory.
pub fn table_to_config(
    table: toml::Table,
    origin: Option<&PathBuf>,
) -> Result<ReelConfig, ConfigError> {
    let origin = origin
        .cloned()
        .unwrap_or_else(|| PathBuf::from("<merged>"));

    let mut config: ReelConfig =
        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                path: origin,
                message: e.to_string(),
            })?;

    let raw = config.infra.paths.state_dir.to_string_lossy().into_owned();
    config.infra.paths.state_dir = expand_path(&raw);

    Ok(config)
}

/// Overlay `CODEREEL_*` variables (and `RUST_LOG`) onto a loaded config.
pub fn apply_env_overrides(config: &mut ReelConfig, sources: &mut ConfigSources) {
    let mut var = |name: &str| {
        let value = env::var(name).ok()?;
        sources.env_overrides.push(name.to_string());
        Some(value)
    };

    if let Some(v) = var("CODEREEL_STATE_DIR") {
        config.infra.paths.state_dir = expand_path(&v);
    }
    if let Some(v) = var("CODEREEL_SCOPE") {
        config.infra.store.scope = v;
    }
    if let Some(v) = var("CODEREEL_LANGUAGE") {
        config.bootstrap.editor.language = v;
    }
    if let Some(v) = var("CODEREEL_THEME") {
        config.bootstrap.editor.theme = v;
    }
    if let Some(ms) = var("CODEREEL_SLIDE_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        config.bootstrap.playback.slide_interval_ms = ms;
    }
    if let Some(ms) = var("CODEREEL_AUTOSAVE_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        config.bootstrap.autosave.interval_ms = ms;
    }
    if let Some(v) = var("CODEREEL_LOG_LEVEL") {
        config.infra.telemetry.log_level = v;
    }
    // Checked last so it wins
    if let Some(v) = var("RUST_LOG") {
        config.infra.telemetry.log_level = v;
    }
}

/// Resolve a leading `~/` or `$VAR` in `path`. Unresolvable paths come back unchanged.
pub fn expand_path(path: &str) -> PathBuf {
    let expanded = if let Some(rest) = path.strip_prefix("~/") {
        directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(rest))
    } else if let Some(rest) = path.strip_prefix('$') {
        let (name, tail) = rest.split_once('/').unwrap_or((rest, ""));
        env::var(name).ok().map(|root| {
            let root = PathBuf::from(root);
            if tail.is_empty() {
                root
            } else {
                root.join(tail)
            }
        })
    } else {
        None
    };

    expanded.unwrap_or_else(|| PathBuf::from(path))
}
