//! Runtime editor settings.
//!
//! Seeded from [`reelconf::BootstrapConfig`], then owned by the running
//! session. Persisted in the project namespace under [`SETTINGS_KEY`].

use std::sync::Arc;
use std::time::Duration;

use reelconf::{AnimationConfig, BootstrapConfig};
use reelstore::{KeyValueStore, KeyValueStoreExt, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

pub const SETTINGS_KEY: &str = "settings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsState {
    pub language: String,
    pub theme: String,
    pub slide_interval_ms: u64,
    pub animation: AnimationConfig,
}

impl SettingsState {
    pub fn from_bootstrap(config: &BootstrapConfig) -> Self {
        Self {
            language: config.editor.language.clone(),
            theme: config.editor.theme.clone(),
            slide_interval_ms: config.playback.slide_interval_ms,
            animation: config.animation.clone(),
        }
    }

    pub fn slide_interval(&self) -> Duration {
        Duration::from_millis(self.slide_interval_ms)
    }
}

impl Default for SettingsState {
    fn default() -> Self {
        Self::from_bootstrap(&BootstrapConfig::default())
    }
}

/// Cloneable, observable settings container.
#[derive(Debug, Clone)]
pub struct Settings {
    tx: Arc<watch::Sender<SettingsState>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(SettingsState::default())
    }
}

impl Settings {
    pub fn new(initial: SettingsState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn from_bootstrap(config: &BootstrapConfig) -> Self {
        Self::new(SettingsState::from_bootstrap(config))
    }

    pub fn snapshot(&self) -> SettingsState {
        self.tx.borrow().clone()
    }

    pub fn language(&self) -> String {
        self.tx.borrow().language.clone()
    }

    pub fn theme(&self) -> String {
        self.tx.borrow().theme.clone()
    }

    pub fn slide_interval(&self) -> Duration {
        self.tx.borrow().slide_interval()
    }

    pub fn set_language(&self, language: &str) {
        self.update(|s| s.language = language.to_string());
    }

    pub fn set_theme(&self, theme: &str) {
        self.update(|s| s.theme = theme.to_string());
    }

    pub fn set_slide_interval(&self, interval: Duration) {
        let ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self.update(|s| s.slide_interval_ms = ms);
    }

    /// Apply `f`, notifying subscribers only if something changed.
    pub fn update(&self, f: impl FnOnce(&mut SettingsState)) {
        self.tx.send_if_modified(|state| {
            let before = state.clone();
            f(state);
            *state != before
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<SettingsState> {
        self.tx.subscribe()
    }

    /// Overlay persisted settings onto the current ones.
    ///
    /// Fields absent from the stored document keep their current value. A
    /// document that no longer parses is ignored with a warning.
    pub async fn load(&self, store: &dyn KeyValueStore) -> Result<bool, StoreError> {
        let Some(stored) = store.get(SETTINGS_KEY).await? else {
            debug!(store.key = SETTINGS_KEY, "no persisted settings");
            return Ok(false);
        };

        let mut merged = serde_json::to_value(self.snapshot()).map_err(|source| {
            StoreError::Serialize {
                key: SETTINGS_KEY.to_string(),
                source,
            }
        })?;
        overlay(&mut merged, stored);

        match serde_json::from_value::<SettingsState>(merged) {
            Ok(state) => {
                self.update(|s| *s = state);
                Ok(true)
            }
            Err(e) => {
                warn!(store.key = SETTINGS_KEY, error = %e, "ignoring unreadable settings");
                Ok(false)
            }
        }
    }

    pub async fn persist(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store.set_as(SETTINGS_KEY, &self.snapshot()).await
    }
}

fn overlay(base: &mut Value, top: Value) {
    match (base, top) {
        (Value::Object(base), Value::Object(top)) => {
            for (k, v) in top {
                match base.get_mut(&k) {
                    Some(existing) => overlay(existing, v),
                    None => {
                        base.insert(k, v);
                    }
                }
            }
        }
        (base, top) => *base = top,
    }
}
