//! Editor activity indicator shared by saving, playback and asset loading.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorStatus {
    #[default]
    Idle,
    Animating,
    LoadingTheme,
    LoadingGrammar,
    Saving,
    Error,
}

impl fmt::Display for EditorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EditorStatus::Idle => "idle",
            EditorStatus::Animating => "animating",
            EditorStatus::LoadingTheme => "loading theme",
            EditorStatus::LoadingGrammar => "loading grammar",
            EditorStatus::Saving => "saving",
            EditorStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Cloneable handle onto the current [`EditorStatus`].
#[derive(Debug, Clone)]
pub struct StatusBoard {
    tx: Arc<watch::Sender<EditorStatus>>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(EditorStatus::Idle);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> EditorStatus {
        *self.tx.borrow()
    }

    pub fn set(&self, status: EditorStatus) {
        self.tx.send_if_modified(|s| {
            let changed = *s != status;
            *s = status;
            changed
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<EditorStatus> {
        self.tx.subscribe()
    }
}
