//! A running editor session: wires the containers, stores and collaborators
//! together and exposes the user-level operations.

use std::sync::Arc;

use reelconf::{BootstrapConfig, ReelConfig};
use reelstore::{asset_keys, AssetCache, FileStore, KeyValueStore, Namespace};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::assets::AssetSource;
use crate::autosave::{Autosaver, Saver};
use crate::buffer::BufferHost;
use crate::capture::{CaptureHost, CaptureOptions, CaptureSession, CaptureTarget, DownloadSink};
use crate::error::Result;
use crate::manager::TimelineManager;
use crate::playback::{DisplaySink, PlaybackOptions, PlaybackOutcome, Player};
use crate::settings::Settings;
use crate::status::{EditorStatus, StatusBoard};

/// Collaborators a session is built from.
pub struct SessionParts {
    pub buffers: Arc<dyn BufferHost>,
    pub project: Arc<dyn KeyValueStore>,
    pub assets: Arc<dyn KeyValueStore>,
    pub source: Arc<dyn AssetSource>,
    pub display: Arc<dyn DisplaySink>,
}

pub struct Session {
    config: BootstrapConfig,
    settings: Settings,
    status: StatusBoard,
    project: Arc<dyn KeyValueStore>,
    timeline: Arc<TimelineManager>,
    player: Player,
    cache: AssetCache,
    source: Arc<dyn AssetSource>,
    saver: Saver,
    autosaver: Mutex<Option<Autosaver>>,
}

impl Session {
    pub fn new(config: &BootstrapConfig, parts: SessionParts) -> Self {
        let settings = Settings::from_bootstrap(config);
        let status = StatusBoard::new();
        let timeline = Arc::new(TimelineManager::new(
            parts.buffers,
            parts.project.clone(),
            settings.clone(),
        ));
        let player = Player::new(timeline.clone(), parts.display, status.clone());
        let saver = Saver::new(
            timeline.clone(),
            settings.clone(),
            parts.project.clone(),
            status.clone(),
        );

        Self {
            config: config.clone(),
            settings,
            status,
            project: parts.project,
            timeline,
            player,
            cache: AssetCache::new(parts.assets),
            source: parts.source,
            saver,
            autosaver: Mutex::new(None),
        }
    }

    /// Build a session backed by file stores under the configured state directory.
    pub fn open(
        config: &ReelConfig,
        buffers: Arc<dyn BufferHost>,
        source: Arc<dyn AssetSource>,
        display: Arc<dyn DisplaySink>,
    ) -> Result<Self> {
        let infra = &config.infra;
        let base = &infra.paths.state_dir;
        let project = FileStore::at_path(
            base.clone(),
            Namespace::new(&infra.store.project_namespace, &infra.store.scope),
        )?;
        let assets = FileStore::at_path(
            base.clone(),
            Namespace::new(&infra.store.asset_namespace, &infra.store.scope),
        )?;

        Ok(Self::new(
            &config.bootstrap,
            SessionParts {
                buffers,
                project: Arc::new(project),
                assets: Arc::new(assets),
                source,
                display,
            },
        ))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    pub fn timeline(&self) -> &Arc<TimelineManager> {
        &self.timeline
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// Restore settings and slides. A session with nothing persisted gets one empty slide.
    #[instrument(skip(self))]
    pub async fn setup(&self) -> Result<()> {
        self.settings.load(self.project.as_ref()).await?;
        self.timeline.hydrate().await?;

        if self.timeline.is_empty() {
            self.timeline.add().await;
        }

        info!(
            slides = self.timeline.len(),
            language = %self.settings.language(),
            "session ready"
        );
        Ok(())
    }

    pub async fn save(&self) -> Result<()> {
        self.saver.save().await
    }

    /// Start periodic saving. Calling it again replaces the running timer.
    pub async fn start_autosave(&self) {
        let autosaver = Autosaver::spawn(self.saver.clone(), self.config.autosave.interval());
        let previous = self.autosaver.lock().await.replace(autosaver);
        if let Some(previous) = previous {
            previous.stop().await;
        }
    }

    /// Switch the global language: load its grammar, then re-tag every buffer.
    ///
    /// If the grammar cannot be loaded nothing changes.
    pub async fn set_language(&self, language: &str) -> Result<Value> {
        self.status.set(EditorStatus::LoadingGrammar);
        let source = self.source.clone();
        let grammar = self
            .cache
            .with_cache::<Value, _, _>(&asset_keys::grammar(language), || async move {
                source.grammar(language).await
            })
            .await;

        let grammar = match grammar {
            Ok(grammar) => grammar,
            Err(e) => {
                warn!(language, error = %e, "grammar unavailable");
                self.status.set(EditorStatus::Error);
                return Err(e.into());
            }
        };

        self.settings.set_language(language);
        let tagged = self.timeline.retag_all(language).await;
        self.status.set(EditorStatus::Idle);
        info!(language, buffers = tagged, "language switched");
        Ok(grammar)
    }

    /// Switch the theme once its definition is available.
    pub async fn set_theme(&self, theme: &str) -> Result<Value> {
        self.status.set(EditorStatus::LoadingTheme);
        let source = self.source.clone();
        let definition = self
            .cache
            .with_cache::<Value, _, _>(&asset_keys::theme(theme), || async move {
                source.theme(theme).await
            })
            .await;

        match definition {
            Ok(definition) => {
                self.settings.set_theme(theme);
                self.status.set(EditorStatus::Idle);
                info!(theme, "theme switched");
                Ok(definition)
            }
            Err(e) => {
                warn!(theme, error = %e, "theme unavailable");
                self.status.set(EditorStatus::Error);
                Err(e.into())
            }
        }
    }

    /// Playback timing from config, with the interval taken from live settings.
    pub fn playback_options(&self) -> PlaybackOptions {
        PlaybackOptions::from(&self.config.playback).with_interval(self.settings.slide_interval())
    }

    /// A capture session for `target` using the configured encoding options.
    pub fn capture_session(
        &self,
        host: Arc<dyn CaptureHost>,
        downloads: Arc<dyn DownloadSink>,
        target: CaptureTarget,
    ) -> CaptureSession {
        CaptureSession::new(host, downloads, target, CaptureOptions::from(&self.config.capture))
    }

    pub async fn play(&self, capture: Option<CaptureSession>) -> PlaybackOutcome {
        self.player.play(&self.playback_options(), capture).await
    }

    /// Stop autosaving and flush once more. Failures are logged, not returned.
    pub async fn shutdown(&self) {
        let autosaver = self.autosaver.lock().await.take();
        if let Some(autosaver) = autosaver {
            autosaver.stop().await;
        }
        if let Err(e) = self.save().await {
            warn!(error = %e, "final save failed");
        }
    }
}
