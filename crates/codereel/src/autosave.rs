//! Persisting the timeline and settings, on demand and on a timer.

use std::sync::Arc;
use std::time::Duration;

use reelstore::KeyValueStore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ReelError, Result};
use crate::manager::TimelineManager;
use crate::settings::Settings;
use crate::status::{EditorStatus, StatusBoard};

/// Everything a save touches, bundled so the timer task can own a copy.
#[derive(Clone)]
pub struct Saver {
    timeline: Arc<TimelineManager>,
    settings: Settings,
    project: Arc<dyn KeyValueStore>,
    status: StatusBoard,
}

impl Saver {
    pub fn new(
        timeline: Arc<TimelineManager>,
        settings: Settings,
        project: Arc<dyn KeyValueStore>,
        status: StatusBoard,
    ) -> Self {
        Self {
            timeline,
            settings,
            project,
            status,
        }
    }

    /// Save timeline and settings, reporting `Saving` while in progress.
    pub async fn save(&self) -> Result<()> {
        self.status.set(EditorStatus::Saving);

        let result = async {
            self.timeline.save().await?;
            self.settings.persist(self.project.as_ref()).await?;
            Ok::<_, ReelError>(())
        }
        .await;

        self.status.set(match result {
            Ok(()) => EditorStatus::Idle,
            Err(_) => EditorStatus::Error,
        });
        result
    }
}

/// Background task saving on a fixed interval until stopped.
pub struct Autosaver {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Autosaver {
    /// Start ticking. The first save happens one full `interval` after spawn.
    pub fn spawn(saver: Saver, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("autosave stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        // Failures wait for the next tick
                        if let Err(e) = saver.save().await {
                            warn!(error = %e, retryable = e.is_retryable(), "autosave failed");
                        }
                    }
                }
            }
        });

        info!(interval_ms = interval.as_millis() as u64, "autosave started");
        Self { cancel, task }
    }

    /// Stop ticking and wait for an in-progress save to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "autosave task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::MemoryBuffers;
    use crate::timeline::ORDER_KEY;
    use reelstore::{MemoryStore, Namespace};

    fn saver() -> (Arc<MemoryStore>, Arc<TimelineManager>, Saver) {
        let store = Arc::new(MemoryStore::new(Namespace::project("test")));
        let settings = Settings::default();
        let timeline = Arc::new(TimelineManager::new(
            Arc::new(MemoryBuffers::new()),
            store.clone(),
            settings.clone(),
        ));
        let saver = Saver::new(timeline.clone(), settings, store.clone(), StatusBoard::new());
        (store, timeline, saver)
    }

    #[tokio::test]
    async fn test_save_returns_status_to_idle() {
        let (store, timeline, saver) = saver();
        timeline.add().await.unwrap();
        let mut status = saver.status.subscribe();

        saver.save().await.unwrap();

        assert!(status.has_changed().unwrap());
        assert_eq!(*status.borrow_and_update(), EditorStatus::Idle);
        assert!(store.get(ORDER_KEY).await.unwrap().is_some());
        assert!(store.get(crate::settings::SETTINGS_KEY).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_ticks_until_stopped() {
        let (store, timeline, saver) = saver();
        timeline.add().await.unwrap();

        let autosaver = Autosaver::spawn(saver, Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(store.get(ORDER_KEY).await.unwrap().is_none());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.get(ORDER_KEY).await.unwrap().is_some());

        autosaver.stop().await;
        store.remove(ORDER_KEY).await.unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(store.get(ORDER_KEY).await.unwrap().is_none());
    }
}
