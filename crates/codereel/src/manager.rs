//! Slide Timeline Manager.
//!
//! Owns the [`Timeline`] and keeps it 1:1 with live buffers in the
//! [`BufferHost`]. Precondition failures (host not ready, unknown id, buffer
//! gone) are not errors: the operation is skipped, a warning is logged and the
//! state is left untouched. Only persistence failures surface as
//! [`ReelError`].

use std::sync::Arc;

use reelstore::{KeyValueStore, KeyValueStoreExt};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::buffer::{BufferHandle, BufferHost};
use crate::error::{ReelError, Result};
use crate::settings::Settings;
use crate::timeline::{
    DehydratedSlide, DehydratedSlides, Slide, SlideId, Timeline, ORDER_KEY, SLIDES_KEY,
};

/// What subscribers receive after every mutation.
pub type TimelineSnapshot = Timeline;

pub struct TimelineManager {
    buffers: Arc<dyn BufferHost>,
    store: Arc<dyn KeyValueStore>,
    settings: Settings,
    state: watch::Sender<Timeline>,
}

impl TimelineManager {
    pub fn new(
        buffers: Arc<dyn BufferHost>,
        store: Arc<dyn KeyValueStore>,
        settings: Settings,
    ) -> Self {
        let (state, _) = watch::channel(Timeline::new());
        Self {
            buffers,
            store,
            settings,
            state,
        }
    }

    pub fn buffers(&self) -> &Arc<dyn BufferHost> {
        &self.buffers
    }

    pub fn snapshot(&self) -> TimelineSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TimelineSnapshot> {
        self.state.subscribe()
    }

    pub fn order(&self) -> Vec<SlideId> {
        self.state.borrow().order().to_vec()
    }

    pub fn active(&self) -> Option<SlideId> {
        self.state.borrow().active().cloned()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    pub fn can_remove(&self) -> bool {
        self.state.borrow().can_remove()
    }

    fn slide(&self, id: &SlideId) -> Option<Slide> {
        self.state.borrow().get(id).cloned()
    }

    fn host_ready(&self, op: &str) -> bool {
        let ready = self.buffers.is_ready();
        if !ready {
            warn!(op, "buffer host not initialized, skipping");
        }
        ready
    }

    async fn live_buffer(&self, slide: &Slide) -> Option<BufferHandle> {
        let handle = self.buffers.get_buffer(&slide.uri).await;
        if handle.is_none() {
            warn!(slide.id = %slide.id, buffer.uri = %slide.uri, "buffer not found for slide");
        }
        handle
    }

    /// Create an empty slide at the end of the timeline and make it active.
    ///
    /// The new buffer inherits the last slide's language, or the global
    /// language when the timeline is empty.
    pub async fn add(&self) -> Option<SlideId> {
        if !self.host_ready("add") {
            return None;
        }

        let last = self.state.borrow().last().cloned();
        let language = match last {
            None => self.settings.language(),
            Some(last) => {
                let handle = self.live_buffer(&last).await?;
                match self.buffers.read_language(&handle).await {
                    Ok(language) => language,
                    Err(e) => {
                        warn!(slide.id = %last.id, error = %e, "cannot read language of last slide");
                        return None;
                    }
                }
            }
        };

        self.create_and_append("", &language).await
    }

    /// Copy a slide's text and language into a new slide at the end of the timeline.
    pub async fn duplicate(&self, id: &SlideId) -> Option<SlideId> {
        if !self.host_ready("duplicate") {
            return None;
        }

        let Some(source) = self.slide(id) else {
            warn!(slide.id = %id, "cannot duplicate unknown slide");
            return None;
        };
        let handle = self.live_buffer(&source).await?;

        let text = self.buffers.read_text(&handle).await;
        let language = self.buffers.read_language(&handle).await;
        let (text, language) = match (text, language) {
            (Ok(text), Ok(language)) => (text, language),
            (Err(e), _) | (_, Err(e)) => {
                warn!(slide.id = %id, error = %e, "cannot read slide to duplicate");
                return None;
            }
        };

        self.create_and_append(&text, &language).await
    }

    async fn create_and_append(&self, text: &str, language: &str) -> Option<SlideId> {
        let slide = Slide::mint();
        if let Err(e) = self.buffers.create_buffer(text, language, &slide.uri).await {
            warn!(slide.id = %slide.id, buffer.uri = %slide.uri, error = %e, "buffer creation failed");
            return None;
        }

        let id = slide.id.clone();
        let appended = self.state.send_if_modified(|t| t.push(slide));
        if !appended {
            // Freshly minted ids do not collide in practice; keep the host clean if one does
            warn!(slide.id = %id, "slide id already present, discarding new buffer");
            return None;
        }

        info!(slide.id = %id, language, "slide added");
        Some(id)
    }

    /// Remove a slide and dispose its buffer. Returns false if nothing was removed.
    ///
    /// The timeline is updated before the buffer is disposed, so observers
    /// never see a slide whose buffer is already gone.
    pub async fn remove(&self, id: &SlideId) -> bool {
        if !self.host_ready("remove") {
            return false;
        }

        let Some(slide) = self.slide(id) else {
            warn!(slide.id = %id, "cannot remove unknown slide");
            return false;
        };
        let Some(handle) = self.live_buffer(&slide).await else {
            return false;
        };

        let mut removed = false;
        self.state.send_if_modified(|t| {
            removed = t.remove(id).is_some();
            removed
        });
        if !removed {
            return false;
        }

        if let Err(e) = self.buffers.dispose_buffer(handle).await {
            warn!(slide.id = %id, error = %e, "buffer disposal failed");
        }
        info!(slide.id = %id, "slide removed");
        true
    }

    /// Mark a slide as active. Unknown ids leave the timeline unchanged.
    pub fn set_active(&self, id: &SlideId) -> bool {
        let mut changed = false;
        self.state.send_if_modified(|t| {
            if t.active() == Some(id) {
                return false;
            }
            changed = t.set_active(id);
            changed
        });
        changed || self.active().as_ref() == Some(id)
    }

    /// Move `from` to the position currently held by `to`.
    pub fn reorder(&self, from: &SlideId, to: &SlideId) -> bool {
        if from == to {
            return false;
        }
        let mut moved = false;
        self.state.send_if_modified(|t| {
            if let (Some(old), Some(new)) = (t.position(from), t.position(to)) {
                moved = t.move_slide(old, new);
            }
            moved
        });
        if moved {
            debug!(slide.id = %from, "slide reordered");
        }
        moved
    }

    /// Re-tag every live buffer with `language`.
    pub async fn retag_all(&self, language: &str) -> usize {
        let slides: Vec<Slide> = self.state.borrow().iter().cloned().collect();
        let mut tagged = 0;
        for slide in slides {
            let Some(handle) = self.live_buffer(&slide).await else {
                continue;
            };
            match self.buffers.set_language(&handle, language).await {
                Ok(()) => tagged += 1,
                Err(e) => warn!(slide.id = %slide.id, error = %e, "cannot re-tag buffer"),
            }
        }
        tagged
    }

    /// Current text of a slide's buffer.
    pub async fn read_text(&self, id: &SlideId) -> Result<String> {
        let slide = self
            .slide(id)
            .ok_or_else(|| ReelError::UnknownSlide(id.clone()))?;
        let handle = self
            .buffers
            .get_buffer(&slide.uri)
            .await
            .ok_or_else(|| ReelError::MissingBuffer {
                slide: slide.id.clone(),
                uri: slide.uri.clone(),
            })?;
        Ok(self.buffers.read_text(&handle).await?)
    }

    /// Rewrite a slide's buffer.
    pub async fn write_text(&self, id: &SlideId, text: &str) -> Result<()> {
        let slide = self
            .slide(id)
            .ok_or_else(|| ReelError::UnknownSlide(id.clone()))?;
        let handle = self
            .buffers
            .get_buffer(&slide.uri)
            .await
            .ok_or_else(|| ReelError::MissingBuffer {
                slide: slide.id.clone(),
                uri: slide.uri.clone(),
            })?;
        Ok(self.buffers.write_text(&handle, text).await?)
    }

    /// Replace the in-memory timeline with the persisted one.
    ///
    /// Buffers already live under a persisted URI are reused as-is; missing
    /// ones are created with the persisted text and the global language. Ids
    /// in `order` without an entry in the slide map are skipped and dropped.
    #[instrument(skip(self))]
    pub async fn hydrate(&self) -> Result<()> {
        if !self.host_ready("hydrate") {
            return Ok(());
        }

        let order: Vec<SlideId> = self.store.get_as(ORDER_KEY).await?.unwrap_or_default();
        let mut persisted: DehydratedSlides =
            self.store.get_as(SLIDES_KEY).await?.unwrap_or_default();
        let language = self.settings.language();

        let mut restored = Vec::with_capacity(order.len());
        for id in order {
            let Some(dehydrated) = persisted.remove(&id) else {
                warn!(slide.id = %id, "persisted order names a slide with no stored content, skipping");
                continue;
            };

            if self.buffers.get_buffer(&dehydrated.uri).await.is_none() {
                if let Err(e) = self
                    .buffers
                    .create_buffer(&dehydrated.code, &language, &dehydrated.uri)
                    .await
                {
                    warn!(slide.id = %id, buffer.uri = %dehydrated.uri, error = %e, "cannot recreate buffer, skipping");
                    continue;
                }
            }

            restored.push(Slide {
                id,
                uri: dehydrated.uri,
            });
        }

        let count = restored.len();
        let mut dropped = 0;
        self.state.send_modify(|t| dropped = t.restore(restored));
        if dropped > 0 {
            warn!(dropped, "duplicate slides in persisted order were dropped");
        }
        if !persisted.is_empty() {
            debug!(orphans = persisted.len(), "stored slides absent from order were ignored");
        }

        info!(slides = count - dropped, "timeline hydrated");
        Ok(())
    }

    /// Write the current timeline to the project store.
    ///
    /// `order` is written as-is. A slide whose buffer is gone is omitted from
    /// the slide map with a warning; the next hydrate skips it.
    #[instrument(skip(self))]
    pub async fn save(&self) -> Result<()> {
        if !self.host_ready("save") {
            return Ok(());
        }

        let snapshot = self.snapshot();
        let mut dehydrated = DehydratedSlides::new();
        for slide in snapshot.iter() {
            let Some(handle) = self.live_buffer(slide).await else {
                continue;
            };
            let code = match self.buffers.read_text(&handle).await {
                Ok(code) => code,
                Err(e) => {
                    warn!(slide.id = %slide.id, error = %e, "cannot read slide for save");
                    continue;
                }
            };
            let language = self.buffers.read_language(&handle).await.ok();

            dehydrated.insert(
                slide.id.clone(),
                DehydratedSlide {
                    id: slide.id.clone(),
                    uri: slide.uri.clone(),
                    code,
                    language,
                },
            );
        }

        self.store.set_as(ORDER_KEY, &snapshot.order()).await?;
        self.store.set_as(SLIDES_KEY, &dehydrated).await?;

        debug!(slides = dehydrated.len(), "timeline saved");
        Ok(())
    }
}
