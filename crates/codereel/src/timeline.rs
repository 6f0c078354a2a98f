//! Slide timeline state.
//!
//! A [`Timeline`] is the ordered list of slides plus the active-slide marker.
//! It is pure data: every mutation here keeps three properties intact.
//!
//! - `order` and the keys of `slides` hold exactly the same ids, once each
//! - `active` is either absent or one of those ids
//! - every slide's buffer URI is unique
//!
//! Buffer lifecycle lives in [`crate::manager::TimelineManager`]; this module
//! never talks to the buffer host.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::buffer::BufferUri;

/// Store key holding the slide order.
pub const ORDER_KEY: &str = "order";
/// Store key holding the dehydrated slide map.
pub const SLIDES_KEY: &str = "slides";

/// Opaque slide identifier, minted fresh for every new slide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlideId(String);

impl SlideId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SlideId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SlideId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SlideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A slide as held in memory: its id and the buffer carrying its text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    pub id: SlideId,
    pub uri: BufferUri,
}

impl Slide {
    /// A new slide whose buffer URI is derived from its id.
    pub fn mint() -> Self {
        let id = SlideId::generate();
        let uri = BufferUri::for_id(id.as_str());
        Self { id, uri }
    }
}

/// A slide as persisted: the buffer's text and language captured at save time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DehydratedSlide {
    pub id: SlideId,
    pub uri: BufferUri,
    pub code: String,
    /// Older projects were saved without a per-slide language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Persisted slide map. Ordered so repeated saves serialize identically.
pub type DehydratedSlides = BTreeMap<SlideId, DehydratedSlide>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    active: Option<SlideId>,
    order: Vec<SlideId>,
    slides: HashMap<SlideId, Slide>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&SlideId> {
        self.active.as_ref()
    }

    pub fn order(&self) -> &[SlideId] {
        &self.order
    }

    pub fn get(&self, id: &SlideId) -> Option<&Slide> {
        self.slides.get(id)
    }

    pub fn contains(&self, id: &SlideId) -> bool {
        self.slides.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Slides in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Slide> {
        self.order.iter().filter_map(|id| self.slides.get(id))
    }

    pub fn last(&self) -> Option<&Slide> {
        self.order.last().and_then(|id| self.slides.get(id))
    }

    pub fn position(&self, id: &SlideId) -> Option<usize> {
        self.order.iter().position(|o| o == id)
    }

    /// The UI only offers deletion while more than one slide remains.
    pub fn can_remove(&self) -> bool {
        self.order.len() > 1
    }

    /// Append a slide and make it active. Returns false if the id or URI is already taken.
    pub fn push(&mut self, slide: Slide) -> bool {
        if self.slides.contains_key(&slide.id) || self.uri_taken(&slide.uri) {
            return false;
        }
        self.order.push(slide.id.clone());
        self.active = Some(slide.id.clone());
        self.slides.insert(slide.id.clone(), slide);
        true
    }

    /// Remove a slide. The last remaining slide becomes active, whichever was active before.
    pub fn remove(&mut self, id: &SlideId) -> Option<Slide> {
        let slide = self.slides.remove(id)?;
        self.order.retain(|o| o != id);
        self.active = self.order.last().cloned();
        Some(slide)
    }

    pub fn set_active(&mut self, id: &SlideId) -> bool {
        if !self.slides.contains_key(id) {
            return false;
        }
        self.active = Some(id.clone());
        true
    }

    /// Move the slide at `from` to index `to`, shifting the slides in between.
    pub fn move_slide(&mut self, from: usize, to: usize) -> bool {
        if from >= self.order.len() || to >= self.order.len() {
            return false;
        }
        if from != to {
            let id = self.order.remove(from);
            self.order.insert(to, id);
        }
        true
    }

    /// Replace the whole timeline. The first restored slide becomes active.
    ///
    /// Slides with duplicate ids or URIs are dropped, first occurrence wins.
    pub fn restore(&mut self, slides: Vec<Slide>) -> usize {
        *self = Self::default();
        let mut dropped = 0;
        for slide in slides {
            if !self.push(slide) {
                dropped += 1;
            }
        }
        self.active = self.order.first().cloned();
        dropped
    }

    /// Check the structural invariants, describing the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if self.order.len() != self.slides.len() {
            return Err(format!(
                "order has {} ids but slide map has {}",
                self.order.len(),
                self.slides.len()
            ));
        }

        let mut seen = HashSet::new();
        let mut uris = HashSet::new();
        for id in &self.order {
            if !seen.insert(id) {
                return Err(format!("slide {id} appears twice in order"));
            }
            let Some(slide) = self.slides.get(id) else {
                return Err(format!("slide {id} is ordered but not mapped"));
            };
            if &slide.id != id {
                return Err(format!("slide {id} is mapped under a different id"));
            }
            if !uris.insert(&slide.uri) {
                return Err(format!("buffer {} is shared by two slides", slide.uri));
            }
        }

        if let Some(active) = &self.active {
            if !self.slides.contains_key(active) {
                return Err(format!("active slide {active} is not in the timeline"));
            }
        }

        Ok(())
    }

    fn uri_taken(&self, uri: &BufferUri) -> bool {
        self.slides.values().any(|s| &s.uri == uri)
    }
}
