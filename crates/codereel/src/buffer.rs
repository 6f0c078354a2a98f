//! Contract with the text-editing component that owns buffer content.
//!
//! codereel never touches buffer bytes except through [`BufferHost`]. The host
//! is handed to the timeline manager at construction time; there is no global
//! registry of buffers.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Address of an externally-owned text buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BufferUri(String);

impl BufferUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// The canonical URI for a buffer minted for `id`: `file://{id}/`.
    pub fn for_id(id: &str) -> Self {
        Self(format!("file://{id}/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BufferUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to a live buffer, obtained from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferHandle {
    uri: BufferUri,
}

impl BufferHandle {
    pub fn new(uri: BufferUri) -> Self {
        Self { uri }
    }

    pub fn uri(&self) -> &BufferUri {
        &self.uri
    }
}

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("buffer host is not initialized")]
    NotReady,

    #[error("buffer already exists: {0}")]
    AlreadyExists(BufferUri),

    #[error("buffer is gone: {0}")]
    Gone(BufferUri),

    #[error("buffer host error: {0}")]
    Host(String),
}

/// Creates, reads, rewrites and disposes text buffers identified by URI.
#[async_trait]
pub trait BufferHost: Send + Sync {
    /// Whether the host finished initializing. Timeline mutations are skipped until it has.
    fn is_ready(&self) -> bool {
        true
    }

    async fn create_buffer(
        &self,
        initial_text: &str,
        language: &str,
        uri: &BufferUri,
    ) -> Result<BufferHandle, BufferError>;

    /// Look up a live buffer. `None` if it was never created or has been disposed.
    async fn get_buffer(&self, uri: &BufferUri) -> Option<BufferHandle>;

    async fn read_text(&self, handle: &BufferHandle) -> Result<String, BufferError>;

    async fn read_language(&self, handle: &BufferHandle) -> Result<String, BufferError>;

    async fn write_text(&self, handle: &BufferHandle, text: &str) -> Result<(), BufferError>;

    async fn set_language(&self, handle: &BufferHandle, language: &str)
        -> Result<(), BufferError>;

    async fn dispose_buffer(&self, handle: BufferHandle) -> Result<(), BufferError>;
}

#[derive(Debug, Clone)]
struct MemoryBuffer {
    text: String,
    language: String,
}

/// In-process buffer host. Backs the headless CLI and tests.
#[derive(Debug)]
pub struct MemoryBuffers {
    ready: AtomicBool,
    buffers: RwLock<HashMap<BufferUri, MemoryBuffer>>,
}

impl Default for MemoryBuffers {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBuffers {
    /// A host that is ready immediately.
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            buffers: RwLock::new(HashMap::new()),
        }
    }

    /// A host that reports not-ready until [`MemoryBuffers::mark_ready`] is called.
    pub fn uninitialized() -> Self {
        Self {
            ready: AtomicBool::new(false),
            buffers: RwLock::new(HashMap::new()),
        }
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Number of live buffers.
    pub fn len(&self) -> usize {
        self.buffers.read().map(|b| b.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, uri: &BufferUri) -> bool {
        self.buffers
            .read()
            .map(|b| b.contains_key(uri))
            .unwrap_or(false)
    }

    fn poisoned() -> BufferError {
        BufferError::Host("buffer table lock poisoned".to_string())
    }

    fn with_buffer<T>(
        &self,
        handle: &BufferHandle,
        f: impl FnOnce(&mut MemoryBuffer) -> T,
    ) -> Result<T, BufferError> {
        let mut buffers = self.buffers.write().map_err(|_| Self::poisoned())?;
        buffers
            .get_mut(handle.uri())
            .map(f)
            .ok_or_else(|| BufferError::Gone(handle.uri().clone()))
    }
}

#[async_trait]
impl BufferHost for MemoryBuffers {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn create_buffer(
        &self,
        initial_text: &str,
        language: &str,
        uri: &BufferUri,
    ) -> Result<BufferHandle, BufferError> {
        if !self.is_ready() {
            return Err(BufferError::NotReady);
        }

        let mut buffers = self.buffers.write().map_err(|_| Self::poisoned())?;
        if buffers.contains_key(uri) {
            return Err(BufferError::AlreadyExists(uri.clone()));
        }

        buffers.insert(
            uri.clone(),
            MemoryBuffer {
                text: initial_text.to_string(),
                language: language.to_string(),
            },
        );
        Ok(BufferHandle::new(uri.clone()))
    }

    async fn get_buffer(&self, uri: &BufferUri) -> Option<BufferHandle> {
        self.contains(uri).then(|| BufferHandle::new(uri.clone()))
    }

    async fn read_text(&self, handle: &BufferHandle) -> Result<String, BufferError> {
        self.with_buffer(handle, |b| b.text.clone())
    }

    async fn read_language(&self, handle: &BufferHandle) -> Result<String, BufferError> {
        self.with_buffer(handle, |b| b.language.clone())
    }

    async fn write_text(&self, handle: &BufferHandle, text: &str) -> Result<(), BufferError> {
        self.with_buffer(handle, |b| b.text = text.to_string())
    }

    async fn set_language(
        &self,
        handle: &BufferHandle,
        language: &str,
    ) -> Result<(), BufferError> {
        self.with_buffer(handle, |b| b.language = language.to_string())
    }

    async fn dispose_buffer(&self, handle: BufferHandle) -> Result<(), BufferError> {
        let mut buffers = self.buffers.write().map_err(|_| Self::poisoned())?;
        buffers
            .remove(handle.uri())
            .map(|_| ())
            .ok_or_else(|| BufferError::Gone(handle.uri().clone()))
    }
}
