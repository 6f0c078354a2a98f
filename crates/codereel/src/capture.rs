//! Screen capture of the display region during playback.
//!
//! A [`CaptureSession`] walks `Idle → Starting → Active → Stopping → Idle`.
//! The platform side is abstracted behind [`CaptureHost`]; the finished
//! recording is handed to a [`DownloadSink`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reelconf::CaptureConfig;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Container type of the finished artifact, independent of the codec request.
pub const ARTIFACT_MIME_TYPE: &str = "video/webm";

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture permission denied")]
    PermissionDenied,

    #[error("capture unsupported: {0}")]
    Unsupported(String),

    #[error("capture device error: {0}")]
    Device(String),

    #[error("no active capture (phase: {0})")]
    NotActive(CapturePhase),

    #[error("failed to deliver artifact {file_name}: {source}")]
    Delivery {
        file_name: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Idle,
    Starting,
    Active,
    Stopping,
}

impl fmt::Display for CapturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CapturePhase::Idle => "idle",
            CapturePhase::Starting => "starting",
            CapturePhase::Active => "active",
            CapturePhase::Stopping => "stopping",
        };
        write!(f, "{s}")
    }
}

/// Rectangle in the host's display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// The element to record and the region it occupies.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureTarget {
    pub element: String,
    pub region: Region,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    pub mime_type: String,
    pub video_bits_per_second: u64,
    pub frame_rate: u32,
    pub file_name: String,
}

impl From<&CaptureConfig> for CaptureOptions {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            mime_type: config.mime_type.clone(),
            video_bits_per_second: config.video_bits_per_second,
            frame_rate: config.frame_rate,
            file_name: config.file_name.clone(),
        }
    }
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

/// Host-issued identifier for a granted capture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaptureHandle(String);

impl CaptureHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Finished recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub file_name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl Artifact {
    /// Concatenate chunks in arrival order, ignoring empty ones.
    pub fn from_chunks(file_name: &str, chunks: &[Bytes]) -> Self {
        let mut data = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in chunks.iter().filter(|c| !c.is_empty()) {
            data.extend_from_slice(chunk);
        }
        Self {
            file_name: file_name.to_string(),
            mime_type: ARTIFACT_MIME_TYPE.to_string(),
            data: data.freeze(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Platform screen-capture facility.
#[async_trait]
pub trait CaptureHost: Send + Sync {
    /// Ask for permission to capture `target`. May prompt the user.
    async fn request_capture(
        &self,
        target: &CaptureTarget,
        options: &CaptureOptions,
    ) -> Result<CaptureHandle, CaptureError>;

    /// Limit capture to the element. `Unsupported` is tolerated by the session.
    async fn restrict_to(&self, handle: &CaptureHandle, region: &Region)
        -> Result<(), CaptureError>;

    /// Crop frames to the region. `Unsupported` is tolerated by the session.
    async fn crop_to(&self, handle: &CaptureHandle, region: &Region) -> Result<(), CaptureError>;

    /// Start encoding. Chunks arrive on the returned channel until the host closes it.
    async fn begin_recording(
        &self,
        handle: &CaptureHandle,
        options: &CaptureOptions,
    ) -> Result<mpsc::Receiver<Bytes>, CaptureError>;

    /// Flush pending data and close the chunk channel.
    async fn stop_recording(&self, handle: &CaptureHandle) -> Result<(), CaptureError>;

    /// Release the underlying device track.
    async fn release(&self, handle: CaptureHandle);

    async fn set_cursor_hidden(&self, _target: &CaptureTarget, _hidden: bool) {}
}

/// Receives the finished artifact (a save-as download in a browser).
#[async_trait]
pub trait DownloadSink: Send + Sync {
    async fn deliver(&self, artifact: &Artifact) -> Result<(), CaptureError>;
}

/// Writes artifacts into a directory under their file name.
#[derive(Debug, Clone)]
pub struct DirectoryDownloads {
    dir: PathBuf,
}

impl DirectoryDownloads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, artifact: &Artifact) -> PathBuf {
        self.dir.join(&artifact.file_name)
    }
}

#[async_trait]
impl DownloadSink for DirectoryDownloads {
    async fn deliver(&self, artifact: &Artifact) -> Result<(), CaptureError> {
        let path = self.path_for(artifact);
        let delivery = |source| CaptureError::Delivery {
            file_name: artifact.file_name.clone(),
            source,
        };
        tokio::fs::create_dir_all(&self.dir).await.map_err(delivery)?;
        tokio::fs::write(&path, &artifact.data).await.map_err(delivery)?;
        info!(path = %path.display(), bytes = artifact.len(), "artifact delivered");
        Ok(())
    }
}

pub struct CaptureSession {
    host: Arc<dyn CaptureHost>,
    downloads: Arc<dyn DownloadSink>,
    target: CaptureTarget,
    options: CaptureOptions,
    phase: CapturePhase,
    handle: Option<CaptureHandle>,
    collector: Option<JoinHandle<Vec<Bytes>>>,
}

impl CaptureSession {
    pub fn new(
        host: Arc<dyn CaptureHost>,
        downloads: Arc<dyn DownloadSink>,
        target: CaptureTarget,
        options: CaptureOptions,
    ) -> Self {
        Self {
            host,
            downloads,
            target,
            options,
            phase: CapturePhase::Idle,
            handle: None,
            collector: None,
        }
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    pub fn target(&self) -> &CaptureTarget {
        &self.target
    }

    /// Request capture, restrict and crop to the target, then start recording.
    ///
    /// On failure everything acquired so far is released and the session
    /// returns to `Idle`.
    pub async fn start(&mut self) -> Result<(), CaptureError> {
        if self.phase != CapturePhase::Idle {
            return Err(CaptureError::NotActive(self.phase));
        }

        self.phase = CapturePhase::Starting;
        self.host.set_cursor_hidden(&self.target, true).await;

        match self.arm().await {
            Ok(()) => {
                self.phase = CapturePhase::Active;
                info!(capture.element = %self.target.element, "capture active");
                Ok(())
            }
            Err(e) => {
                warn!(capture.element = %self.target.element, error = %e, "capture failed to start");
                if let Some(collector) = self.collector.take() {
                    collector.abort();
                }
                if let Some(handle) = self.handle.take() {
                    self.host.release(handle).await;
                }
                self.host.set_cursor_hidden(&self.target, false).await;
                self.phase = CapturePhase::Idle;
                Err(e)
            }
        }
    }

    async fn arm(&mut self) -> Result<(), CaptureError> {
        let handle = self
            .host
            .request_capture(&self.target, &self.options)
            .await?;
        self.handle = Some(handle.clone());

        let region = self.target.region;
        match self.host.restrict_to(&handle, &region).await {
            Err(CaptureError::Unsupported(why)) => debug!(reason = %why, "element restriction unsupported"),
            other => other?,
        }
        match self.host.crop_to(&handle, &region).await {
            Err(CaptureError::Unsupported(why)) => debug!(reason = %why, "region crop unsupported"),
            other => other?,
        }

        let chunks = self.host.begin_recording(&handle, &self.options).await?;
        self.collector = Some(tokio::spawn(collect_chunks(chunks)));
        Ok(())
    }

    /// Finalize the recording, release the device and deliver the artifact.
    ///
    /// Stopping a session that never became active is a no-op returning `None`.
    pub async fn stop(&mut self) -> Result<Option<Artifact>, CaptureError> {
        if self.phase != CapturePhase::Active {
            debug!(phase = %self.phase, "stop requested without active capture");
            return Ok(None);
        }
        self.phase = CapturePhase::Stopping;

        let Some(handle) = self.handle.take() else {
            self.phase = CapturePhase::Idle;
            return Err(CaptureError::NotActive(CapturePhase::Stopping));
        };

        let stopped = self.host.stop_recording(&handle).await;
        let chunks = match (self.collector.take(), &stopped) {
            (Some(collector), Ok(())) => match collector.await {
                Ok(chunks) => chunks,
                Err(e) => {
                    warn!(error = %e, "chunk collector failed");
                    Vec::new()
                }
            },
            (Some(collector), Err(_)) => {
                collector.abort();
                Vec::new()
            }
            (None, _) => Vec::new(),
        };

        self.host.release(handle).await;
        self.host.set_cursor_hidden(&self.target, false).await;
        self.phase = CapturePhase::Idle;
        stopped?;

        let artifact = Artifact::from_chunks(&self.options.file_name, &chunks);
        info!(
            file_name = %artifact.file_name,
            bytes = artifact.len(),
            chunks = chunks.len(),
            "capture finalized"
        );
        self.downloads.deliver(&artifact).await?;
        Ok(Some(artifact))
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(collector) = self.collector.take() {
            collector.abort();
        }
        if self.phase != CapturePhase::Idle {
            warn!(phase = %self.phase, "capture session dropped before stop");
        }
    }
}

async fn collect_chunks(mut rx: mpsc::Receiver<Bytes>) -> Vec<Bytes> {
    let mut chunks = Vec::new();
    while let Some(chunk) = rx.recv().await {
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
    }
    chunks
}
