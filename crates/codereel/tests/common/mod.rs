//! Shared fixtures for codereel integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use codereel::{
    Artifact, AssetSource, BufferError, BufferHandle, BufferHost, BufferUri, CaptureError,
    CaptureHandle, CaptureHost, CaptureOptions, CaptureTarget, DownloadSink, MemoryBuffers,
    RecordingSink, Region, Session, SessionParts,
};
use reelconf::BootstrapConfig;
use reelstore::{MemoryStore, Namespace};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// A session over in-memory collaborators.
pub struct Fixture {
    pub buffers: Arc<MemoryBuffers>,
    pub project: Arc<MemoryStore>,
    pub assets: Arc<MemoryStore>,
    pub source: Arc<CountingSource>,
    pub display: Arc<RecordingSink>,
    pub session: Session,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_parts(
            Arc::new(MemoryBuffers::new()),
            Arc::new(MemoryStore::new(Namespace::project("test"))),
        )
    }

    /// A second session sharing this one's project store, with fresh buffers.
    pub fn reopen(&self) -> Self {
        Self::with_parts(Arc::new(MemoryBuffers::new()), self.project.clone())
    }

    fn with_parts(buffers: Arc<MemoryBuffers>, project: Arc<MemoryStore>) -> Self {
        let assets = Arc::new(MemoryStore::new(Namespace::assets("test")));
        let source = Arc::new(CountingSource::default());
        let display = Arc::new(RecordingSink::new());

        let mut config = BootstrapConfig::default();
        config.playback.settle_delay_ms = 0;

        let session = Session::new(
            &config,
            SessionParts {
                buffers: buffers.clone(),
                project: project.clone(),
                assets: assets.clone(),
                source: source.clone(),
                display: display.clone(),
            },
        );

        Self {
            buffers,
            project,
            assets,
            source,
            display,
            session,
        }
    }
}

/// Asset source that counts fetches and can be told to fail.
#[derive(Default)]
pub struct CountingSource {
    pub grammar_calls: AtomicUsize,
    pub theme_calls: AtomicUsize,
    pub offline: std::sync::atomic::AtomicBool,
}

impl CountingSource {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl AssetSource for CountingSource {
    async fn grammar(&self, language: &str) -> anyhow::Result<Value> {
        self.grammar_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            anyhow::bail!("network unreachable");
        }
        Ok(json!({ "scopeName": format!("source.{language}") }))
    }

    async fn theme(&self, theme: &str) -> anyhow::Result<Value> {
        self.theme_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            anyhow::bail!("network unreachable");
        }
        Ok(json!({ "name": theme }))
    }
}

/// Buffer host whose reads never complete.
pub struct StalledBuffers {
    pub inner: MemoryBuffers,
}

#[async_trait]
impl BufferHost for StalledBuffers {
    async fn create_buffer(
        &self,
        initial_text: &str,
        language: &str,
        uri: &BufferUri,
    ) -> Result<BufferHandle, BufferError> {
        self.inner.create_buffer(initial_text, language, uri).await
    }

    async fn get_buffer(&self, uri: &BufferUri) -> Option<BufferHandle> {
        self.inner.get_buffer(uri).await
    }

    async fn read_text(&self, _handle: &BufferHandle) -> Result<String, BufferError> {
        std::future::pending().await
    }

    async fn read_language(&self, handle: &BufferHandle) -> Result<String, BufferError> {
        self.inner.read_language(handle).await
    }

    async fn write_text(&self, handle: &BufferHandle, text: &str) -> Result<(), BufferError> {
        self.inner.write_text(handle, text).await
    }

    async fn set_language(
        &self,
        handle: &BufferHandle,
        language: &str,
    ) -> Result<(), BufferError> {
        self.inner.set_language(handle, language).await
    }

    async fn dispose_buffer(&self, handle: BufferHandle) -> Result<(), BufferError> {
        self.inner.dispose_buffer(handle).await
    }
}

/// Capture host that emits one chunk per `emit` call and logs every call.
#[derive(Default)]
pub struct FakeCapture {
    pub deny: bool,
    sender: Mutex<Option<mpsc::Sender<Bytes>>>,
    calls: Mutex<Vec<String>>,
    began_at: Mutex<Option<Instant>>,
}

impl FakeCapture {
    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// When recording began, if it did.
    pub fn began_at(&self) -> Option<Instant> {
        *self.began_at.lock().unwrap()
    }

    fn log(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait]
impl CaptureHost for FakeCapture {
    async fn request_capture(
        &self,
        _target: &CaptureTarget,
        _options: &CaptureOptions,
    ) -> Result<CaptureHandle, CaptureError> {
        self.log("request");
        if self.deny {
            return Err(CaptureError::PermissionDenied);
        }
        Ok(CaptureHandle::new("screen-0"))
    }

    async fn restrict_to(&self, _: &CaptureHandle, _: &Region) -> Result<(), CaptureError> {
        self.log("restrict");
        Ok(())
    }

    async fn crop_to(&self, _: &CaptureHandle, _: &Region) -> Result<(), CaptureError> {
        self.log("crop");
        Ok(())
    }

    async fn begin_recording(
        &self,
        _: &CaptureHandle,
        _: &CaptureOptions,
    ) -> Result<mpsc::Receiver<Bytes>, CaptureError> {
        self.log("begin");
        *self.began_at.lock().unwrap() = Some(Instant::now());
        let (tx, rx) = mpsc::channel(64);
        // A real encoder emits a header chunk immediately
        tx.try_send(Bytes::from_static(b"WEBM"))
            .map_err(|e| CaptureError::Device(e.to_string()))?;
        *self.sender.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn stop_recording(&self, _: &CaptureHandle) -> Result<(), CaptureError> {
        self.log("stop");
        let tx = self.sender.lock().unwrap().take();
        if let Some(tx) = tx {
            let _ = tx.send(Bytes::from_static(b"TAIL")).await;
        }
        Ok(())
    }

    async fn release(&self, _: CaptureHandle) {
        self.log("release");
    }
}

#[derive(Default)]
pub struct KeptDownloads(pub Mutex<Vec<Artifact>>);

#[async_trait]
impl DownloadSink for KeptDownloads {
    async fn deliver(&self, artifact: &Artifact) -> Result<(), CaptureError> {
        self.0.lock().unwrap().push(artifact.clone());
        Ok(())
    }
}

pub fn preview_target() -> CaptureTarget {
    CaptureTarget {
        element: "#preview".to_string(),
        region: Region {
            x: 16.0,
            y: 64.0,
            width: 960.0,
            height: 540.0,
        },
    }
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}
