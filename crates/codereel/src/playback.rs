//! Playback pipeline: walk the timeline, push each slide to a display sink,
//! optionally mirroring the run into a capture session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reelconf::PlaybackConfig;
use tokio::time::{sleep, timeout, Instant};
use tracing::{error, info, instrument, warn};

use crate::capture::{Artifact, CaptureSession};
use crate::error::{ReelError, Result};
use crate::manager::TimelineManager;
use crate::status::{EditorStatus, StatusBoard};
use crate::timeline::SlideId;

/// Where frames are shown. The animation renderer sits behind this.
#[async_trait]
pub trait DisplaySink: Send + Sync {
    async fn show(&self, code: &str);
    async fn clear(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    Show(String),
    Clear,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: FrameKind,
    pub at: Instant,
}

/// Display sink that keeps every frame with its timestamp.
#[derive(Debug, Default)]
pub struct RecordingSink {
    frames: Mutex<Vec<Frame>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().map(|f| f.clone()).unwrap_or_default()
    }

    /// Text of every `show` in arrival order.
    pub fn shown(&self) -> Vec<String> {
        self.frames()
            .into_iter()
            .filter_map(|f| match f.kind {
                FrameKind::Show(code) => Some(code),
                FrameKind::Clear => None,
            })
            .collect()
    }

    fn push(&self, kind: FrameKind) {
        if let Ok(mut frames) = self.frames.lock() {
            frames.push(Frame {
                kind,
                at: Instant::now(),
            });
        }
    }
}

#[async_trait]
impl DisplaySink for RecordingSink {
    async fn show(&self, code: &str) {
        self.push(FrameKind::Show(code.to_string()));
    }

    async fn clear(&self) {
        self.push(FrameKind::Clear);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackOptions {
    pub interval: Duration,
    pub settle_delay: Duration,
    pub max_lines: usize,
    pub step_timeout: Option<Duration>,
}

impl From<&PlaybackConfig> for PlaybackOptions {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            interval: config.slide_interval(),
            settle_delay: config.settle_delay(),
            max_lines: config.max_lines,
            step_timeout: config.step_timeout(),
        }
    }
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self::from(&PlaybackConfig::default())
    }
}

impl PlaybackOptions {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }
}

#[derive(Debug)]
pub struct PlaybackReport {
    pub frames_shown: usize,
    pub elapsed: Duration,
    pub artifact: Option<Artifact>,
    /// The failure that cut the run short, if any.
    pub error: Option<ReelError>,
}

impl PlaybackReport {
    pub fn completed(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug)]
pub enum PlaybackOutcome {
    /// Another run was already in flight; nothing happened.
    Busy,
    Finished(PlaybackReport),
}

impl PlaybackOutcome {
    pub fn report(&self) -> Option<&PlaybackReport> {
        match self {
            PlaybackOutcome::Busy => None,
            PlaybackOutcome::Finished(report) => Some(report),
        }
    }
}

/// Held for the duration of a run; dropping it reopens the latch.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Player {
    timeline: Arc<TimelineManager>,
    sink: Arc<dyn DisplaySink>,
    status: StatusBoard,
    in_flight: AtomicBool,
}

impl Player {
    pub fn new(timeline: Arc<TimelineManager>, sink: Arc<dyn DisplaySink>, status: StatusBoard) -> Self {
        Self {
            timeline,
            sink,
            status,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one playback over the current slide order.
    ///
    /// A trigger while another run is in flight returns [`PlaybackOutcome::Busy`]
    /// immediately. Otherwise the sink is cleared, any capture is stopped and
    /// the latch is released on every exit path; failures are reported in the
    /// returned [`PlaybackReport`].
    #[instrument(skip_all)]
    pub async fn play(
        &self,
        options: &PlaybackOptions,
        mut capture: Option<CaptureSession>,
    ) -> PlaybackOutcome {
        let Some(_latch) = InFlight::acquire(&self.in_flight) else {
            info!("playback already in flight, ignoring trigger");
            return PlaybackOutcome::Busy;
        };

        let started = Instant::now();
        self.status.set(EditorStatus::Animating);

        let mut frames_shown = 0;
        let run = self.run(options, capture.as_mut(), &mut frames_shown).await;
        let mut error = run.err();
        if let Some(e) = &error {
            warn!(error = %e, playback.frames = frames_shown, "playback aborted");
        }

        self.sink.clear().await;

        let mut artifact = None;
        if let Some(session) = capture.as_mut() {
            match session.stop().await {
                Ok(stopped) => artifact = stopped,
                Err(e) => {
                    error!(error = %e, "capture finalization failed");
                    error.get_or_insert(ReelError::Capture(e));
                }
            }
        }

        self.status.set(EditorStatus::Idle);
        let elapsed = started.elapsed();
        info!(
            playback.frames = frames_shown,
            elapsed_ms = elapsed.as_millis() as u64,
            recorded = artifact.is_some(),
            "playback finished"
        );

        PlaybackOutcome::Finished(PlaybackReport {
            frames_shown,
            elapsed,
            artifact,
            error,
        })
    }

    async fn run(
        &self,
        options: &PlaybackOptions,
        capture: Option<&mut CaptureSession>,
        frames_shown: &mut usize,
    ) -> Result<()> {
        if let Some(session) = capture {
            session.start().await?;
        }
        sleep(options.settle_delay).await;

        let order = self.timeline.order();
        for id in &order {
            let code = self.read_step(id, options.step_timeout).await?;
            self.sink.show(&trim_lines(&code, options.max_lines)).await;
            *frames_shown += 1;
            sleep(options.interval).await;
        }

        // Let the final slide linger before teardown
        sleep(options.interval).await;
        Ok(())
    }

    async fn read_step(&self, id: &SlideId, limit: Option<Duration>) -> Result<String> {
        let read = self.timeline.read_text(id);
        match limit {
            Some(limit) => timeout(limit, read)
                .await
                .map_err(|_| ReelError::StepTimeout {
                    slide: id.clone(),
                    timeout: limit,
                })?,
            None => read.await,
        }
    }
}

/// Keep at most `max_lines` lines of `code`.
pub fn trim_lines(code: &str, max_lines: usize) -> String {
    code.split('\n').take(max_lines).collect::<Vec<_>>().join("\n")
}
