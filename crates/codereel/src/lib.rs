//! codereel: author a sequence of code snippets, play them back as an
//! animated timeline and optionally record the playback.
//!
//! The pieces, bottom-up:
//! - [`buffer`]: the contract with whoever owns text buffers
//! - [`timeline`] / [`manager`]: slide identities kept 1:1 with buffers, persisted to a project store
//! - [`capture`] / [`playback`]: the timed walk over slides, mirrored into a screen capture
//! - [`session`]: wiring plus settings, status, autosave and asset loading

pub mod assets;
pub mod autosave;
pub mod buffer;
pub mod capture;
pub mod error;
pub mod manager;
pub mod playback;
pub mod session;
pub mod settings;
pub mod status;
pub mod telemetry;
pub mod timeline;

pub use assets::{AssetSource, CdnAssetSource};
pub use autosave::{Autosaver, Saver};
pub use buffer::{BufferError, BufferHandle, BufferHost, BufferUri, MemoryBuffers};
pub use capture::{
    Artifact, CaptureError, CaptureHandle, CaptureHost, CaptureOptions, CapturePhase,
    CaptureSession, CaptureTarget, DirectoryDownloads, DownloadSink, Region,
};
pub use error::{ReelError, Result};
pub use manager::{TimelineManager, TimelineSnapshot};
pub use playback::{
    DisplaySink, Frame, FrameKind, PlaybackOptions, PlaybackOutcome, PlaybackReport, Player,
    RecordingSink,
};
pub use session::{Session, SessionParts};
pub use settings::{Settings, SettingsState};
pub use status::{EditorStatus, StatusBoard};
pub use timeline::{DehydratedSlide, Slide, SlideId, Timeline};
