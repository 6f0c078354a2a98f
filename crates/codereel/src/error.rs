use std::time::Duration;

use reelstore::StoreError;
use thiserror::Error;

use crate::buffer::{BufferError, BufferUri};
use crate::capture::CaptureError;
use crate::timeline::SlideId;

pub type Result<T> = std::result::Result<T, ReelError>;

#[derive(Debug, Error)]
pub enum ReelError {
    #[error("project store: {0}")]
    Store(#[from] StoreError),

    #[error("buffer host: {0}")]
    Buffer(#[from] BufferError),

    #[error("capture: {0}")]
    Capture(#[from] CaptureError),

    #[error("reading slide {slide} took longer than {timeout:?}")]
    StepTimeout { slide: SlideId, timeout: Duration },

    #[error("no live buffer for slide {slide} at {uri}")]
    MissingBuffer { slide: SlideId, uri: BufferUri },

    #[error("slide {0} is not in the timeline")]
    UnknownSlide(SlideId),
}

impl ReelError {
    /// Failures worth retrying on the next attempt without user intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReelError::Store(e) => matches!(e, StoreError::Io { .. } | StoreError::Unavailable(_)),
            ReelError::StepTimeout { .. } => true,
            _ => false,
        }
    }
}
