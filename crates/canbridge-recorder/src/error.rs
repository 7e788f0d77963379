use std::path::PathBuf;

/// Errors that can occur while recording.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// Failed to create or truncate the recording file.
    #[error("failed to create {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write an envelope to the recording.
    #[error("recording write failed: {0}")]
    Frame(#[from] canbridge_frame::FrameError),

    /// The sink has already been closed.
    #[error("recording sink is closed")]
    SinkClosed,
}

pub type Result<T> = std::result::Result<T, RecorderError>;
