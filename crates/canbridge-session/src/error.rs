/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Failed to set up the session socket.
    #[error("failed to open session on {addr}: {source}")]
    Open {
        addr: std::net::SocketAddrV4,
        source: std::io::Error,
    },

    /// Failed to start the inbound receive thread.
    #[error("failed to start receive thread: {0}")]
    Spawn(std::io::Error),

    /// An I/O error occurred while sending.
    #[error("session I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Envelope encoding/decoding error.
    #[error("frame error: {0}")]
    Frame(#[from] canbridge_frame::FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The session has been stopped.
    #[error("session stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, SessionError>;
