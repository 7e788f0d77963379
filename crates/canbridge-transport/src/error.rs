/// Errors that can occur while opening or reading channel endpoints.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to create the raw CAN socket.
    #[error("failed to create socket for {device}: {source}")]
    Socket {
        device: String,
        source: std::io::Error,
    },

    /// Failed to resolve the device name to an interface index.
    #[error("failed to get interface index for {device}: {source}")]
    Resolve {
        device: String,
        source: std::io::Error,
    },

    /// Failed to bind the socket to the interface.
    #[error("failed to bind socket to {device}: {source}")]
    Bind {
        device: String,
        source: std::io::Error,
    },

    /// The readiness wait failed.
    #[error("readiness wait failed: {0}")]
    Poll(std::io::Error),

    /// The kernel has no receive timestamp for the last frame.
    #[error("receive timestamp unavailable: {0}")]
    Timestamp(std::io::Error),

    /// An I/O error occurred on a bound endpoint.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Device name attached to a setup failure, if any.
    pub fn device(&self) -> Option<&str> {
        match self {
            TransportError::Socket { device, .. }
            | TransportError::Resolve { device, .. }
            | TransportError::Bind { device, .. } => Some(device),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
