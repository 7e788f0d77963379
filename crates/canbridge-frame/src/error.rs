/// Errors that can occur during record and envelope encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The envelope header contains an invalid magic number.
    #[error("invalid envelope magic (expected 0x4342 \"CB\")")]
    InvalidMagic,

    /// The body exceeds the configured maximum size.
    #[error("envelope body too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The body is too short to hold the fixed envelope fields.
    #[error("envelope body too short ({size} bytes, min {min})")]
    BodyTooShort { size: usize, min: usize },

    /// A serialized frame record has the wrong shape.
    #[error("malformed frame record: {0}")]
    MalformedRecord(String),

    /// The envelope carries a different data type than expected.
    #[error("unexpected data type {actual} (expected {expected})")]
    UnexpectedType { expected: i32, actual: i32 },

    /// An I/O error occurred while reading or writing envelopes.
    #[error("envelope I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete envelope was received.
    #[error("stream closed (incomplete envelope)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
