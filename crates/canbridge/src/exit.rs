use std::fmt;
use std::io;

use canbridge_frame::FrameError;
use canbridge_recorder::RecorderError;
use canbridge_session::SessionError;
use canbridge_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

/// Channel setup and readiness failures all exit with the transport code.
pub fn transport_error(context: &str, err: TransportError) -> CliError {
    CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed => {
            CliError::new(DATA_INVALID, format!("{context}: truncated envelope"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Open { .. } | SessionError::Io(_) => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Json(err) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn recorder_error(context: &str, err: RecorderError) -> CliError {
    match err {
        RecorderError::Open { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
        RecorderError::Frame(err) => frame_error(context, err),
        RecorderError::SinkClosed => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_errors_map_to_transport_code() {
        let err = TransportError::Resolve {
            device: "vcan9".to_string(),
            source: io::Error::from_raw_os_error(19),
        };
        let cli = transport_error("channel setup failed", err);
        assert_eq!(cli.code, TRANSPORT_ERROR);
        assert!(cli.message.contains("vcan9"));
    }

    #[test]
    fn truncated_recording_is_data_invalid() {
        let cli = frame_error("read failed", FrameError::ConnectionClosed);
        assert_eq!(cli.code, DATA_INVALID);
        assert!(cli.message.contains("truncated"));
    }

    #[test]
    fn recording_open_failure_is_plain_failure() {
        let err = RecorderError::Open {
            path: "/nope/x.rec".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(recorder_error("recording", err).code, FAILURE);
    }
}
