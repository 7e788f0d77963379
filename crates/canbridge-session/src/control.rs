use canbridge_frame::{Envelope, RECORDER_COMMAND};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Recorder command code: start (or rotate) a recording.
pub const COMMAND_START: u32 = 1;
/// Recorder command code: stop the current recording.
pub const COMMAND_STOP: u32 = 2;

/// Payload of a `RECORDER_COMMAND` envelope.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecorderCommand {
    pub command: u32,
}

/// A recorder command the bridge acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingRequest {
    Start,
    Stop,
}

impl RecorderCommand {
    /// Create a start command.
    pub fn start() -> Self {
        Self {
            command: COMMAND_START,
        }
    }

    /// Create a stop command.
    pub fn stop() -> Self {
        Self {
            command: COMMAND_STOP,
        }
    }

    /// Parse the command carried by an envelope.
    ///
    /// Returns `None` for other data types and for payloads that are not a
    /// recorder command.
    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        if envelope.data_type != RECORDER_COMMAND {
            return None;
        }
        serde_json::from_slice(&envelope.payload).ok()
    }

    /// Wrap this command in an envelope.
    pub fn to_envelope(&self) -> Result<Envelope> {
        let payload = serde_json::to_vec(self)?;
        Ok(Envelope::new(RECORDER_COMMAND, payload))
    }

    /// The action this command requests, if the code is known.
    pub fn request(&self) -> Option<RecordingRequest> {
        match self.command {
            COMMAND_START => Some(RecordingRequest::Start),
            COMMAND_STOP => Some(RecordingRequest::Stop),
            _ => None,
        }
    }
}
