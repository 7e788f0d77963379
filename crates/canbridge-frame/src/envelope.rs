use bytes::{Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::record::FrameRecord;
use crate::timestamp::TimeStamp;

/// Data type of recording start/stop commands.
pub const RECORDER_COMMAND: i32 = 11;

/// Data type of a serialized [`FrameRecord`].
pub const RAW_CAN_FRAME: i32 = 1091;

/// The unit persisted to recordings and exchanged with the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub data_type: i32,
    pub payload: Bytes,
    pub sent: TimeStamp,
    pub sample_time: TimeStamp,
    pub sender_stamp: u32,
}

impl Envelope {
    /// Create an envelope sent now, sampled now, from sender 0.
    pub fn new(data_type: i32, payload: impl Into<Bytes>) -> Self {
        let now = TimeStamp::now();
        Self {
            data_type,
            payload: payload.into(),
            sent: now,
            sample_time: now,
            sender_stamp: 0,
        }
    }

    /// Wrap a frame record; the capture time becomes the sample time.
    pub fn from_frame(record: &FrameRecord, sender_stamp: u32) -> Self {
        let mut payload = BytesMut::new();
        record.encode(&mut payload);
        Self {
            data_type: RAW_CAN_FRAME,
            payload: payload.freeze(),
            sent: TimeStamp::now(),
            sample_time: record.capture_time,
            sender_stamp,
        }
    }

    pub fn with_sample_time(mut self, sample_time: TimeStamp) -> Self {
        self.sample_time = sample_time;
        self
    }

    pub fn with_sent(mut self, sent: TimeStamp) -> Self {
        self.sent = sent;
        self
    }

    pub fn with_sender_stamp(mut self, sender_stamp: u32) -> Self {
        self.sender_stamp = sender_stamp;
        self
    }

    /// Decode the payload as a frame record.
    pub fn frame_record(&self) -> Result<FrameRecord> {
        if self.data_type != RAW_CAN_FRAME {
            return Err(FrameError::UnexpectedType {
                expected: RAW_CAN_FRAME,
                actual: self.data_type,
            });
        }
        FrameRecord::decode(&self.payload, self.sample_time)
    }
}

/// Human-readable name for a data type.
pub fn data_type_name(data_type: i32) -> &'static str {
    match data_type {
        RECORDER_COMMAND => "RecorderCommand",
        RAW_CAN_FRAME => "RawCANFrame",
        _ => "Unknown",
    }
}
