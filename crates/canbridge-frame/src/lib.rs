//! CAN frame records and the envelope format shared by recordings and the
//! pub/sub session.
//!
//! Every envelope on disk or on the wire is framed with:
//! - A 2-byte magic number ("CB") for stream synchronization
//! - A 4-byte little-endian body length
//! - A 4-byte little-endian data type
//!
//! followed by the send/sample timestamps, the sender stamp and the payload.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod reader;
pub mod record;
pub mod timestamp;
pub mod writer;

pub use codec::{
    decode_envelope, encode_envelope, CodecConfig, BODY_FIXED_SIZE, DEFAULT_MAX_BODY, HEADER_SIZE,
};
pub use envelope::{data_type_name, Envelope, RAW_CAN_FRAME, RECORDER_COMMAND};
pub use error::{FrameError, Result};
pub use reader::EnvelopeReader;
pub use record::{decode_frame, pack_payload, FrameRecord, MAX_DATA_LEN, RAW_FRAME_LEN};
pub use timestamp::TimeStamp;
pub use writer::EnvelopeWriter;
