use bytes::{Buf, BufMut, BytesMut};

use crate::envelope::Envelope;
use crate::error::{FrameError, Result};
use crate::timestamp::TimeStamp;

/// Envelope header: magic (2) + body length (4) + data type (4) = 10 bytes.
pub const HEADER_SIZE: usize = 10;

/// Fixed body fields: sent (12) + sample time (12) + sender stamp (4).
pub const BODY_FIXED_SIZE: usize = 28;

/// Magic bytes: "CB" (0x43 0x42).
pub const MAGIC: [u8; 2] = [0x43, 0x42];

/// Default maximum body size: 1 MiB.
pub const DEFAULT_MAX_BODY: usize = 1024 * 1024;

/// Encode an envelope into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬───────────┬───────────┬────────────┬────────────┬─────────┬─────────┐
/// │ Magic     │ Body len  │ Data type │ Sent       │ Sample     │ Sender  │ Payload │
/// │ "CB" (2B) │ (4B LE)   │ (4B LE)   │ (8B+4B LE) │ (8B+4B LE) │ (4B LE) │         │
/// └───────────┴───────────┴───────────┴────────────┴────────────┴─────────┴─────────┘
/// ```
pub fn encode_envelope(envelope: &Envelope, dst: &mut BytesMut) -> Result<()> {
    let body_len = BODY_FIXED_SIZE + envelope.payload.len();
    if body_len > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: body_len,
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + body_len);
    dst.put_slice(&MAGIC);
    dst.put_u32_le(body_len as u32);
    dst.put_i32_le(envelope.data_type);
    put_timestamp(dst, envelope.sent);
    put_timestamp(dst, envelope.sample_time);
    dst.put_u32_le(envelope.sender_stamp);
    dst.put_slice(&envelope.payload);
    Ok(())
}

/// Decode an envelope from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete envelope yet.
/// On success, consumes the envelope bytes from the buffer.
pub fn decode_envelope(src: &mut BytesMut, max_body: usize) -> Result<Option<Envelope>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let mut header = &src[2..HEADER_SIZE];
    let body_len = header.get_u32_le() as usize;
    let data_type = header.get_i32_le();

    if body_len > max_body {
        return Err(FrameError::PayloadTooLarge {
            size: body_len,
            max: max_body,
        });
    }
    if body_len < BODY_FIXED_SIZE {
        return Err(FrameError::BodyTooShort {
            size: body_len,
            min: BODY_FIXED_SIZE,
        });
    }

    if src.len() < HEADER_SIZE + body_len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let mut body = src.split_to(body_len);
    let sent = get_timestamp(&mut body);
    let sample_time = get_timestamp(&mut body);
    let sender_stamp = body.get_u32_le();

    Ok(Some(Envelope {
        data_type,
        payload: body.freeze(),
        sent,
        sample_time,
        sender_stamp,
    }))
}

fn put_timestamp(dst: &mut BytesMut, ts: TimeStamp) {
    dst.put_i64_le(ts.seconds);
    dst.put_i32_le(ts.microseconds);
}

fn get_timestamp(src: &mut BytesMut) -> TimeStamp {
    let seconds = src.get_i64_le();
    let microseconds = src.get_i32_le();
    TimeStamp::new(seconds, microseconds)
}

/// Configuration for the envelope codec.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Maximum body size in bytes. Default: 1 MiB.
    pub max_body_size: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY,
        }
    }
}
