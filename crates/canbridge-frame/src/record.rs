use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::timestamp::TimeStamp;

/// Size of a raw classic CAN frame as read from the socket.
pub const RAW_FRAME_LEN: usize = 16;

/// Maximum payload bytes in a classic CAN frame.
pub const MAX_DATA_LEN: usize = 8;

/// Serialized record: id (4) + length (1) + data (8).
pub const RECORD_WIRE_SIZE: usize = 13;

/// One decoded CAN frame.
///
/// Payload bytes past `length` are always zero, so [`FrameRecord::data`] is
/// deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRecord {
    pub can_id: u32,
    pub length: u8,
    pub payload: [u8; MAX_DATA_LEN],
    pub capture_time: TimeStamp,
}

impl FrameRecord {
    /// Build a record from payload bytes; anything past 8 bytes is dropped.
    pub fn new(can_id: u32, data: &[u8], capture_time: TimeStamp) -> Self {
        let length = data.len().min(MAX_DATA_LEN);
        let mut payload = [0u8; MAX_DATA_LEN];
        payload[..length].copy_from_slice(&data[..length]);
        Self {
            can_id,
            length: length as u8,
            payload,
            capture_time,
        }
    }

    /// Payload packed into a `u64`, see [`pack_payload`].
    pub fn data(&self) -> u64 {
        pack_payload(&self.payload)
    }

    /// The valid payload bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.payload[..usize::from(self.length)]
    }

    /// Serialize as `can_id u32 LE | length u8 | data u64 LE`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(RECORD_WIRE_SIZE);
        dst.put_u32_le(self.can_id);
        dst.put_u8(self.length);
        dst.put_u64_le(self.data());
    }

    /// Parse a serialized record. The capture time travels outside the record
    /// (as the envelope's sample time), so it is supplied by the caller.
    pub fn decode(mut src: &[u8], capture_time: TimeStamp) -> Result<Self> {
        if src.len() != RECORD_WIRE_SIZE {
            return Err(FrameError::MalformedRecord(format!(
                "expected {RECORD_WIRE_SIZE} bytes, got {}",
                src.len()
            )));
        }
        let can_id = src.get_u32_le();
        let length = src.get_u8();
        let data = src.get_u64_le();
        if usize::from(length) > MAX_DATA_LEN {
            return Err(FrameError::MalformedRecord(format!(
                "length {length} exceeds {MAX_DATA_LEN}"
            )));
        }
        Ok(Self::new(
            can_id,
            &data.to_le_bytes()[..usize::from(length)],
            capture_time,
        ))
    }
}

/// Decode a raw `struct can_frame` read from a CAN socket.
///
/// The identifier is in host byte order, as the kernel writes it. A length
/// above 8 is clamped to 8.
pub fn decode_frame(raw: &[u8; RAW_FRAME_LEN], capture_time: TimeStamp) -> FrameRecord {
    let can_id = u32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]]);
    let length = usize::from(raw[4]).min(MAX_DATA_LEN);
    FrameRecord::new(can_id, &raw[8..8 + length], capture_time)
}

/// Pack 8 payload bytes into a `u64`, first byte least significant.
///
/// A frame of length `L` therefore occupies the low `L` bytes of the value and
/// the high `8 - L` bytes are zero.
pub fn pack_payload(bytes: &[u8; MAX_DATA_LEN]) -> u64 {
    u64::from_le_bytes(*bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(can_id: u32, dlc: u8, data: &[u8]) -> [u8; RAW_FRAME_LEN] {
        let mut buf = [0u8; RAW_FRAME_LEN];
        buf[..4].copy_from_slice(&can_id.to_ne_bytes());
        buf[4] = dlc;
        buf[8..8 + data.len()].copy_from_slice(data);
        buf
    }

    #[test]
    fn decodes_two_byte_frame() {
        let ts = TimeStamp::new(1, 2);
        let record = decode_frame(&raw(0x100, 2, &[0xAA, 0xBB]), ts);
        assert_eq!(record.can_id, 0x100);
        assert_eq!(record.length, 2);
        assert_eq!(record.data(), 0x0000_0000_0000_BBAA);
        assert_eq!(record.bytes(), &[0xAA, 0xBB]);
        assert_eq!(record.capture_time, ts);
    }

    #[test]
    fn empty_frame_packs_to_zero() {
        let record = decode_frame(&raw(0x200, 0, &[]), TimeStamp::default());
        assert_eq!(record.length, 0);
        assert_eq!(record.data(), 0);
    }

    #[test]
    fn bytes_past_length_are_zeroed() {
        // Garbage beyond the DLC must not leak into the packed value.
        let record = decode_frame(
            &raw(0x7FF, 3, &[1, 2, 3, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]),
            TimeStamp::default(),
        );
        assert_eq!(record.payload, [1, 2, 3, 0, 0, 0, 0, 0]);
        assert_eq!(record.data(), 0x03_02_01);
    }

    #[test]
    fn packed_value_occupies_low_bytes_for_every_length() {
        let data = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
        for len in 0..=MAX_DATA_LEN {
            let record = decode_frame(&raw(1, len as u8, &data), TimeStamp::default());
            let expected = data[..len]
                .iter()
                .enumerate()
                .fold(0u64, |acc, (i, b)| acc | (u64::from(*b) << (8 * i)));
            assert_eq!(record.data(), expected, "length {len}");
            if len < MAX_DATA_LEN {
                assert_eq!(record.data() >> (8 * len), 0, "length {len}");
            }
        }
    }

    #[test]
    fn oversized_dlc_is_clamped() {
        let record = decode_frame(&raw(1, 15, &[9; 8]), TimeStamp::default());
        assert_eq!(record.length, 8);
        assert_eq!(record.data(), u64::from_le_bytes([9; 8]));
    }

    #[test]
    fn extended_id_is_kept_opaque() {
        let id = 0x8000_0000 | 0x1234_5678;
        let record = decode_frame(&raw(id, 1, &[1]), TimeStamp::default());
        assert_eq!(record.can_id, id);
    }

    #[test]
    fn encoded_record_layout() {
        let record = FrameRecord::new(0x100, &[0xAA, 0xBB], TimeStamp::default());
        let mut buf = BytesMut::new();
        record.encode(&mut buf);
        assert_eq!(
            &buf[..],
            &[0x00, 0x01, 0x00, 0x00, 2, 0xAA, 0xBB, 0, 0, 0, 0, 0, 0]
        );
        let decoded = FrameRecord::decode(&buf, TimeStamp::new(3, 4)).unwrap();
        assert_eq!(decoded.bytes(), &[0xAA, 0xBB]);
        assert_eq!(decoded.capture_time, TimeStamp::new(3, 4));
    }

    #[test]
    fn decode_rejects_bad_shapes() {
        assert!(matches!(
            FrameRecord::decode(&[0u8; 12], TimeStamp::default()),
            Err(FrameError::MalformedRecord(_))
        ));
        let mut bad_len = [0u8; RECORD_WIRE_SIZE];
        bad_len[4] = 9;
        assert!(matches!(
            FrameRecord::decode(&bad_len, TimeStamp::default()),
            Err(FrameError::MalformedRecord(_))
        ));
    }
}
