use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Frame start marker on the wire.
pub const START_BYTE: u8 = 0xD5;

/// Maximum number of content bytes in one frame (the length field is one byte).
pub const MAX_CONTENT: usize = 255;

/// CRC-8 feedback polynomial (Dallas/Maxim, LSB-first).
pub const CRC8_POLY: u8 = 0x8C;

/// Frame overhead: start byte + length byte + trailing CRC.
pub const FRAME_OVERHEAD: usize = 3;

/// Delivery result attached to every received packet.
///
/// The discriminants are the firmware's wire/contract values and must not be
/// renumbered. `NoResponse` is host-side only: it marks a solicited read that
/// timed out before a frame completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ResultCode {
    GenericError = 0,
    Ok = 1,
    BufferOverflow = 2,
    CrcMismatch = 3,
    PacketTooBig = 4,
    CommandUnsupported = 5,
    NoResponse = 10_000,
}

impl ResultCode {
    /// The numeric contract value for this code.
    pub fn value(self) -> u16 {
        self as u16
    }
}

/// Fold one byte into a running CRC-8 (poly 0x8C, LSB-first).
pub fn crc8_update(mut crc: u8, byte: u8) -> u8 {
    crc ^= byte;
    for _ in 0..8 {
        if crc & 0x01 != 0 {
            crc = (crc >> 1) ^ CRC8_POLY;
        } else {
            crc >>= 1;
        }
    }
    crc
}

/// One protocol message: content bytes, running checksum, delivery result,
/// and an optional trailing correlation byte.
///
/// The checksum is maintained incrementally by the append operations and is
/// never recomputed over the whole content, so content is append-only.
#[derive(Debug, Clone)]
pub struct Packet {
    content: Vec<u8>,
    crc: u8,
    /// Delivery result; `Ok` on construction, set by the framer on receive.
    pub result: ResultCode,
    /// Trailing correlation byte, extracted on receive when the decoded
    /// content is longer than one byte. Currently produced but not consumed
    /// by the FIFO pipeline; preserved for a future out-of-order pipeline.
    pub tag: Option<u8>,
}

impl Default for Packet {
    fn default() -> Self {
        Self::new()
    }
}

impl Packet {
    /// Create an empty packet with `result = Ok` and no tag.
    pub fn new() -> Self {
        Self {
            content: Vec::new(),
            crc: 0,
            result: ResultCode::Ok,
            tag: None,
        }
    }

    /// Append one byte, folding it into the running CRC.
    ///
    /// Refuses the append (content unchanged) once the wire limit of 255
    /// content bytes is reached.
    pub fn push_u8(&mut self, byte: u8) -> Result<()> {
        if self.content.len() >= MAX_CONTENT {
            return Err(FrameError::PacketTooBig {
                len: self.content.len() + 1,
                max: MAX_CONTENT,
            });
        }
        self.content.push(byte);
        self.crc = crc8_update(self.crc, byte);
        Ok(())
    }

    /// Append a 16-bit value, little-endian, through [`push_u8`](Self::push_u8).
    pub fn push_u16(&mut self, value: u16) -> Result<()> {
        self.push_u8((value & 0xFF) as u8)?;
        self.push_u8((value >> 8) as u8)
    }

    /// Append a 32-bit value, little-endian, through [`push_u8`](Self::push_u8).
    pub fn push_u32(&mut self, value: u32) -> Result<()> {
        self.push_u16((value & 0xFFFF) as u16)?;
        self.push_u16((value >> 16) as u16)
    }

    /// Byte at `idx`, or 0 when out of range.
    ///
    /// Lenient by contract: status replies may be shorter than the fields a
    /// caller probes for.
    pub fn u8_at(&self, idx: usize) -> u8 {
        self.content.get(idx).copied().unwrap_or(0)
    }

    /// Little-endian u16 at byte offset `idx`, zero-filled out of range.
    pub fn u16_at(&self, idx: usize) -> u16 {
        u16::from(self.u8_at(idx + 1)) << 8 | u16::from(self.u8_at(idx))
    }

    /// Little-endian u32 at byte offset `idx`, zero-filled out of range.
    pub fn u32_at(&self, idx: usize) -> u32 {
        u32::from(self.u16_at(idx + 2)) << 16 | u32::from(self.u16_at(idx))
    }

    /// The content bytes as built so far.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Number of content bytes.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether the packet has no content bytes.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// The running CRC over the content as appended.
    pub fn crc(&self) -> u8 {
        self.crc
    }

    /// Move the last content byte into `tag`.
    ///
    /// Wire convention on receive: a decoded content longer than one byte
    /// carries a trailing correlation byte. The CRC already covered the full
    /// wire content, so the running checksum is left untouched.
    pub(crate) fn extract_tag(&mut self) {
        if self.content.len() > 1 {
            self.tag = self.content.pop();
        }
    }
}

/// Encode a packet into the wire format.
///
/// ```text
/// ┌────────────┬───────────┬──────────────────┬─────────┐
/// │ Start (1B) │ Length    │ Content          │ CRC     │
/// │ 0xD5       │ (1B)      │ (Length bytes)   │ (1B)    │
/// └────────────┴───────────┴──────────────────┴─────────┘
/// ```
///
/// Outgoing packets transmit the content exactly as built; the tag
/// convention applies to receive only.
pub fn encode_packet(packet: &Packet, dst: &mut BytesMut) {
    dst.reserve(FRAME_OVERHEAD + packet.len());
    dst.put_u8(START_BYTE);
    dst.put_u8(packet.len() as u8);
    dst.put_slice(packet.content());
    dst.put_u8(packet.crc());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_codes_keep_contract_values() {
        assert_eq!(ResultCode::GenericError.value(), 0);
        assert_eq!(ResultCode::Ok.value(), 1);
        assert_eq!(ResultCode::BufferOverflow.value(), 2);
        assert_eq!(ResultCode::CrcMismatch.value(), 3);
        assert_eq!(ResultCode::PacketTooBig.value(), 4);
        assert_eq!(ResultCode::CommandUnsupported.value(), 5);
        assert_eq!(ResultCode::NoResponse.value(), 10_000);
    }

    #[test]
    fn push_u8_updates_running_crc() {
        let mut packet = Packet::new();
        packet.push_u8(0x5B).unwrap();

        let mut expected = crc8_update(0, 0x5B);
        assert_eq!(packet.crc(), expected);

        packet.push_u8(0x01).unwrap();
        expected = crc8_update(expected, 0x01);
        assert_eq!(packet.crc(), expected);
    }

    #[test]
    fn push_u16_is_little_endian() {
        let mut packet = Packet::new();
        packet.push_u16(0x1234).unwrap();
        assert_eq!(packet.content(), &[0x34, 0x12]);
        assert_eq!(packet.u16_at(0), 0x1234);
    }

    #[test]
    fn push_u32_is_little_endian() {
        let mut packet = Packet::new();
        packet.push_u32(0xDEAD_BEEF).unwrap();
        assert_eq!(packet.content(), &[0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(packet.u32_at(0), 0xDEAD_BEEF);
    }

    #[test]
    fn reads_past_end_are_zero() {
        let mut packet = Packet::new();
        packet.push_u8(0x42).unwrap();

        assert_eq!(packet.u8_at(5), 0);
        assert_eq!(packet.u16_at(0), 0x42); // high byte out of range -> 0
        assert_eq!(packet.u32_at(10), 0);
    }

    #[test]
    fn append_refused_at_wire_limit() {
        let mut packet = Packet::new();
        for i in 0..MAX_CONTENT {
            packet.push_u8(i as u8).unwrap();
        }
        let crc_before = packet.crc();

        let err = packet.push_u8(0xFF).unwrap_err();
        assert!(matches!(err, FrameError::PacketTooBig { .. }));
        assert_eq!(packet.len(), MAX_CONTENT);
        assert_eq!(packet.crc(), crc_before);
    }

    #[test]
    fn encode_produces_start_length_content_crc() {
        let mut packet = Packet::new();
        packet.push_u8(0x5B).unwrap();

        let mut wire = BytesMut::new();
        encode_packet(&packet, &mut wire);

        assert_eq!(wire[0], START_BYTE);
        assert_eq!(wire[1], 1);
        assert_eq!(wire[2], 0x5B);
        assert_eq!(wire[3], packet.crc());
    }

    #[test]
    fn encode_empty_packet() {
        let packet = Packet::new();
        let mut wire = BytesMut::new();
        encode_packet(&packet, &mut wire);
        assert_eq!(wire.as_ref(), &[START_BYTE, 0, 0]);
    }
}
