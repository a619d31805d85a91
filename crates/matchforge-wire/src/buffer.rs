//! The fixed-capacity packet buffer with a seek cursor.
//!
//! The client engine reads and writes messages against a fixed-size byte
//! buffer, so the server does the same: every message is built into (and
//! decoded from) a [`FRAME_LEN`]-byte buffer, and exactly one full frame
//! travels per message. Unused tail bytes are zero padding.
//!
//! Integers are little-endian `u16`. Strings are a `u16` byte-length
//! prefix followed by that many ASCII bytes.

use crate::WireError;

/// Size of every frame on the wire, in bytes.
///
/// The writer sends exactly this many bytes per message and the reader
/// consumes exactly this many, which makes framing unambiguous even when
/// TCP coalesces or splits segments.
pub const FRAME_LEN: usize = 1024;

/// A fixed-capacity byte buffer with a cursor.
///
/// Writes advance the cursor and fail with [`WireError::Overflow`] instead
/// of growing the buffer; reads fail with [`WireError::Underflow`] instead
/// of reading padding as data. `Clone` is cheap enough for broadcast use —
/// one frame is copied per recipient.
#[derive(Debug, Clone)]
pub struct PacketBuffer {
    bytes: Box<[u8; FRAME_LEN]>,
    cursor: usize,
}

impl PacketBuffer {
    /// Creates a zeroed frame with the cursor at the start.
    pub fn new() -> Self {
        Self {
            bytes: Box::new([0u8; FRAME_LEN]),
            cursor: 0,
        }
    }

    /// Wraps one received frame for decoding. The cursor starts at 0.
    ///
    /// # Errors
    /// Returns [`WireError::Underflow`] if `frame` is shorter than
    /// [`FRAME_LEN`]; a short read means the peer died mid-frame.
    pub fn from_frame(frame: &[u8]) -> Result<Self, WireError> {
        if frame.len() < FRAME_LEN {
            return Err(WireError::Underflow {
                at: 0,
                wanted: FRAME_LEN,
                len: frame.len(),
            });
        }
        let mut bytes = Box::new([0u8; FRAME_LEN]);
        bytes.copy_from_slice(&frame[..FRAME_LEN]);
        Ok(Self { bytes, cursor: 0 })
    }

    /// Moves the cursor to an absolute offset.
    pub fn seek(&mut self, pos: usize) {
        self.cursor = pos.min(FRAME_LEN);
    }

    /// Current cursor position (number of meaningful bytes after writing).
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The full padded frame, ready to hand to the transport.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..]
    }

    /// Writes a little-endian `u16` at the cursor.
    pub fn write_u16(&mut self, value: u16) -> Result<(), WireError> {
        let end = self.checked_end(2, true)?;
        self.bytes[self.cursor..end].copy_from_slice(&value.to_le_bytes());
        self.cursor = end;
        Ok(())
    }

    /// Reads a little-endian `u16` at the cursor.
    pub fn read_u16(&mut self) -> Result<u16, WireError> {
        let end = self.checked_end(2, false)?;
        let value = u16::from_le_bytes([self.bytes[self.cursor], self.bytes[self.cursor + 1]]);
        self.cursor = end;
        Ok(value)
    }

    /// Writes a length-prefixed ASCII string at the cursor.
    ///
    /// # Errors
    /// [`WireError::NotAscii`] if `value` contains non-ASCII characters,
    /// [`WireError::Overflow`] if the prefix plus bytes don't fit.
    pub fn write_str(&mut self, value: &str) -> Result<(), WireError> {
        if !value.is_ascii() {
            return Err(WireError::NotAscii);
        }
        let data = value.as_bytes();
        self.write_u16(data.len() as u16)?;
        let end = self.checked_end(data.len(), true)?;
        self.bytes[self.cursor..end].copy_from_slice(data);
        self.cursor = end;
        Ok(())
    }

    /// Reads a length-prefixed ASCII string at the cursor.
    pub fn read_str(&mut self) -> Result<String, WireError> {
        let len = self.read_u16()? as usize;
        let end = self.checked_end(len, false)?;
        let data = &self.bytes[self.cursor..end];
        if !data.is_ascii() {
            return Err(WireError::NotAscii);
        }
        // ASCII is valid UTF-8, checked just above.
        let value = String::from_utf8_lossy(data).into_owned();
        self.cursor = end;
        Ok(value)
    }

    fn checked_end(&self, wanted: usize, writing: bool) -> Result<usize, WireError> {
        let end = self.cursor + wanted;
        if end > FRAME_LEN {
            return Err(if writing {
                WireError::Overflow {
                    at: self.cursor,
                    wanted,
                    len: FRAME_LEN,
                }
            } else {
                WireError::Underflow {
                    at: self.cursor,
                    wanted,
                    len: FRAME_LEN,
                }
            });
        }
        Ok(end)
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_u16_read_u16_round_trip() {
        let mut buf = PacketBuffer::new();
        buf.write_u16(254).unwrap();
        buf.write_u16(0xBEEF).unwrap();

        buf.seek(0);
        assert_eq!(buf.read_u16().unwrap(), 254);
        assert_eq!(buf.read_u16().unwrap(), 0xBEEF);
    }

    #[test]
    fn test_u16_is_little_endian() {
        let mut buf = PacketBuffer::new();
        buf.write_u16(0x0102).unwrap();
        assert_eq!(&buf.as_bytes()[..2], &[0x02, 0x01]);
    }

    #[test]
    fn test_write_str_read_str_round_trip() {
        let mut buf = PacketBuffer::new();
        buf.write_str("192.168.1.10").unwrap();
        buf.write_str("6510").unwrap();

        buf.seek(0);
        assert_eq!(buf.read_str().unwrap(), "192.168.1.10");
        assert_eq!(buf.read_str().unwrap(), "6510");
    }

    #[test]
    fn test_write_str_rejects_non_ascii() {
        let mut buf = PacketBuffer::new();
        let result = buf.write_str("héllo");
        assert!(matches!(result, Err(WireError::NotAscii)));
    }

    #[test]
    fn test_write_u16_past_end_overflows() {
        let mut buf = PacketBuffer::new();
        buf.seek(FRAME_LEN - 1);
        let result = buf.write_u16(1);
        assert!(matches!(result, Err(WireError::Overflow { .. })));
    }

    #[test]
    fn test_read_str_with_bogus_length_underflows() {
        // A length prefix larger than the remaining frame must not panic.
        let mut buf = PacketBuffer::new();
        buf.write_u16(u16::MAX).unwrap();
        buf.seek(0);
        let result = buf.read_str();
        assert!(matches!(result, Err(WireError::Underflow { .. })));
    }

    #[test]
    fn test_from_frame_requires_full_frame() {
        let short = vec![0u8; FRAME_LEN - 1];
        assert!(PacketBuffer::from_frame(&short).is_err());

        let full = vec![0u8; FRAME_LEN];
        assert!(PacketBuffer::from_frame(&full).is_ok());
    }

    #[test]
    fn test_seek_rewinds_for_reuse() {
        let mut buf = PacketBuffer::new();
        buf.write_u16(11).unwrap();
        buf.seek(0);
        buf.write_u16(14).unwrap();
        buf.seek(0);
        assert_eq!(buf.read_u16().unwrap(), 14);
    }

    #[test]
    fn test_unwritten_tail_is_zero_padding() {
        let mut buf = PacketBuffer::new();
        buf.write_u16(4).unwrap();
        assert!(buf.as_bytes()[2..].iter().all(|&b| b == 0));
        assert_eq!(buf.as_bytes().len(), FRAME_LEN);
    }
}
