//! Record Codec
//!
//! On-disk framing of a single record in a segment data file.
//!
//! ## Frame Format
//! ```text
//! ┌──────────────────┬─────────────────────────────┐
//! │ Len: u16 LE (2)  │         Payload             │
//! └──────────────────┴─────────────────────────────┘
//! ```
//!
//! The index gives readers the exact byte extent of a frame, so the length
//! prefix is only consulted by recovery and by the consistency check.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{LogError, Result};

/// Size of the length prefix
pub const HEADER_SIZE: usize = 2;

/// Largest payload a frame can carry
pub const MAX_RECORD_SIZE: usize = u16::MAX as usize;

/// Encoded size of a payload of `payload_len` bytes
pub fn frame_len(payload_len: usize) -> usize {
    HEADER_SIZE + payload_len
}

/// Frame a payload: `[u16 LE length][payload]`
pub fn encode(payload: &[u8]) -> Result<Bytes> {
    if payload.len() > MAX_RECORD_SIZE {
        return Err(LogError::RecordTooLarge {
            size: payload.len(),
            max: MAX_RECORD_SIZE,
        });
    }

    let mut buf = BytesMut::with_capacity(frame_len(payload.len()));
    buf.put_u16_le(payload.len() as u16);
    buf.put_slice(payload);

    Ok(buf.freeze())
}

/// Strip the framing from a frame whose exact extent is already known
pub fn decode(frame: &[u8]) -> Result<&[u8]> {
    let declared = read_len(frame).ok_or_else(|| {
        LogError::CorruptRecord(format!("frame of {} bytes has no header", frame.len()))
    })?;

    let payload = &frame[HEADER_SIZE..];
    if payload.len() != declared {
        return Err(LogError::CorruptRecord(format!(
            "length prefix says {} bytes, frame holds {}",
            declared,
            payload.len()
        )));
    }

    Ok(payload)
}

/// Read the payload length from the start of a frame
pub fn read_len(frame: &[u8]) -> Option<usize> {
    let header: [u8; HEADER_SIZE] = frame.get(..HEADER_SIZE)?.try_into().ok()?;
    Some(u16::from_le_bytes(header) as usize)
}
