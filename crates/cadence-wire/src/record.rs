//! The channel record format
//!
//! A wire buffer is a repeated sequence of
//! `[4-byte channel key][u16 length][payload]`, big-endian, no padding.
//! The length makes every record skippable even when its destination has
//! no local channel end.

use bytes::{BufMut, BytesMut};

use cadence_core::{CadenceError, CadenceResult, GlobalId};

/// Encoded channel key size.
pub const KEY_SIZE: usize = GlobalId::WIRE_SIZE;

/// Encoded payload-length size.
pub const LENGTH_SIZE: usize = 2;

/// Bytes before the payload of every record.
pub const RECORD_HEADER_SIZE: usize = KEY_SIZE + LENGTH_SIZE;

/// Append one record to a buffer under construction.
pub fn write_record(buf: &mut BytesMut, key: GlobalId, payload: &[u8]) -> CadenceResult<()> {
    if payload.len() > u16::MAX as usize {
        return Err(CadenceError::RecordTooLarge(payload.len()));
    }
    buf.put_slice(&key.to_bytes());
    buf.put_u16(payload.len() as u16);
    buf.put_slice(payload);
    Ok(())
}
