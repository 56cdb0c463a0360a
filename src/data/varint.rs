//! Unsigned LEB128 varints
//!
//! 7 data bits per byte, high bit set on every byte except the last.
//! Lengths in a record header use at most 5 bytes (a full `u32`);
//! batch sequence numbers use up to 10 (a full `u64`).

use bytes::BufMut;

use crate::error::{CaskError, Result};

/// Longest encoding of a `u32`
pub const MAX_VARINT_LEN_U32: usize = 5;

/// Longest encoding of a `u64`
pub const MAX_VARINT_LEN_U64: usize = 10;

/// Append `value` to `buf` as a varint
pub fn encode_varint(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;

        if value != 0 {
            byte |= 0x80; // Set continuation bit
        }

        buf.put_u8(byte);

        if value == 0 {
            break;
        }
    }
}

/// Number of bytes `encode_varint` writes for `value`
pub fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Decode a varint from the front of `buf`, reading at most `max_len` bytes
///
/// Returns:
/// - `Ok(Some((value, bytes_read)))`: a complete varint
/// - `Ok(None)`: `buf` ends before the varint does
/// - `Err(Corrupted)`: the varint runs longer than `max_len`
pub fn decode_varint(buf: &[u8], max_len: usize) -> Result<Option<(u64, usize)>> {
    let mut value: u64 = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if i >= max_len {
            return Err(CaskError::Corrupted(format!(
                "varint longer than {} bytes",
                max_len
            )));
        }

        value |= ((byte & 0x7F) as u64) << (7 * i);

        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
    }

    if buf.len() >= max_len {
        return Err(CaskError::Corrupted(format!(
            "varint longer than {} bytes",
            max_len
        )));
    }
    Ok(None)
}
