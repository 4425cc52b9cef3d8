//! Variable-length integers
//!
//! BER-style encoding of field lengths: 7-bit groups, most significant group
//! first, continuation bit (0x80) set on every byte except the last.
//!
//! ```text
//! 0x7f        -> 7f
//! 0x80        -> 81 00
//! 0x3fff      -> ff 7f
//! 0xffffffff  -> 8f ff ff ff 7f
//! ```

use bytes::BufMut;

use crate::error::{ConnectorError, Result};

/// Longest encoding of a u32
pub const MAX_VARINT_LEN: usize = 5;

/// Number of bytes `value` occupies once encoded
pub fn varint_size(value: u32) -> usize {
    match value {
        0..=0x7f => 1,
        0x80..=0x3fff => 2,
        0x4000..=0x1f_ffff => 3,
        0x20_0000..=0x0fff_ffff => 4,
        _ => 5,
    }
}

/// Append the encoding of `value` to `dst`
pub fn encode_varint<B: BufMut>(value: u32, dst: &mut B) {
    let size = varint_size(value);
    for group in (1..size).rev() {
        dst.put_u8(((value >> (7 * group)) & 0x7f) as u8 | 0x80);
    }
    dst.put_u8((value & 0x7f) as u8);
}

/// Decode a value from the front of `src`
///
/// Returns the value and the number of bytes consumed.
pub fn decode_varint(src: &[u8]) -> Result<(u32, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in src.iter().take(MAX_VARINT_LEN).enumerate() {
        value = (value << 7) | u64::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            return u32::try_from(value)
                .map(|v| (v, i + 1))
                .map_err(|_| ConnectorError::Protocol(format!("VarLength overflows u32: {}", value)));
        }
    }

    if src.len() < MAX_VARINT_LEN {
        Err(ConnectorError::truncated("VarLength", src.len() + 1, src.len()))
    } else {
        Err(ConnectorError::Protocol(format!(
            "VarLength longer than {} bytes",
            MAX_VARINT_LEN
        )))
    }
}
