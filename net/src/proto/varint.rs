//! VarInt and VarLong: 7 data bits per octet, low-order group first, high bit
//! set on every octet except the last.

use super::error::{ProtoError, Result};

/// Longest VarInt encoding in octets.
pub const VARINT_MAX_LEN: usize = 5;
/// Longest VarLong encoding in octets.
pub const VARLONG_MAX_LEN: usize = 10;

const DATA: u8 = 0b0111_1111;
const MORE: u8 = 0b1000_0000;

macro_rules! var_codec {
    (
        $signed:ty as $unsigned:ty,
        max: $max:expr,
        overflow: $overflow:ident,
        peek: $peek:ident,
        read: $read:ident,
        write: $write:ident,
        len: $len:ident $(,)?
    ) => {
        /// Decodes from the front of `input` without consuming it, returning
        /// the value and the octets it took. `Ok(None)` means the last octet
        /// has not arrived yet; running past the length limit is an error
        /// even if more data would follow.
        pub fn $peek(input: &[u8]) -> Result<Option<($signed, usize)>> {
            let mut acc: $unsigned = 0;
            for (i, &octet) in input.iter().take($max).enumerate() {
                acc |= <$unsigned>::from(octet & DATA) << (7 * i);
                if octet & MORE == 0 {
                    return Ok(Some((acc as $signed, i + 1)));
                }
            }
            if input.len() >= $max {
                Err(ProtoError::$overflow)
            } else {
                Ok(None)
            }
        }

        pub fn $read(input: &mut &[u8]) -> Result<$signed> {
            let (value, used) = $peek(input)?.ok_or(ProtoError::UnexpectedEof)?;
            *input = &input[used..];
            Ok(value)
        }

        pub fn $write(out: &mut Vec<u8>, value: $signed) {
            let mut rest = value as $unsigned;
            while rest > <$unsigned>::from(DATA) {
                out.push(rest as u8 | MORE);
                rest >>= 7;
            }
            out.push(rest as u8);
        }

        /// Encoded size of `value` in octets.
        pub fn $len(value: $signed) -> usize {
            let bits = <$unsigned>::BITS - (value as $unsigned).leading_zeros();
            (bits.max(1) as usize).div_ceil(7)
        }
    };
}

var_codec! {
    i32 as u32,
    max: VARINT_MAX_LEN,
    overflow: VarIntTooLarge,
    peek: read_varint_partial,
    read: read_varint,
    write: write_varint,
    len: varint_len,
}

var_codec! {
    i64 as u64,
    max: VARLONG_MAX_LEN,
    overflow: VarLongTooLarge,
    peek: read_varlong_partial,
    read: read_varlong,
    write: write_varlong,
    len: varlong_len,
}
