//! Primitive wire types read from the front of a byte slice and appended to a
//! `Vec<u8>`. Every reader fails with [`ProtoError::UnexpectedEof`] instead of
//! reading past the end.

use uuid::Uuid;

use super::{
    error::{ProtoError, Result},
    varint::{read_varint, write_varint},
};

#[inline]
pub fn take<'a>(input: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if input.len() < len {
        return Err(ProtoError::UnexpectedEof);
    }

    let (head, tail) = input.split_at(len);
    *input = tail;
    Ok(head)
}

#[inline]
fn take_array<const N: usize>(input: &mut &[u8]) -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(take(input, N)?);
    Ok(bytes)
}

macro_rules! fixed_width {
    ($($ty:ty => $read:ident, $write:ident;)*) => {
        $(
            #[inline]
            pub fn $read(input: &mut &[u8]) -> Result<$ty> {
                Ok(<$ty>::from_be_bytes(take_array(input)?))
            }

            #[inline]
            pub fn $write(out: &mut Vec<u8>, value: $ty) {
                out.extend_from_slice(&value.to_be_bytes());
            }
        )*
    };
}

fixed_width! {
    u8 => read_u8, write_u8;
    i8 => read_i8, write_i8;
    u16 => read_u16_be, write_u16_be;
    i16 => read_i16_be, write_i16_be;
    u32 => read_u32_be, write_u32_be;
    i32 => read_i32_be, write_i32_be;
    u64 => read_u64_be, write_u64_be;
    i64 => read_i64_be, write_i64_be;
    f32 => read_f32_be, write_f32_be;
    f64 => read_f64_be, write_f64_be;
}

/// Any octet other than 1 reads as `false`.
#[inline]
pub fn read_bool(input: &mut &[u8]) -> Result<bool> {
    Ok(read_u8(input)? == 1)
}

#[inline]
pub fn write_bool(out: &mut Vec<u8>, value: bool) {
    out.push(value as u8);
}

#[inline]
pub fn read_uuid(input: &mut &[u8]) -> Result<Uuid> {
    Ok(Uuid::from_bytes(take_array(input)?))
}

#[inline]
pub fn write_uuid(out: &mut Vec<u8>, value: &Uuid) {
    out.extend_from_slice(value.as_bytes());
}

/// Parses the canonical `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` form.
pub fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|_| ProtoError::InvalidUuid(value.to_owned()))
}

fn read_len(input: &mut &[u8]) -> Result<usize> {
    let len = read_varint(input)?;
    if len < 0 {
        return Err(ProtoError::NegativeLength(len));
    }
    Ok(len as usize)
}

fn write_len(out: &mut Vec<u8>, len: usize) -> Result<()> {
    if len > i32::MAX as usize {
        return Err(ProtoError::LengthTooLarge {
            max: i32::MAX as usize,
            actual: len,
        });
    }
    write_varint(out, len as i32);
    Ok(())
}

/// VarInt-prefixed byte array.
pub fn read_byte_array(input: &mut &[u8]) -> Result<Vec<u8>> {
    let len = read_len(input)?;
    Ok(take(input, len)?.to_vec())
}

pub fn write_byte_array(out: &mut Vec<u8>, value: &[u8]) -> Result<()> {
    write_len(out, value.len())?;
    out.extend_from_slice(value);
    Ok(())
}

/// Reads a VarInt byte-length prefixed UTF-8 string of at most `max_chars`
/// UTF-16 code units.
pub fn read_string_bounded(input: &mut &[u8], max_chars: usize) -> Result<String> {
    let byte_len = read_len(input)?;
    let max_bytes = max_chars.saturating_mul(4);
    if byte_len > max_bytes {
        return Err(ProtoError::LengthTooLarge {
            max: max_bytes,
            actual: byte_len,
        });
    }

    let bytes = take(input, byte_len)?;
    let s = std::str::from_utf8(bytes).map_err(|_| ProtoError::InvalidUtf8)?;

    let char_count = s.encode_utf16().count();
    if char_count > max_chars {
        return Err(ProtoError::StringTooLong {
            max: max_chars,
            actual: char_count,
        });
    }

    Ok(s.to_owned())
}

/// The prefix is the UTF-8 byte length, not the character count.
pub fn write_string_bounded(out: &mut Vec<u8>, value: &str, max_chars: usize) -> Result<()> {
    let char_count = value.encode_utf16().count();
    if char_count > max_chars {
        return Err(ProtoError::StringTooLong {
            max: max_chars,
            actual: char_count,
        });
    }

    write_len(out, value.len())?;
    out.extend_from_slice(value.as_bytes());
    Ok(())
}
