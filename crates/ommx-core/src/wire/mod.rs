//! Low-level protobuf wire format support.
//!
//! Known fields of every message are encoded and decoded with the
//! `prost::encoding` primitives. This module adds what those primitives do
//! not cover: byte-exact capture of fields a message does not know, so that
//! data written by a newer schema survives a decode/encode cycle.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 3/4: SGROUP/EGROUP (deprecated groups)
//! - 5: I32 (fixed32, sfixed32, float)

mod unknown;

use bytes::Buf;
use prost::encoding::WireType;
use prost::DecodeError;

pub use unknown::{UnknownField, UnknownFields};

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;

/// Varints are at most 10 bytes for a 64-bit value
const MAX_VARINT_LEN: usize = 10;

/// Map the low three bits of a field key to a wire type
pub(crate) fn wire_type_of(key: u64) -> Result<WireType, DecodeError> {
    match key & 0x07 {
        0 => Ok(WireType::Varint),
        1 => Ok(WireType::SixtyFourBit),
        2 => Ok(WireType::LengthDelimited),
        3 => Ok(WireType::StartGroup),
        4 => Ok(WireType::EndGroup),
        5 => Ok(WireType::ThirtyTwoBit),
        other => Err(DecodeError::new(format!("invalid wire type value: {}", other))),
    }
}

/// Read one varint from `buf`, appending its raw bytes to `out`.
///
/// Returns the decoded value.
pub(crate) fn copy_varint(buf: &mut impl Buf, out: &mut Vec<u8>) -> Result<u64, DecodeError> {
    let mut result: u64 = 0;

    for i in 0..MAX_VARINT_LEN {
        if !buf.has_remaining() {
            return Err(DecodeError::new("truncated varint"));
        }
        let byte = buf.get_u8();
        out.push(byte);
        result |= u64::from(byte & 0x7F) << (7 * i);

        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }

    Err(DecodeError::new("varint longer than 10 bytes"))
}

/// Copy exactly `len` bytes from `buf` into `out`
fn copy_exact(buf: &mut impl Buf, len: usize, out: &mut Vec<u8>) -> Result<(), DecodeError> {
    if buf.remaining() < len {
        return Err(DecodeError::new(format!(
            "buffer underflow: need {} bytes, have {}",
            len,
            buf.remaining()
        )));
    }
    let start = out.len();
    out.resize(start + len, 0);
    buf.copy_to_slice(&mut out[start..]);
    Ok(())
}

/// Copy the payload of one field (everything after its key) into `out`.
///
/// Group payloads include every nested field and the closing end-group key.
pub(crate) fn copy_field_value(
    number: u32,
    wire_type: WireType,
    buf: &mut impl Buf,
    out: &mut Vec<u8>,
) -> Result<(), DecodeError> {
    match wire_type {
        WireType::Varint => copy_varint(buf, out).map(|_| ()),
        WireType::SixtyFourBit => copy_exact(buf, 8, out),
        WireType::ThirtyTwoBit => copy_exact(buf, 4, out),
        WireType::LengthDelimited => {
            let len = copy_varint(buf, out)?;
            let len = usize::try_from(len)
                .map_err(|_| DecodeError::new("length prefix does not fit in memory"))?;
            copy_exact(buf, len, out)
        }
        WireType::StartGroup => copy_group(number, buf, out),
        WireType::EndGroup => Err(DecodeError::new(format!(
            "unexpected end group for field {}",
            number
        ))),
    }
}

/// Copy a group body up to and including its matching end-group key.
///
/// Nested groups are tracked with an explicit stack.
fn copy_group(number: u32, buf: &mut impl Buf, out: &mut Vec<u8>) -> Result<(), DecodeError> {
    let mut open = vec![number];

    while let Some(&current) = open.last() {
        let key = copy_varint(buf, out)?;
        let wire_type = wire_type_of(key)?;
        let field_number = u32::try_from(key >> 3)
            .ok()
            .filter(|n| *n != 0 && *n <= MAX_FIELD_NUMBER)
            .ok_or_else(|| {
                DecodeError::new(format!("invalid field number in group: {}", key >> 3))
            })?;

        match wire_type {
            WireType::StartGroup => open.push(field_number),
            WireType::EndGroup => {
                if field_number != current {
                    return Err(DecodeError::new(format!(
                        "mismatched end group: expected {}, found {}",
                        current, field_number
                    )));
                }
                open.pop();
            }
            other => copy_field_value(field_number, other, buf, out)?,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_varint_single_byte() {
        let mut data: &[u8] = &[0x08];
        let mut out = Vec::new();
        assert_eq!(copy_varint(&mut data, &mut out).unwrap(), 8);
        assert_eq!(out, vec![0x08]);
        assert!(data.is_empty());
    }

    #[test]
    fn test_copy_varint_multi_byte() {
        let mut data: &[u8] = &[0xAC, 0x02, 0xFF];
        let mut out = Vec::new();
        assert_eq!(copy_varint(&mut data, &mut out).unwrap(), 300);
        assert_eq!(out, vec![0xAC, 0x02]);
        assert_eq!(data, &[0xFF]);
    }

    #[test]
    fn test_copy_varint_max() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let mut data: &[u8] = &bytes;
        let mut out = Vec::new();
        assert_eq!(copy_varint(&mut data, &mut out).unwrap(), u64::MAX);
        assert_eq!(out.len(), 10);
    }

    #[test]
    fn test_copy_varint_errors() {
        let mut truncated: &[u8] = &[0x80, 0x80];
        assert!(copy_varint(&mut truncated, &mut Vec::new()).is_err());

        let mut overlong: &[u8] = &[0xFF; 11];
        assert!(copy_varint(&mut overlong, &mut Vec::new()).is_err());
    }

    #[test]
    fn test_wire_type_of() {
        assert_eq!(wire_type_of(0x08).unwrap(), WireType::Varint);
        assert_eq!(wire_type_of(0x09).unwrap(), WireType::SixtyFourBit);
        assert_eq!(wire_type_of(0x0A).unwrap(), WireType::LengthDelimited);
        assert_eq!(wire_type_of(0x0D).unwrap(), WireType::ThirtyTwoBit);
        assert!(wire_type_of(0x0E).is_err());
        assert!(wire_type_of(0x0F).is_err());
    }

    #[test]
    fn test_copy_len_value() {
        // length 5, "hello", then trailing byte
        let mut data: &[u8] = &[0x05, b'h', b'e', b'l', b'l', b'o', 0x00];
        let mut out = Vec::new();
        copy_field_value(9, WireType::LengthDelimited, &mut data, &mut out).unwrap();
        assert_eq!(out, vec![0x05, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(data, &[0x00]);
    }

    #[test]
    fn test_copy_len_value_truncated() {
        let mut data: &[u8] = &[0x05, b'h', b'e'];
        assert!(
            copy_field_value(9, WireType::LengthDelimited, &mut data, &mut Vec::new()).is_err()
        );
    }

    #[test]
    fn test_copy_fixed_values() {
        let mut data: &[u8] = &[1, 2, 3, 4, 5, 6, 7, 8];
        let mut out = Vec::new();
        copy_field_value(1, WireType::SixtyFourBit, &mut data, &mut out).unwrap();
        assert_eq!(out.len(), 8);

        let mut data: &[u8] = &[1, 2, 3];
        assert!(copy_field_value(1, WireType::ThirtyTwoBit, &mut data, &mut Vec::new()).is_err());
    }

    #[test]
    fn test_copy_group() {
        // group 10 containing field 1 varint 150 and a nested group 2, then end group 10
        let bytes = [0x08, 0x96, 0x01, 0x13, 0x14, 0x54];
        let mut data: &[u8] = &bytes;
        let mut out = Vec::new();
        copy_field_value(10, WireType::StartGroup, &mut data, &mut out).unwrap();
        assert_eq!(out, bytes.to_vec());
    }

    #[test]
    fn test_copy_group_mismatched_end() {
        // group 10 closed by end group 11
        let mut data: &[u8] = &[0x5C];
        assert!(copy_field_value(10, WireType::StartGroup, &mut data, &mut Vec::new()).is_err());
    }

    #[test]
    fn test_unexpected_end_group() {
        let mut data: &[u8] = &[];
        assert!(copy_field_value(3, WireType::EndGroup, &mut data, &mut Vec::new()).is_err());
    }
}
