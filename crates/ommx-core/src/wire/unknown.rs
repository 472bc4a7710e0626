//! Opaque storage for fields a message does not recognise.

use super::copy_field_value;
use bytes::{Buf, BufMut};
use prost::encoding::{encode_key, key_len, WireType};
use prost::DecodeError;

/// A single unrecognised field, kept exactly as it appeared on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField {
    number: u32,
    wire_type: WireType,
    /// Raw payload following the key
    value: Vec<u8>,
}

impl UnknownField {
    /// Field number of this field
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Wire type of this field
    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    /// Raw payload bytes (for LEN fields this includes the length prefix)
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    fn encoded_len(&self) -> usize {
        key_len(self.number) + self.value.len()
    }
}

/// Unrecognised fields of one message, in the order they were decoded.
///
/// Fields are re-emitted after all known fields when the owning message
/// is encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnknownFields {
    fields: Vec<UnknownField>,
}

impl UnknownFields {
    /// Creates an empty set
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Returns true if no unknown field was captured
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of captured fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Iterates over the captured fields
    pub fn iter(&self) -> impl Iterator<Item = &UnknownField> {
        self.fields.iter()
    }

    /// Drops every captured field
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Captures the field whose key was just read from `buf`
    pub fn merge_field(
        &mut self,
        number: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
    ) -> Result<(), DecodeError> {
        let mut value = Vec::new();
        copy_field_value(number, wire_type, buf, &mut value)?;
        self.fields.push(UnknownField {
            number,
            wire_type,
            value,
        });
        Ok(())
    }

    /// Writes every captured field, key first
    pub fn encode_raw(&self, buf: &mut impl BufMut) {
        for field in &self.fields {
            encode_key(field.number, field.wire_type, buf);
            buf.put_slice(&field.value);
        }
    }

    /// Bytes needed by [`encode_raw`](Self::encode_raw)
    pub fn encoded_len(&self) -> usize {
        self.fields.iter().map(UnknownField::encoded_len).sum()
    }
}
