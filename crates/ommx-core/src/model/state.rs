use crate::wire::UnknownFields;
use bytes::{Buf, BufMut};
use prost::encoding::{btree_map, check_wire_type, double, uint64, DecodeContext, WireType};
use prost::{DecodeError, Message};
use std::collections::BTreeMap;

/// Values assigned to decision variables, keyed by id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    /// Value per decision variable id
    pub entries: BTreeMap<u64, f64>,
    /// Fields not defined by `ommx.v1.State`
    pub unknown_fields: UnknownFields,
}

impl State {
    /// Value of one variable
    pub fn get(&self, id: u64) -> Option<f64> {
        self.entries.get(&id).copied()
    }

    /// Assigns a value, returning the previous one
    pub fn insert(&mut self, id: u64, value: f64) -> Option<f64> {
        self.entries.insert(id, value)
    }

    /// Number of assigned variables
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is assigned
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(u64, f64)> for State {
    fn from_iter<I: IntoIterator<Item = (u64, f64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            unknown_fields: UnknownFields::new(),
        }
    }
}

impl From<BTreeMap<u64, f64>> for State {
    fn from(entries: BTreeMap<u64, f64>) -> Self {
        Self {
            entries,
            unknown_fields: UnknownFields::new(),
        }
    }
}

impl Message for State {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        btree_map::encode(
            uint64::encode,
            uint64::encoded_len,
            double::encode,
            double::encoded_len,
            1,
            &self.entries,
            buf,
        );
        self.unknown_fields.encode_raw(buf);
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        match tag {
            1 => check_wire_type(WireType::LengthDelimited, wire_type)
                .and_then(|()| {
                    btree_map::merge(uint64::merge, double::merge, &mut self.entries, buf, ctx)
                })
                .map_err(|mut error| {
                    error.push("State", "entries");
                    error
                }),
            _ => self.unknown_fields.merge_field(tag, wire_type, buf),
        }
    }

    fn encoded_len(&self) -> usize {
        btree_map::encoded_len(uint64::encoded_len, double::encoded_len, 1, &self.entries)
            + self.unknown_fields.encoded_len()
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip() {
        let state: State = [(0, 1.0), (3, -2.5), (7, 0.0)].into_iter().collect();
        let decoded = State::decode(state.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, state);
        assert_eq!(decoded.get(7), Some(0.0));
        assert_eq!(decoded.get(8), None);
    }

    #[test]
    fn test_repeated_key_last_wins() {
        let mut bytes = State::from_iter([(1, 1.0)]).encode_to_vec();
        bytes.extend(State::from_iter([(1, 2.0)]).encode_to_vec());
        assert_eq!(State::decode(bytes.as_slice()).unwrap().get(1), Some(2.0));
    }
}
