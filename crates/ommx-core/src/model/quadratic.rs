use super::Linear;
use crate::validate::ValidationError;
use crate::wire::UnknownFields;
use bytes::{Buf, BufMut};
use prost::encoding::{double, message, uint64, DecodeContext, WireType};
use prost::{DecodeError, Message};
use std::collections::{BTreeMap, BTreeSet};

/// Quadratic function in COO (triplet) form plus an optional linear part.
///
/// Entry `i` is `values[i] * x_{rows[i]} * x_{columns[i]}`. The three
/// sequences should have equal length, but the codec does not enforce it;
/// see [`Quadratic::validate_shape`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Quadratic {
    /// Row ids
    pub rows: Vec<u64>,
    /// Column ids
    pub columns: Vec<u64>,
    /// Coefficients
    pub values: Vec<f64>,
    /// Degree one and constant part, absent means zero
    pub linear: Option<Linear>,
    /// Fields not defined by `ommx.v1.Quadratic`
    pub unknown_fields: UnknownFields,
}

impl Quadratic {
    /// Creates a quadratic function from `(row, column, value)` triplets
    pub fn new(entries: impl IntoIterator<Item = (u64, u64, f64)>, linear: Option<Linear>) -> Self {
        let mut quadratic = Self {
            linear,
            ..Self::default()
        };
        for (row, column, value) in entries {
            quadratic.add_entry(row, column, value);
        }
        quadratic
    }

    /// Appends one triplet
    pub fn add_entry(&mut self, row: u64, column: u64, value: f64) {
        self.rows.push(row);
        self.columns.push(column);
        self.values.push(value);
    }

    /// Number of complete triplets
    pub fn len(&self) -> usize {
        self.rows.len().min(self.columns.len()).min(self.values.len())
    }

    /// True if there is no complete triplet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over complete triplets
    pub fn entries(&self) -> impl Iterator<Item = (u64, u64, f64)> + '_ {
        self.rows
            .iter()
            .zip(&self.columns)
            .zip(&self.values)
            .map(|((row, column), value)| (*row, *column, *value))
    }

    /// Checks that `rows`, `columns` and `values` have the same length
    pub fn validate_shape(&self) -> Result<(), ValidationError> {
        if self.rows.len() == self.columns.len() && self.columns.len() == self.values.len() {
            Ok(())
        } else {
            Err(ValidationError::QuadraticShape {
                rows: self.rows.len(),
                columns: self.columns.len(),
                values: self.values.len(),
            })
        }
    }

    /// Coefficients summed per unordered pair `(min, max)`
    pub fn accumulated(&self) -> BTreeMap<(u64, u64), f64> {
        let mut coefficients = BTreeMap::new();
        for (row, column, value) in self.entries() {
            let key = (row.min(column), row.max(column));
            *coefficients.entry(key).or_insert(0.0) += value;
        }
        coefficients
    }

    /// Merges symmetric and repeated pairs into upper triangular form,
    /// removes zero coefficients and normalizes the linear part.
    ///
    /// An incomplete trailing triplet (mismatched lengths) is dropped.
    pub fn normalize(&mut self) {
        let accumulated = self.accumulated();
        self.rows.clear();
        self.columns.clear();
        self.values.clear();
        for ((row, column), value) in accumulated {
            if value != 0.0 {
                self.add_entry(row, column, value);
            }
        }
        if let Some(linear) = &mut self.linear {
            linear.normalize();
            if linear.terms.is_empty()
                && linear.constant == 0.0
                && linear.unknown_fields.is_empty()
            {
                self.linear = None;
            }
        }
    }

    /// 2 if any accumulated pair is non-zero, otherwise the degree of the linear part
    pub fn degree(&self) -> u32 {
        if self.accumulated().values().any(|c| *c != 0.0) {
            2
        } else {
            self.linear.as_ref().map_or(0, Linear::degree)
        }
    }

    /// Every id referenced by a triplet or by the linear part
    pub fn used_decision_variable_ids(&self) -> BTreeSet<u64> {
        let mut ids: BTreeSet<u64> = self
            .entries()
            .flat_map(|(row, column, _)| [row, column])
            .collect();
        if let Some(linear) = &self.linear {
            ids.extend(linear.used_decision_variable_ids());
        }
        ids
    }
}

impl Message for Quadratic {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        uint64::encode_packed(1, &self.rows, buf);
        uint64::encode_packed(2, &self.columns, buf);
        double::encode_packed(3, &self.values, buf);
        if let Some(linear) = &self.linear {
            message::encode(4, linear, buf);
        }
        self.unknown_fields.encode_raw(buf);
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        const STRUCT_NAME: &str = "Quadratic";
        match tag {
            1 => uint64::merge_repeated(wire_type, &mut self.rows, buf, ctx).map_err(|mut error| {
                error.push(STRUCT_NAME, "rows");
                error
            }),
            2 => uint64::merge_repeated(wire_type, &mut self.columns, buf, ctx).map_err(
                |mut error| {
                    error.push(STRUCT_NAME, "columns");
                    error
                },
            ),
            3 => double::merge_repeated(wire_type, &mut self.values, buf, ctx).map_err(
                |mut error| {
                    error.push(STRUCT_NAME, "values");
                    error
                },
            ),
            4 => message::merge(
                wire_type,
                self.linear.get_or_insert_with(Linear::default),
                buf,
                ctx,
            )
            .map_err(|mut error| {
                error.push(STRUCT_NAME, "linear");
                error
            }),
            _ => self.unknown_fields.merge_field(tag, wire_type, buf),
        }
    }

    fn encoded_len(&self) -> usize {
        uint64::encoded_len_packed(1, &self.rows)
            + uint64::encoded_len_packed(2, &self.columns)
            + double::encoded_len_packed(3, &self.values)
            + self
                .linear
                .as_ref()
                .map_or(0, |linear| message::encoded_len(4, linear))
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
        let quadratic = Quadratic::new(
            [(0, 1, 2.0), (1, 0, 3.0), (2, 2, -1.0)],
            Some(Linear::new([(0, 1.0)], 5.0)),
        );
        let decoded = Quadratic::decode(quadratic.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, quadratic);
    }

    #[test]
    fn test_absent_and_empty_linear_are_distinct() {
        let without = Quadratic::new([(0, 0, 1.0)], None);
        let with_empty = Quadratic::new([(0, 0, 1.0)], Some(Linear::default()));
        assert_ne!(without.encode_to_vec(), with_empty.encode_to_vec());

        let decoded = Quadratic::decode(with_empty.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.linear, Some(Linear::default()));
    }

    #[test]
    fn test_mismatched_lengths_survive_codec() {
        let quadratic = Quadratic {
            rows: vec![0, 1],
            columns: vec![0],
            values: vec![1.0, 2.0, 3.0],
            ..Quadratic::default()
        };
        let decoded = Quadratic::decode(quadratic.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, quadratic);
        assert_eq!(decoded.len(), 1);
        // ids of the incomplete tail are not referenced
        assert_eq!(
            decoded.used_decision_variable_ids().into_iter().collect::<Vec<_>>(),
            vec![0]
        );
        assert_eq!(
            decoded.validate_shape(),
            Err(ValidationError::QuadraticShape {
                rows: 2,
                columns: 1,
                values: 3
            })
        );
    }

    #[test]
    fn test_unpacked_repeated_accepted() {
        // rows as two unpacked varints: 1, 2
        let decoded = Quadratic::decode([0x08u8, 0x01, 0x08, 0x02].as_slice()).unwrap();
        assert_eq!(decoded.rows, vec![1, 2]);
    }

    #[test]
    fn test_normalize_symmetric_pairs() {
        let mut quadratic = Quadratic::new(
            [(1, 0, 3.0), (0, 1, 2.0), (2, 2, 1.0), (2, 2, -1.0)],
            Some(Linear::new([(4, 1.0), (4, -1.0)], 0.0)),
        );
        quadratic.normalize();
        assert_eq!(quadratic, Quadratic::new([(0, 1, 5.0)], None));
    }

    #[test]
    fn test_degree() {
        assert_eq!(Quadratic::default().degree(), 0);
        assert_eq!(
            Quadratic::new([(0, 1, 1.0), (1, 0, -1.0)], Some(Linear::single_term(3, 1.0))).degree(),
            1
        );
        assert_eq!(Quadratic::new([(0, 1, 1.0)], None).degree(), 2);
    }

    #[test]
    fn test_used_ids() {
        let quadratic = Quadratic::new([(3, 1, 1.0)], Some(Linear::single_term(7, 1.0)));
        assert_eq!(
            quadratic.used_decision_variable_ids().into_iter().collect::<Vec<_>>(),
            vec![1, 3, 7]
        );
    }
}
