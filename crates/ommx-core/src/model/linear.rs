use crate::wire::UnknownFields;
use bytes::{Buf, BufMut};
use prost::encoding::{double, message, uint64, DecodeContext, WireType};
use prost::{DecodeError, Message};
use std::collections::{BTreeMap, BTreeSet};

/// One `coefficient * x_id` term of a [`Linear`] expression
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearTerm {
    /// Decision variable id
    pub id: u64,
    /// Coefficient of the variable
    pub coefficient: f64,
    /// Fields not defined by `ommx.v1.Linear.Term`
    pub unknown_fields: UnknownFields,
}

impl LinearTerm {
    /// Creates a term
    pub fn new(id: u64, coefficient: f64) -> Self {
        Self {
            id,
            coefficient,
            unknown_fields: UnknownFields::new(),
        }
    }
}

impl Message for LinearTerm {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        if self.id != 0 {
            uint64::encode(1, &self.id, buf);
        }
        if self.coefficient != 0.0 {
            double::encode(2, &self.coefficient, buf);
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
        const STRUCT_NAME: &str = "Linear.Term";
        match tag {
            1 => uint64::merge(wire_type, &mut self.id, buf, ctx).map_err(|mut error| {
                error.push(STRUCT_NAME, "id");
                error
            }),
            2 => double::merge(wire_type, &mut self.coefficient, buf, ctx).map_err(|mut error| {
                error.push(STRUCT_NAME, "coefficient");
                error
            }),
            _ => self.unknown_fields.merge_field(tag, wire_type, buf),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = self.unknown_fields.encoded_len();
        if self.id != 0 {
            len += uint64::encoded_len(1, &self.id);
        }
        if self.coefficient != 0.0 {
            len += double::encoded_len(2, &self.coefficient);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Sparse linear function `sum_i c_i x_{id_i} + constant`.
///
/// Terms are kept in wire order. The same id may appear more than once;
/// every semantic operation sums the coefficients of repeated ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Linear {
    /// Terms in wire order
    pub terms: Vec<LinearTerm>,
    /// Constant offset
    pub constant: f64,
    /// Fields not defined by `ommx.v1.Linear`
    pub unknown_fields: UnknownFields,
}

impl Linear {
    /// Creates a linear function from `(id, coefficient)` pairs
    pub fn new(terms: impl IntoIterator<Item = (u64, f64)>, constant: f64) -> Self {
        Self {
            terms: terms
                .into_iter()
                .map(|(id, coefficient)| LinearTerm::new(id, coefficient))
                .collect(),
            constant,
            unknown_fields: UnknownFields::new(),
        }
    }

    /// Creates the function `x_id`
    pub fn single_term(id: u64, coefficient: f64) -> Self {
        Self::new([(id, coefficient)], 0.0)
    }

    /// Appends a term without merging it into an existing one
    pub fn add_term(&mut self, id: u64, coefficient: f64) {
        self.terms.push(LinearTerm::new(id, coefficient));
    }

    /// Coefficients summed per id
    pub fn accumulated(&self) -> BTreeMap<u64, f64> {
        let mut coefficients = BTreeMap::new();
        for term in &self.terms {
            *coefficients.entry(term.id).or_insert(0.0) += term.coefficient;
        }
        coefficients
    }

    /// Merges repeated ids, removes zero coefficients and sorts by id.
    ///
    /// Unknown fields of individual terms do not survive the merge.
    pub fn normalize(&mut self) {
        self.terms = self
            .accumulated()
            .into_iter()
            .filter(|(_, coefficient)| *coefficient != 0.0)
            .map(|(id, coefficient)| LinearTerm::new(id, coefficient))
            .collect();
    }

    /// 1 if any accumulated coefficient is non-zero, 0 otherwise
    pub fn degree(&self) -> u32 {
        if self.accumulated().values().any(|c| *c != 0.0) {
            1
        } else {
            0
        }
    }

    /// True for the zero function
    pub fn is_zero(&self) -> bool {
        self.constant == 0.0 && self.degree() == 0
    }

    /// Every id referenced by a term
    pub fn used_decision_variable_ids(&self) -> BTreeSet<u64> {
        self.terms.iter().map(|term| term.id).collect()
    }
}

impl Message for Linear {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        message::encode_repeated(1, &self.terms, buf);
        if self.constant != 0.0 {
            double::encode(2, &self.constant, buf);
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
        const STRUCT_NAME: &str = "Linear";
        match tag {
            1 => message::merge_repeated(wire_type, &mut self.terms, buf, ctx).map_err(
                |mut error| {
                    error.push(STRUCT_NAME, "terms");
                    error
                },
            ),
            2 => double::merge(wire_type, &mut self.constant, buf, ctx).map_err(|mut error| {
                error.push(STRUCT_NAME, "constant");
                error
            }),
            _ => self.unknown_fields.merge_field(tag, wire_type, buf),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len =
            message::encoded_len_repeated(1, &self.terms) + self.unknown_fields.encoded_len();
        if self.constant != 0.0 {
            len += double::encoded_len(2, &self.constant);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}
