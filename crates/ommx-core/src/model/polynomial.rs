use crate::wire::UnknownFields;
use bytes::{Buf, BufMut};
use prost::encoding::{double, message, uint64, DecodeContext, WireType};
use prost::{DecodeError, Message};
use std::collections::{BTreeMap, BTreeSet};

/// `coefficient * prod_i x_{ids[i]}`; a repeated id is a power, no ids is a constant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Monomial {
    /// Variable ids of the product
    pub ids: Vec<u64>,
    /// Coefficient of the product
    pub coefficient: f64,
    /// Fields not defined by `ommx.v1.Monomial`
    pub unknown_fields: UnknownFields,
}

impl Monomial {
    /// Creates a monomial
    pub fn new(ids: Vec<u64>, coefficient: f64) -> Self {
        Self {
            ids,
            coefficient,
            unknown_fields: UnknownFields::new(),
        }
    }

    /// Number of factors
    pub fn degree(&self) -> u32 {
        u32::try_from(self.ids.len()).unwrap_or(u32::MAX)
    }
}

impl Message for Monomial {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        uint64::encode_packed(1, &self.ids, buf);
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
        const STRUCT_NAME: &str = "Monomial";
        match tag {
            1 => uint64::merge_repeated(wire_type, &mut self.ids, buf, ctx).map_err(|mut error| {
                error.push(STRUCT_NAME, "ids");
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
        let mut len = uint64::encoded_len_packed(1, &self.ids) + self.unknown_fields.encoded_len();
        if self.coefficient != 0.0 {
            len += double::encoded_len(2, &self.coefficient);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Multivariate polynomial as a list of monomials
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polynomial {
    /// Monomials in wire order
    pub terms: Vec<Monomial>,
    /// Fields not defined by `ommx.v1.Polynomial`
    pub unknown_fields: UnknownFields,
}

impl Polynomial {
    /// Creates a polynomial from `(ids, coefficient)` pairs
    pub fn new(terms: impl IntoIterator<Item = (Vec<u64>, f64)>) -> Self {
        Self {
            terms: terms
                .into_iter()
                .map(|(ids, coefficient)| Monomial::new(ids, coefficient))
                .collect(),
            unknown_fields: UnknownFields::new(),
        }
    }

    /// Appends a monomial without merging it into an existing one
    pub fn add_term(&mut self, ids: Vec<u64>, coefficient: f64) {
        self.terms.push(Monomial::new(ids, coefficient));
    }

    /// Coefficients summed per monomial, ids sorted inside each key
    pub fn accumulated(&self) -> BTreeMap<Vec<u64>, f64> {
        let mut coefficients = BTreeMap::new();
        for term in &self.terms {
            let mut ids = term.ids.clone();
            ids.sort_unstable();
            *coefficients.entry(ids).or_insert(0.0) += term.coefficient;
        }
        coefficients
    }

    /// Merges equal monomials, removes zero coefficients and orders terms
    /// by degree, then by ids.
    pub fn normalize(&mut self) {
        let mut terms: Vec<Monomial> = self
            .accumulated()
            .into_iter()
            .filter(|(_, coefficient)| *coefficient != 0.0)
            .map(|(ids, coefficient)| Monomial::new(ids, coefficient))
            .collect();
        terms.sort_by(|a, b| a.ids.len().cmp(&b.ids.len()).then_with(|| a.ids.cmp(&b.ids)));
        self.terms = terms;
    }

    /// Largest degree among monomials with a non-zero accumulated coefficient
    pub fn degree(&self) -> u32 {
        self.accumulated()
            .into_iter()
            .filter(|(_, coefficient)| *coefficient != 0.0)
            .map(|(ids, _)| u32::try_from(ids.len()).unwrap_or(u32::MAX))
            .max()
            .unwrap_or(0)
    }

    /// Every id referenced by a monomial
    pub fn used_decision_variable_ids(&self) -> BTreeSet<u64> {
        self.terms
            .iter()
            .flat_map(|term| term.ids.iter().copied())
            .collect()
    }
}

impl Message for Polynomial {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        message::encode_repeated(1, &self.terms, buf);
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
            1 => message::merge_repeated(wire_type, &mut self.terms, buf, ctx).map_err(
                |mut error| {
                    error.push("Polynomial", "terms");
                    error
                },
            ),
            _ => self.unknown_fields.merge_field(tag, wire_type, buf),
        }
    }

    fn encoded_len(&self) -> usize {
        message::encoded_len_repeated(1, &self.terms) + self.unknown_fields.encoded_len()
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
        let polynomial = Polynomial::new([(vec![0, 0, 1], 4.0), (vec![], 11.0), (vec![2], -1.0)]);
        let decoded = Polynomial::decode(polynomial.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, polynomial);
    }

    #[test]
    fn test_normalize_merges_permuted_monomials() {
        let mut polynomial = Polynomial::new([
            (vec![1, 0, 0], 4.0),
            (vec![0, 1, 0], 1.0),
            (vec![3], 2.0),
            (vec![3], -2.0),
            (vec![], 1.0),
        ]);
        polynomial.normalize();
        assert_eq!(
            polynomial,
            Polynomial::new([(vec![], 1.0), (vec![0, 0, 1], 5.0)])
        );
    }

    #[test]
    fn test_degree() {
        assert_eq!(Polynomial::default().degree(), 0);
        assert_eq!(Polynomial::new([(vec![0, 1, 2, 3], 0.0), (vec![5], 1.0)]).degree(), 1);
        assert_eq!(Polynomial::new([(vec![0, 0, 0], 1.0)]).degree(), 3);
    }

    #[test]
    fn test_used_ids() {
        let polynomial = Polynomial::new([(vec![4, 4, 1], 1.0), (vec![9], 1.0)]);
        assert_eq!(
            polynomial.used_decision_variable_ids().into_iter().collect::<Vec<_>>(),
            vec![1, 4, 9]
        );
    }
}
