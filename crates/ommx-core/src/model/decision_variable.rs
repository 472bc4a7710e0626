use crate::validate::ValidationError;
use crate::wire::UnknownFields;
use bytes::{Buf, BufMut};
use prost::encoding::{
    btree_map, check_wire_type, double, int32, int64, message, string, uint64, DecodeContext,
    WireType,
};
use prost::{DecodeError, Message};
use std::collections::BTreeMap;

/// Kind of a decision variable
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Kind {
    /// Not specified
    Unspecified = 0,
    /// Takes values in {0, 1}
    Binary = 1,
    /// Takes integer values within its bound
    Integer = 2,
    /// Takes real values within its bound
    Continuous = 3,
    /// Zero, or an integer within its bound
    SemiInteger = 4,
    /// Zero, or a real value within its bound
    SemiContinuous = 5,
}

impl Kind {
    /// Enum value name as written in the schema
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Kind::Unspecified => "KIND_UNSPECIFIED",
            Kind::Binary => "KIND_BINARY",
            Kind::Integer => "KIND_INTEGER",
            Kind::Continuous => "KIND_CONTINUOUS",
            Kind::SemiInteger => "KIND_SEMI_INTEGER",
            Kind::SemiContinuous => "KIND_SEMI_CONTINUOUS",
        }
    }

    /// Parses an enum value name as written in the schema
    pub fn from_str_name(value: &str) -> Option<Self> {
        match value {
            "KIND_UNSPECIFIED" => Some(Self::Unspecified),
            "KIND_BINARY" => Some(Self::Binary),
            "KIND_INTEGER" => Some(Self::Integer),
            "KIND_CONTINUOUS" => Some(Self::Continuous),
            "KIND_SEMI_INTEGER" => Some(Self::SemiInteger),
            "KIND_SEMI_CONTINUOUS" => Some(Self::SemiContinuous),
            _ => None,
        }
    }
}

/// Closed interval `[lower, upper]` a decision variable must lie in
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bound {
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
    /// Fields not defined by `ommx.v1.Bound`
    pub unknown_fields: UnknownFields,
}

impl Bound {
    /// Creates a bound without checking it
    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            unknown_fields: UnknownFields::new(),
        }
    }

    /// `(-inf, +inf)`
    pub fn unbounded() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    /// Checks the interval is usable:
    /// no NaN, `lower != +inf`, `upper != -inf` and `lower <= upper`
    pub fn check(&self, id: u64) -> Result<(), ValidationError> {
        let (lower, upper) = (self.lower, self.upper);
        if lower.is_nan() || upper.is_nan() {
            return Err(ValidationError::BoundNotANumber { id, lower, upper });
        }
        if lower == f64::INFINITY || upper == f64::NEG_INFINITY {
            return Err(ValidationError::BoundInvalidInfinity { id, lower, upper });
        }
        if lower > upper {
            return Err(ValidationError::BoundLowerAboveUpper { id, lower, upper });
        }
        Ok(())
    }

    /// True if `value` lies in the interval, widened by `atol`
    pub fn contains(&self, value: f64, atol: f64) -> bool {
        self.lower - atol <= value && value <= self.upper + atol
    }
}

impl Message for Bound {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        if self.lower != 0.0 {
            double::encode(1, &self.lower, buf);
        }
        if self.upper != 0.0 {
            double::encode(2, &self.upper, buf);
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
        const STRUCT_NAME: &str = "Bound";
        match tag {
            1 => double::merge(wire_type, &mut self.lower, buf, ctx).map_err(|mut error| {
                error.push(STRUCT_NAME, "lower");
                error
            }),
            2 => double::merge(wire_type, &mut self.upper, buf, ctx).map_err(|mut error| {
                error.push(STRUCT_NAME, "upper");
                error
            }),
            _ => self.unknown_fields.merge_field(tag, wire_type, buf),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = self.unknown_fields.encoded_len();
        if self.lower != 0.0 {
            len += double::encoded_len(1, &self.lower);
        }
        if self.upper != 0.0 {
            len += double::encoded_len(2, &self.upper);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// A decision variable the solver assigns a value to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionVariable {
    /// Identifier, unique within an instance, not necessarily sequential
    pub id: u64,
    /// Raw [`Kind`] value, kept as is when not a known kind
    pub kind: i32,
    /// Absent means unbounded
    pub bound: Option<Bound>,
    /// Name of the variable family, e.g. `x`
    pub name: Option<String>,
    /// Position in a multi-dimensional family, empty for a scalar
    pub subscripts: Vec<i64>,
    /// Free-form key/value metadata
    pub parameters: BTreeMap<String, String>,
    /// Human readable description
    pub description: Option<String>,
    /// Value fixed by presolve or partial evaluation
    pub substituted_value: Option<f64>,
    /// Fields not defined by `ommx.v1.DecisionVariable`
    pub unknown_fields: UnknownFields,
}

impl DecisionVariable {
    /// Creates an unbounded variable without metadata
    pub fn new(id: u64, kind: Kind) -> Self {
        Self {
            id,
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Creates a binary variable bounded to `[0, 1]`
    pub fn binary(id: u64) -> Self {
        Self::new(id, Kind::Binary).with_bound(0.0, 1.0)
    }

    /// Creates a continuous variable bounded to `[lower, upper]`
    pub fn continuous(id: u64, lower: f64, upper: f64) -> Self {
        Self::new(id, Kind::Continuous).with_bound(lower, upper)
    }

    /// Sets the bound
    pub fn with_bound(mut self, lower: f64, upper: f64) -> Self {
        self.bound = Some(Bound::new(lower, upper));
        self
    }

    /// Sets name and subscripts
    pub fn with_name(mut self, name: impl Into<String>, subscripts: Vec<i64>) -> Self {
        self.name = Some(name.into());
        self.subscripts = subscripts;
        self
    }

    /// Adds one parameter, replacing a previous value for the key
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Fixes the value of the variable
    pub fn with_substituted_value(mut self, value: f64) -> Self {
        self.substituted_value = Some(value);
        self
    }

    /// Known kind, [`Kind::Unspecified`] for values this schema does not define
    pub fn kind(&self) -> Kind {
        Kind::try_from(self.kind).unwrap_or_default()
    }

    /// Sets the kind
    pub fn set_kind(&mut self, kind: Kind) {
        self.kind = kind.into();
    }

    /// Effective bound, `(-inf, +inf)` when absent
    pub fn effective_bound(&self) -> Bound {
        self.bound.clone().unwrap_or_else(Bound::unbounded)
    }

    /// Name, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Message for DecisionVariable {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        if self.id != 0 {
            uint64::encode(1, &self.id, buf);
        }
        if self.kind != 0 {
            int32::encode(2, &self.kind, buf);
        }
        if let Some(bound) = &self.bound {
            message::encode(3, bound, buf);
        }
        if let Some(name) = &self.name {
            string::encode(4, name, buf);
        }
        int64::encode_packed(5, &self.subscripts, buf);
        btree_map::encode(
            string::encode,
            string::encoded_len,
            string::encode,
            string::encoded_len,
            6,
            &self.parameters,
            buf,
        );
        if let Some(description) = &self.description {
            string::encode(7, description, buf);
        }
        if let Some(value) = &self.substituted_value {
            double::encode(8, value, buf);
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
        const STRUCT_NAME: &str = "DecisionVariable";
        match tag {
            1 => uint64::merge(wire_type, &mut self.id, buf, ctx).map_err(|mut error| {
                error.push(STRUCT_NAME, "id");
                error
            }),
            2 => int32::merge(wire_type, &mut self.kind, buf, ctx).map_err(|mut error| {
                error.push(STRUCT_NAME, "kind");
                error
            }),
            3 => message::merge(
                wire_type,
                self.bound.get_or_insert_with(Bound::default),
                buf,
                ctx,
            )
            .map_err(|mut error| {
                error.push(STRUCT_NAME, "bound");
                error
            }),
            4 => string::merge(
                wire_type,
                self.name.get_or_insert_with(String::new),
                buf,
                ctx,
            )
            .map_err(|mut error| {
                error.push(STRUCT_NAME, "name");
                error
            }),
            5 => int64::merge_repeated(wire_type, &mut self.subscripts, buf, ctx).map_err(
                |mut error| {
                    error.push(STRUCT_NAME, "subscripts");
                    error
                },
            ),
            6 => check_wire_type(WireType::LengthDelimited, wire_type)
                .and_then(|()| {
                    btree_map::merge(string::merge, string::merge, &mut self.parameters, buf, ctx)
                })
                .map_err(|mut error| {
                    error.push(STRUCT_NAME, "parameters");
                    error
                }),
            7 => string::merge(
                wire_type,
                self.description.get_or_insert_with(String::new),
                buf,
                ctx,
            )
            .map_err(|mut error| {
                error.push(STRUCT_NAME, "description");
                error
            }),
            8 => double::merge(
                wire_type,
                self.substituted_value.get_or_insert(0.0),
                buf,
                ctx,
            )
            .map_err(|mut error| {
                error.push(STRUCT_NAME, "substituted_value");
                error
            }),
            _ => self.unknown_fields.merge_field(tag, wire_type, buf),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = int64::encoded_len_packed(5, &self.subscripts)
            + btree_map::encoded_len(
                string::encoded_len,
                string::encoded_len,
                6,
                &self.parameters,
            )
            + self.unknown_fields.encoded_len();
        if self.id != 0 {
            len += uint64::encoded_len(1, &self.id);
        }
        if self.kind != 0 {
            len += int32::encoded_len(2, &self.kind);
        }
        if let Some(bound) = &self.bound {
            len += message::encoded_len(3, bound);
        }
        if let Some(name) = &self.name {
            len += string::encoded_len(4, name);
        }
        if let Some(description) = &self.description {
            len += string::encoded_len(7, description);
        }
        if let Some(value) = &self.substituted_value {
            len += double::encoded_len(8, value);
        }
        len
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
        let variable = DecisionVariable::new(7, Kind::Integer)
            .with_bound(-3.0, 10.0)
            .with_name("x", vec![1, -2])
            .with_parameter("group", "a")
            .with_substituted_value(0.0);
        let decoded = DecisionVariable::decode(variable.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, variable);
        assert_eq!(decoded.kind(), Kind::Integer);
        assert_eq!(decoded.name(), Some("x"));
    }

    #[test]
    fn test_decode_flat_layout() {
        // id = 1, kind = BINARY, name = "x", subscripts = [-1], description = "d"
        let mut bytes = vec![0x08, 0x01, 0x10, 0x01, 0x22, 0x01, b'x', 0x2A, 0x0A];
        bytes.extend([0xFF; 9]);
        bytes.push(0x01);
        bytes.extend([0x3A, 0x01, b'd']);
        let decoded = DecisionVariable::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded.id, 1);
        assert_eq!(decoded.kind(), Kind::Binary);
        assert_eq!(decoded.name(), Some("x"));
        assert_eq!(decoded.subscripts, vec![-1]);
        assert_eq!(decoded.description.as_deref(), Some("d"));
        assert!(decoded.unknown_fields.is_empty());
        assert_eq!(decoded.encode_to_vec(), bytes);
    }

    #[test]
    fn test_empty_name_is_present() {
        let variable = DecisionVariable {
            name: Some(String::new()),
            ..DecisionVariable::default()
        };
        let bytes = variable.encode_to_vec();
        assert_eq!(bytes, vec![0x22, 0x00]);
        assert_eq!(DecisionVariable::decode(bytes.as_slice()).unwrap().name(), Some(""));
        assert_eq!(DecisionVariable::default().name(), None);
    }

    #[test]
    fn test_substituted_value_zero_is_present() {
        let variable = DecisionVariable::new(2, Kind::Integer).with_substituted_value(0.0);
        let decoded = DecisionVariable::decode(variable.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.substituted_value, Some(0.0));
    }

    #[test]
    fn test_unknown_kind_is_kept() {
        let variable = DecisionVariable {
            id: 1,
            kind: 42,
            ..DecisionVariable::default()
        };
        let decoded = DecisionVariable::decode(variable.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.kind, 42);
        assert_eq!(decoded.kind(), Kind::Unspecified);
    }

    #[test]
    fn test_negative_kind_round_trips() {
        let variable = DecisionVariable {
            kind: -1,
            ..DecisionVariable::default()
        };
        let bytes = variable.encode_to_vec();
        // int32 negatives are sign extended to ten bytes
        assert_eq!(bytes.len(), 11);
        assert_eq!(DecisionVariable::decode(bytes.as_slice()).unwrap().kind, -1);
    }

    #[test]
    fn test_infinite_bound_round_trips() {
        let variable = DecisionVariable::continuous(3, f64::NEG_INFINITY, 5.0);
        let decoded = DecisionVariable::decode(variable.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.effective_bound(), Bound::new(f64::NEG_INFINITY, 5.0));
    }

    #[test]
    fn test_effective_bound_defaults_to_unbounded() {
        let variable = DecisionVariable::new(1, Kind::Continuous);
        assert_eq!(variable.effective_bound(), Bound::unbounded());
    }

    #[test]
    fn test_bound_check() {
        assert!(Bound::new(0.0, 1.0).check(1).is_ok());
        assert!(Bound::unbounded().check(1).is_ok());
        assert!(matches!(
            Bound::new(f64::NAN, 1.0).check(1),
            Err(ValidationError::BoundNotANumber { id: 1, .. })
        ));
        assert!(matches!(
            Bound::new(f64::INFINITY, f64::INFINITY).check(2),
            Err(ValidationError::BoundInvalidInfinity { id: 2, .. })
        ));
        assert!(matches!(
            Bound::new(2.0, 1.0).check(3),
            Err(ValidationError::BoundLowerAboveUpper { id: 3, .. })
        ));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Kind::SemiInteger.as_str_name(), "KIND_SEMI_INTEGER");
        assert_eq!(Kind::from_str_name("KIND_BINARY"), Some(Kind::Binary));
        assert_eq!(Kind::from_str_name("binary"), None);
    }
}
