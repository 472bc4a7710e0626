use super::Function;
use crate::wire::UnknownFields;
use bytes::{Buf, BufMut};
use prost::encoding::{
    btree_map, check_wire_type, int32, int64, message, string, uint64, DecodeContext, WireType,
};
use prost::{DecodeError, Message};
use std::collections::BTreeMap;

/// How the constraint function is compared against zero
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Equality {
    /// Not specified
    Unspecified = 0,
    /// `f(x) = 0`
    EqualToZero = 1,
    /// `f(x) <= 0`
    LessThanOrEqualToZero = 2,
}

impl Equality {
    /// Enum value name as written in the schema
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Equality::Unspecified => "EQUALITY_UNSPECIFIED",
            Equality::EqualToZero => "EQUALITY_EQUAL_TO_ZERO",
            Equality::LessThanOrEqualToZero => "EQUALITY_LESS_THAN_OR_EQUAL_TO_ZERO",
        }
    }

    /// Parses an enum value name as written in the schema
    pub fn from_str_name(value: &str) -> Option<Self> {
        match value {
            "EQUALITY_UNSPECIFIED" => Some(Self::Unspecified),
            "EQUALITY_EQUAL_TO_ZERO" => Some(Self::EqualToZero),
            "EQUALITY_LESS_THAN_OR_EQUAL_TO_ZERO" => Some(Self::LessThanOrEqualToZero),
            _ => None,
        }
    }
}

/// A constraint `f(x) = 0` or `f(x) <= 0`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraint {
    /// Identifier, unique among the constraints of an instance
    pub id: u64,
    /// Raw [`Equality`] value
    pub equality: i32,
    /// Left hand side, absent means zero
    pub function: Option<Function>,
    /// Free-form key/value metadata
    pub parameters: BTreeMap<String, String>,
    /// Name of the constraint family
    pub name: Option<String>,
    /// Human readable description
    pub description: Option<String>,
    /// Position in a multi-dimensional family
    pub subscripts: Vec<i64>,
    /// Fields not defined by `ommx.v1.Constraint`
    pub unknown_fields: UnknownFields,
}

impl Constraint {
    /// Creates a constraint with the given function
    pub fn new(id: u64, equality: Equality, function: impl Into<Function>) -> Self {
        Self {
            id,
            equality: equality.into(),
            function: Some(function.into()),
            ..Self::default()
        }
    }

    /// `f(x) = 0`
    pub fn equal_to_zero(id: u64, function: impl Into<Function>) -> Self {
        Self::new(id, Equality::EqualToZero, function)
    }

    /// `f(x) <= 0`
    pub fn less_than_or_equal_to_zero(id: u64, function: impl Into<Function>) -> Self {
        Self::new(id, Equality::LessThanOrEqualToZero, function)
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

    /// Known equality, [`Equality::Unspecified`] for values this schema does not define
    pub fn equality(&self) -> Equality {
        Equality::try_from(self.equality).unwrap_or_default()
    }

    /// Sets the equality
    pub fn set_equality(&mut self, equality: Equality) {
        self.equality = equality.into();
    }
}

impl Message for Constraint {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        if self.id != 0 {
            uint64::encode(1, &self.id, buf);
        }
        if self.equality != 0 {
            int32::encode(2, &self.equality, buf);
        }
        if let Some(function) = &self.function {
            message::encode(3, function, buf);
        }
        btree_map::encode(
            string::encode,
            string::encoded_len,
            string::encode,
            string::encoded_len,
            5,
            &self.parameters,
            buf,
        );
        if let Some(name) = &self.name {
            string::encode(6, name, buf);
        }
        if let Some(description) = &self.description {
            string::encode(7, description, buf);
        }
        int64::encode_packed(8, &self.subscripts, buf);
        self.unknown_fields.encode_raw(buf);
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        const STRUCT_NAME: &str = "Constraint";
        match tag {
            1 => uint64::merge(wire_type, &mut self.id, buf, ctx).map_err(|mut error| {
                error.push(STRUCT_NAME, "id");
                error
            }),
            2 => int32::merge(wire_type, &mut self.equality, buf, ctx).map_err(|mut error| {
                error.push(STRUCT_NAME, "equality");
                error
            }),
            3 => message::merge(
                wire_type,
                self.function.get_or_insert_with(Function::default),
                buf,
                ctx,
            )
            .map_err(|mut error| {
                error.push(STRUCT_NAME, "function");
                error
            }),
            5 => check_wire_type(WireType::LengthDelimited, wire_type)
                .and_then(|()| {
                    btree_map::merge(string::merge, string::merge, &mut self.parameters, buf, ctx)
                })
                .map_err(|mut error| {
                    error.push(STRUCT_NAME, "parameters");
                    error
                }),
            6 => string::merge(
                wire_type,
                self.name.get_or_insert_with(String::new),
                buf,
                ctx,
            )
            .map_err(|mut error| {
                error.push(STRUCT_NAME, "name");
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
            8 => int64::merge_repeated(wire_type, &mut self.subscripts, buf, ctx).map_err(
                |mut error| {
                    error.push(STRUCT_NAME, "subscripts");
                    error
                },
            ),
            _ => self.unknown_fields.merge_field(tag, wire_type, buf),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = btree_map::encoded_len(
            string::encoded_len,
            string::encoded_len,
            5,
            &self.parameters,
        ) + int64::encoded_len_packed(8, &self.subscripts)
            + self.unknown_fields.encoded_len();
        if self.id != 0 {
            len += uint64::encoded_len(1, &self.id);
        }
        if self.equality != 0 {
            len += int32::encoded_len(2, &self.equality);
        }
        if let Some(function) = &self.function {
            len += message::encoded_len(3, function);
        }
        if let Some(name) = &self.name {
            len += string::encoded_len(6, name);
        }
        if let Some(description) = &self.description {
            len += string::encoded_len(7, description);
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
    use crate::model::Linear;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip() {
        let constraint = Constraint::less_than_or_equal_to_zero(
            4,
            Linear::new([(1, 1.0), (2, 1.0)], -10.0),
        )
        .with_name("capacity", vec![-1, 3])
        .with_parameter("source", "knapsack")
        .with_parameter("group", "a");
        let decoded = Constraint::decode(constraint.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, constraint);
        assert_eq!(decoded.equality(), Equality::LessThanOrEqualToZero);
    }

    #[test]
    fn test_empty_name_is_present() {
        let constraint = Constraint {
            name: Some(String::new()),
            ..Constraint::default()
        };
        let bytes = constraint.encode_to_vec();
        assert_eq!(bytes, vec![0x32, 0x00]);
        assert_eq!(Constraint::decode(bytes.as_slice()).unwrap().name, Some(String::new()));
        assert_eq!(Constraint::decode(&[] as &[u8]).unwrap().name, None);
    }

    #[test]
    fn test_unknown_equality_is_kept() {
        let constraint = Constraint {
            equality: 9,
            ..Constraint::default()
        };
        let decoded = Constraint::decode(constraint.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.equality, 9);
        assert_eq!(decoded.equality(), Equality::Unspecified);
    }

    #[test]
    fn test_parameters_map_wrong_wire_type_fails() {
        // field 5 sent as varint
        assert!(Constraint::decode([0x28u8, 0x01].as_slice()).is_err());
    }

    #[test]
    fn test_last_parameter_value_wins() {
        let mut bytes = Constraint::default().with_parameter("k", "1").encode_to_vec();
        bytes.extend(Constraint::default().with_parameter("k", "2").encode_to_vec());
        let decoded = Constraint::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded.parameters.get("k").map(String::as_str), Some("2"));
    }
}
