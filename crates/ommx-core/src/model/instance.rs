use super::{Constraint, DecisionVariable, Expression, Function, Kind};
use crate::wire::UnknownFields;
use bytes::{Buf, BufMut};
use prost::encoding::{int32, message, string, DecodeContext, WireType};
use prost::{DecodeError, Message};
use std::collections::BTreeMap;

static ZERO_FUNCTION: Function = Function {
    expression: None,
    unknown_fields: UnknownFields::new(),
};

/// Whether the objective is minimized or maximized
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Sense {
    /// Not specified
    Unspecified = 0,
    /// Minimize the objective
    Minimize = 1,
    /// Maximize the objective
    Maximize = 2,
}

impl Sense {
    /// Enum value name as written in the schema
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Sense::Unspecified => "SENSE_UNSPECIFIED",
            Sense::Minimize => "SENSE_MINIMIZE",
            Sense::Maximize => "SENSE_MAXIMIZE",
        }
    }

    /// Parses an enum value name as written in the schema
    pub fn from_str_name(value: &str) -> Option<Self> {
        match value {
            "SENSE_UNSPECIFIED" => Some(Self::Unspecified),
            "SENSE_MINIMIZE" => Some(Self::Minimize),
            "SENSE_MAXIMIZE" => Some(Self::Maximize),
            _ => None,
        }
    }
}

/// Metadata of an [`Instance`].
///
/// `name`, `description` and `created_by` distinguish an absent value
/// (`None`) from an empty one (`Some("")`) on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceDescription {
    /// Name of the problem
    pub name: Option<String>,
    /// Free text description
    pub description: Option<String>,
    /// Authors in order
    pub authors: Vec<String>,
    /// Tool or person that produced the instance
    pub created_by: Option<String>,
    /// Fields not defined by `ommx.v1.Instance.Description`
    pub unknown_fields: UnknownFields,
}

impl Message for InstanceDescription {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        if let Some(name) = &self.name {
            string::encode(1, name, buf);
        }
        if let Some(description) = &self.description {
            string::encode(2, description, buf);
        }
        string::encode_repeated(3, &self.authors, buf);
        if let Some(created_by) = &self.created_by {
            string::encode(4, created_by, buf);
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
        const STRUCT_NAME: &str = "Instance.Description";
        match tag {
            1 => string::merge(
                wire_type,
                self.name.get_or_insert_with(String::new),
                buf,
                ctx,
            )
            .map_err(|mut error| {
                error.push(STRUCT_NAME, "name");
                error
            }),
            2 => string::merge(
                wire_type,
                self.description.get_or_insert_with(String::new),
                buf,
                ctx,
            )
            .map_err(|mut error| {
                error.push(STRUCT_NAME, "description");
                error
            }),
            3 => string::merge_repeated(wire_type, &mut self.authors, buf, ctx).map_err(
                |mut error| {
                    error.push(STRUCT_NAME, "authors");
                    error
                },
            ),
            4 => string::merge(
                wire_type,
                self.created_by.get_or_insert_with(String::new),
                buf,
                ctx,
            )
            .map_err(|mut error| {
                error.push(STRUCT_NAME, "created_by");
                error
            }),
            _ => self.unknown_fields.merge_field(tag, wire_type, buf),
        }
    }

    fn encoded_len(&self) -> usize {
        self.name
            .as_ref()
            .map_or(0, |name| string::encoded_len(1, name))
            + self
                .description
                .as_ref()
                .map_or(0, |description| string::encoded_len(2, description))
            + string::encoded_len_repeated(3, &self.authors)
            + self
                .created_by
                .as_ref()
                .map_or(0, |created_by| string::encoded_len(4, created_by))
            + self.unknown_fields.encoded_len()
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// An optimization problem
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instance {
    /// Optional metadata
    pub description: Option<InstanceDescription>,
    /// Decision variables in declaration order
    pub decision_variables: Vec<DecisionVariable>,
    /// Objective, absent means the zero function
    pub objective: Option<Function>,
    /// Constraints in declaration order
    pub constraints: Vec<Constraint>,
    /// Raw [`Sense`] value, kept as is when not a known sense
    pub sense: i32,
    /// Fields not defined by `ommx.v1.Instance`
    pub unknown_fields: UnknownFields,
}

impl Instance {
    /// Creates an instance with the given sense and objective
    pub fn new(sense: Sense, objective: impl Into<Function>) -> Self {
        Self {
            sense: sense.into(),
            objective: Some(objective.into()),
            ..Self::default()
        }
    }

    /// Appends a decision variable
    pub fn with_decision_variable(mut self, variable: DecisionVariable) -> Self {
        self.decision_variables.push(variable);
        self
    }

    /// Appends a constraint
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Sets the description
    pub fn with_description(mut self, description: InstanceDescription) -> Self {
        self.description = Some(description);
        self
    }

    /// Known sense, [`Sense::Unspecified`] for values this schema does not define
    pub fn sense(&self) -> Sense {
        Sense::try_from(self.sense).unwrap_or_default()
    }

    /// Sets the sense
    pub fn set_sense(&mut self, sense: Sense) {
        self.sense = sense.into();
    }

    /// Objective, the zero function when absent
    pub fn objective(&self) -> &Function {
        self.objective.as_ref().unwrap_or(&ZERO_FUNCTION)
    }

    /// First decision variable with the given id
    pub fn decision_variable(&self, id: u64) -> Option<&DecisionVariable> {
        self.decision_variables.iter().find(|v| v.id == id)
    }

    /// First constraint with the given id
    pub fn constraint(&self, id: u64) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.id == id)
    }

    /// Number of decision variables per kind; unknown kinds count as unspecified
    pub fn decision_variable_counts(&self) -> BTreeMap<Kind, usize> {
        let mut counts = BTreeMap::new();
        for variable in &self.decision_variables {
            *counts.entry(variable.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Number of unknown fields captured anywhere in the instance
    pub fn unknown_field_count(&self) -> usize {
        let description = self.description.as_ref().map_or(0, |d| d.unknown_fields.len());
        let variables: usize = self
            .decision_variables
            .iter()
            .map(|v| {
                v.unknown_fields.len() + v.bound.as_ref().map_or(0, |b| b.unknown_fields.len())
            })
            .sum();
        let constraints: usize = self
            .constraints
            .iter()
            .map(|c| c.unknown_fields.len() + c.function.as_ref().map_or(0, function_unknown_count))
            .sum();
        self.unknown_fields.len()
            + description
            + variables
            + self.objective.as_ref().map_or(0, function_unknown_count)
            + constraints
    }
}

fn function_unknown_count(function: &Function) -> usize {
    let expression = match &function.expression {
        None | Some(Expression::Constant(_)) => 0,
        Some(Expression::Linear(linear)) => {
            linear.unknown_fields.len()
                + linear.terms.iter().map(|t| t.unknown_fields.len()).sum::<usize>()
        }
        Some(Expression::Quadratic(quadratic)) => {
            quadratic.unknown_fields.len()
                + quadratic.linear.as_ref().map_or(0, |linear| {
                    linear.unknown_fields.len()
                        + linear.terms.iter().map(|t| t.unknown_fields.len()).sum::<usize>()
                })
        }
        Some(Expression::Polynomial(polynomial)) => {
            polynomial.unknown_fields.len()
                + polynomial.terms.iter().map(|t| t.unknown_fields.len()).sum::<usize>()
        }
    };
    function.unknown_fields.len() + expression
}

impl Message for Instance {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        if let Some(description) = &self.description {
            message::encode(1, description, buf);
        }
        message::encode_repeated(2, &self.decision_variables, buf);
        if let Some(objective) = &self.objective {
            message::encode(3, objective, buf);
        }
        message::encode_repeated(4, &self.constraints, buf);
        if self.sense != 0 {
            int32::encode(5, &self.sense, buf);
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
        const STRUCT_NAME: &str = "Instance";
        match tag {
            1 => message::merge(
                wire_type,
                self.description
                    .get_or_insert_with(InstanceDescription::default),
                buf,
                ctx,
            )
            .map_err(|mut error| {
                error.push(STRUCT_NAME, "description");
                error
            }),
            2 => message::merge_repeated(wire_type, &mut self.decision_variables, buf, ctx)
                .map_err(|mut error| {
                    error.push(STRUCT_NAME, "decision_variables");
                    error
                }),
            3 => message::merge(
                wire_type,
                self.objective.get_or_insert_with(Function::default),
                buf,
                ctx,
            )
            .map_err(|mut error| {
                error.push(STRUCT_NAME, "objective");
                error
            }),
            4 => message::merge_repeated(wire_type, &mut self.constraints, buf, ctx).map_err(
                |mut error| {
                    error.push(STRUCT_NAME, "constraints");
                    error
                },
            ),
            5 => int32::merge(wire_type, &mut self.sense, buf, ctx).map_err(|mut error| {
                error.push(STRUCT_NAME, "sense");
                error
            }),
            _ => self.unknown_fields.merge_field(tag, wire_type, buf),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = message::encoded_len_repeated(2, &self.decision_variables)
            + message::encoded_len_repeated(4, &self.constraints)
            + self.unknown_fields.encoded_len();
        if let Some(description) = &self.description {
            len += message::encoded_len(1, description);
        }
        if let Some(objective) = &self.objective {
            len += message::encoded_len(3, objective);
        }
        if self.sense != 0 {
            len += int32::encoded_len(5, &self.sense);
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
    use crate::model::{Linear, Quadratic};
    use pretty_assertions::assert_eq;

    fn knapsack() -> Instance {
        Instance::new(Sense::Maximize, Linear::new([(0, 3.0), (1, 5.0)], 0.0))
            .with_description(InstanceDescription {
                name: Some("knapsack".to_string()),
                authors: vec!["A".to_string(), "B".to_string()],
                ..InstanceDescription::default()
            })
            .with_decision_variable(DecisionVariable::binary(0).with_name("x", vec![0]))
            .with_decision_variable(DecisionVariable::binary(1).with_name("x", vec![1]))
            .with_constraint(Constraint::less_than_or_equal_to_zero(
                0,
                Linear::new([(0, 2.0), (1, 4.0)], -5.0),
            ))
    }

    #[test]
    fn test_round_trip() {
        let instance = knapsack();
        let decoded = Instance::decode(instance.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, instance);
        assert_eq!(decoded.sense(), Sense::Maximize);
    }

    #[test]
    fn test_description_tri_state() {
        let description = InstanceDescription {
            name: None,
            description: Some(String::new()),
            authors: Vec::new(),
            created_by: Some("solver".to_string()),
            ..InstanceDescription::default()
        };
        let instance = Instance::default().with_description(description.clone());
        let decoded = Instance::decode(instance.encode_to_vec().as_slice()).unwrap();
        let decoded_description = decoded.description.unwrap();
        assert_eq!(decoded_description.name, None);
        assert_eq!(decoded_description.description, Some(String::new()));
        assert_eq!(decoded_description.created_by, Some("solver".to_string()));
        assert_eq!(decoded_description, description);
    }

    #[test]
    fn test_empty_description_is_present() {
        let instance = Instance::default().with_description(InstanceDescription::default());
        assert_eq!(instance.encode_to_vec(), vec![0x0A, 0x00]);
        let decoded = Instance::decode([0x0Au8, 0x00].as_slice()).unwrap();
        assert_eq!(decoded.description, Some(InstanceDescription::default()));
    }

    #[test]
    fn test_unknown_sense_round_trips() {
        let decoded = Instance::decode([0x28u8, 0x03].as_slice()).unwrap();
        assert_eq!(decoded.sense, 3);
        assert_eq!(decoded.sense(), Sense::Unspecified);
        assert_eq!(decoded.encode_to_vec(), vec![0x28, 0x03]);
    }

    #[test]
    fn test_unknown_fields_preserved() {
        let mut bytes = knapsack().encode_to_vec();
        // field 99 varint 42
        bytes.extend_from_slice(&[0x98, 0x06, 0x2A]);
        // field 15 group containing field 1 varint 5
        bytes.extend_from_slice(&[0x7B, 0x08, 0x05, 0x7C]);
        // field 100 LEN "hi"
        bytes.extend_from_slice(&[0xA2, 0x06, 0x02, b'h', b'i']);

        let decoded = Instance::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded.unknown_fields.len(), 3);
        assert_eq!(decoded.unknown_field_count(), 3);
        assert_eq!(decoded.encode_to_vec(), bytes);
    }

    #[test]
    fn test_nested_unknown_fields_preserved() {
        let mut linear_bytes = Linear::single_term(1, 2.0).encode_to_vec();
        // field 7 fixed32
        linear_bytes.extend_from_slice(&[0x3D, 0x01, 0x02, 0x03, 0x04]);
        let linear = Linear::decode(linear_bytes.as_slice()).unwrap();
        let quadratic = Quadratic::new([(1, 1, 1.0)], Some(linear));

        let instance = Instance::new(Sense::Minimize, quadratic);
        let decoded = Instance::decode(instance.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, instance);
        assert_eq!(decoded.unknown_field_count(), 1);
        assert_eq!(
            decoded.objective().quadratic().linear.as_ref().unwrap().encode_to_vec(),
            linear_bytes
        );
    }

    #[test]
    fn test_objective_defaults_to_zero_function() {
        let instance = Instance::default();
        assert_eq!(instance.objective().kind(), None);
        assert_eq!(instance.objective().constant(), 0.0);
    }

    #[test]
    fn test_decision_variable_counts() {
        let counts = knapsack().decision_variable_counts();
        assert_eq!(counts.get(&Kind::Binary), Some(&2));
        assert_eq!(counts.get(&Kind::Continuous), None);
    }

    #[test]
    fn test_malformed_inputs_fail() {
        // description with a truncated name
        assert!(Instance::decode([0x0Au8, 0x05, 0x0A, 0x03, b'a'].as_slice()).is_err());
        // description name is not UTF-8
        assert!(Instance::decode([0x0Au8, 0x03, 0x0A, 0x01, 0xFF].as_slice()).is_err());
        // field number 0
        assert!(Instance::decode([0x00u8, 0x01].as_slice()).is_err());
        // wire type 6 and 7
        assert!(Instance::decode([0x0Eu8, 0x01].as_slice()).is_err());
        assert!(Instance::decode([0x9Fu8, 0x06, 0x01].as_slice()).is_err());
        // end group without start
        assert!(Instance::decode([0xA4u8, 0x01].as_slice()).is_err());
        // group closed by the wrong field
        assert!(Instance::decode([0x7Bu8, 0x84, 0x01].as_slice()).is_err());
        // truncated varint
        assert!(Instance::decode([0x28u8, 0x80].as_slice()).is_err());
        // sense with the wrong wire type
        assert!(Instance::decode([0x2Du8, 0x00, 0x00, 0x00, 0x00].as_slice()).is_err());
    }
}
