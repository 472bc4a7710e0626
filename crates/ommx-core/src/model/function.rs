use super::{Linear, Polynomial, Quadratic};
use crate::wire::UnknownFields;
use bytes::{Buf, BufMut};
use prost::encoding::{double, message, DecodeContext, WireType};
use prost::{DecodeError, Message};
use std::collections::BTreeSet;
use std::fmt;

static EMPTY_LINEAR: Linear = Linear {
    terms: Vec::new(),
    constant: 0.0,
    unknown_fields: UnknownFields::new(),
};

static EMPTY_QUADRATIC: Quadratic = Quadratic {
    rows: Vec::new(),
    columns: Vec::new(),
    values: Vec::new(),
    linear: None,
    unknown_fields: UnknownFields::new(),
};

static EMPTY_POLYNOMIAL: Polynomial = Polynomial {
    terms: Vec::new(),
    unknown_fields: UnknownFields::new(),
};

/// Payload of a [`Function`], one variant per member of the `function` oneof
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant function, field 1
    Constant(f64),
    /// Linear function, field 2
    Linear(Linear),
    /// Quadratic function, field 3
    Quadratic(Quadratic),
    /// Polynomial, field 4
    Polynomial(Polynomial),
}

impl Expression {
    /// Discriminant of this expression
    pub fn kind(&self) -> ExpressionKind {
        match self {
            Expression::Constant(_) => ExpressionKind::Constant,
            Expression::Linear(_) => ExpressionKind::Linear,
            Expression::Quadratic(_) => ExpressionKind::Quadratic,
            Expression::Polynomial(_) => ExpressionKind::Polynomial,
        }
    }
}

/// Which member of the `function` oneof is set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExpressionKind {
    /// Constant
    Constant,
    /// Linear
    Linear,
    /// Quadratic
    Quadratic,
    /// Polynomial
    Polynomial,
}

impl ExpressionKind {
    /// Field name in the schema
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpressionKind::Constant => "constant",
            ExpressionKind::Linear => "linear",
            ExpressionKind::Quadratic => "quadratic",
            ExpressionKind::Polynomial => "polynomial",
        }
    }
}

impl fmt::Display for ExpressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Real valued function used as objective and as constraint body.
///
/// At most one expression is held; every setter replaces the previous
/// one. Getters of an inactive variant return its zero value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Function {
    /// Active member of the oneof, `None` when unset
    pub expression: Option<Expression>,
    /// Fields not defined by `ommx.v1.Function`
    pub unknown_fields: UnknownFields,
}

impl From<Expression> for Function {
    fn from(expression: Expression) -> Self {
        Self {
            expression: Some(expression),
            unknown_fields: UnknownFields::new(),
        }
    }
}

impl From<f64> for Function {
    fn from(value: f64) -> Self {
        Expression::Constant(value).into()
    }
}

impl From<Linear> for Function {
    fn from(linear: Linear) -> Self {
        Expression::Linear(linear).into()
    }
}

impl From<Quadratic> for Function {
    fn from(quadratic: Quadratic) -> Self {
        Expression::Quadratic(quadratic).into()
    }
}

impl From<Polynomial> for Function {
    fn from(polynomial: Polynomial) -> Self {
        Expression::Polynomial(polynomial).into()
    }
}

impl Function {
    /// Active variant, `None` if nothing is set
    pub fn kind(&self) -> Option<ExpressionKind> {
        self.expression.as_ref().map(Expression::kind)
    }

    /// Removes the active variant
    pub fn clear_expression(&mut self) {
        self.expression = None;
    }

    /// Replaces the active variant with a constant
    pub fn set_constant(&mut self, value: f64) {
        self.expression = Some(Expression::Constant(value));
    }

    /// Replaces the active variant with a linear function
    pub fn set_linear(&mut self, linear: Linear) {
        self.expression = Some(Expression::Linear(linear));
    }

    /// Replaces the active variant with a quadratic function
    pub fn set_quadratic(&mut self, quadratic: Quadratic) {
        self.expression = Some(Expression::Quadratic(quadratic));
    }

    /// Replaces the active variant with a polynomial
    pub fn set_polynomial(&mut self, polynomial: Polynomial) {
        self.expression = Some(Expression::Polynomial(polynomial));
    }

    /// True if the constant variant is set
    pub fn has_constant(&self) -> bool {
        matches!(self.expression, Some(Expression::Constant(_)))
    }

    /// True if the linear variant is set
    pub fn has_linear(&self) -> bool {
        matches!(self.expression, Some(Expression::Linear(_)))
    }

    /// True if the quadratic variant is set
    pub fn has_quadratic(&self) -> bool {
        matches!(self.expression, Some(Expression::Quadratic(_)))
    }

    /// True if the polynomial variant is set
    pub fn has_polynomial(&self) -> bool {
        matches!(self.expression, Some(Expression::Polynomial(_)))
    }

    /// The constant, or `0.0` if another variant is active
    pub fn constant(&self) -> f64 {
        match &self.expression {
            Some(Expression::Constant(value)) => *value,
            _ => 0.0,
        }
    }

    /// The linear function, or an empty one if another variant is active
    pub fn linear(&self) -> &Linear {
        match &self.expression {
            Some(Expression::Linear(linear)) => linear,
            _ => &EMPTY_LINEAR,
        }
    }

    /// The quadratic function, or an empty one if another variant is active
    pub fn quadratic(&self) -> &Quadratic {
        match &self.expression {
            Some(Expression::Quadratic(quadratic)) => quadratic,
            _ => &EMPTY_QUADRATIC,
        }
    }

    /// The polynomial, or an empty one if another variant is active
    pub fn polynomial(&self) -> &Polynomial {
        match &self.expression {
            Some(Expression::Polynomial(polynomial)) => polynomial,
            _ => &EMPTY_POLYNOMIAL,
        }
    }

    /// Degree of the active expression, 0 when unset
    pub fn degree(&self) -> u32 {
        match &self.expression {
            None | Some(Expression::Constant(_)) => 0,
            Some(Expression::Linear(linear)) => linear.degree(),
            Some(Expression::Quadratic(quadratic)) => quadratic.degree(),
            Some(Expression::Polynomial(polynomial)) => polynomial.degree(),
        }
    }

    /// Normalizes the active expression in place
    pub fn normalize(&mut self) {
        match &mut self.expression {
            None | Some(Expression::Constant(_)) => {}
            Some(Expression::Linear(linear)) => linear.normalize(),
            Some(Expression::Quadratic(quadratic)) => quadratic.normalize(),
            Some(Expression::Polynomial(polynomial)) => polynomial.normalize(),
        }
    }

    /// Every id referenced by the active expression
    pub fn used_decision_variable_ids(&self) -> BTreeSet<u64> {
        match &self.expression {
            None | Some(Expression::Constant(_)) => BTreeSet::new(),
            Some(Expression::Linear(linear)) => linear.used_decision_variable_ids(),
            Some(Expression::Quadratic(quadratic)) => quadratic.used_decision_variable_ids(),
            Some(Expression::Polynomial(polynomial)) => polynomial.used_decision_variable_ids(),
        }
    }
}

impl Message for Function {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        match &self.expression {
            None => {}
            Some(Expression::Constant(value)) => double::encode(1, value, buf),
            Some(Expression::Linear(linear)) => message::encode(2, linear, buf),
            Some(Expression::Quadratic(quadratic)) => message::encode(3, quadratic, buf),
            Some(Expression::Polynomial(polynomial)) => message::encode(4, polynomial, buf),
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
        const STRUCT_NAME: &str = "Function";
        // A repeated occurrence of the active member merges into it; any
        // other member replaces it.
        let result = match tag {
            1 => match &mut self.expression {
                Some(Expression::Constant(value)) => double::merge(wire_type, value, buf, ctx),
                _ => {
                    let mut value = 0.0;
                    double::merge(wire_type, &mut value, buf, ctx)
                        .map(|()| self.expression = Some(Expression::Constant(value)))
                }
            },
            2 => match &mut self.expression {
                Some(Expression::Linear(linear)) => message::merge(wire_type, linear, buf, ctx),
                _ => {
                    let mut linear = Linear::default();
                    message::merge(wire_type, &mut linear, buf, ctx)
                        .map(|()| self.expression = Some(Expression::Linear(linear)))
                }
            },
            3 => match &mut self.expression {
                Some(Expression::Quadratic(quadratic)) => {
                    message::merge(wire_type, quadratic, buf, ctx)
                }
                _ => {
                    let mut quadratic = Quadratic::default();
                    message::merge(wire_type, &mut quadratic, buf, ctx)
                        .map(|()| self.expression = Some(Expression::Quadratic(quadratic)))
                }
            },
            4 => match &mut self.expression {
                Some(Expression::Polynomial(polynomial)) => {
                    message::merge(wire_type, polynomial, buf, ctx)
                }
                _ => {
                    let mut polynomial = Polynomial::default();
                    message::merge(wire_type, &mut polynomial, buf, ctx)
                        .map(|()| self.expression = Some(Expression::Polynomial(polynomial)))
                }
            },
            _ => return self.unknown_fields.merge_field(tag, wire_type, buf),
        };
        result.map_err(|mut error| {
            error.push(STRUCT_NAME, "function");
            error
        })
    }

    fn encoded_len(&self) -> usize {
        let expression_len = match &self.expression {
            None => 0,
            Some(Expression::Constant(value)) => double::encoded_len(1, value),
            Some(Expression::Linear(linear)) => message::encoded_len(2, linear),
            Some(Expression::Quadratic(quadratic)) => message::encoded_len(3, quadratic),
            Some(Expression::Polynomial(polynomial)) => message::encoded_len(4, polynomial),
        };
        expression_len + self.unknown_fields.encoded_len()
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}
