//! Semantic checks on decoded instances.
//!
//! Decoding only guarantees a structurally valid message. The checks here
//! catch what the wire format cannot express: duplicate ids, unusable
//! bounds, mismatched quadratic sequences and references to undeclared
//! decision variables.

use crate::error::Result;
use crate::model::{
    Constraint, DecisionVariable, Equality, Expression, Function, Instance, Kind, Sense,
};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, trace};

/// Where in an instance a function lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionLocation {
    /// The objective
    Objective,
    /// The function of the constraint with this id
    Constraint(u64),
}

impl std::fmt::Display for FunctionLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionLocation::Objective => write!(f, "objective"),
            FunctionLocation::Constraint(id) => write!(f, "constraint {}", id),
        }
    }
}

/// A semantic problem found in a message
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ValidationError {
    /// `rows`, `columns` and `values` of a quadratic function differ in length
    #[error("quadratic sequences differ in length: rows={rows}, columns={columns}, values={values}")]
    QuadraticShape {
        /// Length of `rows`
        rows: usize,
        /// Length of `columns`
        columns: usize,
        /// Length of `values`
        values: usize,
    },

    /// Two decision variables share an id
    #[error("duplicate decision variable id {id}")]
    DuplicateVariableId {
        /// The repeated id
        id: u64,
    },

    /// Two constraints share an id
    #[error("duplicate constraint id {id}")]
    DuplicateConstraintId {
        /// The repeated id
        id: u64,
    },

    /// A bound contains NaN
    #[error("bound of decision variable {id} is not a number: [{lower}, {upper}]")]
    BoundNotANumber {
        /// Decision variable id
        id: u64,
        /// Lower bound
        lower: f64,
        /// Upper bound
        upper: f64,
    },

    /// Lower bound is +inf or upper bound is -inf
    #[error("bound of decision variable {id} has an invalid infinity: [{lower}, {upper}]")]
    BoundInvalidInfinity {
        /// Decision variable id
        id: u64,
        /// Lower bound
        lower: f64,
        /// Upper bound
        upper: f64,
    },

    /// Lower bound is greater than upper bound
    #[error("bound of decision variable {id} is empty: {lower} > {upper}")]
    BoundLowerAboveUpper {
        /// Decision variable id
        id: u64,
        /// Lower bound
        lower: f64,
        /// Upper bound
        upper: f64,
    },

    /// A function refers to an id no decision variable declares
    #[error("{location} refers to undefined decision variable {id}")]
    UndefinedVariable {
        /// Function that holds the reference
        location: FunctionLocation,
        /// Undeclared id
        id: u64,
    },

    /// A function of the instance is malformed
    #[error("{location}: {source}")]
    InFunction {
        /// Function that is malformed
        location: FunctionLocation,
        /// What is wrong with it
        source: Box<ValidationError>,
    },

    /// An enum field holds a value this schema does not define
    #[error("{field} has unknown value {value}")]
    UnknownEnumValue {
        /// Qualified field name, e.g. `Instance.sense`
        field: &'static str,
        /// Raw value
        value: i32,
    },
}

/// Which optional checks [`Instance::validation_issues`] runs
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Report ids used by functions but not declared as decision variables
    pub check_references: bool,
    /// Report enum values this schema does not define
    pub reject_unknown_enums: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_references: true,
            reject_unknown_enums: false,
        }
    }
}

impl ValidationConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether undeclared variable references are reported
    pub fn check_references(mut self, check: bool) -> Self {
        self.check_references = check;
        self
    }

    /// Sets whether unknown enum values are reported
    pub fn reject_unknown_enums(mut self, reject: bool) -> Self {
        self.reject_unknown_enums = reject;
        self
    }
}

fn function_shape(function: &Function) -> std::result::Result<(), ValidationError> {
    match &function.expression {
        Some(Expression::Quadratic(quadratic)) => quadratic.validate_shape(),
        _ => Ok(()),
    }
}

fn check_function(
    location: FunctionLocation,
    function: &Function,
    declared: &BTreeSet<u64>,
    config: &ValidationConfig,
    issues: &mut Vec<ValidationError>,
) {
    if let Err(error) = function_shape(function) {
        issues.push(ValidationError::InFunction {
            location,
            source: Box::new(error),
        });
    }
    if config.check_references {
        for id in function.used_decision_variable_ids() {
            if !declared.contains(&id) {
                issues.push(ValidationError::UndefinedVariable { location, id });
            }
        }
    }
}

fn check_variable(
    variable: &DecisionVariable,
    config: &ValidationConfig,
    issues: &mut Vec<ValidationError>,
) {
    if let Some(bound) = &variable.bound {
        if let Err(error) = bound.check(variable.id) {
            issues.push(error);
        }
    }
    if config.reject_unknown_enums && Kind::try_from(variable.kind).is_err() {
        issues.push(ValidationError::UnknownEnumValue {
            field: "DecisionVariable.kind",
            value: variable.kind,
        });
    }
}

fn check_constraint_enum(constraint: &Constraint, issues: &mut Vec<ValidationError>) {
    if Equality::try_from(constraint.equality).is_err() {
        issues.push(ValidationError::UnknownEnumValue {
            field: "Constraint.equality",
            value: constraint.equality,
        });
    }
}

impl Instance {
    /// Every semantic problem of the instance, in declaration order
    pub fn validation_issues(&self, config: &ValidationConfig) -> Vec<ValidationError> {
        let mut issues = Vec::new();

        let mut declared = BTreeSet::new();
        for variable in &self.decision_variables {
            if !declared.insert(variable.id) {
                issues.push(ValidationError::DuplicateVariableId { id: variable.id });
            }
            check_variable(variable, config, &mut issues);
        }

        if let Some(objective) = &self.objective {
            check_function(
                FunctionLocation::Objective,
                objective,
                &declared,
                config,
                &mut issues,
            );
        }

        let mut constraint_ids = BTreeSet::new();
        for constraint in &self.constraints {
            if !constraint_ids.insert(constraint.id) {
                issues.push(ValidationError::DuplicateConstraintId { id: constraint.id });
            }
            if let Some(function) = &constraint.function {
                check_function(
                    FunctionLocation::Constraint(constraint.id),
                    function,
                    &declared,
                    config,
                    &mut issues,
                );
            }
            if config.reject_unknown_enums {
                check_constraint_enum(constraint, &mut issues);
            }
        }

        if config.reject_unknown_enums && Sense::try_from(self.sense).is_err() {
            issues.push(ValidationError::UnknownEnumValue {
                field: "Instance.sense",
                value: self.sense,
            });
        }

        for issue in &issues {
            trace!("validation issue: {}", issue);
        }
        debug!(
            "Validated instance: {} variables, {} constraints, {} issues",
            self.decision_variables.len(),
            self.constraints.len(),
            issues.len()
        );
        issues
    }

    /// Fails with the first semantic problem of the instance
    pub fn validate(&self, config: &ValidationConfig) -> Result<()> {
        match self.validation_issues(config).into_iter().next() {
            Some(issue) => Err(issue.into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::{Linear, Polynomial, Quadratic};
    use pretty_assertions::assert_eq;

    fn two_variables() -> Instance {
        Instance::new(Sense::Minimize, Linear::new([(0, 1.0), (1, 1.0)], 0.0))
            .with_decision_variable(DecisionVariable::binary(0))
            .with_decision_variable(DecisionVariable::continuous(1, 0.0, 10.0))
    }

    #[test]
    fn test_valid_instance() {
        let instance = two_variables()
            .with_constraint(Constraint::equal_to_zero(0, Linear::new([(0, 1.0)], -1.0)));
        assert!(instance.validation_issues(&ValidationConfig::default()).is_empty());
        assert!(instance.validate(&ValidationConfig::default()).is_ok());
    }

    #[test]
    fn test_duplicate_ids() {
        let instance = two_variables()
            .with_decision_variable(DecisionVariable::binary(1))
            .with_constraint(Constraint::equal_to_zero(5, 0.0))
            .with_constraint(Constraint::equal_to_zero(5, 1.0));
        assert_eq!(
            instance.validation_issues(&ValidationConfig::default()),
            vec![
                ValidationError::DuplicateVariableId { id: 1 },
                ValidationError::DuplicateConstraintId { id: 5 },
            ]
        );
    }

    #[test]
    fn test_invalid_bound() {
        let instance =
            two_variables().with_decision_variable(DecisionVariable::continuous(2, 3.0, 1.0));
        assert_eq!(
            instance.validation_issues(&ValidationConfig::default()),
            vec![ValidationError::BoundLowerAboveUpper {
                id: 2,
                lower: 3.0,
                upper: 1.0
            }]
        );
    }

    #[test]
    fn test_quadratic_shape_in_constraint() {
        let quadratic = Quadratic {
            rows: vec![0],
            columns: vec![0, 1],
            values: vec![1.0],
            ..Quadratic::default()
        };
        let instance = two_variables().with_constraint(Constraint::equal_to_zero(3, quadratic));
        let issues = instance.validation_issues(&ValidationConfig::default());
        assert_eq!(
            issues,
            vec![ValidationError::InFunction {
                location: FunctionLocation::Constraint(3),
                source: Box::new(ValidationError::QuadraticShape {
                    rows: 1,
                    columns: 2,
                    values: 1
                }),
            }]
        );
        assert_eq!(
            issues[0].to_string(),
            "constraint 3: quadratic sequences differ in length: rows=1, columns=2, values=1"
        );
    }

    #[test]
    fn test_undefined_reference() {
        let mut instance = two_variables();
        instance.objective = Some(Polynomial::new([(vec![0, 9], 1.0)]).into());

        assert_eq!(
            instance.validation_issues(&ValidationConfig::default()),
            vec![ValidationError::UndefinedVariable {
                location: FunctionLocation::Objective,
                id: 9
            }]
        );
        assert!(instance
            .validation_issues(&ValidationConfig::new().check_references(false))
            .is_empty());
    }

    #[test]
    fn test_unknown_enums_only_when_requested() {
        let mut instance = two_variables();
        instance.sense = 3;
        assert!(instance.validate(&ValidationConfig::default()).is_ok());

        let err = instance
            .validate(&ValidationConfig::new().reject_unknown_enums(true))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::UnknownEnumValue {
                field: "Instance.sense",
                value: 3
            })
        ));
    }
}
