//! Evaluation of functions and instances at a [`State`].
//!
//! Repeated terms are summed, so a function evaluates to the same value
//! before and after [`normalize`](crate::model::Function::normalize).
//!
//! [`Evaluate::partial_evaluate`] substitutes only the assigned variables
//! and keeps the rest symbolic. Evaluating the result at the remaining
//! variables gives the same value as a full evaluation.

use crate::error::{Error, Result};
use crate::model::{Equality, Expression, Function, Instance, Linear, Polynomial, Quadratic, State};
use std::collections::BTreeSet;
use tracing::debug;

/// Something that has a value once every decision variable is assigned
pub trait Evaluate {
    /// Value at `state`, failing with [`Error::MissingVariable`] for an unassigned id
    fn evaluate(&self, state: &State) -> Result<f64>;

    /// Substitutes the variables assigned in `state` in place and returns
    /// the ids that were substituted
    fn partial_evaluate(&mut self, state: &State) -> Result<BTreeSet<u64>>;
}

fn lookup(state: &State, id: u64) -> Result<f64> {
    state.get(id).ok_or_else(|| Error::missing_variable(id))
}

impl Evaluate for Linear {
    fn evaluate(&self, state: &State) -> Result<f64> {
        let mut value = self.constant;
        for term in &self.terms {
            value += term.coefficient * lookup(state, term.id)?;
        }
        Ok(value)
    }

    fn partial_evaluate(&mut self, state: &State) -> Result<BTreeSet<u64>> {
        let mut used = BTreeSet::new();
        let mut constant = self.constant;
        self.terms.retain(|term| match state.get(term.id) {
            Some(value) => {
                constant += term.coefficient * value;
                used.insert(term.id);
                false
            }
            None => true,
        });
        self.constant = constant;
        Ok(used)
    }
}

impl Evaluate for Quadratic {
    fn evaluate(&self, state: &State) -> Result<f64> {
        self.validate_shape()?;
        let mut value = match &self.linear {
            Some(linear) => linear.evaluate(state)?,
            None => 0.0,
        };
        for (row, column, coefficient) in self.entries() {
            value += coefficient * lookup(state, row)? * lookup(state, column)?;
        }
        Ok(value)
    }

    fn partial_evaluate(&mut self, state: &State) -> Result<BTreeSet<u64>> {
        self.validate_shape()?;
        let mut linear = self.linear.take().unwrap_or_default();
        let mut used = linear.partial_evaluate(state)?;

        let entries: Vec<_> = self.entries().collect();
        self.rows.clear();
        self.columns.clear();
        self.values.clear();
        for (row, column, coefficient) in entries {
            match (state.get(row), state.get(column)) {
                (Some(r), Some(c)) => linear.constant += coefficient * r * c,
                (Some(r), None) => linear.add_term(column, coefficient * r),
                (None, Some(c)) => linear.add_term(row, coefficient * c),
                (None, None) => {
                    self.add_entry(row, column, coefficient);
                    continue;
                }
            }
            used.extend([row, column].into_iter().filter(|id| state.get(*id).is_some()));
        }

        if linear != Linear::default() {
            self.linear = Some(linear);
        }
        Ok(used)
    }
}

impl Evaluate for Polynomial {
    fn evaluate(&self, state: &State) -> Result<f64> {
        let mut value = 0.0;
        for term in &self.terms {
            let mut product = term.coefficient;
            for id in &term.ids {
                product *= lookup(state, *id)?;
            }
            value += product;
        }
        Ok(value)
    }

    fn partial_evaluate(&mut self, state: &State) -> Result<BTreeSet<u64>> {
        let mut used = BTreeSet::new();
        for term in &mut self.terms {
            let mut coefficient = term.coefficient;
            term.ids.retain(|id| match state.get(*id) {
                Some(value) => {
                    coefficient *= value;
                    used.insert(*id);
                    false
                }
                None => true,
            });
            term.coefficient = coefficient;
        }
        Ok(used)
    }
}

impl Evaluate for Function {
    fn evaluate(&self, state: &State) -> Result<f64> {
        match &self.expression {
            None => Ok(0.0),
            Some(Expression::Constant(value)) => Ok(*value),
            Some(Expression::Linear(linear)) => linear.evaluate(state),
            Some(Expression::Quadratic(quadratic)) => quadratic.evaluate(state),
            Some(Expression::Polynomial(polynomial)) => polynomial.evaluate(state),
        }
    }

    fn partial_evaluate(&mut self, state: &State) -> Result<BTreeSet<u64>> {
        match &mut self.expression {
            None | Some(Expression::Constant(_)) => Ok(BTreeSet::new()),
            Some(Expression::Linear(linear)) => linear.partial_evaluate(state),
            Some(Expression::Quadratic(quadratic)) => quadratic.partial_evaluate(state),
            Some(Expression::Polynomial(polynomial)) => polynomial.partial_evaluate(state),
        }
    }
}

/// Settings of [`Instance::evaluate`]
#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// Absolute tolerance of the feasibility check
    pub atol: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self { atol: 1e-6 }
    }
}

impl EvaluationConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the absolute tolerance
    pub fn atol(mut self, atol: f64) -> Self {
        self.atol = atol;
        self
    }
}

/// Value of one constraint function
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedConstraint {
    /// Constraint id
    pub id: u64,
    /// Raw equality of the constraint
    pub equality: i32,
    /// `f(x)`
    pub value: f64,
    /// Whether `f(x) = 0` or `f(x) <= 0` holds within tolerance
    pub feasible: bool,
}

/// Result of [`Instance::evaluate`]
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Objective value
    pub objective: f64,
    /// One entry per constraint, in declaration order
    pub constraints: Vec<EvaluatedConstraint>,
}

impl Evaluation {
    /// True if every constraint holds
    pub fn is_feasible(&self) -> bool {
        self.constraints.iter().all(|c| c.feasible)
    }
}

fn is_feasible(equality: i32, value: f64, atol: f64) -> bool {
    match Equality::try_from(equality) {
        Ok(Equality::EqualToZero) => value.abs() <= atol,
        Ok(Equality::LessThanOrEqualToZero) => value <= atol,
        // Nothing to check against
        Ok(Equality::Unspecified) | Err(_) => true,
    }
}

impl Instance {
    /// Evaluates the objective and every constraint at `state`
    pub fn evaluate(&self, state: &State, config: &EvaluationConfig) -> Result<Evaluation> {
        let objective = self.objective().evaluate(state)?;
        let mut constraints = Vec::with_capacity(self.constraints.len());
        for constraint in &self.constraints {
            let value = match &constraint.function {
                Some(function) => function.evaluate(state)?,
                None => 0.0,
            };
            constraints.push(EvaluatedConstraint {
                id: constraint.id,
                equality: constraint.equality,
                value,
                feasible: is_feasible(constraint.equality, value, config.atol),
            });
        }
        let evaluation = Evaluation {
            objective,
            constraints,
        };
        debug!(
            "Evaluated instance: objective={}, feasible={}",
            evaluation.objective,
            evaluation.is_feasible()
        );
        Ok(evaluation)
    }

    /// Substitutes the variables assigned in `state` into the objective and
    /// every constraint, and records the value as `substituted_value` on
    /// the matching decision variables.
    ///
    /// Returns the ids that were substituted somewhere. Nothing is changed
    /// when a function fails to substitute.
    pub fn partial_evaluate(&mut self, state: &State) -> Result<BTreeSet<u64>> {
        let mut used = BTreeSet::new();
        let mut objective = self.objective.clone();
        if let Some(function) = &mut objective {
            used.extend(function.partial_evaluate(state)?);
        }
        let mut functions = Vec::with_capacity(self.constraints.len());
        for constraint in &self.constraints {
            let mut function = constraint.function.clone();
            if let Some(function) = &mut function {
                used.extend(function.partial_evaluate(state)?);
            }
            functions.push(function);
        }

        self.objective = objective;
        for (constraint, function) in self.constraints.iter_mut().zip(functions) {
            constraint.function = function;
        }
        for variable in &mut self.decision_variables {
            if let Some(value) = state.get(variable.id) {
                variable.substituted_value = Some(value);
            }
        }
        debug!("Partially evaluated instance: {} ids substituted", used.len());
        Ok(used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Constraint, DecisionVariable, Sense};
    use crate::validate::ValidationError;
    use pretty_assertions::assert_eq;

    fn state() -> State {
        [(0, 2.0), (1, 3.0), (2, -1.0)].into_iter().collect()
    }

    #[test]
    fn test_linear_sums_duplicates() {
        let linear = Linear::new([(0, 1.0), (0, 1.0), (1, 2.0)], 0.5);
        assert_eq!(linear.evaluate(&state()).unwrap(), 2.0 + 2.0 + 6.0 + 0.5);
    }

    #[test]
    fn test_quadratic() {
        let quadratic = Quadratic::new(
            [(0, 1, 1.0), (1, 0, 1.0), (2, 2, 4.0)],
            Some(Linear::new([(0, 1.0)], 1.0)),
        );
        assert_eq!(quadratic.evaluate(&state()).unwrap(), 6.0 + 6.0 + 4.0 + 2.0 + 1.0);
    }

    #[test]
    fn test_polynomial() {
        let polynomial = Polynomial::new([(vec![0, 0, 1], 1.0), (vec![], 5.0)]);
        assert_eq!(polynomial.evaluate(&state()).unwrap(), 12.0 + 5.0);
    }

    #[test]
    fn test_quadratic_shape_mismatch_is_rejected() {
        let quadratic = Quadratic {
            rows: vec![0, 1],
            columns: vec![0],
            values: vec![1.0, 5.0],
            ..Quadratic::default()
        };
        let err = quadratic.evaluate(&state()).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::QuadraticShape {
                rows: 2,
                columns: 1,
                values: 2
            })
        ));

        let mut partial = quadratic.clone();
        assert!(partial.partial_evaluate(&state()).is_err());
        assert_eq!(partial, quadratic);
    }

    #[test]
    fn test_partial_then_full_evaluation() {
        let full = state();
        let assigned: State = [(0, 2.0), (2, -1.0)].into_iter().collect();
        let rest: State = [(1, 3.0)].into_iter().collect();

        let functions = [
            Function::from(Linear::new([(0, 1.0), (1, 2.0), (0, 0.5)], 1.0)),
            Function::from(Quadratic::new(
                [(0, 1, 1.0), (1, 1, 2.0), (2, 0, 4.0), (1, 2, -3.0)],
                Some(Linear::new([(2, 1.0)], 1.0)),
            )),
            Function::from(Polynomial::new([
                (vec![0, 0, 1], 1.0),
                (vec![1, 2], 2.0),
                (vec![], 5.0),
            ])),
            Function::from(7.0),
        ];
        for function in functions {
            let expected = function.evaluate(&full).unwrap();
            let mut partial = function.clone();
            partial.partial_evaluate(&assigned).unwrap();
            assert_eq!(partial.evaluate(&rest).unwrap(), expected);
            assert!(partial.used_decision_variable_ids().iter().all(|id| *id == 1));
        }
    }

    #[test]
    fn test_partial_evaluate_reports_used_ids() {
        let mut quadratic = Quadratic::new([(0, 1, 1.0), (1, 1, 2.0)], None);
        let used = quadratic
            .partial_evaluate(&[(0, 2.0), (5, 1.0)].into_iter().collect())
            .unwrap();
        assert_eq!(used.into_iter().collect::<Vec<_>>(), vec![0]);
        assert_eq!(quadratic.entries().collect::<Vec<_>>(), vec![(1, 1, 2.0)]);
        assert_eq!(quadratic.linear, Some(Linear::single_term(1, 2.0)));
    }

    #[test]
    fn test_function_variants() {
        assert_eq!(Function::default().evaluate(&state()).unwrap(), 0.0);
        assert_eq!(Function::from(7.5).evaluate(&State::default()).unwrap(), 7.5);
    }

    #[test]
    fn test_missing_variable() {
        let err = Linear::single_term(9, 1.0).evaluate(&state()).unwrap_err();
        assert!(matches!(err, Error::MissingVariable { id: 9 }));
    }

    #[test]
    fn test_normalize_preserves_value() {
        let mut function = Function::from(Quadratic::new(
            [(1, 0, 3.0), (0, 1, 2.0), (2, 2, 1.0), (2, 2, -1.0)],
            Some(Linear::new([(2, 1.0), (2, 1.0)], 0.0)),
        ));
        let before = function.evaluate(&state()).unwrap();
        function.normalize();
        assert_eq!(function.evaluate(&state()).unwrap(), before);
    }

    #[test]
    fn test_instance_feasibility() {
        let instance = Instance::new(Sense::Maximize, Linear::new([(0, 1.0), (1, 1.0)], 0.0))
            .with_decision_variable(DecisionVariable::continuous(0, 0.0, 10.0))
            .with_decision_variable(DecisionVariable::continuous(1, 0.0, 10.0))
            .with_constraint(Constraint::equal_to_zero(0, Linear::new([(0, 1.0)], -2.0)))
            .with_constraint(Constraint::less_than_or_equal_to_zero(
                1,
                Linear::new([(1, 1.0)], -2.0),
            ));
        let state: State = [(0, 2.0 + 1e-9), (1, 3.0)].into_iter().collect();

        let evaluation = instance.evaluate(&state, &EvaluationConfig::default()).unwrap();
        assert!((evaluation.objective - 5.0).abs() < 1e-6);
        assert!(evaluation.constraints[0].feasible);
        assert!(!evaluation.constraints[1].feasible);
        assert!(!evaluation.is_feasible());

        let loose = instance
            .evaluate(&state, &EvaluationConfig::new().atol(1.5))
            .unwrap();
        assert!(loose.is_feasible());
    }

    #[test]
    fn test_instance_partial_evaluate() {
        let mut instance = Instance::new(Sense::Minimize, Linear::new([(0, 1.0), (1, 1.0)], 0.0))
            .with_decision_variable(DecisionVariable::binary(0))
            .with_decision_variable(DecisionVariable::binary(1))
            .with_constraint(Constraint::less_than_or_equal_to_zero(
                0,
                Quadratic::new([(0, 1, 1.0)], Some(Linear::new([], -1.0))),
            ));
        let full: State = [(0, 1.0), (1, 1.0)].into_iter().collect();
        let expected = instance.evaluate(&full, &EvaluationConfig::default()).unwrap();

        let used = instance
            .partial_evaluate(&[(0, 1.0)].into_iter().collect())
            .unwrap();
        assert_eq!(used.into_iter().collect::<Vec<_>>(), vec![0]);
        assert_eq!(instance.decision_variable(0).unwrap().substituted_value, Some(1.0));
        assert_eq!(instance.decision_variable(1).unwrap().substituted_value, None);

        let rest: State = [(1, 1.0)].into_iter().collect();
        let evaluation = instance.evaluate(&rest, &EvaluationConfig::default()).unwrap();
        assert_eq!(evaluation, expected);
    }
}
