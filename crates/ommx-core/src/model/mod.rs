//! Messages of the `ommx.v1` schema.
//!
//! Every type implements [`prost::Message`] by hand so that fields unknown
//! to this version of the schema are kept and written back unchanged.

mod constraint;
mod decision_variable;
mod function;
mod instance;
mod linear;
mod polynomial;
mod quadratic;
mod state;

pub use constraint::{Constraint, Equality};
pub use decision_variable::{Bound, DecisionVariable, Kind};
pub use function::{Expression, ExpressionKind, Function};
pub use instance::{Instance, InstanceDescription, Sense};
pub use linear::{Linear, LinearTerm};
pub use polynomial::{Monomial, Polynomial};
pub use quadratic::Quadratic;
pub use state::State;
