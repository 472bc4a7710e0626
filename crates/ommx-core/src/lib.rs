//! # ommx-core
//!
//! Data model and protobuf wire codec for mathematical optimization problems.
//!
//! This crate provides:
//! - The `ommx.v1` messages: functions ([`Linear`], [`Quadratic`],
//!   [`Polynomial`], [`Function`]) and problem instances ([`Instance`],
//!   [`DecisionVariable`], [`Constraint`])
//! - A binary codec compatible with any protobuf implementation of the same
//!   schema, keeping fields it does not know byte for byte
//! - Evaluation, normalization and validation of decoded problems
//! - The schema itself as a resolved descriptor and as `.proto` source
//!
//! ## Architecture
//!
//! - [`model`]: message types and their [`prost::Message`] implementations
//! - [`wire`]: capture of unknown fields
//! - [`evaluate`]: values of functions and constraints at a [`State`]
//! - [`validate`]: semantic checks on instances
//! - [`schema`]: descriptor pool and `.proto` printer
//! - [`io`]: reading and writing messages as files
//! - [`error`]: error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use ommx_core::{Evaluate, Instance, ValidationConfig};
//!
//! let instance: Instance = ommx_core::io::read_message("./knapsack.ommx")?;
//! instance.validate(&ValidationConfig::default())?;
//!
//! let state: ommx_core::State = [(0, 1.0), (1, 0.0)].into_iter().collect();
//! println!("objective = {}", instance.objective().evaluate(&state)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod error;
pub mod evaluate;
pub mod io;
pub mod model;
pub mod schema;
pub mod validate;
pub mod wire;

// Re-export primary types for convenience
pub use error::{Error, Result};
pub use evaluate::{Evaluate, EvaluatedConstraint, Evaluation, EvaluationConfig};
pub use model::{
    Bound, Constraint, DecisionVariable, Equality, Expression, ExpressionKind, Function, Instance,
    InstanceDescription, Kind, Linear, LinearTerm, Monomial, Polynomial, Quadratic, Sense, State,
};
pub use schema::{PrinterConfig, SchemaPrinter};
pub use validate::{FunctionLocation, ValidationConfig, ValidationError};
pub use wire::{UnknownField, UnknownFields};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
