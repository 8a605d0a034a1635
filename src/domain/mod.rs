//! Domain layer containing the convergence engine and its types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, errors, events, state machine)
//! - `fuzzy` - Triangular fuzzy numbers, distance, Likert scale
//! - `evaluation` - Items, evaluation keys and evaluation records
//! - `case` - Case aggregate, thresholds and round lifecycle
//! - `consensus` - Pure round analysis (aggregation, verdict, marking)

pub mod case;
pub mod consensus;
pub mod evaluation;
pub mod foundation;
pub mod fuzzy;
