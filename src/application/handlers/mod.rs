//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.
//!
//! - `round` - round analysis, round history and progress queries
//! - `evaluation` - opinion submission
//! - `case` - threshold management

pub mod case;
pub mod evaluation;
pub mod round;

pub use case::*;
pub use evaluation::*;
pub use round::*;
