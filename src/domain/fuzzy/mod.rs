//! Fuzzy opinion representation.
//!
//! - `FuzzyVector` - triangular fuzzy number (a, b, c) and the normalized
//!   Euclidean distance between two of them
//! - `LikertValue` - seven-point linguistic scale mapped onto fixed vectors

mod likert;
mod vector;

pub use likert::{LikertValue, LIKERT_MAX, LIKERT_MIN};
pub use vector::{distance, FuzzyVector};
