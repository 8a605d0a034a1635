//! Evaluation module - individual opinions and the items they score.

mod evaluation;
mod item;

pub use evaluation::{Evaluation, EvaluationFilter};
pub use item::{EvaluationKey, ItemKey, ItemKind};
