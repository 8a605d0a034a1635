//! Seven-point Likert scale mapped onto triangular fuzzy numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::FuzzyVector;
use crate::domain::foundation::ValidationError;

/// Lowest Likert answer.
pub const LIKERT_MIN: u8 = 1;

/// Highest Likert answer.
pub const LIKERT_MAX: u8 = 7;

const SCALE: [FuzzyVector; 7] = [
    FuzzyVector::new(0.0, 0.0, 0.1),
    FuzzyVector::new(0.0, 0.1, 0.3),
    FuzzyVector::new(0.1, 0.3, 0.5),
    FuzzyVector::new(0.3, 0.5, 0.7),
    FuzzyVector::new(0.5, 0.7, 0.9),
    FuzzyVector::new(0.7, 0.9, 1.0),
    FuzzyVector::new(0.9, 1.0, 1.0),
];

const IMPORTANCE_LABELS: [&str; 7] = [
    "Not important at all",
    "Mostly not important",
    "Somewhat not important",
    "Neither important nor unimportant",
    "Somewhat important",
    "Mostly important",
    "Extremely important",
];

const PERFORMANCE_LABELS: [&str; 7] = [
    "Very poor performance",
    "Mostly poor performance",
    "Somewhat poor performance",
    "Neither good nor poor",
    "Somewhat good performance",
    "Mostly good performance",
    "Very good performance",
];

/// A validated answer on the 1..=7 linguistic scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct LikertValue(u8);

impl LikertValue {
    /// Creates a Likert value, rejecting anything outside 1..=7.
    pub fn try_new(value: u8) -> Result<Self, ValidationError> {
        if !(LIKERT_MIN..=LIKERT_MAX).contains(&value) {
            return Err(ValidationError::out_of_range(
                "likert",
                f64::from(LIKERT_MIN),
                f64::from(LIKERT_MAX),
                f64::from(value),
            ));
        }
        Ok(Self(value))
    }

    /// Returns the numeric answer.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Returns the fuzzy vector this answer stands for.
    pub fn to_fuzzy(&self) -> FuzzyVector {
        SCALE[self.index()]
    }

    /// Label used when rating the importance of a criterion.
    pub fn importance_label(&self) -> &'static str {
        IMPORTANCE_LABELS[self.index()]
    }

    /// Label used when rating a technology's performance on a criterion.
    pub fn performance_label(&self) -> &'static str {
        PERFORMANCE_LABELS[self.index()]
    }

    /// All answers in ascending order.
    pub fn all() -> impl Iterator<Item = LikertValue> {
        (LIKERT_MIN..=LIKERT_MAX).map(LikertValue)
    }

    fn index(&self) -> usize {
        usize::from(self.0 - LIKERT_MIN)
    }
}

impl TryFrom<u8> for LikertValue {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<LikertValue> for u8 {
    fn from(value: LikertValue) -> Self {
        value.0
    }
}

impl fmt::Display for LikertValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
