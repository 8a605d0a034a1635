//! Per-case convergence thresholds.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Percentage, ValidationError};

/// Default maximum mean distance for an item to count as converged.
pub const DEFAULT_DISTANCE_MEAN_THRESHOLD: f64 = 1.0 / 6.0;

/// Default minimum share of passing items, for criteria and for technologies.
pub const DEFAULT_PERCENT_THRESHOLD: f64 = 75.0;

/// Thresholds a round is judged against.
///
/// # Invariants
///
/// - `distance_mean_threshold` is finite and strictly positive
/// - both percent thresholds lie in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholds", into = "RawThresholds")]
pub struct ThresholdSet {
    distance_mean_threshold: f64,
    criteria_percent_threshold: Percentage,
    tech_percent_threshold: Percentage,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawThresholds {
    distance_mean_threshold: f64,
    criteria_percent_threshold: f64,
    tech_percent_threshold: f64,
}

impl ThresholdSet {
    /// Builds a validated threshold set.
    ///
    /// # Errors
    ///
    /// - `InvalidFormat` if the distance threshold is not a positive finite number
    /// - `OutOfRange` if a percent threshold is outside [0, 100]
    pub fn new(
        distance_mean_threshold: f64,
        criteria_percent_threshold: f64,
        tech_percent_threshold: f64,
    ) -> Result<Self, ValidationError> {
        if !distance_mean_threshold.is_finite() || distance_mean_threshold <= 0.0 {
            return Err(ValidationError::invalid_format(
                "distance_mean_threshold",
                format!(
                    "must be a finite number greater than zero, got {}",
                    distance_mean_threshold
                ),
            ));
        }

        Ok(Self {
            distance_mean_threshold,
            criteria_percent_threshold: Self::percent(
                "criteria_percent_threshold",
                criteria_percent_threshold,
            )?,
            tech_percent_threshold: Self::percent("tech_percent_threshold", tech_percent_threshold)?,
        })
    }

    fn percent(field: &str, value: f64) -> Result<Percentage, ValidationError> {
        Percentage::try_new(value).map_err(|_| ValidationError::out_of_range(field, 0.0, 100.0, value))
    }

    pub fn distance_mean_threshold(&self) -> f64 {
        self.distance_mean_threshold
    }

    pub fn criteria_percent_threshold(&self) -> Percentage {
        self.criteria_percent_threshold
    }

    pub fn tech_percent_threshold(&self) -> Percentage {
        self.tech_percent_threshold
    }

    /// True if a distance is acceptable. The comparison is inclusive and unrounded.
    pub fn distance_ok(&self, distance: f64) -> bool {
        distance <= self.distance_mean_threshold
    }
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            distance_mean_threshold: DEFAULT_DISTANCE_MEAN_THRESHOLD,
            criteria_percent_threshold: Percentage::from_counts(3, 4),
            tech_percent_threshold: Percentage::from_counts(3, 4),
        }
    }
}

impl TryFrom<RawThresholds> for ThresholdSet {
    type Error = ValidationError;

    fn try_from(raw: RawThresholds) -> Result<Self, Self::Error> {
        Self::new(
            raw.distance_mean_threshold,
            raw.criteria_percent_threshold,
            raw.tech_percent_threshold,
        )
    }
}

impl From<ThresholdSet> for RawThresholds {
    fn from(set: ThresholdSet) -> Self {
        Self {
            distance_mean_threshold: set.distance_mean_threshold,
            criteria_percent_threshold: set.criteria_percent_threshold.value(),
            tech_percent_threshold: set.tech_percent_threshold.value(),
        }
    }
}
