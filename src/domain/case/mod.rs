//! Case module - a Delphi study, its scope, thresholds and round lifecycle.

mod aggregate;
mod events;
mod round_state;
mod thresholds;

pub use aggregate::{Case, CaseScope, MAX_NAME_LENGTH};
pub use events::{CaseConverged, RoundAnalyzed, RoundOpened, ThresholdsUpdated};
pub use round_state::{RoundState, RoundTransition};
pub use thresholds::{ThresholdSet, DEFAULT_DISTANCE_MEAN_THRESHOLD, DEFAULT_PERCENT_THRESHOLD};
