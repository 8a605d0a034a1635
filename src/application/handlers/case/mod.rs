//! Case command handlers.

mod update_thresholds;

pub use update_thresholds::{
    UpdateThresholdsCommand, UpdateThresholdsError, UpdateThresholdsHandler,
    UpdateThresholdsResult,
};
