//! Live sign recognition on camera frames.

mod labels;
mod overlay;
mod worker;

pub use labels::{color_for_letter, letter_for_class, FALLBACK_COLOR, LETTERS, UNKNOWN_LABEL};
pub use overlay::{PredictionOverlay, CONNECTION_COLOR, LANDMARK_COLOR};
pub use worker::{InferencePipeline, InferenceStatsSnapshot};
