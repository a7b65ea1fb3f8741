//! PassCompass: predicts whether a student passes the final exam and tunes the
//! decision threshold for recall on the failing class.

pub mod api;
pub mod common;
pub mod data;
pub mod evaluation;
pub mod inference;
pub mod pipeline;
pub mod tracking;
pub mod training;

pub use common::{AppCfg, ErrorCode, PassError, PassResult};
pub use evaluation::{select_threshold, ThresholdChoice, ThresholdOutcome};
