//! Evaluation: threshold selection, classification metrics and run reporting.

pub mod domain;
pub mod metrics;
pub mod service;
pub mod threshold;

pub use domain::{
    ClassMetrics, ClassificationReport, ConfusionMatrix, ThresholdChoice, ThresholdOutcome,
    FALLBACK_THRESHOLD,
};
pub use service::{evaluate_and_log, log_classification_report};
pub use threshold::{binarize, select_threshold};
