//! Inference: load the staged model and score single student records.

pub mod domain;
pub mod service;

pub use domain::{Label, Prediction};
pub use service::{load_model, Predictor};
