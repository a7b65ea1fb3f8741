//! End-to-end flows wired from configuration.

pub mod extract;
pub mod register;
pub mod train;

pub use extract::{extract_flow, process_extracted, ExtractOutput};
pub use register::{register_best, RegisterRequest};
pub use train::train_logreg_flow;
