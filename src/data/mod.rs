//! Data domain: acquisition, cleaning, splitting and vectorisation of the student tables.

pub mod domain;
pub mod repo_fs;
pub mod service;
pub mod split;
pub mod vectorizer;

pub use domain::{BasicStats, Cell, DatasetId, Frame};
pub use service::TrainingSplit;
pub use vectorizer::Vectorizer;
