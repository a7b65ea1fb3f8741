//! Training: logistic regression, hyperparameter search and model artifacts.

pub mod domain;
pub mod logistic;
pub mod repo_fs;
pub mod search;
pub mod service;

pub use domain::{ClassWeight, LogisticParams, Penalty, TrainedModel};
pub use search::{RandomSearch, SearchSpace, SearchStrategy};
pub use service::{run_hpo, HpoResult, HpoSettings, Trial};
