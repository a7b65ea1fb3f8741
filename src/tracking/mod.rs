//! Experiment tracking and model registry on the local filesystem.

pub mod domain;
pub mod registry;
pub mod repo_fs;

pub use domain::{MemoryRun, ModelVersion, RunId, RunRecord, RunRecorder, RunStatus, Stage};
pub use registry::{best_run, FsRegistry, MODEL_ARTIFACT};
pub use repo_fs::{FsRun, FsTracker};
