//! Persistence of trained models as run artifacts.

use crate::common::error::PassResult;
use crate::tracking::{FsTracker, RunRecord, RunRecorder, MODEL_ARTIFACT};

use super::domain::TrainedModel;

/// Store `model` as the run's model artifact.
pub fn store_model(run: &mut dyn RunRecorder, model: &TrainedModel) -> PassResult<()> {
    run.log_artifact(MODEL_ARTIFACT, &model.to_json_bytes()?)
}

/// Load the model artifact written by [`store_model`].
pub fn read_model(tracker: &FsTracker, record: &RunRecord) -> PassResult<TrainedModel> {
    let bytes = tracker.read_artifact(record, MODEL_ARTIFACT)?;
    TrainedModel::from_json_bytes(&bytes)
}
