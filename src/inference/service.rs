//! Prediction with the registered model.

use std::time::Instant;

use serde_json::{Map, Value};

use crate::common::config::RegistryCfg;
use crate::common::error::{PassError, PassResult};
use crate::tracking::{FsRegistry, ModelVersion, Stage};
use crate::training::TrainedModel;

use super::domain::{record_cells, Prediction};

/// Newest version of `name` in `stage` together with its decoded model.
pub fn load_model(
    registry: &FsRegistry,
    name: &str,
    stage: Stage,
) -> PassResult<(ModelVersion, TrainedModel)> {
    let version = registry.latest_in_stage(name, stage)?;
    let model = TrainedModel::from_json_bytes(&registry.model_bytes(&version)?)?;
    Ok((version, model))
}

/// Read-only predictor shared by request handlers.
#[derive(Clone, Debug)]
pub struct Predictor {
    version: Option<ModelVersion>,
    model: TrainedModel,
}

impl Predictor {
    /// Load the model configured in `cfg`.
    pub fn load(cfg: &RegistryCfg) -> PassResult<Self> {
        let stage = cfg.stage.parse::<Stage>()?;
        let registry = FsRegistry::new(cfg);
        let (version, model) = load_model(&registry, &cfg.model_name, stage)?;
        tracing::info!(
            name = %version.name,
            version = version.version,
            %stage,
            threshold = ?model.threshold,
            "model loaded"
        );
        Ok(Self {
            version: Some(version),
            model,
        })
    }

    pub fn from_model(model: TrainedModel) -> Self {
        Self {
            version: None,
            model,
        }
    }

    pub fn version(&self) -> Option<&ModelVersion> {
        self.version.as_ref()
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    /// Score one student record.
    pub fn predict(&self, record: &Map<String, Value>) -> PassResult<Prediction> {
        let started = Instant::now();
        let cells = record_cells(record)?;
        let x = self
            .model
            .vectorizer
            .transform_record(cells.iter().map(|(column, cell)| (column.as_str(), cell)))?;
        let proba_pass = self
            .model
            .predict_proba(&x)?
            .first()
            .copied()
            .ok_or_else(|| PassError::internal("empty prediction"))?;
        let prediction = self
            .model
            .predict(&x)?
            .first()
            .copied()
            .ok_or_else(|| PassError::internal("empty prediction"))?;

        let result = Prediction::new(prediction, proba_pass);
        tracing::debug!(
            prediction,
            proba_pass = result.proba_pass,
            elapsed_us = started.elapsed().as_micros() as u64,
            "prediction"
        );
        Ok(result)
    }
}
