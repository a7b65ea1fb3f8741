//! Experiment runs, registered model versions and the recorder seam.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::error::{PassError, PassResult};

/// Identifier of a tracked run.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// Persisted state of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub experiment: String,
    pub parent: Option<RunId>,
    pub status: RunStatus,
    pub start_ms: u64,
    pub end_ms: Option<u64>,
    /// Creation order within the experiment.
    #[serde(default)]
    pub seq: u64,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub artifacts: Vec<String>,
}

impl RunRecord {
    pub fn new(experiment: &str, parent: Option<RunId>, start_ms: u64) -> Self {
        Self {
            run_id: RunId::generate(),
            experiment: experiment.to_string(),
            parent,
            status: RunStatus::Running,
            start_ms,
            end_ms: None,
            seq: 0,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            tags: BTreeMap::new(),
            artifacts: Vec::new(),
        }
    }

    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }

    pub fn has_artifact(&self, path: &str) -> bool {
        self.artifacts.iter().any(|artifact| artifact == path)
    }
}

/// Sink for the params, metrics, tags and artifacts of one run.
pub trait RunRecorder {
    fn log_param(&mut self, key: &str, value: &str) -> PassResult<()>;
    fn log_metric(&mut self, key: &str, value: f64) -> PassResult<()>;
    fn set_tag(&mut self, key: &str, value: &str) -> PassResult<()>;
    /// Store `bytes` under `path`, relative to the run's artifact root.
    fn log_artifact(&mut self, path: &str, bytes: &[u8]) -> PassResult<()>;

    fn log_metrics(&mut self, metrics: &BTreeMap<String, f64>) -> PassResult<()> {
        for (key, value) in metrics {
            self.log_metric(key, *value)?;
        }
        Ok(())
    }

    fn log_params(&mut self, params: &BTreeMap<String, String>) -> PassResult<()> {
        for (key, value) in params {
            self.log_param(key, value)?;
        }
        Ok(())
    }
}

/// Recorder that keeps everything in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryRun {
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub tags: BTreeMap<String, String>,
    pub artifacts: BTreeMap<String, Vec<u8>>,
}

impl RunRecorder for MemoryRun {
    fn log_param(&mut self, key: &str, value: &str) -> PassResult<()> {
        self.params.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn log_metric(&mut self, key: &str, value: f64) -> PassResult<()> {
        self.metrics.insert(key.to_string(), value);
        Ok(())
    }

    fn set_tag(&mut self, key: &str, value: &str) -> PassResult<()> {
        self.tags.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn log_artifact(&mut self, path: &str, bytes: &[u8]) -> PassResult<()> {
        self.artifacts.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Lifecycle label of a registered model version.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    None,
    Staging,
    Production,
    Archived,
}

impl FromStr for Stage {
    type Err = PassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Stage::None),
            "staging" => Ok(Stage::Staging),
            "production" => Ok(Stage::Production),
            "archived" => Ok(Stage::Archived),
            other => Err(PassError::invalid(format!("unknown stage '{other}'"))),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::None => "None",
            Stage::Staging => "Staging",
            Stage::Production => "Production",
            Stage::Archived => "Archived",
        };
        f.write_str(name)
    }
}

/// Metadata of one registered version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    pub version: u32,
    pub run_id: RunId,
    pub stage: Stage,
    pub created_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_parses_case_insensitively() {
        assert_eq!("Staging".parse::<Stage>().unwrap(), Stage::Staging);
        assert_eq!("production".parse::<Stage>().unwrap(), Stage::Production);
        assert!("prod".parse::<Stage>().is_err());
        assert_eq!(Stage::Archived.to_string(), "Archived");
    }

    #[test]
    fn memory_run_collects_bulk_logs() {
        let mut run = MemoryRun::default();
        let metrics = BTreeMap::from([("a".to_string(), 1.0), ("b".to_string(), 2.0)]);
        run.log_metrics(&metrics).unwrap();
        run.set_tag("model", "logreg").unwrap();
        assert_eq!(run.metrics, metrics);
        assert_eq!(run.tags["model"], "logreg");
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunId::generate(), RunId::generate());
        assert_eq!(RunId::generate().as_str().len(), 32);
    }
}
