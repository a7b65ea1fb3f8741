//! Filesystem model registry with stage transitions.
//!
//! Layout: `<root>/<name>/<version>/version.json` and `model.json`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::common::config::RegistryCfg;
use crate::common::error::{PassError, PassResult};
use crate::common::time;

use super::domain::{ModelVersion, RunRecord, Stage};
use super::repo_fs::FsTracker;

/// Artifact path under which a run stores its trained model.
pub const MODEL_ARTIFACT: &str = "model/model.json";
const VERSION_FILE: &str = "version.json";
const MODEL_FILE: &str = "model.json";

/// Pick the best run by `metric`. Runs without the metric rank last.
pub fn best_run<'a>(
    runs: &'a [RunRecord],
    metric: &str,
    higher_is_better: bool,
) -> Option<&'a RunRecord> {
    let score = |run: &RunRecord| {
        run.metric(metric)
            .unwrap_or(if higher_is_better { -1e9 } else { 1e9 })
    };
    // Keep the earliest run on ties.
    runs.iter().fold(None, |best: Option<&RunRecord>, run| match best {
        None => Some(run),
        Some(current) => {
            let better = if higher_is_better {
                score(run) > score(current)
            } else {
                score(run) < score(current)
            };
            Some(if better { run } else { current })
        }
    })
}

#[derive(Clone, Debug)]
pub struct FsRegistry {
    root: PathBuf,
}

impl FsRegistry {
    pub fn new(cfg: &RegistryCfg) -> Self {
        Self::at(&cfg.root)
    }

    pub fn at(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn model_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn version_dir(&self, name: &str, version: u32) -> PathBuf {
        self.model_dir(name).join(version.to_string())
    }

    /// All versions of `name`, ascending.
    pub fn versions(&self, name: &str) -> PassResult<Vec<ModelVersion>> {
        let dir = self.model_dir(name);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|source| PassError::io(&dir, source))?;
        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PassError::io(&dir, source))?;
            let path = entry.path().join(VERSION_FILE);
            if path.is_file() {
                let text =
                    fs::read_to_string(&path).map_err(|source| PassError::io(&path, source))?;
                versions.push(serde_json::from_str::<ModelVersion>(&text)?);
            }
        }
        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }

    fn write_version(&self, version: &ModelVersion) -> PassResult<()> {
        let path = self
            .version_dir(&version.name, version.version)
            .join(VERSION_FILE);
        let text = serde_json::to_string_pretty(version)?;
        fs::write(&path, text).map_err(|source| PassError::io(&path, source))
    }

    /// Copy the run's model artifact into a new version with stage `None`.
    pub fn register_model(
        &self,
        tracker: &FsTracker,
        run: &RunRecord,
        name: &str,
    ) -> PassResult<ModelVersion> {
        if name.is_empty()
            || name.contains(|c: char| c == '/' || c == '\\')
            || name.starts_with('.')
        {
            return Err(PassError::invalid(format!("invalid model name '{name}'")));
        }
        if !run.has_artifact(MODEL_ARTIFACT) {
            return Err(PassError::model_missing(format!(
                "run '{}' has no {MODEL_ARTIFACT}",
                run.run_id
            )));
        }
        let model = tracker.read_artifact(run, MODEL_ARTIFACT)?;

        let next = self
            .versions(name)?
            .last()
            .map_or(1, |latest| latest.version + 1);
        let dir = self.version_dir(name, next);
        fs::create_dir_all(&dir).map_err(|source| PassError::io(&dir, source))?;
        let model_path = dir.join(MODEL_FILE);
        fs::write(&model_path, model).map_err(|source| PassError::io(&model_path, source))?;

        let version = ModelVersion {
            name: name.to_string(),
            version: next,
            run_id: run.run_id.clone(),
            stage: Stage::None,
            created_ms: time::now_ms(),
        };
        self.write_version(&version)?;
        tracing::info!(name, version = next, run_id = %run.run_id, "model registered");
        Ok(version)
    }

    /// Move `version` to `stage`; optionally archive every other version currently in that stage.
    pub fn transition_stage(
        &self,
        name: &str,
        version: u32,
        stage: Stage,
        archive_existing: bool,
    ) -> PassResult<ModelVersion> {
        let versions = self.versions(name)?;
        let mut target = versions
            .iter()
            .find(|v| v.version == version)
            .cloned()
            .ok_or_else(|| PassError::not_found(format!("model '{name}' version {version}")))?;

        if archive_existing && !matches!(stage, Stage::None | Stage::Archived) {
            for other in versions
                .iter()
                .filter(|v| v.version != version && v.stage == stage)
            {
                let mut archived = other.clone();
                archived.stage = Stage::Archived;
                self.write_version(&archived)?;
                tracing::info!(name, version = archived.version, "archived");
            }
        }

        target.stage = stage;
        self.write_version(&target)?;
        tracing::info!(name, version, %stage, "stage transition");
        Ok(target)
    }

    /// Newest version of `name` in `stage`.
    pub fn latest_in_stage(&self, name: &str, stage: Stage) -> PassResult<ModelVersion> {
        self.versions(name)?
            .into_iter()
            .rev()
            .find(|v| v.stage == stage)
            .ok_or_else(|| {
                PassError::model_missing(format!("no '{name}' version in stage {stage}"))
            })
    }

    /// Raw model JSON of a registered version.
    pub fn model_bytes(&self, version: &ModelVersion) -> PassResult<Vec<u8>> {
        let path = self
            .version_dir(&version.name, version.version)
            .join(MODEL_FILE);
        fs::read(&path).map_err(|source| PassError::io(&path, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::domain::{RunRecorder, RunStatus};

    fn finished_run(tracker: &FsTracker, recall: Option<f64>, with_model: bool) -> RunRecord {
        let mut run = tracker.start_run("exp", None, &[]).unwrap();
        if let Some(recall) = recall {
            run.log_metric("val_recall_fail_tuned", recall).unwrap();
        }
        if with_model {
            run.log_artifact(MODEL_ARTIFACT, b"{\"model\":true}").unwrap();
        }
        run.finish(RunStatus::Finished).unwrap()
    }

    #[test]
    fn best_run_respects_direction_and_missing_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = FsTracker::at(dir.path());
        let runs = vec![
            finished_run(&tracker, Some(0.4), false),
            finished_run(&tracker, None, false),
            finished_run(&tracker, Some(0.9), false),
        ];
        let key = "val_recall_fail_tuned";
        assert_eq!(best_run(&runs, key, true).unwrap().run_id, runs[2].run_id);
        assert_eq!(best_run(&runs, key, false).unwrap().run_id, runs[0].run_id);
        assert!(best_run(&[], key, true).is_none());
    }

    #[test]
    fn register_and_promote_archives_previous() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = FsTracker::at(&dir.path().join("runs"));
        let registry = FsRegistry::at(&dir.path().join("registry"));

        let run = finished_run(&tracker, Some(0.7), true);
        let v1 = registry.register_model(&tracker, &run, "students").unwrap();
        let v2 = registry.register_model(&tracker, &run, "students").unwrap();
        assert_eq!((v1.version, v2.version), (1, 2));
        assert_eq!(v1.stage, Stage::None);

        registry.transition_stage("students", 1, Stage::Staging, true).unwrap();
        registry.transition_stage("students", 2, Stage::Staging, true).unwrap();

        let versions = registry.versions("students").unwrap();
        assert_eq!(versions[0].stage, Stage::Archived);
        assert_eq!(versions[1].stage, Stage::Staging);

        let staged = registry.latest_in_stage("students", Stage::Staging).unwrap();
        assert_eq!(staged.version, 2);
        assert_eq!(registry.model_bytes(&staged).unwrap(), b"{\"model\":true}");
        assert!(registry.latest_in_stage("students", Stage::Production).is_err());
    }

    #[test]
    fn register_requires_model_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = FsTracker::at(dir.path());
        let registry = FsRegistry::at(&dir.path().join("registry"));
        let run = finished_run(&tracker, Some(0.7), false);
        let err = registry.register_model(&tracker, &run, "students").unwrap_err();
        assert!(matches!(err, PassError::ModelMissing(_)));
        assert!(registry.transition_stage("students", 1, Stage::Staging, true).is_err());
    }
}
