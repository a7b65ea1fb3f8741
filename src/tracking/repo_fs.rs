//! Filesystem experiment tracker.
//!
//! Layout: `<root>/<experiment>/<run_id>/run.json` plus `artifacts/` next to it.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::common::config::TrackingCfg;
use crate::common::error::{PassError, PassResult};
use crate::common::time;

use super::domain::{RunId, RunRecord, RunRecorder, RunStatus};

const RUN_FILE: &str = "run.json";
const ARTIFACT_DIR: &str = "artifacts";

/// Tracker rooted at `cfg.root`.
#[derive(Clone, Debug)]
pub struct FsTracker {
    root: PathBuf,
}

fn validate_name(kind: &str, name: &str) -> PassResult<()> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(|c: char| c == '/' || c == '\\')
        || name.chars().any(char::is_control);
    if bad {
        return Err(PassError::invalid(format!("invalid {kind} name '{name}'")));
    }
    Ok(())
}

/// Reject absolute paths and `..` so artifacts stay inside the run directory.
pub(crate) fn relative_artifact_path(path: &str) -> PassResult<PathBuf> {
    let candidate = Path::new(path);
    let safe = !path.is_empty()
        && candidate
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if !safe {
        return Err(PassError::invalid(format!("invalid artifact path '{path}'")));
    }
    Ok(candidate.to_path_buf())
}

impl FsTracker {
    pub fn new(cfg: &TrackingCfg) -> Self {
        Self::at(&cfg.root)
    }

    pub fn at(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn experiment_dir(&self, experiment: &str) -> PathBuf {
        self.root.join(experiment)
    }

    fn run_dir(&self, experiment: &str, run_id: &RunId) -> PathBuf {
        self.experiment_dir(experiment).join(run_id.as_str())
    }

    /// Number of runs already created under `experiment`.
    fn next_seq(&self, experiment: &str) -> PassResult<u64> {
        let dir = self.experiment_dir(experiment);
        if !dir.is_dir() {
            return Ok(0);
        }
        let entries = fs::read_dir(&dir).map_err(|source| PassError::io(&dir, source))?;
        let mut count = 0;
        for entry in entries {
            let entry = entry.map_err(|source| PassError::io(&dir, source))?;
            if entry.path().join(RUN_FILE).is_file() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Open a new run, optionally nested under `parent`.
    pub fn start_run(
        &self,
        experiment: &str,
        parent: Option<&RunId>,
        tags: &[(&str, &str)],
    ) -> PassResult<FsRun> {
        validate_name("experiment", experiment)?;
        let mut record = RunRecord::new(experiment, parent.cloned(), time::now_ms());
        record.seq = self.next_seq(experiment)?;
        for (key, value) in tags {
            record.tags.insert((*key).to_string(), (*value).to_string());
        }
        let dir = self.run_dir(experiment, &record.run_id);
        fs::create_dir_all(dir.join(ARTIFACT_DIR)).map_err(|source| PassError::io(&dir, source))?;
        let run = FsRun { dir, record };
        run.flush()?;
        tracing::debug!(experiment, run_id = %run.record.run_id, "run started");
        Ok(run)
    }

    /// Every run of `experiment` in creation order.
    pub fn search_runs(&self, experiment: &str) -> PassResult<Vec<RunRecord>> {
        validate_name("experiment", experiment)?;
        let dir = self.experiment_dir(experiment);
        if !dir.is_dir() {
            return Err(PassError::not_found(format!("experiment '{experiment}'")));
        }
        let entries = fs::read_dir(&dir).map_err(|source| PassError::io(&dir, source))?;
        let mut runs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PassError::io(&dir, source))?;
            let path = entry.path().join(RUN_FILE);
            if path.is_file() {
                runs.push(read_record(&path)?);
            }
        }
        runs.sort_by_key(|run| (run.start_ms, run.seq));
        Ok(runs)
    }

    pub fn get_run(&self, experiment: &str, run_id: &RunId) -> PassResult<RunRecord> {
        validate_name("experiment", experiment)?;
        validate_name("run", run_id.as_str())?;
        let path = self.run_dir(experiment, run_id).join(RUN_FILE);
        if !path.is_file() {
            return Err(PassError::not_found(format!("run '{run_id}'")));
        }
        read_record(&path)
    }

    /// Read an artifact stored by a run.
    pub fn read_artifact(&self, record: &RunRecord, path: &str) -> PassResult<Vec<u8>> {
        let relative = relative_artifact_path(path)?;
        let full = self
            .run_dir(&record.experiment, &record.run_id)
            .join(ARTIFACT_DIR)
            .join(relative);
        if !full.is_file() {
            return Err(PassError::not_found(format!(
                "artifact '{path}' of run '{}'",
                record.run_id
            )));
        }
        fs::read(&full).map_err(|source| PassError::io(&full, source))
    }
}

fn read_record(path: &Path) -> PassResult<RunRecord> {
    let text = fs::read_to_string(path).map_err(|source| PassError::io(path, source))?;
    Ok(serde_json::from_str(&text)?)
}

/// An open run that persists `run.json` after every change.
#[derive(Debug)]
pub struct FsRun {
    dir: PathBuf,
    record: RunRecord,
}

impl FsRun {
    pub fn id(&self) -> &RunId {
        &self.record.run_id
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    fn flush(&self) -> PassResult<()> {
        let path = self.dir.join(RUN_FILE);
        let text = serde_json::to_string_pretty(&self.record)?;
        fs::write(&path, text).map_err(|source| PassError::io(&path, source))
    }

    /// Close the run with a terminal status.
    pub fn finish(mut self, status: RunStatus) -> PassResult<RunRecord> {
        self.record.status = status;
        self.record.end_ms = Some(time::now_ms());
        self.flush()?;
        tracing::debug!(run_id = %self.record.run_id, ?status, "run finished");
        Ok(self.record)
    }
}

impl RunRecorder for FsRun {
    fn log_param(&mut self, key: &str, value: &str) -> PassResult<()> {
        self.record.params.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn log_metric(&mut self, key: &str, value: f64) -> PassResult<()> {
        if !value.is_finite() {
            return Err(PassError::invalid(format!("metric '{key}' is not finite")));
        }
        self.record.metrics.insert(key.to_string(), value);
        self.flush()
    }

    fn set_tag(&mut self, key: &str, value: &str) -> PassResult<()> {
        self.record.tags.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn log_artifact(&mut self, path: &str, bytes: &[u8]) -> PassResult<()> {
        let relative = relative_artifact_path(path)?;
        let full = self.dir.join(ARTIFACT_DIR).join(&relative);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|source| PassError::io(parent, source))?;
        }
        fs::write(&full, bytes).map_err(|source| PassError::io(&full, source))?;
        if !self.record.has_artifact(path) {
            self.record.artifacts.push(path.to_string());
        }
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::registry::best_run;

    #[test]
    fn runs_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = FsTracker::at(dir.path());
        let mut run = tracker.start_run("exp", None, &[("model", "logreg")]).unwrap();
        run.log_param("C", "0.5").unwrap();
        run.log_metric("val_accuracy", 0.8).unwrap();
        run.log_artifact("model/model.json", b"{}").unwrap();
        let id = run.id().clone();
        let record = run.finish(RunStatus::Finished).unwrap();

        let loaded = tracker.get_run("exp", &id).unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.tags["model"], "logreg");
        assert_eq!(loaded.metric("val_accuracy"), Some(0.8));
        assert!(loaded.end_ms.is_some());
        assert_eq!(tracker.read_artifact(&loaded, "model/model.json").unwrap(), b"{}");
    }

    #[test]
    fn search_lists_children_with_parent() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = FsTracker::at(dir.path());
        let parent = tracker.start_run("exp", None, &[]).unwrap();
        let child = tracker.start_run("exp", Some(parent.id()), &[]).unwrap();
        let runs = tracker.search_runs("exp").unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().any(|r| r.parent.as_ref() == Some(parent.id())));
        assert!(runs.iter().any(|r| &r.run_id == child.id()));
    }

    #[test]
    fn same_millisecond_runs_keep_creation_order() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = FsTracker::at(dir.path());
        let mut created = Vec::new();
        for _ in 0..5 {
            let mut run = tracker.start_run("exp", None, &[]).unwrap();
            run.record.start_ms = 1_000;
            run.log_metric("val_recall_fail_tuned", 0.5).unwrap();
            created.push(run.finish(RunStatus::Finished).unwrap());
        }
        let seqs: Vec<u64> = created.iter().map(|run| run.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);

        let runs = tracker.search_runs("exp").unwrap();
        let ids: Vec<&RunId> = runs.iter().map(|run| &run.run_id).collect();
        let expected: Vec<&RunId> = created.iter().map(|run| &run.run_id).collect();
        assert_eq!(ids, expected);

        let best = best_run(&runs, "val_recall_fail_tuned", true).unwrap();
        assert_eq!(best.run_id, created[0].run_id);
    }

    #[test]
    fn unknown_experiment_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsTracker::at(dir.path()).search_runs("missing").unwrap_err();
        assert!(matches!(err, PassError::NotFound(_)));
    }

    #[test]
    fn hostile_paths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = FsTracker::at(dir.path());
        assert!(tracker.start_run("../escape", None, &[]).is_err());
        let mut run = tracker.start_run("exp", None, &[]).unwrap();
        assert!(run.log_artifact("../x", b"").is_err());
        assert!(run.log_artifact("/etc/x", b"").is_err());
        assert!(run.log_metric("nan", f64::NAN).is_err());
    }
}
