//! Promote the best tracked run of an experiment into the model registry.

use crate::common::error::{PassError, PassResult};
use crate::tracking::{best_run, FsRegistry, FsTracker, ModelVersion, Stage, MODEL_ARTIFACT};

/// Selection criteria for [`register_best`].
#[derive(Clone, Debug)]
pub struct RegisterRequest<'a> {
    pub experiment: &'a str,
    pub metric: &'a str,
    pub higher_is_better: bool,
    pub model_name: &'a str,
    pub stage: Stage,
}

/// Register the best run that carries a model and move it to `request.stage`,
/// archiving the versions previously in that stage.
pub fn register_best(
    tracker: &FsTracker,
    registry: &FsRegistry,
    request: &RegisterRequest<'_>,
) -> PassResult<ModelVersion> {
    let candidates = tracker
        .search_runs(request.experiment)?
        .into_iter()
        .filter(|run| run.has_artifact(MODEL_ARTIFACT))
        .collect::<Vec<_>>();
    let best = best_run(&candidates, request.metric, request.higher_is_better).ok_or_else(|| {
        PassError::model_missing(format!(
            "no run of '{}' has a saved model",
            request.experiment
        ))
    })?;
    tracing::info!(
        run_id = %best.run_id,
        metric = request.metric,
        value = ?best.metric(request.metric),
        "best run selected"
    );

    let version = registry.register_model(tracker, best, request.model_name)?;
    registry.transition_stage(request.model_name, version.version, request.stage, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{RunRecorder, RunStatus};

    fn run(tracker: &FsTracker, recall: f64, with_model: bool) {
        let mut run = tracker.start_run("exp", None, &[]).unwrap();
        run.log_metric("val_recall_fail_tuned", recall).unwrap();
        if with_model {
            run.log_artifact(MODEL_ARTIFACT, format!("{{\"recall\":{recall}}}").as_bytes())
                .unwrap();
        }
        run.finish(RunStatus::Finished).unwrap();
    }

    fn request(higher_is_better: bool) -> RegisterRequest<'static> {
        RegisterRequest {
            experiment: "exp",
            metric: "val_recall_fail_tuned",
            higher_is_better,
            model_name: "students",
            stage: Stage::Staging,
        }
    }

    #[test]
    fn best_run_with_model_is_staged() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = FsTracker::at(&dir.path().join("runs"));
        let registry = FsRegistry::at(&dir.path().join("registry"));
        run(&tracker, 0.6, true);
        // Better metric but no model artifact: not eligible.
        run(&tracker, 0.95, false);
        run(&tracker, 0.8, true);

        let version = register_best(&tracker, &registry, &request(true)).unwrap();
        assert_eq!((version.version, version.stage), (1, Stage::Staging));
        assert_eq!(registry.model_bytes(&version).unwrap(), b"{\"recall\":0.8}");

        let lowest = register_best(&tracker, &registry, &request(false)).unwrap();
        assert_eq!(registry.model_bytes(&lowest).unwrap(), b"{\"recall\":0.6}");
        let versions = registry.versions("students").unwrap();
        assert_eq!(versions[0].stage, Stage::Archived);
        assert_eq!(versions[1].stage, Stage::Staging);
    }

    #[test]
    fn experiment_without_models_is_model_missing() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = FsTracker::at(dir.path());
        run(&tracker, 0.9, false);
        let registry = FsRegistry::at(&dir.path().join("registry"));
        let err = register_best(&tracker, &registry, &request(true)).unwrap_err();
        assert!(matches!(err, PassError::ModelMissing(_)));
    }
}
