//! Hyperparameter search with post-training threshold tuning.
//!
//! Every trial fits a logistic regression, sweeps the decision threshold on
//! the validation fail probabilities and keeps the model artifact only when
//! the accuracy floor was met. The search minimises `-recall` on the fail
//! class.

use crate::common::config::TrainingCfg;
use crate::common::error::{PassError, PassResult};
use crate::data::TrainingSplit;
use crate::evaluation::service::{log_classification_report, log_features};
use crate::evaluation::threshold::{binarize, select_threshold};
use crate::evaluation::ThresholdOutcome;
use crate::tracking::{FsTracker, RunId, RunRecord, RunRecorder, RunStatus};

use super::domain::{LogisticParams, TrainedModel};
use super::logistic;
use super::repo_fs::store_model;
use super::search::{SearchSpace, SearchStrategy};

#[derive(Clone, Debug, PartialEq)]
pub struct HpoSettings {
    pub experiment: String,
    pub tag: String,
    pub acc_min: f64,
    pub max_evals: usize,
}

impl From<&TrainingCfg> for HpoSettings {
    fn from(cfg: &TrainingCfg) -> Self {
        Self {
            experiment: cfg.experiment.clone(),
            tag: cfg.tag.clone(),
            acc_min: cfg.acc_min,
            max_evals: cfg.max_evals,
        }
    }
}

/// Outcome of one search trial.
#[derive(Clone, Debug)]
pub struct Trial {
    pub run_id: RunId,
    pub params: LogisticParams,
    pub outcome: ThresholdOutcome,
    pub loss: f64,
    pub model_saved: bool,
}

/// Everything a finished search produced.
#[derive(Clone, Debug)]
pub struct HpoResult {
    pub parent: RunRecord,
    pub trials: Vec<Trial>,
    /// Index into `trials` of the lowest loss; the first one wins ties.
    pub best: usize,
    pub best_model: TrainedModel,
}

impl HpoResult {
    pub fn best_trial(&self) -> &Trial {
        &self.trials[self.best]
    }
}

/// Tune the threshold of a fitted `model` and log the trial onto `run`.
///
/// Returns the selector outcome and the model carrying the tuned threshold.
/// The model artifact is written only for a satisfiable outcome.
pub fn evaluate_trial(
    run: &mut dyn RunRecorder,
    model: TrainedModel,
    split: &TrainingSplit,
    acc_min: f64,
) -> PassResult<(ThresholdOutcome, TrainedModel)> {
    let prob_fail = model.prob_fail(&split.x_val)?;
    let outcome = select_threshold(&split.y_val, &prob_fail, acc_min)?;
    let choice = outcome.or_fallback();

    run.log_param("threshold", &choice.threshold.to_string())?;
    run.log_metric("val_recall_fail_tuned", choice.recall_negative)?;
    run.log_metric("val_accuracy_tuned", choice.accuracy)?;
    run.set_tag(
        "threshold_status",
        if outcome.is_satisfied() { "selected" } else { "unsatisfiable" },
    )?;

    let y_pred = binarize(&prob_fail, choice.threshold);
    log_classification_report(run, &split.y_val, &y_pred, "val_")?;
    run.log_params(&model.params.as_params())?;
    log_features(run, &model)?;

    let model = model.with_threshold(outcome.selected().map(|c| c.threshold));
    if outcome.is_satisfied() {
        store_model(run, &model)?;
    }
    Ok((outcome, model))
}

/// Run `settings.max_evals` trials under a parent run of `settings.experiment`.
pub fn run_hpo(
    split: &TrainingSplit,
    tracker: &FsTracker,
    strategy: &mut dyn SearchStrategy,
    space: &SearchSpace,
    settings: &HpoSettings,
) -> PassResult<HpoResult> {
    space.validate()?;
    if settings.max_evals == 0 {
        return Err(PassError::invalid("max_evals must be at least 1"));
    }
    let mut parent = tracker.start_run(
        &settings.experiment,
        None,
        &[("model", settings.tag.as_str())],
    )?;
    parent.log_param("acc_min", &settings.acc_min.to_string())?;
    parent.log_param("max_evals", &settings.max_evals.to_string())?;

    let mut trials: Vec<Trial> = Vec::with_capacity(settings.max_evals);
    let mut best: Option<(usize, TrainedModel)> = None;
    for index in 0..settings.max_evals {
        let params = strategy.propose(space);
        let mut run = tracker.start_run(
            &settings.experiment,
            Some(parent.id()),
            &[("model", settings.tag.as_str())],
        )?;

        let evaluated = logistic::fit(
            &split.x_train,
            &split.y_train,
            &params,
            split.vectorizer.clone(),
        )
        .and_then(|model| evaluate_trial(&mut run, model, split, settings.acc_min));
        let (outcome, model) = match evaluated {
            Ok(evaluated) => evaluated,
            Err(err) => {
                tracing::warn!(trial = index, error = %err, "trial failed");
                run.finish(RunStatus::Failed)?;
                parent.finish(RunStatus::Failed)?;
                return Err(err);
            }
        };

        let choice = outcome.or_fallback();
        let loss = -choice.recall_negative;
        strategy.report(&params, loss);
        let record = run.finish(RunStatus::Finished)?;
        tracing::info!(
            trial = index,
            run_id = %record.run_id,
            c = params.c,
            penalty = %params.penalty,
            threshold = choice.threshold,
            recall_fail = choice.recall_negative,
            accuracy = choice.accuracy,
            saved = outcome.is_satisfied(),
            "trial finished"
        );

        let improves = best
            .as_ref()
            .map_or(true, |(idx, _)| loss < trials[*idx].loss);
        if improves {
            best = Some((index, model));
        }
        trials.push(Trial {
            run_id: record.run_id,
            params,
            outcome,
            loss,
            model_saved: outcome.is_satisfied(),
        });
    }

    let (best, best_model) = best.ok_or_else(|| PassError::internal("search produced no trials"))?;
    let winner = &trials[best];
    parent.log_metric("best_loss", winner.loss)?;
    parent.set_tag("best_run", winner.run_id.as_str())?;
    parent.log_params(
        &winner
            .params
            .as_params()
            .into_iter()
            .map(|(key, value)| (format!("best_{key}"), value))
            .collect(),
    )?;
    let parent = parent.finish(RunStatus::Finished)?;
    tracing::info!(best_run = %winner.run_id, loss = winner.loss, "search finished");

    Ok(HpoResult {
        parent,
        trials,
        best,
        best_model,
    })
}
