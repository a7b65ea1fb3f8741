//! Train flow: vectorise the training table, search hyperparameters and
//! evaluate the winner on the held-out test table when one is present.

use std::path::PathBuf;

use crate::common::config::AppCfg;
use crate::common::error::PassResult;
use crate::data::{repo_fs, service};
use crate::evaluation::evaluate_and_log;
use crate::tracking::{FsTracker, RunRecorder, RunStatus};
use crate::training::{run_hpo, HpoResult, HpoSettings, RandomSearch, SearchSpace};

/// `test.csv` written by the extract flow next to the training table.
fn test_table(cfg: &AppCfg) -> PathBuf {
    cfg.training.data_path.with_file_name("test.csv")
}

pub fn train_logreg_flow(cfg: &AppCfg) -> PassResult<HpoResult> {
    let training = &cfg.training;
    let frame = repo_fs::read_csv(&training.data_path, b',')?;
    tracing::info!(
        path = %training.data_path.display(),
        rows = frame.len(),
        dataset = %frame.fingerprint(),
        "training data loaded"
    );
    let split = service::vectorize(&frame, &training.target, training.val_size, training.seed)?;

    let tracker = FsTracker::new(&cfg.tracking);
    let mut strategy = RandomSearch::new(training.seed);
    let result = run_hpo(
        &split,
        &tracker,
        &mut strategy,
        &SearchSpace::default(),
        &HpoSettings::from(training),
    )?;
    let best = result.best_trial();
    tracing::info!(
        run_id = %best.run_id,
        c = best.params.c,
        penalty = %best.params.penalty,
        class_weight = %best.params.class_weight,
        recall_fail = -best.loss,
        "best params"
    );

    let test_path = test_table(cfg);
    if test_path.is_file() {
        let test = repo_fs::read_csv(&test_path, b',')?;
        let labels = test.labels(&training.target)?;
        let x = result
            .best_model
            .vectorizer
            .transform(&test, &[training.target.as_str()]);
        let mut run = tracker.start_run(
            &training.experiment,
            Some(&result.parent.run_id),
            &[("model", training.tag.as_str()), ("stage", "test-eval")],
        )?;
        run.set_tag("evaluated_run", best.run_id.as_str())?;
        match evaluate_and_log(&result.best_model, &x, &labels, &mut run, "test_") {
            Ok(_) => {
                run.finish(RunStatus::Finished)?;
            }
            Err(err) => {
                run.finish(RunStatus::Failed)?;
                return Err(err);
            }
        }
    } else {
        tracing::info!(path = %test_path.display(), "no test table, skipping test evaluation");
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;
    use std::fs;

    fn write_table(path: &std::path::Path, rows: usize, offset: usize) {
        let mut text = String::from("school,studytime,failures,pass\n");
        for i in offset..offset + rows {
            let studytime = i % 4 + 1;
            let failures = if i % 5 == 0 { 2 } else { 0 };
            let pass = u8::from(studytime >= 2 && failures == 0);
            let school = if i % 2 == 0 { "GP" } else { "MS" };
            writeln!(text, "{school},{studytime},{failures},{pass}").unwrap();
        }
        fs::write(path, text).unwrap();
    }

    #[test]
    fn flow_searches_and_evaluates_on_test_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = AppCfg::default();
        cfg.training.data_path = dir.path().join("train.csv");
        cfg.training.max_evals = 3;
        cfg.training.acc_min = 0.0;
        cfg.tracking.root = dir.path().join("mlruns");
        write_table(&cfg.training.data_path, 60, 0);
        write_table(&test_table(&cfg), 20, 60);

        let result = train_logreg_flow(&cfg).unwrap();
        assert_eq!(result.trials.len(), 3);

        let runs = FsTracker::new(&cfg.tracking)
            .search_runs(&cfg.training.experiment)
            .unwrap();
        let eval = runs
            .iter()
            .find(|r| r.tags.get("stage").map(String::as_str) == Some("test-eval"))
            .unwrap();
        assert!(eval.metric("test_accuracy").is_some());
        assert!(eval.metric("test_roc_auc").is_some());
        assert!(eval.has_artifact(crate::evaluation::service::CONFUSION_ARTIFACT));
        let best = result.best_trial();
        assert_eq!(
            eval.tags.get("evaluated_run").map(String::as_str),
            Some(best.run_id.as_str())
        );
    }
}
