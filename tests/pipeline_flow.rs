use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use passcompass::evaluation::threshold::binarize;
use passcompass::inference::Predictor;
use passcompass::pipeline::{register_best, train_logreg_flow, RegisterRequest};
use passcompass::tracking::{FsRegistry, FsTracker, Stage, MODEL_ARTIFACT};
use passcompass::{AppCfg, PassError};
use serde_json::json;

fn write_students(path: &Path, rows: usize) {
    let mut text = String::from("sex,studytime,failures,absences,pass\n");
    for i in 0..rows {
        let studytime = i % 4 + 1;
        let failures = if i % 7 == 0 { 2 } else { 0 };
        let absences = (i * 3) % 11;
        let pass = u8::from(studytime >= 2 && failures == 0);
        let sex = if i % 3 == 0 { "F" } else { "M" };
        writeln!(text, "{sex},{studytime},{failures},{absences},{pass}").unwrap();
    }
    fs::write(path, text).unwrap();
}

fn config(root: &Path) -> AppCfg {
    let mut cfg = AppCfg::default();
    cfg.training.data_path = root.join("train.csv");
    cfg.training.max_evals = 4;
    cfg.training.acc_min = 0.0;
    cfg.tracking.root = root.join("mlruns");
    cfg.registry.root = root.join("mlruns").join("registry");
    cfg
}

#[test]
fn train_register_and_predict() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    write_students(&cfg.training.data_path, 80);

    let result = train_logreg_flow(&cfg).unwrap();
    assert_eq!(result.trials.len(), 4);
    assert!(result.trials.iter().all(|trial| trial.model_saved));

    let tracker = FsTracker::new(&cfg.tracking);
    let registry = FsRegistry::new(&cfg.registry);
    let request = RegisterRequest {
        experiment: &cfg.training.experiment,
        metric: "val_recall_fail_tuned",
        higher_is_better: true,
        model_name: &cfg.registry.model_name,
        stage: Stage::Staging,
    };
    let version = register_best(&tracker, &registry, &request).unwrap();
    assert_eq!(version.stage, Stage::Staging);

    let registered_run = tracker
        .get_run(&cfg.training.experiment, &version.run_id)
        .unwrap();
    assert!(registered_run.has_artifact(MODEL_ARTIFACT));
    let best_recall = result
        .trials
        .iter()
        .map(|trial| -trial.loss)
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(
        registered_run.metric("val_recall_fail_tuned"),
        Some(best_recall)
    );

    let predictor = Predictor::load(&cfg.registry).unwrap();
    let model = predictor.model();
    let threshold = model.threshold.expect("saved models carry their threshold");

    for failures in [0, 2] {
        let record = json!({"sex": "F", "studytime": 3, "failures": failures, "absences": 4});
        let prediction = predictor.predict(record.as_object().unwrap()).unwrap();
        let x = model
            .vectorizer
            .transform_record([
                ("sex", &passcompass::data::Cell::Text("F".into())),
                ("studytime", &passcompass::data::Cell::Num(3.0)),
                ("failures", &passcompass::data::Cell::Num(f64::from(failures))),
                ("absences", &passcompass::data::Cell::Num(4.0)),
            ])
            .unwrap();
        let prob_fail = model.prob_fail(&x).unwrap();
        assert_eq!(prediction.prediction, binarize(&prob_fail, threshold)[0]);
        assert!((0.0..=1.0).contains(&prediction.proba_pass));
        let expected_label = if prediction.prediction == 1 { "Pass" } else { "Fail" };
        assert_eq!(prediction.label.to_string(), expected_label);
    }
}

#[test]
fn unreachable_floor_leaves_nothing_to_register() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.training.max_evals = 2;
    cfg.training.acc_min = 1.0;
    // Identical features with conflicting labels cap accuracy below 1.0.
    let mut text = String::from("studytime,pass\n");
    for i in 0..30 {
        writeln!(text, "2,{}", i % 2).unwrap();
    }
    fs::write(&cfg.training.data_path, text).unwrap();

    let result = train_logreg_flow(&cfg).unwrap();
    assert!(result.trials.iter().all(|trial| !trial.model_saved));
    assert!(result.trials.iter().all(|trial| trial.loss == 0.0));

    let request = RegisterRequest {
        experiment: &cfg.training.experiment,
        metric: "val_recall_fail_tuned",
        higher_is_better: true,
        model_name: &cfg.registry.model_name,
        stage: Stage::Staging,
    };
    let err = register_best(
        &FsTracker::new(&cfg.tracking),
        &FsRegistry::new(&cfg.registry),
        &request,
    )
    .unwrap_err();
    assert!(matches!(err, PassError::ModelMissing(_)));
    assert!(matches!(
        Predictor::load(&cfg.registry),
        Err(PassError::ModelMissing(_))
    ));
}
