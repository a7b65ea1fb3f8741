//! Evaluation entry points that report into a tracked run.

use std::collections::BTreeMap;

use ndarray::Array2;
use serde_json::json;

use crate::common::error::PassResult;
use crate::tracking::RunRecorder;
use crate::training::TrainedModel;

use super::metrics;

pub const REPORT_ARTIFACT: &str = "reports/classification_report.json";
pub const CONFUSION_ARTIFACT: &str = "plots/confusion_matrix.json";

/// Log the flattened classification report and store the nested one as an artifact.
pub fn log_classification_report(
    run: &mut dyn RunRecorder,
    y_true: &[u8],
    y_pred: &[u8],
    prefix: &str,
) -> PassResult<BTreeMap<String, f64>> {
    let report = metrics::classification_report(y_true, y_pred)?;
    let flat = report.flatten(prefix);
    run.log_metrics(&flat)?;
    let body = serde_json::to_vec_pretty(&report.to_json())?;
    run.log_artifact(REPORT_ARTIFACT, &body)?;
    Ok(flat)
}

/// Record the model's feature layout on `run`.
pub fn log_features(run: &mut dyn RunRecorder, model: &TrainedModel) -> PassResult<()> {
    let names = model.vectorizer.feature_names();
    run.log_param("num_features", &names.len().to_string())?;
    run.set_tag("feature_list", &serde_json::to_string(names)?)
}

/// Score `model` on `(x, y)` and log the headline metrics under `prefix`.
pub fn evaluate_and_log(
    model: &TrainedModel,
    x: &Array2<f64>,
    y: &[u8],
    run: &mut dyn RunRecorder,
    prefix: &str,
) -> PassResult<BTreeMap<String, f64>> {
    let proba_pass = model.predict_proba(x)?;
    let y_pred = model.predict(x)?;
    let cm = metrics::confusion_matrix(y, &y_pred)?;
    let report = metrics::classification_report(y, &y_pred)?;

    let results = BTreeMap::from([
        (format!("{prefix}roc_auc"), metrics::roc_auc(y, &proba_pass)?),
        (format!("{prefix}f1_macro"), report.macro_avg.f1_score),
        (format!("{prefix}accuracy"), metrics::accuracy(&cm)),
        (format!("{prefix}f1_fail"), metrics::f1(&cm, 0)),
        (format!("{prefix}precision_fail"), metrics::precision(&cm, 0)),
        (format!("{prefix}recall_fail"), metrics::recall(&cm, 0)),
    ]);
    run.log_metrics(&results)?;

    let confusion = json!({
        "labels": ["Fail", "Pass"],
        "counts": cm.counts,
    });
    run.log_artifact(CONFUSION_ARTIFACT, &serde_json::to_vec_pretty(&confusion)?)?;
    log_features(run, model)?;

    tracing::info!(
        prefix,
        accuracy = results[&format!("{prefix}accuracy")],
        recall_fail = results[&format!("{prefix}recall_fail")],
        "model evaluated"
    );
    Ok(results)
}
