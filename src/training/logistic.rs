//! Binary logistic regression fitted by proximal gradient descent.
//!
//! Features are standardised internally. The objective is the mean weighted
//! log-loss plus `λ/2·‖w‖²` (L2) or `λ·‖w‖₁` (L1) with `λ = 1 / (C·n)`, which
//! matches the usual `C`-scaled formulation up to a constant factor.

use ndarray::{Array1, Array2, Axis};

use crate::common::error::{PassError, PassResult};
use crate::data::Vectorizer;

use super::domain::{sigmoid, ClassWeight, LogisticParams, Penalty, TrainedModel};

/// Per-sample weights for `labels` under `class_weight`.
pub fn sample_weights(labels: &[u8], class_weight: ClassWeight) -> Vec<f64> {
    match class_weight {
        ClassWeight::None => vec![1.0; labels.len()],
        ClassWeight::Balanced => {
            let n = labels.len() as f64;
            let positives = labels.iter().filter(|&&y| y == 1).count() as f64;
            let negatives = n - positives;
            labels
                .iter()
                .map(|&y| {
                    let in_class = if y == 1 { positives } else { negatives };
                    n / (2.0 * in_class)
                })
                .collect()
        }
    }
}

fn soft_threshold(value: f64, shrink: f64) -> f64 {
    value.signum() * (value.abs() - shrink).max(0.0)
}

fn column_stats(x: &Array2<f64>) -> (Vec<f64>, Vec<f64>) {
    let means = x
        .mean_axis(Axis(0))
        .map_or_else(|| vec![0.0; x.ncols()], |m| m.to_vec());
    let scales = x
        .std_axis(Axis(0), 0.0)
        .iter()
        .map(|&s| if s > 1e-12 { s } else { 1.0 })
        .collect();
    (means, scales)
}

/// Fit a model on `x` (one row per sample) against 0/1 `labels`.
pub fn fit(
    x: &Array2<f64>,
    labels: &[u8],
    params: &LogisticParams,
    vectorizer: Vectorizer,
) -> PassResult<TrainedModel> {
    params.validate()?;
    let (n, d) = x.dim();
    if n == 0 || n != labels.len() {
        return Err(PassError::invalid(format!(
            "{n} rows but {} labels",
            labels.len()
        )));
    }
    if vectorizer.n_features() != d {
        return Err(PassError::invalid(format!(
            "vectorizer has {} features, matrix has {d}",
            vectorizer.n_features()
        )));
    }
    if labels.iter().any(|&y| y > 1) {
        return Err(PassError::invalid("labels must be 0 or 1"));
    }
    if !labels.contains(&0) || !labels.contains(&1) {
        return Err(PassError::invalid("training labels contain a single class"));
    }

    let (means, scales) = column_stats(x);
    let z = TrainedModel::standardize(x, &means, &scales);
    let y = Array1::from_iter(labels.iter().map(|&label| f64::from(label)));
    let sw = Array1::from_vec(sample_weights(labels, params.class_weight));

    let n_f = n as f64;
    let lambda = 1.0 / (params.c * n_f);
    // Lipschitz bound of the smooth part; the intercept column contributes the +1.
    let row_norms = z.map_axis(Axis(1), |row| row.dot(&row) + 1.0);
    let mut lipschitz = 0.25 * sw.dot(&row_norms) / n_f;
    if params.penalty == Penalty::L2 {
        lipschitz += lambda;
    }
    let step = 1.0 / lipschitz.max(1e-12);

    let mut w = Array1::<f64>::zeros(d);
    let mut b = 0.0;
    let mut iterations = 0;
    for iter in 1..=params.max_iter {
        iterations = iter;
        let margin = z.dot(&w) + b;
        let residual = (margin.mapv(sigmoid) - &y) * &sw / n_f;
        let mut grad_w = z.t().dot(&residual);
        if params.penalty == Penalty::L2 {
            grad_w.scaled_add(lambda, &w);
        }
        let grad_b = residual.sum();

        let mut next_w = &w - &(grad_w * step);
        if params.penalty == Penalty::L1 {
            next_w.mapv_inplace(|v| soft_threshold(v, step * lambda));
        }
        let next_b = b - step * grad_b;

        let delta = next_w
            .iter()
            .zip(w.iter())
            .map(|(a, c)| (a - c).abs())
            .fold((next_b - b).abs(), f64::max);
        w = next_w;
        b = next_b;
        if !delta.is_finite() {
            return Err(PassError::internal("logistic regression diverged"));
        }
        if delta < params.tol {
            break;
        }
    }
    tracing::debug!(
        iterations,
        c = params.c,
        penalty = %params.penalty,
        class_weight = %params.class_weight,
        "logistic regression fitted"
    );

    Ok(TrainedModel {
        params: *params,
        vectorizer,
        means,
        scales,
        coef: w.to_vec(),
        intercept: b,
        threshold: None,
        iterations,
    })
}
