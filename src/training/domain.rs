//! Domain types for model training: hyperparameters and the trained model artefact.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::common::error::{PassError, PassResult};
use crate::data::Vectorizer;
use crate::evaluation::threshold::binarize;

/// Regularisation applied to the coefficients (never the intercept).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    L1,
    L2,
}

/// Per-sample weighting by class.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassWeight {
    None,
    /// `n_samples / (2 * n_samples_in_class)`.
    Balanced,
}

impl fmt::Display for Penalty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Penalty::L1 => "l1",
            Penalty::L2 => "l2",
        })
    }
}

impl fmt::Display for ClassWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClassWeight::None => "none",
            ClassWeight::Balanced => "balanced",
        })
    }
}

/// Logistic regression hyperparameters.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    /// Inverse regularisation strength.
    pub c: f64,
    pub penalty: Penalty,
    pub class_weight: ClassWeight,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            penalty: Penalty::L2,
            class_weight: ClassWeight::None,
            max_iter: 500,
            tol: 1e-6,
        }
    }
}

impl LogisticParams {
    pub fn validate(&self) -> PassResult<()> {
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(PassError::invalid(format!("C must be positive, got {}", self.c)));
        }
        if self.max_iter == 0 {
            return Err(PassError::invalid("max_iter must be at least 1"));
        }
        if !(self.tol.is_finite() && self.tol >= 0.0) {
            return Err(PassError::invalid(format!("tol must be non-negative, got {}", self.tol)));
        }
        Ok(())
    }

    /// String form used when logging to the tracker.
    pub fn as_params(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("C".to_string(), self.c.to_string()),
            ("penalty".to_string(), self.penalty.to_string()),
            ("class_weight".to_string(), self.class_weight.to_string()),
            ("max_iter".to_string(), self.max_iter.to_string()),
            ("tol".to_string(), self.tol.to_string()),
        ])
    }
}

/// Fitted logistic regression together with its feature pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub params: LogisticParams,
    pub vectorizer: Vectorizer,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub coef: Vec<f64>,
    pub intercept: f64,
    /// Tuned cut-off on the fail probability, when one was selected.
    pub threshold: Option<f64>,
    pub iterations: usize,
}

pub(crate) fn sigmoid(margin: f64) -> f64 {
    if margin >= 0.0 {
        1.0 / (1.0 + (-margin).exp())
    } else {
        let e = margin.exp();
        e / (1.0 + e)
    }
}

impl TrainedModel {
    pub fn n_features(&self) -> usize {
        self.coef.len()
    }

    fn check_width(&self, x: &Array2<f64>) -> PassResult<()> {
        if x.ncols() != self.n_features() {
            return Err(PassError::invalid(format!(
                "model expects {} features, got {}",
                self.n_features(),
                x.ncols()
            )));
        }
        Ok(())
    }

    /// Standardise with the statistics captured at fit time.
    pub(crate) fn standardize(x: &Array2<f64>, means: &[f64], scales: &[f64]) -> Array2<f64> {
        let means = Array1::from_vec(means.to_vec());
        let scales = Array1::from_vec(scales.to_vec());
        (x - &means.insert_axis(Axis(0))) / &scales.insert_axis(Axis(0))
    }

    /// Probability of the pass class (label 1) for each row.
    pub fn predict_proba(&self, x: &Array2<f64>) -> PassResult<Vec<f64>> {
        self.check_width(x)?;
        let z = Self::standardize(x, &self.means, &self.scales);
        let coef = Array1::from_vec(self.coef.clone());
        Ok(z.dot(&coef).iter().map(|&m| sigmoid(m + self.intercept)).collect())
    }

    /// Probability of the fail class (label 0) for each row.
    pub fn prob_fail(&self, x: &Array2<f64>) -> PassResult<Vec<f64>> {
        Ok(self.predict_proba(x)?.into_iter().map(|p| 1.0 - p).collect())
    }

    /// Hard labels: the tuned fail threshold when present, else `P(pass) >= 0.5`.
    pub fn predict(&self, x: &Array2<f64>) -> PassResult<Vec<u8>> {
        let proba = self.predict_proba(x)?;
        Ok(match self.threshold {
            Some(threshold) => {
                let fail = proba.iter().map(|p| 1.0 - p).collect::<Vec<_>>();
                binarize(&fail, threshold)
            }
            None => proba.iter().map(|&p| u8::from(p >= 0.5)).collect(),
        })
    }

    pub fn with_threshold(mut self, threshold: Option<f64>) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn to_json_bytes(&self) -> PassResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> PassResult<Self> {
        let mut model: TrainedModel = serde_json::from_slice(bytes)?;
        model.vectorizer = model.vectorizer.reindexed();
        let d = model.coef.len();
        if model.means.len() != d
            || model.scales.len() != d
            || model.vectorizer.n_features() != d
        {
            return Err(PassError::invalid("model artefact has inconsistent feature counts"));
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!(!sigmoid(-800.0).is_nan());
    }

    #[test]
    fn params_validate_and_render() {
        assert!(LogisticParams::default().validate().is_ok());
        let bad = LogisticParams {
            c: 0.0,
            ..LogisticParams::default()
        };
        assert!(bad.validate().is_err());
        let params = LogisticParams::default().as_params();
        assert_eq!(params["penalty"], "l2");
        assert_eq!(params["class_weight"], "none");
        assert_eq!(params["C"], "1");
    }
}
