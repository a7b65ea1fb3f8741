//! Hyperparameter search strategies for logistic regression.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::error::{PassError, PassResult};

use super::domain::{ClassWeight, LogisticParams, Penalty};

/// Region explored by a strategy.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchSpace {
    /// Bounds of `ln(C)`, sampled uniformly.
    pub log_c: (f64, f64),
    pub penalties: Vec<Penalty>,
    pub class_weights: Vec<ClassWeight>,
    pub max_iter: usize,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            log_c: (-7.0, 4.0),
            penalties: vec![Penalty::L1, Penalty::L2],
            class_weights: vec![ClassWeight::None, ClassWeight::Balanced],
            max_iter: 500,
        }
    }
}

impl SearchSpace {
    pub fn validate(&self) -> PassResult<()> {
        let (low, high) = self.log_c;
        if !(low.is_finite() && high.is_finite() && low <= high) {
            return Err(PassError::invalid(format!("bad log_c bounds ({low}, {high})")));
        }
        if self.penalties.is_empty() || self.class_weights.is_empty() {
            return Err(PassError::invalid("search space has an empty choice"));
        }
        if self.max_iter == 0 {
            return Err(PassError::invalid("max_iter must be at least 1"));
        }
        Ok(())
    }
}

/// Proposes trial parameters and learns from the reported losses.
pub trait SearchStrategy {
    fn propose(&mut self, space: &SearchSpace) -> LogisticParams;
    /// Lower loss is better.
    fn report(&mut self, params: &LogisticParams, loss: f64);
}

/// Independent uniform sampling from the space.
#[derive(Debug)]
pub struct RandomSearch {
    rng: StdRng,
    history: Vec<(LogisticParams, f64)>,
}

impl RandomSearch {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[(LogisticParams, f64)] {
        &self.history
    }
}

impl SearchStrategy for RandomSearch {
    fn propose(&mut self, space: &SearchSpace) -> LogisticParams {
        let (low, high) = space.log_c;
        let log_c = if low < high {
            self.rng.random_range(low..high)
        } else {
            low
        };
        let penalty = space.penalties[self.rng.random_range(0..space.penalties.len())];
        let class_weight = space.class_weights[self.rng.random_range(0..space.class_weights.len())];
        LogisticParams {
            c: log_c.exp(),
            penalty,
            class_weight,
            max_iter: space.max_iter,
            ..LogisticParams::default()
        }
    }

    fn report(&mut self, params: &LogisticParams, loss: f64) {
        self.history.push((*params, loss));
    }
}
