//! Seeded train/test splitting, optionally stratified on a binary label.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::common::error::{PassError, PassResult};

/// Row indices of the two halves of a split.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn test_count(n: usize, test_size: f64) -> PassResult<usize> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(PassError::invalid(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }
    let count = (test_size * n as f64).ceil() as usize;
    if count == 0 || count >= n {
        return Err(PassError::invalid(format!(
            "cannot split {n} rows with test_size {test_size}"
        )));
    }
    Ok(count)
}

/// Shuffle `0..n` and cut off `ceil(test_size * n)` rows for the test side.
pub fn shuffle_split(n: usize, test_size: f64, seed: u64) -> PassResult<SplitIndices> {
    let n_test = test_count(n, test_size)?;
    let mut indices = (0..n).collect::<Vec<_>>();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let train = indices.split_off(n_test);
    Ok(SplitIndices {
        train,
        test: indices,
    })
}

/// Split keeping the class balance of `labels` on both sides.
///
/// Each class contributes a share of the test rows proportional to its size;
/// rounding remainders go to the larger classes first.
pub fn stratified_split(labels: &[u8], test_size: f64, seed: u64) -> PassResult<SplitIndices> {
    let n = labels.len();
    let n_test = test_count(n, test_size)?;

    let mut by_class: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (idx, &label) in labels.iter().enumerate() {
        match label {
            0 | 1 => by_class[label as usize].push(idx),
            other => return Err(PassError::invalid(format!("label {other} is not 0 or 1"))),
        }
    }
    if by_class.iter().any(|rows| rows.len() < 2) {
        return Err(PassError::invalid(
            "stratified split needs at least two rows of each class",
        ));
    }

    let mut quotas = by_class
        .iter()
        .map(|rows| (rows.len() as f64 * n_test as f64 / n as f64).floor() as usize)
        .collect::<Vec<_>>();
    let mut order = [0usize, 1usize];
    order.sort_by_key(|&class| std::cmp::Reverse(by_class[class].len()));
    let mut missing = n_test - quotas.iter().sum::<usize>();
    for &class in order.iter().cycle().take(4) {
        if missing == 0 {
            break;
        }
        if quotas[class] + 1 < by_class[class].len() {
            quotas[class] += 1;
            missing -= 1;
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (class, rows) in by_class.iter_mut().enumerate() {
        rows.shuffle(&mut rng);
        test.extend_from_slice(&rows[..quotas[class]]);
        train.extend_from_slice(&rows[quotas[class]..]);
    }
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    Ok(SplitIndices { train, test })
}
