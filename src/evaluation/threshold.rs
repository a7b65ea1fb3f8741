//! Decision threshold sweep favouring recall on the fail class under an accuracy floor.

use crate::common::error::{PassError, PassResult};

use super::domain::{ThresholdChoice, ThresholdOutcome};

/// The grid holds `GRID_STEPS + 1` thresholds from 0.0 to 1.0.
pub const GRID_STEPS: u32 = 100;

/// Candidate thresholds in ascending scan order: `i / 100` for `i` in `0..=100`.
pub fn candidate_thresholds() -> impl Iterator<Item = f64> {
    (0..=GRID_STEPS).map(|i| f64::from(i) / f64::from(GRID_STEPS))
}

/// Predict fail (0) when `prob_fail >= threshold`, pass (1) otherwise.
pub fn binarize(prob_fail: &[f64], threshold: f64) -> Vec<u8> {
    prob_fail
        .iter()
        .map(|&p| if p >= threshold { 0 } else { 1 })
        .collect()
}

/// Recall on label 0 and accuracy at `threshold`. Recall is 0.0 without fail samples.
pub fn score_at(labels: &[u8], prob_fail: &[f64], threshold: f64) -> ThresholdChoice {
    let mut correct = 0usize;
    let mut fails = 0usize;
    let mut fails_caught = 0usize;
    for (&label, &p) in labels.iter().zip(prob_fail) {
        let predicted = if p >= threshold { 0 } else { 1 };
        if predicted == label {
            correct += 1;
        }
        if label == 0 {
            fails += 1;
            if predicted == 0 {
                fails_caught += 1;
            }
        }
    }
    let recall_negative = if fails == 0 {
        0.0
    } else {
        fails_caught as f64 / fails as f64
    };
    ThresholdChoice {
        threshold,
        recall_negative,
        accuracy: correct as f64 / labels.len().max(1) as f64,
    }
}

fn validate(labels: &[u8], prob_fail: &[f64], min_accuracy: f64) -> PassResult<()> {
    if labels.is_empty() {
        return Err(PassError::invalid("threshold sweep needs at least one sample"));
    }
    if labels.len() != prob_fail.len() {
        return Err(PassError::invalid(format!(
            "{} labels but {} probabilities",
            labels.len(),
            prob_fail.len()
        )));
    }
    if let Some(idx) = labels.iter().position(|&label| label > 1) {
        return Err(PassError::invalid(format!(
            "label {} at index {idx} is not 0 or 1",
            labels[idx]
        )));
    }
    if let Some(idx) = prob_fail.iter().position(|p| !(0.0..=1.0).contains(p)) {
        return Err(PassError::invalid(format!(
            "probability {} at index {idx} is outside [0, 1]",
            prob_fail[idx]
        )));
    }
    if !(0.0..=1.0).contains(&min_accuracy) {
        return Err(PassError::invalid(format!(
            "min_accuracy {min_accuracy} is outside [0, 1]"
        )));
    }
    Ok(())
}

/// Pick the threshold with the highest fail-class recall whose accuracy is at
/// least `min_accuracy`.
///
/// Equal recall prefers higher accuracy; remaining ties keep the earliest
/// threshold of the ascending scan. Returns [`ThresholdOutcome::Unsatisfiable`]
/// when no candidate reaches the floor.
pub fn select_threshold(
    labels: &[u8],
    prob_fail: &[f64],
    min_accuracy: f64,
) -> PassResult<ThresholdOutcome> {
    validate(labels, prob_fail, min_accuracy)?;

    let mut best: Option<ThresholdChoice> = None;
    for threshold in candidate_thresholds() {
        let candidate = score_at(labels, prob_fail, threshold);
        if candidate.accuracy < min_accuracy {
            continue;
        }
        let improves = match best {
            None => true,
            Some(current) => {
                candidate.recall_negative > current.recall_negative
                    || (candidate.recall_negative == current.recall_negative
                        && candidate.accuracy > current.accuracy)
            }
        };
        if improves {
            best = Some(candidate);
        }
    }

    let outcome = best.map_or(ThresholdOutcome::Unsatisfiable, ThresholdOutcome::Selected);
    match outcome {
        ThresholdOutcome::Selected(choice) => tracing::debug!(
            threshold = choice.threshold,
            recall_fail = choice.recall_negative,
            accuracy = choice.accuracy,
            "threshold selected"
        ),
        ThresholdOutcome::Unsatisfiable => {
            tracing::debug!(min_accuracy, "no threshold meets the accuracy floor")
        }
    }
    Ok(outcome)
}
