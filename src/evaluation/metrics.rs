//! Binary classification metrics.
//!
//! Ratios with an empty denominator evaluate to `0.0` instead of failing.

use crate::common::error::{PassError, PassResult};

use super::domain::{ClassMetrics, ClassificationReport, ConfusionMatrix};

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn check_pair(y_true: &[u8], y_pred: &[u8]) -> PassResult<()> {
    if y_true.is_empty() {
        return Err(PassError::invalid("empty label vectors"));
    }
    if y_true.len() != y_pred.len() {
        return Err(PassError::invalid(format!(
            "actual length {} != predicted length {}",
            y_true.len(),
            y_pred.len()
        )));
    }
    if let Some(bad) = y_true.iter().chain(y_pred).find(|&&label| label > 1) {
        return Err(PassError::invalid(format!("label {bad} is not 0 or 1")));
    }
    Ok(())
}

/// Count actual/predicted pairs.
pub fn confusion_matrix(y_true: &[u8], y_pred: &[u8]) -> PassResult<ConfusionMatrix> {
    check_pair(y_true, y_pred)?;
    let mut cm = ConfusionMatrix::default();
    for (&actual, &predicted) in y_true.iter().zip(y_pred) {
        cm.counts[actual as usize][predicted as usize] += 1;
    }
    Ok(cm)
}

pub fn accuracy(cm: &ConfusionMatrix) -> f64 {
    ratio(cm.correct(), cm.total())
}

pub fn precision(cm: &ConfusionMatrix, class: u8) -> f64 {
    ratio(cm.get(class, class), cm.predicted(class))
}

pub fn recall(cm: &ConfusionMatrix, class: u8) -> f64 {
    ratio(cm.get(class, class), cm.support(class))
}

pub fn f1(cm: &ConfusionMatrix, class: u8) -> f64 {
    let p = precision(cm, class);
    let r = recall(cm, class);
    if p + r == 0.0 {
        0.0
    } else {
        2.0 * p * r / (p + r)
    }
}

pub fn class_metrics(cm: &ConfusionMatrix, class: u8) -> ClassMetrics {
    ClassMetrics {
        precision: precision(cm, class),
        recall: recall(cm, class),
        f1_score: f1(cm, class),
        support: cm.support(class),
    }
}

/// Full per-class report with macro and support-weighted averages.
pub fn classification_report(y_true: &[u8], y_pred: &[u8]) -> PassResult<ClassificationReport> {
    let cm = confusion_matrix(y_true, y_pred)?;
    let classes = [class_metrics(&cm, 0), class_metrics(&cm, 1)];
    let total = cm.total();

    let average = |weight: &dyn Fn(&ClassMetrics) -> f64, norm: f64| ClassMetrics {
        precision: classes.iter().map(|c| weight(c) * c.precision).sum::<f64>() / norm,
        recall: classes.iter().map(|c| weight(c) * c.recall).sum::<f64>() / norm,
        f1_score: classes.iter().map(|c| weight(c) * c.f1_score).sum::<f64>() / norm,
        support: total,
    };

    Ok(ClassificationReport {
        macro_avg: average(&|_: &ClassMetrics| 1.0, 2.0),
        weighted_avg: average(&|c: &ClassMetrics| c.support as f64, total as f64),
        accuracy: accuracy(&cm),
        classes,
    })
}

/// Area under the ROC curve for `scores` of class 1, via average ranks.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> PassResult<f64> {
    if y_true.len() != scores.len() || y_true.is_empty() {
        return Err(PassError::invalid("roc_auc needs equally sized, non-empty inputs"));
    }
    let positives = y_true.iter().filter(|&&label| label == 1).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(PassError::invalid("roc_auc is undefined with a single class"));
    }

    let mut order = (0..scores.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            ranks[idx] = rank;
        }
        start = end + 1;
    }

    let positive_rank_sum = y_true
        .iter()
        .zip(&ranks)
        .filter(|(&label, _)| label == 1)
        .map(|(_, &rank)| rank)
        .sum::<f64>();
    let p = positives as f64;
    Ok((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    const Y_TRUE: [u8; 8] = [0, 0, 0, 1, 1, 1, 1, 1];
    const Y_PRED: [u8; 8] = [0, 0, 1, 1, 1, 1, 0, 1];

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn per_class_metrics_match_hand_counts() {
        let cm = confusion_matrix(&Y_TRUE, &Y_PRED).unwrap();
        assert_eq!(cm.counts, [[2, 1], [1, 4]]);
        assert!(close(accuracy(&cm), 0.75));
        assert!(close(precision(&cm, 0), 2.0 / 3.0));
        assert!(close(recall(&cm, 0), 2.0 / 3.0));
        assert!(close(precision(&cm, 1), 0.8));
        assert!(close(f1(&cm, 1), 0.8));
    }

    #[test]
    fn report_averages_and_flattening() {
        let report = classification_report(&Y_TRUE, &Y_PRED).unwrap();
        assert!(close(report.macro_avg.recall, (2.0 / 3.0 + 0.8) / 2.0));
        assert!(close(report.weighted_avg.recall, 0.75));
        assert_eq!(report.weighted_avg.support, 8);

        let flat = report.flatten("val_");
        assert!(close(flat["val_accuracy"], 0.75));
        assert!(close(flat["val_0_recall"], 2.0 / 3.0));
        assert_eq!(flat["val_1_support"], 5.0);
        assert!(flat.contains_key("val_macro_avg_f1-score"));
        assert!(flat.contains_key("val_weighted_avg_precision"));
        assert_eq!(flat.len(), 17);

        let json = report.to_json();
        assert_eq!(json["0"]["support"], 3);
        assert!(json["macro avg"]["f1-score"].is_number());
    }

    #[test]
    fn zero_division_yields_zero() {
        let cm = confusion_matrix(&[1, 1, 1], &[1, 1, 1]).unwrap();
        assert_eq!(recall(&cm, 0), 0.0);
        assert_eq!(precision(&cm, 0), 0.0);
        assert_eq!(f1(&cm, 0), 0.0);
    }

    #[test]
    fn invalid_pairs_are_rejected() {
        assert!(confusion_matrix(&[], &[]).is_err());
        assert!(confusion_matrix(&[0, 1], &[0]).is_err());
        assert!(confusion_matrix(&[2], &[0]).is_err());
    }

    #[test]
    fn roc_auc_handles_ties() {
        assert!(close(roc_auc(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]).unwrap(), 0.75));
        assert!(close(roc_auc(&[0, 1], &[0.5, 0.5]).unwrap(), 0.5));
        assert!(roc_auc(&[1, 1], &[0.2, 0.3]).is_err());
    }
}
