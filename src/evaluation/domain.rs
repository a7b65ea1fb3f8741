//! Domain primitives for evaluation: threshold outcomes, confusion matrices and reports.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};

/// Threshold used when the sweep finds no feasible operating point.
pub const FALLBACK_THRESHOLD: f64 = 0.5;

/// An operating point on the fail probability and the metrics it achieves.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct ThresholdChoice {
    pub threshold: f64,
    pub recall_negative: f64,
    pub accuracy: f64,
}

impl ThresholdChoice {
    /// The `(0.5, 0.0, 0.0)` triple historically reported for an unmet floor.
    pub const FALLBACK: ThresholdChoice = ThresholdChoice {
        threshold: FALLBACK_THRESHOLD,
        recall_negative: 0.0,
        accuracy: 0.0,
    };
}

/// Result of a threshold sweep.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ThresholdOutcome {
    /// A threshold met the accuracy floor.
    Selected(ThresholdChoice),
    /// No candidate threshold met the accuracy floor.
    Unsatisfiable,
}

impl ThresholdOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Selected(_))
    }

    pub fn selected(&self) -> Option<ThresholdChoice> {
        match self {
            Self::Selected(choice) => Some(*choice),
            Self::Unsatisfiable => None,
        }
    }

    /// The selected triple, or [`ThresholdChoice::FALLBACK`] when unsatisfiable.
    pub fn or_fallback(&self) -> ThresholdChoice {
        self.selected().unwrap_or(ThresholdChoice::FALLBACK)
    }
}

/// Binary confusion matrix indexed as `counts[actual][predicted]`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub counts: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    pub fn get(&self, actual: u8, predicted: u8) -> usize {
        self.counts[actual as usize][predicted as usize]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        self.counts[0][0] + self.counts[1][1]
    }

    /// Number of samples whose actual class is `class`.
    pub fn support(&self, class: u8) -> usize {
        self.counts[class as usize].iter().sum()
    }

    /// Number of samples predicted as `class`.
    pub fn predicted(&self, class: u8) -> usize {
        self.counts[0][class as usize] + self.counts[1][class as usize]
    }
}

/// Precision, recall, f1 and support for one class or one average.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn entries(&self) -> [(&'static str, f64); 4] {
        [
            ("precision", self.precision),
            ("recall", self.recall),
            ("f1-score", self.f1_score),
            ("support", self.support as f64),
        ]
    }
}

/// Per-class and averaged metrics of a binary classifier.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassificationReport {
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    fn sections(&self) -> [(&'static str, &ClassMetrics); 4] {
        [
            ("0", &self.classes[0]),
            ("1", &self.classes[1]),
            ("macro avg", &self.macro_avg),
            ("weighted avg", &self.weighted_avg),
        ]
    }

    /// Nested JSON with `0`, `1`, `accuracy`, `macro avg` and `weighted avg` sections.
    pub fn to_json(&self) -> Value {
        let mut out = serde_json::Map::new();
        for (name, metrics) in &self.sections()[..2] {
            out.insert((*name).to_string(), json!(metrics));
        }
        out.insert("accuracy".to_string(), json!(self.accuracy));
        for (name, metrics) in &self.sections()[2..] {
            out.insert((*name).to_string(), json!(metrics));
        }
        Value::Object(out)
    }

    /// Flatten into `{prefix}{section}_{metric}` keys; spaces in section names become `_`.
    pub fn flatten(&self, prefix: &str) -> BTreeMap<String, f64> {
        let mut flat = BTreeMap::new();
        for (section, metrics) in self.sections() {
            let section = section.replace(' ', "_");
            for (name, value) in metrics.entries() {
                flat.insert(format!("{prefix}{section}_{name}"), value);
            }
        }
        flat.insert(format!("{prefix}accuracy"), self.accuracy);
        flat
    }
}
