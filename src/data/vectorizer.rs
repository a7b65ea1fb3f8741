//! Dictionary vectorizer: numeric cells pass through, text cells are one-hot encoded.

use std::collections::{BTreeMap, BTreeSet};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::common::error::{PassError, PassResult};

use super::domain::{Cell, Frame};

/// Learned feature layout. Feature names are kept sorted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vectorizer {
    feature_names: Vec<String>,
    #[serde(skip)]
    index: BTreeMap<String, usize>,
}

fn feature_key(column: &str, cell: &Cell) -> String {
    match cell {
        Cell::Num(_) => column.to_string(),
        Cell::Text(value) => format!("{column}={value}"),
    }
}

fn feature_value(cell: &Cell) -> f64 {
    match cell {
        Cell::Num(value) => *value,
        Cell::Text(_) => 1.0,
    }
}

impl Vectorizer {
    /// Learn the feature names of `frame`, ignoring `exclude` columns.
    pub fn fit(frame: &Frame, exclude: &[&str]) -> Self {
        let keep = Self::kept_columns(frame.columns(), exclude);
        let mut names = BTreeSet::new();
        for row in frame.rows() {
            for &idx in &keep {
                names.insert(feature_key(&frame.columns()[idx], &row[idx]));
            }
        }
        Self::from_names(names.into_iter().collect())
    }

    fn from_names(feature_names: Vec<String>) -> Self {
        let index = feature_names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        Self {
            feature_names,
            index,
        }
    }

    fn kept_columns(columns: &[String], exclude: &[&str]) -> Vec<usize> {
        columns
            .iter()
            .enumerate()
            .filter(|(_, name)| !exclude.contains(&name.as_str()))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Rebuild the lookup table after deserialisation.
    pub fn reindexed(self) -> Self {
        Self::from_names(self.feature_names)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Dense design matrix for `frame`. Unknown features are dropped.
    pub fn transform(&self, frame: &Frame, exclude: &[&str]) -> Array2<f64> {
        let keep = Self::kept_columns(frame.columns(), exclude);
        let mut matrix = Array2::zeros((frame.len(), self.n_features()));
        for (row_idx, row) in frame.rows().iter().enumerate() {
            for &col in &keep {
                let cell = &row[col];
                if let Some(&feature) = self.index.get(&feature_key(&frame.columns()[col], cell)) {
                    matrix[[row_idx, feature]] = feature_value(cell);
                }
            }
        }
        matrix
    }

    /// Encode a single record given as `(column, cell)` pairs.
    pub fn transform_record<'a, I>(&self, record: I) -> PassResult<Array2<f64>>
    where
        I: IntoIterator<Item = (&'a str, &'a Cell)>,
    {
        if self.index.len() != self.feature_names.len() {
            return Err(PassError::internal("vectorizer used before reindexing"));
        }
        let mut matrix = Array2::zeros((1, self.n_features()));
        for (column, cell) in record {
            if let Some(&feature) = self.index.get(&feature_key(column, cell)) {
                matrix[[0, feature]] = feature_value(cell);
            }
        }
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::new(
            vec!["sex".into(), "age".into(), "pass".into()],
            vec![
                vec![Cell::Text("F".into()), Cell::Num(17.0), Cell::Num(1.0)],
                vec![Cell::Text("M".into()), Cell::Num(19.0), Cell::Num(0.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn fit_sorts_and_one_hot_encodes() {
        let vec = Vectorizer::fit(&frame(), &["pass"]);
        assert_eq!(vec.feature_names(), ["age", "sex=F", "sex=M"]);
        let x = vec.transform(&frame(), &["pass"]);
        assert_eq!(x.row(0).to_vec(), vec![17.0, 1.0, 0.0]);
        assert_eq!(x.row(1).to_vec(), vec![19.0, 0.0, 1.0]);
    }

    #[test]
    fn unseen_categories_are_ignored() {
        let vec = Vectorizer::fit(&frame(), &["pass"]);
        let age = Cell::Num(16.0);
        let sex = Cell::Text("X".into());
        let x = vec
            .transform_record([("age", &age), ("sex", &sex), ("extra", &age)])
            .unwrap();
        assert_eq!(x.row(0).to_vec(), vec![16.0, 0.0, 0.0]);
    }

    #[test]
    fn deserialised_vectorizer_needs_reindex() {
        let json = serde_json::to_string(&Vectorizer::fit(&frame(), &["pass"])).unwrap();
        let raw: Vectorizer = serde_json::from_str(&json).unwrap();
        let age = Cell::Num(16.0);
        assert!(raw.transform_record([("age", &age)]).is_err());
        let ready = raw.reindexed();
        assert_eq!(ready.transform_record([("age", &age)]).unwrap()[[0, 0]], 16.0);
    }
}
