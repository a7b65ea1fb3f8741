//! Domain definitions for prediction requests and responses.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::common::error::{PassError, PassResult};
use crate::data::Cell;

/// Human-readable outcome.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum Label {
    Pass,
    Fail,
}

impl From<u8> for Label {
    fn from(prediction: u8) -> Self {
        if prediction == 1 {
            Label::Pass
        } else {
            Label::Fail
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Label::Pass => "Pass",
            Label::Fail => "Fail",
        })
    }
}

/// Response body of `POST /predict`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Prediction {
    /// 1 for pass, 0 for fail.
    pub prediction: u8,
    /// Pass probability rounded to three decimals.
    pub proba_pass: f64,
    pub label: Label,
}

impl Prediction {
    pub fn new(prediction: u8, proba_pass: f64) -> Self {
        Self {
            prediction,
            proba_pass: (proba_pass * 1000.0).round() / 1000.0,
            label: Label::from(prediction),
        }
    }
}

/// Convert a JSON student record into vectorizer cells.
///
/// Numbers and booleans become numeric features, strings become categories
/// and `null` fields are skipped.
pub fn record_cells(record: &Map<String, Value>) -> PassResult<Vec<(String, Cell)>> {
    let mut cells = Vec::with_capacity(record.len());
    for (key, value) in record {
        let cell = match value {
            Value::Null => continue,
            Value::Bool(flag) => Cell::Num(f64::from(u8::from(*flag))),
            Value::Number(number) => Cell::Num(number.as_f64().ok_or_else(|| {
                PassError::invalid(format!("field '{key}' is not a finite number"))
            })?),
            Value::String(text) => Cell::Text(text.clone()),
            Value::Array(_) | Value::Object(_) => {
                return Err(PassError::invalid(format!(
                    "field '{key}' must be a scalar"
                )))
            }
        };
        cells.push((key.clone(), cell));
    }
    Ok(cells)
}
