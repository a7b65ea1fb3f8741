//! Core dataset definitions: cells, frames and dataset fingerprints.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::error::{PassError, PassResult};
use crate::common::ids::SimpleHash;

/// Deterministic fingerprint of a frame's contents.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DatasetId(pub u32);

impl DatasetId {
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ds-{:08x}", self.0)
    }
}

/// A single table value. CSV cells that parse as numbers become `Num`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Num(f64),
    Text(String),
}

impl Cell {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Cell::Num(value),
            _ => Cell::Text(trimmed.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Num(value) => Some(*value),
            Cell::Text(_) => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Num(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{}", *value as i64)
            }
            Cell::Num(value) => write!(f, "{value}"),
            Cell::Text(text) => f.write_str(text),
        }
    }
}

/// In-memory table with ordered columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    /// Build a frame, checking every row against the header width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> PassResult<Self> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(PassError::invalid(format!(
                "row {idx} has {} cells, expected {}",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> PassResult<usize> {
        self.columns
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| PassError::not_found(format!("column '{name}'")))
    }

    /// Iterate over a column's cells.
    pub fn column(&self, name: &str) -> PassResult<impl Iterator<Item = &Cell> + '_> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Append a column holding the same value in every row.
    pub fn with_constant(mut self, name: &str, value: Cell) -> Self {
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(value.clone());
        }
        self
    }

    /// Append a column derived from each row.
    pub fn with_derived<F>(mut self, name: &str, mut derive: F) -> PassResult<Self>
    where
        F: FnMut(&[String], &[Cell]) -> PassResult<Cell>,
    {
        let mut values = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            values.push(derive(&self.columns, row)?);
        }
        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(self)
    }

    /// Remove the named columns. Unknown names are an error.
    pub fn drop_columns(mut self, names: &[&str]) -> PassResult<Self> {
        let mut indices = names
            .iter()
            .map(|name| self.column_index(name))
            .collect::<PassResult<Vec<_>>>()?;
        indices.sort_unstable();
        indices.dedup();
        for idx in indices.into_iter().rev() {
            self.columns.remove(idx);
            for row in &mut self.rows {
                row.remove(idx);
            }
        }
        Ok(self)
    }

    /// Stack frames that share the same header.
    pub fn concat(frames: Vec<Frame>) -> PassResult<Self> {
        let mut iter = frames.into_iter();
        let Some(mut out) = iter.next() else {
            return Ok(Frame::default());
        };
        for frame in iter {
            if frame.columns != out.columns {
                return Err(PassError::invalid("cannot concatenate frames with different columns"));
            }
            out.rows.extend(frame.rows);
        }
        Ok(out)
    }

    /// Keep the rows at `indices`, in that order.
    pub fn take(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&idx| self.rows[idx].clone()).collect(),
        }
    }

    /// Extract a 0/1 label column.
    pub fn labels(&self, name: &str) -> PassResult<Vec<u8>> {
        self.column(name)?
            .enumerate()
            .map(|(idx, cell)| match cell.as_f64() {
                Some(v) if v == 0.0 => Ok(0),
                Some(v) if v == 1.0 => Ok(1),
                _ => Err(PassError::invalid(format!(
                    "row {idx}: label '{cell}' in column '{name}' is not 0 or 1"
                ))),
            })
            .collect()
    }

    /// Fingerprint of header and rows.
    pub fn fingerprint(&self) -> DatasetId {
        let mut hasher = SimpleHash::new();
        for column in &self.columns {
            hasher.field(column);
        }
        hasher.end_record();
        for row in &self.rows {
            for cell in row {
                hasher.field(&cell.to_string());
            }
            hasher.end_record();
        }
        DatasetId(hasher.finish32())
    }
}

/// Summary statistics reported after the extract flow.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BasicStats {
    pub rows: usize,
    pub pass_rate: f64,
    pub fail_rate: f64,
}
