//! CSV persistence for frames.

use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};

use crate::common::error::{PassError, PassResult};

use super::domain::{Cell, Frame};

/// Read a delimited file with a header row.
pub fn read_csv(path: &Path, delimiter: u8) -> PassResult<Frame> {
    if !path.exists() {
        return Err(PassError::not_found(format!("dataset {}", path.display())));
    }
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let columns = reader
        .headers()?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Cell::parse).collect());
    }
    tracing::debug!(path = %path.display(), rows = rows.len(), "read csv");
    Frame::new(columns, rows)
}

/// Write a frame as comma separated values, creating parent directories.
pub fn write_csv(path: &Path, frame: &Frame) -> PassResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| PassError::io(parent, source))?;
    }
    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(frame.columns())?;
    for row in frame.rows() {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    writer.flush().map_err(|source| PassError::io(path, source))?;
    tracing::debug!(path = %path.display(), rows = frame.len(), "wrote csv");
    Ok(())
}
