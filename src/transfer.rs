//! CSV import/export of solve histories.
//!
//! Columns are `time_ms,penalty,scramble,recorded_at`. `time_ms` is always
//! the raw time; the penalty travels in its own column as `none`, `+2` or `dnf`.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

use crate::solve::{Penalty, Solve};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("row {row}: invalid timestamp '{value}'")]
    BadTimestamp { row: usize, value: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct CsvSolve {
    time_ms: u64,
    penalty: Penalty,
    #[serde(default)]
    scramble: Option<String>,
    #[serde(default)]
    recorded_at: Option<String>,
}

pub fn write_csv<W: Write>(writer: W, solves: &[Solve]) -> Result<usize, TransferError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for solve in solves {
        wtr.serialize(CsvSolve {
            time_ms: solve.time_ms,
            penalty: solve.penalty,
            scramble: solve.scramble.clone(),
            recorded_at: Some(solve.recorded_at.to_rfc3339()),
        })?;
    }
    wtr.flush()?;
    Ok(solves.len())
}

/// Rows without a timestamp are stamped with the import time
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Solve>, TransferError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let imported_at = Local::now();

    let mut solves = Vec::new();
    for (idx, record) in rdr.deserialize::<CsvSolve>().enumerate() {
        let record = record?;
        let recorded_at = match record.recorded_at.filter(|v| !v.is_empty()) {
            Some(value) => DateTime::parse_from_rfc3339(&value)
                .map_err(|_| TransferError::BadTimestamp {
                    row: idx + 1,
                    value: value.clone(),
                })?
                .with_timezone(&Local),
            None => imported_at,
        };
        solves.push(Solve {
            time_ms: record.time_ms,
            penalty: record.penalty,
            scramble: record.scramble.filter(|s| !s.is_empty()),
            recorded_at,
        });
    }
    Ok(solves)
}

pub fn export_file<P: AsRef<Path>>(path: P, solves: &[Solve]) -> Result<usize, TransferError> {
    write_csv(File::create(path)?, solves)
}

pub fn import_file<P: AsRef<Path>>(path: P) -> Result<Vec<Solve>, TransferError> {
    read_csv(File::open(path)?)
}
