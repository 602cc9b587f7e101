//! CSV audit log of written documents.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;

use super::planner::AuditRecord;

pub const AUDIT_HEADER: [&str; 5] = [
    "SequenceNo",
    "DateTime",
    "Barcode1",
    "Barcode2",
    "OutputPath",
];

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Append-only audit log. Barcode1 holds the customer, Barcode2 the delivery.
pub struct AuditLog {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: usize,
}

impl AuditLog {
    /// File name for a run started at `run_time`.
    pub fn filename(run_time: &DateTime<Local>) -> String {
        format!("extraction_log_{}.csv", run_time.format("%Y%m%d_%H%M%S"))
    }

    /// Create the log in `output_dir` and write the header row.
    pub fn create(output_dir: &Path, run_time: &DateTime<Local>) -> Result<Self, AuditError> {
        let path = output_dir.join(Self::filename(run_time));
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(AUDIT_HEADER)?;
        writer.flush()?;
        Ok(Self {
            path,
            writer,
            rows: 0,
        })
    }

    pub fn append(&mut self, record: &AuditRecord) -> Result<(), AuditError> {
        self.writer.write_record([
            record.sequence_no.to_string().as_str(),
            record.timestamp.as_str(),
            record.customer.as_str(),
            record.delivery.as_str(),
            record.output_path.as_str(),
        ])?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(mut self) -> Result<PathBuf, AuditError> {
        self.writer.flush()?;
        Ok(self.path)
    }
}
