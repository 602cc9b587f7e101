//! Split service types and events.

use std::path::PathBuf;

use serde::Serialize;

use crate::models::{AssignmentPolicy, DetectionStatus};
use crate::services::aggregate::DetectionStatistics;

/// Events emitted during a split run.
#[derive(Debug, Clone)]
pub enum SplitEvent {
    /// Page detection started
    DetectionStarted { total_pages: usize },
    /// One page finished detection
    PageDetected {
        page: usize,
        status: DetectionStatus,
        delivery: Option<String>,
        customer: Option<String>,
    },
    /// All pages detected
    DetectionComplete {
        total_pages: usize,
        pages_with_markers: usize,
    },
    /// Output writing started
    WritingStarted { total_outputs: usize },
    /// Output document written
    OutputWritten { path: PathBuf, pages: usize },
    /// Output document could not be written
    OutputFailed { filename: String, error: String },
    /// Run complete
    SplitComplete { written: usize, failed: usize },
}

/// A document that was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSummary {
    pub sequence_no: usize,
    pub delivery: String,
    pub customer: String,
    pub filename: String,
    pub path: PathBuf,
    /// Zero-based page indices, ascending.
    pub pages: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedOutput {
    pub filename: String,
    pub error: String,
}

/// Result of a split run.
#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub policy: AssignmentPolicy,
    pub statistics: DetectionStatistics,
    pub outputs: Vec<OutputSummary>,
    pub failed_outputs: Vec<FailedOutput>,
    /// Zero-based pages that ended up in no output.
    pub unassigned_pages: Vec<usize>,
    /// Zero-based pages dropped for incomplete marker keys.
    pub dropped_incomplete_pages: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_log: Option<PathBuf>,
}

impl SplitReport {
    pub fn total_pages(&self) -> usize {
        self.statistics.total_pages
    }

    pub fn is_success(&self) -> bool {
        self.failed_outputs.is_empty()
    }
}
