//! Detection, grouping, assignment and output services.

pub mod aggregate;
pub mod assignment;
pub mod audit;
pub mod engine;
pub mod planner;
pub mod split;

pub use aggregate::{DetectionAggregator, DetectionStatistics};
pub use assignment::{unassigned_pages, PageAssigner};
pub use audit::{AuditError, AuditLog};
pub use engine::PageDetectionEngine;
pub use planner::{plan, safe_filename, AuditRecord, PlannedOutput};
pub use split::{
    validate_input, FailedOutput, OutputSummary, SplitError, SplitEvent, SplitReport,
    SplitService,
};
