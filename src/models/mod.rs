//! Data models for barsplit.

mod bucket;
mod detection;

pub use bucket::{AssignmentPolicy, Buckets, MarkerKey, Orphans, NO_BARCODE, UNKNOWN};
pub use detection::{describe_missing, DetectionStatus, MarkerField, PageDetectionResult};
