//! Per-page barcode detection results.
//!
//! A `PageDetectionResult` is produced once per retry attempt by the detection
//! engine; the best attempt is kept and handed to the aggregator, after which
//! it is never mutated.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of barcode detection on a page.
///
/// Ordered by [`DetectionStatus::priority`], not declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStatus {
    Success,
    NoPatternsFound,
    PatternsUnreadable,
    PatternsCorrupted,
    MultipleConflicts,
    RetryExhausted,
}

impl DetectionStatus {
    pub const ALL: [DetectionStatus; 6] = [
        Self::Success,
        Self::NoPatternsFound,
        Self::PatternsUnreadable,
        Self::PatternsCorrupted,
        Self::MultipleConflicts,
        Self::RetryExhausted,
    ];

    /// Tie-break priority when comparing attempts; higher wins.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Success => 5,
            Self::PatternsCorrupted => 4,
            Self::PatternsUnreadable => 3,
            Self::MultipleConflicts => 2,
            Self::NoPatternsFound => 1,
            Self::RetryExhausted => 0,
        }
    }

    /// Whether enhancement and another decode attempt can plausibly help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PatternsUnreadable | Self::PatternsCorrupted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NoPatternsFound => "no_patterns_found",
            Self::PatternsUnreadable => "patterns_unreadable",
            Self::PatternsCorrupted => "patterns_corrupted",
            Self::MultipleConflicts => "multiple_conflicts",
            Self::RetryExhausted => "retry_exhausted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "no_patterns_found" => Some(Self::NoPatternsFound),
            "patterns_unreadable" => Some(Self::PatternsUnreadable),
            "patterns_corrupted" => Some(Self::PatternsCorrupted),
            "multiple_conflicts" => Some(Self::MultipleConflicts),
            "retry_exhausted" => Some(Self::RetryExhausted),
            _ => None,
        }
    }
}

impl fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl PartialOrd for DetectionStatus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DetectionStatus {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority().cmp(&other.priority())
    }
}

/// Which marker field a page is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerField {
    DeliveryNumber,
    CustomerName,
}

impl fmt::Display for MarkerField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeliveryNumber => write!(f, "delivery number"),
            Self::CustomerName => write!(f, "customer name"),
        }
    }
}

/// Detection result for a single page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDetectionResult {
    pub delivery_number: Option<String>,
    pub customer_name: Option<String>,
    pub status: DetectionStatus,
    /// Marker-like regions located, readable or not.
    pub patterns_found: usize,
    /// Subset of `patterns_found` that decoded to text (blank text included).
    pub readable_patterns: usize,
    pub retry_count: usize,
    pub error_detail: Option<String>,
}

impl Default for PageDetectionResult {
    fn default() -> Self {
        Self::empty()
    }
}

impl PageDetectionResult {
    /// A page with nothing marker-like on it.
    pub fn empty() -> Self {
        Self {
            delivery_number: None,
            customer_name: None,
            status: DetectionStatus::NoPatternsFound,
            patterns_found: 0,
            readable_patterns: 0,
            retry_count: 0,
            error_detail: None,
        }
    }

    /// A page whose processing failed before any decode result existed.
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            status: DetectionStatus::PatternsCorrupted,
            error_detail: Some(detail.into()),
            ..Self::empty()
        }
    }

    /// Convenience constructor for a fully successful read.
    pub fn success(delivery: impl Into<String>, customer: impl Into<String>) -> Self {
        Self {
            delivery_number: Some(delivery.into()),
            customer_name: Some(customer.into()),
            status: DetectionStatus::Success,
            patterns_found: 2,
            readable_patterns: 2,
            retry_count: 0,
            error_detail: None,
        }
    }

    pub fn with_status(mut self, status: DetectionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn has_any_barcode(&self) -> bool {
        self.delivery_number.is_some() || self.customer_name.is_some()
    }

    pub fn has_complete_barcodes(&self) -> bool {
        self.delivery_number.is_some()
            && self.customer_name.is_some()
            && self.status == DetectionStatus::Success
    }

    pub fn needs_retry(&self) -> bool {
        self.status.is_retryable()
    }

    /// Number of populated marker fields (0..=2).
    pub fn field_count(&self) -> usize {
        usize::from(self.delivery_number.is_some()) + usize::from(self.customer_name.is_some())
    }

    pub fn missing_fields(&self) -> Vec<MarkerField> {
        let mut missing = Vec::new();
        if self.delivery_number.is_none() {
            missing.push(MarkerField::DeliveryNumber);
        }
        if self.customer_name.is_none() {
            missing.push(MarkerField::CustomerName);
        }
        missing
    }

    /// Total order used to keep the best attempt: completeness, then number of
    /// populated fields, then status priority.
    pub fn cmp_quality(&self, other: &Self) -> Ordering {
        self.has_complete_barcodes()
            .cmp(&other.has_complete_barcodes())
            .then_with(|| self.field_count().cmp(&other.field_count()))
            .then_with(|| self.status.cmp(&other.status))
    }

    /// Strictly better than `other`; ties keep the earlier attempt.
    pub fn is_better_than(&self, other: &Self) -> bool {
        self.cmp_quality(other) == Ordering::Greater
    }
}

/// Render a list of missing fields as "delivery number and customer name".
pub fn describe_missing(fields: &[MarkerField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" and ")
}
