//! Marker-pair buckets and the policies that fold orphan pages into them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::PageDetectionResult;

/// Placeholder for a marker field that could not be determined.
pub const UNKNOWN: &str = "UNKNOWN";

/// Reserved key component for the bucket of pages without any marker.
pub const NO_BARCODE: &str = "NO_BARCODE";

/// Composite bucket key: (delivery number, customer name).
///
/// Ordering is by delivery first, then customer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarkerKey {
    pub delivery: String,
    pub customer: String,
}

impl MarkerKey {
    pub fn new(delivery: impl Into<String>, customer: impl Into<String>) -> Self {
        Self {
            delivery: delivery.into(),
            customer: customer.into(),
        }
    }

    /// Key for a detection result, substituting [`UNKNOWN`] for missing fields.
    pub fn from_result(result: &PageDetectionResult) -> Self {
        Self::new(
            result.delivery_number.as_deref().unwrap_or(UNKNOWN),
            result.customer_name.as_deref().unwrap_or(UNKNOWN),
        )
    }

    /// The synthetic key used by [`AssignmentPolicy::Separate`].
    pub fn no_barcode() -> Self {
        Self::new(NO_BARCODE, NO_BARCODE)
    }

    pub fn is_no_barcode(&self) -> bool {
        self.delivery == NO_BARCODE && self.customer == NO_BARCODE
    }

    pub fn has_delivery(&self) -> bool {
        self.delivery != UNKNOWN
    }

    pub fn has_customer(&self) -> bool {
        self.customer != UNKNOWN
    }

    /// Both components are real values.
    pub fn is_complete(&self) -> bool {
        self.has_delivery() && self.has_customer() && !self.is_no_barcode()
    }
}

impl fmt::Display for MarkerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Delivery: {}, Customer: {}", self.delivery, self.customer)
    }
}

/// Bucket key to page indices. Page lists are kept ascending.
pub type Buckets = BTreeMap<MarkerKey, Vec<usize>>;

/// Pages without any usable marker, keyed by page index.
pub type Orphans = BTreeMap<usize, PageDetectionResult>;

/// How orphan pages are folded into marker buckets.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentPolicy {
    /// Leave orphans out of every output.
    #[default]
    Ignore,
    /// Collect all orphans into one NO_BARCODE document.
    Separate,
    /// Attach each orphan to the bucket of the closest preceding marked page.
    #[value(alias = "keep_with_previous")]
    KeepWithPrevious,
    /// Like keep-with-previous, applied uniformly to empty and unreadable pages.
    Sequential,
}

impl AssignmentPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Separate => "separate",
            Self::KeepWithPrevious => "keep_with_previous",
            Self::Sequential => "sequential",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.replace('-', "_").as_str() {
            "ignore" => Some(Self::Ignore),
            "separate" => Some(Self::Separate),
            "keep_with_previous" => Some(Self::KeepWithPrevious),
            "sequential" => Some(Self::Sequential),
            _ => None,
        }
    }
}

impl fmt::Display for AssignmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
