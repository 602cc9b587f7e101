//! Output file names and audit records for final buckets.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::models::{Buckets, MarkerKey, UNKNOWN};

/// File name for the bucket of pages without markers.
pub const NO_BARCODE_FILENAME: &str = "no_barcode.pdf";
/// File name when neither marker is known.
pub const UNKNOWN_FILENAME: &str = "unknown_barcode.pdf";
/// Timestamp format of the audit log's DateTime column.
pub const AUDIT_TIMESTAMP_FORMAT: &str = "%Y%m%d %H%M%S";

/// One row of the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub sequence_no: usize,
    pub timestamp: String,
    /// Empty when the customer name is unknown.
    pub customer: String,
    /// Empty when the delivery number is unknown.
    pub delivery: String,
    pub output_path: String,
}

/// A document to write: which pages, where, and its audit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedOutput {
    pub key: MarkerKey,
    /// Zero-based, ascending.
    pub pages: Vec<usize>,
    pub filename: String,
    pub path: PathBuf,
    pub record: AuditRecord,
}

fn sanitize_component(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect()
}

/// Derive a file name from a marker pair.
pub fn safe_filename(delivery: &str, customer: &str) -> String {
    let has_delivery = delivery != UNKNOWN;
    let has_customer = customer != UNKNOWN;
    let delivery = sanitize_component(delivery);
    let customer = sanitize_component(customer);

    match (has_delivery, has_customer) {
        (true, true) => format!("{}_{}.pdf", customer, delivery),
        (true, false) => format!("{}.pdf", delivery),
        (false, true) => format!("{}.pdf", customer),
        (false, false) => UNKNOWN_FILENAME.to_string(),
    }
}

fn filename_for(key: &MarkerKey) -> String {
    if key.is_no_barcode() {
        NO_BARCODE_FILENAME.to_string()
    } else {
        safe_filename(&key.delivery, &key.customer)
    }
}

/// Add `-N` before the extension.
fn with_suffix(filename: &str, n: usize) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{}-{}.{}", stem, n, ext),
        None => format!("{}-{}", filename, n),
    }
}

fn field(value: &str) -> String {
    if value == UNKNOWN {
        String::new()
    } else {
        value.to_string()
    }
}

/// Plan one output per non-empty bucket, ordered by each bucket's first page.
///
/// Sequence numbers are 1-based in plan order. Names that collide
/// (case-insensitively) get `-2`, `-3`, ... suffixes.
pub fn plan(buckets: &Buckets, output_dir: &Path, run_time: &DateTime<Local>) -> Vec<PlannedOutput> {
    let timestamp = run_time.format(AUDIT_TIMESTAMP_FORMAT).to_string();

    let mut ordered: Vec<(&MarkerKey, Vec<usize>)> = buckets
        .iter()
        .filter(|(_, pages)| !pages.is_empty())
        .map(|(key, pages)| {
            let mut pages = pages.clone();
            pages.sort_unstable();
            pages.dedup();
            (key, pages)
        })
        .collect();
    ordered.sort_by(|a, b| a.1[0].cmp(&b.1[0]).then_with(|| a.0.cmp(b.0)));

    let mut seen: HashMap<String, usize> = HashMap::new();
    ordered
        .into_iter()
        .enumerate()
        .map(|(i, (key, pages))| {
            let base = filename_for(key);
            let count = seen.entry(base.to_lowercase()).or_insert(0);
            *count += 1;
            let filename = if *count == 1 {
                base
            } else {
                with_suffix(&base, *count)
            };
            let path = output_dir.join(&filename);
            let (customer, delivery) = if key.is_no_barcode() {
                (String::new(), String::new())
            } else {
                (field(&key.customer), field(&key.delivery))
            };

            PlannedOutput {
                key: key.clone(),
                pages,
                record: AuditRecord {
                    sequence_no: i + 1,
                    timestamp: timestamp.clone(),
                    customer,
                    delivery,
                    output_path: path.display().to_string(),
                },
                filename,
                path,
            }
        })
        .collect()
}
