//! Folding orphan pages into marker buckets.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::diagnostics::DiagnosticSink;
use crate::models::{AssignmentPolicy, Buckets, DetectionStatus, MarkerKey, Orphans};

pub struct PageAssigner {
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl PageAssigner {
    pub fn new(diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self { diagnostics }
    }

    /// Apply `policy` and return the final buckets.
    ///
    /// Pages already in a bucket never move; orphans are only ever added.
    pub fn assign(
        &self,
        buckets: Buckets,
        orphans: &Orphans,
        total_pages: usize,
        policy: AssignmentPolicy,
    ) -> Buckets {
        if orphans.is_empty() {
            return buckets;
        }

        match policy {
            AssignmentPolicy::Ignore => {
                self.diagnostics.info(&format!(
                    "Ignoring {} page(s) without markers",
                    orphans.len()
                ));
                buckets
            }
            AssignmentPolicy::Separate => self.separate(buckets, orphans),
            AssignmentPolicy::KeepWithPrevious => {
                self.fold_forward(buckets, orphans, total_pages, false)
            }
            AssignmentPolicy::Sequential => self.fold_forward(buckets, orphans, total_pages, true),
        }
    }

    fn separate(&self, mut buckets: Buckets, orphans: &Orphans) -> Buckets {
        let pages = buckets.entry(MarkerKey::no_barcode()).or_default();
        pages.extend(orphans.keys().copied());
        pages.sort_unstable();
        pages.dedup();
        self.diagnostics.info(&format!(
            "Collected {} page(s) without markers into a separate document",
            orphans.len()
        ));
        buckets
    }

    /// Attach each orphan to the bucket of the nearest preceding marked page.
    ///
    /// `describe_status` adds the orphan's detection status to every log line.
    fn fold_forward(
        &self,
        mut buckets: Buckets,
        orphans: &Orphans,
        total_pages: usize,
        describe_status: bool,
    ) -> Buckets {
        let owner: HashMap<usize, MarkerKey> = buckets
            .iter()
            .flat_map(|(key, pages)| pages.iter().map(move |&p| (p, key.clone())))
            .collect();

        let mut additions: BTreeMap<MarkerKey, Vec<usize>> = BTreeMap::new();
        let mut current: Option<&MarkerKey> = None;

        for page in 0..total_pages {
            if let Some(key) = owner.get(&page) {
                current = Some(key);
                continue;
            }
            let Some(result) = orphans.get(&page) else {
                continue;
            };

            let reason = if describe_status {
                format!(" ({})", status_reason(result.status))
            } else {
                String::new()
            };

            match current {
                Some(key) => {
                    additions.entry(key.clone()).or_default().push(page);
                    if describe_status {
                        self.diagnostics.info(&format!(
                            "Page {}{} assigned to {}",
                            page + 1,
                            reason,
                            key
                        ));
                    }
                }
                None => {
                    self.diagnostics.warning(&format!(
                        "Page {}{} precedes every marked page and cannot be assigned",
                        page + 1,
                        reason
                    ));
                }
            }
        }

        for (key, added) in additions {
            self.diagnostics.info(&format!(
                "Reassigned {} pages to {}",
                added.len(),
                key
            ));
            let pages = buckets.entry(key).or_default();
            pages.extend(added);
            pages.sort_unstable();
        }

        buckets
    }

    /// Drop buckets whose key contains the UNKNOWN sentinel, returning the
    /// pages that were removed. The separate no-marker bucket is kept.
    pub fn drop_incomplete(&self, buckets: Buckets) -> (Buckets, Vec<usize>) {
        let mut kept = Buckets::new();
        let mut dropped = Vec::new();

        for (key, pages) in buckets {
            if key.is_complete() || key.is_no_barcode() {
                kept.insert(key, pages);
                continue;
            }
            for &page in &pages {
                self.diagnostics.error(&format!(
                    "Page {} has incomplete barcode data ({}) and will not be written",
                    page + 1,
                    key
                ));
            }
            dropped.extend(pages);
        }

        dropped.sort_unstable();
        (kept, dropped)
    }
}

fn status_reason(status: DetectionStatus) -> &'static str {
    match status {
        DetectionStatus::NoPatternsFound => "empty page",
        DetectionStatus::PatternsUnreadable => "unreadable markers",
        DetectionStatus::PatternsCorrupted => "corrupted markers",
        DetectionStatus::RetryExhausted => "markers unread after retries",
        DetectionStatus::MultipleConflicts => "conflicting markers",
        DetectionStatus::Success => "no usable markers",
    }
}

/// Pages that appear in no bucket.
pub fn unassigned_pages(buckets: &Buckets, total_pages: usize) -> Vec<usize> {
    let mut assigned = vec![false; total_pages];
    for &page in buckets.values().flatten() {
        if let Some(slot) = assigned.get_mut(page) {
            *slot = true;
        }
    }
    (0..total_pages).filter(|&p| !assigned[p]).collect()
}
