//! Run detection across a document and group pages by marker pair.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::engine::PageDetectionEngine;
use super::split::SplitEvent;
use crate::diagnostics::DiagnosticSink;
use crate::models::{Buckets, DetectionStatus, MarkerKey, Orphans, PageDetectionResult};
use crate::pdf::PageSource;

/// Aggregate counts over a run, for reporting only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectionStatistics {
    pub total_pages: usize,
    pub pages_with_any_marker: usize,
    pub pages_with_both_markers: usize,
    pub by_status: BTreeMap<String, usize>,
    pub total_patterns_found: usize,
    pub total_readable_patterns: usize,
}

pub struct DetectionAggregator {
    engine: Arc<PageDetectionEngine>,
    diagnostics: Arc<dyn DiagnosticSink>,
    dpi: u32,
    workers: usize,
}

impl DetectionAggregator {
    pub fn new(
        engine: Arc<PageDetectionEngine>,
        diagnostics: Arc<dyn DiagnosticSink>,
        dpi: u32,
        workers: usize,
    ) -> Self {
        Self {
            engine,
            diagnostics,
            dpi,
            workers: workers.max(1),
        }
    }

    /// Detect markers on every page, at most `workers` pages at a time.
    ///
    /// Every page gets an entry; pages whose task failed are recorded as
    /// corrupted.
    pub async fn extract(
        &self,
        source: Arc<dyn PageSource>,
        events: &mpsc::Sender<SplitEvent>,
    ) -> BTreeMap<usize, PageDetectionResult> {
        let total_pages = source.page_count();
        self.diagnostics
            .info(&format!("Processing {} pages for barcodes...", total_pages));
        let _ = events.send(SplitEvent::DetectionStarted { total_pages }).await;

        let mut results = BTreeMap::new();
        let mut tasks = JoinSet::new();

        for index in 0..total_pages {
            if tasks.len() >= self.workers {
                if let Some(joined) = tasks.join_next().await {
                    self.collect(joined, &mut results);
                }
            }

            let engine = self.engine.clone();
            let source = source.clone();
            let diagnostics = self.diagnostics.clone();
            let event_tx = events.clone();
            let dpi = self.dpi;

            tasks.spawn_blocking(move || {
                let result = detect_page(&engine, source.as_ref(), diagnostics.as_ref(), index, dpi);
                let _ = event_tx.blocking_send(SplitEvent::PageDetected {
                    page: index,
                    status: result.status,
                    delivery: result.delivery_number.clone(),
                    customer: result.customer_name.clone(),
                });
                (index, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            self.collect(joined, &mut results);
        }

        for index in 0..total_pages {
            results.entry(index).or_insert_with(|| {
                self.diagnostics
                    .warning(&format!("Detection task for page {} did not complete", index + 1));
                PageDetectionResult::failed("detection task failed")
            });
        }

        let pages_with_markers = results.values().filter(|r| r.has_any_barcode()).count();
        self.diagnostics.info(&format!(
            "Barcode detection complete. Found barcodes on {}/{} pages.",
            pages_with_markers, total_pages
        ));
        let _ = events
            .send(SplitEvent::DetectionComplete {
                total_pages,
                pages_with_markers,
            })
            .await;

        results
    }

    fn collect(
        &self,
        joined: Result<(usize, PageDetectionResult), tokio::task::JoinError>,
        results: &mut BTreeMap<usize, PageDetectionResult>,
    ) {
        match joined {
            Ok((index, result)) => {
                results.insert(index, result);
            }
            Err(e) => {
                self.diagnostics
                    .warning(&format!("Detection task failed: {}", e));
            }
        }
    }

    /// Split pages into marker-pair buckets and orphans.
    ///
    /// A page with at least one marker field joins the bucket for its key
    /// (missing fields become `UNKNOWN`); every other page is an orphan.
    pub fn group(results: &BTreeMap<usize, PageDetectionResult>) -> (Buckets, Orphans) {
        let mut buckets = Buckets::new();
        let mut orphans = Orphans::new();

        for (&index, result) in results {
            if result.has_any_barcode() {
                buckets
                    .entry(MarkerKey::from_result(result))
                    .or_default()
                    .push(index);
            } else {
                orphans.insert(index, result.clone());
            }
        }

        (buckets, orphans)
    }

    pub fn statistics(results: &BTreeMap<usize, PageDetectionResult>) -> DetectionStatistics {
        let mut by_status: BTreeMap<String, usize> = DetectionStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        for result in results.values() {
            *by_status.entry(result.status.as_str().to_string()).or_default() += 1;
        }

        DetectionStatistics {
            total_pages: results.len(),
            pages_with_any_marker: results.values().filter(|r| r.has_any_barcode()).count(),
            pages_with_both_markers: results
                .values()
                .filter(|r| r.has_complete_barcodes())
                .count(),
            by_status,
            total_patterns_found: results.values().map(|r| r.patterns_found).sum(),
            total_readable_patterns: results.values().map(|r| r.readable_patterns).sum(),
        }
    }
}

/// Render and detect one page, converting failures into a corrupted result.
fn detect_page(
    engine: &PageDetectionEngine,
    source: &dyn PageSource,
    diagnostics: &dyn DiagnosticSink,
    index: usize,
    dpi: u32,
) -> PageDetectionResult {
    match source.render_page(index, dpi) {
        Ok(image) => engine.detect(index, &image),
        Err(e) => {
            diagnostics.warning(&format!("Error processing page {}: {}", index + 1, e));
            PageDetectionResult::failed(format!("render failed: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{RecordingSink, Severity};
    use crate::models::UNKNOWN;
    use crate::pdf::DocumentError;
    use crate::services::engine::tests::{FixedRegions, ScriptedDecoder};
    use image::GrayImage;

    struct BlankPages {
        count: usize,
        broken: Option<usize>,
        panics: Option<usize>,
    }

    impl PageSource for BlankPages {
        fn page_count(&self) -> usize {
            self.count
        }

        fn render_page(&self, index: usize, _dpi: u32) -> Result<GrayImage, DocumentError> {
            if Some(index) == self.panics {
                panic!("renderer crashed on page {}", index);
            }
            if Some(index) == self.broken {
                return Err(DocumentError::RenderFailed {
                    page: index,
                    reason: "bad xref".to_string(),
                });
            }
            Ok(GrayImage::new(4, 4))
        }
    }

    fn results(entries: Vec<PageDetectionResult>) -> BTreeMap<usize, PageDetectionResult> {
        entries.into_iter().enumerate().collect()
    }

    #[tokio::test]
    async fn test_extract_records_every_page() {
        let sink = Arc::new(RecordingSink::new());
        let engine = Arc::new(PageDetectionEngine::new(
            Arc::new(ScriptedDecoder::always(vec!["DO1", "ACME"])),
            Arc::new(FixedRegions(0)),
            sink.clone(),
            2,
        ));
        let aggregator = DetectionAggregator::new(engine, sink.clone(), 300, 2);
        let source = Arc::new(BlankPages {
            count: 5,
            broken: Some(3),
            panics: None,
        });
        let (tx, mut rx) = mpsc::channel(64);

        let results = aggregator.extract(source, &tx).await;
        drop(tx);

        assert_eq!(results.len(), 5);
        assert!(results[&0].has_complete_barcodes());
        assert_eq!(results[&3].status, DetectionStatus::PatternsCorrupted);
        assert!(results[&3]
            .error_detail
            .as_deref()
            .unwrap()
            .contains("bad xref"));
        assert!(sink.contains(Severity::Warning, "Error processing page 4"));

        let mut detected = 0;
        while let Some(event) = rx.recv().await {
            if matches!(event, SplitEvent::PageDetected { .. }) {
                detected += 1;
            }
        }
        assert_eq!(detected, 5);
    }

    #[tokio::test]
    async fn test_panicked_task_is_reported_through_sink() {
        let sink = Arc::new(RecordingSink::new());
        let engine = Arc::new(PageDetectionEngine::new(
            Arc::new(ScriptedDecoder::always(vec!["DO1", "ACME"])),
            Arc::new(FixedRegions(0)),
            sink.clone(),
            0,
        ));
        let aggregator = DetectionAggregator::new(engine, sink.clone(), 300, 1);
        let source = Arc::new(BlankPages {
            count: 3,
            broken: None,
            panics: Some(1),
        });
        let (tx, rx) = mpsc::channel(16);
        drop(rx);

        let results = aggregator.extract(source, &tx).await;

        assert_eq!(results.len(), 3);
        assert!(results[&0].has_complete_barcodes());
        assert_eq!(results[&1].status, DetectionStatus::PatternsCorrupted);
        assert!(results[&2].has_complete_barcodes());
        assert!(sink.contains(Severity::Warning, "Detection task failed"));
        assert!(sink.contains(Severity::Warning, "Detection task for page 2 did not complete"));
    }

    #[test]
    fn test_group_partitions_pages() {
        let partial = PageDetectionResult {
            customer_name: Some("ACME".to_string()),
            ..PageDetectionResult::empty()
        };
        let results = results(vec![
            PageDetectionResult::success("DO1", "ACME"),
            PageDetectionResult::empty(),
            partial,
            PageDetectionResult::success("DO1", "ACME"),
            PageDetectionResult::empty().with_status(DetectionStatus::PatternsUnreadable),
        ]);

        let (buckets, orphans) = DetectionAggregator::group(&results);

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[&MarkerKey::new("DO1", "ACME")], vec![0, 3]);
        assert_eq!(buckets[&MarkerKey::new(UNKNOWN, "ACME")], vec![2]);
        assert_eq!(orphans.keys().copied().collect::<Vec<_>>(), vec![1, 4]);
        assert_eq!(orphans[&4].status, DetectionStatus::PatternsUnreadable);

        // every page lands in exactly one place
        for page in 0..5 {
            let in_bucket = buckets.values().filter(|p| p.contains(&page)).count();
            let in_orphans = usize::from(orphans.contains_key(&page));
            assert_eq!(in_bucket + in_orphans, 1, "page {}", page);
        }
    }

    #[test]
    fn test_statistics() {
        let mut corrupted = PageDetectionResult::failed("x");
        corrupted.patterns_found = 3;
        corrupted.readable_patterns = 1;
        let results = results(vec![
            PageDetectionResult::success("DO1", "ACME"),
            PageDetectionResult::empty(),
            corrupted,
        ]);

        let stats = DetectionAggregator::statistics(&results);
        assert_eq!(stats.total_pages, 3);
        assert_eq!(stats.pages_with_any_marker, 1);
        assert_eq!(stats.pages_with_both_markers, 1);
        assert_eq!(stats.by_status["success"], 1);
        assert_eq!(stats.by_status["no_patterns_found"], 1);
        assert_eq!(stats.by_status["patterns_corrupted"], 1);
        assert_eq!(stats.by_status["retry_exhausted"], 0);
        assert_eq!(stats.total_patterns_found, 5);
        assert_eq!(stats.total_readable_patterns, 3);
        assert!(stats.total_readable_patterns <= stats.total_patterns_found);
    }
}
