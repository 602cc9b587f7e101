//! Per-page marker detection with retry-and-enhance.

use std::sync::Arc;

use image::GrayImage;

use crate::barcode::{
    classify, is_blank, stage_for_attempt, DecodeError, MarkerClass, MarkerDecoder,
    RegionDetector,
};
use crate::diagnostics::DiagnosticSink;
use crate::models::{describe_missing, DetectionStatus, PageDetectionResult};

/// Outcome of one decode attempt, plus candidates that lost to the first read.
#[derive(Debug)]
struct Attempt {
    result: PageDetectionResult,
    unused_deliveries: Vec<String>,
    unused_customers: Vec<String>,
    /// The decoder cannot run at all; further attempts are pointless.
    backend_missing: bool,
}

impl Attempt {
    fn new(result: PageDetectionResult) -> Self {
        Self {
            result,
            unused_deliveries: Vec::new(),
            unused_customers: Vec::new(),
            backend_missing: false,
        }
    }
}

pub struct PageDetectionEngine {
    decoder: Arc<dyn MarkerDecoder>,
    regions: Arc<dyn RegionDetector>,
    diagnostics: Arc<dyn DiagnosticSink>,
    max_retries: usize,
}

impl PageDetectionEngine {
    pub fn new(
        decoder: Arc<dyn MarkerDecoder>,
        regions: Arc<dyn RegionDetector>,
        diagnostics: Arc<dyn DiagnosticSink>,
        max_retries: usize,
    ) -> Self {
        Self {
            decoder,
            regions,
            diagnostics,
            max_retries,
        }
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Detect markers on one page. Never fails: problems are folded into the
    /// returned status and reported to the diagnostic sink.
    pub fn detect(&self, page_index: usize, image: &GrayImage) -> PageDetectionResult {
        let page_no = page_index + 1;
        let region_count = self.regions.count_regions(image);
        tracing::debug!("Page {}: {} region candidate(s)", page_no, region_count);

        let mut best: Option<Attempt> = None;
        let mut attempts_made = 0;

        for attempt in 0..=self.max_retries {
            attempts_made = attempt + 1;
            let stage = stage_for_attempt(attempt);
            let enhanced = stage.apply(image);
            let current = self.attempt(page_no, &enhanced, region_count);
            tracing::debug!(
                "Page {} attempt {} ({}): {}",
                page_no,
                attempts_made,
                stage,
                current.result.status
            );

            let backend_missing = current.backend_missing;
            let improved = best
                .as_ref()
                .map_or(true, |b| current.result.is_better_than(&b.result));
            if improved {
                best = Some(current);
            }

            let Some(kept) = best.as_ref() else { break };
            if kept.result.has_complete_barcodes() {
                if attempt > 0 {
                    self.diagnostics.info(&format!(
                        "Found both markers on page {} after {} retries",
                        page_no, attempt
                    ));
                }
                break;
            }
            if kept.result.status == DetectionStatus::NoPatternsFound || backend_missing {
                break;
            }
            if attempt < self.max_retries {
                self.diagnostics.warning(&format!(
                    "Missing {} marker(s) on page {}, retrying ({}/{})",
                    describe_missing(&kept.result.missing_fields()),
                    page_no,
                    attempt + 1,
                    self.max_retries
                ));
            }
        }

        let Some(best) = best else {
            return PageDetectionResult::empty();
        };
        self.report_unused(page_no, &best);

        let mut result = best.result;
        result.retry_count = attempts_made.saturating_sub(1);
        self.finalize(page_no, &mut result, attempts_made);
        result
    }

    /// Apply the exhaustion rule and report what is still missing.
    fn finalize(&self, page_no: usize, result: &mut PageDetectionResult, attempts_made: usize) {
        if result.has_complete_barcodes() {
            return;
        }

        if result.status == DetectionStatus::NoPatternsFound {
            self.diagnostics
                .warning(&format!("No markers found on page {}", page_no));
            return;
        }

        if attempts_made > self.max_retries {
            result.status = DetectionStatus::RetryExhausted;
        }
        let mut message = format!(
            "Failed to detect {} marker(s) on page {} after {} retries",
            describe_missing(&result.missing_fields()),
            page_no,
            result.retry_count
        );
        if let Some(detail) = &result.error_detail {
            message.push_str(&format!(" ({})", detail));
        }
        self.diagnostics.error(&message);
    }

    fn report_unused(&self, page_no: usize, attempt: &Attempt) {
        let groups = [
            ("delivery number", &attempt.result.delivery_number, &attempt.unused_deliveries),
            ("customer name", &attempt.result.customer_name, &attempt.unused_customers),
        ];
        for (label, chosen, unused) in groups {
            if unused.is_empty() {
                continue;
            }
            self.diagnostics.warning(&format!(
                "Multiple {} markers on page {}, using first one: {}",
                label,
                page_no,
                chosen.as_deref().unwrap_or_default()
            ));
            self.diagnostics.warning(&format!(
                "Unused {} markers on page {}: {}",
                label,
                page_no,
                unused.join(", ")
            ));
        }
    }

    fn attempt(&self, page_no: usize, image: &GrayImage, region_count: usize) -> Attempt {
        let decoded = match self.decoder.decode(image) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.diagnostics
                    .warning(&format!("Decoder error on page {}: {}", page_no, e));
                let mut attempt = Attempt::new(PageDetectionResult {
                    status: DetectionStatus::PatternsCorrupted,
                    patterns_found: region_count,
                    error_detail: Some(format!("decoder error: {}", e)),
                    ..PageDetectionResult::empty()
                });
                attempt.backend_missing = matches!(e, DecodeError::BackendNotAvailable(_));
                return attempt;
            }
        };

        let readable = decoded.len();
        let mut result = PageDetectionResult {
            patterns_found: readable.max(region_count),
            readable_patterns: readable,
            ..PageDetectionResult::empty()
        };

        if result.patterns_found == 0 {
            return Attempt::new(result);
        }
        if readable == 0 {
            result.status = DetectionStatus::PatternsUnreadable;
            return Attempt::new(result);
        }

        let blank = decoded.iter().filter(|t| is_blank(t)).count();
        if blank > 0 {
            result.status = DetectionStatus::PatternsCorrupted;
            result.error_detail = Some(format!("{} corrupted barcode(s) with empty text", blank));
            return Attempt::new(result);
        }

        // Values keep the decoder's text; only classification normalizes it.
        let (deliveries, customers): (Vec<String>, Vec<String>) = decoded
            .into_iter()
            .partition(|t| classify(t) == MarkerClass::DeliveryLike);

        let mut deliveries = deliveries.into_iter();
        let mut customers = customers.into_iter();
        result.delivery_number = deliveries.next();
        result.customer_name = customers.next();
        result.status = DetectionStatus::Success;

        Attempt {
            result,
            unused_deliveries: deliveries.collect(),
            unused_customers: customers.collect(),
            backend_missing: false,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::barcode::Region;
    use crate::diagnostics::{RecordingSink, Severity};
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;

    /// Returns scripted decode results in order, repeating the last one.
    pub(crate) struct ScriptedDecoder {
        script: Mutex<VecDeque<Result<Vec<String>, String>>>,
        last: Mutex<Result<Vec<String>, String>>,
        pub calls: Mutex<usize>,
    }

    impl ScriptedDecoder {
        pub fn new(script: Vec<Result<Vec<&str>, &str>>) -> Self {
            let script: VecDeque<_> = script
                .into_iter()
                .map(|r| {
                    r.map(|v| v.into_iter().map(String::from).collect())
                        .map_err(String::from)
                })
                .collect();
            Self {
                script: Mutex::new(script),
                last: Mutex::new(Ok(Vec::new())),
                calls: Mutex::new(0),
            }
        }

        pub fn always(texts: Vec<&str>) -> Self {
            Self::new(vec![Ok(texts)])
        }

        fn next(&self) -> Result<Vec<String>, String> {
            *self.calls.lock().unwrap() += 1;
            let mut script = self.script.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = script.pop_front() {
                *last = next;
            }
            last.clone()
        }
    }

    impl MarkerDecoder for ScriptedDecoder {
        fn name(&self) -> &str {
            "scripted"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn availability_hint(&self) -> String {
            String::new()
        }

        fn decode_file(&self, _image_path: &Path) -> Result<Vec<String>, DecodeError> {
            self.decode(&GrayImage::new(1, 1))
        }

        fn decode(&self, _image: &GrayImage) -> Result<Vec<String>, DecodeError> {
            self.next().map_err(DecodeError::DecodeFailed)
        }
    }

    pub(crate) struct FixedRegions(pub usize);

    impl RegionDetector for FixedRegions {
        fn find_regions(&self, _image: &GrayImage) -> Vec<Region> {
            vec![
                Region {
                    x: 0,
                    y: 0,
                    width: 300,
                    height: 60,
                    vertices: 4,
                };
                self.0
            ]
        }
    }

    fn engine(
        decoder: ScriptedDecoder,
        regions: usize,
        max_retries: usize,
    ) -> (PageDetectionEngine, Arc<ScriptedDecoder>, Arc<RecordingSink>) {
        let decoder = Arc::new(decoder);
        let sink = Arc::new(RecordingSink::new());
        let engine = PageDetectionEngine::new(
            decoder.clone(),
            Arc::new(FixedRegions(regions)),
            sink.clone(),
            max_retries,
        );
        (engine, decoder, sink)
    }

    fn page() -> GrayImage {
        GrayImage::from_pixel(16, 16, image::Luma([200u8]))
    }

    #[test]
    fn test_complete_read_on_first_attempt() {
        let (engine, decoder, sink) = engine(ScriptedDecoder::always(vec!["DO123", "ACME"]), 2, 10);
        let result = engine.detect(0, &page());

        assert_eq!(result.status, DetectionStatus::Success);
        assert_eq!(result.delivery_number.as_deref(), Some("DO123"));
        assert_eq!(result.customer_name.as_deref(), Some("ACME"));
        assert_eq!(result.retry_count, 0);
        assert_eq!(result.patterns_found, 2);
        assert_eq!(result.readable_patterns, 2);
        assert_eq!(*decoder.calls.lock().unwrap(), 1);
        assert!(sink.at(Severity::Error).is_empty());
    }

    #[test]
    fn test_empty_page_is_not_retried() {
        let (engine, decoder, sink) = engine(ScriptedDecoder::always(vec![]), 0, 10);
        let result = engine.detect(4, &page());

        assert_eq!(result.status, DetectionStatus::NoPatternsFound);
        assert_eq!(result.patterns_found, 0);
        assert!(result.delivery_number.is_none() && result.customer_name.is_none());
        assert_eq!(result.retry_count, 0);
        assert_eq!(*decoder.calls.lock().unwrap(), 1);
        assert!(sink.contains(Severity::Warning, "No markers found on page 5"));
        assert!(sink.at(Severity::Error).is_empty());
    }

    #[test]
    fn test_unreadable_patterns_exhaust_retries() {
        let (engine, decoder, sink) = engine(ScriptedDecoder::always(vec![]), 1, 3);
        let result = engine.detect(0, &page());

        assert_eq!(result.status, DetectionStatus::RetryExhausted);
        assert_eq!(result.patterns_found, 1);
        assert_eq!(result.readable_patterns, 0);
        assert_eq!(result.retry_count, 3);
        assert_eq!(*decoder.calls.lock().unwrap(), 4);
        assert!(sink.contains(
            Severity::Error,
            "Failed to detect delivery number and customer name marker(s) on page 1"
        ));
    }

    #[test]
    fn test_blank_text_marks_page_corrupted_and_retries() {
        let script = vec![Ok(vec!["", "DO7"]), Ok(vec!["DO7", "ACME"])];
        let (engine, decoder, _sink) = engine(ScriptedDecoder::new(script), 0, 10);
        let result = engine.detect(0, &page());

        assert_eq!(*decoder.calls.lock().unwrap(), 2);
        assert_eq!(result.status, DetectionStatus::Success);
        assert_eq!(result.retry_count, 1);
    }

    #[test]
    fn test_persistent_corruption_reports_count() {
        let (engine, _decoder, sink) = engine(ScriptedDecoder::always(vec!["", "DO7"]), 0, 2);
        let result = engine.detect(0, &page());

        assert_eq!(result.status, DetectionStatus::RetryExhausted);
        assert!(result.delivery_number.is_none());
        assert_eq!(
            result.error_detail.as_deref(),
            Some("1 corrupted barcode(s) with empty text")
        );
        assert!(sink.contains(Severity::Error, "1 corrupted barcode(s)"));
    }

    #[test]
    fn test_partial_read_is_kept_over_later_regression() {
        let script = vec![Ok(vec!["DO5"]), Ok(vec![]), Ok(vec!["", ""])];
        let (engine, _decoder, sink) = engine(ScriptedDecoder::new(script), 1, 2);
        let result = engine.detect(2, &page());

        assert_eq!(result.delivery_number.as_deref(), Some("DO5"));
        assert!(result.customer_name.is_none());
        assert_eq!(result.status, DetectionStatus::RetryExhausted);
        assert_eq!(result.retry_count, 2);
        assert!(sink.contains(Severity::Error, "customer name marker(s) on page 3"));
    }

    #[test]
    fn test_empty_enhanced_attempt_keeps_retrying_after_partial_read() {
        let script = vec![Ok(vec!["DO5"]), Ok(vec![]), Ok(vec!["DO5", "ACME"])];
        let (engine, decoder, _sink) = engine(ScriptedDecoder::new(script), 0, 10);
        let result = engine.detect(0, &page());

        assert_eq!(*decoder.calls.lock().unwrap(), 3);
        assert!(result.has_complete_barcodes());
        assert_eq!(result.customer_name.as_deref(), Some("ACME"));
        assert_eq!(result.retry_count, 2);
    }

    #[test]
    fn test_decoded_text_is_kept_as_read() {
        let decoder = ScriptedDecoder::always(vec![" DO9 ", "ACME Ltd"]);
        let (engine, _decoder, _sink) = engine(decoder, 0, 0);
        let result = engine.detect(0, &page());

        assert_eq!(result.delivery_number.as_deref(), Some(" DO9 "));
        assert_eq!(result.customer_name.as_deref(), Some("ACME Ltd"));
    }

    /// Keeps every raster it is asked to decode; reads one field only, so the
    /// engine runs every attempt.
    struct ImageLog {
        images: Mutex<Vec<GrayImage>>,
    }

    impl MarkerDecoder for ImageLog {
        fn name(&self) -> &str {
            "image-log"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn availability_hint(&self) -> String {
            String::new()
        }

        fn decode_file(&self, _image_path: &Path) -> Result<Vec<String>, DecodeError> {
            Ok(Vec::new())
        }

        fn decode(&self, image: &GrayImage) -> Result<Vec<String>, DecodeError> {
            self.images.lock().unwrap().push(image.clone());
            Ok(vec!["DO5".to_string()])
        }
    }

    #[test]
    fn test_each_attempt_decodes_its_enhancement_stage() {
        let input = GrayImage::from_fn(40, 12, |x, _| image::Luma([(100 + x % 20) as u8]));
        let decoder = Arc::new(ImageLog {
            images: Mutex::new(Vec::new()),
        });
        let engine = PageDetectionEngine::new(
            decoder.clone(),
            Arc::new(FixedRegions(0)),
            Arc::new(RecordingSink::new()),
            4,
        );
        engine.detect(0, &input);

        let images = decoder.images.lock().unwrap();
        assert_eq!(images.len(), 5);
        assert_eq!(images[0], input);
        assert_ne!(images[1], input);
        for (attempt, seen) in images.iter().enumerate() {
            assert_eq!(*seen, stage_for_attempt(attempt).apply(&input), "attempt {}", attempt);
        }
        assert_ne!(images[1], images[2]);
    }

    #[test]
    fn test_unused_candidates_are_reported() {
        let decoder = ScriptedDecoder::always(vec!["ACME", "DO1", "DO2", "Beta", "42"]);
        let (engine, _decoder, sink) = engine(decoder, 0, 0);
        let result = engine.detect(0, &page());

        assert_eq!(result.delivery_number.as_deref(), Some("DO1"));
        assert_eq!(result.customer_name.as_deref(), Some("ACME"));
        assert!(sink.contains(Severity::Warning, "Unused delivery number markers on page 1: DO2, 42"));
        assert!(sink.contains(Severity::Warning, "Unused customer name markers on page 1: Beta"));
    }

    #[test]
    fn test_decoder_error_is_page_local() {
        let script = vec![Err("segfault"), Ok(vec!["DO1", "ACME"])];
        let (engine, _decoder, sink) = engine(ScriptedDecoder::new(script), 0, 5);
        let result = engine.detect(0, &page());

        assert!(result.has_complete_barcodes());
        assert!(sink.contains(Severity::Warning, "Decoder error on page 1"));
    }

    #[test]
    fn test_readable_never_exceeds_found() {
        for regions in 0..4 {
            let (engine, _d, _s) = engine(ScriptedDecoder::always(vec!["DO1", "X"]), regions, 1);
            let result = engine.detect(0, &page());
            assert!(result.readable_patterns <= result.patterns_found);
        }
    }
}
