//! Split service: detect, group, assign, plan and write.
//!
//! Page detection runs concurrently; everything after the join barrier is
//! sequential over the complete result map.

mod types;

pub use types::{FailedOutput, OutputSummary, SplitEvent, SplitReport};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use thiserror::Error;
use tokio::sync::mpsc;

use super::aggregate::DetectionAggregator;
use super::assignment::{unassigned_pages, PageAssigner};
use super::audit::{AuditError, AuditLog};
use super::engine::PageDetectionEngine;
use super::planner::plan;
use crate::barcode::{ContourRegionDetector, MarkerDecoder, RegionDetector, ZbarBackend};
use crate::config::{ConfigError, SplitConfig};
use crate::diagnostics::DiagnosticSink;
use crate::pdf::{DocumentError, DocumentSink, PageSource, PdfDocument};

/// Top-level failures that abort a run.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Input is not a file: {0}")]
    InputNotAFile(PathBuf),

    #[error("Input is not a PDF: {0}")]
    InputNotPdf(PathBuf),

    #[error("Cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open document: {0}")]
    Open(#[from] DocumentError),

    #[error("Audit log error: {0}")]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Check that `input` is an existing `.pdf` file.
pub fn validate_input(input: &Path) -> Result<(), SplitError> {
    if !input.exists() {
        return Err(SplitError::InputNotFound(input.to_path_buf()));
    }
    if !input.is_file() {
        return Err(SplitError::InputNotAFile(input.to_path_buf()));
    }
    let is_pdf = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(SplitError::InputNotPdf(input.to_path_buf()));
    }
    Ok(())
}

pub struct SplitService {
    config: SplitConfig,
    decoder: Arc<dyn MarkerDecoder>,
    regions: Arc<dyn RegionDetector>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl SplitService {
    /// Service using zbar and the contour region detector from `config`.
    pub fn new(config: SplitConfig, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        let decoder = Arc::new(ZbarBackend::with_binary(config.decoder_binary.clone()));
        let regions = Arc::new(ContourRegionDetector::new(config.regions.clone()));
        Self::with_backends(config, decoder, regions, diagnostics)
    }

    pub fn with_backends(
        config: SplitConfig,
        decoder: Arc<dyn MarkerDecoder>,
        regions: Arc<dyn RegionDetector>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            config,
            decoder,
            regions,
            diagnostics,
        }
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Split a PDF file into per-bucket documents under `output_dir`.
    pub async fn run(
        &self,
        input: &Path,
        output_dir: &Path,
        events: &mpsc::Sender<SplitEvent>,
    ) -> Result<SplitReport, SplitError> {
        self.config.validate()?;
        validate_input(input)?;

        let path = input.to_path_buf();
        let rasterizer = self.config.rasterizer_binary.clone();
        let document = tokio::task::spawn_blocking(move || {
            PdfDocument::open_with_rasterizer(&path, &rasterizer)
        })
        .await??;
        let document = Arc::new(document);

        let mut report = self
            .process(document.clone(), document, output_dir, events)
            .await?;
        report.input = input.to_path_buf();
        Ok(report)
    }

    /// Run the pipeline over an already opened source.
    pub async fn process(
        &self,
        source: Arc<dyn PageSource>,
        sink: Arc<dyn DocumentSink>,
        output_dir: &Path,
        events: &mpsc::Sender<SplitEvent>,
    ) -> Result<SplitReport, SplitError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| SplitError::OutputDir {
                path: output_dir.to_path_buf(),
                source,
            })?;

        let run_time = Local::now();
        let total_pages = source.page_count();

        let engine = Arc::new(PageDetectionEngine::new(
            self.decoder.clone(),
            self.regions.clone(),
            self.diagnostics.clone(),
            self.config.max_retries,
        ));
        let aggregator = DetectionAggregator::new(
            engine,
            self.diagnostics.clone(),
            self.config.dpi,
            self.config.effective_workers(),
        );

        let results = aggregator.extract(source, events).await;
        let statistics = DetectionAggregator::statistics(&results);
        let (buckets, orphans) = DetectionAggregator::group(&results);
        tracing::debug!(
            "Grouped into {} bucket(s), {} orphan page(s)",
            buckets.len(),
            orphans.len()
        );

        let assigner = PageAssigner::new(self.diagnostics.clone());
        let mut buckets = assigner.assign(buckets, &orphans, total_pages, self.config.policy);
        let mut dropped_incomplete_pages = Vec::new();
        if self.config.require_complete_keys {
            let (kept, dropped) = assigner.drop_incomplete(buckets);
            buckets = kept;
            dropped_incomplete_pages = dropped;
        }

        let planned = plan(&buckets, output_dir, &run_time);
        let mut audit = AuditLog::create(output_dir, &run_time)?;
        let _ = events
            .send(SplitEvent::WritingStarted {
                total_outputs: planned.len(),
            })
            .await;

        let mut outputs = Vec::new();
        let mut failed_outputs = Vec::new();

        for output in planned {
            let sink = sink.clone();
            let pages = output.pages.clone();
            let path = output.path.clone();
            let written = tokio::task::spawn_blocking(move || sink.write_pages(&pages, &path)).await;

            let error = match written {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(e) => Some(e.to_string()),
            };

            if let Some(error) = error {
                self.diagnostics.error(&format!(
                    "Failed to write {} ({}): {}",
                    output.filename, output.key, error
                ));
                let _ = events
                    .send(SplitEvent::OutputFailed {
                        filename: output.filename.clone(),
                        error: error.clone(),
                    })
                    .await;
                failed_outputs.push(FailedOutput {
                    filename: output.filename,
                    error,
                });
                continue;
            }

            let mut record = output.record;
            record.sequence_no = outputs.len() + 1;
            if let Err(e) = audit.append(&record) {
                self.diagnostics
                    .error(&format!("Failed to record {} in audit log: {}", output.filename, e));
            }
            self.diagnostics.info(&format!(
                "Created {} with {} page(s)",
                output.path.display(),
                output.pages.len()
            ));
            let _ = events
                .send(SplitEvent::OutputWritten {
                    path: output.path.clone(),
                    pages: output.pages.len(),
                })
                .await;

            outputs.push(OutputSummary {
                sequence_no: record.sequence_no,
                delivery: output.key.delivery,
                customer: output.key.customer,
                filename: output.filename,
                path: output.path,
                pages: output.pages,
            });
        }

        let audit_log = audit.finish()?;
        let unassigned = unassigned_pages(&buckets, total_pages);
        if !unassigned.is_empty() {
            self.diagnostics.info(&format!(
                "{} page(s) not included in any output",
                unassigned.len()
            ));
        }

        let _ = events
            .send(SplitEvent::SplitComplete {
                written: outputs.len(),
                failed: failed_outputs.len(),
            })
            .await;

        Ok(SplitReport {
            input: PathBuf::new(),
            output_dir: output_dir.to_path_buf(),
            policy: self.config.policy,
            statistics,
            outputs,
            failed_outputs,
            unassigned_pages: unassigned,
            dropped_incomplete_pages,
            audit_log: Some(audit_log),
        })
    }
}
