//! Split command.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::cli::logging::{default_log_path, init_logging, LogOptions};
use crate::config::SplitConfig;
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::models::DetectionStatus;
use crate::services::{validate_input, SplitEvent, SplitReport, SplitService};

fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
        .map(|s| s.progress_chars("█▓░"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Render pages as a compact 1-based list.
fn page_list(pages: &[usize]) -> String {
    pages
        .iter()
        .map(|p| (p + 1).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub async fn cmd_split(
    input: &Path,
    output_dir: &Path,
    config: SplitConfig,
    log_options: &mut LogOptions,
    json: bool,
) -> anyhow::Result<()> {
    validate_input(input)?;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Cannot create output directory {}", output_dir.display()))?;

    if log_options.log_file.is_none() {
        log_options.log_file = Some(default_log_path(output_dir, &Local::now()));
    }
    init_logging(log_options)?;
    tracing::info!(
        "Splitting {} into {} (dpi {}, policy {})",
        input.display(),
        output_dir.display(),
        config.dpi,
        config.policy
    );

    let show_progress = !log_options.quiet && !json;
    let diagnostics: Arc<dyn DiagnosticSink> = Arc::new(TracingSink);
    let service = SplitService::new(config, diagnostics);

    let (event_tx, mut event_rx) = mpsc::channel::<SplitEvent>(100);

    let event_handler = tokio::spawn(async move {
        let mut progress: Option<ProgressBar> = None;

        while let Some(event) = event_rx.recv().await {
            if !show_progress {
                continue;
            }
            match event {
                SplitEvent::DetectionStarted { total_pages } => {
                    println!(
                        "{} Detecting barcodes on {} pages",
                        style("→").cyan(),
                        total_pages
                    );
                    let bar = ProgressBar::new(total_pages as u64);
                    bar.set_style(progress_style());
                    bar.set_message("Reading barcodes...");
                    progress = Some(bar);
                }
                SplitEvent::PageDetected {
                    page,
                    status,
                    delivery,
                    customer,
                } => {
                    if let Some(ref bar) = progress {
                        if status == DetectionStatus::Success {
                            bar.set_message(format!(
                                "page {}: {} / {}",
                                page + 1,
                                delivery.as_deref().unwrap_or("?"),
                                customer.as_deref().unwrap_or("?")
                            ));
                        }
                        bar.inc(1);
                    }
                }
                SplitEvent::DetectionComplete {
                    total_pages,
                    pages_with_markers,
                } => {
                    if let Some(bar) = progress.take() {
                        bar.finish_and_clear();
                    }
                    println!(
                        "{} Detection complete: barcodes found on {}/{} pages",
                        style("✓").green(),
                        pages_with_markers,
                        total_pages
                    );
                }
                SplitEvent::WritingStarted { total_outputs } => {
                    println!(
                        "{} Writing {} documents",
                        style("→").cyan(),
                        total_outputs
                    );
                }
                SplitEvent::OutputWritten { path, pages } => {
                    println!("  {} {} ({} pages)", style("✓").green(), path.display(), pages);
                }
                SplitEvent::OutputFailed { filename, error } => {
                    eprintln!("  {} {} failed: {}", style("✗").red(), filename, error);
                }
                SplitEvent::SplitComplete { .. } => {}
            }
        }

        if let Some(bar) = progress {
            bar.finish_and_clear();
        }
    });

    let result = service.run(input, output_dir, &event_tx).await;
    drop(event_tx);
    let _ = event_handler.await;
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !log_options.quiet {
        print_summary(&report);
    }

    if let Some(log_file) = &log_options.log_file {
        tracing::debug!("Detailed log written to {}", log_file.display());
    }
    Ok(())
}

fn print_summary(report: &SplitReport) {
    let stats = &report.statistics;

    println!("\n{}", style("Summary").bold());
    println!("{}", "-".repeat(50));
    println!(
        "  {:<22} {}",
        "Pages processed:",
        stats.total_pages
    );
    println!(
        "  {:<22} {} (both markers: {})",
        "Pages with barcodes:", stats.pages_with_any_marker, stats.pages_with_both_markers
    );
    println!(
        "  {:<22} {} found, {} readable",
        "Barcode patterns:", stats.total_patterns_found, stats.total_readable_patterns
    );
    for (status, count) in stats.by_status.iter().filter(|(_, count)| **count > 0) {
        println!("    {:<20} {}", style(status).dim(), count);
    }
    println!("  {:<22} {}", "Policy:", report.policy);

    println!("\n{}", style("Documents:").cyan());
    for output in &report.outputs {
        println!(
            "  {:>3}. {} {}",
            output.sequence_no,
            output.filename,
            style(format!("[pages {}]", page_list(&output.pages))).dim()
        );
    }
    if report.outputs.is_empty() {
        println!("  {} No documents written", style("!").yellow());
    }

    for failed in &report.failed_outputs {
        println!(
            "  {} {} failed: {}",
            style("✗").red(),
            failed.filename,
            failed.error
        );
    }

    if !report.unassigned_pages.is_empty() {
        println!(
            "\n{} {} page(s) not included in any output: {}",
            style("!").yellow(),
            report.unassigned_pages.len(),
            page_list(&report.unassigned_pages)
        );
    }
    if !report.dropped_incomplete_pages.is_empty() {
        println!(
            "{} {} page(s) skipped for incomplete barcode data: {}",
            style("!").yellow(),
            report.dropped_incomplete_pages.len(),
            page_list(&report.dropped_incomplete_pages)
        );
    }
    if let Some(audit_log) = &report.audit_log {
        println!("\n{} Audit log: {}", style("→").dim(), audit_log.display());
    }
}
