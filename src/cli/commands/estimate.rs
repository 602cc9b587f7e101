//! Processing-time estimate.

use std::path::{Path, PathBuf};

use console::style;

use crate::config::DEFAULT_DPI;
use crate::pdf::{PageSource, PdfDocument};
use crate::services::validate_input;

/// Approximate seconds of work per page at the default DPI.
const SECONDS_PER_PAGE: f64 = 0.5;

/// Estimated processing time in seconds, scaling linearly with DPI.
pub fn estimate_seconds(pages: usize, dpi: u32) -> f64 {
    pages as f64 * SECONDS_PER_PAGE * (dpi as f64 / DEFAULT_DPI as f64)
}

pub async fn cmd_estimate(input: &Path, dpi: u32) -> anyhow::Result<()> {
    validate_input(input)?;

    let path: PathBuf = input.to_path_buf();
    let document = tokio::task::spawn_blocking(move || PdfDocument::open(&path)).await??;
    let pages = document.page_count();
    let seconds = estimate_seconds(pages, dpi);

    println!("\n{}", style("Processing Estimate").bold());
    println!("{}", "-".repeat(50));
    println!("  {:<15} {}", "File:", input.display());
    println!("  {:<15} {}", "Pages:", pages);
    println!("  {:<15} {}", "DPI:", dpi);
    println!(
        "  {:<15} {:.1} seconds ({:.1} minutes)",
        "Estimated:",
        seconds,
        seconds / 60.0
    );
    Ok(())
}
