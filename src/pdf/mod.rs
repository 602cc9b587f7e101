//! Document source and sink.
//!
//! The pipeline only needs page rasters in, page subsets out. `PdfDocument`
//! provides both for PDF files.

mod document;

use std::path::Path;

use image::GrayImage;
use thiserror::Error;

pub use document::PdfDocument;

/// Errors from opening, rendering or writing documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Rasterizer not available: {0}")]
    RasterizerNotAvailable(String),

    #[error("Rendering page {page} failed: {reason}")]
    RenderFailed { page: usize, reason: String },

    #[error("Page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },

    #[error("Cannot write an empty page set to {0}")]
    EmptyPageSet(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Ordered pages that can be rasterized on demand.
pub trait PageSource: Send + Sync {
    fn page_count(&self) -> usize;

    /// Render a zero-based page as grayscale at `dpi`.
    fn render_page(&self, index: usize, dpi: u32) -> Result<GrayImage, DocumentError>;
}

/// Writes a subset of a source document's pages to a new file.
pub trait DocumentSink: Send + Sync {
    /// `pages` are zero-based and emitted in ascending order.
    fn write_pages(&self, pages: &[usize], output: &Path) -> Result<(), DocumentError>;
}
