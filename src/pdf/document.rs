//! PDF-backed page source and sink.
//!
//! Structure (page count, page subsets) goes through `lopdf`; rasterization
//! shells out to pdftoppm.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::GrayImage;
use lopdf::Document;
use tempfile::TempDir;

use super::{DocumentError, DocumentSink, PageSource};
use crate::barcode::tools::{check_binary, PDFTOPPM_NOT_FOUND};

pub struct PdfDocument {
    path: PathBuf,
    document: Document,
    page_count: usize,
    rasterizer: String,
}

impl PdfDocument {
    /// Open a PDF using the default `pdftoppm` rasterizer.
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        Self::open_with_rasterizer(path, "pdftoppm")
    }

    pub fn open_with_rasterizer(path: &Path, rasterizer: &str) -> Result<Self, DocumentError> {
        let document = Document::load(path)?;
        let page_count = document.get_pages().len();
        tracing::debug!("Opened {} ({} pages)", path.display(), page_count);
        Ok(Self {
            path: path.to_path_buf(),
            document,
            page_count,
            rasterizer: rasterizer.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rasterizer_available(&self) -> bool {
        check_binary(&self.rasterizer)
    }

    fn check_index(&self, index: usize) -> Result<(), DocumentError> {
        if index >= self.page_count {
            return Err(DocumentError::PageOutOfRange {
                page: index,
                count: self.page_count,
            });
        }
        Ok(())
    }

    /// Run pdftoppm for a single page into `output_dir`, returning the PNG path.
    fn run_pdftoppm(&self, index: usize, dpi: u32, output_dir: &Path) -> Result<PathBuf, DocumentError> {
        let page_str = (index + 1).to_string();
        let dpi_str = dpi.to_string();
        let output_prefix = output_dir.join("page");

        let output = Command::new(&self.rasterizer)
            .args(["-png", "-gray", "-r", &dpi_str])
            .args(["-f", &page_str, "-l", &page_str, "-singlefile"])
            .arg(&self.path)
            .arg(&output_prefix)
            .output();

        match output {
            Ok(o) if o.status.success() => {
                let image_path = output_dir.join("page.png");
                if image_path.exists() {
                    Ok(image_path)
                } else {
                    Err(DocumentError::RenderFailed {
                        page: index,
                        reason: "no image generated".to_string(),
                    })
                }
            }
            Ok(o) => Err(DocumentError::RenderFailed {
                page: index,
                reason: String::from_utf8_lossy(&o.stderr).trim().to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                DocumentError::RasterizerNotAvailable(PDFTOPPM_NOT_FOUND.to_string()),
            ),
            Err(e) => Err(DocumentError::Io(e)),
        }
    }
}

impl PageSource for PdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn render_page(&self, index: usize, dpi: u32) -> Result<GrayImage, DocumentError> {
        self.check_index(index)?;
        let temp_dir = TempDir::new()?;
        let image_path = self.run_pdftoppm(index, dpi, temp_dir.path())?;
        let image = image::open(&image_path)?.into_luma8();
        Ok(image)
    }
}

impl DocumentSink for PdfDocument {
    fn write_pages(&self, pages: &[usize], output: &Path) -> Result<(), DocumentError> {
        if pages.is_empty() {
            return Err(DocumentError::EmptyPageSet(output.display().to_string()));
        }
        for &page in pages {
            self.check_index(page)?;
        }

        // lopdf page numbers are 1-based
        let keep: BTreeSet<u32> = pages.iter().map(|&p| p as u32 + 1).collect();
        let drop: Vec<u32> = self
            .document
            .get_pages()
            .keys()
            .copied()
            .filter(|n| !keep.contains(n))
            .collect();

        let mut subset = self.document.clone();
        subset.delete_pages(&drop);
        subset.prune_objects();

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        subset
            .save(output)
            .map_err(|e| DocumentError::WriteFailed(format!("{}: {}", output.display(), e)))?;
        Ok(())
    }
}
