//! External tool discovery.

use std::path::PathBuf;

pub const PDFTOPPM_NOT_FOUND: &str = "pdftoppm not found (install poppler-utils)";
pub const ZBARIMG_NOT_FOUND: &str = "zbarimg not found (install zbar-tools)";

/// Check if a binary is available on PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Resolve a binary to its full path, if installed.
pub fn locate_binary(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Check pdftoppm availability, returning a hint message if missing.
pub fn check_pdftoppm_hint(binary: &str) -> Option<String> {
    if check_binary(binary) {
        None
    } else {
        Some(format!(
            "{} not installed. Install with: apt install poppler-utils",
            binary
        ))
    }
}
