//! Marker decoder abstraction.
//!
//! A decoder turns a raster image into the raw strings of every symbol it can
//! read. Blank strings are preserved: the detection engine treats them as
//! corrupted reads.

use std::path::Path;

use image::GrayImage;
use tempfile::TempDir;
use thiserror::Error;

/// Errors from marker decoder backends.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Trait for marker decoders.
pub trait MarkerDecoder: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Check if this backend can run (binary installed, etc.).
    fn is_available(&self) -> bool;

    /// Describe what's needed to make this backend available.
    fn availability_hint(&self) -> String;

    /// Decode every symbol in an image file, in decode order.
    fn decode_file(&self, image_path: &Path) -> Result<Vec<String>, DecodeError>;

    /// Decode an in-memory raster by staging it as a temporary PNG.
    fn decode(&self, image: &GrayImage) -> Result<Vec<String>, DecodeError> {
        let temp_dir = TempDir::new()?;
        let image_path = temp_dir.path().join("page.png");
        image.save(&image_path)?;
        self.decode_file(&image_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FileSizeDecoder {
        seen: Mutex<Vec<u64>>,
    }

    impl MarkerDecoder for FileSizeDecoder {
        fn name(&self) -> &str {
            "file-size"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn availability_hint(&self) -> String {
            String::new()
        }

        fn decode_file(&self, image_path: &Path) -> Result<Vec<String>, DecodeError> {
            let len = std::fs::metadata(image_path)?.len();
            self.seen.lock().unwrap().push(len);
            Ok(vec![format!("DO{}", len)])
        }
    }

    #[test]
    fn test_default_decode_stages_png() {
        let decoder = FileSizeDecoder {
            seen: Mutex::new(Vec::new()),
        };
        let image = GrayImage::from_pixel(8, 8, image::Luma([255u8]));
        let decoded = decoder.decode(&image).unwrap();
        assert_eq!(decoded.len(), 1);
        assert!(decoded[0].starts_with("DO"));
        assert!(decoder.seen.lock().unwrap()[0] > 0);
    }
}
