//! zbar backend.
//!
//! Runs `zbarimg --raw -q` on a staged image. Each stdout line is one decoded
//! symbol; an empty line is a symbol that decoded to blank text.

use std::path::Path;
use std::process::Command;

use super::backend::{DecodeError, MarkerDecoder};
use super::tools::{check_binary, ZBARIMG_NOT_FOUND};

/// zbarimg exits with this status when the image contains no symbols.
const EXIT_NO_SYMBOLS: i32 = 4;

pub struct ZbarBackend {
    binary: String,
}

impl ZbarBackend {
    pub fn new() -> Self {
        Self::with_binary("zbarimg")
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run_zbarimg(&self, image_path: &Path) -> Result<Vec<String>, DecodeError> {
        let output = Command::new(&self.binary)
            .args(["--raw", "-q"])
            .arg(image_path)
            .output();

        match output {
            Ok(output) if output.status.success() => {
                Ok(parse_symbols(&String::from_utf8_lossy(&output.stdout)))
            }
            Ok(output) if output.status.code() == Some(EXIT_NO_SYMBOLS) => Ok(Vec::new()),
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(DecodeError::DecodeFailed(format!(
                    "{} failed: {}",
                    self.binary,
                    stderr.trim()
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DecodeError::BackendNotAvailable(ZBARIMG_NOT_FOUND.to_string()))
            }
            Err(e) => Err(DecodeError::Io(e)),
        }
    }
}

impl Default for ZbarBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkerDecoder for ZbarBackend {
    fn name(&self) -> &str {
        "zbar"
    }

    fn is_available(&self) -> bool {
        check_binary(&self.binary)
    }

    fn availability_hint(&self) -> String {
        if self.is_available() {
            format!("{} is available", self.binary)
        } else {
            format!(
                "{} not installed. Install with: apt install zbar-tools",
                self.binary
            )
        }
    }

    fn decode_file(&self, image_path: &Path) -> Result<Vec<String>, DecodeError> {
        self.run_zbarimg(image_path)
    }
}

/// Split raw zbarimg output into symbols, keeping blank symbols.
fn parse_symbols(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
}
