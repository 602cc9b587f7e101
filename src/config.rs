//! Configuration for a split run.
//!
//! Values come from built-in defaults, optionally overlaid by a TOML (or JSON)
//! file, and finally by command-line flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::AssignmentPolicy;

/// Lowest rasterization resolution accepted.
pub const MIN_DPI: u32 = 50;
/// Highest rasterization resolution accepted.
pub const MAX_DPI: u32 = 1200;
/// Default rasterization resolution.
pub const DEFAULT_DPI: u32 = 300;
/// Default number of retries after the first decode attempt.
pub const DEFAULT_MAX_RETRIES: usize = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Thresholds for the region-candidate heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Minimum bounding-box area in square pixels.
    pub min_area: u32,
    pub min_aspect: f32,
    pub max_aspect: f32,
    /// Maximum vertex count after polygon approximation.
    pub max_vertices: usize,
    /// Radius of the closing applied before contour tracing.
    pub close_radius: u8,
    /// Douglas-Peucker epsilon as a fraction of contour perimeter.
    pub approx_epsilon_ratio: f64,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            min_area: 1000,
            min_aspect: 2.0,
            max_aspect: 10.0,
            max_vertices: 6,
            close_radius: 2,
            approx_epsilon_ratio: 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Rasterization resolution in dots per inch.
    pub dpi: u32,
    /// Retries after the first attempt; attempts = max_retries + 1.
    pub max_retries: usize,
    /// Concurrent page workers; 0 means available parallelism.
    pub workers: usize,
    pub policy: AssignmentPolicy,
    /// Drop buckets whose key contains the UNKNOWN sentinel.
    pub require_complete_keys: bool,
    pub decoder_binary: String,
    pub rasterizer_binary: String,
    pub regions: RegionConfig,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            max_retries: DEFAULT_MAX_RETRIES,
            workers: 0,
            policy: AssignmentPolicy::default(),
            require_complete_keys: false,
            decoder_binary: "zbarimg".to_string(),
            rasterizer_binary: "pdftoppm".to_string(),
            regions: RegionConfig::default(),
        }
    }
}

impl SplitConfig {
    /// Load configuration from a file; format is chosen by extension
    /// (`.json` is JSON, anything else is TOML).
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let config: SplitConfig = match ext {
            "json" => serde_json::from_str(&contents)?,
            _ => toml::from_str(&contents)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_DPI..=MAX_DPI).contains(&self.dpi) {
            return Err(ConfigError::Invalid(format!(
                "DPI must be between {} and {}, got {}",
                MIN_DPI, MAX_DPI, self.dpi
            )));
        }
        let regions = &self.regions;
        if regions.min_aspect <= 0.0 || regions.min_aspect > regions.max_aspect {
            return Err(ConfigError::Invalid(format!(
                "region aspect range [{}, {}] is empty",
                regions.min_aspect, regions.max_aspect
            )));
        }
        if regions.approx_epsilon_ratio <= 0.0 || regions.approx_epsilon_ratio >= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "approx_epsilon_ratio must be in (0, 1), got {}",
                regions.approx_epsilon_ratio
            )));
        }
        if self.decoder_binary.trim().is_empty() || self.rasterizer_binary.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "decoder_binary and rasterizer_binary must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Total decode attempts per page.
    pub fn attempts(&self) -> usize {
        self.max_retries + 1
    }

    /// Effective worker count, resolving 0 to the machine's parallelism.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = SplitConfig::default();
        assert_eq!(config.dpi, 300);
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.attempts(), 11);
        assert_eq!(config.policy, AssignmentPolicy::Ignore);
        assert!(!config.require_complete_keys);
        assert_eq!(config.regions.max_vertices, 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_toml_keeps_defaults() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            "dpi = 200\npolicy = \"sequential\"\n\n[regions]\nmin_area = 500"
        )
        .unwrap();

        let config = SplitConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.dpi, 200);
        assert_eq!(config.policy, AssignmentPolicy::Sequential);
        assert_eq!(config.regions.min_area, 500);
        assert_eq!(config.regions.max_aspect, 10.0);
        assert_eq!(config.max_retries, 10);
    }

    #[test]
    fn test_load_json() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        write!(file, r#"{{"policy": "keep_with_previous", "workers": 2}}"#).unwrap();

        let config = SplitConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.policy, AssignmentPolicy::KeepWithPrevious);
        assert_eq!(config.effective_workers(), 2);
    }

    #[test]
    fn test_rejects_out_of_range_dpi() {
        let config = SplitConfig {
            dpi: 2400,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = SplitConfig {
            dpi: 49,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_aspect_range() {
        let mut config = SplitConfig::default();
        config.regions.min_aspect = 12.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = SplitConfig::load_from_path(Path::new("/nonexistent/barsplit.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_effective_workers_never_zero() {
        assert!(SplitConfig::default().effective_workers() >= 1);
    }
}
