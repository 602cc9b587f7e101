//! CLI command implementations.

mod check;
mod estimate;
mod split;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::logging::{init_logging, LogOptions};
use crate::config::SplitConfig;
use crate::models::AssignmentPolicy;

#[derive(Parser)]
#[command(name = "barsplit")]
#[command(about = "Split scanned PDF batches into per-delivery documents using barcode markers")]
#[command(version)]
pub struct Cli {
    /// Config file path (TOML or JSON)
    #[arg(short, long, global = true, env = "BARSPLIT_CONFIG")]
    config: Option<PathBuf>,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Detailed log file (default: auto-generated in the output directory)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a PDF into one document per delivery/customer marker pair
    Split {
        /// Path to input PDF file
        input: PathBuf,
        /// Output directory
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,
        /// Rasterization DPI for barcode detection (50-1200)
        #[arg(long)]
        dpi: Option<u32>,
        /// How to handle pages without barcodes
        #[arg(long = "handle-no-barcode", visible_alias = "policy", value_enum)]
        policy: Option<AssignmentPolicy>,
        /// Retries per page after the first decode attempt
        #[arg(long)]
        max_retries: Option<usize>,
        /// Concurrent page workers (0 = all cores)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Skip buckets missing a delivery number or customer name
        #[arg(long)]
        require_complete_keys: bool,
        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Estimate processing time for a PDF
    Estimate {
        /// Path to input PDF file
        input: PathBuf,
        /// Rasterization DPI
        #[arg(long)]
        dpi: Option<u32>,
    },

    /// Show application information and check required tools
    Check,
}

/// Command-line overrides applied on top of the loaded config.
struct SplitOverrides {
    dpi: Option<u32>,
    policy: Option<AssignmentPolicy>,
    max_retries: Option<usize>,
    workers: Option<usize>,
    require_complete_keys: bool,
}

impl SplitOverrides {
    fn apply(self, mut config: SplitConfig) -> anyhow::Result<SplitConfig> {
        if let Some(dpi) = self.dpi {
            config.dpi = dpi;
        }
        if let Some(policy) = self.policy {
            config.policy = policy;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.require_complete_keys {
            config.require_complete_keys = true;
        }
        config.validate()?;
        Ok(config)
    }
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = SplitConfig::load(cli.config.as_deref())?;

    let mut log_options = LogOptions {
        quiet: cli.quiet,
        debug: cli.debug,
        log_file: cli.log_file.clone(),
    };

    match cli.command {
        Commands::Split {
            input,
            output_dir,
            dpi,
            policy,
            max_retries,
            workers,
            require_complete_keys,
            json,
        } => {
            let config = SplitOverrides {
                dpi,
                policy,
                max_retries,
                workers,
                require_complete_keys,
            }
            .apply(config)?;
            split::cmd_split(&input, &output_dir, config, &mut log_options, json).await
        }
        Commands::Estimate { input, dpi } => {
            init_logging(&LogOptions {
                log_file: None,
                ..log_options
            })?;
            estimate::cmd_estimate(&input, dpi.unwrap_or(config.dpi)).await
        }
        Commands::Check => {
            init_logging(&LogOptions {
                log_file: None,
                ..log_options
            })?;
            check::cmd_check(&config).await
        }
    }
}
