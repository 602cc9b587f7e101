//! Logging setup: console output plus an optional detailed log file.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub quiet: bool,
    pub debug: bool,
    /// Detailed log destination; no file layer when `None`.
    pub log_file: Option<PathBuf>,
}

/// Console filter directive for the given flags.
pub fn console_directive(quiet: bool, debug: bool) -> &'static str {
    if debug {
        "barsplit=debug"
    } else if quiet {
        "barsplit=warn"
    } else {
        "barsplit=info"
    }
}

/// Default detailed log path inside the output directory.
pub fn default_log_path(output_dir: &Path, run_time: &DateTime<Local>) -> PathBuf {
    output_dir.join(format!(
        "detailed_log_{}.log",
        run_time.format("%Y%m%d_%H%M%S")
    ))
}

/// Install the global subscriber. `RUST_LOG` overrides the console filter.
pub fn init_logging(options: &LogOptions) -> anyhow::Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| console_directive(options.quiet, options.debug).into());
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let file_layer = match &options.log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(path)?;
            let file_filter = EnvFilter::new(if options.debug {
                "barsplit=debug"
            } else {
                "barsplit=info"
            });
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(file_filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()?;
    Ok(())
}
