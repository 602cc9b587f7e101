//! CLI interface for barsplit.

mod commands;
mod logging;

pub use commands::{run, Cli};
pub use logging::{init_logging, LogOptions};
