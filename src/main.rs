//! barsplit command-line entry point.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    barsplit::cli::run().await
}
