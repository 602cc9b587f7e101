//! Application info and tool status.

use console::style;

use crate::barcode::tools::{check_pdftoppm_hint, locate_binary};
use crate::barcode::{MarkerDecoder, ZbarBackend};
use crate::config::SplitConfig;
use crate::models::AssignmentPolicy;

pub async fn cmd_check(config: &SplitConfig) -> anyhow::Result<()> {
    println!(
        "\n{} {}",
        style(env!("CARGO_PKG_NAME")).bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", "-".repeat(50));

    println!("\n{}", style("Marker classes:").cyan());
    println!("  {:<15} {}", "Delivery", "text starting with \"DO\" or a digit");
    println!("  {:<15} {}", "Customer", "any other non-empty text");

    println!("\n{}", style("Policies:").cyan());
    let policies = [
        AssignmentPolicy::Ignore,
        AssignmentPolicy::Separate,
        AssignmentPolicy::KeepWithPrevious,
        AssignmentPolicy::Sequential,
    ];
    for policy in policies {
        let marker = if policy == config.policy { "*" } else { " " };
        println!("  {} {}", marker, policy);
    }

    println!("\n{}", style("Tools:").cyan());
    let mut all_found = true;

    match locate_binary(&config.rasterizer_binary) {
        Some(path) => println!(
            "  {:<15} {} {}",
            config.rasterizer_binary,
            style("✓ found").green(),
            style(path.display()).dim()
        ),
        None => {
            all_found = false;
            println!(
                "  {:<15} {}",
                config.rasterizer_binary,
                style("✗ not found").red()
            );
            if let Some(hint) = check_pdftoppm_hint(&config.rasterizer_binary) {
                println!("                  {}", style(hint).dim());
            }
        }
    }

    let decoder = ZbarBackend::with_binary(&config.decoder_binary);
    match locate_binary(&config.decoder_binary) {
        Some(path) => println!(
            "  {:<15} {} {}",
            config.decoder_binary,
            style("✓ found").green(),
            style(path.display()).dim()
        ),
        None => {
            all_found = false;
            println!(
                "  {:<15} {}",
                config.decoder_binary,
                style("✗ not found").red()
            );
            println!(
                "                  {}",
                style(decoder.availability_hint()).dim()
            );
        }
    }

    println!();
    if all_found {
        println!("{} All required tools are installed", style("✓").green());
    } else {
        println!(
            "{} Some tools are missing; splitting will fail until they are installed",
            style("!").yellow()
        );
    }
    Ok(())
}
