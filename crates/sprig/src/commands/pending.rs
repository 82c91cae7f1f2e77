//! Pending command - details waiting for insight consolidation.

use anyhow::Result;
use clap::Args;
use console::{Style, style};

use super::{Context, print_header, truncate};

/// Arguments for the pending command.
#[derive(Args, Debug)]
pub struct PendingArgs {
    /// Maximum details to list
    #[arg(short, long, default_value = "25")]
    pub limit: usize,
}

/// Run the pending command.
pub async fn run(args: PendingArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store().await?;
    let details = store.list_pending_details(args.limit).await?;
    if ctx.json_output {
        return ctx.print_json(&details);
    }

    let dim = Style::new().dim();
    if details.is_empty() {
        println!("{}", dim.apply_to("No pending details"));
        return Ok(());
    }

    print_header("Pending Details");
    for detail in &details {
        println!("{} {}", style(&detail.id).cyan(), truncate(&detail.text, 60));
        if ctx.verbose {
            println!("   {}", dim.apply_to(format!("source: {}", detail.source)));
        }
    }
    Ok(())
}
