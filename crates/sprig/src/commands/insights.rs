//! Insights command - run one consolidation batch.

use anyhow::Result;
use clap::Args;
use console::{Style, style};

use sprig_agent::InsightPipeline;

use super::{Context, print_header, truncate};

/// Arguments for the insights command.
#[derive(Args, Debug)]
pub struct InsightsArgs {
    /// Maximum pending details to process (default from config)
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Run the insights command.
pub async fn run(args: InsightsArgs, ctx: &Context) -> Result<()> {
    let limit = args.limit.unwrap_or_else(|| ctx.config.insights().batch_limit);
    let reasoner = ctx.reasoner()?;
    let embedder = ctx.embedder()?;
    let store = ctx.open_store().await?;

    let summary = InsightPipeline::new(store, embedder, reasoner)
        .run(limit)
        .await?;
    if ctx.json_output {
        return ctx.print_json(&summary);
    }

    let dim = Style::new().dim();
    let red = Style::new().red();
    print_header("Insight Consolidation");
    println!("  Processed:  {}", style(summary.processed).cyan());
    println!("  Errors:     {}", style(summary.errors).cyan());
    if summary.details.is_empty() {
        println!();
        println!("{}", dim.apply_to("No pending details"));
        return Ok(());
    }

    println!();
    for outcome in &summary.details {
        match &outcome.error {
            Some(error) => println!("  {} {}: {}", red.apply_to("✗"), outcome.detail_id, error),
            None => {
                println!("  {} {}", Style::new().green().apply_to("✓"), outcome.detail_id);
                if ctx.verbose
                    && let Some(response) = &outcome.response
                {
                    println!("    {}", dim.apply_to(truncate(response, 70)));
                }
            }
        }
    }
    Ok(())
}
