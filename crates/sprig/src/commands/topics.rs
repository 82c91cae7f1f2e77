//! Topics command - list topics with their domains.

use anyhow::Result;
use clap::Args;
use console::{Style, style};

use super::{Context, print_header, truncate};

/// Arguments for the topics command.
#[derive(Args, Debug)]
pub struct TopicsArgs {
    /// Maximum topics to list
    #[arg(short, long, default_value = "50")]
    pub limit: usize,
}

/// Run the topics command.
pub async fn run(args: TopicsArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store().await?;
    let topics = store.list_topics(args.limit).await?;
    if ctx.json_output {
        return ctx.print_json(&topics);
    }

    let dim = Style::new().dim();
    if topics.is_empty() {
        println!("{}", dim.apply_to("No topics yet"));
        return Ok(());
    }

    print_header("Topics");
    for (i, summary) in topics.iter().enumerate() {
        println!("{}. {}", style(i + 1).cyan(), truncate(&summary.topic.text, 70));
        if !summary.domains.is_empty() {
            println!("   {}", dim.apply_to(summary.domains.join(", ")));
        }
    }
    Ok(())
}
