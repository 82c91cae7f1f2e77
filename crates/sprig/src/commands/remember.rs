//! Remember command - store a detail in the memory graph.

use anyhow::Result;
use clap::Args;
use console::{Style, style};

use sprig_agent::UpdateWorkflow;

use super::Context;

/// Arguments for the remember command.
#[derive(Args, Debug)]
pub struct RememberArgs {
    /// The detail to remember
    pub text: String,

    /// Where the detail came from
    #[arg(short, long, default_value = "cli")]
    pub source: String,

    /// Let the reasoner place the detail with graph tools instead of a
    /// single classification
    #[arg(long)]
    pub negotiate: bool,
}

/// Run the remember command.
pub async fn run(args: RememberArgs, ctx: &Context) -> Result<()> {
    let text = args.text.trim();
    if text.is_empty() {
        anyhow::bail!("Nothing to remember: the detail text is empty");
    }

    let reasoner = ctx.reasoner()?;
    let embedder = ctx.embedder()?;
    let store = ctx.open_store().await?;
    let workflow = UpdateWorkflow::new(store, embedder, reasoner);

    let dim = Style::new().dim();
    let green = Style::new().green();

    if args.negotiate {
        let placement = workflow.negotiate(text, &args.source).await?;
        if ctx.json_output {
            return ctx.print_json(&placement);
        }

        println!("{} Remembered detail {}", green.apply_to("✓"), style(&placement.detail.id).cyan());
        for topic in &placement.topics {
            println!("  {} {}", dim.apply_to("Topic:"), topic.text);
        }
        for domain in &placement.domains {
            println!("  {} {}", dim.apply_to("Domain:"), domain.label);
        }
        if placement.used_fallback {
            println!("  {}", dim.apply_to("(placed under the fallback topic)"));
        }
        if ctx.verbose && !placement.response.is_empty() {
            println!();
            println!("{}", dim.apply_to(&placement.response));
        }
        return Ok(());
    }

    let result = workflow.remember(text, &args.source).await?;
    if ctx.json_output {
        return ctx.print_json(&result);
    }

    println!("{} Remembered detail {}", green.apply_to("✓"), style(&result.detail.id).cyan());
    println!("  {} {}", dim.apply_to("Topic:"), result.topic.text);
    println!("  {} {}", dim.apply_to("Domain:"), result.domain.label);
    Ok(())
}
