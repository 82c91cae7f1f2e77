//! Recall command - retrieve memories for a query.

use anyhow::Result;
use clap::Args;
use console::Style;

use sprig_memory::{RetrievalEngine, recall_text};

use super::Context;

/// Arguments for the recall command.
#[derive(Args, Debug)]
pub struct RecallArgs {
    /// What to look for
    pub query: String,

    /// Maximum number of topic groups to return (default from config)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,
}

/// Run the recall command.
pub async fn run(args: RecallArgs, ctx: &Context) -> Result<()> {
    let top_k = args.top_k.unwrap_or_else(|| ctx.config.retrieval().top_k);
    let embedder = ctx.embedder()?;
    let store = ctx.open_store().await?;
    let engine = RetrievalEngine::new(store, embedder).with_config(ctx.retrieval_config());

    if ctx.verbose {
        let dim = Style::new().dim();
        eprintln!(
            "{}",
            dim.apply_to(format!(
                "Recalling: \"{}\" (top_k: {}, min_score: {})",
                args.query,
                top_k,
                engine.config().min_score
            ))
        );
    }

    let records = engine.retrieve(&args.query, top_k).await?;
    if ctx.json_output {
        return ctx.print_json(&records);
    }

    println!("{}", recall_text(&records));
    Ok(())
}
