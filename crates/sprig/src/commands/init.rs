//! Init command - create the memory graph.

use anyhow::Result;
use clap::Args;
use console::Style;
use serde::Serialize;

use super::Context;

/// Arguments for the init command.
#[derive(Args, Debug)]
pub struct InitArgs {}

#[derive(Debug, Serialize)]
struct InitOutput {
    graph: String,
    ready: bool,
}

/// Run the init command.
pub async fn run(_args: InitArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store().await?;

    if ctx.json_output {
        return ctx.print_json(&InitOutput {
            graph: store.graph_name().to_string(),
            ready: true,
        });
    }

    let green = Style::new().green();
    println!(
        "{} Graph '{}' is ready",
        green.apply_to("✓"),
        store.graph_name()
    );
    Ok(())
}
