//! Status command - graph statistics.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;
use tracing::debug;

use sprig_llm::{Embedder, EmbeddingServiceClient};
use sprig_memory::{NodeLabel, RelationType, StoreStats};

use super::{Context, print_header};

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {}

/// Status response for JSON output.
#[derive(Debug, Serialize)]
struct StatusOutput {
    graph: String,
    embedder: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    embedding_service: Option<&'static str>,
    stats: StoreStats,
}

const NODE_LABELS: [NodeLabel; 4] = [
    NodeLabel::Domain,
    NodeLabel::Topic,
    NodeLabel::Detail,
    NodeLabel::Insight,
];

/// Run the status command.
pub async fn run(_args: StatusArgs, ctx: &Context) -> Result<()> {
    let embedder = ctx.embedder()?;
    let service = embedding_service_state(ctx).await?;
    let store = ctx.open_store().await?;
    let stats = store.stats().await?;

    if ctx.json_output {
        return ctx.print_json(&StatusOutput {
            graph: store.graph_name().to_string(),
            embedder: embedder.name().to_string(),
            embedding_service: service,
            stats,
        });
    }

    let dim = Style::new().dim();
    print_header("Sprig Memory Status");
    println!("  {} {}", dim.apply_to("Graph:   "), store.graph_name());
    println!("  {} {}", dim.apply_to("Embedder:"), embedder.name());
    if let Some(state) = service {
        let state = match state {
            "up" => style(state).green(),
            _ => style(state).red(),
        };
        println!("  {} {}", dim.apply_to("Service: "), state);
    }
    println!();

    println!("{}", style("Nodes").bold());
    for label in NODE_LABELS {
        println!("  {:<10} {}", label.as_str(), style(stats.node_count(label)).cyan());
    }
    println!();

    println!("{}", style("Relations").bold());
    for rel in RelationType::ALL {
        println!("  {:<22} {}", rel.as_str(), style(stats.edge_count(rel)).cyan());
    }
    println!();
    Ok(())
}

/// Reachability of the configured embedding service; `None` when running local only.
async fn embedding_service_state(ctx: &Context) -> Result<Option<&'static str>> {
    let embedding = ctx.config.embedding();
    let Some(url) = embedding
        .service_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
    else {
        return Ok(None);
    };

    let client = EmbeddingServiceClient::new(
        url,
        Duration::from_secs(embedding.timeout_secs),
        embedding.dimensions,
    )?;
    let state = match client.health().await {
        Ok(true) => "up",
        Ok(false) => "unhealthy",
        Err(e) => {
            debug!(service = %url, error = %e, "Embedding service health check failed");
            "unreachable"
        }
    };
    Ok(Some(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprig_config::SprigConfig;

    fn ctx(config: SprigConfig) -> Context {
        Context {
            config,
            json_output: false,
            verbose: false,
        }
    }

    #[tokio::test]
    async fn test_no_service_configured() {
        let state = embedding_service_state(&ctx(SprigConfig::new())).await.unwrap();
        assert_eq!(state, None);
    }

    #[tokio::test]
    async fn test_unreachable_service_reported() {
        let config = SprigConfig::from_toml(
            "[embedding]\nservice_url = \"http://127.0.0.1:9\"\ntimeout_secs = 1\n",
        )
        .unwrap();
        let state = embedding_service_state(&ctx(config)).await.unwrap();
        assert_eq!(state, Some("unreachable"));
    }
}
