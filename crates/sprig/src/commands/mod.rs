//! CLI command handlers.

pub mod init;
pub mod insights;
pub mod pending;
pub mod recall;
pub mod remember;
pub mod status;
pub mod topics;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use console::Style;

use sprig_agent::{Reasoner, ReasonerConfig, ToolLoopReasoner};
use sprig_config::SprigConfig;
use sprig_llm::{EmbedderSpec, OpenAiBackend, OpenAiConfig, SharedEmbedder};
use sprig_memory::{AgeBackend, GraphStore, QueryExecutor, RetrievalConfig};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Resolved configuration (files + environment).
    pub config: SprigConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Connect to the configured database and make sure the graph exists.
    pub async fn open_store(&self) -> Result<Arc<GraphStore>> {
        let database = self.config.database();
        let url = database.require_url()?;

        let backend = AgeBackend::connect(url)
            .await
            .context("Failed to connect to the graph database")?;
        let store = GraphStore::new(QueryExecutor::new(Arc::new(backend)), database.graph);
        store.ensure_graph().await?;
        Ok(Arc::new(store))
    }

    pub fn embedder(&self) -> Result<SharedEmbedder> {
        let embedding = self.config.embedding();
        let spec = EmbedderSpec {
            service_url: embedding.service_url,
            dimensions: embedding.dimensions,
            timeout: Duration::from_secs(embedding.timeout_secs),
        };
        Ok(sprig_llm::build_embedder(&spec)?)
    }

    /// Build the tool-calling reasoner. Requires an API key.
    pub fn reasoner(&self) -> Result<Arc<dyn Reasoner>> {
        let llm = self.config.llm();
        let mut backend_config = OpenAiConfig::openai(llm.require_api_key()?).with_model(&llm.model);
        if let Some(base_url) = &llm.base_url {
            backend_config = backend_config.with_base_url(base_url);
        }
        let backend = OpenAiBackend::new(backend_config)?;

        let reasoner_config = ReasonerConfig {
            model: llm.model,
            max_tokens: llm.max_tokens,
            max_iterations: llm.max_iterations,
            system_prompt: None,
        };
        Ok(Arc::new(ToolLoopReasoner::new(Arc::new(backend), reasoner_config)))
    }

    pub fn retrieval_config(&self) -> RetrievalConfig {
        let retrieval = self.config.retrieval();
        RetrievalConfig {
            min_score: retrieval.min_score,
            candidate_multiplier: retrieval.candidate_multiplier,
        }
    }

    /// Print a JSON value for `--json` output.
    pub fn print_json<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// Section header used by the human-readable output.
pub fn print_header(title: &str) {
    let dim = Style::new().dim();
    println!("{}", console::style(title).bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    println!();
}

/// Shorten `s` to at most `max` characters, marking the cut.
pub fn truncate(s: &str, max: usize) -> String {
    let single_line = s.replace('\n', " ");
    if single_line.chars().count() <= max {
        single_line
    } else {
        let cut: String = single_line.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
