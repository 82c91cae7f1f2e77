//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [database]
//! url = "postgres://localhost/sprig"
//! graph = "gmemory"
//!
//! [embedding]
//! service_url = "http://localhost:8765"
//! dimensions = 384
//!
//! [llm]
//! model = "gpt-4o-mini"
//!
//! [retrieval]
//! min_score = 0.35
//!
//! [insights]
//! batch_limit = 25
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Environment overrides
// ─────────────────────────────────────────────────────────────────────────────

pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const GRAPH_NAME_ENV: &str = "AGE_GRAPH_NAME";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_MODEL_ENV: &str = "OPENAI_MODEL";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const EMBEDDING_SERVICE_URL_ENV: &str = "EMBEDDING_SERVICE_URL";
pub const MIN_SCORE_ENV: &str = "SPRIG_MIN_SCORE";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. a project-local
/// override) can be loaded and merged. Use the accessors for effective values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SprigConfig {
    pub database: Option<DatabaseConfig>,
    pub embedding: Option<EmbeddingConfig>,
    pub llm: Option<LlmConfig>,
    pub retrieval: Option<RetrievalSection>,
    pub insights: Option<InsightsConfig>,
}

impl SprigConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole, not field by field.
    pub fn merge(&mut self, other: SprigConfig) {
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.embedding.is_some() {
            self.embedding = other.embedding;
        }
        if other.llm.is_some() {
            self.llm = other.llm;
        }
        if other.retrieval.is_some() {
            self.retrieval = other.retrieval;
        }
        if other.insights.is_some() {
            self.insights = other.insights;
        }
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Blank values are ignored. Returns a warning for each value that
    /// could not be used.
    pub fn apply_env<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut warnings = Vec::new();

        if let Some(url) = get(DATABASE_URL_ENV) {
            self.database.get_or_insert_with(Default::default).url = Some(url);
        }
        if let Some(graph) = get(GRAPH_NAME_ENV) {
            self.database.get_or_insert_with(Default::default).graph = graph;
        }
        if let Some(key) = get(OPENAI_API_KEY_ENV) {
            self.llm.get_or_insert_with(Default::default).api_key = Some(key);
        }
        if let Some(model) = get(OPENAI_MODEL_ENV) {
            self.llm.get_or_insert_with(Default::default).model = model;
        }
        if let Some(base_url) = get(OPENAI_BASE_URL_ENV) {
            self.llm.get_or_insert_with(Default::default).base_url = Some(base_url);
        }
        if let Some(url) = get(EMBEDDING_SERVICE_URL_ENV) {
            self.embedding.get_or_insert_with(Default::default).service_url = Some(url);
        }
        if let Some(raw) = get(MIN_SCORE_ENV) {
            match raw.parse::<f32>() {
                Ok(score) => {
                    self.retrieval.get_or_insert_with(Default::default).min_score = score;
                }
                Err(_) => warnings.push(format!("Ignoring {MIN_SCORE_ENV}={raw}: not a number")),
            }
        }
        warnings
    }

    pub fn database(&self) -> DatabaseConfig {
        self.database.clone().unwrap_or_default()
    }

    pub fn embedding(&self) -> EmbeddingConfig {
        self.embedding.clone().unwrap_or_default()
    }

    pub fn llm(&self) -> LlmConfig {
        self.llm.clone().unwrap_or_default()
    }

    pub fn retrieval(&self) -> RetrievalSection {
        self.retrieval.clone().unwrap_or_default()
    }

    pub fn insights(&self) -> InsightsConfig {
        self.insights.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Graph database connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL URL. Usually supplied via `DATABASE_URL`.
    pub url: Option<String>,
    /// AGE graph name.
    pub graph: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            graph: "gmemory".to_string(),
        }
    }
}

impl DatabaseConfig {
    /// The database URL, or `MissingField` if none is configured.
    pub fn require_url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .ok_or_else(|| ConfigError::missing("url", "[database] (or DATABASE_URL)"))
    }
}

/// Embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Remote embedding service; local embeddings when unset.
    pub service_url: Option<String>,
    pub dimensions: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            service_url: None,
            dimensions: 384,
            timeout_secs: 10,
        }
    }
}

/// Reasoner model settings (OpenAI-compatible endpoint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: Option<String>,
    /// API key. Prefer `OPENAI_API_KEY` over storing it in a file.
    pub api_key: Option<String>,
    /// Bound on tool-calling rounds per run.
    pub max_iterations: u32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: None,
            max_iterations: 12,
            max_tokens: 1024,
        }
    }
}

impl LlmConfig {
    /// The API key, or `MissingField` if none is configured.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ConfigError::missing("api_key", "[llm] (or OPENAI_API_KEY)"))
    }
}

/// Retrieval tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    /// Minimum cosine score for a result (0.0-1.0).
    pub min_score: f32,
    /// Default number of results.
    pub top_k: usize,
    /// Lexical candidates fetched per requested result.
    pub candidate_multiplier: usize,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            min_score: 0.35,
            top_k: 5,
            candidate_multiplier: 10,
        }
    }
}

/// Insight consolidation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsConfig {
    /// Pending details taken per batch.
    pub batch_limit: usize,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self { batch_limit: 25 }
    }
}
