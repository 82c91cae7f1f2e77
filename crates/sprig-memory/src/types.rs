//! Core types for the memory graph.
//!
//! Four node kinds form the hierarchy `Domain -> Topic -> Detail`, with
//! `Insight` nodes distilled from details and attached to topics.
//! Embeddings travel with the entities inside this crate but are never
//! serialized back out to callers.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers and timestamps
// ─────────────────────────────────────────────────────────────────────────────

/// Generate a fresh opaque node id.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Current time in the fixed-width form stored on nodes.
///
/// Fixed microsecond precision keeps lexical order equal to time order.
pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn default_true() -> bool {
    true
}

/// Label used when classification yields nothing usable.
pub const GENERAL_DOMAIN: &str = "General";

/// Normalize a domain label: trim, collapse internal whitespace and
/// capitalize the first character. Empty input becomes [`GENERAL_DOMAIN`].
pub fn normalize_domain_label(label: &str) -> String {
    let collapsed = label.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => GENERAL_DOMAIN.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entities
// ─────────────────────────────────────────────────────────────────────────────

/// Broadest memory category, unique per normalized label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    #[serde(default)]
    pub id: String,
    pub label: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Mid-level grouping of details, unique per exact text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    #[serde(default)]
    pub id: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub(crate) embedding: Option<Vec<f32>>,
}

/// A single remembered observation. Never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detail {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub source: String,
    pub created_at: Option<DateTime<Utc>>,
    /// Absent on legacy nodes, which count as pending.
    #[serde(default = "default_true")]
    pub insight_pending: bool,
    #[serde(default)]
    pub insight_processed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub(crate) embedding: Option<Vec<f32>>,
}

/// A reusable generalization attached to topics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub(crate) embedding: Option<Vec<f32>>,
}

impl Topic {
    /// Whether the topic carries an embedding.
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

impl Detail {
    /// Whether the detail carries an embedding.
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Relationships
// ─────────────────────────────────────────────────────────────────────────────

/// Node labels in the memory graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    Domain,
    Topic,
    Detail,
    Insight,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domain => "Domain",
            Self::Topic => "Topic",
            Self::Detail => "Detail",
            Self::Insight => "Insight",
        }
    }
}

/// Directed relationship types between memory nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    /// Domain -> Topic.
    HasTopic,
    /// Topic -> Detail.
    HasDetail,
    /// Topic -> Insight.
    HasInsight,
    /// Insight -> Detail.
    SupportsDetail,
}

impl RelationType {
    /// All relation types, in hierarchy order.
    pub const ALL: [RelationType; 4] = [
        Self::HasTopic,
        Self::HasDetail,
        Self::HasInsight,
        Self::SupportsDetail,
    ];

    /// Get the string representation used as the edge label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HasTopic => "HAS_TOPIC",
            Self::HasDetail => "HAS_DETAIL",
            Self::HasInsight => "HAS_INSIGHT",
            Self::SupportsDetail => "SUPPORTS_DETAIL",
        }
    }

    /// Labels of the (source, target) endpoints.
    pub fn endpoints(&self) -> (NodeLabel, NodeLabel) {
        match self {
            Self::HasTopic => (NodeLabel::Domain, NodeLabel::Topic),
            Self::HasDetail => (NodeLabel::Topic, NodeLabel::Detail),
            Self::HasInsight => (NodeLabel::Topic, NodeLabel::Insight),
            Self::SupportsDetail => (NodeLabel::Insight, NodeLabel::Detail),
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Composite results
// ─────────────────────────────────────────────────────────────────────────────

/// Input for the single-shot Domain -> Topic -> Detail write.
#[derive(Debug, Clone)]
pub struct ClusterInsert {
    pub domain_label: String,
    pub topic_text: String,
    pub detail_text: String,
    pub source: String,
    pub topic_embedding: Option<Vec<f32>>,
    pub detail_embedding: Option<Vec<f32>>,
}

impl ClusterInsert {
    pub fn new(
        domain_label: impl Into<String>,
        topic_text: impl Into<String>,
        detail_text: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            domain_label: domain_label.into(),
            topic_text: topic_text.into(),
            detail_text: detail_text.into(),
            source: source.into(),
            topic_embedding: None,
            detail_embedding: None,
        }
    }

    /// Attach embeddings for the topic and the detail.
    pub fn with_embeddings(mut self, topic: Vec<f32>, detail: Vec<f32>) -> Self {
        self.topic_embedding = Some(topic);
        self.detail_embedding = Some(detail);
        self
    }
}

/// Nodes touched by a single-shot insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInsertResult {
    pub domain: Domain,
    pub topic: Topic,
    pub detail: Detail,
}

/// A topic with the labels of the domains it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSummary {
    pub topic: Topic,
    #[serde(default)]
    pub domains: Vec<String>,
}

/// A detail with the topics and domains it hangs under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailContext {
    pub detail: Detail,
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub domains: Vec<Domain>,
}

/// A lexical match: one (domain, topic) pair and the matching details under it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub domain: Domain,
    pub topic: Topic,
    #[serde(default)]
    pub details: Vec<Detail>,
}

impl Candidate {
    /// Grouping key: domain id (or label) and topic id (or text).
    pub fn key(&self) -> (String, String) {
        let domain = if self.domain.id.is_empty() {
            &self.domain.label
        } else {
            &self.domain.id
        };
        let topic = if self.topic.id.is_empty() {
            &self.topic.text
        } else {
            &self.topic.id
        };
        (domain.clone(), topic.clone())
    }
}

/// A scored retrieval result with the topic's insights attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub domain: Domain,
    pub topic: Topic,
    pub details: Vec<Detail>,
    pub insights: Vec<Insight>,
    pub score: f32,
}

/// Node and edge counts by label.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub nodes: BTreeMap<String, u64>,
    pub edges: BTreeMap<String, u64>,
}

impl StoreStats {
    pub fn node_count(&self, label: NodeLabel) -> u64 {
        self.nodes.get(label.as_str()).copied().unwrap_or(0)
    }

    pub fn edge_count(&self, rel: RelationType) -> u64 {
        self.edges.get(rel.as_str()).copied().unwrap_or(0)
    }
}
