//! Two-stage retrieval: lexical candidates, then embedding rerank.
//!
//! ```text
//! query ──► expand_query ──► lexical_candidates ──► group_candidates
//!                                                        │
//!             embed(query) ──► max cosine(topic, details) ▼
//!                                   threshold ─► stable sort ─► top_k
//!                                                        │
//!                                         attach insights ▼
//!                                                  MemoryRecord
//! ```

mod expand;
mod format;

pub use expand::expand_query;
pub use format::{NO_RELEVANT_MEMORY, format_results, recall_text};

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sprig_llm::{SharedEmbedder, cosine_similarity};
use tracing::debug;

use crate::error::Result;
use crate::store::GraphStore;
use crate::types::{Candidate, MemoryRecord};

/// Merge raw candidate rows that share a (domain, topic) key.
///
/// Groups keep the order in which their key first appeared; details are
/// concatenated without repeating an id.
pub fn group_candidates(rows: Vec<Candidate>) -> Vec<Candidate> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut groups: Vec<Candidate> = Vec::new();

    for row in rows {
        match index.get(&row.key()) {
            Some(&idx) => {
                let group = &mut groups[idx];
                for detail in row.details {
                    if !group.details.iter().any(|d| d.id == detail.id) {
                        group.details.push(detail);
                    }
                }
            }
            None => {
                index.insert(row.key(), groups.len());
                groups.push(row);
            }
        }
    }
    groups
}

/// Tuning knobs for the rerank stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates scoring below this are dropped.
    pub min_score: f32,
    /// Lexical candidates fetched per requested result.
    pub candidate_multiplier: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_score: 0.35,
            candidate_multiplier: 10,
        }
    }
}

/// Retrieval over a graph store with an embedding provider.
pub struct RetrievalEngine {
    store: Arc<GraphStore>,
    embedder: SharedEmbedder,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(store: Arc<GraphStore>, embedder: SharedEmbedder) -> Self {
        Self {
            store,
            embedder,
            config: RetrievalConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Best-matching records for `query`, highest score first.
    ///
    /// Every returned record scores at least `min_score`; equal scores keep
    /// candidate order. Each record carries its topic's insights.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<MemoryRecord>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let limit = top_k.saturating_mul(self.config.candidate_multiplier.max(1));
        let candidates = self.store.retrieve(query, limit).await?;
        if candidates.is_empty() {
            debug!(query, "No lexical candidates");
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;
        let total = candidates.len();

        let mut scored: Vec<(f32, Candidate)> = candidates
            .into_iter()
            .map(|c| (score_candidate(&query_embedding, &c), c))
            .filter(|(score, _)| *score >= self.config.min_score)
            .collect();
        // sort_by is stable, so ties keep candidate order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(top_k);

        debug!(
            query,
            candidates = total,
            kept = scored.len(),
            min_score = self.config.min_score,
            "Reranked candidates"
        );

        let topic_ids: Vec<String> = scored
            .iter()
            .map(|(_, c)| c.topic.id.clone())
            .filter(|id| !id.is_empty())
            .collect();
        let mut insights = self.store.insights_by_topic(&topic_ids).await?;

        Ok(scored
            .into_iter()
            .map(|(score, c)| MemoryRecord {
                insights: insights.remove(&c.topic.id).unwrap_or_default(),
                domain: c.domain,
                topic: c.topic,
                details: c.details,
                score,
            })
            .collect())
    }

    /// Formatted results, or [`NO_RELEVANT_MEMORY`] when nothing qualifies.
    pub async fn recall(&self, query: &str, top_k: usize) -> Result<String> {
        let records = self.retrieve(query, top_k).await?;
        Ok(recall_text(&records))
    }
}

/// Max cosine similarity against the topic and each detail; missing
/// embeddings contribute 0.
fn score_candidate(query: &[f32], candidate: &Candidate) -> f32 {
    let topic = candidate.topic.embedding.as_deref().map(|e| cosine_similarity(query, e));
    let details = candidate
        .details
        .iter()
        .filter_map(|d| d.embedding.as_deref())
        .map(|e| cosine_similarity(query, e));

    topic.into_iter().chain(details).fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;
    use sprig_llm::{Embedder, LocalEmbedder};

    use super::*;
    use crate::store::test_support::memory_store;
    use crate::types::ClusterInsert;

    /// Returns the same vector for every query.
    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> sprig_llm::Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn dimensions(&self) -> usize {
            self.0.len()
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn engine_with(embedder: SharedEmbedder) -> (Arc<GraphStore>, RetrievalEngine) {
        let (_backend, store) = memory_store();
        let store = Arc::new(store);
        (store.clone(), RetrievalEngine::new(store, embedder))
    }

    #[tokio::test]
    async fn test_unit_test_scenario() {
        let local = LocalEmbedder::default();
        let (store, engine) = engine_with(Arc::new(local.clone()));
        store
            .insert_cluster_topic_detail(
                ClusterInsert::new("Testing", "unit test summary", "unit test detail", "cli")
                    .with_embeddings(
                        local.embed_sync("unit test summary"),
                        local.embed_sync("unit test detail"),
                    ),
            )
            .await
            .unwrap();

        let records = engine.retrieve("unit test", 5).await.unwrap();
        assert!(!records.is_empty());
        assert!(
            records
                .iter()
                .any(|r| r.details.iter().any(|d| d.text == "unit test detail"))
        );
        assert!(records[0].score >= 0.35);
    }

    #[tokio::test]
    async fn test_threshold_and_order() {
        let (store, engine) = engine_with(Arc::new(FixedEmbedder(vec![1.0, 0.0])));
        let insert = |topic: &str, topic_e: Vec<f32>, detail_e: Vec<f32>| {
            ClusterInsert::new("Food", topic, format!("{topic} note"), "chat")
                .with_embeddings(topic_e, detail_e)
        };
        // Scores: weak 0.6 via detail, strong 1.0 via topic, below 0.0.
        for ins in [
            insert("weak", vec![0.0, 1.0], vec![0.6, 0.8]),
            insert("strong", vec![1.0, 0.0], vec![0.0, 1.0]),
            insert("below", vec![0.0, 1.0], vec![0.0, 1.0]),
        ] {
            store.insert_cluster_topic_detail(ins).await.unwrap();
        }

        let records = engine.retrieve("food", 5).await.unwrap();
        let topics: Vec<&str> = records.iter().map(|r| r.topic.text.as_str()).collect();
        assert_eq!(topics, vec!["strong", "weak"]);
        assert!(records.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(records.iter().all(|r| r.score >= 0.35));

        let top_one = engine.retrieve("food", 1).await.unwrap();
        assert_eq!(top_one.len(), 1);
        assert_eq!(top_one[0].topic.text, "strong");
    }

    #[tokio::test]
    async fn test_ties_keep_candidate_order() {
        let (store, engine) = engine_with(Arc::new(FixedEmbedder(vec![1.0, 0.0])));
        for topic in ["alpha", "beta", "gamma"] {
            store
                .insert_cluster_topic_detail(
                    ClusterInsert::new("Food", topic, "same", "chat")
                        .with_embeddings(vec![1.0, 0.0], vec![1.0, 0.0]),
                )
                .await
                .unwrap();
        }

        let records = engine.retrieve("food", 5).await.unwrap();
        let topics: Vec<&str> = records.iter().map(|r| r.topic.text.as_str()).collect();
        assert_eq!(topics, vec!["alpha", "beta", "gamma"]);
    }

    #[tokio::test]
    async fn test_missing_embeddings_score_zero() {
        let (store, engine) = engine_with(Arc::new(FixedEmbedder(vec![1.0, 0.0])));
        store
            .insert_cluster_topic_detail(ClusterInsert::new("Food", "ramen", "ate ramen", "chat"))
            .await
            .unwrap();

        assert!(engine.retrieve("ramen", 5).await.unwrap().is_empty());

        let lenient = RetrievalEngine::new(store, Arc::new(FixedEmbedder(vec![1.0, 0.0])))
            .with_config(RetrievalConfig {
                min_score: 0.0,
                ..Default::default()
            });
        let records = lenient.retrieve("ramen", 5).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].score, 0.0);
    }

    #[tokio::test]
    async fn test_insights_are_attached() {
        let (store, engine) = engine_with(Arc::new(FixedEmbedder(vec![1.0, 0.0])));
        let inserted = store
            .insert_cluster_topic_detail(
                ClusterInsert::new("Food", "ramen", "ate ramen", "chat")
                    .with_embeddings(vec![1.0, 0.0], vec![1.0, 0.0]),
            )
            .await
            .unwrap();
        let insight = store.create_insight("Loves noodles", None).await.unwrap();
        store
            .link_insight_to_topic(&insight.id, &inserted.topic.id)
            .await
            .unwrap();

        let records = engine.retrieve("ramen", 5).await.unwrap();
        assert_eq!(records[0].insights.len(), 1);
        assert_eq!(records[0].insights[0].text, "Loves noodles");

        let text = engine.recall("ramen", 5).await.unwrap();
        assert!(text.starts_with("1. Detail: ate ramen"));
        assert!(text.contains("   Insights: Loves noodles"));
    }

    #[tokio::test]
    async fn test_recall_reports_no_memory() {
        let (_store, engine) = engine_with(Arc::new(FixedEmbedder(vec![1.0, 0.0])));
        assert_eq!(engine.recall("anything", 5).await.unwrap(), NO_RELEVANT_MEMORY);
        assert!(engine.retrieve("anything", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_topic_without_details_recalls_no_memory() {
        let (store, engine) = engine_with(Arc::new(FixedEmbedder(vec![1.0, 0.0])));
        let domain = store.create_domain("Hobbies").await.unwrap();
        let topic = store
            .create_topic("pottery", Some(vec![1.0, 0.0]))
            .await
            .unwrap();
        assert!(store.link_topic_to_domain(&topic.id, &domain.id).await.unwrap());

        let records = engine.retrieve("pottery", 5).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].details.is_empty());
        assert_eq!(engine.recall("pottery", 5).await.unwrap(), NO_RELEVANT_MEMORY);
    }

    #[test]
    fn test_group_candidates_merges_details_in_order() {
        let row = |topic: &str, detail: &str| -> Candidate {
            serde_json::from_value(json!({
                "domain": {"id": "d1", "label": "Food"},
                "topic": {"id": topic, "text": topic},
                "details": [{"id": detail, "text": detail}]
            }))
            .unwrap()
        };

        let groups = group_candidates(vec![
            row("t2", "a"),
            row("t1", "b"),
            row("t2", "c"),
            row("t2", "a"),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].topic.id, "t2");
        let ids: Vec<&str> = groups[0].details.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(groups[1].details.len(), 1);
    }
}
