//! Batch insight consolidation over pending details.
//!
//! Each pending detail gets one reasoner run with the insight toolset. The
//! detail is marked processed after the attempt whether it succeeded or not,
//! so a detail that keeps failing cannot block the queue.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sprig_llm::SharedEmbedder;
use sprig_memory::{Detail, GraphStore};
use tracing::{info, warn};

use crate::error::{AgentError, Result};
use crate::prompt::insight_prompt;
use crate::reasoner::Reasoner;
use crate::tool::{MemoryToolbox, Toolset};

/// Pending details taken per batch unless told otherwise.
pub const DEFAULT_BATCH_LIMIT: usize = 25;

/// What happened to one detail in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailOutcome {
    pub detail_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one consolidation batch. `processed + errors` equals the
/// number of details taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightBatchSummary {
    pub processed: usize,
    pub errors: usize,
    pub details: Vec<DetailOutcome>,
}

/// Drives insight extraction for pending details.
pub struct InsightPipeline {
    store: Arc<GraphStore>,
    embedder: SharedEmbedder,
    reasoner: Arc<dyn Reasoner>,
}

impl InsightPipeline {
    pub fn new(
        store: Arc<GraphStore>,
        embedder: SharedEmbedder,
        reasoner: Arc<dyn Reasoner>,
    ) -> Self {
        Self {
            store,
            embedder,
            reasoner,
        }
    }

    /// Process up to `limit` pending details, oldest first.
    ///
    /// Only listing the pending details can fail the batch; per-detail
    /// failures are recorded in the summary.
    pub async fn run(&self, limit: usize) -> Result<InsightBatchSummary> {
        let pending = self.store.list_pending_details(limit).await?;
        info!(pending = pending.len(), limit, "Starting insight batch");

        let toolbox = MemoryToolbox::new(self.store.clone(), self.embedder.clone(), Toolset::Insights);
        let mut summary = InsightBatchSummary::default();

        for detail in pending {
            let outcome = match self.process(&detail, &toolbox).await {
                Ok(response) => {
                    summary.processed += 1;
                    DetailOutcome {
                        detail_id: detail.id.clone(),
                        response: Some(response),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(detail_id = %detail.id, error = %e, "Insight extraction failed");
                    summary.errors += 1;
                    DetailOutcome {
                        detail_id: detail.id.clone(),
                        response: None,
                        error: Some(e.to_string()),
                    }
                }
            };

            if let Err(e) = self.store.mark_detail_processed(&detail.id).await {
                warn!(detail_id = %detail.id, error = %e, "Failed to mark detail processed");
            }
            summary.details.push(outcome);
        }

        info!(
            processed = summary.processed,
            errors = summary.errors,
            "Insight batch finished"
        );
        Ok(summary)
    }

    async fn process(&self, detail: &Detail, toolbox: &MemoryToolbox) -> Result<String> {
        let context = self
            .store
            .get_detail_context(&detail.id)
            .await?
            .ok_or_else(|| AgentError::DetailNotFound(detail.id.clone()))?;
        let topic_ids: Vec<String> = context.topics.iter().map(|t| t.id.clone()).collect();
        let insights = self.store.list_insights_for_topics(&topic_ids).await?;

        let prompt = insight_prompt(&context, &insights);
        self.reasoner.run(&prompt, toolbox).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use sprig_llm::MockBackend;
    use sprig_memory::ClusterInsert;

    use super::*;
    use crate::reasoner::{ReasonerConfig, ToolLoopReasoner};
    use crate::test_support::{ScriptedReasoner, Step, memory_store};

    #[tokio::test]
    async fn test_batch_attaches_insights_and_drains_queue() {
        let (store, embedder) = memory_store();
        let inserted = store
            .insert_cluster_topic_detail(ClusterInsert::new("Food", "ramen", "ate ramen", "chat"))
            .await
            .unwrap();

        let reasoner = Arc::new(ScriptedReasoner::new(vec![
            Step::new("create_insight", json!({"text": "Enjoys Japanese noodle dishes"})),
            Step::new(
                "link_insight_topic",
                json!({"insight_id": "$0.id", "topic_id": inserted.topic.id}),
            ),
            Step::new(
                "link_insight_detail",
                json!({"insight_id": "$0.id", "detail_id": "ate ramen"}),
            ),
        ]));
        let pipeline = InsightPipeline::new(store.clone(), embedder, reasoner.clone());

        let summary = pipeline.run(DEFAULT_BATCH_LIMIT).await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.errors, 0);
        assert_eq!(summary.details[0].detail_id, inserted.detail.id);
        assert!(reasoner.results().iter().all(|r| !r.is_error()));

        let insights = store.list_insights_for_topic(&inserted.topic.id).await.unwrap();
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].text, "Enjoys Japanese noodle dishes");
        assert!(store.list_pending_details(10).await.unwrap().is_empty());

        // Prompt carries the context ids.
        let prompt = &reasoner.prompts()[0];
        assert!(prompt.contains(&inserted.detail.id));
        assert!(prompt.contains(&format!("{}: ramen", inserted.topic.id)));
    }

    #[tokio::test]
    async fn test_failures_are_counted_and_still_marked() {
        let (store, embedder) = memory_store();
        for text in ["first note", "fails here", "third note"] {
            store
                .insert_cluster_topic_detail(ClusterInsert::new("Misc", "notes", text, "chat"))
                .await
                .unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let reasoner = Arc::new(ScriptedReasoner::new(vec![]).failing_on("fails here"));
        let pipeline = InsightPipeline::new(store.clone(), embedder, reasoner);

        let summary = pipeline.run(10).await.unwrap();
        assert_eq!(summary.processed + summary.errors, 3);
        assert_eq!(summary.errors, 1);
        assert!(summary.details[1].error.is_some());
        assert!(summary.details[0].response.is_some());
        assert!(store.list_pending_details(10).await.unwrap().is_empty());

        // A second run has nothing left to do.
        let again = pipeline.run(10).await.unwrap();
        assert_eq!(again, InsightBatchSummary::default());
    }

    #[tokio::test]
    async fn test_respects_limit() {
        let (store, embedder) = memory_store();
        for i in 0..3 {
            store
                .create_detail(&format!("note {i}"), "chat", None)
                .await
                .unwrap();
        }
        let pipeline = InsightPipeline::new(
            store.clone(),
            embedder,
            Arc::new(ScriptedReasoner::new(vec![])),
        );

        let summary = pipeline.run(2).await.unwrap();
        assert_eq!(summary.details.len(), 2);
        assert_eq!(store.list_pending_details(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_llm_failure_degrades_to_recorded_error() {
        let (store, embedder) = memory_store();
        store.create_detail("orphan note", "chat", None).await.unwrap();

        // No scripted responses: every completion fails.
        let backend = Arc::new(MockBackend::new(vec![]));
        let reasoner = Arc::new(ToolLoopReasoner::new(backend, ReasonerConfig::default()));
        let pipeline = InsightPipeline::new(store.clone(), embedder, reasoner);

        let summary = pipeline.run(DEFAULT_BATCH_LIMIT).await.unwrap();
        assert_eq!(summary.errors, 1);
        assert!(summary.details[0].error.as_deref().unwrap().contains("LLM error"));
        assert!(store.list_pending_details(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_end_to_end_with_mock_backend() {
        let (store, embedder) = memory_store();
        let inserted = store
            .insert_cluster_topic_detail(ClusterInsert::new("Food", "tea", "drank oolong", "chat"))
            .await
            .unwrap();

        let backend = Arc::new(MockBackend::new(vec![
            MockBackend::tool_response(
                "call_1",
                "mark_detail_processed",
                json!({"detail_id": inserted.detail.id}),
            ),
            MockBackend::text_response("Linked and processed."),
        ]));
        let reasoner = Arc::new(ToolLoopReasoner::new(backend.clone(), ReasonerConfig::default()));
        let pipeline = InsightPipeline::new(store.clone(), embedder, reasoner);

        let summary = pipeline.run(DEFAULT_BATCH_LIMIT).await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.details[0].response.as_deref(), Some("Linked and processed."));
        assert_eq!(backend.requests()[0].tools.len(), Toolset::Insights.tool_names().len());
    }
}
