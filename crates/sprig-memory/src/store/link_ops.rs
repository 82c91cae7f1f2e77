//! Edge writes and edge-label priming.

use serde_json::json;
use tracing::debug;

use super::GraphStore;
use crate::error::Result;
use crate::query::{QueryKind, Statement};
use crate::types::RelationType;

impl GraphStore {
    /// Make sure the store knows the edge label before the first real write.
    ///
    /// Concurrent first writers of a new edge label race on creating its
    /// backing table. Priming runs a statement that registers the label
    /// without touching data. Failures are swallowed: the real write that
    /// follows reports anything genuine. Each label is primed at most once
    /// per store; concurrent callers wait for the priming in flight.
    pub async fn ensure_edge_label(&self, rel: RelationType) {
        let mut primed = self.primed.lock().await;
        if primed.contains(&rel) {
            return;
        }

        if let Err(e) = self.run(Statement::bare(QueryKind::PrimeEdge(rel))).await {
            debug!(relation = %rel, error = %e, "Edge label priming failed, continuing");
        }
        primed.insert(rel);
    }

    async fn link(&self, rel: RelationType, from_id: &str, to_id: &str) -> Result<bool> {
        self.ensure_edge_label(rel).await;
        let rows = self
            .run(Statement::new(
                QueryKind::Link(rel),
                json!({"from_id": from_id, "to_id": to_id}),
            ))
            .await?;
        Ok(!rows.is_empty())
    }

    /// Link `Domain -[HAS_TOPIC]-> Topic`. False if either end is missing.
    pub async fn link_topic_to_domain(&self, topic_id: &str, domain_id: &str) -> Result<bool> {
        self.link(RelationType::HasTopic, domain_id, topic_id).await
    }

    /// Link `Topic -[HAS_DETAIL]-> Detail`. False if either end is missing.
    pub async fn link_detail_to_topic(&self, detail_id: &str, topic_id: &str) -> Result<bool> {
        self.link(RelationType::HasDetail, topic_id, detail_id).await
    }

    /// Link `Topic -[HAS_INSIGHT]-> Insight`. False if either end is missing.
    pub async fn link_insight_to_topic(&self, insight_id: &str, topic_id: &str) -> Result<bool> {
        self.link(RelationType::HasInsight, topic_id, insight_id).await
    }

    /// Link `Insight -[SUPPORTS_DETAIL]-> Detail`. False if either end is missing.
    pub async fn link_insight_to_detail(&self, insight_id: &str, detail_id: &str) -> Result<bool> {
        self.link(RelationType::SupportsDetail, insight_id, detail_id).await
    }
}
