//! Node writes: merges, creations and the single-shot cluster insert.

use serde_json::json;
use tracing::debug;

use super::GraphStore;
use crate::error::{MemoryError, Result};
use crate::query::{QueryKind, Statement};
use crate::types::{
    ClusterInsert, ClusterInsertResult, Detail, Domain, Insight, RelationType, Topic, new_id,
    normalize_domain_label, timestamp,
};

impl GraphStore {
    /// Merge a domain on its normalized label.
    ///
    /// An existing domain is returned unchanged, with its original id and
    /// creation time.
    pub async fn create_domain(&self, label: &str) -> Result<Domain> {
        let label = normalize_domain_label(label);
        let params = json!({"label": label, "id": new_id(), "created_at": timestamp()});
        self.fetch_optional(Statement::new(QueryKind::MergeDomain, params))
            .await?
            .ok_or_else(|| MemoryError::InvalidData(format!("merge returned no domain for {label:?}")))
    }

    /// Merge a topic on its exact text. The embedding is only set on creation.
    pub async fn create_topic(&self, text: &str, embedding: Option<Vec<f32>>) -> Result<Topic> {
        let params = json!({
            "text": text,
            "id": new_id(),
            "created_at": timestamp(),
            "embedding": embedding,
        });
        self.fetch_optional(Statement::new(QueryKind::MergeTopic, params))
            .await?
            .ok_or_else(|| MemoryError::InvalidData(format!("merge returned no topic for {text:?}")))
    }

    /// Create a new detail, pending insight processing.
    pub async fn create_detail(
        &self,
        text: &str,
        source: &str,
        embedding: Option<Vec<f32>>,
    ) -> Result<Detail> {
        let params = json!({
            "id": new_id(),
            "text": text,
            "source": source,
            "created_at": timestamp(),
            "embedding": embedding,
        });
        let detail: Option<Detail> = self
            .fetch_optional(Statement::new(QueryKind::CreateDetail, params))
            .await?;
        let detail =
            detail.ok_or_else(|| MemoryError::InvalidData("create returned no detail".to_string()))?;
        debug!(detail_id = %detail.id, "Created detail");
        Ok(detail)
    }

    /// Create a new insight.
    pub async fn create_insight(&self, text: &str, embedding: Option<Vec<f32>>) -> Result<Insight> {
        let params = json!({
            "id": new_id(),
            "text": text,
            "created_at": timestamp(),
            "embedding": embedding,
        });
        self.fetch_optional(Statement::new(QueryKind::CreateInsight, params))
            .await?
            .ok_or_else(|| MemoryError::InvalidData("create returned no insight".to_string()))
    }

    /// Replace an insight's text. Returns `None` if no such insight exists.
    pub async fn update_insight_text(&self, id: &str, text: &str) -> Result<Option<Insight>> {
        self.fetch_optional(Statement::new(
            QueryKind::UpdateInsightText,
            json!({"id": id, "text": text}),
        ))
        .await
    }

    /// Merge the domain and topic, create the detail and link all three in
    /// one transaction.
    pub async fn insert_cluster_topic_detail(
        &self,
        insert: ClusterInsert,
    ) -> Result<ClusterInsertResult> {
        self.ensure_edge_label(RelationType::HasTopic).await;
        self.ensure_edge_label(RelationType::HasDetail).await;

        let params = json!({
            "domain_label": normalize_domain_label(&insert.domain_label),
            "domain_id": new_id(),
            "topic_text": insert.topic_text,
            "topic_id": new_id(),
            "topic_embedding": insert.topic_embedding,
            "detail_id": new_id(),
            "detail_text": insert.detail_text,
            "detail_embedding": insert.detail_embedding,
            "source": insert.source,
            "created_at": timestamp(),
        });

        let result: ClusterInsertResult = self
            .fetch_optional(Statement::new(QueryKind::InsertClusterTopicDetail, params))
            .await?
            .ok_or_else(|| MemoryError::InvalidData("cluster insert returned no row".to_string()))?;

        debug!(
            domain = %result.domain.label,
            topic_id = %result.topic.id,
            detail_id = %result.detail.id,
            "Inserted domain/topic/detail"
        );
        Ok(result)
    }

    /// Flip a detail's pending flag to false.
    ///
    /// Returns true only for the call that performed the transition; a
    /// missing or already processed detail yields false.
    pub async fn mark_detail_processed(&self, detail_id: &str) -> Result<bool> {
        let rows = self
            .run(Statement::new(
                QueryKind::MarkDetailProcessed,
                json!({"id": detail_id, "processed_at": timestamp()}),
            ))
            .await?;
        Ok(!rows.is_empty())
    }
}
