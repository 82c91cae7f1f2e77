//! Read queries over the memory graph.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::json;

use super::GraphStore;
use crate::error::Result;
use crate::query::{QueryKind, Statement};
use crate::retrieval::{expand_query, group_candidates};
use crate::types::{Candidate, Detail, DetailContext, Insight, StoreStats, TopicSummary};

#[derive(Debug, Deserialize)]
struct TopicInsightRow {
    topic_id: String,
    insight: Insight,
}

#[derive(Debug, Deserialize)]
struct ResolvedRow {
    id: String,
    #[serde(default)]
    by_id: bool,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    label: String,
    count: u64,
}

impl GraphStore {
    /// All domain labels, sorted.
    pub async fn list_domain_labels(&self) -> Result<Vec<String>> {
        let rows = self.run(Statement::bare(QueryKind::ListDomainLabels)).await?;
        Ok(rows
            .into_iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect())
    }

    /// Topics ordered by text, each with the labels of its domains.
    pub async fn list_topics(&self, limit: usize) -> Result<Vec<TopicSummary>> {
        self.fetch_all(Statement::new(QueryKind::ListTopics, json!({"limit": limit})))
            .await
    }

    /// Details still awaiting insight processing, oldest first.
    pub async fn list_pending_details(&self, limit: usize) -> Result<Vec<Detail>> {
        self.fetch_all(Statement::new(
            QueryKind::ListPendingDetails,
            json!({"limit": limit}),
        ))
        .await
    }

    /// A detail with its topics and their domains; `None` if it does not exist.
    pub async fn get_detail_context(&self, detail_id: &str) -> Result<Option<DetailContext>> {
        self.fetch_optional(Statement::new(
            QueryKind::GetDetailContext,
            json!({"id": detail_id}),
        ))
        .await
    }

    /// Insights attached to one topic.
    pub async fn list_insights_for_topic(&self, topic_id: &str) -> Result<Vec<Insight>> {
        self.list_insights_for_topics(&[topic_id.to_string()])
            .await
    }

    /// Distinct insights attached to any of the given topics, oldest first.
    pub async fn list_insights_for_topics(&self, topic_ids: &[String]) -> Result<Vec<Insight>> {
        let mut seen = HashSet::new();
        Ok(self
            .topic_insight_rows(topic_ids)
            .await?
            .into_iter()
            .map(|row| row.insight)
            .filter(|i| seen.insert(i.id.clone()))
            .collect())
    }

    /// Insights keyed by topic id.
    pub async fn insights_by_topic(
        &self,
        topic_ids: &[String],
    ) -> Result<HashMap<String, Vec<Insight>>> {
        let mut map: HashMap<String, Vec<Insight>> = HashMap::new();
        for row in self.topic_insight_rows(topic_ids).await? {
            let bucket = map.entry(row.topic_id).or_default();
            if !bucket.iter().any(|i| i.id == row.insight.id) {
                bucket.push(row.insight);
            }
        }
        Ok(map)
    }

    async fn topic_insight_rows(&self, topic_ids: &[String]) -> Result<Vec<TopicInsightRow>> {
        if topic_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch_all(Statement::new(
            QueryKind::ListInsightsForTopics,
            json!({"topic_ids": topic_ids}),
        ))
        .await
    }

    /// Resolve a detail reference given as either an id or the exact text.
    ///
    /// An id match wins over a text match.
    pub async fn resolve_detail_id(&self, reference: &str) -> Result<Option<String>> {
        let rows: Vec<ResolvedRow> = self
            .fetch_all(Statement::new(
                QueryKind::ResolveDetailId,
                json!({"reference": reference}),
            ))
            .await?;

        let by_id = rows.iter().find(|r| r.by_id).map(|r| r.id.clone());
        Ok(by_id.or_else(|| rows.into_iter().next().map(|r| r.id)))
    }

    /// (domain, topic) pairs where any term occurs in the domain label, topic
    /// text or a detail's text, case-insensitively. Terms are lowercased here.
    pub async fn lexical_candidates(&self, terms: &[String], limit: usize) -> Result<Vec<Candidate>> {
        let terms: Vec<String> = terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let rows: Vec<Candidate> = self
            .fetch_all(Statement::new(
                QueryKind::LexicalCandidates,
                json!({"terms": terms, "limit": limit}),
            ))
            .await?;
        Ok(group_candidates(rows))
    }

    /// Lexical stage of retrieval: expand the query and collect candidates.
    pub async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<Candidate>> {
        self.lexical_candidates(&expand_query(query), limit).await
    }

    /// Node and edge counts by label.
    pub async fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();
        for row in self
            .fetch_all::<CountRow>(Statement::bare(QueryKind::NodeCounts))
            .await?
        {
            *stats.nodes.entry(row.label).or_default() += row.count;
        }
        for row in self
            .fetch_all::<CountRow>(Statement::bare(QueryKind::EdgeCounts))
            .await?
        {
            *stats.edges.entry(row.label).or_default() += row.count;
        }
        Ok(stats)
    }
}
