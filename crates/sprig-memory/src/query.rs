//! Fixed parameterized statements.
//!
//! Every graph operation is one [`QueryKind`] with a constant Cypher body.
//! Values only ever travel in the statement's JSON parameter map; labels and
//! relationship types come from closed enums. Each statement returns exactly
//! one column so it fits AGE's `AS (result agtype)` row definition.

use serde_json::Value;

use crate::types::RelationType;

/// The closed set of statements the store issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    // Writes
    MergeDomain,
    MergeTopic,
    CreateDetail,
    CreateInsight,
    UpdateInsightText,
    Link(RelationType),
    PrimeEdge(RelationType),
    InsertClusterTopicDetail,
    MarkDetailProcessed,
    // Reads
    ListDomainLabels,
    ListTopics,
    ListPendingDetails,
    GetDetailContext,
    ListInsightsForTopics,
    ResolveDetailId,
    LexicalCandidates,
    NodeCounts,
    EdgeCounts,
}

impl QueryKind {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MergeDomain => "merge_domain",
            Self::MergeTopic => "merge_topic",
            Self::CreateDetail => "create_detail",
            Self::CreateInsight => "create_insight",
            Self::UpdateInsightText => "update_insight_text",
            Self::Link(_) => "link",
            Self::PrimeEdge(_) => "prime_edge",
            Self::InsertClusterTopicDetail => "insert_cluster_topic_detail",
            Self::MarkDetailProcessed => "mark_detail_processed",
            Self::ListDomainLabels => "list_domain_labels",
            Self::ListTopics => "list_topics",
            Self::ListPendingDetails => "list_pending_details",
            Self::GetDetailContext => "get_detail_context",
            Self::ListInsightsForTopics => "list_insights_for_topics",
            Self::ResolveDetailId => "resolve_detail_id",
            Self::LexicalCandidates => "lexical_candidates",
            Self::NodeCounts => "node_counts",
            Self::EdgeCounts => "edge_counts",
        }
    }

    /// The Cypher body for this statement.
    pub fn cypher(&self) -> &'static str {
        match self {
            Self::MergeDomain => {
                "MERGE (d:Domain {label: $label})
                   ON CREATE SET d.id = $id, d.created_at = $created_at
                 RETURN properties(d)"
            }
            Self::MergeTopic => {
                "MERGE (t:Topic {text: $text})
                   ON CREATE SET t.id = $id, t.created_at = $created_at, t.embedding = $embedding
                 RETURN properties(t)"
            }
            Self::CreateDetail => {
                "CREATE (x:Detail {id: $id, text: $text, source: $source,
                                   created_at: $created_at, embedding: $embedding,
                                   insight_pending: true})
                 RETURN properties(x)"
            }
            Self::CreateInsight => {
                "CREATE (i:Insight {id: $id, text: $text, created_at: $created_at,
                                    embedding: $embedding})
                 RETURN properties(i)"
            }
            Self::UpdateInsightText => {
                "MATCH (i:Insight {id: $id})
                 SET i.text = $text
                 RETURN properties(i)"
            }
            Self::Link(rel) => link_cypher(*rel),
            Self::PrimeEdge(rel) => prime_cypher(*rel),
            Self::InsertClusterTopicDetail => {
                "MERGE (d:Domain {label: $domain_label})
                   ON CREATE SET d.id = $domain_id, d.created_at = $created_at
                 WITH d
                 MERGE (t:Topic {text: $topic_text})
                   ON CREATE SET t.id = $topic_id, t.created_at = $created_at,
                                 t.embedding = $topic_embedding
                 WITH d, t
                 MERGE (d)-[:HAS_TOPIC]->(t)
                 CREATE (x:Detail {id: $detail_id, text: $detail_text, source: $source,
                                   created_at: $created_at, embedding: $detail_embedding,
                                   insight_pending: true})
                 CREATE (t)-[:HAS_DETAIL]->(x)
                 RETURN {domain: properties(d), topic: properties(t), detail: properties(x)}"
            }
            Self::MarkDetailProcessed => {
                "MATCH (x:Detail {id: $id})
                 WHERE coalesce(x.insight_pending, true) = true
                 SET x.insight_pending = false, x.insight_processed_at = $processed_at
                 RETURN x.id"
            }
            Self::ListDomainLabels => {
                "MATCH (d:Domain)
                 WITH d.label AS label ORDER BY label
                 RETURN label"
            }
            Self::ListTopics => {
                "MATCH (t:Topic)
                 OPTIONAL MATCH (d:Domain)-[:HAS_TOPIC]->(t)
                 WITH t, collect(DISTINCT d.label) AS domains
                 ORDER BY t.text
                 LIMIT $limit
                 RETURN {topic: properties(t), domains: domains}"
            }
            Self::ListPendingDetails => {
                "MATCH (x:Detail)
                 WHERE coalesce(x.insight_pending, true) = true
                 WITH x ORDER BY x.created_at LIMIT $limit
                 RETURN properties(x)"
            }
            Self::GetDetailContext => {
                "MATCH (x:Detail {id: $id})
                 OPTIONAL MATCH (t:Topic)-[:HAS_DETAIL]->(x)
                 OPTIONAL MATCH (d:Domain)-[:HAS_TOPIC]->(t)
                 WITH x, collect(DISTINCT t) AS topics, collect(DISTINCT d) AS domains
                 RETURN {detail: properties(x),
                         topics: [n IN topics | properties(n)],
                         domains: [n IN domains | properties(n)]}"
            }
            Self::ListInsightsForTopics => {
                "MATCH (t:Topic)-[:HAS_INSIGHT]->(i:Insight)
                 WHERE t.id IN $topic_ids
                 WITH t, i ORDER BY i.created_at
                 RETURN {topic_id: t.id, insight: properties(i)}"
            }
            Self::ResolveDetailId => {
                "MATCH (x:Detail)
                 WHERE x.id = $reference OR x.text = $reference
                 RETURN {id: x.id, by_id: x.id = $reference}"
            }
            Self::LexicalCandidates => {
                "UNWIND $terms AS term
                 MATCH (d:Domain)-[:HAS_TOPIC]->(t:Topic)
                 OPTIONAL MATCH (t)-[:HAS_DETAIL]->(x:Detail)
                 WITH d, t, x, term
                 WHERE toLower(d.label) CONTAINS term
                    OR toLower(t.text) CONTAINS term
                    OR toLower(coalesce(x.text, '')) CONTAINS term
                 WITH DISTINCT d, t, x
                 WITH d, t, collect(properties(x)) AS details
                 ORDER BY d.label, t.text
                 LIMIT $limit
                 RETURN {domain: properties(d), topic: properties(t), details: details}"
            }
            Self::NodeCounts => {
                "MATCH (n)
                 WITH label(n) AS label, count(n) AS count
                 RETURN {label: label, count: count}"
            }
            Self::EdgeCounts => {
                "MATCH ()-[r]->()
                 WITH type(r) AS label, count(r) AS count
                 RETURN {label: label, count: count}"
            }
        }
    }
}

fn link_cypher(rel: RelationType) -> &'static str {
    match rel {
        RelationType::HasTopic => {
            "MATCH (a:Domain {id: $from_id}), (b:Topic {id: $to_id})
             MERGE (a)-[:HAS_TOPIC]->(b)
             RETURN b.id"
        }
        RelationType::HasDetail => {
            "MATCH (a:Topic {id: $from_id}), (b:Detail {id: $to_id})
             MERGE (a)-[:HAS_DETAIL]->(b)
             RETURN b.id"
        }
        RelationType::HasInsight => {
            "MATCH (a:Topic {id: $from_id}), (b:Insight {id: $to_id})
             MERGE (a)-[:HAS_INSIGHT]->(b)
             RETURN b.id"
        }
        RelationType::SupportsDetail => {
            "MATCH (a:Insight {id: $from_id}), (b:Detail {id: $to_id})
             MERGE (a)-[:SUPPORTS_DETAIL]->(b)
             RETURN b.id"
        }
    }
}

/// Matches nothing, but planning the MERGE registers the edge label.
fn prime_cypher(rel: RelationType) -> &'static str {
    match rel {
        RelationType::HasTopic => {
            "MATCH (a:Domain) WHERE false
             MERGE (a)-[r:HAS_TOPIC]->(a)
             RETURN count(r)"
        }
        RelationType::HasDetail => {
            "MATCH (a:Topic) WHERE false
             MERGE (a)-[r:HAS_DETAIL]->(a)
             RETURN count(r)"
        }
        RelationType::HasInsight => {
            "MATCH (a:Topic) WHERE false
             MERGE (a)-[r:HAS_INSIGHT]->(a)
             RETURN count(r)"
        }
        RelationType::SupportsDetail => {
            "MATCH (a:Insight) WHERE false
             MERGE (a)-[r:SUPPORTS_DETAIL]->(a)
             RETURN count(r)"
        }
    }
}

/// A statement ready for execution: the fixed query plus its parameters.
#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: QueryKind,
    pub params: Value,
}

impl Statement {
    pub fn new(kind: QueryKind, params: Value) -> Self {
        Self { kind, params }
    }

    /// A statement without parameters.
    pub fn bare(kind: QueryKind) -> Self {
        Self::new(kind, Value::Object(Default::default()))
    }

    pub fn cypher(&self) -> &'static str {
        self.kind.cypher()
    }

    /// Look up a string parameter.
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// Look up an integer parameter.
    pub fn u64_param(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(Value::as_u64)
    }
}
