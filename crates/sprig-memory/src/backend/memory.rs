//! In-process graph backend.
//!
//! Interprets the fixed statement set directly against a small property
//! graph held in memory, with the same merge, create and link semantics as
//! the AGE queries. Used by tests and for running without a database.
//! Failures can be injected to exercise the retry and priming paths.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};

use super::GraphBackend;
use crate::error::{MemoryError, Result};
use crate::query::{QueryKind, Statement};
use crate::types::{NodeLabel, RelationType};

#[derive(Debug, Clone)]
struct Node {
    label: NodeLabel,
    props: Map<String, Value>,
}

impl Node {
    fn get_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Value::as_str)
    }

    fn is_pending(&self) -> bool {
        self.props
            .get("insight_pending")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    fn properties(&self) -> Value {
        Value::Object(self.props.clone())
    }
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    rel: RelationType,
    from: usize,
    to: usize,
}

#[derive(Debug, Default)]
struct MemoryGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl MemoryGraph {
    fn find(&self, label: NodeLabel, key: &str, value: &str) -> Option<usize> {
        self.nodes
            .iter()
            .position(|n| n.label == label && n.get_str(key) == Some(value))
    }

    /// Insert a node; null values are dropped the way AGE drops null properties.
    fn insert(&mut self, label: NodeLabel, props: Vec<(&str, Value)>) -> usize {
        let props = props
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        self.nodes.push(Node { label, props });
        self.nodes.len() - 1
    }

    fn merge_edge(&mut self, rel: RelationType, from: usize, to: usize) {
        let exists = self
            .edges
            .iter()
            .any(|e| e.rel == rel && e.from == from && e.to == to);
        if !exists {
            self.edges.push(Edge { rel, from, to });
        }
    }

    fn sources(&self, rel: RelationType, to: usize) -> Vec<usize> {
        let mut seen = HashSet::new();
        self.edges
            .iter()
            .filter(|e| e.rel == rel && e.to == to)
            .map(|e| e.from)
            .filter(|i| seen.insert(*i))
            .collect()
    }

    fn targets(&self, rel: RelationType, from: usize) -> Vec<usize> {
        let mut seen = HashSet::new();
        self.edges
            .iter()
            .filter(|e| e.rel == rel && e.from == from)
            .map(|e| e.to)
            .filter(|i| seen.insert(*i))
            .collect()
    }

    fn merge_domain(&mut self, label: &str, id: &str, created_at: &str) -> usize {
        self.find(NodeLabel::Domain, "label", label).unwrap_or_else(|| {
            self.insert(
                NodeLabel::Domain,
                vec![
                    ("label", json!(label)),
                    ("id", json!(id)),
                    ("created_at", json!(created_at)),
                ],
            )
        })
    }

    fn merge_topic(&mut self, text: &str, id: &str, created_at: &str, embedding: Value) -> usize {
        self.find(NodeLabel::Topic, "text", text).unwrap_or_else(|| {
            self.insert(
                NodeLabel::Topic,
                vec![
                    ("text", json!(text)),
                    ("id", json!(id)),
                    ("created_at", json!(created_at)),
                    ("embedding", embedding),
                ],
            )
        })
    }

    fn create_detail(&mut self, params: &Value, prefix: &str) -> Result<usize> {
        let key = |k: &str| format!("{prefix}{k}");
        Ok(self.insert(
            NodeLabel::Detail,
            vec![
                ("id", json!(required(params, &key("id"))?)),
                ("text", json!(required(params, &key("text"))?)),
                ("source", params.get("source").cloned().unwrap_or(Value::Null)),
                ("created_at", json!(required(params, "created_at")?)),
                ("embedding", params.get(&key("embedding")).cloned().unwrap_or(Value::Null)),
                ("insight_pending", json!(true)),
            ],
        ))
    }
}

fn required<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| MemoryError::InvalidData(format!("missing parameter ${key}")))
}

fn optional(params: &Value, key: &str) -> Value {
    params.get(key).cloned().unwrap_or(Value::Null)
}

fn limit(params: &Value) -> usize {
    params
        .get("limit")
        .and_then(Value::as_u64)
        .map(|l| l as usize)
        .unwrap_or(usize::MAX)
}

/// In-process graph backend with fault injection.
#[derive(Debug, Default)]
pub struct InMemoryGraphBackend {
    graphs: Mutex<HashMap<String, MemoryGraph>>,
    faults: Mutex<VecDeque<String>>,
    log: Mutex<Vec<QueryKind>>,
}

impl InMemoryGraphBackend {
    /// Create an empty backend with no graphs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend with `graph` already present.
    pub fn with_graph(graph: &str) -> Self {
        let backend = Self::new();
        backend
            .graphs
            .lock()
            .insert(graph.to_string(), MemoryGraph::default());
        backend
    }

    /// Make the next `times` statements fail with `message`.
    pub fn fail_next(&self, times: usize, message: impl Into<String>) {
        let message = message.into();
        let mut faults = self.faults.lock();
        for _ in 0..times {
            faults.push_back(message.clone());
        }
    }

    /// Statements received so far, including failed ones.
    pub fn executed(&self) -> Vec<QueryKind> {
        self.log.lock().clone()
    }

    /// How many times a statement kind was received.
    pub fn count_executed(&self, kind: QueryKind) -> usize {
        self.log.lock().iter().filter(|k| **k == kind).count()
    }

    /// Overwrite a property on every node with this label and id.
    ///
    /// Lets tests build legacy-shaped nodes that predate a property.
    pub fn set_node_property(&self, graph: &str, label: NodeLabel, id: &str, key: &str, value: Value) {
        if let Some(g) = self.graphs.lock().get_mut(graph) {
            for node in g
                .nodes
                .iter_mut()
                .filter(|n| n.label == label && n.get_str("id") == Some(id))
            {
                if value.is_null() {
                    node.props.remove(key);
                } else {
                    node.props.insert(key.to_string(), value.clone());
                }
            }
        }
    }

    fn run(graph: &mut MemoryGraph, stmt: &Statement) -> Result<Vec<Value>> {
        let p = &stmt.params;
        let rows = match stmt.kind {
            QueryKind::MergeDomain => {
                let idx = graph.merge_domain(
                    required(p, "label")?,
                    required(p, "id")?,
                    required(p, "created_at")?,
                );
                vec![graph.nodes[idx].properties()]
            }
            QueryKind::MergeTopic => {
                let idx = graph.merge_topic(
                    required(p, "text")?,
                    required(p, "id")?,
                    required(p, "created_at")?,
                    optional(p, "embedding"),
                );
                vec![graph.nodes[idx].properties()]
            }
            QueryKind::CreateDetail => {
                let idx = graph.create_detail(p, "")?;
                vec![graph.nodes[idx].properties()]
            }
            QueryKind::CreateInsight => {
                let idx = graph.insert(
                    NodeLabel::Insight,
                    vec![
                        ("id", json!(required(p, "id")?)),
                        ("text", json!(required(p, "text")?)),
                        ("created_at", json!(required(p, "created_at")?)),
                        ("embedding", optional(p, "embedding")),
                    ],
                );
                vec![graph.nodes[idx].properties()]
            }
            QueryKind::UpdateInsightText => {
                let text = required(p, "text")?;
                match graph.find(NodeLabel::Insight, "id", required(p, "id")?) {
                    Some(idx) => {
                        graph.nodes[idx]
                            .props
                            .insert("text".to_string(), json!(text));
                        vec![graph.nodes[idx].properties()]
                    }
                    None => vec![],
                }
            }
            QueryKind::Link(rel) => {
                let (from_label, to_label) = rel.endpoints();
                let from = graph.find(from_label, "id", required(p, "from_id")?);
                let to = graph.find(to_label, "id", required(p, "to_id")?);
                match (from, to) {
                    (Some(from), Some(to)) => {
                        graph.merge_edge(rel, from, to);
                        vec![optional(&graph.nodes[to].properties(), "id")]
                    }
                    _ => vec![],
                }
            }
            QueryKind::PrimeEdge(rel) => {
                let count = graph.edges.iter().filter(|e| e.rel == rel).count();
                vec![json!(count)]
            }
            QueryKind::InsertClusterTopicDetail => {
                let created_at = required(p, "created_at")?;
                let d = graph.merge_domain(
                    required(p, "domain_label")?,
                    required(p, "domain_id")?,
                    created_at,
                );
                let t = graph.merge_topic(
                    required(p, "topic_text")?,
                    required(p, "topic_id")?,
                    created_at,
                    optional(p, "topic_embedding"),
                );
                graph.merge_edge(RelationType::HasTopic, d, t);
                let x = graph.create_detail(p, "detail_")?;
                graph.merge_edge(RelationType::HasDetail, t, x);
                vec![json!({
                    "domain": graph.nodes[d].properties(),
                    "topic": graph.nodes[t].properties(),
                    "detail": graph.nodes[x].properties(),
                })]
            }
            QueryKind::MarkDetailProcessed => {
                let processed_at = required(p, "processed_at")?;
                match graph.find(NodeLabel::Detail, "id", required(p, "id")?) {
                    Some(idx) if graph.nodes[idx].is_pending() => {
                        let node = &mut graph.nodes[idx];
                        node.props
                            .insert("insight_pending".to_string(), json!(false));
                        node.props
                            .insert("insight_processed_at".to_string(), json!(processed_at));
                        vec![optional(&node.properties(), "id")]
                    }
                    _ => vec![],
                }
            }
            QueryKind::ListDomainLabels => {
                let mut labels: Vec<&str> = graph
                    .nodes
                    .iter()
                    .filter(|n| n.label == NodeLabel::Domain)
                    .filter_map(|n| n.get_str("label"))
                    .collect();
                labels.sort_unstable();
                labels.into_iter().map(|l| json!(l)).collect()
            }
            QueryKind::ListTopics => {
                let mut topics: Vec<usize> = (0..graph.nodes.len())
                    .filter(|i| graph.nodes[*i].label == NodeLabel::Topic)
                    .collect();
                topics.sort_by(|a, b| {
                    graph.nodes[*a]
                        .get_str("text")
                        .cmp(&graph.nodes[*b].get_str("text"))
                });
                topics
                    .into_iter()
                    .take(limit(p))
                    .map(|t| {
                        let domains: Vec<Value> = graph
                            .sources(RelationType::HasTopic, t)
                            .into_iter()
                            .filter_map(|d| graph.nodes[d].props.get("label").cloned())
                            .collect();
                        json!({"topic": graph.nodes[t].properties(), "domains": domains})
                    })
                    .collect()
            }
            QueryKind::ListPendingDetails => {
                let mut pending: Vec<&Node> = graph
                    .nodes
                    .iter()
                    .filter(|n| n.label == NodeLabel::Detail && n.is_pending())
                    .collect();
                pending.sort_by(|a, b| a.get_str("created_at").cmp(&b.get_str("created_at")));
                pending
                    .into_iter()
                    .take(limit(p))
                    .map(Node::properties)
                    .collect()
            }
            QueryKind::GetDetailContext => {
                match graph.find(NodeLabel::Detail, "id", required(p, "id")?) {
                    Some(x) => {
                        let topics = graph.sources(RelationType::HasDetail, x);
                        let mut domains = Vec::new();
                        for t in &topics {
                            for d in graph.sources(RelationType::HasTopic, *t) {
                                if !domains.contains(&d) {
                                    domains.push(d);
                                }
                            }
                        }
                        let props = |ids: &[usize]| -> Vec<Value> {
                            ids.iter().map(|i| graph.nodes[*i].properties()).collect()
                        };
                        vec![json!({
                            "detail": graph.nodes[x].properties(),
                            "topics": props(&topics),
                            "domains": props(&domains),
                        })]
                    }
                    None => vec![],
                }
            }
            QueryKind::ListInsightsForTopics => {
                let wanted: HashSet<&str> = p
                    .get("topic_ids")
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();
                let mut pairs: Vec<(usize, usize)> = graph
                    .edges
                    .iter()
                    .filter(|e| e.rel == RelationType::HasInsight)
                    .filter(|e| {
                        graph.nodes[e.from]
                            .get_str("id")
                            .is_some_and(|id| wanted.contains(id))
                    })
                    .map(|e| (e.from, e.to))
                    .collect();
                pairs.sort_by(|a, b| {
                    graph.nodes[a.1]
                        .get_str("created_at")
                        .cmp(&graph.nodes[b.1].get_str("created_at"))
                });
                pairs
                    .into_iter()
                    .map(|(t, i)| {
                        json!({
                            "topic_id": optional(&graph.nodes[t].properties(), "id"),
                            "insight": graph.nodes[i].properties(),
                        })
                    })
                    .collect()
            }
            QueryKind::ResolveDetailId => {
                let reference = required(p, "reference")?;
                graph
                    .nodes
                    .iter()
                    .filter(|n| n.label == NodeLabel::Detail)
                    .filter(|n| {
                        n.get_str("id") == Some(reference) || n.get_str("text") == Some(reference)
                    })
                    .map(|n| {
                        json!({
                            "id": n.get_str("id"),
                            "by_id": n.get_str("id") == Some(reference),
                        })
                    })
                    .collect()
            }
            QueryKind::LexicalCandidates => {
                let terms: Vec<String> = p
                    .get("terms")
                    .and_then(Value::as_array)
                    .map(|ts| ts.iter().filter_map(Value::as_str).map(String::from).collect())
                    .unwrap_or_default();
                let hit = |idx: usize, key: &str| {
                    graph.nodes[idx].get_str(key).is_some_and(|v| {
                        let v = v.to_lowercase();
                        terms.iter().any(|t| v.contains(t.as_str()))
                    })
                };

                let mut groups: Vec<(usize, usize, Vec<usize>)> = Vec::new();
                for edge in graph.edges.iter().filter(|e| e.rel == RelationType::HasTopic) {
                    let (d, t) = (edge.from, edge.to);
                    let head = hit(d, "label") || hit(t, "text");
                    let details = graph.targets(RelationType::HasDetail, t);
                    let matched: Vec<usize> = details
                        .iter()
                        .copied()
                        .filter(|x| head || hit(*x, "text"))
                        .collect();
                    if head || !matched.is_empty() {
                        groups.push((d, t, matched));
                    }
                }
                groups.sort_by(|a, b| {
                    let key = |g: &(usize, usize, Vec<usize>)| {
                        (graph.nodes[g.0].get_str("label"), graph.nodes[g.1].get_str("text"))
                    };
                    key(a).cmp(&key(b))
                });
                groups
                    .into_iter()
                    .take(limit(p))
                    .map(|(d, t, xs)| {
                        let details: Vec<Value> =
                            xs.iter().map(|x| graph.nodes[*x].properties()).collect();
                        json!({
                            "domain": graph.nodes[d].properties(),
                            "topic": graph.nodes[t].properties(),
                            "details": details,
                        })
                    })
                    .collect()
            }
            QueryKind::NodeCounts => {
                let mut counts: Vec<(&str, u64)> = Vec::new();
                for node in &graph.nodes {
                    match counts.iter_mut().find(|(l, _)| *l == node.label.as_str()) {
                        Some((_, c)) => *c += 1,
                        None => counts.push((node.label.as_str(), 1)),
                    }
                }
                counts
                    .into_iter()
                    .map(|(label, count)| json!({"label": label, "count": count}))
                    .collect()
            }
            QueryKind::EdgeCounts => {
                let mut counts: Vec<(&str, u64)> = Vec::new();
                for edge in &graph.edges {
                    match counts.iter_mut().find(|(l, _)| *l == edge.rel.as_str()) {
                        Some((_, c)) => *c += 1,
                        None => counts.push((edge.rel.as_str(), 1)),
                    }
                }
                counts
                    .into_iter()
                    .map(|(label, count)| json!({"label": label, "count": count}))
                    .collect()
            }
        };
        Ok(rows)
    }
}

#[async_trait]
impl GraphBackend for InMemoryGraphBackend {
    async fn graph_exists(&self, graph: &str) -> Result<bool> {
        Ok(self.graphs.lock().contains_key(graph))
    }

    async fn create_graph(&self, graph: &str) -> Result<()> {
        let mut graphs = self.graphs.lock();
        if graphs.contains_key(graph) {
            return Err(MemoryError::Backend(format!(
                "graph \"{}\" already exists",
                graph
            )));
        }
        graphs.insert(graph.to_string(), MemoryGraph::default());
        Ok(())
    }

    async fn cypher(&self, graph: &str, statement: &Statement) -> Result<Vec<String>> {
        // Suspend like a network round trip so concurrent callers interleave.
        tokio::task::yield_now().await;
        self.log.lock().push(statement.kind);

        if let Some(message) = self.faults.lock().pop_front() {
            return Err(MemoryError::Backend(message));
        }

        let mut graphs = self.graphs.lock();
        let g = graphs
            .get_mut(graph)
            .ok_or_else(|| MemoryError::Backend(format!("graph \"{}\" does not exist", graph)))?;

        let rows = Self::run(g, statement)?;
        Ok(rows.iter().map(Value::to_string).collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
