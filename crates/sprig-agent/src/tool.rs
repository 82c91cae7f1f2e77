//! Typed tool dispatch over the memory graph.
//!
//! The reasoner names a tool and passes JSON arguments. Each pair is parsed
//! into a closed [`MemoryCommand`], checked against the active [`Toolset`] and
//! executed against the [`GraphStore`]. Results travel back to the model as
//! JSON text.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use sprig_llm::{SharedEmbedder, ToolDefinition};
use sprig_memory::GraphStore;
use tracing::debug;

use crate::error::Result;

const DEFAULT_PENDING_LIMIT: usize = 25;
const DEFAULT_TOPIC_LIMIT: usize = 50;

fn default_pending_limit() -> usize {
    DEFAULT_PENDING_LIMIT
}

fn default_topic_limit() -> usize {
    DEFAULT_TOPIC_LIMIT
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Every operation a reasoner may request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum MemoryCommand {
    ListPendingDetails {
        #[serde(default = "default_pending_limit")]
        limit: usize,
    },
    GetDetailContext {
        detail_id: String,
    },
    ListInsightsForTopics {
        topic_ids: Vec<String>,
    },
    CreateInsight {
        text: String,
    },
    UpdateInsight {
        insight_id: String,
        new_text: String,
    },
    LinkInsightTopic {
        insight_id: String,
        topic_id: String,
    },
    LinkInsightDetail {
        insight_id: String,
        detail_id: String,
    },
    MarkDetailProcessed {
        detail_id: String,
    },
    ListDomains {},
    ListTopics {
        #[serde(default = "default_topic_limit")]
        limit: usize,
    },
    CreateDomain {
        label: String,
    },
    CreateTopic {
        text: String,
    },
    LinkTopicDomain {
        topic_id: String,
        domain_id: String,
    },
    LinkDetailTopic {
        detail_id: String,
        topic_id: String,
    },
}

impl MemoryCommand {
    /// Parse a tool call. Missing or null arguments count as `{}`.
    pub fn parse(name: &str, arguments: Value) -> std::result::Result<Self, String> {
        let arguments = match arguments {
            Value::Null => json!({}),
            other => other,
        };
        serde_json::from_value(json!({"name": name, "arguments": arguments}))
            .map_err(|e| format!("invalid call to {name}: {e}"))
    }

    /// The tool name this command was parsed from.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListPendingDetails { .. } => "list_pending_details",
            Self::GetDetailContext { .. } => "get_detail_context",
            Self::ListInsightsForTopics { .. } => "list_insights_for_topics",
            Self::CreateInsight { .. } => "create_insight",
            Self::UpdateInsight { .. } => "update_insight",
            Self::LinkInsightTopic { .. } => "link_insight_topic",
            Self::LinkInsightDetail { .. } => "link_insight_detail",
            Self::MarkDetailProcessed { .. } => "mark_detail_processed",
            Self::ListDomains {} => "list_domains",
            Self::ListTopics { .. } => "list_topics",
            Self::CreateDomain { .. } => "create_domain",
            Self::CreateTopic { .. } => "create_topic",
            Self::LinkTopicDomain { .. } => "link_topic_domain",
            Self::LinkDetailTopic { .. } => "link_detail_topic",
        }
    }
}

/// Outcome of one command, rendered as the tool-result text.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Json(Value),
    Error(String),
}

impl CommandResult {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Text handed back to the model.
    pub fn to_text(&self) -> String {
        match self {
            Self::Json(value) => value.to_string(),
            Self::Error(message) => json!({"ok": false, "error": message}).to_string(),
        }
    }

    fn ok(ok: bool) -> Self {
        Self::Json(json!({"ok": ok}))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Toolsets
// ─────────────────────────────────────────────────────────────────────────────

/// The fixed tool surface a workflow exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toolset {
    /// Insight consolidation.
    Insights,
    /// Placing a new detail in the hierarchy.
    Placement,
}

const INSIGHT_TOOLS: &[&str] = &[
    "list_pending_details",
    "get_detail_context",
    "list_insights_for_topics",
    "create_insight",
    "update_insight",
    "link_insight_topic",
    "link_insight_detail",
    "mark_detail_processed",
];

const PLACEMENT_TOOLS: &[&str] = &[
    "get_detail_context",
    "list_domains",
    "list_topics",
    "create_domain",
    "create_topic",
    "link_topic_domain",
    "link_detail_topic",
];

impl Toolset {
    pub fn tool_names(&self) -> &'static [&'static str] {
        match self {
            Self::Insights => INSIGHT_TOOLS,
            Self::Placement => PLACEMENT_TOOLS,
        }
    }

    pub fn allows(&self, command: &MemoryCommand) -> bool {
        self.tool_names().contains(&command.name())
    }

    /// Tool definitions advertised to the model.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tool_names()
            .iter()
            .filter_map(|name| definition(name))
            .collect()
    }
}

fn string_props(props: &[(&str, &str)]) -> Value {
    let properties: serde_json::Map<String, Value> = props
        .iter()
        .map(|(name, description)| {
            (
                name.to_string(),
                json!({"type": "string", "description": description}),
            )
        })
        .collect();
    let required: Vec<&str> = props.iter().map(|(name, _)| *name).collect();
    json!({"type": "object", "properties": properties, "required": required})
}

fn limit_props(default: usize) -> Value {
    json!({
        "type": "object",
        "properties": {
            "limit": {
                "type": "integer",
                "description": format!("Maximum number of results. Defaults to {default}."),
                "default": default
            }
        }
    })
}

fn definition(name: &str) -> Option<ToolDefinition> {
    let (description, schema) = match name {
        "list_pending_details" => (
            "List details still waiting for insights, oldest first.",
            limit_props(DEFAULT_PENDING_LIMIT),
        ),
        "get_detail_context" => (
            "Fetch a detail with its topics and domains.",
            string_props(&[("detail_id", "Detail identifier.")]),
        ),
        "list_insights_for_topics" => (
            "List existing insights attached to any of the given topics.",
            json!({
                "type": "object",
                "properties": {
                    "topic_ids": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Topic identifiers."
                    }
                },
                "required": ["topic_ids"]
            }),
        ),
        "create_insight" => (
            "Create a new insight. Returns it with its id.",
            string_props(&[("text", "Short reusable insight, 4-12 words.")]),
        ),
        "update_insight" => (
            "Replace the text of an existing insight, e.g. to generalize it.",
            string_props(&[
                ("insight_id", "Insight identifier."),
                ("new_text", "New insight text."),
            ]),
        ),
        "link_insight_topic" => (
            "Attach an insight to a topic.",
            string_props(&[
                ("insight_id", "Insight identifier."),
                ("topic_id", "Topic identifier."),
            ]),
        ),
        "link_insight_detail" => (
            "Record that an insight is supported by a detail.",
            string_props(&[
                ("insight_id", "Insight identifier."),
                ("detail_id", "Detail identifier or exact detail text."),
            ]),
        ),
        "mark_detail_processed" => (
            "Mark a detail as done with insight processing.",
            string_props(&[("detail_id", "Detail identifier or exact detail text.")]),
        ),
        "list_domains" => (
            "List existing domain labels.",
            json!({"type": "object", "properties": {}}),
        ),
        "list_topics" => (
            "List existing topics with their domains.",
            limit_props(DEFAULT_TOPIC_LIMIT),
        ),
        "create_domain" => (
            "Create a domain, or return the existing one with the same label.",
            string_props(&[("label", "Short domain label, e.g. Food.")]),
        ),
        "create_topic" => (
            "Create a topic, or return the existing one with the same text.",
            string_props(&[("text", "Concise topic text.")]),
        ),
        "link_topic_domain" => (
            "Place a topic under a domain.",
            string_props(&[
                ("topic_id", "Topic identifier."),
                ("domain_id", "Domain identifier."),
            ]),
        ),
        "link_detail_topic" => (
            "Place a detail under a topic.",
            string_props(&[
                ("detail_id", "Detail identifier or exact detail text."),
                ("topic_id", "Topic identifier."),
            ]),
        ),
        _ => return None,
    };
    Some(ToolDefinition::new(name, description, schema))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handler
// ─────────────────────────────────────────────────────────────────────────────

/// Executes named tool calls on behalf of a reasoner.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Tools the model may call.
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Execute one call. Failures come back as [`CommandResult::Error`].
    async fn handle(&self, name: &str, arguments: Value) -> CommandResult;
}

/// Dispatcher over the graph store, limited to one toolset.
pub struct MemoryToolbox {
    store: Arc<GraphStore>,
    embedder: SharedEmbedder,
    toolset: Toolset,
}

impl MemoryToolbox {
    pub fn new(store: Arc<GraphStore>, embedder: SharedEmbedder, toolset: Toolset) -> Self {
        Self {
            store,
            embedder,
            toolset,
        }
    }

    pub fn toolset(&self) -> Toolset {
        self.toolset
    }

    /// Execute a parsed command, ignoring the toolset restriction.
    pub async fn dispatch(&self, command: MemoryCommand) -> Result<CommandResult> {
        let store = &self.store;
        let result = match command {
            MemoryCommand::ListPendingDetails { limit } => {
                CommandResult::Json(serde_json::to_value(store.list_pending_details(limit).await?)?)
            }
            MemoryCommand::GetDetailContext { detail_id } => {
                match store.resolve_detail_id(&detail_id).await? {
                    Some(id) => match store.get_detail_context(&id).await? {
                        Some(context) => CommandResult::Json(serde_json::to_value(context)?),
                        None => detail_not_found(),
                    },
                    None => detail_not_found(),
                }
            }
            MemoryCommand::ListInsightsForTopics { topic_ids } => CommandResult::Json(
                serde_json::to_value(store.list_insights_for_topics(&topic_ids).await?)?,
            ),
            MemoryCommand::CreateInsight { text } => {
                let embedding = self.embedder.embed(&text).await?;
                let insight = store.create_insight(&text, Some(embedding)).await?;
                CommandResult::Json(serde_json::to_value(insight)?)
            }
            MemoryCommand::UpdateInsight {
                insight_id,
                new_text,
            } => match store.update_insight_text(&insight_id, &new_text).await? {
                Some(insight) => CommandResult::Json(serde_json::to_value(insight)?),
                None => CommandResult::Error("insight_not_found".to_string()),
            },
            MemoryCommand::LinkInsightTopic {
                insight_id,
                topic_id,
            } => CommandResult::ok(store.link_insight_to_topic(&insight_id, &topic_id).await?),
            MemoryCommand::LinkInsightDetail {
                insight_id,
                detail_id,
            } => match store.resolve_detail_id(&detail_id).await? {
                Some(id) => CommandResult::ok(store.link_insight_to_detail(&insight_id, &id).await?),
                None => detail_not_found(),
            },
            MemoryCommand::MarkDetailProcessed { detail_id } => {
                match store.resolve_detail_id(&detail_id).await? {
                    Some(id) => {
                        let transitioned = store.mark_detail_processed(&id).await?;
                        CommandResult::Json(json!({"ok": true, "transitioned": transitioned}))
                    }
                    None => detail_not_found(),
                }
            }
            MemoryCommand::ListDomains {} => {
                CommandResult::Json(serde_json::to_value(store.list_domain_labels().await?)?)
            }
            MemoryCommand::ListTopics { limit } => {
                CommandResult::Json(serde_json::to_value(store.list_topics(limit).await?)?)
            }
            MemoryCommand::CreateDomain { label } => {
                CommandResult::Json(serde_json::to_value(store.create_domain(&label).await?)?)
            }
            MemoryCommand::CreateTopic { text } => {
                let embedding = self.embedder.embed(&text).await?;
                let topic = store.create_topic(&text, Some(embedding)).await?;
                CommandResult::Json(serde_json::to_value(topic)?)
            }
            MemoryCommand::LinkTopicDomain {
                topic_id,
                domain_id,
            } => CommandResult::ok(store.link_topic_to_domain(&topic_id, &domain_id).await?),
            MemoryCommand::LinkDetailTopic {
                detail_id,
                topic_id,
            } => match store.resolve_detail_id(&detail_id).await? {
                Some(id) => CommandResult::ok(store.link_detail_to_topic(&id, &topic_id).await?),
                None => detail_not_found(),
            },
        };
        Ok(result)
    }
}

fn detail_not_found() -> CommandResult {
    CommandResult::Error("detail_not_found".to_string())
}

#[async_trait]
impl CommandHandler for MemoryToolbox {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.toolset.definitions()
    }

    async fn handle(&self, name: &str, arguments: Value) -> CommandResult {
        let command = match MemoryCommand::parse(name, arguments) {
            Ok(command) => command,
            Err(e) => return CommandResult::Error(e),
        };
        if !self.toolset.allows(&command) {
            return CommandResult::Error(format!("tool {name} is not available here"));
        }

        debug!(tool = name, toolset = ?self.toolset, "Dispatching memory command");
        match self.dispatch(command).await {
            Ok(result) => result,
            Err(e) => CommandResult::Error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_store, tool_json};
    use sprig_memory::ClusterInsert;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            MemoryCommand::parse("create_insight", json!({"text": "Likes tea"})).unwrap(),
            MemoryCommand::CreateInsight {
                text: "Likes tea".to_string()
            }
        );
        assert_eq!(
            MemoryCommand::parse("list_pending_details", Value::Null).unwrap(),
            MemoryCommand::ListPendingDetails { limit: 25 }
        );
        assert_eq!(
            MemoryCommand::parse("list_domains", json!({})).unwrap(),
            MemoryCommand::ListDomains {}
        );
    }

    #[test]
    fn test_parse_rejects_unknown_and_malformed() {
        assert!(MemoryCommand::parse("drop_graph", json!({})).is_err());
        let err = MemoryCommand::parse("create_insight", json!({"body": "x"})).unwrap_err();
        assert!(err.contains("create_insight"));
    }

    #[test]
    fn test_every_advertised_tool_has_definition() {
        for toolset in [Toolset::Insights, Toolset::Placement] {
            assert_eq!(toolset.definitions().len(), toolset.tool_names().len());
        }
        let names: Vec<String> = Toolset::Insights
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert!(names.contains(&"mark_detail_processed".to_string()));
        assert!(!names.contains(&"create_domain".to_string()));
    }

    #[test]
    fn test_error_result_text() {
        let text = CommandResult::Error("detail_not_found".into()).to_text();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"ok": false, "error": "detail_not_found"}));
    }

    #[tokio::test]
    async fn test_toolset_restriction() {
        let (store, embedder) = memory_store();
        let toolbox = MemoryToolbox::new(store, embedder, Toolset::Insights);

        let result = toolbox.handle("create_domain", json!({"label": "Food"})).await;
        assert!(result.is_error());
        assert!(result.to_text().contains("not available"));
    }

    #[tokio::test]
    async fn test_insight_commands_round_trip() {
        let (store, embedder) = memory_store();
        let inserted = store
            .insert_cluster_topic_detail(ClusterInsert::new("Food", "ramen", "ate ramen", "chat"))
            .await
            .unwrap();
        let toolbox = MemoryToolbox::new(store.clone(), embedder, Toolset::Insights);

        let created = tool_json(
            toolbox
                .handle("create_insight", json!({"text": "Enjoys noodle dishes"}))
                .await,
        );
        assert!(created.get("embedding").is_none());
        let insight_id = created["id"].as_str().unwrap().to_string();

        let linked = toolbox
            .handle(
                "link_insight_topic",
                json!({"insight_id": insight_id, "topic_id": inserted.topic.id}),
            )
            .await;
        assert_eq!(linked, CommandResult::Json(json!({"ok": true})));

        // Exact detail text resolves to the detail id.
        let supported = toolbox
            .handle(
                "link_insight_detail",
                json!({"insight_id": insight_id, "detail_id": "ate ramen"}),
            )
            .await;
        assert_eq!(supported, CommandResult::Json(json!({"ok": true})));

        let listed = tool_json(
            toolbox
                .handle(
                    "list_insights_for_topics",
                    json!({"topic_ids": [inserted.topic.id]}),
                )
                .await,
        );
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let marked = tool_json(
            toolbox
                .handle("mark_detail_processed", json!({"detail_id": inserted.detail.id}))
                .await,
        );
        assert_eq!(marked["transitioned"], json!(true));
    }

    #[tokio::test]
    async fn test_unknown_detail_reports_not_found() {
        let (store, embedder) = memory_store();
        let toolbox = MemoryToolbox::new(store, embedder, Toolset::Insights);

        for (name, args) in [
            ("mark_detail_processed", json!({"detail_id": "nope"})),
            ("link_insight_detail", json!({"insight_id": "i", "detail_id": "nope"})),
            ("get_detail_context", json!({"detail_id": "nope"})),
        ] {
            assert_eq!(
                toolbox.handle(name, args).await,
                CommandResult::Error("detail_not_found".to_string())
            );
        }
    }

    #[tokio::test]
    async fn test_placement_commands() {
        let (store, embedder) = memory_store();
        let detail = store.create_detail("bought a kettle", "chat", None).await.unwrap();
        let toolbox = MemoryToolbox::new(store.clone(), embedder, Toolset::Placement);

        let domain = tool_json(toolbox.handle("create_domain", json!({"label": "shopping"})).await);
        assert_eq!(domain["label"], json!("Shopping"));
        let topic = tool_json(toolbox.handle("create_topic", json!({"text": "kitchen gear"})).await);

        let linked = toolbox
            .handle(
                "link_topic_domain",
                json!({"topic_id": topic["id"], "domain_id": domain["id"]}),
            )
            .await;
        assert_eq!(linked, CommandResult::Json(json!({"ok": true})));
        let placed = toolbox
            .handle(
                "link_detail_topic",
                json!({"detail_id": detail.id, "topic_id": topic["id"]}),
            )
            .await;
        assert_eq!(placed, CommandResult::Json(json!({"ok": true})));

        let domains = tool_json(toolbox.handle("list_domains", json!({})).await);
        assert_eq!(domains, json!(["Shopping"]));

        let context = store.get_detail_context(&detail.id).await.unwrap().unwrap();
        assert_eq!(context.topics[0].text, "kitchen gear");
        assert!(context.topics[0].has_embedding());
    }
}
