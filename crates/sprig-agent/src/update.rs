//! Placing new details in the Domain -> Topic -> Detail hierarchy.
//!
//! Two paths:
//!
//! - [`UpdateWorkflow::remember`] asks the reasoner once for a domain and a
//!   topic, then writes everything in one transaction.
//! - [`UpdateWorkflow::negotiate`] creates the detail first and lets the
//!   reasoner place it with the placement toolset. A detail left without a
//!   topic is attached to the `General` domain.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sprig_llm::SharedEmbedder;
use sprig_memory::{
    ClusterInsert, ClusterInsertResult, Detail, Domain, GENERAL_DOMAIN, GraphStore, Topic,
};
use tracing::{debug, info, warn};

use crate::error::{AgentError, Result};
use crate::prompt::{JSON_ONLY_SYSTEM, classification_prompt, placement_prompt};
use crate::reasoner::Reasoner;
use crate::tool::{MemoryToolbox, Toolset};

/// Longest fallback topic, in characters.
const FALLBACK_TOPIC_CHARS: usize = 200;

/// Domain and topic chosen for a detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub domain: String,
    pub topic: String,
}

#[derive(Debug, Deserialize)]
struct ClassificationAnswer {
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    topic: Option<String>,
}

/// The detail's text on one line, cut to 200 characters.
pub fn fallback_topic(detail_text: &str) -> String {
    detail_text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(FALLBACK_TOPIC_CHARS)
        .collect()
}

/// Read the classifier's answer, falling back to `General` and the detail
/// text when it is unusable. Tolerates prose or code fences around the JSON.
pub fn parse_classification(answer: &str, detail_text: &str) -> Classification {
    let json = match (answer.find('{'), answer.rfind('}')) {
        (Some(start), Some(end)) if start < end => &answer[start..=end],
        _ => answer,
    };
    let parsed: Option<ClassificationAnswer> = serde_json::from_str(json).ok();
    let non_empty = |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    match parsed {
        Some(answer) => match non_empty(answer.topic) {
            Some(topic) => Classification {
                domain: non_empty(answer.domain).unwrap_or_else(|| GENERAL_DOMAIN.to_string()),
                topic,
            },
            None => fallback_classification(detail_text),
        },
        None => fallback_classification(detail_text),
    }
}

fn fallback_classification(detail_text: &str) -> Classification {
    Classification {
        domain: GENERAL_DOMAIN.to_string(),
        topic: fallback_topic(detail_text),
    }
}

/// Where a negotiated detail ended up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiatedPlacement {
    pub detail: Detail,
    pub topics: Vec<Topic>,
    pub domains: Vec<Domain>,
    pub response: String,
    /// True when the detail had to be attached to the fallback topic.
    pub used_fallback: bool,
}

/// Writes new details into the memory graph.
pub struct UpdateWorkflow {
    store: Arc<GraphStore>,
    embedder: SharedEmbedder,
    reasoner: Arc<dyn Reasoner>,
}

impl UpdateWorkflow {
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

    /// Ask the reasoner for a domain and topic for `detail_text`.
    pub async fn classify(&self, detail_text: &str) -> Result<Classification> {
        let labels = self.store.list_domain_labels().await?;
        let prompt = classification_prompt(detail_text, &labels);
        let answer = self.reasoner.ask(JSON_ONLY_SYSTEM, &prompt).await?;
        let classification = parse_classification(&answer, detail_text);
        debug!(
            domain = %classification.domain,
            topic = %classification.topic,
            "Classified detail"
        );
        Ok(classification)
    }

    /// Classify, embed and store a detail in one write.
    pub async fn remember(&self, detail_text: &str, source: &str) -> Result<ClusterInsertResult> {
        let classification = self.classify(detail_text).await?;

        let mut vectors = self
            .embedder
            .embed_batch(&[classification.topic.as_str(), detail_text])
            .await?
            .into_iter();
        let (Some(topic_embedding), Some(detail_embedding)) = (vectors.next(), vectors.next())
        else {
            return Err(AgentError::tool("embedder returned too few vectors"));
        };

        let result = self
            .store
            .insert_cluster_topic_detail(
                ClusterInsert::new(
                    classification.domain,
                    classification.topic,
                    detail_text,
                    source,
                )
                .with_embeddings(topic_embedding, detail_embedding),
            )
            .await?;
        info!(
            domain = %result.domain.label,
            topic = %result.topic.text,
            detail_id = %result.detail.id,
            "Remembered detail"
        );
        Ok(result)
    }

    /// Create the detail, then let the reasoner place it.
    ///
    /// The detail never stays orphaned: if the reasoner fails or leaves it
    /// without a topic, it goes under the `General` domain first and any
    /// reasoner error is returned afterwards.
    pub async fn negotiate(&self, detail_text: &str, source: &str) -> Result<NegotiatedPlacement> {
        let embedding = self.embedder.embed(detail_text).await?;
        let detail = self
            .store
            .create_detail(detail_text, source, Some(embedding))
            .await?;

        let labels = self.store.list_domain_labels().await?;
        let toolbox =
            MemoryToolbox::new(self.store.clone(), self.embedder.clone(), Toolset::Placement);
        let run = self
            .reasoner
            .run(&placement_prompt(&detail, &labels), &toolbox)
            .await;

        let mut context = self.context(&detail.id).await?;
        let used_fallback = context.topics.is_empty();
        if used_fallback {
            warn!(detail_id = %detail.id, "Detail left unplaced, attaching to fallback topic");
            self.attach_fallback(&detail).await?;
            context = self.context(&detail.id).await?;
        }
        let response = run?;

        Ok(NegotiatedPlacement {
            detail: context.detail,
            topics: context.topics,
            domains: context.domains,
            response,
            used_fallback,
        })
    }

    async fn context(&self, detail_id: &str) -> Result<sprig_memory::DetailContext> {
        self.store
            .get_detail_context(detail_id)
            .await?
            .ok_or_else(|| AgentError::DetailNotFound(detail_id.to_string()))
    }

    async fn attach_fallback(&self, detail: &Detail) -> Result<()> {
        let text = fallback_topic(&detail.text);
        let embedding = self.embedder.embed(&text).await?;
        let domain = self.store.create_domain(GENERAL_DOMAIN).await?;
        let topic = self.store.create_topic(&text, Some(embedding)).await?;
        self.store.link_topic_to_domain(&topic.id, &domain.id).await?;
        self.store.link_detail_to_topic(&detail.id, &topic.id).await?;
        Ok(())
    }
}
