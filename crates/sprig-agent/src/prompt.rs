//! Prompt text for the memory workflows.

use sprig_memory::{Detail, DetailContext, Insight};

/// System prompt for single-shot JSON answers.
pub const JSON_ONLY_SYSTEM: &str = "You output only valid JSON.";

/// Domain labels shown to the classifier.
pub const MAX_LISTED_DOMAINS: usize = 20;

fn or_none(items: Vec<String>) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

/// Render a detail's surroundings for the insight organizer.
pub fn format_detail_context(context: &DetailContext, insights: &[Insight]) -> String {
    let topics = context
        .topics
        .iter()
        .map(|t| format!("{}: {}", t.id, t.text))
        .collect();
    let domains = context.domains.iter().map(|d| d.label.clone()).collect();
    let insights = insights
        .iter()
        .map(|i| format!("{}: {}", i.id, i.text))
        .collect();

    [
        format!("Detail ID: {}", context.detail.id),
        format!("Detail Text: {}", context.detail.text),
        format!("Topics: {}", or_none(topics)),
        format!("Domains: {}", or_none(domains)),
        format!("Existing insights: {}", or_none(insights)),
    ]
    .join("\n")
}

/// Instructions for consolidating one pending detail.
pub fn insight_prompt(context: &DetailContext, insights: &[Insight]) -> String {
    [
        "You are an insight organizer.",
        "Goal: attach 1-2 concise insights to the detail below.",
        "Insights must be short (4-12 words) and reusable.",
        "Prefer linking to existing insights if they already match.",
        "If a topic can be generalized, you may update an existing insight.",
        "Always use IDs from the context (never use raw text as IDs).",
        "Use tools to create/link/update insights, then mark the detail processed.",
        "",
        format_detail_context(context, insights).as_str(),
    ]
    .join("\n")
}

/// Single-shot classification of a new detail into a domain and topic.
pub fn classification_prompt(detail_text: &str, domain_labels: &[String]) -> String {
    let listed: Vec<&str> = domain_labels
        .iter()
        .take(MAX_LISTED_DOMAINS)
        .map(String::as_str)
        .collect();
    let listed = if listed.is_empty() {
        "(none)".to_string()
    } else {
        listed.join(", ")
    };

    format!(
        "You are organizing memory details into broad domains and topics. \
         Given the existing domain labels, pick the best domain or create a new short label (1-3 words). \
         Also write a concise topic for the detail (3-8 words).\n\n\
         Existing domains: {listed}\n\
         Detail: {detail_text}\n\n\
         Return JSON: {{\"domain\": \"...\", \"topic\": \"...\"}}"
    )
}

/// Instructions for placing a freshly created detail in the hierarchy.
pub fn placement_prompt(detail: &Detail, domain_labels: &[String]) -> String {
    let listed = or_none(
        domain_labels
            .iter()
            .take(MAX_LISTED_DOMAINS)
            .cloned()
            .collect(),
    );
    [
        "You are placing a new memory detail into a Domain -> Topic -> Detail hierarchy.",
        "Reuse an existing domain and topic when one fits; otherwise create them.",
        "Domains are broad (1-3 words). Topics are concise (3-8 words).",
        "Use list_topics to find existing topics before creating a new one.",
        "Link the topic to its domain and the detail to its topic, using IDs returned by the tools.",
        "",
        format!("Existing domains: {listed}").as_str(),
        format!("Detail ID: {}", detail.id).as_str(),
        format!("Detail Text: {}", detail.text).as_str(),
    ]
    .join("\n")
}
