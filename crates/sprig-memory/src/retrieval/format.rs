//! Plain-text rendering of retrieval results.

use std::collections::BTreeSet;

use crate::types::MemoryRecord;

/// Text shown in place of results when no record carries a detail.
pub const NO_RELEVANT_MEMORY: &str = "No relevant memory found.";

#[derive(Default)]
struct DetailEntry {
    topics: BTreeSet<String>,
    domains: BTreeSet<String>,
    insights: BTreeSet<String>,
}

/// Render records as numbered detail blocks.
///
/// Details with identical text are coalesced across records; their topics,
/// domains and insights are deduplicated and sorted. Blocks appear in the
/// order each detail text was first seen. Returns an empty string when no
/// record carries a detail.
pub fn format_results(records: &[MemoryRecord]) -> String {
    let mut order: Vec<String> = Vec::new();
    let mut entries: Vec<DetailEntry> = Vec::new();

    for record in records {
        let topic = record.topic.text.trim();
        let domain = record.domain.label.trim();
        let insights: Vec<&str> = record
            .insights
            .iter()
            .map(|i| i.text.trim())
            .filter(|t| !t.is_empty())
            .collect();

        for detail in &record.details {
            let text = detail.text.trim();
            if text.is_empty() {
                continue;
            }
            let idx = match order.iter().position(|t| t == text) {
                Some(idx) => idx,
                None => {
                    order.push(text.to_string());
                    entries.push(DetailEntry::default());
                    entries.len() - 1
                }
            };
            let entry = &mut entries[idx];
            if !topic.is_empty() {
                entry.topics.insert(topic.to_string());
            }
            if !domain.is_empty() {
                entry.domains.insert(domain.to_string());
            }
            entry
                .insights
                .extend(insights.iter().map(|t| t.to_string()));
        }
    }

    let join = |set: &BTreeSet<String>| set.iter().cloned().collect::<Vec<_>>().join(", ");
    let mut lines = Vec::new();
    for (n, (text, entry)) in order.iter().zip(&entries).enumerate() {
        lines.push(format!("{}. Detail: {}", n + 1, text));
        if !entry.topics.is_empty() {
            lines.push(format!("   Topics: {}", join(&entry.topics)));
        }
        if !entry.domains.is_empty() {
            lines.push(format!("   Domains: {}", join(&entry.domains)));
        }
        if !entry.insights.is_empty() {
            lines.push(format!("   Insights: {}", join(&entry.insights)));
        }
    }
    lines.join("\n")
}

/// [`format_results`], or [`NO_RELEVANT_MEMORY`] when that renders nothing.
///
/// Records whose topics have no details still count as "nothing": a caller
/// always gets either detail blocks or the explicit signal.
pub fn recall_text(records: &[MemoryRecord]) -> String {
    let text = format_results(records);
    if text.is_empty() {
        NO_RELEVANT_MEMORY.to_string()
    } else {
        text
    }
}
