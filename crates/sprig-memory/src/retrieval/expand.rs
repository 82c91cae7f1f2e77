//! Query expansion over small topic vocabularies.

/// A vocabulary: if the query mentions any trigger, every term is added.
struct Vocabulary {
    triggers: &'static [&'static str],
    terms: &'static [&'static str],
}

const FOOD: &[&str] = &[
    "food",
    "eat",
    "eating",
    "restaurant",
    "restaurants",
    "cafe",
    "dinner",
    "lunch",
    "breakfast",
];

const SHOPPING: &[&str] = &[
    "shop",
    "shopping",
    "store",
    "buy",
    "purchase",
    "mall",
    "groceries",
];

const TRAVEL: &[&str] = &["travel", "trip", "flight", "hotel", "vacation", "airport"];

const VOCABULARIES: &[Vocabulary] = &[
    Vocabulary {
        triggers: FOOD,
        terms: FOOD,
    },
    Vocabulary {
        triggers: SHOPPING,
        terms: SHOPPING,
    },
    Vocabulary {
        triggers: TRAVEL,
        terms: TRAVEL,
    },
];

/// Expand a query into lexical search terms.
///
/// The lowercased query comes first, followed by the terms of every
/// vocabulary the query touches. Duplicates are dropped, order is kept.
pub fn expand_query(query: &str) -> Vec<String> {
    let lowered = query.trim().to_lowercase();
    let mut terms: Vec<String> = Vec::new();
    let mut push = |term: &str| {
        if !term.is_empty() && !terms.iter().any(|t| t == term) {
            terms.push(term.to_string());
        }
    };

    push(&lowered);
    for vocabulary in VOCABULARIES {
        if vocabulary.triggers.iter().any(|t| lowered.contains(t)) {
            vocabulary.terms.iter().for_each(|t| push(t));
        }
    }
    terms
}
