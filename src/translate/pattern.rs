//! Rule-based translation. Total: every input yields a parseable query.

use crate::models::{Intent, IntentType};
use crate::query;
use crate::translate::terms::{entity_of, key_terms, topic_of};

/// Query matching the `title:` field of blog/article data structures.
pub const ARTICLE_MARKER_QUERY: &str = "title:";

/// Confidence reported for rule-based translations.
pub const PATTERN_CONFIDENCE: f64 = 0.7;

/// Query used when the input is blank; matches any line.
const MATCH_ANYTHING: &str = ".";

/// Maps free text to a query and intent type.
///
/// Rules, first match wins (on the lowercased text):
/// - "how many" + article/blog: count, marker query
/// - "list" + article/blog: list, marker query
/// - "find" + "about X": find, `X`
/// - "find" + article/blog: find, marker query
/// - "have"/"written about" + "about X": yes/no, `X`
/// - anything else: search, the trimmed text
pub fn translate(text: &str) -> (String, IntentType) {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();
    let mentions_articles = lower.contains("article") || lower.contains("blog");

    let (candidate, kind) = if lower.contains("how many") && mentions_articles {
        (ARTICLE_MARKER_QUERY.to_string(), IntentType::Count)
    } else if lower.contains("list") && mentions_articles {
        (ARTICLE_MARKER_QUERY.to_string(), IntentType::List)
    } else if lower.contains("find") && !topic_of(&lower).is_empty() {
        (topic_of(&lower).to_string(), IntentType::Find)
    } else if lower.contains("find") && mentions_articles {
        (ARTICLE_MARKER_QUERY.to_string(), IntentType::Find)
    } else if (lower.contains("have") || lower.contains("written about")) && lower.contains("about") {
        (yes_no_topic(&lower), IntentType::YesNo)
    } else {
        (trimmed.to_string(), IntentType::Search)
    };

    (ensure_parseable(candidate), kind)
}

/// Rule-based [`Intent`] for `text`.
pub fn intent(text: &str) -> Intent {
    let (query, kind) = translate(text);
    let lower = text.trim().to_lowercase();
    let terms = key_terms(text).join(" ");
    let variations = if terms.is_empty() || terms == query {
        Vec::new()
    } else {
        vec![terms]
    };
    Intent::new(kind, query, PATTERN_CONFIDENCE)
        .with_entity(entity_of(&lower))
        .with_topic(topic_of(&lower))
        .with_variations(variations)
}

fn yes_no_topic(lower: &str) -> String {
    let topic = topic_of(lower);
    let topic = topic.strip_suffix(" in articles").unwrap_or(topic);
    let topic = topic.strip_suffix(" or not").unwrap_or(topic).trim();
    if topic.is_empty() {
        ARTICLE_MARKER_QUERY.to_string()
    } else {
        topic.to_string()
    }
}

fn ensure_parseable(candidate: String) -> String {
    if candidate.is_empty() {
        return MATCH_ANYTHING.to_string();
    }
    if query::is_valid(&candidate) {
        candidate
    } else {
        query::literal(&candidate)
    }
}
