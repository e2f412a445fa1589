//! Coerces free-form completion output into a single query string.
//!
//! Output wrapped in `<query>…</query>` is taken as-is when it parses. Anything
//! else runs through [`STAGES`] in order, then a garbage check with a single
//! terminal fallback, then validation with at most one unwrap pass.

use crate::query;
use crate::translate::terms::key_terms;

/// Longest line still considered a query rather than prose.
const MAX_QUERY_LEN: usize = 200;

/// Phrases that mark a line as explanation instead of a query.
const EXPLANATION_MARKERS: &[&str] = &[
    "converting",
    "searching",
    "analyzing",
    "translating",
    "looking for",
    "here is",
    "here's",
    "this query",
    "explanation",
    "the query",
];

const FIRST_PERSON: &[&str] = &["I ", "I'm ", "I'll ", "I've ", "I'd ", "My ", "We "];

/// Label prefixes models like to put in front of the query, longest first.
const LABELS: &[&str] = &[
    "zoekt query:",
    "search query:",
    "output:",
    "answer:",
    "query:",
];

type Stage = fn(&str) -> String;

/// Cleanup stages, applied in this order.
pub const STAGES: &[(&str, Stage)] = &[
    ("strip_fences", strip_fences),
    ("select_query_line", select_query_line),
    ("strip_labels", strip_labels),
    ("strip_wrapping", strip_wrapping),
    ("balance_quotes", balance_quotes),
];

/// Turns raw completion output into a query candidate.
///
/// Never returns an empty string unless `question` is blank. The result may
/// still fail to parse; the caller decides what to do about that.
pub fn repair(raw: &str, question: &str) -> String {
    let delimited = delimited_field(raw);
    if let Some(inner) = &delimited {
        if query::is_valid(inner) {
            return inner.clone();
        }
    }

    let mut candidate = delimited.unwrap_or_else(|| raw.to_string());
    for (name, stage) in STAGES {
        let next = stage(&candidate);
        if next != candidate {
            tracing::debug!("repair stage {name}: {candidate:?} -> {next:?}");
        }
        candidate = next;
    }

    if is_garbage(&candidate) {
        let terms = key_terms(question).join(" ");
        tracing::debug!("repair produced garbage {candidate:?}, using key terms {terms:?}");
        candidate = if terms.is_empty() {
            question.trim().to_string()
        } else {
            terms
        };
    }

    if let Err(e) = query::parse(&candidate) {
        tracing::debug!("candidate {candidate:?} does not parse ({e}), unwrapping quoted fields");
        candidate = unwrap_quoted_fields(&candidate);
    }

    candidate
}

/// Contents of the first `<query>…</query>` element, trimmed.
pub fn delimited_field(raw: &str) -> Option<String> {
    let start = raw.find("<query>")? + "<query>".len();
    let end = raw[start..].find("</query>")? + start;
    let inner = raw[start..end].trim();
    if inner.is_empty() {
        None
    } else {
        Some(inner.to_string())
    }
}

/// Drops Markdown fence lines; a one-line fenced block keeps its body.
pub fn strip_fences(s: &str) -> String {
    s.lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            if !trimmed.starts_with("```") {
                return Some(line);
            }
            let body = trimmed.trim_start_matches('`');
            if body.ends_with("```") {
                Some(body.trim_end_matches('`'))
            } else {
                None
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Picks the line most likely to be the query.
///
/// Long lines, first-person sentences, explanation lines and bare labels are
/// discarded. Among the rest, the first line carrying a field prefix wins,
/// otherwise the first line. Empty when nothing qualifies.
pub fn select_query_line(s: &str) -> String {
    let candidates: Vec<&str> = s
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| line.chars().count() <= MAX_QUERY_LEN)
        .filter(|line| !FIRST_PERSON.iter().any(|p| line.starts_with(p)))
        .filter(|line| !is_explanation(line))
        .filter(|line| !strip_labels(line).is_empty())
        .collect();

    candidates
        .iter()
        .find(|line| query::has_field_prefix(line))
        .or_else(|| candidates.first())
        .map(|line| line.to_string())
        .unwrap_or_default()
}

/// Removes one known label prefix, case-insensitively.
pub fn strip_labels(s: &str) -> String {
    let trimmed = s.trim();
    let lower = trimmed.to_lowercase();
    for label in LABELS {
        if lower.starts_with(label) {
            // Labels are ASCII, so the byte offset is the same in both strings.
            return trimmed[label.len()..].trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Removes surrounding backticks, and outer quotes when they wrap the whole
/// candidate and nothing inside is quoted.
pub fn strip_wrapping(s: &str) -> String {
    let mut out = s.trim().trim_matches('`').trim();
    for q in ['"', '\''] {
        if out.len() >= 2 && out.starts_with(q) && out.ends_with(q) {
            let inner = &out[1..out.len() - 1];
            if !inner.contains(q) {
                out = inner.trim();
            }
        }
    }
    out.to_string()
}

/// Closes every unterminated double quote.
///
/// Only quotes that open a quoted term count: at the start of a term, after a
/// `-`, or right after a known `field:`. The closing quote goes before the
/// first whitespace or `)` following the opening quote, or at the end of the
/// string. Balanced input is returned unchanged, so applying this twice
/// equals applying it once.
pub fn balance_quotes(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 2);
    let mut word_start = 0;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        i += 1;
        if c.is_whitespace() || c == '(' || c == ')' {
            word_start = i;
            continue;
        }
        if c != '"' || !opens_quote(&chars[word_start..i - 1]) {
            continue;
        }

        // Inside a quoted term: find the close or the first separator.
        let mut separator: Option<usize> = None;
        let mut closed = false;
        let mut dangling_escape = false;
        let mut j = i;
        while j < chars.len() {
            match chars[j] {
                '\\' if j + 1 < chars.len() => j += 2,
                '\\' => {
                    dangling_escape = true;
                    j += 1;
                }
                '"' => {
                    closed = true;
                    break;
                }
                ch if separator.is_none() && (ch.is_whitespace() || ch == ')') => {
                    separator = Some(j);
                    j += 1;
                }
                _ => j += 1,
            }
        }

        if closed {
            out.extend(&chars[i..=j]);
            i = j + 1;
        } else if let Some(sep) = separator {
            out.extend(&chars[i..sep]);
            out.push('"');
            i = sep;
        } else {
            out.extend(&chars[i..]);
            if dangling_escape {
                out.push('\\');
            }
            out.push('"');
            i = chars.len();
        }
        word_start = i;
    }

    out
}

/// Whether a `"` preceded by `prefix` (the current term so far) opens a quoted term.
fn opens_quote(prefix: &[char]) -> bool {
    let word: String = prefix.iter().collect();
    let word = word.trim_start_matches('-');
    word.is_empty()
        || word
            .strip_suffix(':')
            .is_some_and(|name| query::Field::from_name(name).is_some())
}

/// Rewrites `field:"value"` (or a malformed `field:"value`) to `field:value`.
pub fn unwrap_quoted_fields(s: &str) -> String {
    s.split_whitespace()
        .map(|token| {
            let Some((name, value)) = token.split_once(":\"") else {
                return token.to_string();
            };
            let bare_name = name.trim_start_matches(['-', '(']);
            if bare_name.is_empty() || !bare_name.chars().all(|c| c.is_ascii_alphabetic()) {
                return token.to_string();
            }
            let trailing_parens = value.len() - value.trim_end_matches(')').len();
            let core = value.trim_end_matches(')').trim_matches('"');
            format!("{name}:{core}{}", ")".repeat(trailing_parens))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether the cleaned candidate is unusable as a query.
pub fn is_garbage(candidate: &str) -> bool {
    let trimmed = candidate.trim();
    let len = trimmed.chars().count();
    len <= 1 || len > MAX_QUERY_LEN || is_explanation(trimmed)
}

/// Whether `line` reads as prose. Quoted and `/regex/` literals are
/// ignored, so `content:"looking for"` is still a query.
fn is_explanation(line: &str) -> bool {
    let lower = outside_literals(line).to_lowercase();
    EXPLANATION_MARKERS.iter().any(|m| lower.contains(m))
}

/// `line` with the contents of quoted and regex literals blanked out.
fn outside_literals(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut closing: Option<char> = None;
    let mut escaped = false;
    let mut prev = ' ';
    for c in line.chars() {
        match closing {
            Some(end) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == end {
                    closing = None;
                    out.push(' ');
                }
            }
            None if c == '"' => closing = Some('"'),
            None if c == '/' && (prev.is_whitespace() || matches!(prev, ':' | '-' | '(')) => {
                closing = Some('/')
            }
            None => out.push(c),
        }
        prev = c;
    }
    out
}
