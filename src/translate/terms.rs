/// Words that never make useful search terms on their own.
const STOP_WORDS: &[&str] = &[
    "how", "much", "many", "does", "do", "have", "has", "is", "are", "the", "a", "an", "what",
    "where", "when", "which", "who", "find", "show", "list", "get", "search", "for", "in", "on",
    "at", "to", "of", "and", "or",
];

const PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '(', ')', '[', ']', '{', '}', '\'', '"',
];

/// Distinct lowercase tokens of at least three characters, stop words removed,
/// in order of first appearance.
pub fn key_terms(question: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in question.to_lowercase().split_whitespace() {
        let word = word.trim_matches(PUNCTUATION);
        if word.chars().count() < 3 || STOP_WORDS.contains(&word) {
            continue;
        }
        if !terms.iter().any(|t| t == word) {
            terms.push(word.to_string());
        }
    }
    terms
}

/// Nouns recognized as the subject of a question, mapped to a singular entity.
const ENTITIES: &[(&str, &str)] = &[
    ("article", "article"),
    ("blog", "blog"),
    ("function", "function"),
    ("class", "class"),
    ("file", "file"),
    ("component", "component"),
    ("test", "test"),
    ("endpoint", "endpoint"),
];

/// First known entity noun mentioned in `lower`, e.g. "blog" for "list my blogs".
pub fn entity_of(lower: &str) -> &'static str {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .find_map(|word| {
            ENTITIES
                .iter()
                .find(|(noun, _)| word == *noun || word.strip_suffix('s') == Some(noun))
                .map(|(_, entity)| *entity)
        })
        .unwrap_or("")
}

/// Text following the first " about ", with trailing punctuation removed.
pub fn topic_of(lower: &str) -> &str {
    lower
        .split_once(" about ")
        .map(|(_, rest)| rest.trim().trim_end_matches(['?', '.', '!']).trim())
        .unwrap_or("")
}
