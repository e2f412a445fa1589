use serde::{Deserialize, Serialize};

/// Classified purpose of a natural-language question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentType {
    Search,
    Count,
    List,
    Find,
    YesNo,
    Answer,
}

impl IntentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentType::Search => "search",
            IntentType::Count => "count",
            IntentType::List => "list",
            IntentType::Find => "find",
            IntentType::YesNo => "yesno",
            IntentType::Answer => "answer",
        }
    }
}

impl std::fmt::Display for IntentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The intent decided for one request. Built once, never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Intent {
    #[serde(rename = "type")]
    pub kind: IntentType,
    pub entity: String,
    pub topic: String,
    pub confidence: f64,
    pub query: String,
    pub variations: Vec<String>,
}

impl Intent {
    pub fn new(kind: IntentType, query: impl Into<String>, confidence: f64) -> Self {
        Self {
            kind,
            entity: String::new(),
            topic: String::new(),
            confidence: confidence.clamp(0.0, 1.0),
            query: query.into(),
            variations: Vec::new(),
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = entity.into();
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_variations(mut self, variations: Vec<String>) -> Self {
        self.variations = variations;
        self
    }
}

/// What a translator produced: a backend query, or prose that answers the
/// question outright and must not be executed as a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    Query(String),
    DirectAnswer(String),
}

/// Which path decided the final query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslatorTier {
    /// `direct=true`: the caller's text is the query.
    Direct,
    /// Completion-service translation.
    Llm,
    /// Rule-based translation.
    Pattern,
}

impl TranslatorTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslatorTier::Direct => "direct",
            TranslatorTier::Llm => "llm",
            TranslatorTier::Pattern => "pattern",
        }
    }
}

/// Retrieval strategy requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Keyword,
    Semantic,
    #[default]
    Hybrid,
}

impl SearchMode {
    /// Parse a `mode` parameter; blank means the default.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "hybrid" => Some(SearchMode::Hybrid),
            "keyword" => Some(SearchMode::Keyword),
            "semantic" => Some(SearchMode::Semantic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Keyword => "keyword",
            SearchMode::Semantic => "semantic",
            SearchMode::Hybrid => "hybrid",
        }
    }

    pub fn wants_keyword(&self) -> bool {
        matches!(self, SearchMode::Keyword | SearchMode::Hybrid)
    }

    pub fn wants_semantic(&self) -> bool {
        matches!(self, SearchMode::Semantic | SearchMode::Hybrid)
    }
}

/// One matching line reported by the keyword backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineMatch {
    /// 1-based line number.
    pub line_number: usize,
    pub line: String,
    /// Lines preceding the match, newline separated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    /// Lines following the match, newline separated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

/// Keyword hits for a single file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordMatch {
    pub file_name: String,
    pub repository: String,
    pub line_matches: Vec<LineMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Everything the keyword backend returned for one query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordResult {
    pub files: Vec<KeywordMatch>,
}

impl KeywordResult {
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Total line matches across all files.
    pub fn line_match_count(&self) -> usize {
        self.files.iter().map(|f| f.line_matches.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Syntactic kind of an indexed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Function,
    Class,
    Struct,
    Interface,
    #[default]
    Block,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Function => "function",
            ChunkKind::Class => "class",
            ChunkKind::Struct => "struct",
            ChunkKind::Interface => "interface",
            ChunkKind::Block => "block",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "function" => ChunkKind::Function,
            "class" => ChunkKind::Class,
            "struct" => ChunkKind::Struct,
            "interface" => ChunkKind::Interface,
            _ => ChunkKind::Block,
        }
    }
}

/// A chunk returned by the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticMatch {
    pub id: String,
    pub file_name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub kind: ChunkKind,
    pub language: String,
    /// Pre-fusion similarity in [0, 1].
    pub similarity: f32,
    pub content: String,
}

/// A semantic match after fusion with keyword results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FusedMatch {
    pub chunk: SemanticMatch,
    pub score: f32,
    pub similarity: f32,
    /// The keyword backend also matched this chunk's file.
    pub keyword_match: bool,
}

/// Bounded excerpt of one file, used only to ground completion prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub file_name: String,
    pub text: String,
    pub line_count: usize,
}

/// A chunk ready to be embedded and stored.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub id: String,
    pub file_name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub kind: ChunkKind,
    pub language: String,
    pub content: String,
}

/// Query string of `GET /search`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub direct: Option<String>,
}

/// Body of `GET /search`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub original_query: String,
    pub translated_query: String,
    pub generated_query: String,
    pub query_type: String,
    #[serde(rename = "isNL")]
    pub is_nl: bool,
    pub success: bool,
    pub result_count: usize,
    /// Milliseconds.
    pub response_time: u64,
    pub results: Option<KeywordResult>,
    pub yes_no_answer: String,
    pub count_answer: String,
    pub direct_answer: String,
    pub translator_used: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_results: Option<Vec<FusedMatch>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_result_count: Option<usize>,
    pub enhanced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub error: String,
}

/// Query string of `GET /ask`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AskParams {
    #[serde(default)]
    pub q: String,
}

/// Body of `GET /ask`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub question: String,
    pub answer: String,
    pub query: String,
    pub file_count: usize,
    pub success: bool,
    pub error: String,
}

/// Query string of `POST /index`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexParams {
    #[serde(default)]
    pub path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_type_serializes_lowercase() {
        let json = serde_json::to_value(IntentType::YesNo).unwrap();
        assert_eq!(json, "yesno");
    }

    #[test]
    fn test_intent_confidence_clamped() {
        let intent = Intent::new(IntentType::Search, "foo", 1.7);
        assert_eq!(intent.confidence, 1.0);
    }

    #[test]
    fn test_line_match_count_sums_files() {
        let result = KeywordResult {
            files: vec![
                KeywordMatch {
                    file_name: "a.js".into(),
                    line_matches: vec![LineMatch::default(), LineMatch::default()],
                    ..Default::default()
                },
                KeywordMatch {
                    file_name: "b.js".into(),
                    line_matches: vec![LineMatch::default()],
                    ..Default::default()
                },
            ],
        };
        assert_eq!(result.file_count(), 2);
        assert_eq!(result.line_match_count(), 3);
    }

    #[test]
    fn test_search_response_uses_camel_case() {
        let resp = SearchResponse {
            original_query: "q".into(),
            is_nl: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["originalQuery"], "q");
        assert_eq!(json["isNL"], true);
        assert!(json.get("semanticResults").is_none());
    }

    #[test]
    fn test_search_mode_parse() {
        assert_eq!(SearchMode::parse(""), Some(SearchMode::Hybrid));
        assert_eq!(SearchMode::parse("Semantic"), Some(SearchMode::Semantic));
        assert_eq!(SearchMode::parse("keyword"), Some(SearchMode::Keyword));
        assert_eq!(SearchMode::parse("fuzzy"), None);
        assert!(!SearchMode::Semantic.wants_keyword());
        assert!(SearchMode::Hybrid.wants_semantic());
    }
}
