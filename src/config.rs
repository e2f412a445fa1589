use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,
    /// Keyword backend (zoekt-webserver JSON API)
    pub zoekt: ZoektConfig,
    /// Vector store (Chroma HTTP API)
    pub chroma: ChromaConfig,
    /// Embedding service
    pub embedding: EmbeddingConfig,
    /// Completion service used for translation and answers
    pub llm: LlmConfig,
    /// Retrieval, fusion and snippet tuning
    pub search: SearchConfig,
    /// Use tree-sitter chunking when indexing (heuristic chunking otherwise)
    pub use_treesitter: bool,
    /// Health check timeout in seconds
    pub health_timeout_secs: u64,
    /// Timeout for short completion answers (yes/no, early answers)
    pub answer_timeout_secs: u64,
    /// Timeout for free-form `/ask` answers
    pub ask_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoektConfig {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChromaConfig {
    pub url: String,
    pub collection: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "ollama" or "openai"
    pub provider: String,
    pub base_url: String,
    pub model: String,
    /// Only needed for remote providers
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai" (any OpenAI-compatible API, e.g. OpenRouter)
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for query generation and answers
    pub chat_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Nearest chunks requested per semantic query
    pub semantic_top_k: usize,
    /// Score multiplier when keyword and semantic results agree on a file
    pub score_boost: f32,
    /// Similarity multiplier when keyword and semantic results agree on a file
    pub similarity_boost: f32,
    /// Total snippet lines across all files
    pub snippet_total_lines: usize,
    pub snippet_min_lines_per_file: usize,
    pub snippet_max_lines_per_file: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:6071".to_string(),
            zoekt: ZoektConfig::default(),
            chroma: ChromaConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            use_treesitter: true,
            health_timeout_secs: 2,
            answer_timeout_secs: 10,
            ask_timeout_secs: 60,
        }
    }
}

impl Default for ZoektConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6070".to_string(),
            timeout_secs: 5,
        }
    }
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            collection: "codebase_chunks".to_string(),
            timeout_secs: 5,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::local()
    }
}

impl EmbeddingConfig {
    /// Ollama on localhost.
    pub fn local() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            api_key: None,
            timeout_secs: 5,
        }
    }

    /// OpenAI-compatible embeddings via OpenRouter.
    pub fn remote() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://openrouter.ai/api".to_string(),
            model: "openai/text-embedding-ada-002".to_string(),
            api_key: None,
            timeout_secs: 5,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://openrouter.ai/api".to_string(),
            chat_model: "mistralai/mistral-7b-instruct:free".to_string(),
            api_key: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            semantic_top_k: 20,
            score_boost: 1.3,
            similarity_boost: 1.2,
            snippet_total_lines: 100,
            snippet_min_lines_per_file: 15,
            snippet_max_lines_per_file: 20,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("NLSEARCH_BIND_ADDR") {
            config.bind_addr = addr;
        }

        // Keyword backend
        if let Ok(url) = std::env::var("ZOEKT_URL") {
            config.zoekt.url = url;
        }
        if let Ok(val) = std::env::var("ZOEKT_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.zoekt.timeout_secs = v;
            }
        }

        // Vector store
        if let Ok(url) = std::env::var("CHROMA_URL") {
            config.chroma.url = url;
        }
        if let Ok(name) = std::env::var("CHROMA_COLLECTION") {
            config.chroma.collection = name;
        }
        if let Ok(val) = std::env::var("CHROMA_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                config.chroma.timeout_secs = v.max(1);
            }
        }

        // Completion service
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("OPENROUTER_MODEL").or_else(|_| std::env::var("LLM_CHAT_MODEL")) {
            config.llm.chat_model = model;
        }
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY").or_else(|_| std::env::var("LLM_API_KEY")) {
            if !key.is_empty() {
                config.llm.api_key = Some(key);
            }
        }

        // Embeddings: the local/remote toggle picks the defaults, the rest override them
        let use_ollama = std::env::var("USE_OLLAMA")
            .ok()
            .and_then(|v| parse_bool(&v))
            .unwrap_or(true);
        config.embedding = if use_ollama {
            EmbeddingConfig::local()
        } else {
            EmbeddingConfig::remote()
        };
        if use_ollama {
            if let Ok(url) = std::env::var("OLLAMA_URL") {
                config.embedding.base_url = url;
            }
        } else {
            if let Ok(url) = std::env::var("EMBEDDING_BASE_URL") {
                config.embedding.base_url = url;
            }
            config.embedding.api_key = std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .or_else(|| config.llm.api_key.clone());
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(val) = std::env::var("EMBEDDING_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                config.embedding.timeout_secs = v.max(1);
            }
        }

        if let Ok(val) = std::env::var("USE_TREESITTER") {
            if let Some(v) = parse_bool(&val) {
                config.use_treesitter = v;
            }
        }

        // Retrieval tuning
        if let Ok(val) = std::env::var("SEMANTIC_TOP_K") {
            if let Ok(v) = val.parse::<usize>() {
                config.search.semantic_top_k = v.max(1);
            }
        }
        if let Some(v) = std::env::var("FUSION_SCORE_BOOST").ok().and_then(|v| parse_boost(&v)) {
            config.search.score_boost = v;
        }
        if let Some(v) = std::env::var("FUSION_SIMILARITY_BOOST").ok().and_then(|v| parse_boost(&v)) {
            config.search.similarity_boost = v;
        }
        if let Ok(val) = std::env::var("SNIPPET_TOTAL_LINES") {
            if let Ok(v) = val.parse() {
                config.search.snippet_total_lines = v;
            }
        }
        if let Ok(val) = std::env::var("SNIPPET_MIN_LINES_PER_FILE") {
            if let Ok(v) = val.parse() {
                config.search.snippet_min_lines_per_file = v;
            }
        }
        if let Ok(val) = std::env::var("SNIPPET_MAX_LINES_PER_FILE") {
            if let Ok(v) = val.parse() {
                config.search.snippet_max_lines_per_file = v;
            }
        }

        // Timeouts
        if let Ok(val) = std::env::var("HEALTH_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.health_timeout_secs = v;
            }
        }
        if let Ok(val) = std::env::var("ANSWER_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.answer_timeout_secs = v;
            }
        }
        if let Ok(val) = std::env::var("ASK_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.ask_timeout_secs = v;
            }
        }

        config
    }
}

/// A fusion multiplier: finite and at least 1, so agreement never lowers a score.
fn parse_boost(value: &str) -> Option<f32> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 1.0)
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.search.semantic_top_k, 20);
        assert_eq!(config.search.score_boost, 1.3);
        assert_eq!(config.search.similarity_boost, 1.2);
        assert_eq!(config.search.snippet_total_lines, 100);
        assert_eq!(config.embedding.provider, "ollama");
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_parse_boost_rejects_shrinking_values() {
        assert_eq!(parse_boost("1.5"), Some(1.5));
        assert_eq!(parse_boost(" 1 "), Some(1.0));
        assert_eq!(parse_boost("0.5"), None);
        assert_eq!(parse_boost("-2"), None);
        assert_eq!(parse_boost("NaN"), None);
        assert_eq!(parse_boost("inf"), None);
        assert_eq!(parse_boost("fast"), None);
    }

    #[test]
    fn test_backend_timeouts_default_short() {
        let config = Config::default();
        assert_eq!(config.chroma.timeout_secs, 5);
        assert_eq!(config.embedding.timeout_secs, 5);
        assert_eq!(EmbeddingConfig::remote().timeout_secs, 5);
    }
}
