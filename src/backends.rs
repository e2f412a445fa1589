//! Capability traits for the external services, and the [`Backends`] object
//! that records which of them are usable for this process.
//!
//! Availability is decided once at startup by [`Backends::detect`]; everything
//! downstream receives the capability object and never consults globals.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Config;
use crate::models::{IndexedChunk, KeywordResult, SemanticMatch};

/// Options for one keyword backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordOptions {
    /// Maximum files returned
    pub max_docs: usize,
    /// Context lines before and after each match
    pub context_lines: usize,
    /// Return whole file contents
    pub whole: bool,
}

impl Default for KeywordOptions {
    fn default() -> Self {
        Self {
            max_docs: 50,
            context_lines: 0,
            whole: false,
        }
    }
}

/// Keyword code search (zoekt).
#[async_trait]
pub trait KeywordBackend: Send + Sync {
    async fn search(&self, query: &str, opts: KeywordOptions) -> Result<KeywordResult>;
}

/// Nearest-neighbour store of embedded chunks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Number of stored chunks.
    async fn count(&self) -> Result<usize>;

    /// The `top_k` nearest chunks, most similar first.
    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SemanticMatch>>;

    /// Store chunks with their embeddings. `embeddings` is parallel to `chunks`.
    async fn add(&self, chunks: &[IndexedChunk], embeddings: &[Vec<f32>]) -> Result<()>;
}

/// Text embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))
    }
}

/// One non-streaming chat completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// LLM completion service.
#[async_trait]
pub trait Completion: Send + Sync {
    /// Raw text output of the model.
    async fn complete(&self, req: &CompletionRequest) -> Result<String>;
}

/// Embedder and vector store, usable only together.
#[derive(Clone)]
pub struct SemanticBackend {
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
}

/// Which external services this process may use.
#[derive(Clone)]
pub struct Backends {
    /// Always present: keyword-only operation must remain possible.
    pub keyword: Arc<dyn KeywordBackend>,
    pub semantic: Option<SemanticBackend>,
    pub completion: Option<Arc<dyn Completion>>,
}

impl Backends {
    /// Keyword search only.
    pub fn keyword_only(keyword: Arc<dyn KeywordBackend>) -> Self {
        Self {
            keyword,
            semantic: None,
            completion: None,
        }
    }

    pub fn with_semantic(mut self, embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        self.semantic = Some(SemanticBackend { embedder, store });
        self
    }

    pub fn with_completion(mut self, completion: Arc<dyn Completion>) -> Self {
        self.completion = Some(completion);
        self
    }

    /// Check every configured service once and build the capability object.
    pub async fn detect(config: &Config, client: &reqwest::Client) -> Self {
        use crate::llm::completion::ChatCompletion;
        use crate::llm::embeddings::HttpEmbedder;
        use crate::search::vector::ChromaStore;
        use crate::search::zoekt::ZoektClient;

        let timeout = Duration::from_secs(config.health_timeout_secs);

        let zoekt = ZoektClient::new(client.clone(), &config.zoekt);
        if is_reachable(client, &config.zoekt.url, timeout).await {
            tracing::info!("Keyword backend available at {}", config.zoekt.url);
        } else {
            tracing::warn!(
                "Keyword backend not reachable at {}; keyword searches will report errors",
                config.zoekt.url
            );
        }
        let mut backends = Self::keyword_only(Arc::new(zoekt));

        let chroma_up = is_reachable(
            client,
            &format!("{}/api/v1/heartbeat", config.chroma.url),
            timeout,
        )
        .await;
        let embedder_up = match config.embedding.provider.as_str() {
            "ollama" => {
                is_reachable(
                    client,
                    &format!("{}/api/tags", config.embedding.base_url),
                    timeout,
                )
                .await
            }
            _ => config.embedding.api_key.is_some(),
        };
        if chroma_up && embedder_up {
            tracing::info!(
                "Semantic search enabled ({} via {}, collection '{}')",
                config.embedding.model,
                config.embedding.provider,
                config.chroma.collection
            );
            backends = backends.with_semantic(
                Arc::new(HttpEmbedder::new(client.clone(), config.embedding.clone())),
                Arc::new(ChromaStore::new(client.clone(), config.chroma.clone())),
            );
        } else {
            tracing::warn!(
                "Semantic search disabled (vector store up: {chroma_up}, embeddings up: {embedder_up})"
            );
        }

        let completion_up = match config.llm.provider.as_str() {
            "ollama" => {
                is_reachable(client, &format!("{}/api/tags", config.llm.base_url), timeout).await
            }
            _ => config.llm.api_key.is_some(),
        };
        if completion_up {
            tracing::info!(
                "LLM translation enabled ({} via {})",
                config.llm.chat_model,
                config.llm.provider
            );
            backends = backends.with_completion(Arc::new(ChatCompletion::new(
                client.clone(),
                config.llm.clone(),
            )));
        } else {
            tracing::warn!("No completion service configured; using pattern translation only");
        }

        backends
    }
}

async fn is_reachable(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    match client.get(url).timeout(timeout).send().await {
        Ok(resp) => resp.status().is_success(),
        Err(e) => {
            tracing::debug!("Health check of {url} failed: {e}");
            false
        }
    }
}
