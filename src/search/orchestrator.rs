//! Mode-driven retrieval across the keyword and semantic backends.

use thiserror::Error;

use crate::backends::{Backends, KeywordOptions};
use crate::config::Config;
use crate::models::{KeywordResult, SearchMode, SemanticMatch};
use crate::query::{self, ParseError};

/// Files requested from the keyword backend per search.
const KEYWORD_MAX_DOCS: usize = 100;
/// Context lines requested so matches can be turned into snippets.
const KEYWORD_CONTEXT_LINES: usize = 3;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Query parse error: {source}")]
    Parse {
        query: String,
        #[source]
        source: ParseError,
    },
    #[error("keyword search failed: {0:#}")]
    Keyword(anyhow::Error),
}

/// What each backend contributed to one request.
#[derive(Debug, Default)]
pub struct Retrieval {
    /// `None` when keyword search was not run.
    pub keyword: Option<KeywordResult>,
    /// `None` when semantic search was not requested or is unavailable.
    pub semantic: Option<Vec<SemanticMatch>>,
    /// The vector store reported an empty collection.
    pub unindexed: bool,
    /// Explains a degraded response.
    pub note: Option<String>,
}

impl Retrieval {
    fn semantic_hits(&self) -> usize {
        self.semantic.as_ref().map_or(0, Vec::len)
    }
}

/// Issues the backend calls a [`SearchMode`] asks for.
pub struct Orchestrator<'a> {
    backends: &'a Backends,
    config: &'a Config,
}

impl<'a> Orchestrator<'a> {
    pub fn new(backends: &'a Backends, config: &'a Config) -> Self {
        Self { backends, config }
    }

    /// Run retrieval for `mode`.
    ///
    /// `question` is embedded for semantic search; `keyword_query` goes to the
    /// keyword backend. In hybrid mode a keyword failure (unparsable query or
    /// backend error) is tolerated when semantic results exist.
    pub async fn retrieve(
        &self,
        question: &str,
        keyword_query: &str,
        mode: SearchMode,
    ) -> Result<Retrieval, RetrievalError> {
        let parsed = if mode.wants_keyword() {
            Some(query::parse(keyword_query))
        } else {
            None
        };

        let keyword_future = async {
            match &parsed {
                Some(Ok(_)) => Some(self.keyword(keyword_query).await),
                _ => None,
            }
        };
        let semantic_future = async {
            if mode.wants_semantic() {
                self.semantic(question).await
            } else {
                (None, false)
            }
        };
        let (keyword, (semantic, unindexed)) = tokio::join!(keyword_future, semantic_future);

        let mut retrieval = Retrieval {
            keyword: None,
            semantic,
            unindexed,
            note: None,
        };

        match (parsed, keyword) {
            (None, _) => {}
            (Some(Err(source)), _) => {
                if mode == SearchMode::Hybrid && retrieval.semantic_hits() > 0 {
                    tracing::warn!("Keyword query {keyword_query:?} rejected ({source}); serving semantic results");
                    retrieval.note = Some(format!(
                        "Keyword query could not be parsed ({source}); showing semantic results only"
                    ));
                } else {
                    return Err(RetrievalError::Parse {
                        query: keyword_query.to_string(),
                        source,
                    });
                }
            }
            (Some(Ok(_)), Some(Ok(result))) => retrieval.keyword = Some(result),
            (Some(Ok(_)), Some(Err(e))) => {
                if mode == SearchMode::Hybrid && retrieval.semantic_hits() > 0 {
                    tracing::warn!("Keyword search failed ({e:#}); serving semantic results");
                    retrieval.note =
                        Some("Keyword search failed; showing semantic results only".to_string());
                } else {
                    return Err(RetrievalError::Keyword(e));
                }
            }
            (Some(Ok(_)), None) => {}
        }

        Ok(retrieval)
    }

    async fn keyword(&self, keyword_query: &str) -> anyhow::Result<KeywordResult> {
        let opts = KeywordOptions {
            max_docs: KEYWORD_MAX_DOCS,
            context_lines: KEYWORD_CONTEXT_LINES,
            whole: false,
        };
        let result = self.backends.keyword.search(keyword_query, opts).await?;
        tracing::info!(
            "Keyword search {keyword_query:?}: {} files, {} line matches",
            result.file_count(),
            result.line_match_count()
        );
        Ok(result)
    }

    /// Nearest chunks for `question`, and whether the collection was empty.
    async fn semantic(&self, question: &str) -> (Option<Vec<SemanticMatch>>, bool) {
        let Some(semantic) = &self.backends.semantic else {
            tracing::debug!("Semantic search requested but unavailable");
            return (None, false);
        };

        match semantic.store.count().await {
            Ok(0) => {
                tracing::info!("Vector store is empty; no semantic results");
                return (Some(Vec::new()), true);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Vector store count failed: {e:#}");
                return (None, false);
            }
        }

        let embedding = match semantic.embedder.embed(question).await {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!("Embedding the question failed: {e:#}");
                return (None, false);
            }
        };

        match semantic
            .store
            .query(&embedding, self.config.search.semantic_top_k)
            .await
        {
            Ok(matches) => {
                tracing::info!("Semantic search found {} chunks", matches.len());
                (Some(matches), false)
            }
            Err(e) => {
                tracing::warn!("Vector store query failed: {e:#}");
                (None, false)
            }
        }
    }
}
