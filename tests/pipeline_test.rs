//! End-to-end tests of the `/search` pipeline over fake backends.
//!
//! Each fake records its calls so tests can assert which services a request
//! touched, and can be switched into a failing state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::http::StatusCode;
use parking_lot::Mutex;

use nl_code_search::api::search::run_search;
use nl_code_search::backends::{
    Backends, Completion, CompletionRequest, Embedder, KeywordBackend, KeywordOptions,
    SemanticBackend, VectorStore,
};
use nl_code_search::config::Config;
use nl_code_search::indexer::{self, IndexRun, IndexStatus};
use nl_code_search::models::{
    ChunkKind, IndexedChunk, KeywordMatch, KeywordResult, LineMatch, SearchParams, SemanticMatch,
};
use nl_code_search::translate::pattern::ARTICLE_MARKER_QUERY;

// ── Fakes ────────────────────────────────────────────────

#[derive(Default)]
struct FakeKeyword {
    result: KeywordResult,
    fail: bool,
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl KeywordBackend for FakeKeyword {
    async fn search(&self, query: &str, _opts: KeywordOptions) -> Result<KeywordResult> {
        self.queries.lock().push(query.to_string());
        if self.fail {
            anyhow::bail!("connection refused");
        }
        Ok(self.result.clone())
    }
}

#[derive(Default)]
struct FakeStore {
    count: usize,
    matches: Vec<SemanticMatch>,
    queries: AtomicUsize,
    added: Mutex<Vec<IndexedChunk>>,
}

#[async_trait]
impl VectorStore for FakeStore {
    async fn count(&self) -> Result<usize> {
        Ok(self.count)
    }

    async fn query(&self, _embedding: &[f32], top_k: usize) -> Result<Vec<SemanticMatch>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.matches.iter().take(top_k).cloned().collect())
    }

    async fn add(&self, chunks: &[IndexedChunk], embeddings: &[Vec<f32>]) -> Result<()> {
        anyhow::ensure!(chunks.len() == embeddings.len(), "embedding count mismatch");
        self.added.lock().extend_from_slice(chunks);
        Ok(())
    }
}

#[derive(Default)]
struct FakeEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|_| vec![0.5, 0.5]).collect())
    }
}

struct FakeCompletion {
    reply: Result<String, String>,
    calls: AtomicUsize,
}

impl FakeCompletion {
    fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            reply: Err("502 Bad Gateway".to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Completion for FakeCompletion {
    async fn complete(&self, _req: &CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(|e| anyhow::anyhow!(e))
    }
}

// ── Helpers ──────────────────────────────────────────────

fn make_keyword_result(files: &[&str]) -> KeywordResult {
    let content: String = (1..=10)
        .map(|i| format!("  {{ title: 'Post number {i}', slug: 'post-{i}' }},\n"))
        .collect();
    KeywordResult {
        files: files
            .iter()
            .map(|name| KeywordMatch {
                file_name: name.to_string(),
                repository: "site".to_string(),
                line_matches: vec![
                    LineMatch {
                        line_number: 2,
                        line: "  { title: 'Post number 2', slug: 'post-2' },".to_string(),
                        before: None,
                        after: None,
                    },
                    LineMatch {
                        line_number: 5,
                        line: "  { title: 'Post number 5', slug: 'post-5' },".to_string(),
                        before: None,
                        after: None,
                    },
                ],
                content: Some(content.clone()),
            })
            .collect(),
    }
}

fn make_chunk(file: &str, similarity: f32) -> SemanticMatch {
    SemanticMatch {
        id: format!("{file}-1"),
        file_name: file.to_string(),
        start_line: 1,
        end_line: 12,
        kind: ChunkKind::Function,
        language: "python".to_string(),
        similarity,
        content: "def load_posts():\n    return []".to_string(),
    }
}

fn make_params(q: &str, mode: &str, direct: bool) -> SearchParams {
    SearchParams {
        q: q.to_string(),
        mode: Some(mode.to_string()),
        direct: direct.then(|| "true".to_string()),
    }
}

struct Harness {
    keyword: Arc<FakeKeyword>,
    store: Arc<FakeStore>,
    embedder: Arc<FakeEmbedder>,
    completion: Option<Arc<FakeCompletion>>,
}

impl Harness {
    fn new(keyword: FakeKeyword) -> Self {
        Self {
            keyword: Arc::new(keyword),
            store: Arc::new(FakeStore::default()),
            embedder: Arc::new(FakeEmbedder::default()),
            completion: None,
        }
    }

    fn with_store(mut self, store: FakeStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    fn with_completion(mut self, completion: FakeCompletion) -> Self {
        self.completion = Some(Arc::new(completion));
        self
    }

    fn keyword_only(&self) -> Backends {
        Backends::keyword_only(self.keyword.clone())
    }

    fn backends(&self) -> Backends {
        let mut backends = Backends::keyword_only(self.keyword.clone())
            .with_semantic(self.embedder.clone(), self.store.clone());
        if let Some(completion) = &self.completion {
            backends = backends.with_completion(completion.clone());
        }
        backends
    }

    fn completion_calls(&self) -> usize {
        self.completion
            .as_ref()
            .map_or(0, |c| c.calls.load(Ordering::SeqCst))
    }
}

// ── Translation tiers ────────────────────────────────────

#[tokio::test]
async fn test_count_question_without_completion_uses_pattern_translator() {
    let harness = Harness::new(FakeKeyword {
        result: make_keyword_result(&["src/blogs.js"]),
        ..Default::default()
    });
    let (status, resp) = run_search(
        &harness.keyword_only(),
        &Config::default(),
        make_params("how many articles are there", "keyword", false),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(resp.success);
    assert!(resp.is_nl);
    assert_eq!(resp.translator_used, "pattern");
    assert_eq!(resp.query_type, "count");
    assert_eq!(resp.translated_query, ARTICLE_MARKER_QUERY);
    let intent = resp.intent.unwrap();
    assert_eq!(intent.query, ARTICLE_MARKER_QUERY);
    assert_eq!(intent.confidence, 0.7);
    assert_eq!(resp.result_count, 2);
    assert_eq!(resp.count_answer, "Found 2 item(s).");
}

#[tokio::test]
async fn test_llm_translation_is_used_when_valid() {
    let harness = Harness::new(FakeKeyword {
        result: make_keyword_result(&["src/posts.py"]),
        ..Default::default()
    })
    .with_completion(FakeCompletion::replying(
        "Here is the query:\n```\n<query>lang:python sym:load_posts</query>\n```",
    ));

    let (_, resp) = run_search(
        &harness.backends(),
        &Config::default(),
        make_params("find the function that loads posts in python", "keyword", false),
    )
    .await;

    assert!(resp.success);
    assert_eq!(resp.translator_used, "llm");
    assert_eq!(resp.translated_query, "lang:python sym:load_posts");
    assert_eq!(resp.intent.as_ref().unwrap().query, "lang:python sym:load_posts");
    assert_eq!(resp.intent.unwrap().confidence, 0.95);
    assert!(harness
        .keyword
        .queries
        .lock()
        .contains(&"lang:python sym:load_posts".to_string()));
}

#[tokio::test]
async fn test_failed_completion_falls_back_to_pattern_once() {
    let harness = Harness::new(FakeKeyword {
        result: make_keyword_result(&["src/blogs.js"]),
        ..Default::default()
    })
    .with_completion(FakeCompletion::failing());

    let (_, resp) = run_search(
        &harness.backends(),
        &Config::default(),
        make_params("list all blog posts", "keyword", false),
    )
    .await;

    assert!(resp.success);
    assert_eq!(resp.translator_used, "pattern");
    assert_eq!(resp.query_type, "list");
    assert_eq!(resp.intent.unwrap().query, ARTICLE_MARKER_QUERY);
    assert_eq!(harness.completion_calls(), 1);
}

#[tokio::test]
async fn test_direct_answer_skips_retrieval() {
    let harness = Harness::new(FakeKeyword {
        result: make_keyword_result(&["src/blogs.js"]),
        ..Default::default()
    })
    .with_completion(FakeCompletion::replying(
        "YES, src/blogs.js defines ten blog posts.",
    ));

    let (status, resp) = run_search(
        &harness.backends(),
        &Config::default(),
        make_params("does the site have blog posts?", "hybrid", false),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(resp.success);
    assert_eq!(resp.query_type, "answer");
    assert_eq!(resp.direct_answer, "YES, src/blogs.js defines ten blog posts.");
    assert_eq!(resp.yes_no_answer, resp.direct_answer);
    assert_eq!(resp.translator_used, "llm");
    assert!(resp.translated_query.is_empty());
    assert!(resp.results.is_none());
    assert_eq!(harness.store.queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_yes_no_answer_from_snippets() {
    let harness = Harness::new(FakeKeyword {
        result: make_keyword_result(&["src/blogs.js"]),
        ..Default::default()
    });
    let (_, resp) = run_search(
        &harness.keyword_only(),
        &Config::default(),
        make_params("have I written about rust", "keyword", false),
    )
    .await;

    assert_eq!(resp.query_type, "yesno");
    assert_eq!(resp.translated_query, "rust");
    assert_eq!(resp.yes_no_answer, "YES, found 1 result(s).");
}

// ── Retrieval modes ──────────────────────────────────────

#[tokio::test]
async fn test_unindexed_semantic_search() {
    let harness = Harness::new(FakeKeyword::default())
        .with_store(FakeStore::default())
        .with_completion(FakeCompletion::replying("<query>unused</query>"));

    let (status, resp) = run_search(
        &harness.backends(),
        &Config::default(),
        make_params("where are posts loaded", "semantic", false),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(resp.success);
    assert_eq!(resp.result_count, 0);
    assert_eq!(resp.semantic_result_count, Some(0));
    assert!(resp.note.is_some());
    assert_eq!(harness.embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.store.queries.load(Ordering::SeqCst), 0);
    assert!(harness.keyword.queries.lock().is_empty());
    assert_eq!(harness.completion_calls(), 0);
}

#[tokio::test]
async fn test_hybrid_parse_failure_served_as_semantic_only() {
    let harness = Harness::new(FakeKeyword::default()).with_store(FakeStore {
        count: 3,
        matches: vec![make_chunk("a.py", 0.8)],
        ..Default::default()
    });

    let (status, resp) = run_search(
        &harness.backends(),
        &Config::default(),
        make_params("file:\"blogs.js", "hybrid", true),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(resp.success);
    assert!(resp.note.as_deref().unwrap().contains("semantic results only"));
    assert!(resp.results.is_none());
    assert!(!resp.enhanced);
    assert_eq!(resp.result_count, 1);
    assert_eq!(resp.semantic_results.unwrap()[0].chunk.file_name, "a.py");
    assert!(harness.keyword.queries.lock().is_empty());
}

#[tokio::test]
async fn test_parse_failure_without_semantic_results_is_error() {
    let harness = Harness::new(FakeKeyword::default());
    let (status, resp) = run_search(
        &harness.backends(),
        &Config::default(),
        make_params("file:\"blogs.js", "hybrid", true),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!resp.success);
    assert_eq!(resp.translated_query, "file:\"blogs.js");
    assert!(resp.error.starts_with("Query parse error"));
}

#[tokio::test]
async fn test_hybrid_fusion_boosts_agreeing_file() {
    let harness = Harness::new(FakeKeyword {
        result: make_keyword_result(&["a.py"]),
        ..Default::default()
    })
    .with_store(FakeStore {
        count: 2,
        matches: vec![make_chunk("b.py", 0.95), make_chunk("a.py", 0.9)],
        ..Default::default()
    });

    let (_, resp) = run_search(
        &harness.backends(),
        &Config::default(),
        make_params("load_posts", "hybrid", true),
    )
    .await;

    assert!(resp.success);
    assert!(resp.enhanced);
    let fused = resp.semantic_results.unwrap();
    assert_eq!(fused[0].chunk.file_name, "a.py");
    assert_eq!(fused[0].score, 1.0);
    assert!(fused[0].keyword_match);
    assert_eq!(fused[1].chunk.file_name, "b.py");
    assert_eq!(fused[1].score, 0.95);
    assert!(!fused[1].keyword_match);
}

#[tokio::test]
async fn test_keyword_backend_down_still_answers() {
    let harness = Harness::new(FakeKeyword {
        fail: true,
        ..Default::default()
    });
    let (status, resp) = run_search(
        &harness.keyword_only(),
        &Config::default(),
        make_params("have I written about rust", "hybrid", false),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(!resp.success);
    assert_eq!(resp.result_count, 0);
    assert_eq!(resp.yes_no_answer, "NO, no results found.");
    assert!(resp.error.contains("connection refused"));
}

// ── Indexing ─────────────────────────────────────────────

#[tokio::test]
async fn test_index_run_embeds_every_chunk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::create_dir_all(dir.path().join("node_modules/dep")).unwrap();
    std::fs::write(
        dir.path().join("src/posts.py"),
        "def load_posts():\n    return []\n\n\nclass Post:\n    title = ''\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("node_modules/dep/index.js"), "module.exports = 1;\n").unwrap();
    std::fs::write(dir.path().join("README.md"), "# site\n").unwrap();

    let embedder = Arc::new(FakeEmbedder::default());
    let store = Arc::new(FakeStore::default());
    let semantic = SemanticBackend {
        embedder: embedder.clone(),
        store: store.clone(),
    };
    let status = IndexStatus::default();

    indexer::run(dir.path().to_path_buf(), semantic, true, &status).await;

    let Some(IndexRun::Finished(report)) = status.last_run() else {
        panic!("index run did not finish: {:?}", status.last_run());
    };
    assert_eq!(report.files, 1);
    assert_eq!(report.failed_batches, 0);
    assert!(report.chunks > 0);
    assert_eq!(report.indexed_chunks, report.chunks);
    assert!(!status.is_running());

    let added = store.added.lock();
    assert_eq!(added.len(), report.chunks);
    assert!(added.iter().all(|c| c.file_name == "src/posts.py" && c.language == "python"));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reindexing_same_tree_reuses_chunk_ids() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("a.py"),
        "def load_posts():\n    return []\n",
    )
    .unwrap();

    let store = Arc::new(FakeStore::default());
    let semantic = SemanticBackend {
        embedder: Arc::new(FakeEmbedder::default()),
        store: store.clone(),
    };
    let status = IndexStatus::default();

    indexer::run(dir.path().to_path_buf(), semantic.clone(), true, &status).await;
    indexer::run(dir.path().to_path_buf(), semantic, true, &status).await;

    let added = store.added.lock();
    let Some(IndexRun::Finished(report)) = status.last_run() else {
        panic!("index run did not finish");
    };
    assert_eq!(added.len(), 2 * report.chunks);
    let mut ids: Vec<&str> = added.iter().map(|c| c.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), report.chunks);
}
