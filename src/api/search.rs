use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::backends::Backends;
use crate::config::{parse_bool, Config};
use crate::models::{IntentType, SearchMode, SearchParams, SearchResponse, TranslationOutcome};
use crate::search::answers::{canonical_count, count_answer, templated_yes_no, yes_no_answer};
use crate::search::hybrid::{fuse, unfused, FusionWeights};
use crate::search::orchestrator::{Orchestrator, Retrieval, RetrievalError};
use crate::state::AppState;
use crate::translate::{self, Translation};

/// GET /search?q=&mode=&direct= - Natural-language search:
///   1. Translation (direct, LLM with pattern fallback, or pattern only)
///   2. Keyword and/or semantic retrieval for the mode
///   3. Fusion when both backends returned results
///   4. Count / yes-no answers
///
/// Always answers with a `SearchResponse` body, whatever the status.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> (StatusCode, Json<SearchResponse>) {
    let (status, body) = run_search(&state.backends, &state.config, params).await;
    (status, Json(body))
}

/// The `/search` pipeline, independent of the HTTP layer.
pub async fn run_search(
    backends: &Backends,
    config: &Config,
    params: SearchParams,
) -> (StatusCode, SearchResponse) {
    let started = Instant::now();
    let question = params.q.trim().to_string();
    let mut resp = SearchResponse {
        original_query: question.clone(),
        ..Default::default()
    };

    if question.is_empty() {
        resp.error = "Query parameter 'q' is required".to_string();
        return finish(resp, started, StatusCode::BAD_REQUEST);
    }
    let mode_param = params.mode.as_deref().unwrap_or_default();
    let Some(mode) = SearchMode::parse(mode_param) else {
        resp.error = format!("Invalid mode {mode_param:?}: expected keyword, semantic or hybrid");
        return finish(resp, started, StatusCode::BAD_REQUEST);
    };
    let direct = params
        .direct
        .as_deref()
        .and_then(parse_bool)
        .unwrap_or(false);
    resp.mode = mode.as_str().to_string();

    // ── Step 1: Translation ──────────────────────────────────
    let translation = if direct {
        Translation::direct(&question)
    } else if mode == SearchMode::Semantic {
        // Semantic search embeds the question itself; only the intent is needed.
        Translation::pattern(&question)
    } else {
        translate::translate(&question, backends, config).await
    };
    let intent_kind = translation.intent.kind;
    resp.is_nl = !direct;
    resp.translator_used = translation.tier.as_str().to_string();
    resp.query_type = intent_kind.as_str().to_string();
    resp.intent = Some(translation.intent.clone());

    let keyword_query = match translation.outcome {
        TranslationOutcome::DirectAnswer(answer) => {
            tracing::info!("Answered {question:?} without retrieval");
            resp.yes_no_answer = answer.clone();
            resp.direct_answer = answer;
            resp.success = true;
            return finish(resp, started, StatusCode::OK);
        }
        TranslationOutcome::Query(query) => query,
    };
    resp.translated_query = keyword_query.clone();
    resp.generated_query = keyword_query.clone();

    // ── Step 2: Retrieval ────────────────────────────────────
    let orchestrator = Orchestrator::new(backends, config);
    let retrieval = match orchestrator.retrieve(&question, &keyword_query, mode).await {
        Ok(retrieval) => retrieval,
        Err(e @ RetrievalError::Parse { .. }) => {
            tracing::warn!("Rejected query {keyword_query:?}: {e}");
            resp.error = e.to_string();
            return finish(resp, started, StatusCode::BAD_REQUEST);
        }
        Err(e @ RetrievalError::Keyword(_)) => {
            tracing::warn!("Search for {keyword_query:?} failed: {e}");
            resp.error = e.to_string();
            resp.yes_no_answer = templated_yes_no(0);
            if intent_kind == IntentType::Count {
                resp.count_answer = count_answer(None);
            }
            return finish(resp, started, StatusCode::OK);
        }
    };
    let Retrieval {
        keyword,
        semantic,
        unindexed,
        note,
    } = retrieval;
    resp.note = note;

    // ── Step 3: Fusion ───────────────────────────────────────
    if let Some(semantic) = semantic {
        let fused = match &keyword {
            Some(result) if mode == SearchMode::Hybrid && !result.is_empty() && !semantic.is_empty() => {
                resp.enhanced = true;
                fuse(result, semantic, FusionWeights::from(&config.search))
            }
            _ => unfused(semantic),
        };
        resp.semantic_result_count = Some(fused.len());
        resp.semantic_results = Some(fused);
    }
    if unindexed && resp.note.is_none() {
        resp.note = Some("The semantic index is empty; run POST /index to build it".to_string());
    }

    resp.result_count = match &keyword {
        Some(result) if intent_kind == IntentType::Count => canonical_count(result),
        Some(result) => result.file_count(),
        None => resp.semantic_result_count.unwrap_or(0),
    };

    // ── Step 4: Answers ──────────────────────────────────────
    match intent_kind {
        IntentType::Count => resp.count_answer = count_answer(keyword.as_ref()),
        IntentType::YesNo => {
            resp.yes_no_answer = yes_no_answer(
                backends.completion.as_deref(),
                &question,
                keyword.as_ref(),
                &config.search,
                Duration::from_secs(config.answer_timeout_secs),
            )
            .await;
        }
        _ => {}
    }

    resp.results = keyword;
    resp.success = true;
    tracing::info!(
        "Search {question:?} ({}, {}): {} results",
        resp.mode,
        resp.translator_used,
        resp.result_count
    );
    finish(resp, started, StatusCode::OK)
}

fn finish(
    mut resp: SearchResponse,
    started: Instant,
    status: StatusCode,
) -> (StatusCode, SearchResponse) {
    resp.response_time = started.elapsed().as_millis() as u64;
    (status, resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::backends::{KeywordBackend, KeywordOptions};
    use crate::models::{KeywordMatch, KeywordResult, LineMatch};

    struct FixedKeyword(Result<KeywordResult, String>);

    #[async_trait]
    impl KeywordBackend for FixedKeyword {
        async fn search(&self, _query: &str, _opts: KeywordOptions) -> anyhow::Result<KeywordResult> {
            self.0.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    fn make_backends(result: Result<KeywordResult, String>) -> Backends {
        Backends::keyword_only(Arc::new(FixedKeyword(result)))
    }

    fn make_params(q: &str) -> SearchParams {
        SearchParams {
            q: q.to_string(),
            ..Default::default()
        }
    }

    fn make_result() -> KeywordResult {
        KeywordResult {
            files: vec![KeywordMatch {
                file_name: "src/blogs.js".to_string(),
                line_matches: vec![LineMatch::default(); 3],
                ..Default::default()
            }],
        }
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let (status, resp) =
            run_search(&make_backends(Ok(make_result())), &Config::default(), make_params("   ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!resp.success);
        assert!(!resp.error.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_mode_rejected() {
        let params = SearchParams {
            q: "parser".to_string(),
            mode: Some("fuzzy".to_string()),
            direct: None,
        };
        let (status, resp) = run_search(&make_backends(Ok(make_result())), &Config::default(), params).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(resp.error.contains("fuzzy"));
    }

    #[tokio::test]
    async fn test_direct_query_used_verbatim() {
        let params = SearchParams {
            q: "lang:go sym:main".to_string(),
            mode: Some("keyword".to_string()),
            direct: Some("true".to_string()),
        };
        let (status, resp) = run_search(&make_backends(Ok(make_result())), &Config::default(), params).await;
        assert_eq!(status, StatusCode::OK);
        assert!(resp.success);
        assert!(!resp.is_nl);
        assert_eq!(resp.translated_query, "lang:go sym:main");
        assert_eq!(resp.translator_used, "direct");
        assert_eq!(resp.result_count, 1);
    }

    #[tokio::test]
    async fn test_count_uses_line_matches() {
        let params = SearchParams {
            q: "how many articles are there".to_string(),
            mode: Some("keyword".to_string()),
            direct: None,
        };
        let (_, resp) = run_search(&make_backends(Ok(make_result())), &Config::default(), params).await;
        assert_eq!(resp.query_type, "count");
        assert_eq!(resp.result_count, 3);
        assert_eq!(resp.count_answer, "Found 3 item(s).");
    }

    #[tokio::test]
    async fn test_keyword_failure_is_structured() {
        let params = SearchParams {
            q: "have I written about rust".to_string(),
            mode: Some("keyword".to_string()),
            direct: None,
        };
        let (status, resp) =
            run_search(&make_backends(Err("connection refused".to_string())), &Config::default(), params).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!resp.success);
        assert!(resp.error.contains("connection refused"));
        assert_eq!(resp.yes_no_answer, "NO, no results found.");
        assert_eq!(resp.result_count, 0);
    }

    #[tokio::test]
    async fn test_unparsable_direct_query_is_bad_request() {
        let params = SearchParams {
            q: "file:\"blogs.js".to_string(),
            mode: Some("keyword".to_string()),
            direct: Some("1".to_string()),
        };
        let (status, resp) = run_search(&make_backends(Ok(make_result())), &Config::default(), params).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.translated_query, "file:\"blogs.js");
        assert!(resp.error.starts_with("Query parse error"));
    }
}
