use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::backends::{Backends, KeywordOptions};
use crate::config::Config;
use crate::llm::answer;
use crate::models::{AskParams, AskResponse};
use crate::query;
use crate::search::snippets::{self, SnippetBudget};
use crate::state::AppState;
use crate::translate::{self, Translation};

/// Files retrieved as context for one question.
const ASK_MAX_DOCS: usize = 20;
/// Context lines around each match.
const ASK_CONTEXT_LINES: usize = 10;
/// Files whose snippets are sent to the completion service.
const ASK_SNIPPET_FILES: usize = 10;

/// GET /ask?q= - Free-form question answering over the codebase.
pub async fn ask(
    State(state): State<AppState>,
    Query(params): Query<AskParams>,
) -> (StatusCode, Json<AskResponse>) {
    let Ok(_permit) = state.ask_semaphore.clone().acquire_owned().await else {
        let resp = AskResponse {
            question: params.q,
            error: "Question answering is at capacity".to_string(),
            ..Default::default()
        };
        return (StatusCode::SERVICE_UNAVAILABLE, Json(resp));
    };

    let (status, body) = run_ask(&state.backends, &state.config, params).await;
    (status, Json(body))
}

pub async fn run_ask(
    backends: &Backends,
    config: &Config,
    params: AskParams,
) -> (StatusCode, AskResponse) {
    let question = params.q.trim().to_string();
    let mut resp = AskResponse {
        question: question.clone(),
        ..Default::default()
    };

    if question.is_empty() {
        resp.error = "Query parameter 'q' is required".to_string();
        return (StatusCode::BAD_REQUEST, resp);
    }
    let Some(completion) = backends.completion.as_deref() else {
        resp.error = "No completion service is configured".to_string();
        return (StatusCode::SERVICE_UNAVAILABLE, resp);
    };

    // ── Step 1: Query generation ─────────────────────────────
    let translation = translate::translate(&question, backends, config).await;
    let query = match translation.query() {
        Some(q) if query::is_valid(q) => q.to_string(),
        _ => Translation::pattern(&question).intent.query,
    };
    resp.query = query.clone();

    // ── Step 2: Deep-context retrieval ───────────────────────
    let opts = KeywordOptions {
        max_docs: ASK_MAX_DOCS,
        context_lines: ASK_CONTEXT_LINES,
        whole: false,
    };
    let result = match backends.keyword.search(&query, opts).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("Context search for {query:?} failed: {e:#}");
            resp.error = format!("keyword search failed: {e:#}");
            return (StatusCode::OK, resp);
        }
    };
    resp.file_count = result.file_count();

    let budget = SnippetBudget::from_config(&config.search, ASK_SNIPPET_FILES, ASK_CONTEXT_LINES);
    let found = snippets::extract(&result.files, &budget);
    if found.is_empty() {
        resp.answer = "No matching code was found for this question.".to_string();
        resp.success = true;
        return (StatusCode::OK, resp);
    }

    // ── Step 3: Answer ───────────────────────────────────────
    let context = snippets::render(&found, usize::MAX);
    let timeout = Duration::from_secs(config.ask_timeout_secs);
    match answer::ask(completion, &question, &context, timeout).await {
        Ok(text) => {
            tracing::info!("Answered {question:?} from {} files", found.len());
            resp.answer = text;
            resp.success = true;
        }
        Err(e) => {
            tracing::warn!("Answering {question:?} failed: {e:#}");
            resp.error = format!("completion service failed: {e:#}");
        }
    }
    (StatusCode::OK, resp)
}
