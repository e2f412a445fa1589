//! Answers phrased by the completion service from retrieved snippets.

use std::time::Duration;

use anyhow::Result;

use crate::backends::{Completion, CompletionRequest};

/// Snippet context sent with a short answer request.
const ANSWER_CONTEXT_CHARS: usize = 2000;

/// Snippet context sent with a free-form `/ask` request.
const ASK_CONTEXT_CHARS: usize = 8000;

const ANSWER_SYSTEM_PROMPT: &str = "You are a code analysis assistant. Answer questions about \
     code directly and concisely based on the provided code snippets.";

const ASK_SYSTEM_PROMPT: &str = "You are a code analysis assistant. Answer the user's question \
     about their codebase using only the provided code snippets. Reference file names when \
     relevant. If the snippets do not contain the answer, say so.";

/// Short yes/no style answer grounded in `context`.
///
/// Any failure, or an empty reply, is `None`: callers fall back to a
/// templated answer.
pub async fn answer_from_snippets(
    completion: &dyn Completion,
    question: &str,
    context: &str,
    timeout: Duration,
) -> Option<String> {
    if context.trim().is_empty() {
        return None;
    }

    let context = crate::search::snippets::truncate_with_marker(context, ANSWER_CONTEXT_CHARS);
    let user = format!(
        "Based on the following code snippets from the codebase, answer this question \
         directly and concisely.\n\n\
         CODE SNIPPETS:\n{context}\n\n\
         QUESTION: {question}\n\n\
         Answer the question directly. Start with YES or NO, then explain briefly. \
         Be specific and reference the code if relevant.\n\nAnswer:"
    );

    let req = CompletionRequest {
        system: ANSWER_SYSTEM_PROMPT.to_string(),
        user,
        temperature: 0.3,
        max_tokens: 150,
        timeout,
    };

    match completion.complete(&req).await {
        Ok(answer) if !answer.trim().is_empty() => Some(answer.trim().to_string()),
        Ok(_) => {
            tracing::debug!("Completion service returned an empty answer");
            None
        }
        Err(e) => {
            tracing::warn!("Answer from snippets failed: {e:#}");
            None
        }
    }
}

/// Free-form answer for `/ask`; errors propagate to the handler.
pub async fn ask(
    completion: &dyn Completion,
    question: &str,
    context: &str,
    timeout: Duration,
) -> Result<String> {
    let context = crate::search::snippets::truncate_with_marker(context, ASK_CONTEXT_CHARS);
    let user = format!(
        "CODE SNIPPETS:\n{context}\n\nQUESTION: {question}\n\nAnswer:"
    );

    let req = CompletionRequest {
        system: ASK_SYSTEM_PROMPT.to_string(),
        user,
        temperature: 0.3,
        max_tokens: 800,
        timeout,
    };

    let answer = completion.complete(&req).await?;
    if answer.trim().is_empty() {
        anyhow::bail!("Completion service returned an empty answer");
    }
    Ok(answer.trim().to_string())
}
