//! Count and yes/no answers derived from keyword results.

use std::time::Duration;

use crate::backends::Completion;
use crate::config::SearchConfig;
use crate::llm::answer::answer_from_snippets;
use crate::models::KeywordResult;
use crate::search::snippets::{self, SnippetBudget};

/// Files whose snippets ground a yes/no answer.
const YES_NO_SNIPPET_FILES: usize = 3;

/// Total line matches when there are any, otherwise the number of files.
pub fn canonical_count(result: &KeywordResult) -> usize {
    match result.line_match_count() {
        0 => result.file_count(),
        lines => lines,
    }
}

/// Templated answer for a count question; never delegated to the LLM.
pub fn count_answer(result: Option<&KeywordResult>) -> String {
    let (lines, files) = result.map_or((0, 0), |r| (r.line_match_count(), r.file_count()));
    if lines > 0 {
        format!("Found {lines} item(s).")
    } else if files > 0 {
        format!("Found {files} file(s).")
    } else {
        "Found 0 items.".to_string()
    }
}

/// Templated yes/no answer from a result count.
pub fn templated_yes_no(count: usize) -> String {
    if count > 0 {
        format!("YES, found {count} result(s).")
    } else {
        "NO, no results found.".to_string()
    }
}

/// Yes/no answer: the completion service's reading of the top snippets when
/// it gives one, otherwise the templated answer.
pub async fn yes_no_answer(
    completion: Option<&dyn Completion>,
    question: &str,
    result: Option<&KeywordResult>,
    config: &SearchConfig,
    timeout: Duration,
) -> String {
    let count = result.map_or(0, KeywordResult::file_count);
    if let (Some(completion), Some(result)) = (completion, result) {
        if count > 0 {
            let budget = SnippetBudget::from_config(config, YES_NO_SNIPPET_FILES, 3);
            let found = snippets::extract(&result.files, &budget);
            if !found.is_empty() {
                let context = snippets::render(&found, usize::MAX);
                if let Some(answer) = answer_from_snippets(completion, question, &context, timeout).await {
                    return answer;
                }
            }
        }
    }
    templated_yes_no(count)
}
