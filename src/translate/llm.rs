//! Completion-service translation, grounded in the indexed codebase.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::backends::{Completion, CompletionRequest, KeywordBackend, KeywordOptions};
use crate::config::{Config, SearchConfig};
use crate::llm::answer::answer_from_snippets;
use crate::models::{Intent, IntentType, Snippet, TranslationOutcome};
use crate::query;
use crate::query::repair::repair;
use crate::search::snippets::{self, SnippetBudget};
use crate::translate::terms::{entity_of, key_terms, topic_of};
use crate::translate::TranslateError;

/// Confidence reported when the completion service produced the query.
pub const LLM_CONFIDENCE: f64 = 0.95;

/// Confidence reported for answers produced from grounding snippets.
pub const DIRECT_ANSWER_CONFIDENCE: f64 = 0.9;

const SNIPPETS_MAX_CHARS: usize = 1500;
const STRUCTURE_MAX_CHARS: usize = 1000;
const MAX_GROUNDING_SNIPPETS: usize = 5;
const MAX_SAMPLE_PATTERNS: usize = 15;
/// Rendered grounding shorter than this is not worth answering from.
const MIN_ANSWER_CONTEXT_CHARS: usize = 100;
/// Replies this short are not treated as answers.
const MIN_ANSWER_CHARS: usize = 10;

const SYSTEM_PROMPT: &str = r#"You translate natural-language code search requests into Zoekt query syntax.

Zoekt syntax:
1. Fields: repo: (repository), file: (file name pattern), lang: (language), sym: (symbol definitions), content: (text inside files), case:yes|no|auto, branch:.
2. Operators: a space is an implicit AND. Use lowercase `or` for OR. Prefix a term or field with `-` to exclude it, e.g. -file:test. Parentheses group.
3. Regular expressions are wrapped in slashes: /pattern/. Quote literal phrases: "exact phrase".
4. Never use SQL operators like AND/OR or invented fields like name: or type:func. Never emit a field without a value.

Examples:
Input: Find the login function in the auth repository
Output: <query>repo:auth sym:login</query>
Input: List all Python functions
Output: <query>lang:python sym:def</query>
Input: Search for TODO comments in Python files
Output: <query>lang:python content:/#.*TODO/</query>
Input: Find where we use API_KEY but not in tests
Output: <query>content:API_KEY -file:test</query>
Input: Which Go files define a main function
Output: <query>lang:go sym:main</query>

Respond with exactly one query wrapped in <query></query>. No explanation, no markdown."#;

/// Classify the original question, independent of query generation.
pub fn classify(question: &str) -> IntentType {
    let lower = question.to_lowercase();
    if lower.contains("how many") || lower.contains("count") {
        IntentType::Count
    } else if lower.contains("list") || lower.contains("show all") {
        IntentType::List
    } else if lower.contains("have") || lower.contains("do i") || lower.contains("did i") {
        IntentType::YesNo
    } else {
        IntentType::Search
    }
}

/// Reads as a direct existence question ("does the repo …?").
pub fn is_direct_question(question: &str) -> bool {
    let lower = question.trim().to_lowercase();
    ["does ", "do ", "have ", "has "]
        .iter()
        .any(|p| lower.starts_with(p))
        || lower.contains('?')
}

pub struct LlmTranslator {
    completion: Arc<dyn Completion>,
    keyword: Arc<dyn KeywordBackend>,
    search: SearchConfig,
    timeout: Duration,
}

impl LlmTranslator {
    pub fn new(
        completion: Arc<dyn Completion>,
        keyword: Arc<dyn KeywordBackend>,
        config: &Config,
    ) -> Self {
        Self {
            completion,
            keyword,
            search: config.search.clone(),
            timeout: Duration::from_secs(config.answer_timeout_secs),
        }
    }

    pub async fn translate(
        &self,
        question: &str,
    ) -> Result<(TranslationOutcome, Intent), TranslateError> {
        // ── Step 1: Context assembly ─────────────────────────
        let terms = key_terms(question);
        let grounding = self.grounding_snippets(&terms).await;
        let rendered = snippets::render(&grounding, SNIPPETS_MAX_CHARS);
        if grounding.is_empty() {
            tracing::debug!("No grounding snippets for key terms {terms:?}");
        }

        // ── Step 2: Early answer ─────────────────────────────
        if is_direct_question(question)
            && !grounding.is_empty()
            && rendered.chars().count() > MIN_ANSWER_CONTEXT_CHARS
        {
            if let Some(answer) =
                answer_from_snippets(self.completion.as_ref(), question, &rendered, self.timeout)
                    .await
                    .filter(|a| a.chars().count() > MIN_ANSWER_CHARS)
            {
                tracing::info!("Answered directly from {} snippets", grounding.len());
                let intent = Intent::new(IntentType::Answer, "", DIRECT_ANSWER_CONFIDENCE);
                return Ok((TranslationOutcome::DirectAnswer(answer), intent));
            }
        }

        // ── Step 3: Query generation ─────────────────────────
        let structure = self.structure_samples().await;
        let user = format!(
            "CODEBASE CONTEXT (sample files in this codebase):\n{structure}\n\n\
             RELEVANT CODE:\n{rendered}\n\n\
             Input: {question}\nOutput:"
        );
        let req = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            user,
            temperature: 0.1,
            max_tokens: 150,
            timeout: self.timeout,
        };
        let raw = self
            .completion
            .complete(&req)
            .await
            .map_err(TranslateError::Service)?;

        // ── Step 4: Extraction, repair and validation ────────
        let candidate = repair(&raw, question);
        if candidate.trim().is_empty() {
            return Err(TranslateError::EmptyCandidate);
        }
        tracing::info!("LLM translated {question:?} -> {candidate:?}");

        // ── Step 5: Intent ───────────────────────────────────
        let lower = question.to_lowercase();
        let joined_terms = terms.join(" ");
        let variations = if joined_terms.is_empty() || joined_terms == candidate {
            Vec::new()
        } else {
            vec![joined_terms]
        };
        let intent = Intent::new(classify(question), candidate.clone(), LLM_CONFIDENCE)
            .with_entity(entity_of(&lower))
            .with_topic(topic_of(&lower))
            .with_variations(variations);

        Ok((TranslationOutcome::Query(candidate), intent))
    }

    /// Short keyword-matched excerpts for each key term.
    async fn grounding_snippets(&self, terms: &[String]) -> Vec<Snippet> {
        let opts = KeywordOptions {
            max_docs: 3,
            context_lines: 3,
            whole: false,
        };
        let budget = SnippetBudget {
            max_files: 3,
            total_lines: 45,
            min_lines_per_file: 15,
            max_lines_per_file: 15,
            context_lines: 3,
        };

        let mut found = Vec::new();
        for term in terms {
            if found.len() >= MAX_GROUNDING_SNIPPETS {
                break;
            }
            let term_query = if query::is_valid(term) {
                term.clone()
            } else {
                query::literal(term)
            };
            match self.keyword.search(&term_query, opts).await {
                Ok(result) => {
                    found.extend(
                        snippets::extract(&result.files, &budget)
                            .into_iter()
                            .filter(|s| s.text.trim().len() > 20),
                    );
                }
                Err(e) => tracing::debug!("Grounding search for {term:?} failed: {e:#}"),
            }
        }
        found.truncate(MAX_GROUNDING_SNIPPETS);
        found
    }

    /// File-name patterns and a few excerpts showing how the codebase is laid out.
    async fn structure_samples(&self) -> String {
        let opts = KeywordOptions {
            max_docs: 30,
            context_lines: 3,
            whole: false,
        };
        let result = match self.keyword.search(".", opts).await {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!("Structure sample search failed: {e:#}");
                return String::new();
            }
        };

        let mut patterns = BTreeSet::new();
        for file in &result.files {
            let path = Path::new(&file.file_name);
            if let Some(dir) = path.parent().and_then(|p| p.to_str()).filter(|d| !d.is_empty()) {
                patterns.insert(format!("{dir}/"));
            }
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                patterns.insert(format!("*.{ext}"));
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                patterns.insert(name.to_string());
            }
        }

        let mut text = String::from("Sample Files:\n");
        for pattern in patterns.iter().take(MAX_SAMPLE_PATTERNS) {
            text.push_str(&format!("- {pattern}\n"));
        }

        let budget = SnippetBudget::from_config(&self.search, 4, 3);
        let samples = snippets::extract(&result.files, &budget);
        if !samples.is_empty() {
            text.push('\n');
            text.push_str(&snippets::render(&samples, usize::MAX));
        }

        snippets::truncate_with_marker(text.trim_end(), STRUCTURE_MAX_CHARS)
    }
}
