//! Natural language to backend query.
//!
//! The completion-service translator is tried first when one is available;
//! any failure falls back to the rule-based translator exactly once.

pub mod llm;
pub mod pattern;
pub mod terms;

use thiserror::Error;

use crate::backends::Backends;
use crate::config::Config;
use crate::models::{Intent, IntentType, TranslationOutcome, TranslatorTier};

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("completion service failed: {0:#}")]
    Service(anyhow::Error),
    #[error("completion output yielded no usable query")]
    EmptyCandidate,
}

/// The single translation decided for a request.
#[derive(Debug, Clone)]
pub struct Translation {
    pub outcome: TranslationOutcome,
    pub intent: Intent,
    pub tier: TranslatorTier,
}

impl Translation {
    /// The caller's text used verbatim as the query.
    pub fn direct(text: &str) -> Self {
        let query = text.trim().to_string();
        Self {
            outcome: TranslationOutcome::Query(query.clone()),
            intent: Intent::new(IntentType::Search, query, 1.0),
            tier: TranslatorTier::Direct,
        }
    }

    /// Rule-based translation; never fails.
    pub fn pattern(text: &str) -> Self {
        let intent = pattern::intent(text);
        Self {
            outcome: TranslationOutcome::Query(intent.query.clone()),
            intent,
            tier: TranslatorTier::Pattern,
        }
    }

    /// The query to execute, if this is not a direct answer.
    pub fn query(&self) -> Option<&str> {
        match &self.outcome {
            TranslationOutcome::Query(q) => Some(q),
            TranslationOutcome::DirectAnswer(_) => None,
        }
    }
}

/// Translate `text`, preferring the completion service when available.
pub async fn translate(text: &str, backends: &Backends, config: &Config) -> Translation {
    let Some(completion) = &backends.completion else {
        return Translation::pattern(text);
    };

    let translator = llm::LlmTranslator::new(completion.clone(), backends.keyword.clone(), config);
    match translator.translate(text).await {
        Ok((outcome, intent)) => Translation {
            outcome,
            intent,
            tier: TranslatorTier::Llm,
        },
        Err(e) => {
            tracing::warn!("LLM translation failed, using pattern translation: {e}");
            Translation::pattern(text)
        }
    }
}
