use std::collections::HashSet;

use crate::config::SearchConfig;
use crate::models::{FusedMatch, KeywordResult, SemanticMatch};

/// Multipliers applied when both backends agree on a file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub score_boost: f32,
    pub similarity_boost: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            score_boost: 1.3,
            similarity_boost: 1.2,
        }
    }
}

impl From<&SearchConfig> for FusionWeights {
    /// Boosts below 1 (or NaN) are raised to 1: agreement never lowers a score.
    fn from(config: &SearchConfig) -> Self {
        Self {
            score_boost: config.score_boost.max(1.0),
            similarity_boost: config.similarity_boost.max(1.0),
        }
    }
}

/// Merge keyword agreement into semantic results.
///
/// 1. Index keyword results by file.
/// 2. For each semantic match whose file the keyword backend also matched,
///    multiply score and similarity by their boosts, each clamped to 1.0.
/// 3. Stable-sort by descending score, so ties keep the vector store's order.
pub fn fuse(
    keyword: &KeywordResult,
    semantic: Vec<SemanticMatch>,
    weights: FusionWeights,
) -> Vec<FusedMatch> {
    let keyword_files: HashSet<&str> = keyword
        .files
        .iter()
        .map(|f| file_key(&f.file_name))
        .collect();

    let mut fused: Vec<FusedMatch> = semantic
        .into_iter()
        .map(|chunk| {
            let base = clamp_unit(chunk.similarity);
            let keyword_match = keyword_files.contains(file_key(&chunk.file_name));
            let (score, similarity) = if keyword_match {
                (
                    clamp_unit(base * weights.score_boost),
                    clamp_unit(base * weights.similarity_boost),
                )
            } else {
                (base, base)
            };
            FusedMatch {
                chunk,
                score,
                similarity,
                keyword_match,
            }
        })
        .collect();

    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    fused
}

/// Semantic results as-is, for responses where fusion does not apply.
pub fn unfused(semantic: Vec<SemanticMatch>) -> Vec<FusedMatch> {
    semantic
        .into_iter()
        .map(|chunk| {
            let base = clamp_unit(chunk.similarity);
            FusedMatch {
                chunk,
                score: base,
                similarity: base,
                keyword_match: false,
            }
        })
        .collect()
}

/// Keyword and vector backends report paths with and without a leading "./".
fn file_key(name: &str) -> &str {
    name.trim_start_matches("./")
}

fn clamp_unit(x: f32) -> f32 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
