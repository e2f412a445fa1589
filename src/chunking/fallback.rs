//! Line-based chunker for languages without AST support, or when
//! tree-sitter chunking is disabled.
//!
//! 1. Split at blank lines (natural paragraph boundaries)
//! 2. Merge small segments up to the character budget
//! 3. Split any segment that is still too large line by line
//!
//! A chunk's kind comes from the first declaration keyword it starts a line with.

use super::ChunkOutput;
use crate::models::ChunkKind;

/// Maximum non-whitespace characters per chunk.
const CHAR_BUDGET: usize = 1500;

/// Chunk content using line-based heuristics.
pub fn chunk_fallback(content: &str) -> Vec<ChunkOutput> {
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();
    // (start, end, chars) of the chunk being assembled, 0-based inclusive
    let mut current: Option<(usize, usize, usize)> = None;

    for (start, end) in blank_line_segments(&lines) {
        let chars = non_ws_chars(&lines[start..=end]);

        if chars > CHAR_BUDGET {
            if let Some((s, e, _)) = current.take() {
                chunks.push(make_chunk(&lines, s, e));
            }
            split_large_segment(&lines, start, end, &mut chunks);
            continue;
        }

        current = match current {
            Some((s, e, c)) if c + chars > CHAR_BUDGET => {
                chunks.push(make_chunk(&lines, s, e));
                Some((start, end, chars))
            }
            Some((s, _, c)) => Some((s, end, c + chars)),
            None => Some((start, end, chars)),
        };
    }

    if let Some((s, e, _)) = current {
        chunks.push(make_chunk(&lines, s, e));
    }
    chunks
}

/// Guess a chunk kind from declaration keywords at the start of its lines.
pub fn guess_kind(text: &str) -> ChunkKind {
    for line in text.lines() {
        let line = line.trim_start();
        let line = line
            .strip_prefix("export ")
            .or_else(|| line.strip_prefix("pub "))
            .unwrap_or(line)
            .trim_start_matches("default ")
            .trim_start_matches("async ");

        if line.starts_with("fn ")
            || line.starts_with("def ")
            || line.starts_with("func ")
            || line.starts_with("function ")
            || line.starts_with("function(")
        {
            return ChunkKind::Function;
        }
        if line.starts_with("class ") {
            return ChunkKind::Class;
        }
        if line.starts_with("struct ") || (line.starts_with("type ") && line.contains(" struct")) {
            return ChunkKind::Struct;
        }
        if line.starts_with("interface ")
            || line.starts_with("trait ")
            || (line.starts_with("type ") && line.contains(" interface"))
        {
            return ChunkKind::Interface;
        }
    }
    ChunkKind::Block
}

fn make_chunk(lines: &[&str], start: usize, end: usize) -> ChunkOutput {
    let content = lines[start..=end].join("\n");
    let kind = guess_kind(&content);
    ChunkOutput {
        content,
        start_line: start + 1,
        end_line: end + 1,
        kind,
    }
}

fn non_ws_chars(lines: &[&str]) -> usize {
    lines
        .iter()
        .flat_map(|l| l.chars())
        .filter(|c| !c.is_whitespace())
        .count()
}

/// Runs of non-blank lines as (start, end), 0-based inclusive.
fn blank_line_segments(lines: &[&str]) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut seg_start = None;

    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            if let Some(start) = seg_start.take() {
                segments.push((start, i - 1));
            }
        } else if seg_start.is_none() {
            seg_start = Some(i);
        }
    }
    if let Some(start) = seg_start {
        segments.push((start, lines.len() - 1));
    }

    segments
}

fn split_large_segment(lines: &[&str], start: usize, end: usize, chunks: &mut Vec<ChunkOutput>) {
    let mut chunk_start = start;
    let mut chars = 0usize;

    for i in start..=end {
        let line_chars = non_ws_chars(&lines[i..=i]);
        if chars + line_chars > CHAR_BUDGET && i > chunk_start {
            chunks.push(make_chunk(lines, chunk_start, i - 1));
            chunk_start = i;
            chars = line_chars;
        } else {
            chars += line_chars;
        }
    }

    chunks.push(make_chunk(lines, chunk_start, end));
}
