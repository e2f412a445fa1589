//! Bounded excerpts of keyword matches, used to ground completion prompts.

use crate::config::SearchConfig;
use crate::models::{KeywordMatch, Snippet};

/// Line budget for one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnippetBudget {
    /// Files considered, in result order
    pub max_files: usize,
    /// Lines across all files
    pub total_lines: usize,
    pub min_lines_per_file: usize,
    pub max_lines_per_file: usize,
    /// Lines taken before and after each match when file content is available
    pub context_lines: usize,
}

impl SnippetBudget {
    pub fn from_config(config: &SearchConfig, max_files: usize, context_lines: usize) -> Self {
        Self {
            max_files,
            total_lines: config.snippet_total_lines,
            min_lines_per_file: config.snippet_min_lines_per_file,
            max_lines_per_file: config.snippet_max_lines_per_file,
            context_lines,
        }
    }

    /// Even share of the total, kept within the per-file bounds.
    pub fn per_file(&self, files: usize) -> usize {
        if files == 0 {
            return 0;
        }
        (self.total_lines / files)
            .max(self.min_lines_per_file)
            .min(self.max_lines_per_file)
    }
}

/// Extract at most one snippet per file under `budget`.
///
/// Per file, the richest available source wins: windows around each match
/// in the file content, else the match lines with their before/after
/// context, else the leading lines of the content. Extraction stops as soon
/// as the per-file or the global budget is spent.
pub fn extract(files: &[KeywordMatch], budget: &SnippetBudget) -> Vec<Snippet> {
    let files = &files[..files.len().min(budget.max_files)];
    let per_file = budget.per_file(files.len());
    let mut remaining = budget.total_lines;
    let mut snippets = Vec::new();

    for file in files {
        if remaining == 0 {
            break;
        }
        let limit = per_file.min(remaining);
        let lines = match (&file.content, file.line_matches.is_empty()) {
            (Some(content), false) => windows_from_content(file, content, budget.context_lines, limit),
            (None, false) => lines_from_matches(file, limit),
            (Some(content), true) => content.lines().take(limit).map(str::to_string).collect(),
            (None, true) => Vec::new(),
        };
        if lines.is_empty() {
            continue;
        }
        remaining -= lines.len();
        snippets.push(Snippet {
            file_name: file.file_name.clone(),
            line_count: lines.len(),
            text: lines.join("\n"),
        });
    }

    snippets
}

fn windows_from_content(
    file: &KeywordMatch,
    content: &str,
    context_lines: usize,
    limit: usize,
) -> Vec<String> {
    let lines: Vec<&str> = content.lines().collect();
    let mut out = Vec::new();
    // Highest 1-based line already emitted, so overlapping windows do not repeat.
    let mut emitted_through = 0usize;

    for lm in &file.line_matches {
        if out.len() >= limit {
            break;
        }
        if lm.line_number == 0 || lm.line_number > lines.len() {
            out.push(lm.line.clone());
            continue;
        }
        let start = lm.line_number.saturating_sub(context_lines).max(1);
        let end = (lm.line_number + context_lines).min(lines.len());
        for n in start.max(emitted_through + 1)..=end {
            if out.len() >= limit {
                break;
            }
            out.push(lines[n - 1].to_string());
            emitted_through = n;
        }
    }

    out
}

fn lines_from_matches(file: &KeywordMatch, limit: usize) -> Vec<String> {
    let mut out = Vec::new();
    for lm in &file.line_matches {
        let before = lm.before.as_deref().unwrap_or_default().lines();
        let after = lm.after.as_deref().unwrap_or_default().lines();
        let block = before
            .chain(std::iter::once(lm.line.trim_end_matches('\n')))
            .chain(after);
        for line in block {
            if out.len() >= limit {
                return out;
            }
            out.push(line.to_string());
        }
    }
    out
}

/// Render snippets for a prompt, truncated to `max_chars` with a marker.
pub fn render(snippets: &[Snippet], max_chars: usize) -> String {
    let mut text = String::new();
    for snippet in snippets {
        text.push_str(&format!("File: {}\n{}\n\n", snippet.file_name, snippet.text));
    }
    truncate_with_marker(text.trim_end(), max_chars)
}

/// Cut `text` to `max_chars` characters, appending a truncation marker if cut.
pub fn truncate_with_marker(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}\n... (truncated)", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LineMatch;

    fn make_budget() -> SnippetBudget {
        SnippetBudget {
            max_files: 3,
            total_lines: 100,
            min_lines_per_file: 15,
            max_lines_per_file: 20,
            context_lines: 2,
        }
    }

    fn make_content(lines: usize) -> String {
        (1..=lines).map(|n| format!("line {n}")).collect::<Vec<_>>().join("\n")
    }

    fn make_match(line_number: usize) -> LineMatch {
        LineMatch {
            line_number,
            line: format!("line {line_number}"),
            before: None,
            after: None,
        }
    }

    #[test]
    fn test_per_file_budget_clamped() {
        let budget = make_budget();
        assert_eq!(budget.per_file(3), 20);
        assert_eq!(budget.per_file(10), 15);
        assert_eq!(budget.per_file(0), 0);
    }

    #[test]
    fn test_windows_around_matches() {
        let file = KeywordMatch {
            file_name: "a.rs".into(),
            line_matches: vec![make_match(10), make_match(11)],
            content: Some(make_content(50)),
            ..Default::default()
        };
        let snippets = extract(&[file], &make_budget());
        assert_eq!(snippets.len(), 1);
        // Windows 8..=12 and 9..=13 overlap, so lines 8..=13 appear once.
        assert_eq!(snippets[0].line_count, 6);
        assert!(snippets[0].text.starts_with("line 8\n"));
        assert!(snippets[0].text.ends_with("line 13"));
    }

    #[test]
    fn test_window_clipped_to_content() {
        let file = KeywordMatch {
            file_name: "a.rs".into(),
            line_matches: vec![make_match(1), make_match(3)],
            content: Some(make_content(3)),
            ..Default::default()
        };
        let snippets = extract(&[file], &make_budget());
        assert_eq!(snippets[0].text, "line 1\nline 2\nline 3");
    }

    #[test]
    fn test_match_blobs_consumed_line_by_line() {
        let file = KeywordMatch {
            file_name: "b.go".into(),
            line_matches: vec![LineMatch {
                line_number: 5,
                line: "func main() {\n".into(),
                before: Some("package main\n\n".into()),
                after: Some("\tfmt.Println()\n}\n".into()),
            }],
            ..Default::default()
        };
        let snippets = extract(&[file], &make_budget());
        assert_eq!(
            snippets[0].text,
            "package main\n\nfunc main() {\n\tfmt.Println()\n}"
        );
        assert_eq!(snippets[0].line_count, 5);
    }

    #[test]
    fn test_leading_lines_without_matches() {
        let file = KeywordMatch {
            file_name: "c.py".into(),
            content: Some(make_content(100)),
            ..Default::default()
        };
        let snippets = extract(&[file], &make_budget());
        assert_eq!(snippets[0].line_count, 20);
        assert!(snippets[0].text.ends_with("line 20"));
    }

    #[test]
    fn test_global_budget_stops_extraction() {
        let files: Vec<KeywordMatch> = (0..10)
            .map(|i| KeywordMatch {
                file_name: format!("f{i}.rs"),
                content: Some(make_content(100)),
                ..Default::default()
            })
            .collect();
        let budget = SnippetBudget {
            max_files: 10,
            ..make_budget()
        };
        let snippets = extract(&files, &budget);
        let total: usize = snippets.iter().map(|s| s.line_count).sum();
        assert_eq!(total, 100);
        // 15 lines per file: six full files and a partial seventh.
        assert_eq!(snippets.len(), 7);
        assert_eq!(snippets[6].line_count, 10);
    }

    #[test]
    fn test_max_files_respected() {
        let files: Vec<KeywordMatch> = (0..5)
            .map(|i| KeywordMatch {
                file_name: format!("f{i}.rs"),
                content: Some(make_content(3)),
                ..Default::default()
            })
            .collect();
        assert_eq!(extract(&files, &make_budget()).len(), 3);
    }

    #[test]
    fn test_file_without_content_or_matches_skipped() {
        let file = KeywordMatch {
            file_name: "empty".into(),
            ..Default::default()
        };
        assert!(extract(&[file], &make_budget()).is_empty());
    }

    #[test]
    fn test_render_truncates_with_marker() {
        let snippets = vec![Snippet {
            file_name: "a.rs".into(),
            text: "x".repeat(50),
            line_count: 1,
        }];
        let rendered = render(&snippets, 20);
        assert!(rendered.ends_with("... (truncated)"));
        assert!(rendered.starts_with("File: a.rs\n"));
        assert_eq!(render(&snippets, 1000), format!("File: a.rs\n{}", "x".repeat(50)));
    }
}
