//! Code chunking for the semantic index: tree-sitter for supported languages,
//! a line-based heuristic for everything else.

pub mod ast;
pub mod fallback;

use crate::models::ChunkKind;

/// One chunk of a source file.
#[derive(Debug, Clone)]
pub struct ChunkOutput {
    pub content: String,
    /// 1-based start line in the original file.
    pub start_line: usize,
    /// 1-based end line in the original file.
    pub end_line: usize,
    pub kind: ChunkKind,
}

/// Languages with tree-sitter AST support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Rust,
    JavaScript,
    TypeScript,
    Tsx,
    Python,
    Go,
    Unknown,
}

impl Language {
    /// Map a language tag or file extension to a variant.
    pub fn from_name(lang: &str) -> Self {
        match lang.to_lowercase().as_str() {
            "rust" | "rs" => Language::Rust,
            "javascript" | "js" | "jsx" => Language::JavaScript,
            "typescript" | "ts" => Language::TypeScript,
            "tsx" => Language::Tsx,
            "python" | "py" => Language::Python,
            "go" => Language::Go,
            _ => Language::Unknown,
        }
    }

    /// The tree-sitter grammar, or None if unsupported.
    pub fn tree_sitter_language(&self) -> Option<tree_sitter::Language> {
        match self {
            Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Language::Unknown => None,
        }
    }
}

/// Chunk `content`. With `use_ast` the tree-sitter chunker is tried first;
/// the line-based chunker handles everything it declines.
pub fn chunk_code(content: &str, language: &str, use_ast: bool) -> Vec<ChunkOutput> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    if use_ast {
        if let Some(chunks) = ast::chunk_with_ast(content, Language::from_name(language)) {
            return chunks;
        }
    }

    fallback::chunk_fallback(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_name() {
        assert_eq!(Language::from_name("rust"), Language::Rust);
        assert_eq!(Language::from_name("rs"), Language::Rust);
        assert_eq!(Language::from_name("js"), Language::JavaScript);
        assert_eq!(Language::from_name("typescript"), Language::TypeScript);
        assert_eq!(Language::from_name("tsx"), Language::Tsx);
        assert_eq!(Language::from_name("python"), Language::Python);
        assert_eq!(Language::from_name("go"), Language::Go);
        assert_eq!(Language::from_name("ruby"), Language::Unknown);
    }

    #[test]
    fn test_chunk_code_empty() {
        assert!(chunk_code("", "rust", true).is_empty());
        assert!(chunk_code("  \n  ", "rust", true).is_empty());
    }

    #[test]
    fn test_chunk_code_rust_uses_ast() {
        let source = "fn hello() {\n    println!(\"hi\");\n}\n";
        let chunks = chunk_code(source, "rust", true);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Function);
    }

    #[test]
    fn test_chunk_code_without_ast_uses_heuristic() {
        let source = "def hello():\n    return 1\n";
        let chunks = chunk_code(source, "python", false);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Function);
    }

    #[test]
    fn test_chunk_code_unknown_uses_fallback() {
        let chunks = chunk_code("some plain text\nmore text\n", "markdown", true);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Block);
    }
}
