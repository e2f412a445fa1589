//! AST-aware code chunking using tree-sitter.
//!
//! 1. Parse source into an AST
//! 2. Walk top-level nodes, merging adjacent small nodes up to the budget
//! 3. Recurse into any single node that exceeds the budget
//!
//! Each chunk takes the kind of the first function/class/struct/interface
//! node it contains; pieces of a split node inherit the node's kind.
//!
//! Declines (returns None) when the file exceeds MAX_FILE_SIZE, the parse
//! has too many error nodes, or the language is unsupported.

use super::{ChunkOutput, Language};
use crate::models::ChunkKind;

/// Maximum non-whitespace characters per chunk.
const CHAR_BUDGET: usize = 1500;

/// Files larger than this skip AST parsing entirely.
const MAX_FILE_SIZE: usize = 500 * 1024;

/// If more than this fraction of AST nodes are error nodes, fall back.
const ERROR_THRESHOLD: f64 = 0.30;

/// Chunk source code along syntactic boundaries.
pub fn chunk_with_ast(content: &str, language: Language) -> Option<Vec<ChunkOutput>> {
    if content.len() > MAX_FILE_SIZE {
        return None;
    }

    let mut parser = tree_sitter::Parser::new();
    let ts_language = language.tree_sitter_language()?;
    parser.set_language(&ts_language).ok()?;

    let tree = parser.parse(content, None)?;
    let root = tree.root_node();

    let (total, errors) = count_nodes(root);
    if total > 0 && (errors as f64 / total as f64) > ERROR_THRESHOLD {
        tracing::warn!(
            "AST error rate {:.0}% exceeds threshold, falling back to line-based chunking",
            (errors as f64 / total as f64) * 100.0
        );
        return None;
    }

    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();
    chunk_children(&lines, root, ChunkKind::Block, &mut chunks);

    if chunks.is_empty() {
        return None;
    }
    Some(chunks)
}

/// Lines accumulated for the next chunk (0-based, inclusive).
struct Pending {
    start: usize,
    end: usize,
    chars: usize,
    kind: ChunkKind,
}

impl Pending {
    fn into_chunk(self, lines: &[&str]) -> ChunkOutput {
        let content = (self.start..=self.end)
            .filter_map(|i| lines.get(i).copied())
            .collect::<Vec<&str>>()
            .join("\n");
        ChunkOutput {
            content,
            start_line: self.start + 1,
            end_line: self.end + 1,
            kind: self.kind,
        }
    }
}

fn chunk_children(
    lines: &[&str],
    node: tree_sitter::Node,
    inherited: ChunkKind,
    chunks: &mut Vec<ChunkOutput>,
) {
    let mut cursor = node.walk();
    let children: Vec<tree_sitter::Node> = node.children(&mut cursor).collect();
    let mut pending: Option<Pending> = None;

    for child in children {
        let start = child.start_position().row;
        let end = child.end_position().row;
        let chars = non_ws_chars_in_range(lines, start, end);
        let kind = match node_kind(child) {
            ChunkKind::Block => inherited,
            kind => kind,
        };

        if chars > CHAR_BUDGET {
            if let Some(p) = pending.take() {
                chunks.push(p.into_chunk(lines));
            }
            if child.child_count() == 0 {
                chunks.push(Pending { start, end, chars, kind }.into_chunk(lines));
            } else {
                chunk_children(lines, child, kind, chunks);
            }
            continue;
        }

        match pending.as_mut() {
            Some(p) if p.chars + chars > CHAR_BUDGET => {
                let full = pending.replace(Pending { start, end, chars, kind });
                if let Some(full) = full {
                    chunks.push(full.into_chunk(lines));
                }
            }
            Some(p) => {
                p.end = p.end.max(end);
                p.chars += chars;
                if p.kind == ChunkKind::Block {
                    p.kind = kind;
                }
            }
            None => pending = Some(Pending { start, end, chars, kind }),
        }
    }

    if let Some(p) = pending {
        chunks.push(p.into_chunk(lines));
    }
}

/// Chunk kind of a declaration node, looking through export/decorator/type
/// wrappers.
fn node_kind(node: tree_sitter::Node) -> ChunkKind {
    match node.kind() {
        "function_item"
        | "function_signature_item"
        | "function_declaration"
        | "generator_function_declaration"
        | "function_definition"
        | "method_declaration"
        | "method_definition"
        | "arrow_function"
        | "function_expression"
        | "function" => ChunkKind::Function,
        "class_declaration" | "abstract_class_declaration" | "class_definition" | "class" => {
            ChunkKind::Class
        }
        "struct_item" | "enum_item" | "union_item" | "struct_type" | "enum_declaration" => {
            ChunkKind::Struct
        }
        "trait_item" | "interface_declaration" | "interface_type" => ChunkKind::Interface,
        "export_statement"
        | "decorated_definition"
        | "type_declaration"
        | "type_spec"
        | "lexical_declaration"
        | "variable_declaration"
        | "variable_declarator" => {
            let mut cursor = node.walk();
            let found = node
                .named_children(&mut cursor)
                .map(node_kind)
                .find(|k| *k != ChunkKind::Block);
            found.unwrap_or_default()
        }
        _ => ChunkKind::Block,
    }
}

/// Count non-whitespace characters in a range of lines.
fn non_ws_chars_in_range(lines: &[&str], start: usize, end: usize) -> usize {
    (start..=end)
        .filter_map(|i| lines.get(i))
        .flat_map(|line| line.chars())
        .filter(|c| !c.is_whitespace())
        .count()
}

/// Count total nodes and error nodes in a tree.
fn count_nodes(node: tree_sitter::Node) -> (usize, usize) {
    let mut total = 1usize;
    let mut errors = usize::from(node.is_error());

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let (t, e) = count_nodes(child);
        total += t;
        errors += e;
    }

    (total, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(chunks: &[ChunkOutput]) -> String {
        chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn test_chunk_rust_functions_merge() {
        let source = r#"
fn hello() {
    println!("hello");
}

fn world() {
    println!("world");
}
"#;
        let chunks = chunk_with_ast(source, Language::Rust).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("fn hello"));
        assert!(chunks[0].content.contains("fn world"));
        assert_eq!(chunks[0].kind, ChunkKind::Function);
    }

    #[test]
    fn test_chunk_rust_large_function_splits() {
        let body: String = (0..150)
            .map(|i| format!("    let var_{i} = {i};\n"))
            .collect();
        let source = format!("fn big() {{\n{body}}}\n\nfn small() {{}}\n");

        let chunks = chunk_with_ast(&source, Language::Rust).unwrap();
        assert!(chunks.len() >= 2, "Large function should be split: got {} chunks", chunks.len());
        assert!(chunks.iter().all(|c| c.kind == ChunkKind::Function));
    }

    #[test]
    fn test_chunk_rust_struct_and_trait_kinds() {
        let source = "struct Foo {\n    bar: i32,\n}\n";
        assert_eq!(chunk_with_ast(source, Language::Rust).unwrap()[0].kind, ChunkKind::Struct);

        let source = "trait Speak {\n    fn speak(&self);\n}\n";
        assert_eq!(chunk_with_ast(source, Language::Rust).unwrap()[0].kind, ChunkKind::Interface);
    }

    #[test]
    fn test_chunk_skips_large_files() {
        let large = "x".repeat(MAX_FILE_SIZE + 1);
        assert!(chunk_with_ast(&large, Language::Rust).is_none());
    }

    #[test]
    fn test_chunk_unsupported_language_returns_none() {
        assert!(chunk_with_ast("some text", Language::Unknown).is_none());
    }

    #[test]
    fn test_line_numbers_are_one_based() {
        let source = "fn a() {}\nfn b() {}\n";
        let chunks = chunk_with_ast(source, Language::Rust).unwrap();
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
    }

    #[test]
    fn test_chunk_javascript_class() {
        let source = r#"
class MyComponent {
    constructor(name) {
        this.name = name;
    }
}

function standalone() {
    return 42;
}
"#;
        let chunks = chunk_with_ast(source, Language::JavaScript).unwrap();
        assert!(joined(&chunks).contains("class MyComponent"));
        assert!(joined(&chunks).contains("function standalone"));
        assert_eq!(chunks[0].kind, ChunkKind::Class);
    }

    #[test]
    fn test_chunk_javascript_exported_arrow_function() {
        let source = "export const load = async () => {\n    return fetch('/posts');\n};\n";
        let chunks = chunk_with_ast(source, Language::JavaScript).unwrap();
        assert_eq!(chunks[0].kind, ChunkKind::Function);
    }

    #[test]
    fn test_chunk_typescript_interface() {
        let source = r#"
interface Config {
    name: string;
}

function processConfig(config: Config): string {
    return config.name;
}
"#;
        let chunks = chunk_with_ast(source, Language::TypeScript).unwrap();
        assert!(joined(&chunks).contains("function processConfig"));
        assert_eq!(chunks[0].kind, ChunkKind::Interface);
    }

    #[test]
    fn test_chunk_tsx() {
        let source = r#"
function Greeting({ name }: { name: string }) {
    return <div>Hello, {name}!</div>;
}
"#;
        let chunks = chunk_with_ast(source, Language::Tsx).unwrap();
        assert!(joined(&chunks).contains("function Greeting"));
    }

    #[test]
    fn test_chunk_python_kinds() {
        let source = "class Post:\n    pass\n";
        assert_eq!(chunk_with_ast(source, Language::Python).unwrap()[0].kind, ChunkKind::Class);

        let source = "@cached\ndef load():\n    return []\n";
        assert_eq!(chunk_with_ast(source, Language::Python).unwrap()[0].kind, ChunkKind::Function);
    }

    #[test]
    fn test_chunk_go_kinds() {
        let source = "package main\n\ntype Server struct {\n\tAddr string\n}\n";
        let chunks = chunk_with_ast(source, Language::Go).unwrap();
        assert_eq!(chunks[0].kind, ChunkKind::Struct);

        let source = "package main\n\nfunc main() {\n}\n";
        let chunks = chunk_with_ast(source, Language::Go).unwrap();
        assert_eq!(chunks[0].kind, ChunkKind::Function);
    }
}
