//! Parser for the keyword backend's query language.
//!
//! Grammar (loosest binding first):
//!
//! ```text
//! query   := or_expr
//! or_expr := and_expr ("or" and_expr)*
//! and_expr:= unary+                      juxtaposition is AND
//! unary   := "-" unary | "(" query ")" | atom
//! atom    := [field ":"] (word | "quoted" | /regex/)
//! ```
//!
//! Parsing locally lets translators validate candidates without a round-trip
//! to the backend.

pub mod repair;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty query")]
    Empty,
    #[error("unterminated quoted string starting at {0}")]
    UnterminatedQuote(usize),
    #[error("unterminated regular expression starting at {0}")]
    UnterminatedRegex(usize),
    #[error("unbalanced parentheses at {0}")]
    UnbalancedParens(usize),
    #[error("empty group at {0}")]
    EmptyGroup(usize),
    #[error("operator '{0}' is missing an operand")]
    DanglingOperator(&'static str),
    #[error("field '{0}:' needs a value")]
    EmptyFieldValue(String),
    #[error("invalid value '{value}' for field '{field}:'")]
    InvalidFieldValue { field: String, value: String },
    #[error("invalid regular expression '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Repo,
    File,
    Lang,
    Sym,
    Content,
    Case,
    Branch,
    Regex,
    Type,
}

impl Field {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "repo" | "r" => Field::Repo,
            "file" | "f" => Field::File,
            "lang" => Field::Lang,
            "sym" => Field::Sym,
            "content" | "c" => Field::Content,
            "case" => Field::Case,
            "branch" | "b" => Field::Branch,
            "regex" => Field::Regex,
            "type" | "t" => Field::Type,
            _ => return None,
        })
    }

    /// Whether an unquoted value is interpreted as a regular expression.
    fn takes_regex(&self) -> bool {
        matches!(
            self,
            Field::Repo | Field::File | Field::Sym | Field::Content | Field::Regex
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Word(String),
    Quoted(String),
    Regex(String),
}

impl Value {
    pub fn as_str(&self) -> &str {
        match self {
            Value::Word(s) | Value::Quoted(s) | Value::Regex(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Term { field: Option<Field>, value: Value },
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

/// A successfully parsed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub expr: Expr,
}

impl Query {
    /// Number of leaf terms.
    pub fn term_count(&self) -> usize {
        fn count(e: &Expr) -> usize {
            match e {
                Expr::Term { .. } => 1,
                Expr::Not(inner) => count(inner),
                Expr::And(xs) | Expr::Or(xs) => xs.iter().map(count).sum(),
            }
        }
        count(&self.expr)
    }
}

/// Parse `input` into a [`Query`].
pub fn parse(input: &str) -> Result<Query, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if let Some((at, _)) = parser.tokens.get(parser.pos) {
        // Only a stray ')' can stop the top-level expression early.
        return Err(ParseError::UnbalancedParens(*at));
    }
    Ok(Query { expr })
}

/// True when `input` parses.
pub fn is_valid(input: &str) -> bool {
    parse(input).is_ok()
}

/// Quote `text` as a single literal term that always parses.
pub fn literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// True when `text` contains a recognized `field:` token.
pub fn has_field_prefix(text: &str) -> bool {
    text.split(|c: char| c.is_whitespace() || c == '(' || c == '-')
        .filter_map(|word| word.split_once(':'))
        .any(|(name, _)| Field::from_name(name).is_some())
}

// ─── Lexer ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Or,
    Not,
    Atom(Expr),
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        match c {
            '(' => {
                tokens.push((start, Token::Open));
                i += 1;
            }
            ')' => {
                tokens.push((start, Token::Close));
                i += 1;
            }
            '-' => {
                match chars.get(i + 1) {
                    Some(next) if !next.is_whitespace() && *next != ')' => {}
                    _ => return Err(ParseError::DanglingOperator("-")),
                }
                tokens.push((start, Token::Not));
                i += 1;
            }
            '"' => {
                let (text, next) = read_quoted(&chars, i)?;
                tokens.push((start, term(None, Value::Quoted(text))?));
                i = next;
            }
            '/' => {
                let (text, next) = read_regex(&chars, i)?;
                tokens.push((start, term(None, Value::Regex(text))?));
                i = next;
            }
            _ => {
                let (token, next) = read_word(&chars, i)?;
                tokens.push((start, token));
                i = next;
            }
        }
    }

    Ok(tokens)
}

/// Reads `"..."` starting at the opening quote; returns the unescaped text.
fn read_quoted(chars: &[char], start: usize) -> Result<(String, usize), ParseError> {
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                out.push(chars[i + 1]);
                i += 2;
            }
            '"' => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(ParseError::UnterminatedQuote(start))
}

/// Reads `/.../`; escapes are kept since the body is handed to the regex engine.
fn read_regex(chars: &[char], start: usize) -> Result<(String, usize), ParseError> {
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                if chars[i + 1] != '/' {
                    out.push('\\');
                }
                out.push(chars[i + 1]);
                i += 2;
            }
            '/' => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(ParseError::UnterminatedRegex(start))
}

/// Reads a bare word, which may turn out to be `field:value` or the `or` operator.
fn read_word(chars: &[char], start: usize) -> Result<(Token, usize), ParseError> {
    let mut i = start;
    let mut depth = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            break;
        }
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => break,
            ')' => depth -= 1,
            ':' => {
                let name: String = chars[start..i].iter().collect();
                if let Some(field) = Field::from_name(&name) {
                    return read_field_value(chars, i + 1, &name, field);
                }
            }
            _ => {}
        }
        i += 1;
    }

    let word: String = chars[start..i].iter().collect();
    if word == "or" {
        return Ok((Token::Or, i));
    }
    Ok((term(None, Value::Word(word))?, i))
}

fn read_field_value(
    chars: &[char],
    start: usize,
    name: &str,
    field: Field,
) -> Result<(Token, usize), ParseError> {
    match chars.get(start) {
        None => Err(ParseError::EmptyFieldValue(name.to_string())),
        Some(c) if c.is_whitespace() || *c == ')' => {
            Err(ParseError::EmptyFieldValue(name.to_string()))
        }
        Some('"') => {
            let (text, next) = read_quoted(chars, start)?;
            if text.is_empty() {
                return Err(ParseError::EmptyFieldValue(name.to_string()));
            }
            Ok((term(Some(field), Value::Quoted(text))?, next))
        }
        Some('/') if field.takes_regex() => {
            let (text, next) = read_regex(chars, start)?;
            Ok((term(Some(field), Value::Regex(text))?, next))
        }
        Some(_) => {
            let mut i = start;
            let mut depth = 0usize;
            while i < chars.len() && !chars[i].is_whitespace() {
                match chars[i] {
                    '(' => depth += 1,
                    ')' if depth == 0 => break,
                    ')' => depth -= 1,
                    _ => {}
                }
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            Ok((term(Some(field), Value::Word(text))?, i))
        }
    }
}

/// Builds a term token, validating field enums and regex syntax.
fn term(field: Option<Field>, value: Value) -> Result<Token, ParseError> {
    match (field, &value) {
        (Some(Field::Case), v) => {
            if !matches!(v.as_str(), "yes" | "no" | "auto") {
                return Err(ParseError::InvalidFieldValue {
                    field: "case".to_string(),
                    value: v.as_str().to_string(),
                });
            }
        }
        (Some(Field::Type), v) => {
            if !matches!(v.as_str(), "file" | "repo" | "filematch") {
                return Err(ParseError::InvalidFieldValue {
                    field: "type".to_string(),
                    value: v.as_str().to_string(),
                });
            }
        }
        (_, Value::Regex(pattern)) => validate_regex(pattern)?,
        (None, Value::Word(word)) => validate_regex(word)?,
        (Some(f), Value::Word(word)) if f.takes_regex() => validate_regex(word)?,
        _ => {}
    }
    Ok(Token::Atom(Expr::Term { field, value }))
}

fn validate_regex(pattern: &str) -> Result<(), ParseError> {
    regex::Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| ParseError::InvalidRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

// ─── Parser ──────────────────────────────────────────────

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut branches = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            branches.push(self.parse_and()?);
        }
        Ok(if branches.len() == 1 {
            branches.remove(0)
        } else {
            Expr::Or(branches)
        })
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut parts = Vec::new();
        while let Some(token) = self.peek() {
            if matches!(token, Token::Or | Token::Close) {
                break;
            }
            parts.push(self.parse_unary()?);
        }
        match parts.len() {
            0 => Err(ParseError::DanglingOperator("or")),
            1 => Ok(parts.remove(0)),
            _ => Ok(Expr::And(parts)),
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let Some((at, token)) = self.tokens.get(self.pos).cloned() else {
            return Err(ParseError::DanglingOperator("-"));
        };
        self.pos += 1;
        match token {
            Token::Not => {
                if matches!(self.peek(), None | Some(Token::Or) | Some(Token::Close)) {
                    return Err(ParseError::DanglingOperator("-"));
                }
                Ok(Expr::Not(Box::new(self.parse_unary()?)))
            }
            Token::Open => {
                if self.peek() == Some(&Token::Close) {
                    return Err(ParseError::EmptyGroup(at));
                }
                let inner = self.parse_or()?;
                if self.peek() != Some(&Token::Close) {
                    return Err(ParseError::UnbalancedParens(at));
                }
                self.pos += 1;
                Ok(inner)
            }
            Token::Atom(expr) => Ok(expr),
            Token::Or => Err(ParseError::DanglingOperator("or")),
            Token::Close => Err(ParseError::UnbalancedParens(at)),
        }
    }
}
