//! Token definitions for the Box language
//!
//! This module defines every token the lexer can produce. Tokenization is
//! driven by a `logos` automaton over [`TokenKind`]; lexemes that need
//! hand-scanning (strings, nested block comments) use callbacks that bump
//! the lexer manually and can surface a [`RawLexError`].

use crate::span::Span;
use logos::{FilterResult, Logos};
use std::fmt;

/// A decoded literal payload carried by `Number`, `Str`, `True`, `False`
/// and `Nil` tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Number(f64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Nil => write!(f, "nil"),
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Str(s) => write!(f, "{}", s),
            Literal::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub literal: Option<Literal>,
    /// 1-indexed line of the token start
    pub line: u32,
    /// 1-indexed column of the token start
    pub column: u32,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: u32, column: u32, span: Span) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            literal: None,
            line,
            column,
            span,
        }
    }

    pub fn with_literal(mut self, literal: Literal) -> Self {
        self.literal = Some(literal);
        self
    }

    /// A token fabricated by a rewrite pass rather than read from source.
    /// Line/column 0 marks it as position-less; it is never rendered in a
    /// diagnostic.
    pub fn synthetic(kind: TokenKind, lexeme: impl Into<String>) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            literal: None,
            line: 0,
            column: 0,
            span: Span::default(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lexeme)
    }
}

/// Raw scanning failures surfaced by the logos automaton. The lexer
/// wrapper turns these into full diagnostics with position and hint.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawLexError {
    #[default]
    UnexpectedChar,
    UnterminatedString,
    UnterminatedBlockComment {
        depth: u32,
    },
    TrailingDecimalPoint,
    MissingExponentDigits,
}

/// All token types in the Box language
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(error = RawLexError)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
pub enum TokenKind {
    // ============ Literals ============
    /// Numeric literal: 42, 3.14, 1.5e10. A trailing decimal point or an
    /// exponent with no digits is a scan error, matched here so the error
    /// span covers the malformed literal.
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?")]
    #[regex(r"[0-9]+\.", trailing_decimal_point)]
    #[regex(r"[0-9]+(\.[0-9]+)?[eE][+-]?", missing_exponent_digits)]
    Number,

    /// String literal: "hello". May span lines; escape decoding happens in
    /// the lexer wrapper so escape errors point at the escape itself.
    #[token("\"", scan_string)]
    Str,

    /// Identifier: foo, _bar
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,

    // ============ Keywords ============
    #[token("var")]
    Var,
    #[token("print")]
    Print,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("fun")]
    Fun,
    #[token("return")]
    Return,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("nil")]
    Nil,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("break")]
    Break,
    #[token("import")]
    Import,
    #[token("unsafe")]
    Unsafe,

    // Built-in callables (reserved, but usable in call position)
    #[token("len")]
    Len,
    #[token("has")]
    Has,
    #[token("keys")]
    Keys,
    #[token("values")]
    Values,
    #[token("input")]
    Input,
    #[token("input_num")]
    InputNum,
    #[token("read_file")]
    ReadFile,
    #[token("write_file")]
    WriteFile,
    #[token("append_file")]
    AppendFile,
    #[token("file_exists")]
    FileExists,
    #[token("malloc")]
    Malloc,
    #[token("free")]
    Free,
    #[token("calloc")]
    Calloc,
    #[token("realloc")]
    Realloc,
    #[token("addr_of")]
    AddrOf,
    #[token("deref")]
    Deref,
    #[token("llvm_inline")]
    LlvmInline,

    // ============ Operators ============
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&")]
    Ampersand,
    #[token("->")]
    Arrow,
    #[token("!")]
    Bang,
    #[token("!=")]
    BangEqual,
    #[token("=")]
    Equal,
    #[token("==")]
    EqualEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,

    // ============ Delimiters ============
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,

    /// Nested block comment. Never emitted: the callback either skips the
    /// whole comment or reports the unmatched depth.
    #[token("/*", scan_block_comment)]
    BlockComment,

    /// End of file
    Eof,
}

impl TokenKind {
    /// Keywords that are also accepted in expression position as built-in
    /// callables (`malloc(100)`, `len(xs)`, ...).
    pub fn is_builtin_callable(&self) -> bool {
        matches!(
            self,
            TokenKind::Len
                | TokenKind::Has
                | TokenKind::Keys
                | TokenKind::Values
                | TokenKind::Input
                | TokenKind::InputNum
                | TokenKind::ReadFile
                | TokenKind::WriteFile
                | TokenKind::AppendFile
                | TokenKind::FileExists
                | TokenKind::Malloc
                | TokenKind::Free
                | TokenKind::Calloc
                | TokenKind::Realloc
                | TokenKind::AddrOf
                | TokenKind::Deref
                | TokenKind::LlvmInline
        )
    }

    /// Keywords that can begin a statement; the parser synchronizes to
    /// these after an error.
    pub fn starts_statement(&self) -> bool {
        matches!(
            self,
            TokenKind::Var
                | TokenKind::Fun
                | TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Print
                | TokenKind::Return
                | TokenKind::Switch
                | TokenKind::Break
        )
    }
}

/// Consume a string literal body up to the closing unescaped quote.
/// Escape sequences are validated later, when the literal is decoded.
fn scan_string(lex: &mut logos::Lexer<TokenKind>) -> Result<(), RawLexError> {
    let bytes = lex.remainder().as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                lex.bump(i + 1);
                return Ok(());
            }
            b'\\' => i += 2,
            _ => i += 1,
        }
    }
    lex.bump(bytes.len());
    Err(RawLexError::UnterminatedString)
}

/// Consume a block comment, honoring nesting. On success the whole comment
/// is skipped; otherwise the error records how many `*/` are missing.
fn scan_block_comment(lex: &mut logos::Lexer<TokenKind>) -> FilterResult<(), RawLexError> {
    let bytes = lex.remainder().as_bytes();
    let mut depth: u32 = 1;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'*' {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'*' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
            depth -= 1;
            i += 2;
            if depth == 0 {
                lex.bump(i);
                return FilterResult::Skip;
            }
        } else {
            i += 1;
        }
    }
    lex.bump(bytes.len());
    FilterResult::Error(RawLexError::UnterminatedBlockComment { depth })
}

fn trailing_decimal_point(_lex: &mut logos::Lexer<TokenKind>) -> Result<(), RawLexError> {
    Err(RawLexError::TrailingDecimalPoint)
}

fn missing_exponent_digits(_lex: &mut logos::Lexer<TokenKind>) -> Result<(), RawLexError> {
    Err(RawLexError::MissingExponentDigits)
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Number => "number",
            TokenKind::Str => "string",
            TokenKind::Identifier => "identifier",
            TokenKind::Var => "var",
            TokenKind::Print => "print",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::Fun => "fun",
            TokenKind::Return => "return",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Nil => "nil",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Switch => "switch",
            TokenKind::Case => "case",
            TokenKind::Default => "default",
            TokenKind::Break => "break",
            TokenKind::Import => "import",
            TokenKind::Unsafe => "unsafe",
            TokenKind::Len => "len",
            TokenKind::Has => "has",
            TokenKind::Keys => "keys",
            TokenKind::Values => "values",
            TokenKind::Input => "input",
            TokenKind::InputNum => "input_num",
            TokenKind::ReadFile => "read_file",
            TokenKind::WriteFile => "write_file",
            TokenKind::AppendFile => "append_file",
            TokenKind::FileExists => "file_exists",
            TokenKind::Malloc => "malloc",
            TokenKind::Free => "free",
            TokenKind::Calloc => "calloc",
            TokenKind::Realloc => "realloc",
            TokenKind::AddrOf => "addr_of",
            TokenKind::Deref => "deref",
            TokenKind::LlvmInline => "llvm_inline",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Ampersand => "&",
            TokenKind::Arrow => "->",
            TokenKind::Bang => "!",
            TokenKind::BangEqual => "!=",
            TokenKind::Equal => "=",
            TokenKind::EqualEqual => "==",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::BlockComment => "comment",
            TokenKind::Eof => "end of file",
        };
        write!(f, "{}", s)
    }
}
