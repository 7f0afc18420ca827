//! Lexer for the Box language
//!
//! Scanning is driven by the `logos` automaton on [`TokenKind`]; this
//! module wraps it to stamp tokens with line/column, decode literal
//! payloads (numbers, strings with escapes), enforce the identifier length
//! cap, and accumulate every lexical diagnostic instead of stopping at the
//! first.

use crate::diagnostics;
use crate::span::{LineIndex, Span};
use crate::token::{Literal, RawLexError, Token, TokenKind};
use logos::Logos;
use thiserror::Error;

/// Maximum identifier length in characters
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

/// A lexical diagnostic: position, message, optional remediation hint and
/// the raw source line for caret rendering.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct LexError {
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub hint: Option<String>,
    pub source_line: String,
}

impl LexError {
    pub fn render(&self) -> String {
        diagnostics::render(
            "LEXER ERROR",
            self.line,
            self.column,
            &self.message,
            self.hint.as_deref(),
            Some(&self.source_line),
        )
    }
}

/// Render a bundle of lexer errors: summary banner first, then each box.
pub fn render_errors(errors: &[LexError]) -> String {
    let mut out = diagnostics::render_summary(errors.len(), "lexical");
    for e in errors {
        out.push_str(&e.render());
    }
    out
}

/// The lexer for Box source text
pub struct Lexer<'src> {
    source: &'src str,
    index: LineIndex,
    errors: Vec<LexError>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            index: LineIndex::new(source),
            errors: Vec::new(),
        }
    }

    /// Scan the whole input. Returns the token sequence ending in `Eof`,
    /// or every lexical error found.
    pub fn tokenize(mut self) -> Result<Vec<Token>, Vec<LexError>> {
        let mut tokens = Vec::new();

        for (result, range) in TokenKind::lexer(self.source).spanned() {
            let span = Span::new(range.start, range.end);
            match result {
                Ok(kind) => {
                    if let Some(token) = self.build_token(kind, span) {
                        tokens.push(token);
                    }
                }
                Err(raw) => self.report_raw(raw, span),
            }
        }

        if !self.errors.is_empty() {
            return Err(self.errors);
        }

        let end = self.index.position(self.source.len());
        tokens.push(Token::new(
            TokenKind::Eof,
            "",
            end.line,
            end.column,
            Span::new(self.source.len(), self.source.len()),
        ));
        Ok(tokens)
    }

    fn build_token(&mut self, kind: TokenKind, span: Span) -> Option<Token> {
        let lexeme = span.text(self.source);
        let pos = self.index.position(span.start);
        let token = Token::new(kind, lexeme, pos.line, pos.column, span);

        match kind {
            TokenKind::Number => match self.decode_number(lexeme, span) {
                Some(value) => Some(token.with_literal(Literal::Number(value))),
                None => None,
            },
            TokenKind::Str => {
                let body = &lexeme[1..lexeme.len() - 1];
                match self.decode_string(body, span.start + 1) {
                    Ok(value) => Some(token.with_literal(Literal::Str(value))),
                    Err(e) => {
                        self.errors.push(e);
                        None
                    }
                }
            }
            TokenKind::Identifier => {
                if lexeme.chars().count() > MAX_IDENTIFIER_LENGTH {
                    let shown: String = lexeme.chars().take(50).collect();
                    self.push_error(
                        span.start,
                        format!("Identifier too long: '{}...'", shown),
                        Some(format!(
                            "Identifiers must be {} characters or fewer.\n       Current length: {} characters.\n       Consider using a shorter, more descriptive name.",
                            MAX_IDENTIFIER_LENGTH,
                            lexeme.chars().count()
                        )),
                    );
                    None
                } else {
                    Some(token)
                }
            }
            TokenKind::True => Some(token.with_literal(Literal::Bool(true))),
            TokenKind::False => Some(token.with_literal(Literal::Bool(false))),
            TokenKind::Nil => Some(token.with_literal(Literal::Nil)),
            _ => Some(token),
        }
    }

    fn decode_number(&mut self, lexeme: &str, span: Span) -> Option<f64> {
        match lexeme.parse::<f64>() {
            Ok(value) if value.is_infinite() && value > 0.0 => {
                self.push_error(
                    span.start,
                    format!(
                        "Number literal overflow: '{}' exceeds maximum representable value",
                        lexeme
                    ),
                    Some("Number is too large to represent. Use a smaller value.".to_string()),
                );
                None
            }
            Ok(value) if value.is_infinite() => {
                self.push_error(
                    span.start,
                    format!(
                        "Number literal underflow: '{}' exceeds minimum representable value",
                        lexeme
                    ),
                    Some("Number is too small to represent. Use a larger value.".to_string()),
                );
                None
            }
            Ok(value) => Some(value),
            Err(_) => {
                self.push_error(
                    span.start,
                    format!("Malformed number literal: '{}'", lexeme),
                    Some(
                        "Check the number format. Valid examples: 42, 3.14, 1.5e10, 2.0e-5"
                            .to_string(),
                    ),
                );
                None
            }
        }
    }

    /// Decode a string body (between the quotes). `body_offset` is the byte
    /// offset of the body's first character, so escape errors can point at
    /// the escape itself.
    fn decode_string(&self, body: &str, body_offset: usize) -> Result<String, LexError> {
        let mut value = String::with_capacity(body.len());
        let mut chars = body.char_indices();

        while let Some((_, c)) = chars.next() {
            if c != '\\' {
                value.push(c);
                continue;
            }

            let (esc_offset, esc) = match chars.next() {
                Some((i, c)) => (body_offset + i, c),
                None => {
                    return Err(self.error_at(
                        body_offset + body.len(),
                        "Invalid escape sequence '\\' in string literal".to_string(),
                        Some(escape_hint()),
                    ));
                }
            };

            match esc {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                '\\' => value.push('\\'),
                '"' => value.push('"'),
                '0' => value.push('\0'),
                'a' => value.push('\u{7}'),
                'b' => value.push('\u{8}'),
                'f' => value.push('\u{c}'),
                'v' => value.push('\u{b}'),
                'x' => {
                    let byte = self.read_hex(&mut chars, 2).ok_or_else(|| {
                        self.error_at(
                            esc_offset,
                            "Invalid hexadecimal escape sequence".to_string(),
                            Some(
                                "\\xHH requires two hex digits.\n       Example: \\x41 (represents 'A')"
                                    .to_string(),
                            ),
                        )
                    })?;
                    value.push(char::from(byte as u8));
                }
                'u' => {
                    let cp = self.read_hex(&mut chars, 4).ok_or_else(|| {
                        self.error_at(
                            esc_offset,
                            "Invalid unicode escape sequence".to_string(),
                            Some(
                                "\\uHHHH requires four hex digits.\n       Example: \\u0041 (represents 'A')"
                                    .to_string(),
                            ),
                        )
                    })?;
                    match char::from_u32(cp) {
                        Some(c) => value.push(c),
                        None => {
                            return Err(self.error_at(
                                esc_offset,
                                format!("Invalid Unicode code point: \\u{:04x}", cp),
                                Some(format!("Unicode code point U+{:04X} is not valid.", cp)),
                            ));
                        }
                    }
                }
                other => {
                    return Err(self.error_at(
                        esc_offset,
                        format!("Invalid escape sequence '\\{}' in string literal", other),
                        Some(escape_hint()),
                    ));
                }
            }
        }

        Ok(value)
    }

    fn read_hex(&self, chars: &mut std::str::CharIndices<'_>, count: usize) -> Option<u32> {
        let mut value = 0u32;
        for _ in 0..count {
            let (_, c) = chars.next()?;
            let digit = c.to_digit(16)?;
            value = value * 16 + digit;
        }
        Some(value)
    }

    fn report_raw(&mut self, raw: RawLexError, span: Span) {
        match raw {
            RawLexError::UnexpectedChar => {
                let c = self.source[span.start..].chars().next().unwrap_or('\0');
                let hint = match c {
                    '@' | '#' | '$' => format!(
                        "'{}' is not a valid Box operator. Did you mean to use a different operator?",
                        c
                    ),
                    '|' => "Use 'or' keyword instead of '|' for logical OR operation.".to_string(),
                    c if (c as u32) < 32 || c as u32 == 127 => format!(
                        "Invisible control character detected (ASCII {}). Remove it from source code.",
                        c as u32
                    ),
                    _ => "This character is not recognized in Box. Check your syntax.".to_string(),
                };
                self.push_error(
                    span.start,
                    format!("Unexpected character '{}' (ASCII {})", c, c as u32),
                    Some(hint),
                );
            }
            RawLexError::UnterminatedString => {
                let pos = self.index.position(span.start);
                let body = span.text(self.source);
                let mut hint = format!(
                    "Add closing '\"' to terminate the string literal.\n       String started at line {}, column {}.",
                    pos.line, pos.column
                );
                if body.contains('\n') {
                    hint.push_str("\n       Note: Multi-line strings are allowed in Box.");
                }
                self.push_error(
                    span.start,
                    "Unterminated string literal: missing closing quote".to_string(),
                    Some(hint),
                );
            }
            RawLexError::UnterminatedBlockComment { depth } => {
                let pos = self.index.position(span.start);
                self.push_error(
                    span.start,
                    format!("Unterminated block comment (missing {} closing '*/')", depth),
                    Some(format!(
                        "Add '*/' to close the comment. Block comments must be properly closed.\n       Opened at line {}, column {}.",
                        pos.line, pos.column
                    )),
                );
            }
            RawLexError::TrailingDecimalPoint => {
                self.push_error(
                    span.start,
                    "Invalid number literal: decimal point must be followed by digits".to_string(),
                    Some(
                        "A decimal point must be followed by at least one digit.\n       Example: 3.14 (correct), 3. (incorrect)"
                            .to_string(),
                    ),
                );
            }
            RawLexError::MissingExponentDigits => {
                self.push_error(
                    span.start,
                    "Invalid number literal: exponent must be followed by digits".to_string(),
                    Some(
                        "Exponent must be followed by at least one digit.\n       Example: 1.5e10 (correct), 1.5e (incorrect)"
                            .to_string(),
                    ),
                );
            }
        }
    }

    fn push_error(&mut self, offset: usize, message: String, hint: Option<String>) {
        let error = self.error_at(offset, message, hint);
        self.errors.push(error);
    }

    fn error_at(&self, offset: usize, message: String, hint: Option<String>) -> LexError {
        let pos = self.index.position(offset);
        LexError {
            message,
            line: pos.line,
            column: pos.column,
            hint,
            source_line: self.index.line_text(self.source, pos.line).to_string(),
        }
    }
}

fn escape_hint() -> String {
    "Valid escape sequences are: \\n, \\t, \\r, \\\\, \\\", \\0, \\a, \\b, \\f, \\v, \\xHH, \\uHHHH\n       If you want a literal backslash, use \\\\"
        .to_string()
}

/// Helper function to lex source code
pub fn lex(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("expected clean lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn errors(source: &str) -> Vec<LexError> {
        lex(source).expect_err("expected lex errors")
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_statement_tokens() {
        assert_eq!(
            kinds("var x = 42;"),
            vec![
                TokenKind::Var,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_token_positions() {
        let tokens = lex("var x;\nprint x;").unwrap();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (1, 5));
        assert_eq!((tokens[3].line, tokens[3].column), (2, 1));
        assert_eq!(tokens[1].lexeme, "x");
    }

    #[test]
    fn test_number_literal_value() {
        let tokens = lex("1.5e2").unwrap();
        assert_eq!(tokens[0].literal, Some(Literal::Number(150.0)));
    }

    #[test]
    fn test_string_escapes_decoded() {
        let tokens = lex(r#""a\tb\n\x41\u0042\\""#).unwrap();
        assert_eq!(
            tokens[0].literal,
            Some(Literal::Str("a\tb\nAB\\".to_string()))
        );
    }

    #[test]
    fn test_keyword_literals() {
        let tokens = lex("true false nil").unwrap();
        assert_eq!(tokens[0].literal, Some(Literal::Bool(true)));
        assert_eq!(tokens[1].literal, Some(Literal::Bool(false)));
        assert_eq!(tokens[2].literal, Some(Literal::Nil));
    }

    #[test]
    fn test_invalid_hex_escape() {
        let errs = errors(r#""\xZZ""#);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].message, "Invalid hexadecimal escape sequence");
        assert!(errs[0]
            .hint
            .as_deref()
            .unwrap()
            .contains("\\xHH requires two hex digits"));
    }

    #[test]
    fn test_invalid_escape_lists_legal_set() {
        let errs = errors(r#""\q""#);
        assert!(errs[0].message.contains("Invalid escape sequence '\\q'"));
        assert!(errs[0].hint.as_deref().unwrap().contains("\\xHH, \\uHHHH"));
    }

    #[test]
    fn test_unterminated_string_reports_opening_position() {
        let errs = errors("var s = \"abc");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("Unterminated string"));
        assert_eq!((errs[0].line, errs[0].column), (1, 9));
    }

    #[test]
    fn test_unterminated_block_comment_reports_opening_and_depth() {
        let errs = errors("var a = 1;\nvar b = 2;\n/* open /* nested\nvar c = 3;");
        assert_eq!(errs.len(), 1);
        assert!(errs[0]
            .message
            .contains("Unterminated block comment (missing 2 closing '*/')"));
        assert_eq!((errs[0].line, errs[0].column), (3, 1));
    }

    #[test]
    fn test_numeric_overflow() {
        let errs = errors("1e99999");
        assert!(errs[0].message.contains("overflow"));
        assert!(errs[0].message.contains("1e99999"));
    }

    #[test]
    fn test_identifier_length_boundary() {
        let ok = "a".repeat(255);
        assert_eq!(
            kinds(&ok),
            vec![TokenKind::Identifier, TokenKind::Eof]
        );

        let too_long = "a".repeat(256);
        let errs = errors(&too_long);
        assert!(errs[0].message.starts_with("Identifier too long"));
    }

    #[test]
    fn test_pipe_suggests_or() {
        let errs = errors("a | b");
        assert!(errs[0].hint.as_deref().unwrap().contains("'or' keyword"));
    }

    #[test]
    fn test_multiple_errors_accumulate() {
        let errs = errors("@ $");
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].column, 1);
        assert_eq!(errs[1].column, 3);
    }

    #[test]
    fn test_reprinted_tokens_round_trip_kinds() {
        let source = "fun f(a) { return a * 2; } var s = \"x\\ty\"; print f(1.5e2) >= 3;";
        let tokens = lex(source).unwrap();

        let reprinted: String = tokens
            .iter()
            .map(|t| t.lexeme.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let reparsed = lex(&reprinted).unwrap();

        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        let reparsed_kinds: Vec<TokenKind> = reparsed.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, reparsed_kinds);
    }

    #[test]
    fn test_error_carries_source_line() {
        let errs = errors("var x = 3.;");
        assert_eq!(errs[0].source_line, "var x = 3.;");
        let rendered = errs[0].render();
        assert!(rendered.contains("LEXER ERROR at Line 1, Column 9"));
        assert!(rendered.contains("   1 | var x = 3.;"));
    }
}
