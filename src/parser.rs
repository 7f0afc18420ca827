//! Parser for the Box language
//!
//! A recursive descent parser with precedence climbing. Errors are
//! accumulated: after a failed declaration the parser synchronizes to the
//! next statement boundary and keeps going, so one run surfaces every
//! problem in a file. Nesting and arity limits are enforced here so later
//! phases can assume a well-formed tree.

use crate::ast::{CaseClause, Expr, Stmt};
use crate::diagnostics;
use crate::span::LineIndex;
use crate::token::{Literal, Token, TokenKind};
use std::collections::HashSet;
use thiserror::Error;

/// Maximum function parameters and call arguments
pub const MAX_ARITY: usize = 255;
/// Maximum loop / block / function nesting depth
pub const MAX_NESTING_DEPTH: usize = 100;
/// Maximum array literal elements and dict literal pairs
pub const MAX_COLLECTION_LITERAL: usize = 1000;

/// A parse diagnostic anchored at a token
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ParseError {
    pub token: Token,
    pub message: String,
    pub hint: Option<String>,
    pub source_line: String,
}

impl ParseError {
    pub fn render(&self) -> String {
        diagnostics::render(
            "PARSER ERROR",
            self.token.line,
            self.token.column,
            &self.message,
            self.hint.as_deref(),
            Some(&self.source_line),
        )
    }
}

/// Render a bundle of parser errors: summary banner first, then each box.
pub fn render_errors(errors: &[ParseError]) -> String {
    let mut out = diagnostics::render_summary(errors.len(), "parsing");
    for e in errors {
        out.push_str(&e.render());
    }
    out
}

pub type ParseResult<T> = Result<T, ParseError>;

/// The parser for the Box language
pub struct Parser<'src> {
    tokens: Vec<Token>,
    source: &'src str,
    index: LineIndex,
    current: usize,
    loop_depth: usize,
    block_depth: usize,
    function_depth: usize,
    in_unsafe: bool,
}

impl<'src> Parser<'src> {
    /// Create a parser over a token sequence. The source string is kept
    /// only for diagnostic rendering.
    pub fn new(mut tokens: Vec<Token>, source: &'src str) -> Self {
        if tokens.is_empty() {
            tokens.push(Token::synthetic(TokenKind::Eof, ""));
        }
        Self {
            tokens,
            source,
            index: LineIndex::new(source),
            current: 0,
            loop_depth: 0,
            block_depth: 0,
            function_depth: 0,
            in_unsafe: false,
        }
    }

    /// Parse the whole program. Either every declaration parsed cleanly,
    /// or the accumulated errors are returned as a bundle.
    pub fn parse(mut self) -> Result<Vec<Stmt>, Vec<ParseError>> {
        let mut statements = Vec::new();
        let mut errors = Vec::new();

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    errors.push(e);
                    self.synchronize();
                }
            }
        }

        if errors.is_empty() {
            Ok(statements)
        } else {
            Err(errors)
        }
    }

    // ============ Declarations ============

    fn declaration(&mut self) -> ParseResult<Stmt> {
        if self.match_one(TokenKind::Import) {
            return self.import_statement();
        }
        if self.match_one(TokenKind::Var) {
            return self.var_declaration();
        }
        if self.match_one(TokenKind::Fun) {
            return self.function("function");
        }
        self.statement()
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        if !self.check(TokenKind::Identifier) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect variable name after 'var'",
                Some(
                    "Variable declarations must follow this pattern:\n       var variableName = value;\n       var variableName;"
                        .to_string(),
                ),
            ));
        }

        let name_token = self.advance();

        if name_token.lexeme.chars().count() > MAX_ARITY {
            let shown: String = name_token.lexeme.chars().take(50).collect();
            return Err(self.error(
                &name_token,
                format!("Variable name too long: '{}...'", shown),
                Some(format!(
                    "Variable names must be 255 characters or fewer.\n       Current length: {} characters.\n       Use a shorter, more descriptive name.",
                    name_token.lexeme.chars().count()
                )),
            ));
        }

        let initializer = if self.match_one(TokenKind::Equal) {
            match self.expression() {
                Ok(expr) => Some(expr),
                Err(_) => {
                    return Err(self.error(
                        &self.previous().clone(),
                        "Invalid initializer expression",
                        Some(
                            "Check the expression after '=' in variable declaration.\n       Example: var x = 42;"
                                .to_string(),
                        ),
                    ));
                }
            }
        } else {
            None
        };

        if !self.check(TokenKind::Semicolon) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect ';' after variable declaration",
                Some(
                    "Variable declarations must end with a semicolon.\n       Add ';' after the variable declaration."
                        .to_string(),
                ),
            ));
        }
        self.advance();

        Ok(Stmt::Var {
            name: name_token.lexeme.clone(),
            token: name_token,
            initializer,
        })
    }

    fn function(&mut self, kind: &str) -> ParseResult<Stmt> {
        if !self.check(TokenKind::Identifier) {
            return Err(self.error(
                &self.peek().clone(),
                format!("Expect {} name", kind),
                Some(
                    "Function declarations must have a name.\n       Example: fun myFunction() { ... }"
                        .to_string(),
                ),
            ));
        }

        let name_token = self.advance();

        if name_token.lexeme.chars().count() > MAX_ARITY {
            let shown: String = name_token.lexeme.chars().take(50).collect();
            return Err(self.error(
                &name_token,
                format!("Function name too long: '{}...'", shown),
                Some(format!(
                    "Function names must be 255 characters or fewer.\n       Current length: {} characters.",
                    name_token.lexeme.chars().count()
                )),
            ));
        }

        if !self.check(TokenKind::LParen) {
            return Err(self.error(
                &self.peek().clone(),
                format!("Expect '(' after {} name", kind),
                Some(format!(
                    "Function name must be followed by '('.\n       Example: fun {}() {{ ... }}",
                    name_token.lexeme
                )),
            ));
        }
        self.advance();

        let mut params: Vec<Token> = Vec::new();
        let mut param_names: HashSet<String> = HashSet::new();

        if !self.check(TokenKind::RParen) {
            loop {
                if params.len() >= MAX_ARITY {
                    return Err(self.error(
                        &self.peek().clone(),
                        format!("Cannot have more than {} parameters", MAX_ARITY),
                        Some(format!(
                            "Box functions support up to {} parameters.\n       Consider restructuring your function to use fewer parameters.",
                            MAX_ARITY
                        )),
                    ));
                }

                if !self.check(TokenKind::Identifier) {
                    return Err(self.error(
                        &self.peek().clone(),
                        "Expect parameter name",
                        Some(format!(
                            "Function parameters must be identifiers.\n       Example: fun {}(param1, param2) {{ ... }}",
                            name_token.lexeme
                        )),
                    ));
                }

                let param = self.advance();

                if !param_names.insert(param.lexeme.clone()) {
                    return Err(self.error(
                        &param,
                        format!("Duplicate parameter name '{}'", param.lexeme),
                        Some(format!(
                            "Each parameter name must be unique within the function.\n       Parameter '{}' is already defined.\n       Use different names for each parameter.",
                            param.lexeme
                        )),
                    ));
                }

                params.push(param);

                if !self.match_one(TokenKind::Comma) {
                    break;
                }

                if self.check(TokenKind::RParen) {
                    return Err(self.error(
                        &self.peek().clone(),
                        "Trailing comma in parameter list",
                        Some(format!(
                            "Remove the trailing comma before ')'.\n       Example: fun {}(a, b) not fun {}(a, b,)",
                            name_token.lexeme, name_token.lexeme
                        )),
                    ));
                }
            }
        }

        self.consume(TokenKind::RParen, "Expect ')' after parameters")?;

        if !self.check(TokenKind::LBrace) {
            return Err(self.error(
                &self.peek().clone(),
                format!("Expect '{{' before {} body", kind),
                Some(format!(
                    "Function body must be enclosed in curly braces.\n       Example: fun {}() {{ return 42; }}",
                    name_token.lexeme
                )),
            ));
        }
        self.advance();

        self.function_depth += 1;
        if self.function_depth > MAX_NESTING_DEPTH {
            self.function_depth -= 1;
            return Err(self.error(
                &name_token,
                "Function nesting depth exceeds maximum",
                Some(format!(
                    "Function nesting is too deep (maximum {} levels).\n       Consider refactoring nested functions into separate top-level functions.",
                    MAX_NESTING_DEPTH
                )),
            ));
        }

        let body = self.block();
        self.function_depth -= 1;
        let body = body?;

        Ok(Stmt::Function {
            name: name_token.lexeme.clone(),
            token: name_token,
            params,
            body,
        })
    }

    // ============ Statements ============

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.match_one(TokenKind::Print) {
            return self.print_statement();
        }
        if self.match_one(TokenKind::If) {
            return self.if_statement();
        }
        if self.match_one(TokenKind::While) {
            return self.while_statement();
        }
        if self.match_one(TokenKind::For) {
            return self.for_statement();
        }
        if self.match_one(TokenKind::Switch) {
            return self.switch_statement();
        }
        if self.match_one(TokenKind::Return) {
            return self.return_statement();
        }
        if self.match_one(TokenKind::Break) {
            return self.break_statement();
        }
        if self.match_one(TokenKind::Unsafe) {
            return self.unsafe_statement();
        }
        if self.match_one(TokenKind::LlvmInline) {
            return self.llvm_inline_statement();
        }
        if self.match_one(TokenKind::LBrace) {
            let brace = self.previous().clone();
            let statements = self.block()?;
            return Ok(Stmt::Block { statements, brace });
        }
        self.expression_statement()
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();

        let expr = match self.expression() {
            Ok(expr) => expr,
            Err(_) => {
                return Err(self.error(
                    &keyword,
                    "Invalid expression in print statement",
                    Some(
                        "The 'print' statement requires a valid expression.\n       Example: print \"Hello\"; or print 42;"
                            .to_string(),
                    ),
                ));
            }
        };

        if !self.check(TokenKind::Semicolon) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect ';' after value in print statement",
                Some(
                    "Print statements must end with a semicolon.\n       Example: print value;"
                        .to_string(),
                ),
            ));
        }
        self.advance();

        Ok(Stmt::Print { expr, keyword })
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();

        if !self.check(TokenKind::LParen) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect '(' after 'if'",
                Some(
                    "If statements require a condition in parentheses.\n       Example: if (x > 5) { ... }"
                        .to_string(),
                ),
            ));
        }
        self.advance();

        let condition = match self.expression() {
            Ok(expr) => expr,
            Err(_) => {
                return Err(self.error(
                    &keyword,
                    "Invalid condition in if statement",
                    Some(
                        "The condition in an if statement must be a valid expression.\n       Example: if (x == 5) { ... }"
                            .to_string(),
                    ),
                ));
            }
        };

        if !self.check(TokenKind::RParen) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect ')' after if condition",
                Some(
                    "Close the condition with ')' before the if body.\n       Example: if (condition) { ... }"
                        .to_string(),
                ),
            ));
        }
        self.advance();

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_one(TokenKind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            keyword,
        })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();

        self.loop_depth += 1;
        if self.loop_depth > MAX_NESTING_DEPTH {
            self.loop_depth -= 1;
            return Err(self.error(
                &keyword,
                "Loop nesting depth exceeds maximum",
                Some(format!(
                    "Loop nesting is too deep (maximum {} levels).\n       Consider extracting inner loops into separate functions.",
                    MAX_NESTING_DEPTH
                )),
            ));
        }

        let result = self.while_body(&keyword);
        self.loop_depth -= 1;
        result
    }

    fn while_body(&mut self, keyword: &Token) -> ParseResult<Stmt> {
        if !self.check(TokenKind::LParen) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect '(' after 'while'",
                Some(
                    "While loops require a condition in parentheses.\n       Example: while (count < 10) { ... }"
                        .to_string(),
                ),
            ));
        }
        self.advance();

        let condition = match self.expression() {
            Ok(expr) => expr,
            Err(_) => {
                return Err(self.error(
                    keyword,
                    "Invalid condition in while loop",
                    Some(
                        "The condition in a while loop must be a valid expression.\n       Example: while (x > 0) { ... }"
                            .to_string(),
                    ),
                ));
            }
        };

        if !self.check(TokenKind::RParen) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect ')' after while condition",
                Some(
                    "Close the condition with ')' before the loop body.\n       Example: while (condition) { ... }"
                        .to_string(),
                ),
            ));
        }
        self.advance();

        let body = Box::new(self.statement()?);

        Ok(Stmt::While {
            condition,
            body,
            keyword: keyword.clone(),
        })
    }

    /// `for (init; cond; incr) body` lowers to
    /// `{ init; while (cond) { body; incr; } }` at parse time.
    fn for_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();

        self.loop_depth += 1;
        if self.loop_depth > MAX_NESTING_DEPTH {
            self.loop_depth -= 1;
            return Err(self.error(
                &keyword,
                "Loop nesting depth exceeds maximum",
                Some(format!(
                    "Loop nesting is too deep (maximum {} levels).\n       Consider extracting inner loops into separate functions.",
                    MAX_NESTING_DEPTH
                )),
            ));
        }

        let result = self.for_body(&keyword);
        self.loop_depth -= 1;
        result
    }

    fn for_body(&mut self, keyword: &Token) -> ParseResult<Stmt> {
        if !self.check(TokenKind::LParen) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect '(' after 'for'",
                Some(
                    "For loops require three clauses in parentheses.\n       Example: for (var i = 0; i < 10; i = i + 1) { ... }"
                        .to_string(),
                ),
            ));
        }
        self.advance();

        let initializer = if self.match_one(TokenKind::Semicolon) {
            None
        } else if self.match_one(TokenKind::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenKind::Semicolon) {
            match self.expression() {
                Ok(expr) => Some(expr),
                Err(_) => {
                    return Err(self.error(
                        keyword,
                        "Invalid condition in for loop",
                        Some(
                            "The condition clause must be a valid expression.\n       Example: for (var i = 0; i < 10; i = i + 1) { ... }"
                                .to_string(),
                        ),
                    ));
                }
            }
        } else {
            None
        };

        if !self.check(TokenKind::Semicolon) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect ';' after loop condition",
                Some(
                    "For loop clauses must be separated by semicolons.\n       Example: for (init; condition; increment) { ... }"
                        .to_string(),
                ),
            ));
        }
        self.advance();

        let increment = if !self.check(TokenKind::RParen) {
            match self.expression() {
                Ok(expr) => Some(expr),
                Err(_) => {
                    return Err(self.error(
                        keyword,
                        "Invalid increment in for loop",
                        Some(
                            "The increment clause must be a valid expression.\n       Example: for (var i = 0; i < 10; i = i + 1) { ... }"
                                .to_string(),
                        ),
                    ));
                }
            }
        } else {
            None
        };

        if !self.check(TokenKind::RParen) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect ')' after for clauses",
                Some(
                    "Close the for loop clauses with ')' before the body.\n       Example: for (init; cond; incr) { ... }"
                        .to_string(),
                ),
            ));
        }
        self.advance();

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block {
                statements: vec![body, Stmt::Expression { expr: increment }],
                brace: keyword.clone(),
            };
        }

        let condition = condition.unwrap_or_else(|| Expr::Literal {
            value: Literal::Bool(true),
            token: keyword.clone(),
        });

        body = Stmt::While {
            condition,
            body: Box::new(body),
            keyword: keyword.clone(),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block {
                statements: vec![initializer, body],
                brace: keyword.clone(),
            };
        }

        Ok(body)
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();

        if self.function_depth == 0 {
            return Err(self.error(
                &keyword,
                "Cannot use 'return' outside of a function",
                Some(
                    "Return statements can only be used inside functions.\n       Move this return statement inside a function body."
                        .to_string(),
                ),
            ));
        }

        let value = if !self.check(TokenKind::Semicolon) {
            match self.expression() {
                Ok(expr) => Some(expr),
                Err(_) => {
                    return Err(self.error(
                        &keyword,
                        "Invalid return value expression",
                        Some(
                            "The return value must be a valid expression.\n       Example: return 42; or return x + y;"
                                .to_string(),
                        ),
                    ));
                }
            }
        } else {
            None
        };

        if !self.check(TokenKind::Semicolon) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect ';' after return value",
                Some(
                    "Return statements must end with a semicolon.\n       Example: return value;"
                        .to_string(),
                ),
            ));
        }
        self.advance();

        Ok(Stmt::Return { keyword, value })
    }

    fn break_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();

        if self.loop_depth == 0 {
            return Err(self.error(
                &keyword,
                "Cannot use 'break' outside of a loop or switch",
                Some(
                    "Break statements can only be used inside loops or switch statements.\n       Move this break statement inside a loop or switch body."
                        .to_string(),
                ),
            ));
        }

        if !self.check(TokenKind::Semicolon) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect ';' after 'break'",
                Some("Break statements must end with a semicolon.\n       Example: break;".to_string()),
            ));
        }
        self.advance();

        Ok(Stmt::Break { keyword })
    }

    fn switch_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();

        if !self.check(TokenKind::LParen) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect '(' after 'switch'",
                Some(
                    "Switch statements require a condition in parentheses.\n       Example: switch (value) { case 1: ... }"
                        .to_string(),
                ),
            ));
        }
        self.advance();

        let condition = match self.expression() {
            Ok(expr) => expr,
            Err(_) => {
                return Err(self.error(
                    &keyword,
                    "Invalid condition in switch",
                    Some(
                        "The condition in a switch must be a valid expression.\n       Example: switch (x) { ... }"
                            .to_string(),
                    ),
                ));
            }
        };

        if !self.check(TokenKind::RParen) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect ')' after switch condition",
                Some(
                    "Close the condition with ')' before the switch body.\n       Example: switch (condition) { ... }"
                        .to_string(),
                ),
            ));
        }
        self.advance();

        if !self.check(TokenKind::LBrace) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect '{' before switch body",
                Some(
                    "Switch body must be enclosed in curly braces.\n       Example: switch (x) { case 1: ... }"
                        .to_string(),
                ),
            ));
        }
        self.advance();

        // break is legal inside case bodies
        self.loop_depth += 1;
        let result = self.switch_body(&keyword, condition);
        self.loop_depth -= 1;
        result
    }

    fn switch_body(&mut self, keyword: &Token, condition: Expr) -> ParseResult<Stmt> {
        let mut cases = Vec::new();
        let mut default: Option<Vec<Stmt>> = None;

        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            if self.match_one(TokenKind::Case) {
                if default.is_some() {
                    return Err(self.error(
                        &self.previous().clone(),
                        "Case after default",
                        Some(
                            "Case clauses cannot appear after default clause.\n       Move all case clauses before the default clause."
                                .to_string(),
                        ),
                    ));
                }

                let value = match self.expression() {
                    Ok(expr) => expr,
                    Err(_) => {
                        return Err(self.error(
                            &self.previous().clone(),
                            "Invalid case value",
                            Some(
                                "Case value must be a valid expression.\n       Example: case 1: ... or case \"hello\": ..."
                                    .to_string(),
                            ),
                        ));
                    }
                };

                if !self.check(TokenKind::Colon) {
                    return Err(self.error(
                        &self.peek().clone(),
                        "Expect ':' after case value",
                        Some(
                            "Case value must be followed by ':'.\n       Example: case 1: statements..."
                                .to_string(),
                        ),
                    ));
                }
                self.advance();

                let statements = self.case_statements()?;
                cases.push(CaseClause { value, statements });
            } else if self.match_one(TokenKind::Default) {
                if default.is_some() {
                    return Err(self.error(
                        &self.previous().clone(),
                        "Duplicate default clause",
                        Some(
                            "Only one default clause is allowed per switch.\n       Remove the duplicate default clause."
                                .to_string(),
                        ),
                    ));
                }

                if !self.check(TokenKind::Colon) {
                    return Err(self.error(
                        &self.peek().clone(),
                        "Expect ':' after 'default'",
                        Some(
                            "Default must be followed by ':'.\n       Example: default: statements..."
                                .to_string(),
                        ),
                    ));
                }
                self.advance();

                default = Some(self.case_statements()?);
            } else {
                return Err(self.error(
                    &self.peek().clone(),
                    "Expect 'case' or 'default' in switch body",
                    Some(
                        "Switch body must contain case or default clauses.\n       Example: switch (x) { case 1: ... default: ... }"
                            .to_string(),
                    ),
                ));
            }
        }

        if !self.check(TokenKind::RBrace) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect '}' after switch body",
                Some(
                    "Switch statements must be closed with '}'.\n       Check that all opening '{' have matching closing '}'."
                        .to_string(),
                ),
            ));
        }
        self.advance();

        Ok(Stmt::Switch {
            keyword: keyword.clone(),
            condition,
            cases,
            default,
        })
    }

    fn case_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::Case)
            && !self.check(TokenKind::Default)
            && !self.check(TokenKind::RBrace)
            && !self.is_at_end()
        {
            statements.push(self.declaration()?);
        }
        Ok(statements)
    }

    fn unsafe_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();

        if !self.check(TokenKind::LBrace) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect '{' after 'unsafe'",
                Some("Unsafe blocks must be followed by '{'.\n       Example: unsafe { ... }".to_string()),
            ));
        }
        self.advance();

        let was_unsafe = self.in_unsafe;
        self.in_unsafe = true;

        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.in_unsafe = was_unsafe;
                    return Err(e);
                }
            }
        }

        self.in_unsafe = was_unsafe;

        if !self.check(TokenKind::RBrace) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect '}' after unsafe block",
                Some(
                    "Unsafe blocks must be closed with '}'.\n       Check that all opening '{' have matching closing '}'."
                        .to_string(),
                ),
            ));
        }
        self.advance();

        Ok(Stmt::Unsafe { keyword, statements })
    }

    fn llvm_inline_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();

        if !self.in_unsafe {
            return Err(self.error(
                &keyword,
                "llvm_inline() requires unsafe context",
                Some(
                    "llvm_inline() can only be used inside unsafe blocks.\n       Wrap your code in: unsafe { llvm_inline(...); }"
                        .to_string(),
                ),
            ));
        }

        if !self.check(TokenKind::LParen) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect '(' after 'llvm_inline'",
                Some(
                    "llvm_inline requires parentheses.\n       Example: llvm_inline(\"LLVM IR code\");"
                        .to_string(),
                ),
            ));
        }
        self.advance();

        if !self.check(TokenKind::Str) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect string literal with LLVM IR code",
                Some(
                    "llvm_inline requires a string literal containing LLVM IR code.\n       Example: llvm_inline(\"%result = add i32 5, 10\");"
                        .to_string(),
                ),
            ));
        }

        let code_token = self.advance();
        let ir = match &code_token.literal {
            Some(Literal::Str(s)) => s.clone(),
            _ => String::new(),
        };

        if !self.check(TokenKind::RParen) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect ')' after LLVM IR code",
                Some(
                    "llvm_inline call must be closed with ')'.\n       Check that all opening '(' have matching closing ')'."
                        .to_string(),
                ),
            ));
        }
        self.advance();

        if !self.check(TokenKind::Semicolon) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect ';' after llvm_inline() call",
                Some(
                    "Statements must end with semicolon.\n       Add ';' at the end of the statement."
                        .to_string(),
                ),
            ));
        }
        self.advance();

        Ok(Stmt::LlvmInline { keyword, ir })
    }

    fn import_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();

        if !self.check(TokenKind::Str) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect string literal with file path after 'import'",
                Some(
                    "import requires a string literal with the file path.\n       Example: import \"module.box\";"
                        .to_string(),
                ),
            ));
        }

        let path_token = self.advance();
        let path = match &path_token.literal {
            Some(Literal::Str(s)) => s.clone(),
            _ => {
                return Err(self.error(
                    &path_token,
                    "Invalid import path",
                    Some(
                        "import path must be a string.\n       Example: import \"utils.box\";"
                            .to_string(),
                    ),
                ));
            }
        };

        if path.is_empty() {
            return Err(self.error(
                &path_token,
                "Empty import path",
                Some(
                    "Import path cannot be empty.\n       Provide a valid file path like \"module.box\""
                        .to_string(),
                ),
            ));
        }

        if !self.check(TokenKind::Semicolon) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect ';' after import path",
                Some(
                    "Import statements must end with a semicolon.\n       Example: import \"module.box\";"
                        .to_string(),
                ),
            ));
        }
        self.advance();

        Ok(Stmt::Import {
            keyword,
            path,
            path_token,
        })
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.block_depth += 1;
        if self.block_depth > MAX_NESTING_DEPTH {
            self.block_depth -= 1;
            return Err(self.error(
                &self.peek().clone(),
                "Block nesting depth exceeds maximum",
                Some(format!(
                    "Block nesting is too deep (maximum {} levels).\n       Consider refactoring deeply nested code.",
                    MAX_NESTING_DEPTH
                )),
            ));
        }

        let result = self.block_statements();
        self.block_depth -= 1;
        result
    }

    fn block_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();

        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        if !self.check(TokenKind::RBrace) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect '}' after block",
                Some(
                    "Blocks must be closed with '}'.\n       Check that all opening '{' have matching closing '}'."
                        .to_string(),
                ),
            ));
        }
        self.advance();

        Ok(statements)
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;

        if !self.check(TokenKind::Semicolon) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect ';' after expression",
                Some(
                    "Statements must end with a semicolon.\n       Add ';' at the end of the statement."
                        .to_string(),
                ),
            ));
        }
        self.advance();

        Ok(Stmt::Expression { expr })
    }

    // ============ Expressions ============

    fn expression(&mut self) -> ParseResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.or_expr()?;

        if self.match_one(TokenKind::Equal) {
            let equals = self.previous().clone();
            let value = Box::new(self.assignment()?);

            return match expr {
                Expr::Variable { name, token } => Ok(Expr::Assign { name, token, value }),
                Expr::IndexGet {
                    target,
                    index,
                    bracket,
                } => Ok(Expr::IndexSet {
                    target,
                    index,
                    value,
                    bracket,
                }),
                _ => Err(self.error(
                    &equals,
                    "Invalid assignment target",
                    Some(
                        "Invalid assignment target. Only variables and array elements can be assigned to.\n       Example: variableName = value; or arr[0] = value;\n       Cannot assign to: literals, expressions, function calls"
                            .to_string(),
                    ),
                )),
            };
        }

        Ok(expr)
    }

    fn or_expr(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and_expr()?;

        while self.match_one(TokenKind::Or) {
            let op = self.previous().clone();
            let right = match self.and_expr() {
                Ok(expr) => expr,
                Err(_) => {
                    return Err(self.error(
                        &op,
                        "Invalid right operand for 'or'",
                        Some(
                            "The 'or' operator requires valid expressions on both sides.\n       Example: condition1 or condition2"
                                .to_string(),
                        ),
                    ));
                }
            };
            expr = Expr::Logical {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn and_expr(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;

        while self.match_one(TokenKind::And) {
            let op = self.previous().clone();
            let right = match self.equality() {
                Ok(expr) => expr,
                Err(_) => {
                    return Err(self.error(
                        &op,
                        "Invalid right operand for 'and'",
                        Some(
                            "The 'and' operator requires valid expressions on both sides.\n       Example: condition1 and condition2"
                                .to_string(),
                        ),
                    ));
                }
            };
            expr = Expr::Logical {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;

        while self.match_any(&[TokenKind::BangEqual, TokenKind::EqualEqual]) {
            let op = self.previous().clone();
            let right = self.binary_operand(&op, Self::comparison)?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;

        while self.match_any(&[
            TokenKind::Greater,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
        ]) {
            let op = self.previous().clone();
            let right = self.binary_operand(&op, Self::term)?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;

        while self.match_any(&[TokenKind::Minus, TokenKind::Plus]) {
            let op = self.previous().clone();
            let right = self.binary_operand(&op, Self::factor)?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;

        while self.match_any(&[TokenKind::Slash, TokenKind::Star, TokenKind::Percent]) {
            let op = self.previous().clone();
            let right = self.binary_operand(&op, Self::unary)?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn binary_operand(
        &mut self,
        op: &Token,
        parse: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        match parse(self) {
            Ok(expr) => Ok(expr),
            Err(_) => Err(self.error(
                op,
                format!("Invalid right operand for '{}'", op.lexeme),
                Some(format!(
                    "The '{}' operator requires valid expressions on both sides.\n       Example: value1 {} value2",
                    op.lexeme, op.lexeme
                )),
            )),
        }
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.match_any(&[TokenKind::Bang, TokenKind::Minus]) {
            let op = self.previous().clone();
            let right = match self.unary() {
                Ok(expr) => expr,
                Err(_) => {
                    return Err(self.error(
                        &op,
                        format!("Invalid operand for '{}'", op.lexeme),
                        Some(format!(
                            "The '{}' operator requires a valid expression.\n       Example: {}value",
                            op.lexeme, op.lexeme
                        )),
                    ));
                }
            };
            return Ok(Expr::Unary {
                op,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_one(TokenKind::LParen) {
                expr = self.finish_call(expr)?;
            } else if self.match_one(TokenKind::LBracket) {
                expr = self.finish_index(expr)?;
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut args = Vec::new();

        if !self.check(TokenKind::RParen) {
            loop {
                if args.len() >= MAX_ARITY {
                    return Err(self.error(
                        &self.peek().clone(),
                        format!("Cannot have more than {} arguments", MAX_ARITY),
                        Some(format!(
                            "Function calls support up to {} arguments.\n       Consider restructuring to use fewer arguments.",
                            MAX_ARITY
                        )),
                    ));
                }

                match self.expression() {
                    Ok(expr) => args.push(expr),
                    Err(_) => {
                        return Err(self.error(
                            &self.previous().clone(),
                            "Invalid argument expression",
                            Some(
                                "Function arguments must be valid expressions.\n       Example: functionName(arg1, arg2, arg3)"
                                    .to_string(),
                            ),
                        ));
                    }
                }

                if !self.match_one(TokenKind::Comma) {
                    break;
                }

                if self.check(TokenKind::RParen) {
                    return Err(self.error(
                        &self.peek().clone(),
                        "Trailing comma in argument list",
                        Some(
                            "Remove the trailing comma before ')'.\n       Example: func(a, b) not func(a, b,)"
                                .to_string(),
                        ),
                    ));
                }
            }
        }

        if !self.check(TokenKind::RParen) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect ')' after arguments",
                Some(
                    "Function calls must be closed with ')'.\n       Example: functionName(arg1, arg2)"
                        .to_string(),
                ),
            ));
        }
        let paren = self.advance();

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            args,
        })
    }

    fn finish_index(&mut self, target: Expr) -> ParseResult<Expr> {
        let bracket = self.previous().clone();

        let index = match self.expression() {
            Ok(expr) => expr,
            Err(_) => {
                return Err(self.error(
                    &bracket,
                    "Invalid array index expression",
                    Some(
                        "Array index must be a valid expression.\n       Example: arr[0] or arr[i + 1]"
                            .to_string(),
                    ),
                ));
            }
        };

        if !self.check(TokenKind::RBracket) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect ']' after array index",
                Some("Array indexing must be closed with ']'.\n       Example: arr[index]".to_string()),
            ));
        }
        let closing = self.advance();

        Ok(Expr::IndexGet {
            target: Box::new(target),
            index: Box::new(index),
            bracket: closing,
        })
    }

    fn array_literal(&mut self) -> ParseResult<Expr> {
        let bracket = self.previous().clone();
        let mut elements = Vec::new();

        if !self.check(TokenKind::RBracket) {
            loop {
                if elements.len() >= MAX_COLLECTION_LITERAL {
                    return Err(self.error(
                        &self.peek().clone(),
                        "Array literal too large",
                        Some(format!(
                            "Array literals support up to {} elements.\n       Consider using a different data structure or initialization method.",
                            MAX_COLLECTION_LITERAL
                        )),
                    ));
                }

                match self.expression() {
                    Ok(expr) => elements.push(expr),
                    Err(_) => {
                        return Err(self.error(
                            &bracket,
                            "Invalid array element expression",
                            Some(
                                "Array elements must be valid expressions.\n       Example: [1, 2, 3] or [x, y + 1, func()]"
                                    .to_string(),
                            ),
                        ));
                    }
                }

                if !self.match_one(TokenKind::Comma) {
                    break;
                }

                if self.check(TokenKind::RBracket) {
                    return Err(self.error(
                        &self.peek().clone(),
                        "Trailing comma in array literal",
                        Some(
                            "Remove the trailing comma before ']'.\n       Example: [1, 2, 3] not [1, 2, 3,]"
                                .to_string(),
                        ),
                    ));
                }
            }
        }

        if !self.check(TokenKind::RBracket) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect ']' after array elements",
                Some("Array literals must be closed with ']'.\n       Example: [1, 2, 3]".to_string()),
            ));
        }
        let closing = self.advance();

        Ok(Expr::Array {
            elements,
            bracket: closing,
        })
    }

    fn dict_literal(&mut self) -> ParseResult<Expr> {
        let brace = self.previous().clone();
        let mut pairs = Vec::new();

        if !self.check(TokenKind::RBrace) {
            loop {
                if pairs.len() >= MAX_COLLECTION_LITERAL {
                    return Err(self.error(
                        &self.peek().clone(),
                        "Dictionary literal too large",
                        Some(format!(
                            "Dictionary literals support up to {} key-value pairs.\n       Consider using a different data structure or initialization method.",
                            MAX_COLLECTION_LITERAL
                        )),
                    ));
                }

                let key = match self.expression() {
                    Ok(expr) => expr,
                    Err(_) => {
                        return Err(self.error(
                            &brace,
                            "Invalid dictionary key expression",
                            Some(
                                "Dictionary keys must be valid expressions.\n       Example: {\"name\": \"John\", \"age\": 30}"
                                    .to_string(),
                            ),
                        ));
                    }
                };

                if !self.check(TokenKind::Colon) {
                    return Err(self.error(
                        &self.peek().clone(),
                        "Expect ':' after dictionary key",
                        Some(
                            "Dictionary key-value pairs must be separated by ':'.\n       Example: {key: value}"
                                .to_string(),
                        ),
                    ));
                }
                self.advance();

                let value = match self.expression() {
                    Ok(expr) => expr,
                    Err(_) => {
                        return Err(self.error(
                            &brace,
                            "Invalid dictionary value expression",
                            Some(
                                "Dictionary values must be valid expressions.\n       Example: {\"name\": \"John\", \"age\": 30}"
                                    .to_string(),
                            ),
                        ));
                    }
                };

                pairs.push((key, value));

                if !self.match_one(TokenKind::Comma) {
                    break;
                }

                if self.check(TokenKind::RBrace) {
                    return Err(self.error(
                        &self.peek().clone(),
                        "Trailing comma in dictionary literal",
                        Some(
                            "Remove the trailing comma before '}'.\n       Example: {\"a\": 1, \"b\": 2} not {\"a\": 1, \"b\": 2,}"
                                .to_string(),
                        ),
                    ));
                }
            }
        }

        if !self.check(TokenKind::RBrace) {
            return Err(self.error(
                &self.peek().clone(),
                "Expect '}' after dictionary elements",
                Some(
                    "Dictionary literals must be closed with '}'.\n       Example: {\"key\": \"value\"}"
                        .to_string(),
                ),
            ));
        }
        let closing = self.advance();

        Ok(Expr::Dict {
            pairs,
            brace: closing,
        })
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let kind = self.peek().kind;

        match kind {
            TokenKind::False | TokenKind::True | TokenKind::Nil => {
                let token = self.advance();
                let value = match kind {
                    TokenKind::True => Literal::Bool(true),
                    TokenKind::False => Literal::Bool(false),
                    _ => Literal::Nil,
                };
                return Ok(Expr::Literal { value, token });
            }
            TokenKind::Number => {
                let token = self.advance();
                let value = match &token.literal {
                    Some(lit @ Literal::Number(_)) => lit.clone(),
                    _ => {
                        return Err(self.error(
                            &token,
                            "Internal error: number token without numeric value",
                            None,
                        ));
                    }
                };
                return Ok(Expr::Literal { value, token });
            }
            TokenKind::Str => {
                let token = self.advance();
                let value = match &token.literal {
                    Some(lit @ Literal::Str(_)) => lit.clone(),
                    _ => {
                        return Err(self.error(
                            &token,
                            "Internal error: string token without string value",
                            None,
                        ));
                    }
                };
                return Ok(Expr::Literal { value, token });
            }
            TokenKind::Identifier => {
                let token = self.advance();
                return Ok(Expr::Variable {
                    name: token.lexeme.clone(),
                    token,
                });
            }
            kind if kind.is_builtin_callable() => {
                let token = self.advance();
                return Ok(Expr::Variable {
                    name: token.lexeme.clone(),
                    token,
                });
            }
            TokenKind::LBracket => {
                self.advance();
                return self.array_literal();
            }
            TokenKind::LBrace => {
                self.advance();
                return self.dict_literal();
            }
            TokenKind::LParen => {
                self.advance();
                let expr = match self.expression() {
                    Ok(expr) => expr,
                    Err(_) => {
                        return Err(self.error(
                            &self.previous().clone(),
                            "Invalid expression in grouping",
                            Some(
                                "Grouped expressions must contain valid expressions.\n       Example: (value + 5)"
                                    .to_string(),
                            ),
                        ));
                    }
                };

                if !self.check(TokenKind::RParen) {
                    return Err(self.error(
                        &self.peek().clone(),
                        "Expect ')' after expression",
                        Some(
                            "Grouped expressions must be closed with ')'.\n       Check that all opening '(' have matching closing ')'."
                                .to_string(),
                        ),
                    ));
                }
                self.advance();

                return Ok(Expr::Grouping {
                    expr: Box::new(expr),
                });
            }
            _ => {}
        }

        let current = self.peek().clone();
        let hint = match current.kind {
            TokenKind::Semicolon => {
                "Unexpected semicolon. Did you forget an expression before ';'?".to_string()
            }
            TokenKind::RBrace => {
                "Unexpected '}'. Check for matching '{' or missing expression.".to_string()
            }
            TokenKind::RParen => {
                "Unexpected ')'. Check for matching '(' or missing expression.".to_string()
            }
            TokenKind::Plus | TokenKind::Star | TokenKind::Slash | TokenKind::Percent => format!(
                "'{}' requires a left operand.\n       Example: value {} 5",
                current.lexeme, current.lexeme
            ),
            TokenKind::Eof => {
                "Unexpected end of file. Check for unclosed blocks or incomplete expressions."
                    .to_string()
            }
            _ => "This token cannot start an expression.\n       Valid expression starters: numbers, strings, identifiers, '(', '[', '{', true, false, nil"
                .to_string(),
        };

        Err(self.error(&current, "Expect expression", Some(hint)))
    }

    // ============ Recovery and token helpers ============

    /// Discard tokens up to the next statement boundary so parsing can
    /// resume after an error.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            if self.peek().kind.starts_statement() {
                return;
            }
            self.advance();
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1).min(self.tokens.len() - 1)]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn match_one(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_any(&mut self, kinds: &[TokenKind]) -> bool {
        for &kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(&self.peek().clone(), message, None))
        }
    }

    fn error(&self, token: &Token, message: impl Into<String>, hint: Option<String>) -> ParseError {
        ParseError {
            token: token.clone(),
            message: message.into(),
            hint,
            source_line: self.index.line_text(self.source, token.line).to_string(),
        }
    }
}

/// Helper function to parse a token sequence
pub fn parse(tokens: Vec<Token>, source: &str) -> Result<Vec<Stmt>, Vec<ParseError>> {
    Parser::new(tokens, source).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;

    fn parse_ok(source: &str) -> Vec<Stmt> {
        let tokens = lexer::lex(source).expect("lex failed");
        parse(tokens, source).expect("parse failed")
    }

    fn parse_err(source: &str) -> Vec<ParseError> {
        let tokens = lexer::lex(source).expect("lex failed");
        parse(tokens, source).expect_err("expected parse errors")
    }

    #[test]
    fn test_four_statements() {
        let stmts = parse_ok("var x = 42; var y = 10; var z = x + y; print z;");
        assert_eq!(stmts.len(), 4);
        assert!(matches!(stmts[0], Stmt::Var { .. }));
        assert!(matches!(stmts[3], Stmt::Print { .. }));
    }

    #[test]
    fn test_precedence() {
        let stmts = parse_ok("var x = 1 + 2 * 3;");
        let Stmt::Var {
            initializer: Some(Expr::Binary { op, right, .. }),
            ..
        } = &stmts[0]
        else {
            panic!("expected var with binary initializer");
        };
        assert_eq!(op.kind, TokenKind::Plus);
        assert!(matches!(
            right.as_ref(),
            Expr::Binary { op, .. } if op.kind == TokenKind::Star
        ));
    }

    #[test]
    fn test_for_lowering() {
        let stmts = parse_ok("for (var i = 0; i < 3; i = i + 1) { print i; }");
        // outer block: [init, while]
        let Stmt::Block { statements, .. } = &stmts[0] else {
            panic!("expected lowered block");
        };
        assert_eq!(statements.len(), 2);
        assert!(matches!(statements[0], Stmt::Var { .. }));
        let Stmt::While { body, .. } = &statements[1] else {
            panic!("expected while");
        };
        // inner block: [body, increment]
        let Stmt::Block { statements, .. } = body.as_ref() else {
            panic!("expected inner block");
        };
        assert_eq!(statements.len(), 2);
        assert!(matches!(statements[1], Stmt::Expression { .. }));
    }

    #[test]
    fn test_for_without_condition_gets_true() {
        let stmts = parse_ok("for (;;) { break; }");
        let Stmt::While { condition, .. } = &stmts[0] else {
            panic!("expected while");
        };
        assert_eq!(condition.literal_truthiness(), Some(true));
    }

    #[test]
    fn test_index_assignment_desugars_to_index_set() {
        let stmts = parse_ok("xs[0] = 5;");
        let Stmt::Expression { expr } = &stmts[0] else {
            panic!("expected expression statement");
        };
        assert!(matches!(expr, Expr::IndexSet { .. }));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let errs = parse_err("1 = 2;");
        assert_eq!(errs[0].message, "Invalid assignment target");
    }

    #[test]
    fn test_break_outside_loop() {
        let errs = parse_err("break;");
        assert!(errs[0].message.contains("'break' outside of a loop"));
    }

    #[test]
    fn test_break_inside_switch_is_allowed() {
        parse_ok("switch (1) { case 1: break; }");
    }

    #[test]
    fn test_return_outside_function() {
        let errs = parse_err("return 1;");
        assert!(errs[0].message.contains("'return' outside of a function"));
    }

    #[test]
    fn test_llvm_inline_requires_unsafe() {
        let errs = parse_err("llvm_inline(\"ret void\");");
        assert!(errs[0].message.contains("requires unsafe context"));

        let stmts = parse_ok("unsafe { llvm_inline(\"ret void\"); }");
        let Stmt::Unsafe { statements, .. } = &stmts[0] else {
            panic!("expected unsafe block");
        };
        assert!(matches!(&statements[0], Stmt::LlvmInline { ir, .. } if ir == "ret void"));
    }

    #[test]
    fn test_case_after_default() {
        let errs = parse_err("switch (x) { default: print 1; case 2: print 2; }");
        assert_eq!(errs[0].message, "Case after default");
    }

    #[test]
    fn test_duplicate_default() {
        let errs = parse_err("switch (x) { default: print 1; default: print 2; }");
        assert_eq!(errs[0].message, "Duplicate default clause");
    }

    #[test]
    fn test_duplicate_parameter() {
        let errs = parse_err("fun f(a, a) { return a; }");
        assert!(errs[0].message.contains("Duplicate parameter name 'a'"));
    }

    #[test]
    fn test_trailing_commas_rejected() {
        assert!(parse_err("fun f(a, b,) { return a; }")[0]
            .message
            .contains("Trailing comma in parameter list"));
        assert!(parse_err("f(1, 2,);")[0]
            .message
            .contains("Trailing comma in argument list"));
        assert!(parse_err("var a = [1, 2,];")[0]
            .message
            .contains("Trailing comma in array literal"));
        assert!(parse_err("var d = {\"a\": 1,};")[0]
            .message
            .contains("Trailing comma in dictionary literal"));
    }

    #[test]
    fn test_empty_import_path() {
        let errs = parse_err("import \"\";");
        assert_eq!(errs[0].message, "Empty import path");
    }

    #[test]
    fn test_import_statement() {
        let stmts = parse_ok("import \"utils.box\";");
        assert!(matches!(&stmts[0], Stmt::Import { path, .. } if path == "utils.box"));
    }

    #[test]
    fn test_builtin_callable_in_expression() {
        let stmts = parse_ok("var x = malloc(100);");
        let Stmt::Var {
            initializer: Some(Expr::Call { callee, .. }),
            ..
        } = &stmts[0]
        else {
            panic!("expected call initializer");
        };
        assert_eq!(callee.variable_name(), Some("malloc"));
    }

    #[test]
    fn test_argument_limit() {
        let ok_args: Vec<String> = (0..255).map(|i| i.to_string()).collect();
        let src = format!("f({});", ok_args.join(", "));
        parse_ok(&src);

        let too_many: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let src = format!("f({});", too_many.join(", "));
        let errs = parse_err(&src);
        assert!(errs[0].message.contains("more than 255 arguments"));
    }

    #[test]
    fn test_array_literal_limit() {
        let ok: Vec<String> = (0..1000).map(|i| i.to_string()).collect();
        parse_ok(&format!("var a = [{}];", ok.join(", ")));

        let too_many: Vec<String> = (0..1001).map(|i| i.to_string()).collect();
        let errs = parse_err(&format!("var a = [{}];", too_many.join(", ")));
        assert_eq!(errs[0].message, "Array literal too large");
    }

    #[test]
    fn test_block_nesting_limit() {
        let ok = format!("{}print 1;{}", "{".repeat(100), "}".repeat(100));
        parse_ok(&ok);

        let too_deep = format!("{}print 1;{}", "{".repeat(101), "}".repeat(101));
        let errs = parse_err(&too_deep);
        assert!(errs[0].message.contains("Block nesting depth exceeds maximum"));
    }

    #[test]
    fn test_loop_nesting_limit() {
        let ok = format!(
            "{}print 1;{}",
            "while (true) { ".repeat(100),
            "}".repeat(100)
        );
        parse_ok(&ok);

        let too_deep = format!(
            "{}print 1;{}",
            "while (true) { ".repeat(101),
            "}".repeat(101)
        );
        let errs = parse_err(&too_deep);
        assert!(errs[0].message.contains("Loop nesting depth exceeds maximum"));
    }

    #[test]
    fn test_error_recovery_collects_multiple_errors() {
        let errs = parse_err("var = 1;\nprint 2;\nvar = 3;");
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].token.line, 1);
        assert_eq!(errs[1].token.line, 3);
    }

    #[test]
    fn test_error_rendering_has_caret() {
        let errs = parse_err("print 1");
        let rendered = errs[0].render();
        assert!(rendered.contains("PARSER ERROR at Line 1, Column 8"));
        assert!(rendered.contains("Expect ';' after value in print statement"));
        assert!(rendered.contains("Hint:"));
    }
}
