//! Peephole rewrites
//!
//! Small local patterns: double negation (`--x`, `!!x`) and negated
//! equality (`!(a == b)` to `a != b`). Negated orderings are left alone:
//! `!(a < b)` and `a >= b` disagree when an operand is NaN.

use super::Pass;
use crate::ast::{CaseClause, Expr, Stmt};
use crate::token::{Token, TokenKind};

pub struct PeepholeOptimizer {
    modified: bool,
}

impl PeepholeOptimizer {
    pub fn new() -> Self {
        Self { modified: false }
    }

    fn optimize_stmt(&mut self, stmt: &Stmt) -> Stmt {
        match stmt {
            Stmt::Expression { expr } => Stmt::Expression {
                expr: self.optimize_expr(expr),
            },
            Stmt::Print { expr, keyword } => Stmt::Print {
                expr: self.optimize_expr(expr),
                keyword: keyword.clone(),
            },
            Stmt::Var {
                name,
                token,
                initializer,
            } => Stmt::Var {
                name: name.clone(),
                token: token.clone(),
                initializer: initializer.as_ref().map(|e| self.optimize_expr(e)),
            },
            Stmt::Block { statements, brace } => Stmt::Block {
                statements: statements.iter().map(|s| self.optimize_stmt(s)).collect(),
                brace: brace.clone(),
            },
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                keyword,
            } => Stmt::If {
                condition: self.optimize_expr(condition),
                then_branch: Box::new(self.optimize_stmt(then_branch)),
                else_branch: else_branch
                    .as_ref()
                    .map(|e| Box::new(self.optimize_stmt(e))),
                keyword: keyword.clone(),
            },
            Stmt::While {
                condition,
                body,
                keyword,
            } => Stmt::While {
                condition: self.optimize_expr(condition),
                body: Box::new(self.optimize_stmt(body)),
                keyword: keyword.clone(),
            },
            Stmt::Switch {
                keyword,
                condition,
                cases,
                default,
            } => Stmt::Switch {
                keyword: keyword.clone(),
                condition: self.optimize_expr(condition),
                cases: cases
                    .iter()
                    .map(|c| CaseClause {
                        value: self.optimize_expr(&c.value),
                        statements: c.statements.iter().map(|s| self.optimize_stmt(s)).collect(),
                    })
                    .collect(),
                default: default
                    .as_ref()
                    .map(|stmts| stmts.iter().map(|s| self.optimize_stmt(s)).collect()),
            },
            Stmt::Function {
                name,
                token,
                params,
                body,
            } => Stmt::Function {
                name: name.clone(),
                token: token.clone(),
                params: params.clone(),
                body: body.iter().map(|s| self.optimize_stmt(s)).collect(),
            },
            Stmt::Return { keyword, value } => Stmt::Return {
                keyword: keyword.clone(),
                value: value.as_ref().map(|e| self.optimize_expr(e)),
            },
            other => other.clone(),
        }
    }

    fn optimize_expr(&mut self, expr: &Expr) -> Expr {
        match expr {
            Expr::Unary { op, right } => {
                let right = self.optimize_expr(right);

                // --x and !!x
                if let Expr::Unary {
                    op: inner_op,
                    right: inner,
                } = &right
                {
                    if inner_op.kind == op.kind
                        && matches!(op.kind, TokenKind::Minus | TokenKind::Bang)
                    {
                        self.modified = true;
                        return inner.as_ref().clone();
                    }
                }

                if op.kind == TokenKind::Bang {
                    if let Some(inverted) = invert_equality(&right) {
                        self.modified = true;
                        return inverted;
                    }
                }

                Expr::Unary {
                    op: op.clone(),
                    right: Box::new(right),
                }
            }
            Expr::Binary { left, op, right } => Expr::Binary {
                left: Box::new(self.optimize_expr(left)),
                op: op.clone(),
                right: Box::new(self.optimize_expr(right)),
            },
            Expr::Logical { left, op, right } => Expr::Logical {
                left: Box::new(self.optimize_expr(left)),
                op: op.clone(),
                right: Box::new(self.optimize_expr(right)),
            },
            Expr::Grouping { expr } => Expr::Grouping {
                expr: Box::new(self.optimize_expr(expr)),
            },
            Expr::Assign { name, token, value } => Expr::Assign {
                name: name.clone(),
                token: token.clone(),
                value: Box::new(self.optimize_expr(value)),
            },
            Expr::Call { callee, paren, args } => Expr::Call {
                callee: callee.clone(),
                paren: paren.clone(),
                args: args.iter().map(|a| self.optimize_expr(a)).collect(),
            },
            Expr::Array { elements, bracket } => Expr::Array {
                elements: elements.iter().map(|e| self.optimize_expr(e)).collect(),
                bracket: bracket.clone(),
            },
            Expr::Dict { pairs, brace } => Expr::Dict {
                pairs: pairs
                    .iter()
                    .map(|(k, v)| (self.optimize_expr(k), self.optimize_expr(v)))
                    .collect(),
                brace: brace.clone(),
            },
            Expr::IndexGet {
                target,
                index,
                bracket,
            } => Expr::IndexGet {
                target: Box::new(self.optimize_expr(target)),
                index: Box::new(self.optimize_expr(index)),
                bracket: bracket.clone(),
            },
            Expr::IndexSet {
                target,
                index,
                value,
                bracket,
            } => Expr::IndexSet {
                target: Box::new(self.optimize_expr(target)),
                index: Box::new(self.optimize_expr(index)),
                value: Box::new(self.optimize_expr(value)),
                bracket: bracket.clone(),
            },
            other => other.clone(),
        }
    }
}

impl Pass for PeepholeOptimizer {
    fn name(&self) -> &'static str {
        "peephole-optimization"
    }

    fn run(&mut self, statements: &[Stmt]) -> Vec<Stmt> {
        self.modified = false;
        statements.iter().map(|s| self.optimize_stmt(s)).collect()
    }

    fn modified(&self) -> bool {
        self.modified
    }
}

/// `!(a == b)` to `a != b` and `!(a != b)` to `a == b`. Only the equality
/// pair is inverted; both sides behave identically for NaN operands.
fn invert_equality(expr: &Expr) -> Option<Expr> {
    let mut inner = expr;
    while let Expr::Grouping { expr } = inner {
        inner = expr;
    }
    let Expr::Binary { left, op, right } = inner else {
        return None;
    };

    let inverted = match op.kind {
        TokenKind::EqualEqual => Token {
            kind: TokenKind::BangEqual,
            lexeme: "!=".to_string(),
            ..op.clone()
        },
        TokenKind::BangEqual => Token {
            kind: TokenKind::EqualEqual,
            lexeme: "==".to_string(),
            ..op.clone()
        },
        _ => return None,
    };

    Some(Expr::Binary {
        left: left.clone(),
        op: inverted,
        right: right.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::super::tests::parse_source;
    use super::*;

    fn run(source: &str) -> (Vec<Stmt>, bool) {
        let mut pass = PeepholeOptimizer::new();
        let stmts = parse_source(source);
        let out = pass.run(&stmts);
        (out, pass.modified())
    }

    fn first_expr(stmts: &[Stmt]) -> &Expr {
        match &stmts[0] {
            Stmt::Expression { expr } => expr,
            _ => panic!("expected expression statement"),
        }
    }

    #[test]
    fn test_double_minus_removed() {
        let (out, modified) = run("--x;");
        assert!(modified);
        assert_eq!(first_expr(&out).variable_name(), Some("x"));
    }

    #[test]
    fn test_double_bang_removed() {
        let (out, modified) = run("!!x;");
        assert!(modified);
        assert_eq!(first_expr(&out).variable_name(), Some("x"));
    }

    #[test]
    fn test_nested_double_negation_inside_expression() {
        let (out, modified) = run("print 1 + --x;");
        assert!(modified);
        let Stmt::Print { expr, .. } = &out[0] else {
            panic!("expected print");
        };
        let Expr::Binary { right, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(right.variable_name(), Some("x"));
    }

    #[test]
    fn test_negated_equality_inverts() {
        let (out, modified) = run("!(a == b);");
        assert!(modified);
        assert!(matches!(first_expr(&out), Expr::Binary { op, .. } if op.kind == TokenKind::BangEqual));
    }

    #[test]
    fn test_negated_ordering_left_alone() {
        let (_, modified) = run("!(a < b);");
        assert!(!modified);
    }

    #[test]
    fn test_mixed_negations_left_alone() {
        let (_, modified) = run("-!x; !-x;");
        assert!(!modified);
    }
}
