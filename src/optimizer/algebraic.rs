//! Algebraic identity simplification
//!
//! Rewrites that hold for IEEE-754 float64 operands: additive and
//! multiplicative identities, `x - x` and `x / x` for same-spelled
//! variables, and small multiplications by powers of two expanded into
//! repeated addition. Rewrites that would drop or duplicate an operand
//! require it to be side-effect free.

use super::{has_side_effects, is_power_of_two, log2_int, synthetic_number, Pass};
use crate::ast::{CaseClause, Expr, Stmt};
use crate::token::{Token, TokenKind};

pub struct AlgebraicSimplifier {
    modified: bool,
    opt_level: u8,
}

impl AlgebraicSimplifier {
    pub fn new(opt_level: u8) -> Self {
        Self {
            modified: false,
            opt_level,
        }
    }

    fn simplify_stmt(&mut self, stmt: &Stmt) -> Stmt {
        match stmt {
            Stmt::Expression { expr } => Stmt::Expression {
                expr: self.simplify_expr(expr),
            },
            Stmt::Print { expr, keyword } => Stmt::Print {
                expr: self.simplify_expr(expr),
                keyword: keyword.clone(),
            },
            Stmt::Var {
                name,
                token,
                initializer,
            } => Stmt::Var {
                name: name.clone(),
                token: token.clone(),
                initializer: initializer.as_ref().map(|e| self.simplify_expr(e)),
            },
            Stmt::Block { statements, brace } => Stmt::Block {
                statements: statements.iter().map(|s| self.simplify_stmt(s)).collect(),
                brace: brace.clone(),
            },
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                keyword,
            } => Stmt::If {
                condition: self.simplify_expr(condition),
                then_branch: Box::new(self.simplify_stmt(then_branch)),
                else_branch: else_branch
                    .as_ref()
                    .map(|e| Box::new(self.simplify_stmt(e))),
                keyword: keyword.clone(),
            },
            Stmt::While {
                condition,
                body,
                keyword,
            } => Stmt::While {
                condition: self.simplify_expr(condition),
                body: Box::new(self.simplify_stmt(body)),
                keyword: keyword.clone(),
            },
            Stmt::Switch {
                keyword,
                condition,
                cases,
                default,
            } => Stmt::Switch {
                keyword: keyword.clone(),
                condition: self.simplify_expr(condition),
                cases: cases
                    .iter()
                    .map(|c| CaseClause {
                        value: self.simplify_expr(&c.value),
                        statements: c.statements.iter().map(|s| self.simplify_stmt(s)).collect(),
                    })
                    .collect(),
                default: default
                    .as_ref()
                    .map(|stmts| stmts.iter().map(|s| self.simplify_stmt(s)).collect()),
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
                body: body.iter().map(|s| self.simplify_stmt(s)).collect(),
            },
            Stmt::Return { keyword, value } => Stmt::Return {
                keyword: keyword.clone(),
                value: value.as_ref().map(|e| self.simplify_expr(e)),
            },
            other => other.clone(),
        }
    }

    fn simplify_expr(&mut self, expr: &Expr) -> Expr {
        match expr {
            Expr::Binary { left, op, right } => {
                let left = self.simplify_expr(left);
                let right = self.simplify_expr(right);
                self.simplify_binary(left, op, right)
            }
            Expr::Unary { op, right } => {
                let right = self.simplify_expr(right);

                if op.kind == TokenKind::Minus {
                    if let Expr::Unary {
                        op: inner_op,
                        right: inner,
                    } = &right
                    {
                        if inner_op.kind == TokenKind::Minus {
                            self.modified = true;
                            return inner.as_ref().clone();
                        }
                    }
                }

                Expr::Unary {
                    op: op.clone(),
                    right: Box::new(right),
                }
            }
            Expr::Grouping { expr } => {
                self.modified = true;
                self.simplify_expr(expr)
            }
            Expr::Logical { left, op, right } => Expr::Logical {
                left: Box::new(self.simplify_expr(left)),
                op: op.clone(),
                right: Box::new(self.simplify_expr(right)),
            },
            Expr::Array { elements, bracket } => Expr::Array {
                elements: elements.iter().map(|e| self.simplify_expr(e)).collect(),
                bracket: bracket.clone(),
            },
            Expr::Dict { pairs, brace } => Expr::Dict {
                pairs: pairs
                    .iter()
                    .map(|(k, v)| (self.simplify_expr(k), self.simplify_expr(v)))
                    .collect(),
                brace: brace.clone(),
            },
            Expr::IndexGet {
                target,
                index,
                bracket,
            } => Expr::IndexGet {
                target: Box::new(self.simplify_expr(target)),
                index: Box::new(self.simplify_expr(index)),
                bracket: bracket.clone(),
            },
            Expr::IndexSet {
                target,
                index,
                value,
                bracket,
            } => Expr::IndexSet {
                target: Box::new(self.simplify_expr(target)),
                index: Box::new(self.simplify_expr(index)),
                value: Box::new(self.simplify_expr(value)),
                bracket: bracket.clone(),
            },
            Expr::Assign { name, token, value } => Expr::Assign {
                name: name.clone(),
                token: token.clone(),
                value: Box::new(self.simplify_expr(value)),
            },
            Expr::Call { callee, paren, args } => Expr::Call {
                callee: callee.clone(),
                paren: paren.clone(),
                args: args.iter().map(|a| self.simplify_expr(a)).collect(),
            },
            other => other.clone(),
        }
    }

    fn simplify_binary(&mut self, left: Expr, op: &Token, right: Expr) -> Expr {
        match op.kind {
            TokenKind::Plus => {
                if is_zero(&left) {
                    self.modified = true;
                    return right;
                }
                if is_zero(&right) {
                    self.modified = true;
                    return left;
                }
            }
            TokenKind::Minus => {
                if is_zero(&right) {
                    self.modified = true;
                    return left;
                }
                if same_variable(&left, &right) {
                    self.modified = true;
                    return synthetic_number(0.0);
                }
            }
            TokenKind::Star => {
                if is_zero(&left) && !has_side_effects(&right) {
                    self.modified = true;
                    return synthetic_number(0.0);
                }
                if is_zero(&right) && !has_side_effects(&left) {
                    self.modified = true;
                    return synthetic_number(0.0);
                }
                if is_one(&left) {
                    self.modified = true;
                    return right;
                }
                if is_one(&right) {
                    self.modified = true;
                    return left;
                }

                if let Some(factor) = right.literal_number() {
                    // Duplicating the left side is only sound when it is
                    // pure; the fold also has to be skipped for literal
                    // operands, which belong to the constant folder.
                    if left.literal_number().is_none() && !has_side_effects(&left) {
                        if factor == 2.0 {
                            self.modified = true;
                            return doubled(&left, 1);
                        }
                        if self.opt_level >= 2 && is_power_of_two(factor) {
                            self.modified = true;
                            return doubled(&left, log2_int(factor as u64));
                        }
                    }
                }
            }
            TokenKind::Slash => {
                if is_one(&right) {
                    self.modified = true;
                    return left;
                }
                if same_variable(&left, &right) {
                    self.modified = true;
                    return synthetic_number(1.0);
                }
            }
            _ => {}
        }

        Expr::Binary {
            left: Box::new(left),
            op: op.clone(),
            right: Box::new(right),
        }
    }
}

impl Pass for AlgebraicSimplifier {
    fn name(&self) -> &'static str {
        "algebraic-simplification"
    }

    fn run(&mut self, statements: &[Stmt]) -> Vec<Stmt> {
        self.modified = false;
        statements.iter().map(|s| self.simplify_stmt(s)).collect()
    }

    fn modified(&self) -> bool {
        self.modified
    }
}

fn is_zero(expr: &Expr) -> bool {
    expr.literal_number() == Some(0.0)
}

fn is_one(expr: &Expr) -> bool {
    expr.literal_number() == Some(1.0)
}

/// Same-spelled plain variable references. Structural expression equality
/// is deliberately not used here: `f() - f()` must not become 0.
fn same_variable(a: &Expr, b: &Expr) -> bool {
    match (a.variable_name(), b.variable_name()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// `expr` summed with itself `2^k` ways: k rounds of `e -> e + e`.
fn doubled(expr: &Expr, rounds: usize) -> Expr {
    let mut result = expr.clone();
    for _ in 0..rounds {
        result = Expr::Binary {
            left: Box::new(result.clone()),
            op: Token::synthetic(TokenKind::Plus, "+"),
            right: Box::new(result),
        };
    }
    result
}

#[cfg(test)]
mod tests {
    use super::super::tests::parse_source;
    use super::*;

    fn simplify(source: &str) -> Vec<Stmt> {
        simplify_at(source, 3)
    }

    fn simplify_at(source: &str, level: u8) -> Vec<Stmt> {
        let mut pass = AlgebraicSimplifier::new(level);
        let stmts = parse_source(source);
        pass.run(&stmts)
    }

    fn first_init(stmts: &[Stmt]) -> &Expr {
        match &stmts[0] {
            Stmt::Var {
                initializer: Some(init),
                ..
            } => init,
            _ => panic!("expected var with initializer"),
        }
    }

    #[test]
    fn test_additive_identities() {
        let out = simplify("var a = x + 0; var b = 0 + x; var c = x - 0;");
        for stmt in &out {
            let Stmt::Var {
                initializer: Some(init),
                ..
            } = stmt
            else {
                panic!("expected var");
            };
            assert_eq!(init.variable_name(), Some("x"));
        }
    }

    #[test]
    fn test_x_minus_x_same_spelling_only() {
        let out = simplify("var a = x - x;");
        assert_eq!(first_init(&out).literal_number(), Some(0.0));

        let out = simplify("var a = f() - f();");
        assert!(matches!(first_init(&out), Expr::Binary { .. }));
    }

    #[test]
    fn test_multiplicative_identities() {
        let out = simplify("var a = x * 1; var b = 1 * x; var c = x / 1;");
        for stmt in &out {
            let Stmt::Var {
                initializer: Some(init),
                ..
            } = stmt
            else {
                panic!("expected var");
            };
            assert_eq!(init.variable_name(), Some("x"));
        }
    }

    #[test]
    fn test_multiply_by_zero_requires_pure_operand() {
        let out = simplify("var a = x * 0;");
        assert_eq!(first_init(&out).literal_number(), Some(0.0));

        let out = simplify("var a = f() * 0;");
        assert!(matches!(first_init(&out), Expr::Binary { .. }));
    }

    #[test]
    fn test_x_over_x() {
        let out = simplify("var a = x / x;");
        assert_eq!(first_init(&out).literal_number(), Some(1.0));
    }

    #[test]
    fn test_times_two_becomes_addition() {
        let out = simplify_at("var a = x * 2;", 1);
        let Expr::Binary { left, op, right } = first_init(&out) else {
            panic!("expected binary");
        };
        assert_eq!(op.kind, TokenKind::Plus);
        assert_eq!(left.variable_name(), Some("x"));
        assert_eq!(right.variable_name(), Some("x"));
    }

    #[test]
    fn test_power_of_two_expansion_gated_by_level() {
        // level 1: x * 8 untouched
        let out = simplify_at("var a = x * 8;", 1);
        assert!(matches!(first_init(&out), Expr::Binary { op, .. } if op.kind == TokenKind::Star));

        // level 2: x * 8 -> three doubling rounds, i.e. 8 leaves
        let out = simplify_at("var a = x * 8;", 2);
        fn count_leaves(e: &Expr) -> usize {
            match e {
                Expr::Binary { left, right, .. } => count_leaves(left) + count_leaves(right),
                _ => 1,
            }
        }
        assert_eq!(count_leaves(first_init(&out)), 8);
    }

    #[test]
    fn test_call_duplication_is_refused() {
        let out = simplify("var a = f() * 2;");
        assert!(matches!(first_init(&out), Expr::Binary { op, .. } if op.kind == TokenKind::Star));
    }

    #[test]
    fn test_double_negation() {
        let out = simplify("var a = --x;");
        assert_eq!(first_init(&out).variable_name(), Some("x"));
    }

    #[test]
    fn test_no_change_reports_unmodified() {
        let mut pass = AlgebraicSimplifier::new(3);
        let stmts = parse_source("var a = x + y; print a * b;");
        let out = pass.run(&stmts);
        assert!(!pass.modified());
        assert_eq!(out, stmts);
    }
}
