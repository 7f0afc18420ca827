//! Strength reduction
//!
//! Rewrites multiplications and divisions by literal powers of two into
//! forms a backend can turn into shifts: repeated doubling for `x * 2^k`
//! and a chain of halvings for `x / 2^k`. Numerically faithful for
//! float64 operands, but applied only at optimization level 2 and above.
//! The right operand must be a positive literal power of two.

use super::{has_side_effects, is_power_of_two, log2_int, synthetic_number, Pass};
use crate::ast::{CaseClause, Expr, Stmt};
use crate::token::{Token, TokenKind};

pub struct StrengthReducer {
    modified: bool,
    opt_level: u8,
}

impl StrengthReducer {
    pub fn new(opt_level: u8) -> Self {
        Self {
            modified: false,
            opt_level,
        }
    }

    fn reduce_stmt(&mut self, stmt: &Stmt) -> Stmt {
        match stmt {
            Stmt::Expression { expr } => Stmt::Expression {
                expr: self.reduce_expr(expr),
            },
            Stmt::Print { expr, keyword } => Stmt::Print {
                expr: self.reduce_expr(expr),
                keyword: keyword.clone(),
            },
            Stmt::Var {
                name,
                token,
                initializer,
            } => Stmt::Var {
                name: name.clone(),
                token: token.clone(),
                initializer: initializer.as_ref().map(|e| self.reduce_expr(e)),
            },
            Stmt::Block { statements, brace } => Stmt::Block {
                statements: statements.iter().map(|s| self.reduce_stmt(s)).collect(),
                brace: brace.clone(),
            },
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                keyword,
            } => Stmt::If {
                condition: self.reduce_expr(condition),
                then_branch: Box::new(self.reduce_stmt(then_branch)),
                else_branch: else_branch.as_ref().map(|e| Box::new(self.reduce_stmt(e))),
                keyword: keyword.clone(),
            },
            Stmt::While {
                condition,
                body,
                keyword,
            } => Stmt::While {
                condition: self.reduce_expr(condition),
                body: Box::new(self.reduce_stmt(body)),
                keyword: keyword.clone(),
            },
            Stmt::Switch {
                keyword,
                condition,
                cases,
                default,
            } => Stmt::Switch {
                keyword: keyword.clone(),
                condition: self.reduce_expr(condition),
                cases: cases
                    .iter()
                    .map(|c| CaseClause {
                        value: self.reduce_expr(&c.value),
                        statements: c.statements.iter().map(|s| self.reduce_stmt(s)).collect(),
                    })
                    .collect(),
                default: default
                    .as_ref()
                    .map(|stmts| stmts.iter().map(|s| self.reduce_stmt(s)).collect()),
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
                body: body.iter().map(|s| self.reduce_stmt(s)).collect(),
            },
            Stmt::Return { keyword, value } => Stmt::Return {
                keyword: keyword.clone(),
                value: value.as_ref().map(|e| self.reduce_expr(e)),
            },
            other => other.clone(),
        }
    }

    fn reduce_expr(&mut self, expr: &Expr) -> Expr {
        match expr {
            Expr::Binary { left, op, right } => {
                let left = self.reduce_expr(left);
                let right = self.reduce_expr(right);

                if self.opt_level >= 2 {
                    match op.kind {
                        TokenKind::Star => {
                            if let Some(reduced) = self.reduce_multiplication(&left, &right) {
                                return reduced;
                            }
                        }
                        TokenKind::Slash => {
                            if let Some(reduced) = self.reduce_division(&left, &right, op) {
                                return reduced;
                            }
                        }
                        _ => {}
                    }
                }

                Expr::Binary {
                    left: Box::new(left),
                    op: op.clone(),
                    right: Box::new(right),
                }
            }
            Expr::Unary { op, right } => Expr::Unary {
                op: op.clone(),
                right: Box::new(self.reduce_expr(right)),
            },
            Expr::Grouping { expr } => Expr::Grouping {
                expr: Box::new(self.reduce_expr(expr)),
            },
            Expr::Logical { left, op, right } => Expr::Logical {
                left: Box::new(self.reduce_expr(left)),
                op: op.clone(),
                right: Box::new(self.reduce_expr(right)),
            },
            Expr::Assign { name, token, value } => Expr::Assign {
                name: name.clone(),
                token: token.clone(),
                value: Box::new(self.reduce_expr(value)),
            },
            Expr::Call { callee, paren, args } => Expr::Call {
                callee: callee.clone(),
                paren: paren.clone(),
                args: args.iter().map(|a| self.reduce_expr(a)).collect(),
            },
            Expr::Array { elements, bracket } => Expr::Array {
                elements: elements.iter().map(|e| self.reduce_expr(e)).collect(),
                bracket: bracket.clone(),
            },
            Expr::Dict { pairs, brace } => Expr::Dict {
                pairs: pairs
                    .iter()
                    .map(|(k, v)| (self.reduce_expr(k), self.reduce_expr(v)))
                    .collect(),
                brace: brace.clone(),
            },
            Expr::IndexGet {
                target,
                index,
                bracket,
            } => Expr::IndexGet {
                target: Box::new(self.reduce_expr(target)),
                index: Box::new(self.reduce_expr(index)),
                bracket: bracket.clone(),
            },
            Expr::IndexSet {
                target,
                index,
                value,
                bracket,
            } => Expr::IndexSet {
                target: Box::new(self.reduce_expr(target)),
                index: Box::new(self.reduce_expr(index)),
                value: Box::new(self.reduce_expr(value)),
                bracket: bracket.clone(),
            },
            other => other.clone(),
        }
    }

    /// `x * 2^k` with pure non-literal `x` becomes k doubling rounds.
    fn reduce_multiplication(&mut self, left: &Expr, right: &Expr) -> Option<Expr> {
        let factor = right.literal_number()?;
        if !is_power_of_two(factor) || left.literal_number().is_some() || has_side_effects(left) {
            return None;
        }

        self.modified = true;
        let mut result = left.clone();
        for _ in 0..log2_int(factor as u64) {
            result = Expr::Binary {
                left: Box::new(result.clone()),
                op: Token::synthetic(TokenKind::Plus, "+"),
                right: Box::new(result),
            };
        }
        Some(result)
    }

    /// `x / 2^k` becomes a chain of k halvings.
    fn reduce_division(&mut self, left: &Expr, right: &Expr, op: &Token) -> Option<Expr> {
        let divisor = right.literal_number()?;
        if !is_power_of_two(divisor) || left.literal_number().is_some() {
            return None;
        }

        self.modified = true;
        let mut result = left.clone();
        for _ in 0..log2_int(divisor as u64) {
            result = Expr::Binary {
                left: Box::new(result),
                op: op.clone(),
                right: Box::new(synthetic_number(2.0)),
            };
        }
        Some(result)
    }
}

impl Pass for StrengthReducer {
    fn name(&self) -> &'static str {
        "strength-reduction"
    }

    fn run(&mut self, statements: &[Stmt]) -> Vec<Stmt> {
        self.modified = false;
        statements.iter().map(|s| self.reduce_stmt(s)).collect()
    }

    fn modified(&self) -> bool {
        self.modified
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::parse_source;
    use super::*;

    fn reduce(source: &str, level: u8) -> (Vec<Stmt>, bool) {
        let mut pass = StrengthReducer::new(level);
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

    fn count_ops(expr: &Expr, kind: TokenKind) -> usize {
        match expr {
            Expr::Binary { left, op, right } => {
                (op.kind == kind) as usize + count_ops(left, kind) + count_ops(right, kind)
            }
            _ => 0,
        }
    }

    #[test]
    fn test_multiplication_by_four_doubles_twice() {
        let (out, modified) = reduce("x * 4;", 2);
        assert!(modified);
        assert_eq!(count_ops(first_expr(&out), TokenKind::Plus), 3);
    }

    #[test]
    fn test_division_by_eight_becomes_three_halvings() {
        let (out, modified) = reduce("x / 8;", 2);
        assert!(modified);
        assert_eq!(count_ops(first_expr(&out), TokenKind::Slash), 3);
    }

    #[test]
    fn test_gated_below_level_two() {
        let (out, modified) = reduce("x * 4;", 1);
        assert!(!modified);
        assert!(matches!(first_expr(&out), Expr::Binary { op, .. } if op.kind == TokenKind::Star));
    }

    #[test]
    fn test_non_power_of_two_untouched() {
        let (_, modified) = reduce("x * 6;", 2);
        assert!(!modified);
    }

    #[test]
    fn test_multiply_by_one_left_to_algebraic_pass() {
        let (_, modified) = reduce("x * 1; x / 1;", 2);
        assert!(!modified);
    }

    #[test]
    fn test_effectful_operand_not_duplicated() {
        let (out, modified) = reduce("f() * 4;", 2);
        assert!(!modified);
        assert!(matches!(first_expr(&out), Expr::Binary { op, .. } if op.kind == TokenKind::Star));
    }
}
