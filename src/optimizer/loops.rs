//! Loop optimization framework
//!
//! Structural scanning of `while` loops with an unrolling protocol:
//! `can_unroll` / `iteration_count` decide, `unroll_loop` performs the
//! expansion. The current policy is deliberately conservative: iteration
//! counts of lowered `for` loops are not yet proven, so `can_unroll`
//! answers false and loops pass through unchanged. The loop-invariance
//! helpers exist for the same reason: they classify, code motion is not
//! performed.

use std::collections::HashSet;

use super::Pass;
use crate::ast::{Expr, Stmt};
use crate::token::{Token, TokenKind};

pub struct LoopOptimizer {
    modified: bool,
    unrolling_enabled: bool,
    unroll_threshold: usize,
}

impl LoopOptimizer {
    pub fn new(unrolling_enabled: bool, unroll_threshold: usize) -> Self {
        Self {
            modified: false,
            unrolling_enabled,
            unroll_threshold,
        }
    }

    fn optimize_stmt(&mut self, stmt: &Stmt) -> Stmt {
        match stmt {
            Stmt::While { body, .. } => {
                let unrolled = self.try_unroll(stmt);

                if let Stmt::While {
                    condition, keyword, ..
                } = &unrolled
                {
                    return Stmt::While {
                        condition: condition.clone(),
                        body: Box::new(self.optimize_stmt(body)),
                        keyword: keyword.clone(),
                    };
                }

                unrolled
            }
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
                condition: condition.clone(),
                then_branch: Box::new(self.optimize_stmt(then_branch)),
                else_branch: else_branch
                    .as_ref()
                    .map(|e| Box::new(self.optimize_stmt(e))),
                keyword: keyword.clone(),
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
            other => other.clone(),
        }
    }

    fn try_unroll(&mut self, stmt: &Stmt) -> Stmt {
        if !self.unrolling_enabled || !self.can_unroll(stmt) {
            return stmt.clone();
        }

        match self.iteration_count(stmt) {
            Some(n) if n > 0 && n <= self.unroll_threshold => {
                self.modified = true;
                self.unroll_loop(stmt, n)
            }
            _ => stmt.clone(),
        }
    }

    /// Whether this loop's trip count can be proven. Currently nothing
    /// qualifies; lowered `for` loops lose their induction structure and
    /// recovering it is future work.
    fn can_unroll(&self, _stmt: &Stmt) -> bool {
        false
    }

    /// Statically known iteration count, when provable.
    fn iteration_count(&self, _stmt: &Stmt) -> Option<usize> {
        None
    }

    /// Replace a counted loop by `iterations` copies of its body.
    fn unroll_loop(&self, stmt: &Stmt, iterations: usize) -> Stmt {
        if let Stmt::While { body, .. } = stmt {
            let statements = (0..iterations).map(|_| body.as_ref().clone()).collect();
            return Stmt::Block {
                statements,
                brace: Token::synthetic(TokenKind::LBrace, "{"),
            };
        }
        stmt.clone()
    }
}

impl Pass for LoopOptimizer {
    fn name(&self) -> &'static str {
        "loop-optimization"
    }

    fn run(&mut self, statements: &[Stmt]) -> Vec<Stmt> {
        self.modified = false;
        statements.iter().map(|s| self.optimize_stmt(s)).collect()
    }

    fn modified(&self) -> bool {
        self.modified
    }
}

/// An expression is invariant for a loop when it reads none of the
/// variables the loop body writes.
pub fn is_loop_invariant(expr: &Expr, loop_vars: &HashSet<String>) -> bool {
    match expr {
        Expr::Variable { name, .. } => !loop_vars.contains(name),
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            is_loop_invariant(left, loop_vars) && is_loop_invariant(right, loop_vars)
        }
        Expr::Unary { right, .. } => is_loop_invariant(right, loop_vars),
        Expr::Grouping { expr } => is_loop_invariant(expr, loop_vars),
        _ => true,
    }
}

/// Names written inside a statement: declarations and assignment targets.
pub fn modified_vars(stmt: &Stmt) -> HashSet<String> {
    let mut vars = HashSet::new();
    collect_modified(stmt, &mut vars);
    vars
}

fn collect_modified(stmt: &Stmt, vars: &mut HashSet<String>) {
    match stmt {
        Stmt::Var { name, .. } => {
            vars.insert(name.clone());
        }
        Stmt::Expression { expr } => collect_assigned(expr, vars),
        Stmt::Block { statements, .. } => {
            for s in statements {
                collect_modified(s, vars);
            }
        }
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => {
            collect_modified(then_branch, vars);
            if let Some(e) = else_branch {
                collect_modified(e, vars);
            }
        }
        Stmt::While { body, .. } => collect_modified(body, vars),
        _ => {}
    }
}

fn collect_assigned(expr: &Expr, vars: &mut HashSet<String>) {
    if let Expr::Assign { name, value, .. } = expr {
        vars.insert(name.clone());
        collect_assigned(value, vars);
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::parse_source;
    use super::*;

    #[test]
    fn test_loops_pass_through_unchanged() {
        let mut pass = LoopOptimizer::new(true, 32);
        let stmts = parse_source("while (i < 10) { i = i + 1; }");
        let out = pass.run(&stmts);
        assert_eq!(out, stmts);
        assert!(!pass.modified());
    }

    #[test]
    fn test_unroll_loop_duplicates_body() {
        let pass = LoopOptimizer::new(true, 32);
        let stmts = parse_source("while (go) { print 1; }");
        let unrolled = pass.unroll_loop(&stmts[0], 3);
        let Stmt::Block { statements, .. } = unrolled else {
            panic!("expected block");
        };
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[0], statements[2]);
    }

    #[test]
    fn test_loop_invariance_classification() {
        let stmts = parse_source("while (c) { i = i + 1; var t = 2; }");
        let Stmt::While { body, .. } = &stmts[0] else {
            panic!("expected while");
        };
        let written = modified_vars(body);
        assert!(written.contains("i"));
        assert!(written.contains("t"));

        let invariant = parse_source("n * 2;");
        let Stmt::Expression { expr } = &invariant[0] else {
            panic!("expected expression");
        };
        assert!(is_loop_invariant(expr, &written));

        let variant = parse_source("i * 2;");
        let Stmt::Expression { expr } = &variant[0] else {
            panic!("expected expression");
        };
        assert!(!is_loop_invariant(expr, &written));
    }
}
