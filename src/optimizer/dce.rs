//! Dead code elimination
//!
//! Drops `var` declarations whose name is never read anywhere and whose
//! initializer is side-effect free. Uses are collected from every
//! expression in the program, including inner scopes, so a variable read
//! only deep inside a loop or function body still counts. Unsafe blocks
//! are scanned for uses but never pruned: their contents may feed inline
//! IR the optimizer cannot see through.

use std::collections::HashSet;

use super::{has_side_effects, Pass};
use crate::ast::{CaseClause, Expr, Stmt};

pub struct DeadCodeEliminator {
    modified: bool,
    used: HashSet<String>,
}

impl DeadCodeEliminator {
    pub fn new() -> Self {
        Self {
            modified: false,
            used: HashSet::new(),
        }
    }

    // ---- use collection ----

    fn collect_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var { initializer, .. } => {
                if let Some(init) = initializer {
                    self.collect_expr(init);
                }
            }
            Stmt::Expression { expr } | Stmt::Print { expr, .. } => self.collect_expr(expr),
            Stmt::Block { statements, .. } | Stmt::Unsafe { statements, .. } => {
                for s in statements {
                    self.collect_stmt(s);
                }
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.collect_expr(condition);
                self.collect_stmt(then_branch);
                if let Some(e) = else_branch {
                    self.collect_stmt(e);
                }
            }
            Stmt::While { condition, body, .. } => {
                self.collect_expr(condition);
                self.collect_stmt(body);
            }
            Stmt::Switch {
                condition,
                cases,
                default,
                ..
            } => {
                self.collect_expr(condition);
                for case in cases {
                    self.collect_expr(&case.value);
                    for s in &case.statements {
                        self.collect_stmt(s);
                    }
                }
                if let Some(stmts) = default {
                    for s in stmts {
                        self.collect_stmt(s);
                    }
                }
            }
            Stmt::Function { body, .. } => {
                for s in body {
                    self.collect_stmt(s);
                }
            }
            Stmt::Return { value, .. } => {
                if let Some(v) = value {
                    self.collect_expr(v);
                }
            }
            Stmt::Break { .. } | Stmt::LlvmInline { .. } | Stmt::Import { .. } => {}
        }
    }

    fn collect_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Variable { name, .. } => {
                self.used.insert(name.clone());
            }
            Expr::Assign { name, value, .. } => {
                self.used.insert(name.clone());
                self.collect_expr(value);
            }
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.collect_expr(left);
                self.collect_expr(right);
            }
            Expr::Unary { right, .. } => self.collect_expr(right),
            Expr::Grouping { expr } => self.collect_expr(expr),
            Expr::Call { callee, args, .. } => {
                self.collect_expr(callee);
                for a in args {
                    self.collect_expr(a);
                }
            }
            Expr::Array { elements, .. } => {
                for e in elements {
                    self.collect_expr(e);
                }
            }
            Expr::Dict { pairs, .. } => {
                for (k, v) in pairs {
                    self.collect_expr(k);
                    self.collect_expr(v);
                }
            }
            Expr::IndexGet { target, index, .. } => {
                self.collect_expr(target);
                self.collect_expr(index);
            }
            Expr::IndexSet {
                target,
                index,
                value,
                ..
            } => {
                self.collect_expr(target);
                self.collect_expr(index);
                self.collect_expr(value);
            }
            Expr::Literal { .. } => {}
        }
    }

    // ---- elimination ----

    fn keep(&self, stmt: &Stmt) -> bool {
        match stmt {
            Stmt::Var {
                name, initializer, ..
            } => {
                if let Some(init) = initializer {
                    if has_side_effects(init) {
                        return true;
                    }
                }
                self.used.contains(name)
            }
            _ => true,
        }
    }

    fn eliminate_all(&mut self, statements: &[Stmt]) -> Vec<Stmt> {
        let mut result = Vec::with_capacity(statements.len());
        for stmt in statements {
            if self.keep(stmt) {
                result.push(self.eliminate_stmt(stmt));
            } else {
                self.modified = true;
            }
        }
        result
    }

    fn eliminate_stmt(&mut self, stmt: &Stmt) -> Stmt {
        match stmt {
            Stmt::Block { statements, brace } => Stmt::Block {
                statements: self.eliminate_all(statements),
                brace: brace.clone(),
            },
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                keyword,
            } => Stmt::If {
                condition: condition.clone(),
                then_branch: Box::new(self.eliminate_stmt(then_branch)),
                else_branch: else_branch
                    .as_ref()
                    .map(|e| Box::new(self.eliminate_stmt(e))),
                keyword: keyword.clone(),
            },
            Stmt::While {
                condition,
                body,
                keyword,
            } => Stmt::While {
                condition: condition.clone(),
                body: Box::new(self.eliminate_stmt(body)),
                keyword: keyword.clone(),
            },
            Stmt::Switch {
                keyword,
                condition,
                cases,
                default,
            } => Stmt::Switch {
                keyword: keyword.clone(),
                condition: condition.clone(),
                cases: cases
                    .iter()
                    .map(|c| CaseClause {
                        value: c.value.clone(),
                        statements: self.eliminate_all(&c.statements),
                    })
                    .collect(),
                default: default.as_ref().map(|stmts| self.eliminate_all(stmts)),
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
                body: self.eliminate_all(body),
            },
            other => other.clone(),
        }
    }
}

impl Pass for DeadCodeEliminator {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn run(&mut self, statements: &[Stmt]) -> Vec<Stmt> {
        self.modified = false;
        self.used.clear();

        for stmt in statements {
            self.collect_stmt(stmt);
        }

        self.eliminate_all(statements)
    }

    fn modified(&self) -> bool {
        self.modified
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::parse_source;
    use super::*;

    fn eliminate(source: &str) -> (Vec<Stmt>, bool) {
        let mut pass = DeadCodeEliminator::new();
        let stmts = parse_source(source);
        let out = pass.run(&stmts);
        (out, pass.modified())
    }

    #[test]
    fn test_unused_pure_var_is_dropped() {
        let (out, modified) = eliminate("var dead = 1 + 2; print 3;");
        assert_eq!(out.len(), 1);
        assert!(modified);
    }

    #[test]
    fn test_used_var_is_kept() {
        let (out, modified) = eliminate("var x = 1; print x;");
        assert_eq!(out.len(), 2);
        assert!(!modified);
    }

    #[test]
    fn test_var_with_call_initializer_is_kept() {
        let (out, _) = eliminate("var unused = f();");
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_use_inside_nested_scope_counts() {
        let (out, modified) = eliminate("var x = 1; while (c) { if (d) { print x; } }");
        assert_eq!(out.len(), 2);
        assert!(!modified);
    }

    #[test]
    fn test_elimination_recurses_into_blocks() {
        let (out, modified) = eliminate("{ var dead = 1; print 2; }");
        let Stmt::Block { statements, .. } = &out[0] else {
            panic!("expected block");
        };
        assert_eq!(statements.len(), 1);
        assert!(modified);
    }

    #[test]
    fn test_use_inside_unsafe_block_counts() {
        let (out, modified) = eliminate("var x = 1; unsafe { print x; }");
        assert_eq!(out.len(), 2);
        assert!(!modified);
    }

    #[test]
    fn test_function_bodies_are_pruned() {
        let (out, modified) = eliminate("fun f() { var dead = 1; return 2; }");
        let Stmt::Function { body, .. } = &out[0] else {
            panic!("expected function");
        };
        assert_eq!(body.len(), 1);
        assert!(modified);
    }
}
