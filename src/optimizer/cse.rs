//! Common subexpression numbering
//!
//! Pure expression trees (literals, variables, arithmetic, logic,
//! grouping) are given a canonical string form. The first occurrence in
//! the current scope is cached; later occurrences resolve to the cached
//! node. Assigning to a variable invalidates every cached expression that
//! mentions it, and function bodies start from an empty cache. Because the
//! replacement is an equal pure tree, the rewrite can never change
//! behavior.

use std::collections::HashMap;

use super::Pass;
use crate::ast::{CaseClause, Expr, Stmt};

pub struct CommonSubexpressionEliminator {
    modified: bool,
    cache: HashMap<String, Expr>,
}

impl CommonSubexpressionEliminator {
    pub fn new() -> Self {
        Self {
            modified: false,
            cache: HashMap::new(),
        }
    }

    fn process_stmt(&mut self, stmt: &Stmt) -> Stmt {
        match stmt {
            Stmt::Expression { expr } => Stmt::Expression {
                expr: self.process_expr(expr),
            },
            Stmt::Print { expr, keyword } => Stmt::Print {
                expr: self.process_expr(expr),
                keyword: keyword.clone(),
            },
            Stmt::Var {
                name,
                token,
                initializer,
            } => Stmt::Var {
                name: name.clone(),
                token: token.clone(),
                initializer: initializer.as_ref().map(|e| self.process_expr(e)),
            },
            Stmt::Block { statements, brace } => Stmt::Block {
                statements: statements.iter().map(|s| self.process_stmt(s)).collect(),
                brace: brace.clone(),
            },
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                keyword,
            } => Stmt::If {
                condition: self.process_expr(condition),
                then_branch: Box::new(self.process_stmt(then_branch)),
                else_branch: else_branch.as_ref().map(|e| Box::new(self.process_stmt(e))),
                keyword: keyword.clone(),
            },
            Stmt::While {
                condition,
                body,
                keyword,
            } => Stmt::While {
                condition: self.process_expr(condition),
                body: Box::new(self.process_stmt(body)),
                keyword: keyword.clone(),
            },
            Stmt::Switch {
                keyword,
                condition,
                cases,
                default,
            } => Stmt::Switch {
                keyword: keyword.clone(),
                condition: self.process_expr(condition),
                cases: cases
                    .iter()
                    .map(|c| CaseClause {
                        value: self.process_expr(&c.value),
                        statements: c.statements.iter().map(|s| self.process_stmt(s)).collect(),
                    })
                    .collect(),
                default: default
                    .as_ref()
                    .map(|stmts| stmts.iter().map(|s| self.process_stmt(s)).collect()),
            },
            Stmt::Function {
                name,
                token,
                params,
                body,
            } => {
                // Fresh numbering scope for the body
                let saved = std::mem::take(&mut self.cache);
                let body = body.iter().map(|s| self.process_stmt(s)).collect();
                self.cache = saved;

                Stmt::Function {
                    name: name.clone(),
                    token: token.clone(),
                    params: params.clone(),
                    body,
                }
            }
            Stmt::Return { keyword, value } => Stmt::Return {
                keyword: keyword.clone(),
                value: value.as_ref().map(|e| self.process_expr(e)),
            },
            other => other.clone(),
        }
    }

    fn process_expr(&mut self, expr: &Expr) -> Expr {
        match expr {
            Expr::Literal { .. } | Expr::Variable { .. } => expr.clone(),
            Expr::Assign { name, token, value } => {
                let value = self.process_expr(value);
                self.invalidate(name);
                Expr::Assign {
                    name: name.clone(),
                    token: token.clone(),
                    value: Box::new(value),
                }
            }
            Expr::Binary { .. } | Expr::Unary { .. } | Expr::Logical { .. } | Expr::Grouping { .. } => {
                let rebuilt = self.rebuild(expr);

                if let Some(key) = canonical(expr) {
                    if let Some(cached) = self.cache.get(&key) {
                        if *cached != rebuilt {
                            self.modified = true;
                        }
                        return cached.clone();
                    }
                    self.cache.insert(key, rebuilt.clone());
                }

                rebuilt
            }
            _ => self.rebuild(expr),
        }
    }

    fn rebuild(&mut self, expr: &Expr) -> Expr {
        match expr {
            Expr::Binary { left, op, right } => Expr::Binary {
                left: Box::new(self.process_expr(left)),
                op: op.clone(),
                right: Box::new(self.process_expr(right)),
            },
            Expr::Unary { op, right } => Expr::Unary {
                op: op.clone(),
                right: Box::new(self.process_expr(right)),
            },
            Expr::Logical { left, op, right } => Expr::Logical {
                left: Box::new(self.process_expr(left)),
                op: op.clone(),
                right: Box::new(self.process_expr(right)),
            },
            Expr::Grouping { expr } => Expr::Grouping {
                expr: Box::new(self.process_expr(expr)),
            },
            Expr::Call { callee, paren, args } => Expr::Call {
                callee: callee.clone(),
                paren: paren.clone(),
                args: args.iter().map(|a| self.process_expr(a)).collect(),
            },
            Expr::Array { elements, bracket } => Expr::Array {
                elements: elements.iter().map(|e| self.process_expr(e)).collect(),
                bracket: bracket.clone(),
            },
            Expr::Dict { pairs, brace } => Expr::Dict {
                pairs: pairs
                    .iter()
                    .map(|(k, v)| (self.process_expr(k), self.process_expr(v)))
                    .collect(),
                brace: brace.clone(),
            },
            Expr::IndexGet {
                target,
                index,
                bracket,
            } => Expr::IndexGet {
                target: Box::new(self.process_expr(target)),
                index: Box::new(self.process_expr(index)),
                bracket: bracket.clone(),
            },
            Expr::IndexSet {
                target,
                index,
                value,
                bracket,
            } => Expr::IndexSet {
                target: Box::new(self.process_expr(target)),
                index: Box::new(self.process_expr(index)),
                value: Box::new(self.process_expr(value)),
                bracket: bracket.clone(),
            },
            other => other.clone(),
        }
    }

    fn invalidate(&mut self, name: &str) {
        let needle = format!("(var {})", name);
        self.cache.retain(|key, _| !key.contains(&needle));
    }
}

impl Pass for CommonSubexpressionEliminator {
    fn name(&self) -> &'static str {
        "common-subexpression-elimination"
    }

    fn run(&mut self, statements: &[Stmt]) -> Vec<Stmt> {
        self.modified = false;
        self.cache.clear();
        statements.iter().map(|s| self.process_stmt(s)).collect()
    }

    fn modified(&self) -> bool {
        self.modified
    }
}

/// Canonical form of a pure expression tree; `None` when the tree
/// contains anything effectful or unsupported (calls, assignments,
/// indexing, collection literals).
fn canonical(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Literal { value, .. } => Some(format!("(lit {:?})", value)),
        Expr::Variable { name, .. } => Some(format!("(var {})", name)),
        Expr::Binary { left, op, right } => Some(format!(
            "(bin {} {} {})",
            canonical(left)?,
            op.lexeme,
            canonical(right)?
        )),
        Expr::Unary { op, right } => Some(format!("(un {} {})", op.lexeme, canonical(right)?)),
        Expr::Logical { left, op, right } => Some(format!(
            "(log {} {} {})",
            canonical(left)?,
            op.lexeme,
            canonical(right)?
        )),
        Expr::Grouping { expr } => Some(format!("(grp {})", canonical(expr)?)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::parse_source;
    use super::*;

    fn run(source: &str) -> (Vec<Stmt>, bool) {
        let mut pass = CommonSubexpressionEliminator::new();
        let stmts = parse_source(source);
        let out = pass.run(&stmts);
        (out, pass.modified())
    }

    fn print_expr(stmt: &Stmt) -> &Expr {
        match stmt {
            Stmt::Print { expr, .. } => expr,
            _ => panic!("expected print"),
        }
    }

    #[test]
    fn test_repeated_pure_expression_resolves_to_cached_node() {
        let (out, modified) = run("print a + b;\nprint a + b;");
        // The second occurrence is replaced by the first one's node, so
        // both prints now carry the same tree.
        assert_eq!(print_expr(&out[0]), print_expr(&out[1]));
        assert!(modified);
    }

    #[test]
    fn test_converges_after_normalization() {
        let mut pass = CommonSubexpressionEliminator::new();
        let stmts = parse_source("print a + b;\nprint a + b;");
        let once = pass.run(&stmts);
        let twice = pass.run(&once);
        assert!(!pass.modified());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_assignment_invalidates_cache() {
        let (out, modified) = run("print x + 1;\nx = 5;\nprint x + 1;");
        assert!(!modified);
        // With the cache invalidated in between, the second occurrence
        // keeps its own tokens (line 3, not line 1).
        let Expr::Binary { op, .. } = print_expr(&out[2]) else {
            panic!("expected binary");
        };
        assert_eq!(op.line, 3);
    }

    #[test]
    fn test_function_body_has_fresh_scope() {
        let (_, modified) = run("print a + b;\nfun f() { return a + b; }");
        assert!(!modified);
    }

    #[test]
    fn test_impure_expressions_not_cached() {
        let (_, modified) = run("print f() + 1;\nprint f() + 1;");
        assert!(!modified);
    }

    #[test]
    fn test_canonical_distinguishes_shapes() {
        let a = canonical(&parse_expr("a + b"));
        let b = canonical(&parse_expr("a - b"));
        let c = canonical(&parse_expr("b + a"));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, canonical(&parse_expr("a + b")));
        assert_eq!(canonical(&parse_expr("f(1)")), None);
    }

    fn parse_expr(source: &str) -> Expr {
        let stmts = parse_source(&format!("{};", source));
        match stmts.into_iter().next() {
            Some(Stmt::Expression { expr }) => expr,
            _ => panic!("expected expression statement"),
        }
    }
}
