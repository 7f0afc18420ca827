//! Constant folding and propagation
//!
//! Evaluates literal arithmetic, comparisons and logic at compile time,
//! collapses `if`/`while` with literal conditions, and substitutes
//! variables that are provably constant (declared once with a literal
//! initializer and never reassigned anywhere). Division and modulo by a
//! literal zero are never folded so the runtime behavior of a buggy
//! program is preserved.

use std::collections::{HashMap, HashSet};

use super::{bool_expr, number_expr, Pass};
use crate::ast::{CaseClause, Expr, Stmt};
use crate::token::{Literal, TokenKind};

pub struct ConstantFolder {
    modified: bool,
    constants: HashMap<String, Literal>,
}

impl ConstantFolder {
    pub fn new() -> Self {
        Self {
            modified: false,
            constants: HashMap::new(),
        }
    }

    fn fold_stmt(&mut self, stmt: &Stmt) -> Option<Stmt> {
        match stmt {
            Stmt::Expression { expr } => Some(Stmt::Expression {
                expr: self.fold_expr(expr),
            }),
            Stmt::Print { expr, keyword } => Some(Stmt::Print {
                expr: self.fold_expr(expr),
                keyword: keyword.clone(),
            }),
            Stmt::Var {
                name,
                token,
                initializer,
            } => Some(Stmt::Var {
                name: name.clone(),
                token: token.clone(),
                initializer: initializer.as_ref().map(|e| self.fold_expr(e)),
            }),
            Stmt::Block { statements, brace } => Some(Stmt::Block {
                statements: self.fold_all(statements),
                brace: brace.clone(),
            }),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                keyword,
            } => {
                let condition = self.fold_expr(condition);

                if let Some(truthy) = condition.literal_truthiness() {
                    self.modified = true;
                    return if truthy {
                        self.fold_stmt(then_branch)
                    } else {
                        else_branch.as_ref().and_then(|e| self.fold_stmt(e))
                    };
                }

                let then_branch = self.fold_stmt(then_branch).unwrap_or_else(|| Stmt::Block {
                    statements: Vec::new(),
                    brace: keyword.clone(),
                });

                Some(Stmt::If {
                    condition,
                    then_branch: Box::new(then_branch),
                    else_branch: match else_branch {
                        Some(e) => self.fold_stmt(e).map(Box::new),
                        None => None,
                    },
                    keyword: keyword.clone(),
                })
            }
            Stmt::While {
                condition,
                body,
                keyword,
            } => {
                let condition = self.fold_expr(condition);

                if condition.literal_truthiness() == Some(false) {
                    self.modified = true;
                    return None;
                }

                let body = self.fold_stmt(body).unwrap_or_else(|| Stmt::Block {
                    statements: Vec::new(),
                    brace: keyword.clone(),
                });

                Some(Stmt::While {
                    condition,
                    body: Box::new(body),
                    keyword: keyword.clone(),
                })
            }
            Stmt::Switch {
                keyword,
                condition,
                cases,
                default,
            } => Some(Stmt::Switch {
                keyword: keyword.clone(),
                condition: self.fold_expr(condition),
                cases: cases
                    .iter()
                    .map(|c| CaseClause {
                        value: self.fold_expr(&c.value),
                        statements: self.fold_all(&c.statements),
                    })
                    .collect(),
                default: default.as_ref().map(|stmts| self.fold_all(stmts)),
            }),
            Stmt::Function {
                name,
                token,
                params,
                body,
            } => Some(Stmt::Function {
                name: name.clone(),
                token: token.clone(),
                params: params.clone(),
                body: self.fold_all(body),
            }),
            Stmt::Return { keyword, value } => Some(Stmt::Return {
                keyword: keyword.clone(),
                value: value.as_ref().map(|e| self.fold_expr(e)),
            }),
            other => Some(other.clone()),
        }
    }

    fn fold_all(&mut self, statements: &[Stmt]) -> Vec<Stmt> {
        statements
            .iter()
            .filter_map(|s| self.fold_stmt(s))
            .collect()
    }

    fn fold_expr(&mut self, expr: &Expr) -> Expr {
        match expr {
            Expr::Literal { .. } => expr.clone(),
            Expr::Variable { name, token } => {
                if let Some(value) = self.constants.get(name) {
                    self.modified = true;
                    return Expr::Literal {
                        value: value.clone(),
                        token: token.clone(),
                    };
                }
                expr.clone()
            }
            Expr::Grouping { expr } => {
                self.modified = true;
                self.fold_expr(expr)
            }
            Expr::Unary { op, right } => {
                let right = self.fold_expr(right);

                match op.kind {
                    TokenKind::Minus => {
                        if let Some(n) = right.literal_number() {
                            self.modified = true;
                            return number_expr(-n, op.clone());
                        }
                    }
                    TokenKind::Bang => {
                        if let Some(b) = right.literal_bool() {
                            self.modified = true;
                            return bool_expr(!b, op.clone());
                        }
                        if let Some(n) = right.literal_number() {
                            self.modified = true;
                            return bool_expr(n == 0.0, op.clone());
                        }
                    }
                    _ => {}
                }

                Expr::Unary {
                    op: op.clone(),
                    right: Box::new(right),
                }
            }
            Expr::Binary { left, op, right } => {
                let left = self.fold_expr(left);
                let right = self.fold_expr(right);

                if let (Some(l), Some(r)) = (left.literal_number(), right.literal_number()) {
                    let folded = match op.kind {
                        TokenKind::Plus => Some(number_expr(l + r, op.clone())),
                        TokenKind::Minus => Some(number_expr(l - r, op.clone())),
                        TokenKind::Star => Some(number_expr(l * r, op.clone())),
                        TokenKind::Slash if r != 0.0 => Some(number_expr(l / r, op.clone())),
                        TokenKind::Percent if r != 0.0 => Some(number_expr(l % r, op.clone())),
                        TokenKind::Less => Some(bool_expr(l < r, op.clone())),
                        TokenKind::LessEqual => Some(bool_expr(l <= r, op.clone())),
                        TokenKind::Greater => Some(bool_expr(l > r, op.clone())),
                        TokenKind::GreaterEqual => Some(bool_expr(l >= r, op.clone())),
                        TokenKind::EqualEqual => Some(bool_expr(l == r, op.clone())),
                        TokenKind::BangEqual => Some(bool_expr(l != r, op.clone())),
                        _ => None,
                    };
                    if let Some(folded) = folded {
                        self.modified = true;
                        return folded;
                    }
                }

                if let (Some(l), Some(r)) = (left.literal_bool(), right.literal_bool()) {
                    let folded = match op.kind {
                        TokenKind::EqualEqual => Some(bool_expr(l == r, op.clone())),
                        TokenKind::BangEqual => Some(bool_expr(l != r, op.clone())),
                        _ => None,
                    };
                    if let Some(folded) = folded {
                        self.modified = true;
                        return folded;
                    }
                }

                Expr::Binary {
                    left: Box::new(left),
                    op: op.clone(),
                    right: Box::new(right),
                }
            }
            Expr::Logical { left, op, right } => {
                let left = self.fold_expr(left);
                let right = self.fold_expr(right);

                if let Some(truthy) = left.literal_truthiness() {
                    self.modified = true;
                    return match (op.kind, truthy) {
                        (TokenKind::And, false) => bool_expr(false, op.clone()),
                        (TokenKind::And, true) => right,
                        (TokenKind::Or, true) => bool_expr(true, op.clone()),
                        _ => right,
                    };
                }

                Expr::Logical {
                    left: Box::new(left),
                    op: op.clone(),
                    right: Box::new(right),
                }
            }
            Expr::Array { elements, bracket } => Expr::Array {
                elements: elements.iter().map(|e| self.fold_expr(e)).collect(),
                bracket: bracket.clone(),
            },
            Expr::Dict { pairs, brace } => Expr::Dict {
                pairs: pairs
                    .iter()
                    .map(|(k, v)| (self.fold_expr(k), self.fold_expr(v)))
                    .collect(),
                brace: brace.clone(),
            },
            Expr::IndexGet {
                target,
                index,
                bracket,
            } => Expr::IndexGet {
                target: Box::new(self.fold_expr(target)),
                index: Box::new(self.fold_expr(index)),
                bracket: bracket.clone(),
            },
            Expr::IndexSet {
                target,
                index,
                value,
                bracket,
            } => Expr::IndexSet {
                target: Box::new(self.fold_expr(target)),
                index: Box::new(self.fold_expr(index)),
                value: Box::new(self.fold_expr(value)),
                bracket: bracket.clone(),
            },
            Expr::Assign { name, token, value } => Expr::Assign {
                name: name.clone(),
                token: token.clone(),
                value: Box::new(self.fold_expr(value)),
            },
            Expr::Call { callee, paren, args } => Expr::Call {
                callee: callee.clone(),
                paren: paren.clone(),
                args: args.iter().map(|a| self.fold_expr(a)).collect(),
            },
        }
    }
}

impl Pass for ConstantFolder {
    fn name(&self) -> &'static str {
        "constant-folding"
    }

    fn run(&mut self, statements: &[Stmt]) -> Vec<Stmt> {
        self.modified = false;
        self.constants = collect_constants(statements);
        self.fold_all(statements)
    }

    fn modified(&self) -> bool {
        self.modified
    }
}

/// Find names that are safe to substitute by their literal value: declared
/// exactly once in the whole program, with a literal initializer, never
/// the target of an assignment, and never shadowed by a parameter. Inline
/// IR is opaque, so its presence disables propagation entirely.
fn collect_constants(statements: &[Stmt]) -> HashMap<String, Literal> {
    let mut facts = ConstantFacts::default();
    for stmt in statements {
        facts.scan_stmt(stmt);
    }

    if facts.has_inline_ir {
        return HashMap::new();
    }

    facts
        .literal_inits
        .into_iter()
        .filter(|(name, _)| {
            facts.decl_counts.get(name) == Some(&1)
                && !facts.assigned.contains(name)
                && !facts.params.contains(name)
        })
        .collect()
}

#[derive(Default)]
struct ConstantFacts {
    decl_counts: HashMap<String, usize>,
    literal_inits: HashMap<String, Literal>,
    assigned: HashSet<String>,
    params: HashSet<String>,
    has_inline_ir: bool,
}

impl ConstantFacts {
    fn scan_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var {
                name, initializer, ..
            } => {
                *self.decl_counts.entry(name.clone()).or_insert(0) += 1;
                if let Some(Expr::Literal { value, .. }) = initializer {
                    self.literal_inits.insert(name.clone(), value.clone());
                }
                if let Some(init) = initializer {
                    self.scan_expr(init);
                }
            }
            Stmt::Expression { expr } => self.scan_expr(expr),
            Stmt::Print { expr, .. } => self.scan_expr(expr),
            Stmt::Block { statements, .. } | Stmt::Unsafe { statements, .. } => {
                for s in statements {
                    self.scan_stmt(s);
                }
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.scan_expr(condition);
                self.scan_stmt(then_branch);
                if let Some(e) = else_branch {
                    self.scan_stmt(e);
                }
            }
            Stmt::While { condition, body, .. } => {
                self.scan_expr(condition);
                self.scan_stmt(body);
            }
            Stmt::Switch {
                condition,
                cases,
                default,
                ..
            } => {
                self.scan_expr(condition);
                for case in cases {
                    self.scan_expr(&case.value);
                    for s in &case.statements {
                        self.scan_stmt(s);
                    }
                }
                if let Some(stmts) = default {
                    for s in stmts {
                        self.scan_stmt(s);
                    }
                }
            }
            Stmt::Function { params, body, .. } => {
                for p in params {
                    self.params.insert(p.lexeme.clone());
                }
                for s in body {
                    self.scan_stmt(s);
                }
            }
            Stmt::Return { value, .. } => {
                if let Some(v) = value {
                    self.scan_expr(v);
                }
            }
            Stmt::LlvmInline { .. } => self.has_inline_ir = true,
            Stmt::Break { .. } | Stmt::Import { .. } => {}
        }
    }

    fn scan_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Assign { name, value, .. } => {
                self.assigned.insert(name.clone());
                self.scan_expr(value);
            }
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.scan_expr(left);
                self.scan_expr(right);
            }
            Expr::Unary { right, .. } => self.scan_expr(right),
            Expr::Grouping { expr } => self.scan_expr(expr),
            Expr::Call { callee, args, .. } => {
                self.scan_expr(callee);
                for a in args {
                    self.scan_expr(a);
                }
            }
            Expr::Array { elements, .. } => {
                for e in elements {
                    self.scan_expr(e);
                }
            }
            Expr::Dict { pairs, .. } => {
                for (k, v) in pairs {
                    self.scan_expr(k);
                    self.scan_expr(v);
                }
            }
            Expr::IndexGet { target, index, .. } => {
                self.scan_expr(target);
                self.scan_expr(index);
            }
            Expr::IndexSet {
                target,
                index,
                value,
                ..
            } => {
                self.scan_expr(target);
                self.scan_expr(index);
                self.scan_expr(value);
            }
            Expr::Literal { .. } | Expr::Variable { .. } => {}
        }
    }
}
