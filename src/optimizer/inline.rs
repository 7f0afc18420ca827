//! Function inlining
//!
//! Collects top-level `fun` definitions and substitutes calls to small,
//! simple functions by their parameter-substituted return expression. A
//! call qualifies only when the callee body is a single `return expr;`,
//! its estimated complexity is within the threshold, the arity matches,
//! every argument is side-effect free, and the function does not call
//! itself. Anything else is left for the runtime.

use std::collections::HashMap;

use super::{has_side_effects, Pass};
use crate::ast::{CaseClause, Expr, Stmt};
use crate::token::Token;

pub struct FunctionInliner {
    modified: bool,
    inline_threshold: usize,
    functions: HashMap<String, FunctionDef>,
}

#[derive(Clone)]
struct FunctionDef {
    params: Vec<Token>,
    body: Vec<Stmt>,
}

impl FunctionInliner {
    pub fn new(inline_threshold: usize) -> Self {
        Self {
            modified: false,
            inline_threshold,
            functions: HashMap::new(),
        }
    }

    fn collect_functions(&mut self, statements: &[Stmt]) {
        self.functions.clear();
        for stmt in statements {
            if let Stmt::Function {
                name, params, body, ..
            } = stmt
            {
                self.functions.insert(
                    name.clone(),
                    FunctionDef {
                        params: params.clone(),
                        body: body.clone(),
                    },
                );
            }
        }
    }

    fn inline_stmt(&mut self, stmt: &Stmt) -> Stmt {
        match stmt {
            Stmt::Expression { expr } => Stmt::Expression {
                expr: self.inline_expr(expr),
            },
            Stmt::Print { expr, keyword } => Stmt::Print {
                expr: self.inline_expr(expr),
                keyword: keyword.clone(),
            },
            Stmt::Var {
                name,
                token,
                initializer,
            } => Stmt::Var {
                name: name.clone(),
                token: token.clone(),
                initializer: initializer.as_ref().map(|e| self.inline_expr(e)),
            },
            Stmt::Block { statements, brace } => Stmt::Block {
                statements: statements.iter().map(|s| self.inline_stmt(s)).collect(),
                brace: brace.clone(),
            },
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                keyword,
            } => Stmt::If {
                condition: self.inline_expr(condition),
                then_branch: Box::new(self.inline_stmt(then_branch)),
                else_branch: else_branch.as_ref().map(|e| Box::new(self.inline_stmt(e))),
                keyword: keyword.clone(),
            },
            Stmt::While {
                condition,
                body,
                keyword,
            } => Stmt::While {
                condition: self.inline_expr(condition),
                body: Box::new(self.inline_stmt(body)),
                keyword: keyword.clone(),
            },
            Stmt::Switch {
                keyword,
                condition,
                cases,
                default,
            } => Stmt::Switch {
                keyword: keyword.clone(),
                condition: self.inline_expr(condition),
                cases: cases
                    .iter()
                    .map(|c| CaseClause {
                        value: self.inline_expr(&c.value),
                        statements: c.statements.iter().map(|s| self.inline_stmt(s)).collect(),
                    })
                    .collect(),
                default: default
                    .as_ref()
                    .map(|stmts| stmts.iter().map(|s| self.inline_stmt(s)).collect()),
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
                body: body.iter().map(|s| self.inline_stmt(s)).collect(),
            },
            Stmt::Return { keyword, value } => Stmt::Return {
                keyword: keyword.clone(),
                value: value.as_ref().map(|e| self.inline_expr(e)),
            },
            other => other.clone(),
        }
    }

    fn inline_expr(&mut self, expr: &Expr) -> Expr {
        match expr {
            Expr::Call { callee, paren, args } => {
                let args: Vec<Expr> = args.iter().map(|a| self.inline_expr(a)).collect();

                if let Some(name) = callee.variable_name() {
                    if let Some(substituted) = self.try_inline_call(name, &args) {
                        self.modified = true;
                        return substituted;
                    }
                }

                Expr::Call {
                    callee: callee.clone(),
                    paren: paren.clone(),
                    args,
                }
            }
            Expr::Binary { left, op, right } => Expr::Binary {
                left: Box::new(self.inline_expr(left)),
                op: op.clone(),
                right: Box::new(self.inline_expr(right)),
            },
            Expr::Unary { op, right } => Expr::Unary {
                op: op.clone(),
                right: Box::new(self.inline_expr(right)),
            },
            Expr::Logical { left, op, right } => Expr::Logical {
                left: Box::new(self.inline_expr(left)),
                op: op.clone(),
                right: Box::new(self.inline_expr(right)),
            },
            Expr::Grouping { expr } => Expr::Grouping {
                expr: Box::new(self.inline_expr(expr)),
            },
            Expr::Assign { name, token, value } => Expr::Assign {
                name: name.clone(),
                token: token.clone(),
                value: Box::new(self.inline_expr(value)),
            },
            Expr::Array { elements, bracket } => Expr::Array {
                elements: elements.iter().map(|e| self.inline_expr(e)).collect(),
                bracket: bracket.clone(),
            },
            Expr::Dict { pairs, brace } => Expr::Dict {
                pairs: pairs
                    .iter()
                    .map(|(k, v)| (self.inline_expr(k), self.inline_expr(v)))
                    .collect(),
                brace: brace.clone(),
            },
            Expr::IndexGet {
                target,
                index,
                bracket,
            } => Expr::IndexGet {
                target: Box::new(self.inline_expr(target)),
                index: Box::new(self.inline_expr(index)),
                bracket: bracket.clone(),
            },
            Expr::IndexSet {
                target,
                index,
                value,
                bracket,
            } => Expr::IndexSet {
                target: Box::new(self.inline_expr(target)),
                index: Box::new(self.inline_expr(index)),
                value: Box::new(self.inline_expr(value)),
                bracket: bracket.clone(),
            },
            other => other.clone(),
        }
    }

    fn try_inline_call(&self, name: &str, args: &[Expr]) -> Option<Expr> {
        let def = self.functions.get(name)?;

        // Tail-only bodies: exactly one `return expr;`
        let [Stmt::Return {
            value: Some(result),
            ..
        }] = def.body.as_slice()
        else {
            return None;
        };

        if body_complexity(&def.body) > self.inline_threshold {
            return None;
        }
        if args.len() != def.params.len() {
            return None;
        }
        if args.iter().any(has_side_effects) {
            return None;
        }
        // Self-recursive bodies would re-expand forever
        if calls_function(result, name) {
            return None;
        }

        Some(substitute_params(result, &def.params, args))
    }
}

impl Pass for FunctionInliner {
    fn name(&self) -> &'static str {
        "function-inlining"
    }

    fn run(&mut self, statements: &[Stmt]) -> Vec<Stmt> {
        self.modified = false;
        self.collect_functions(statements);
        statements.iter().map(|s| self.inline_stmt(s)).collect()
    }

    fn modified(&self) -> bool {
        self.modified
    }
}

/// Body size estimate: one unit per statement, blocks transitively.
fn body_complexity(statements: &[Stmt]) -> usize {
    statements
        .iter()
        .map(|s| match s {
            Stmt::Block { statements, .. } => body_complexity(statements),
            _ => 1,
        })
        .sum()
}

fn calls_function(expr: &Expr, name: &str) -> bool {
    match expr {
        Expr::Call { callee, args, .. } => {
            callee.variable_name() == Some(name) || args.iter().any(|a| calls_function(a, name))
        }
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            calls_function(left, name) || calls_function(right, name)
        }
        Expr::Unary { right, .. } => calls_function(right, name),
        Expr::Grouping { expr } => calls_function(expr, name),
        Expr::Assign { value, .. } => calls_function(value, name),
        Expr::Array { elements, .. } => elements.iter().any(|e| calls_function(e, name)),
        Expr::Dict { pairs, .. } => pairs
            .iter()
            .any(|(k, v)| calls_function(k, name) || calls_function(v, name)),
        Expr::IndexGet { target, index, .. } => {
            calls_function(target, name) || calls_function(index, name)
        }
        Expr::IndexSet {
            target,
            index,
            value,
            ..
        } => {
            calls_function(target, name)
                || calls_function(index, name)
                || calls_function(value, name)
        }
        Expr::Literal { .. } | Expr::Variable { .. } => false,
    }
}

/// Replace parameter references with the matching argument expression.
fn substitute_params(expr: &Expr, params: &[Token], args: &[Expr]) -> Expr {
    match expr {
        Expr::Variable { name, .. } => {
            for (param, arg) in params.iter().zip(args) {
                if *name == param.lexeme {
                    return arg.clone();
                }
            }
            expr.clone()
        }
        Expr::Binary { left, op, right } => Expr::Binary {
            left: Box::new(substitute_params(left, params, args)),
            op: op.clone(),
            right: Box::new(substitute_params(right, params, args)),
        },
        Expr::Unary { op, right } => Expr::Unary {
            op: op.clone(),
            right: Box::new(substitute_params(right, params, args)),
        },
        Expr::Logical { left, op, right } => Expr::Logical {
            left: Box::new(substitute_params(left, params, args)),
            op: op.clone(),
            right: Box::new(substitute_params(right, params, args)),
        },
        Expr::Grouping { expr } => Expr::Grouping {
            expr: Box::new(substitute_params(expr, params, args)),
        },
        Expr::Assign { name, token, value } => Expr::Assign {
            name: name.clone(),
            token: token.clone(),
            value: Box::new(substitute_params(value, params, args)),
        },
        Expr::Call {
            callee,
            paren,
            args: call_args,
        } => Expr::Call {
            callee: Box::new(substitute_params(callee, params, args)),
            paren: paren.clone(),
            args: call_args
                .iter()
                .map(|a| substitute_params(a, params, args))
                .collect(),
        },
        Expr::Array { elements, bracket } => Expr::Array {
            elements: elements
                .iter()
                .map(|e| substitute_params(e, params, args))
                .collect(),
            bracket: bracket.clone(),
        },
        Expr::Dict { pairs, brace } => Expr::Dict {
            pairs: pairs
                .iter()
                .map(|(k, v)| {
                    (
                        substitute_params(k, params, args),
                        substitute_params(v, params, args),
                    )
                })
                .collect(),
            brace: brace.clone(),
        },
        Expr::IndexGet {
            target,
            index,
            bracket,
        } => Expr::IndexGet {
            target: Box::new(substitute_params(target, params, args)),
            index: Box::new(substitute_params(index, params, args)),
            bracket: bracket.clone(),
        },
        Expr::IndexSet {
            target,
            index,
            value,
            bracket,
        } => Expr::IndexSet {
            target: Box::new(substitute_params(target, params, args)),
            index: Box::new(substitute_params(index, params, args)),
            value: Box::new(substitute_params(value, params, args)),
            bracket: bracket.clone(),
        },
        Expr::Literal { .. } => expr.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::parse_source;
    use super::*;

    fn inline(source: &str) -> (Vec<Stmt>, bool) {
        let mut pass = FunctionInliner::new(10);
        let stmts = parse_source(source);
        let out = pass.run(&stmts);
        (out, pass.modified())
    }

    #[test]
    fn test_simple_call_is_substituted() {
        let (out, modified) = inline("fun add(a, b) { return a + b; } var r = add(2, 3);");
        assert!(modified);
        let Stmt::Var {
            initializer: Some(Expr::Binary { left, right, .. }),
            ..
        } = &out[1]
        else {
            panic!("expected substituted binary initializer");
        };
        assert_eq!(left.literal_number(), Some(2.0));
        assert_eq!(right.literal_number(), Some(3.0));
    }

    #[test]
    fn test_multi_statement_body_not_inlined() {
        let (out, modified) =
            inline("fun f(a) { var t = a; return t; } var r = f(1);");
        assert!(!modified);
        assert!(matches!(
            &out[1],
            Stmt::Var {
                initializer: Some(Expr::Call { .. }),
                ..
            }
        ));
    }

    #[test]
    fn test_effectful_argument_blocks_inlining() {
        let (_, modified) = inline("fun id(a) { return a; } var r = id(g());");
        assert!(!modified);
    }

    #[test]
    fn test_arity_mismatch_blocks_inlining() {
        let (_, modified) = inline("fun add(a, b) { return a + b; } var r = add(1);");
        assert!(!modified);
    }

    #[test]
    fn test_recursive_function_not_inlined() {
        let (_, modified) = inline("fun f(n) { return f(n - 1); } var r = f(3);");
        assert!(!modified);
    }

    #[test]
    fn test_threshold_blocks_inlining() {
        let mut pass = FunctionInliner::new(0);
        let stmts = parse_source("fun add(a, b) { return a + b; } var r = add(2, 3);");
        pass.run(&stmts);
        assert!(!pass.modified());
    }

    #[test]
    fn test_unknown_function_untouched() {
        let (_, modified) = inline("var r = mystery(1, 2);");
        assert!(!modified);
    }

    #[test]
    fn test_inlined_inside_nested_expression() {
        let (out, modified) = inline("fun twice(a) { return a + a; } print 1 + twice(5);");
        assert!(modified);
        let Stmt::Print { expr, .. } = &out[1] else {
            panic!("expected print");
        };
        assert_eq!(count_calls(expr), 0);
    }

    fn count_calls(expr: &Expr) -> usize {
        match expr {
            Expr::Call { args, .. } => 1 + args.iter().map(count_calls).sum::<usize>(),
            Expr::Binary { left, right, .. } => count_calls(left) + count_calls(right),
            _ => 0,
        }
    }
}
