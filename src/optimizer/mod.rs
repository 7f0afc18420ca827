//! AST-to-AST optimizer for the Box language
//!
//! The optimizer is a pipeline of independent passes, each mapping a
//! statement list to a new statement list and reporting whether it changed
//! anything. The pipeline is iterated to a fixed point (capped at ten
//! sweeps). Passes never mutate their input and never raise: anything a
//! pass cannot improve is passed through untouched, and a rewrite is only
//! performed when it cannot introduce a runtime error that the original
//! program did not have.

pub mod algebraic;
pub mod const_fold;
pub mod cse;
pub mod dce;
pub mod inline;
pub mod loops;
pub mod peephole;
pub mod strength;

pub use algebraic::AlgebraicSimplifier;
pub use const_fold::ConstantFolder;
pub use cse::CommonSubexpressionEliminator;
pub use dce::DeadCodeEliminator;
pub use inline::FunctionInliner;
pub use loops::LoopOptimizer;
pub use peephole::PeepholeOptimizer;
pub use strength::StrengthReducer;

use crate::ast::{Expr, Stmt};
use crate::token::{Literal, Token, TokenKind};

/// Upper bound on pipeline sweeps before giving up on a fixed point
pub const MAX_ITERATIONS: usize = 10;

/// Which rewrites are enabled, and how aggressive they may be.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub constant_folding: bool,
    pub algebraic_simplification: bool,
    pub dead_code_elimination: bool,
    pub common_subexpression_elimination: bool,
    pub loop_invariant_code_motion: bool,
    pub loop_unrolling: bool,
    pub unroll_threshold: usize,
    pub strength_reduction: bool,
    pub function_inlining: bool,
    pub inline_threshold: usize,
    pub peephole_optimization: bool,
    pub opt_level: u8,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            constant_folding: true,
            algebraic_simplification: true,
            dead_code_elimination: true,
            common_subexpression_elimination: true,
            loop_invariant_code_motion: true,
            loop_unrolling: true,
            unroll_threshold: 32,
            strength_reduction: true,
            function_inlining: true,
            inline_threshold: 10,
            peephole_optimization: true,
            opt_level: 3,
        }
    }
}

impl OptimizerConfig {
    /// Preset for a -O style level: 0 disables everything, higher levels
    /// enable progressively more aggressive passes.
    pub fn for_level(level: u8) -> Self {
        let mut config = Self {
            constant_folding: false,
            algebraic_simplification: false,
            dead_code_elimination: false,
            common_subexpression_elimination: false,
            loop_invariant_code_motion: false,
            loop_unrolling: false,
            unroll_threshold: 32,
            strength_reduction: false,
            function_inlining: false,
            inline_threshold: 10,
            peephole_optimization: false,
            opt_level: level,
        };

        if level >= 1 {
            config.constant_folding = true;
            config.algebraic_simplification = true;
            config.dead_code_elimination = true;
            config.peephole_optimization = true;
        }
        if level >= 2 {
            config.common_subexpression_elimination = true;
            config.loop_invariant_code_motion = true;
            config.loop_unrolling = true;
            config.strength_reduction = true;
        }
        if level >= 3 {
            config.function_inlining = true;
        }

        config
    }
}

/// One rewrite pass over a statement list.
pub trait Pass {
    fn name(&self) -> &'static str;

    /// Produce a new statement list. Must report `modified` iff the output
    /// differs structurally from the input.
    fn run(&mut self, statements: &[Stmt]) -> Vec<Stmt>;

    fn modified(&self) -> bool;
}

/// The pass pipeline, iterated to a fixed point.
pub struct Optimizer {
    config: OptimizerConfig,
    passes: Vec<Box<dyn Pass>>,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        let mut passes: Vec<Box<dyn Pass>> = Vec::new();

        if config.constant_folding {
            passes.push(Box::new(ConstantFolder::new()));
        }
        if config.algebraic_simplification {
            passes.push(Box::new(AlgebraicSimplifier::new(config.opt_level)));
        }
        if config.dead_code_elimination {
            passes.push(Box::new(DeadCodeEliminator::new()));
        }
        if config.common_subexpression_elimination {
            passes.push(Box::new(CommonSubexpressionEliminator::new()));
        }
        if config.loop_unrolling || config.loop_invariant_code_motion {
            passes.push(Box::new(LoopOptimizer::new(
                config.loop_unrolling,
                config.unroll_threshold,
            )));
        }
        if config.strength_reduction {
            passes.push(Box::new(StrengthReducer::new(config.opt_level)));
        }
        if config.function_inlining {
            passes.push(Box::new(FunctionInliner::new(config.inline_threshold)));
        }
        if config.peephole_optimization {
            passes.push(Box::new(PeepholeOptimizer::new()));
        }

        Self { config, passes }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Run every enabled pass repeatedly until a full sweep changes
    /// nothing, or the iteration cap is reached.
    pub fn optimize(&mut self, statements: &[Stmt]) -> Vec<Stmt> {
        let mut current = statements.to_vec();

        for _ in 0..MAX_ITERATIONS {
            let mut any_modified = false;

            for pass in &mut self.passes {
                current = pass.run(&current);
                if pass.modified() {
                    any_modified = true;
                }
            }

            if !any_modified {
                break;
            }
        }

        current
    }
}

/// Convenience entry point with a given configuration.
pub fn optimize(statements: &[Stmt], config: OptimizerConfig) -> Vec<Stmt> {
    Optimizer::new(config).optimize(statements)
}

// ============ Helpers shared by the passes ============

/// Whether evaluating this expression can be observed: calls, assignments
/// and indexed writes count, transitively.
pub(crate) fn has_side_effects(expr: &Expr) -> bool {
    match expr {
        Expr::Call { .. } | Expr::Assign { .. } | Expr::IndexSet { .. } => true,
        Expr::Literal { .. } | Expr::Variable { .. } => false,
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            has_side_effects(left) || has_side_effects(right)
        }
        Expr::Unary { right, .. } => has_side_effects(right),
        Expr::Grouping { expr } => has_side_effects(expr),
        Expr::Array { elements, .. } => elements.iter().any(has_side_effects),
        Expr::Dict { pairs, .. } => pairs
            .iter()
            .any(|(k, v)| has_side_effects(k) || has_side_effects(v)),
        Expr::IndexGet { target, index, .. } => {
            has_side_effects(target) || has_side_effects(index)
        }
    }
}

/// Build a number literal carrying the given token for position tracking.
pub(crate) fn number_expr(value: f64, token: Token) -> Expr {
    Expr::Literal {
        value: Literal::Number(value),
        token,
    }
}

/// Build a number literal with no source position (pass-synthesized).
pub(crate) fn synthetic_number(value: f64) -> Expr {
    number_expr(
        value,
        Token::synthetic(TokenKind::Number, format!("{}", value)),
    )
}

/// Build a boolean literal carrying the given token.
pub(crate) fn bool_expr(value: bool, token: Token) -> Expr {
    Expr::Literal {
        value: Literal::Bool(value),
        token,
    }
}

/// A positive integral power of two (2, 4, 8, ...)?
pub(crate) fn is_power_of_two(n: f64) -> bool {
    if n < 2.0 || n != n.trunc() || n > (1u64 << 52) as f64 {
        return false;
    }
    let v = n as u64;
    v & (v - 1) == 0
}

pub(crate) fn log2_int(mut n: u64) -> usize {
    let mut result = 0;
    while n > 1 {
        n >>= 1;
        result += 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use crate::parser;

    pub(super) fn parse_source(source: &str) -> Vec<Stmt> {
        let tokens = lexer::lex(source).expect("lex failed");
        parser::parse(tokens, source).expect("parse failed")
    }

    fn optimize_source(source: &str, level: u8) -> Vec<Stmt> {
        optimize(&parse_source(source), OptimizerConfig::for_level(level))
    }

    #[test]
    fn test_level_zero_disables_everything() {
        let config = OptimizerConfig::for_level(0);
        assert!(!config.constant_folding);
        assert!(!config.function_inlining);
        let stmts = parse_source("var x = 1 + 2;");
        let out = optimize(&stmts, config);
        assert_eq!(out, stmts);
    }

    #[test]
    fn test_level_presets_grow() {
        let l1 = OptimizerConfig::for_level(1);
        assert!(l1.constant_folding && !l1.strength_reduction && !l1.function_inlining);
        let l2 = OptimizerConfig::for_level(2);
        assert!(l2.strength_reduction && !l2.function_inlining);
        let l3 = OptimizerConfig::for_level(3);
        assert!(l3.function_inlining);
    }

    #[test]
    fn test_constant_initializer_folds() {
        // folding only, so the propagation sources stay observable
        let mut config = OptimizerConfig::for_level(0);
        config.constant_folding = true;
        let out = optimize(
            &parse_source("var x = 42; var y = 10; var z = x + y; print z;"),
            config,
        );
        assert_eq!(out.len(), 4);
        let Stmt::Var { initializer, .. } = &out[2] else {
            panic!("expected var z");
        };
        assert_eq!(initializer.as_ref().unwrap().literal_number(), Some(52.0));
    }

    #[test]
    fn test_full_pipeline_propagates_and_prunes() {
        // at full strength the folded constants flow into their uses and
        // the now-dead declarations disappear
        let out = optimize_source("var x = 42; var y = 10; var z = x + y; print z;", 3);
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], Stmt::Print { expr, .. } if expr.literal_number() == Some(52.0)));
    }

    #[test]
    fn test_while_false_is_deleted() {
        let out = optimize_source("print 1; while (false) { print 2; }", 1);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_if_with_literal_condition_collapses() {
        let out = optimize_source("if (true) print 1; else print 2;", 1);
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], Stmt::Print { expr, .. } if expr.literal_number() == Some(1.0)));

        let out = optimize_source("if (false) print 1; else print 2;", 1);
        assert!(matches!(&out[0], Stmt::Print { expr, .. } if expr.literal_number() == Some(2.0)));
    }

    #[test]
    fn test_division_by_zero_never_folds() {
        let out = optimize_source("print 1 / 0;", 3);
        let Stmt::Print { expr, .. } = &out[0] else {
            panic!("expected print");
        };
        assert!(matches!(expr, Expr::Binary { .. }));
    }

    #[test]
    fn test_inlining_then_folding() {
        let mut config = OptimizerConfig::for_level(0);
        config.constant_folding = true;
        config.function_inlining = true;
        let out = optimize(
            &parse_source("fun add(a, b) { return a + b; } var r = add(2, 3); print r;"),
            config,
        );
        let Stmt::Var { initializer, .. } = &out[1] else {
            panic!("expected var r");
        };
        assert_eq!(initializer.as_ref().unwrap().literal_number(), Some(5.0));
    }

    #[test]
    fn test_optimize_is_idempotent() {
        let sources = [
            "var x = 1 + 2 * 3; print x;",
            "if (1 < 2) { print 1; } else { print 2; }",
            "fun f(a) { return a * 2; } print f(21);",
            "var xs = [1, 2 + 3]; xs[0] = 4; print xs[0];",
            "while (1 > 2) { print 0; } for (var i = 0; i < 3; i = i + 1) { print i; }",
        ];
        for source in sources {
            let once = optimize_source(source, 3);
            let twice = optimize(&once, OptimizerConfig::for_level(3));
            assert_eq!(once, twice, "not idempotent for: {}", source);
        }
    }

    #[test]
    fn test_power_of_two_helpers() {
        assert!(is_power_of_two(2.0));
        assert!(is_power_of_two(1024.0));
        assert!(!is_power_of_two(1.0));
        assert!(!is_power_of_two(0.0));
        assert!(!is_power_of_two(-4.0));
        assert!(!is_power_of_two(6.0));
        assert!(!is_power_of_two(2.5));
        assert_eq!(log2_int(8), 3);
        assert_eq!(log2_int(1), 0);
    }
}
