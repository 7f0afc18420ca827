//! End-to-end pipeline tests: lex -> parse -> optimize -> analyze on
//! literal programs.

use boxc::ast::Stmt;
use boxc::memory::{MemoryErrorKind, MemorySafetyAnalyzer};
use boxc::optimizer::{self, OptimizerConfig};
use boxc::{lexer, parser};

fn parse(source: &str) -> Vec<Stmt> {
    let tokens = lexer::lex(source).expect("lex failed");
    parser::parse(tokens, source).expect("parse failed")
}

#[test]
fn arithmetic_program_folds_and_analyzes_clean() {
    let source = "var x = 42; var y = 10; var z = x + y; print z;";
    let statements = parse(source);
    assert_eq!(statements.len(), 4);

    // constant folding only, so every declaration survives
    let mut config = OptimizerConfig::for_level(0);
    config.constant_folding = true;
    let optimized = optimizer::optimize(&statements, config);

    assert_eq!(optimized.len(), 4);
    let Stmt::Var {
        name, initializer, ..
    } = &optimized[2]
    else {
        panic!("expected var z");
    };
    assert_eq!(name, "z");
    assert_eq!(initializer.as_ref().unwrap().literal_number(), Some(52.0));
    assert!(matches!(&optimized[3], Stmt::Print { .. }));

    let result = MemorySafetyAnalyzer::new().analyze(&optimized);
    assert!(result.safe);
    assert!(result.errors.is_empty());
}

#[test]
fn double_free_detected_after_optimization() {
    let source = "var x = malloc(100); free(x); free(x);";
    let optimized = optimizer::optimize(&parse(source), OptimizerConfig::for_level(2));

    let result = MemorySafetyAnalyzer::new().analyze(&optimized);
    assert!(!result.safe);
    assert_eq!(result.errors[0].kind, MemoryErrorKind::DoubleFree);
    assert_eq!(result.errors[0].token.lexeme, "x");
}

#[test]
fn branch_balanced_free_is_safe() {
    let source = "var x = malloc(100); if (flag) { free(x); } else { free(x); }";
    let result = MemorySafetyAnalyzer::new().analyze(&parse(source));
    assert!(result.safe, "report: {}", result.report);
}

#[test]
fn one_sided_free_leaks_at_program_end() {
    // Analyzed unoptimized: the analyzer treats both arms as possible
    // regardless of the literal condition.
    let source = "var x = malloc(100); if (true) { free(x); }";
    let result = MemorySafetyAnalyzer::new().analyze(&parse(source));
    assert!(!result.safe);
    assert_eq!(result.errors[0].kind, MemoryErrorKind::Leak);
    assert!(result.errors[0].message.contains("'x'"));
}

#[test]
fn small_function_inlines_and_folds_to_constant() {
    let source = "fun add(a, b) { return a + b; } var r = add(2, 3); print r;";

    let mut config = OptimizerConfig::for_level(0);
    config.constant_folding = true;
    config.function_inlining = true;
    config.inline_threshold = 10;
    let optimized = optimizer::optimize(&parse(source), config);

    let Stmt::Var {
        name, initializer, ..
    } = &optimized[1]
    else {
        panic!("expected var r");
    };
    assert_eq!(name, "r");
    assert_eq!(initializer.as_ref().unwrap().literal_number(), Some(5.0));
}

#[test]
fn while_false_is_removed_entirely() {
    let source = "while (false) { var x = malloc(1); } print 1;";
    let optimized = optimizer::optimize(&parse(source), OptimizerConfig::for_level(1));
    assert_eq!(optimized.len(), 1);
    assert!(matches!(&optimized[0], Stmt::Print { .. }));
}

#[test]
fn literal_if_selects_branch() {
    let taken = optimizer::optimize(
        &parse("if (true) print 1; else print 2;"),
        OptimizerConfig::for_level(1),
    );
    assert!(matches!(&taken[0], Stmt::Print { expr, .. } if expr.literal_number() == Some(1.0)));

    let skipped = optimizer::optimize(
        &parse("if (false) print 1; else print 2;"),
        OptimizerConfig::for_level(1),
    );
    assert!(matches!(&skipped[0], Stmt::Print { expr, .. } if expr.literal_number() == Some(2.0)));
}

#[test]
fn optimizer_fixed_point_is_idempotent() {
    let sources = [
        "var x = 42; var y = 10; var z = x + y; print z;",
        "fun add(a, b) { return a + b; } print add(2, 3);",
        "var x = malloc(100); if (c) { free(x); } else { free(x); }",
        "for (var i = 0; i < 10; i = i + 1) { print i * 8; }",
    ];

    for source in sources {
        let once = optimizer::optimize(&parse(source), OptimizerConfig::for_level(3));
        let twice = optimizer::optimize(&once, OptimizerConfig::for_level(3));
        assert_eq!(once, twice, "not idempotent: {}", source);
    }
}

#[test]
fn analyzer_is_deterministic_across_runs() {
    let statements = parse(
        "var a = malloc(1); var b = malloc(2); fun f(c) { var t = malloc(3); if (c) { free(t); } else { free(t); } } free(b); free(a);",
    );

    let first = MemorySafetyAnalyzer::new().analyze(&statements);
    let second = MemorySafetyAnalyzer::new().analyze(&statements);
    assert_eq!(first.errors, second.errors);
    assert_eq!(first.warnings, second.warnings);
}

#[test]
fn lexer_error_scenario_bad_hex_escape() {
    let errors = lexer::lex(r#"var s = "\xZZ";"#).expect_err("expected lex error");
    assert_eq!(errors[0].message, "Invalid hexadecimal escape sequence");
    assert!(errors[0]
        .hint
        .as_deref()
        .unwrap()
        .contains("\\xHH requires two hex digits"));
}

#[test]
fn lexer_error_scenario_unclosed_block_comment() {
    let source = "var a = 1;\nvar b = 2;\n/* comment\nvar c = 3;\n";
    let errors = lexer::lex(source).expect_err("expected lex error");
    assert_eq!((errors[0].line, errors[0].column), (3, 1));
    assert!(errors[0].message.contains("missing 1 closing '*/'"));
}

#[test]
fn deeply_nested_blocks_at_the_limit() {
    let ok = format!("{}var x = 1;{}", "{".repeat(100), "}".repeat(100));
    parse(&ok);

    let over = format!("{}var x = 1;{}", "{".repeat(101), "}".repeat(101));
    let tokens = lexer::lex(&over).unwrap();
    let errors = parser::parse(tokens, &over).expect_err("expected parse error");
    assert!(errors[0].message.contains("nesting depth exceeds maximum"));
}

#[test]
fn optimized_program_keeps_analyzer_verdict() {
    // optimization must not change what the analyzer concludes
    let source = "var x = malloc(8); var unused = 1 + 2; free(x);";
    let raw_verdict = MemorySafetyAnalyzer::new().analyze(&parse(source)).safe;
    let optimized = optimizer::optimize(&parse(source), OptimizerConfig::for_level(3));
    let optimized_verdict = MemorySafetyAnalyzer::new().analyze(&optimized).safe;
    assert_eq!(raw_verdict, optimized_verdict);
    assert!(raw_verdict);
}

#[test]
fn unsafe_block_programs_pass_with_warnings() {
    let source = "unsafe { var x = malloc(4); free(x); free(x); llvm_inline(\"ret void\"); }";
    let result = MemorySafetyAnalyzer::new().analyze(&parse(source));
    assert!(result.safe);
    assert!(!result.warnings.is_empty());
}
