//! Shared diagnostic rendering
//!
//! Every phase reports errors in the same box: a banner naming the phase
//! and position, the message, the offending source line with a caret, and
//! an optional remediation hint. Bundles of errors get a trailing summary
//! banner so a single run can surface every problem at once.

use std::fmt::Write;

const RULE_WIDTH: usize = 70;

/// Render one diagnostic box.
///
/// `label` is the banner heading, e.g. `LEXER ERROR` or `DOUBLE-FREE`.
/// `source_line` is the raw text of the offending line; when present, a
/// caret is drawn under `column`.
pub fn render(
    label: &str,
    line: u32,
    column: u32,
    message: &str,
    hint: Option<&str>,
    source_line: Option<&str>,
) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    let _ = write!(out, "\n{}\n", rule);
    let _ = write!(out, "{} at Line {}, Column {}\n", label, line, column);
    let _ = write!(out, "{}\n", rule);
    let _ = write!(out, "Error: {}\n", message);

    if let Some(text) = source_line {
        let _ = write!(out, "\n{:>4} | {}\n", line, text);
        let _ = write!(out, "     | {}^\n", " ".repeat(column.saturating_sub(1) as usize));
    }

    if let Some(hint) = hint {
        let _ = write!(out, "\nHint: {}\n", hint);
    }

    let _ = write!(out, "{}\n", rule);
    out
}

/// Render the `COMPILATION FAILED` banner that precedes a bundle of
/// diagnostics from one phase.
pub fn render_summary(count: usize, what: &str) -> String {
    let rule = "#".repeat(RULE_WIDTH);
    format!(
        "\n{}\nCOMPILATION FAILED: Found {} {} error(s)\n{}\n",
        rule, count, what, rule
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_caret_and_hint() {
        let out = render(
            "PARSER ERROR",
            2,
            5,
            "Expect ';' after expression",
            Some("Add ';' at the end of the statement."),
            Some("print x"),
        );
        assert!(out.contains("PARSER ERROR at Line 2, Column 5"));
        assert!(out.contains("Error: Expect ';' after expression"));
        assert!(out.contains("   2 | print x"));
        // caret sits under column 5
        assert!(out.contains("     |     ^"));
        assert!(out.contains("Hint: Add ';'"));
    }

    #[test]
    fn test_render_without_source() {
        let out = render("MEMORY LEAK", 1, 5, "Variable 'x' is never freed", None, None);
        assert!(out.contains("MEMORY LEAK at Line 1, Column 5"));
        assert!(!out.contains(" | "));
        assert!(!out.contains("Hint:"));
    }

    #[test]
    fn test_summary_banner() {
        let out = render_summary(3, "parsing");
        assert!(out.contains("COMPILATION FAILED: Found 3 parsing error(s)"));
    }
}
