//! Memory-safety analysis for Box programs
//!
//! Detects leaks, double frees, use-after-free, invalid frees and bad
//! pointer dereferences before code generation. The analysis runs in
//! phases: a scope-, branch- and function-sensitive syntactic walk
//! (this module), then CFG construction ([`cfg`]), worklist dataflow
//! ([`dataflow`]) and bounded path enumeration ([`paths`]). The walk's
//! findings are hard errors; the CFG phases only ever add warnings, and
//! they are skipped entirely once the walk has failed, so a hard error is
//! never downgraded.
//!
//! The analyzer knows the allocation primitives by name only: `malloc`,
//! `calloc` and `realloc` bind a fresh resource to the declared variable,
//! `free` releases it, `addr_of` creates an alias, `deref` reads through
//! one. What those calls compile to is the code generator's business.

pub mod cfg;
pub mod dataflow;
pub mod paths;
mod state;

pub use state::{join_states, AllocationInfo, MemoryState, PointerInfo, PointerState};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::mem;

use crate::ast::{CaseClause, Expr, Stmt};
use crate::diagnostics;
use crate::token::{Literal, Token};
use cfg::Cfg;
use thiserror::Error;

/// Classification of a hard memory-safety error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryErrorKind {
    Leak,
    DoubleFree,
    UseAfterFree,
    InvalidFree,
    NullDeref,
    UninitializedDeref,
    Other,
}

impl fmt::Display for MemoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemoryErrorKind::Leak => "MEMORY LEAK",
            MemoryErrorKind::DoubleFree => "DOUBLE-FREE",
            MemoryErrorKind::UseAfterFree => "USE-AFTER-FREE",
            MemoryErrorKind::InvalidFree => "INVALID FREE",
            MemoryErrorKind::NullDeref => "NULL POINTER DEREFERENCE",
            MemoryErrorKind::UninitializedDeref => "UNINITIALIZED POINTER DEREFERENCE",
            MemoryErrorKind::Other => "MEMORY SAFETY ERROR",
        };
        write!(f, "{}", s)
    }
}

/// A hard memory-safety error, anchored at a token
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct MemoryError {
    pub kind: MemoryErrorKind,
    pub message: String,
    pub token: Token,
    pub hint: Option<String>,
}

impl MemoryError {
    pub fn render(&self) -> String {
        diagnostics::render(
            &self.kind.to_string(),
            self.token.line,
            self.token.column,
            &self.message,
            self.hint.as_deref(),
            None,
        )
    }
}

/// Outcome of one analysis run
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub safe: bool,
    pub errors: Vec<MemoryError>,
    pub warnings: Vec<String>,
    pub report: String,
}

type WalkResult = Result<(), MemoryError>;

/// The scope-, branch- and path-sensitive memory checker
pub struct MemorySafetyAnalyzer {
    allocations: BTreeMap<String, AllocationInfo>,
    pointers: BTreeMap<String, PointerInfo>,
    scope_vars: Vec<BTreeSet<String>>,
    freed_in_scope: Vec<BTreeSet<String>>,
    errors: Vec<MemoryError>,
    warnings: Vec<String>,
    strict_mode: bool,
}

impl Default for MemorySafetyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySafetyAnalyzer {
    pub fn new() -> Self {
        Self::with_strict_mode(true)
    }

    /// In non-strict mode leaks are reported as warnings instead of hard
    /// errors. Misuse of `free` and `deref` stays fatal either way.
    pub fn with_strict_mode(strict_mode: bool) -> Self {
        Self {
            allocations: BTreeMap::new(),
            pointers: BTreeMap::new(),
            scope_vars: vec![BTreeSet::new()],
            freed_in_scope: vec![BTreeSet::new()],
            errors: Vec::new(),
            warnings: Vec::new(),
            strict_mode,
        }
    }

    /// Analyze a program. The syntactic walk stops at the first hard
    /// error; when it survives, the CFG phases add their warnings.
    pub fn analyze(&mut self, statements: &[Stmt]) -> AnalysisResult {
        self.errors.clear();
        self.warnings.clear();
        self.allocations.clear();
        self.pointers.clear();
        self.scope_vars = vec![BTreeSet::new()];
        self.freed_in_scope = vec![BTreeSet::new()];

        match self.walk_program(statements) {
            Ok(()) => {
                if let Some(mut graph) = Cfg::build(statements) {
                    self.warnings.extend(dataflow::run(&mut graph));
                }
            }
            Err(e) => self.errors.push(e),
        }

        AnalysisResult {
            safe: self.errors.is_empty(),
            errors: self.errors.clone(),
            warnings: self.warnings.clone(),
            report: self.render_report(),
        }
    }

    fn walk_program(&mut self, statements: &[Stmt]) -> WalkResult {
        for stmt in statements {
            self.analyze_stmt(stmt)?;
        }
        self.check_program_leaks()
    }

    // ============ Statement walk ============

    fn analyze_stmt(&mut self, stmt: &Stmt) -> WalkResult {
        match stmt {
            Stmt::Var {
                name,
                token,
                initializer,
            } => self.analyze_var(name, token, initializer.as_ref()),
            Stmt::Expression { expr } | Stmt::Print { expr, .. } => self.analyze_expr(expr),
            Stmt::Block { statements, .. } => {
                self.enter_scope();
                for s in statements {
                    self.analyze_stmt(s)?;
                }
                self.exit_scope()
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => self.analyze_if(condition, then_branch, else_branch.as_deref()),
            Stmt::While {
                condition, body, ..
            } => {
                self.analyze_expr(condition)?;
                self.enter_scope();
                self.analyze_stmt(body)?;
                self.exit_scope()
            }
            Stmt::Function { name, body, .. } => self.analyze_function(name, body),
            Stmt::Return { value, .. } => match value {
                Some(v) => self.analyze_expr(v),
                None => Ok(()),
            },
            Stmt::Switch {
                condition,
                cases,
                default,
                ..
            } => self.analyze_switch(condition, cases, default.as_deref()),
            Stmt::Unsafe { statements, .. } => self.analyze_unsafe(statements),
            Stmt::Break { .. } | Stmt::LlvmInline { .. } | Stmt::Import { .. } => Ok(()),
        }
    }

    fn analyze_var(&mut self, name: &str, token: &Token, initializer: Option<&Expr>) -> WalkResult {
        if let Some(scope) = self.scope_vars.last_mut() {
            scope.insert(name.to_string());
        }

        let Some(init) = initializer else {
            // Declared without a value: a later deref must be flagged
            self.allocations.insert(
                name.to_string(),
                AllocationInfo::new(name, token.clone(), MemoryState::Uninitialized, false),
            );
            return Ok(());
        };

        self.analyze_expr(init)?;

        if let Some(func) = dataflow::allocator_call(init) {
            if let Some(existing) = self.allocations.get(name) {
                if existing.state == MemoryState::Allocated {
                    return Err(self.error(
                        MemoryErrorKind::Leak,
                        format!(
                            "Memory leak: '{}' is being reassigned without freeing previous allocation",
                            name
                        ),
                        token,
                        Some(format!(
                            "Free the previous allocation first: free({});",
                            name
                        )),
                    ));
                }
            }

            let mut alloc =
                AllocationInfo::new(name, token.clone(), MemoryState::Allocated, func == "calloc");
            if let Expr::Call { args, .. } = init {
                alloc.size_expr = args.first().cloned();
            }
            self.allocations.insert(name.to_string(), alloc);
        } else if init.callee_name() == Some("addr_of") {
            if let Expr::Call { args, .. } = init {
                if let Some(target) = args.first().and_then(|a| a.variable_name()) {
                    let mut pointer =
                        PointerInfo::new(name, token.clone(), "number", PointerState::Valid);
                    pointer.points_to = Some(target.to_string());
                    self.pointers.insert(name.to_string(), pointer);

                    if let Some(alloc) = self.allocations.get_mut(target) {
                        alloc.ref_count += 1;
                        alloc.aliases.insert(name.to_string());
                    }
                }
            }
        } else if matches!(init, Expr::Literal { value: Literal::Nil, .. }) {
            self.pointers.insert(
                name.to_string(),
                PointerInfo::new(name, token.clone(), "nil", PointerState::Null),
            );
        }

        Ok(())
    }

    /// Both arms are analyzed from the same entry snapshot. A resource
    /// freed in exactly one arm (including the missing-else case) is not
    /// reliably freed, so its state reverts to Allocated after the join;
    /// a resource freed in both arms stays freed.
    fn analyze_if(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> WalkResult {
        self.analyze_expr(condition)?;

        let entry = self.allocations.clone();

        self.analyze_stmt(then_branch)?;
        let then_freed = freed_between(&entry, &self.allocations);

        self.allocations = entry.clone();
        let else_freed = match else_branch {
            Some(branch) => {
                self.analyze_stmt(branch)?;
                freed_between(&entry, &self.allocations)
            }
            None => BTreeSet::new(),
        };

        for var in then_freed.union(&else_freed) {
            if then_freed.contains(var) && else_freed.contains(var) {
                continue;
            }
            if let Some(alloc) = self.allocations.get_mut(var) {
                alloc.state = MemoryState::Allocated;
                alloc.freed_at = None;
            }
            if let Some(freed) = self.freed_in_scope.last_mut() {
                freed.remove(var);
            }
        }

        Ok(())
    }

    fn analyze_switch(
        &mut self,
        condition: &Expr,
        cases: &[CaseClause],
        default: Option<&[Stmt]>,
    ) -> WalkResult {
        self.analyze_expr(condition)?;

        let entry = self.allocations.clone();

        for case in cases {
            self.analyze_expr(&case.value)?;
            self.allocations = entry.clone();
            for s in &case.statements {
                self.analyze_stmt(s)?;
            }
        }

        self.allocations = entry.clone();
        if let Some(statements) = default {
            for s in statements {
                self.analyze_stmt(s)?;
            }
        }

        Ok(())
    }

    /// Function bodies are checked in isolation: fresh allocation and
    /// pointer maps, a leak check at function exit, then a per-function
    /// CFG pass with dataflow and bounded path enumeration. Caller state
    /// is restored afterwards.
    fn analyze_function(&mut self, name: &str, body: &[Stmt]) -> WalkResult {
        let saved_allocations = mem::take(&mut self.allocations);
        let saved_pointers = mem::take(&mut self.pointers);
        self.enter_scope();

        let mut result = Ok(());
        for s in body {
            result = self.analyze_stmt(s);
            if result.is_err() {
                break;
            }
        }
        if result.is_ok() {
            result = self.check_function_leaks(name);
        }

        if result.is_ok() {
            if let Some(mut graph) = Cfg::build_function(body) {
                self.warnings.extend(dataflow::run(&mut graph));
                self.warnings.extend(paths::leak_warnings(&graph));
            }
        }

        self.scope_vars.pop();
        self.freed_in_scope.pop();
        self.allocations = saved_allocations;
        self.pointers = saved_pointers;
        result
    }

    fn analyze_unsafe(&mut self, statements: &[Stmt]) -> WalkResult {
        let saved_strict = self.strict_mode;
        self.strict_mode = false;

        for s in statements {
            if let Err(e) = self.analyze_stmt(s) {
                self.warnings.push(format!("In unsafe block: {}", e.message));
            }
        }

        self.strict_mode = saved_strict;
        Ok(())
    }

    // ============ Expression walk ============

    fn analyze_expr(&mut self, expr: &Expr) -> WalkResult {
        match expr {
            Expr::Call { callee, paren, args } => self.analyze_call(callee, paren, args),
            Expr::Variable { name, token } => self.check_variable_access(name, token),
            Expr::Assign { name, token, value } => self.analyze_assign(name, token, value),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.analyze_expr(left)?;
                self.analyze_expr(right)
            }
            Expr::Unary { right, .. } => self.analyze_expr(right),
            Expr::Grouping { expr } => self.analyze_expr(expr),
            Expr::Array { elements, .. } => {
                for e in elements {
                    self.analyze_expr(e)?;
                }
                Ok(())
            }
            Expr::Dict { pairs, .. } => {
                for (k, v) in pairs {
                    self.analyze_expr(k)?;
                    self.analyze_expr(v)?;
                }
                Ok(())
            }
            Expr::IndexGet { target, index, .. } => {
                self.analyze_expr(target)?;
                self.analyze_expr(index)
            }
            Expr::IndexSet {
                target,
                index,
                value,
                ..
            } => {
                self.analyze_expr(target)?;
                self.analyze_expr(index)?;
                self.analyze_expr(value)
            }
            Expr::Literal { .. } => Ok(()),
        }
    }

    fn analyze_call(&mut self, callee: &Expr, paren: &Token, args: &[Expr]) -> WalkResult {
        let Some(func) = callee.variable_name() else {
            for a in args {
                self.analyze_expr(a)?;
            }
            return Ok(());
        };

        match func {
            "free" => {
                if args.len() != 1 {
                    return Err(self.error(
                        MemoryErrorKind::Other,
                        format!("free() expects exactly 1 argument, got {}", args.len()),
                        paren,
                        Some("Usage: free(pointer);".to_string()),
                    ));
                }

                if let Expr::Variable { name, token } = &args[0] {
                    self.free_variable(name, token)?;
                }
                Ok(())
            }
            "deref" => {
                if args.len() != 1 {
                    return Err(self.error(
                        MemoryErrorKind::Other,
                        format!("deref() expects exactly 1 argument, got {}", args.len()),
                        paren,
                        Some("Usage: deref(pointer);".to_string()),
                    ));
                }

                if let Expr::Variable { name, token } = &args[0] {
                    self.deref_variable(name, token)?;
                }
                Ok(())
            }
            "malloc" | "calloc" | "realloc" | "addr_of" => Ok(()),
            _ => {
                for a in args {
                    self.analyze_expr(a)?;
                }
                Ok(())
            }
        }
    }

    fn free_variable(&mut self, name: &str, token: &Token) -> WalkResult {
        let (state, freed_line) = match self.allocations.get(name) {
            Some(alloc) => (alloc.state, alloc.freed_at.as_ref().map(|t| t.line)),
            None => {
                return Err(self.error(
                    MemoryErrorKind::InvalidFree,
                    format!("Attempting to free non-allocated memory: '{}'", name),
                    token,
                    Some(
                        "Only pointers returned by malloc/calloc/realloc can be freed".to_string(),
                    ),
                ));
            }
        };

        match state {
            MemoryState::Freed => {
                let hint = match freed_line {
                    Some(line) => format!("Previously freed at line {}", line),
                    None => "Previously freed".to_string(),
                };
                Err(self.error(
                    MemoryErrorKind::DoubleFree,
                    format!("Double-free detected: '{}' has already been freed", name),
                    token,
                    Some(hint),
                ))
            }
            MemoryState::Allocated => {
                let mut aliases = BTreeSet::new();
                if let Some(alloc) = self.allocations.get_mut(name) {
                    alloc.state = MemoryState::Freed;
                    alloc.freed_at = Some(token.clone());
                    aliases = alloc.aliases.clone();
                }
                if let Some(freed) = self.freed_in_scope.last_mut() {
                    freed.insert(name.to_string());
                }
                for alias in aliases {
                    if let Some(pointer) = self.pointers.get_mut(&alias) {
                        pointer.state = PointerState::Dangling;
                    }
                }
                Ok(())
            }
            other => Err(self.error(
                MemoryErrorKind::Other,
                format!("Attempting to free memory in invalid state: '{}'", name),
                token,
                Some(format!("Current state: {}", other)),
            )),
        }
    }

    fn deref_variable(&mut self, name: &str, token: &Token) -> WalkResult {
        if let Some(alloc) = self.allocations.get(name) {
            match alloc.state {
                MemoryState::Freed => {
                    let hint = match &alloc.freed_at {
                        Some(site) => format!("Pointer was freed at line {}", site.line),
                        None => "Pointer was freed".to_string(),
                    };
                    return Err(self.error(
                        MemoryErrorKind::UseAfterFree,
                        format!("Use-after-free: Dereferencing freed pointer '{}'", name),
                        token,
                        Some(hint),
                    ));
                }
                MemoryState::Uninitialized => {
                    return Err(self.error(
                        MemoryErrorKind::UninitializedDeref,
                        format!("Dereferencing uninitialized pointer '{}'", name),
                        token,
                        Some("Initialize the pointer before dereferencing".to_string()),
                    ));
                }
                _ => {}
            }
        }

        if let Some(pointer) = self.pointers.get(name) {
            match pointer.state {
                PointerState::Dangling => {
                    return Err(self.error(
                        MemoryErrorKind::UseAfterFree,
                        format!("Use-after-free: Dereferencing dangling pointer '{}'", name),
                        token,
                        Some("The memory this pointer refers to has been freed".to_string()),
                    ));
                }
                PointerState::Null => {
                    return Err(self.error(
                        MemoryErrorKind::NullDeref,
                        format!("Null pointer dereference: '{}' is null", name),
                        token,
                        Some("Check if pointer is null before dereferencing".to_string()),
                    ));
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn analyze_assign(&mut self, name: &str, token: &Token, value: &Expr) -> WalkResult {
        if let Some(alloc) = self.allocations.get(name) {
            if alloc.state == MemoryState::Allocated && dataflow::allocator_call(value).is_some() {
                return Err(self.error(
                    MemoryErrorKind::Leak,
                    format!(
                        "Memory leak: Reassigning '{}' without freeing previous allocation",
                        name
                    ),
                    token,
                    Some(format!(
                        "Free the previous allocation first: free({});",
                        name
                    )),
                ));
            }
        }

        self.analyze_expr(value)?;

        // Overwriting clears stale uninitialized/null tracking
        if self
            .allocations
            .get(name)
            .map(|a| a.state == MemoryState::Uninitialized)
            .unwrap_or(false)
        {
            self.allocations.remove(name);
        }
        if matches!(value, Expr::Literal { value: Literal::Nil, .. }) {
            self.pointers.insert(
                name.to_string(),
                PointerInfo::new(name, token.clone(), "nil", PointerState::Null),
            );
        } else if self
            .pointers
            .get(name)
            .map(|p| p.state == PointerState::Null)
            .unwrap_or(false)
        {
            self.pointers.remove(name);
        }

        Ok(())
    }

    fn check_variable_access(&mut self, name: &str, token: &Token) -> WalkResult {
        if let Some(alloc) = self.allocations.get(name) {
            if alloc.state == MemoryState::Freed {
                let hint = match &alloc.freed_at {
                    Some(site) => format!("Memory was freed at line {}", site.line),
                    None => "Memory was freed".to_string(),
                };
                return Err(self.error(
                    MemoryErrorKind::UseAfterFree,
                    format!("Use-after-free: Accessing freed memory '{}'", name),
                    token,
                    Some(hint),
                ));
            }
        }

        if let Some(pointer) = self.pointers.get(name) {
            if pointer.state == PointerState::Dangling {
                self.warnings.push(format!(
                    "Warning: Accessing dangling pointer '{}' at line {}",
                    name, token.line
                ));
            }
        }

        Ok(())
    }

    // ============ Scopes and leak checks ============

    fn enter_scope(&mut self) {
        self.scope_vars.push(BTreeSet::new());
        self.freed_in_scope.push(BTreeSet::new());
    }

    fn exit_scope(&mut self) -> WalkResult {
        if self.scope_vars.len() <= 1 {
            return Ok(());
        }

        let vars = self.scope_vars.pop().unwrap_or_default();
        let freed = self.freed_in_scope.pop().unwrap_or_default();

        for var in vars {
            let Some(alloc) = self.allocations.get(&var) else {
                continue;
            };
            if alloc.state == MemoryState::Allocated && !freed.contains(&var) {
                if self.strict_mode {
                    let token = alloc.token.clone();
                    return Err(self.error(
                        MemoryErrorKind::Leak,
                        format!(
                            "Memory leak: Variable '{}' goes out of scope without being freed",
                            var
                        ),
                        &token,
                        Some(format!("Add 'free({});' before the end of this scope", var)),
                    ));
                }
                self.warnings.push(format!("Potential memory leak: {}", var));
            }
        }

        Ok(())
    }

    fn check_function_leaks(&mut self, name: &str) -> WalkResult {
        if !self.strict_mode {
            return Ok(());
        }

        for (var, alloc) in &self.allocations {
            if alloc.state == MemoryState::Allocated {
                return Err(MemoryError {
                    kind: MemoryErrorKind::Leak,
                    message: format!(
                        "Memory leak in function '{}': Variable '{}' is not freed before return",
                        name, var
                    ),
                    token: alloc.token.clone(),
                    hint: Some(format!(
                        "Add 'free({});' before all return statements",
                        var
                    )),
                });
            }
        }

        Ok(())
    }

    fn check_program_leaks(&mut self) -> WalkResult {
        let leaked: Vec<(String, Token)> = self
            .allocations
            .iter()
            .filter(|(_, alloc)| alloc.state == MemoryState::Allocated)
            .map(|(var, alloc)| (var.clone(), alloc.token.clone()))
            .collect();

        for (var, token) in leaked {
            if self.strict_mode {
                return Err(self.error(
                    MemoryErrorKind::Leak,
                    format!("Memory leak: Variable '{}' is never freed", var),
                    &token,
                    Some(format!("Add 'free({});' before program exit", var)),
                ));
            }
            self.warnings.push(format!(
                "Warning: Potential memory leak - '{}' may not be freed",
                var
            ));
        }

        Ok(())
    }

    fn error(
        &self,
        kind: MemoryErrorKind,
        message: impl Into<String>,
        token: &Token,
        hint: Option<String>,
    ) -> MemoryError {
        MemoryError {
            kind,
            message: message.into(),
            token: token.clone(),
            hint,
        }
    }

    fn render_report(&self) -> String {
        let mut report = String::new();

        if !self.errors.is_empty() {
            report.push_str("\n=== MEMORY SAFETY ERRORS ===\n");
            for e in &self.errors {
                report.push_str(&e.render());
                report.push('\n');
            }
        }

        if !self.warnings.is_empty() {
            report.push_str("\n=== WARNINGS ===\n");
            for w in &self.warnings {
                report.push_str(w);
                report.push('\n');
            }
        }

        if self.errors.is_empty() && self.warnings.is_empty() {
            report.push_str("\n=== MEMORY SAFETY CHECK PASSED ===\n");
            report.push_str("No memory safety issues detected.\n");
        }

        report
    }
}

/// Names that were `Allocated` before and are `Freed` after.
fn freed_between(
    before: &BTreeMap<String, AllocationInfo>,
    after: &BTreeMap<String, AllocationInfo>,
) -> BTreeSet<String> {
    after
        .iter()
        .filter(|(name, alloc)| {
            alloc.state == MemoryState::Freed
                && before
                    .get(*name)
                    .map(|b| b.state == MemoryState::Allocated)
                    .unwrap_or(false)
        })
        .map(|(name, _)| name.clone())
        .collect()
}

/// Analyze with the default (strict) configuration.
pub fn analyze(statements: &[Stmt]) -> AnalysisResult {
    MemorySafetyAnalyzer::new().analyze(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use crate::parser;

    fn parsed(source: &str) -> Vec<Stmt> {
        let tokens = lexer::lex(source).expect("lex failed");
        parser::parse(tokens, source).expect("parse failed")
    }

    fn run(source: &str) -> AnalysisResult {
        analyze(&parsed(source))
    }

    #[test]
    fn test_clean_alloc_free_in_same_scope() {
        let result = run("var x = malloc(100); free(x);");
        assert!(result.safe);
        assert!(result.errors.is_empty());
        assert!(result.report.contains("MEMORY SAFETY CHECK PASSED"));
    }

    #[test]
    fn test_double_free_is_first_error() {
        let result = run("var x = malloc(100); free(x); free(x);");
        assert!(!result.safe);
        assert_eq!(result.errors[0].kind, MemoryErrorKind::DoubleFree);
        assert_eq!(result.errors[0].token.lexeme, "x");
        assert!(result.errors[0]
            .hint
            .as_deref()
            .unwrap()
            .contains("Previously freed at line 1"));
    }

    #[test]
    fn test_free_in_both_branches_is_safe() {
        let result = run("var x = malloc(100); if (true) { free(x); } else { free(x); }");
        assert!(result.safe, "report: {}", result.report);
    }

    #[test]
    fn test_one_sided_free_reverts_and_leaks() {
        let result = run("var x = malloc(100); if (true) { free(x); }");
        assert!(!result.safe);
        assert_eq!(result.errors[0].kind, MemoryErrorKind::Leak);
        assert!(result.errors[0].message.contains("'x' is never freed"));
    }

    #[test]
    fn test_else_only_free_also_reverts() {
        let result = run("var x = malloc(100); if (c) { print 1; } else { free(x); }");
        assert!(!result.safe);
        assert_eq!(result.errors[0].kind, MemoryErrorKind::Leak);
    }

    #[test]
    fn test_single_unfreed_malloc_reports_exactly_one_leak() {
        let result = run("var buffer = malloc(64);");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, MemoryErrorKind::Leak);
        assert_eq!(result.errors[0].token.line, 1);
        assert!(result.errors[0].message.contains("'buffer'"));
    }

    #[test]
    fn test_use_after_free_on_read() {
        let result = run("var x = malloc(1); free(x); print x;");
        assert!(!result.safe);
        assert_eq!(result.errors[0].kind, MemoryErrorKind::UseAfterFree);
        assert!(result.errors[0]
            .hint
            .as_deref()
            .unwrap()
            .contains("freed at line 1"));
    }

    #[test]
    fn test_invalid_free_of_plain_variable() {
        let result = run("var y = 1; free(y);");
        assert_eq!(result.errors[0].kind, MemoryErrorKind::InvalidFree);
    }

    #[test]
    fn test_free_arity_error() {
        let result = run("var x = malloc(1); free(x, x);");
        assert_eq!(result.errors[0].kind, MemoryErrorKind::Other);
        assert!(result.errors[0].message.contains("expects exactly 1 argument, got 2"));
    }

    #[test]
    fn test_deref_freed_pointer() {
        let result = run("var x = malloc(1); free(x); deref(x);");
        assert_eq!(result.errors[0].kind, MemoryErrorKind::UseAfterFree);
    }

    #[test]
    fn test_deref_null_pointer() {
        let result = run("var p = nil; deref(p);");
        assert_eq!(result.errors[0].kind, MemoryErrorKind::NullDeref);
    }

    #[test]
    fn test_deref_uninitialized_pointer() {
        let result = run("var p; deref(p);");
        assert_eq!(result.errors[0].kind, MemoryErrorKind::UninitializedDeref);
    }

    #[test]
    fn test_dangling_pointer_read_is_warning_deref_is_error() {
        let result = run("var x = malloc(1); var p = addr_of(x); free(x); print p;");
        assert!(result.safe, "report: {}", result.report);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("dangling pointer 'p'")));

        let result = run("var x = malloc(1); var p = addr_of(x); free(x); deref(p);");
        assert!(!result.safe);
        assert_eq!(result.errors[0].kind, MemoryErrorKind::UseAfterFree);
        assert!(result.errors[0].message.contains("dangling pointer 'p'"));
    }

    #[test]
    fn test_scope_exit_leak() {
        let result = run("{ var x = malloc(1); print 1; }");
        assert!(!result.safe);
        assert!(result.errors[0]
            .message
            .contains("goes out of scope without being freed"));
    }

    #[test]
    fn test_reassignment_leak_on_declaration() {
        let result = run("var x = malloc(1); var x = malloc(2);");
        assert_eq!(result.errors[0].kind, MemoryErrorKind::Leak);
        assert!(result.errors[0].message.contains("reassigned"));
    }

    #[test]
    fn test_reassignment_leak_on_assignment() {
        let result = run("var x = malloc(1); x = malloc(2);");
        assert_eq!(result.errors[0].kind, MemoryErrorKind::Leak);
        assert!(result.errors[0].message.contains("Reassigning 'x'"));
    }

    #[test]
    fn test_function_leak_is_reported_per_function() {
        let result = run("fun f() { var x = malloc(1); }");
        assert!(!result.safe);
        assert!(result.errors[0].message.contains("in function 'f'"));
    }

    #[test]
    fn test_function_state_is_isolated() {
        let result = run("var g = malloc(1); fun f() { print 1; } free(g);");
        assert!(result.safe, "report: {}", result.report);
    }

    #[test]
    fn test_unsafe_block_downgrades_errors() {
        let result = run("unsafe { var x = malloc(1); free(x); free(x); }");
        assert!(result.safe, "report: {}", result.report);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("In unsafe block") && w.contains("Double-free")));
    }

    #[test]
    fn test_non_strict_mode_downgrades_leaks() {
        let stmts = parsed("var x = malloc(1);");
        let result = MemorySafetyAnalyzer::with_strict_mode(false).analyze(&stmts);
        assert!(result.safe);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Potential memory leak - 'x'")));
    }

    #[test]
    fn test_non_strict_function_gets_path_warnings() {
        let stmts = parsed("fun f(c) { var x = malloc(1); if (c) { free(x); } }");
        let result = MemorySafetyAnalyzer::with_strict_mode(false).analyze(&stmts);
        assert!(result.safe);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Potential leak of 'x' along execution path")));
    }

    #[test]
    fn test_switch_cases_are_isolated() {
        let result = run(
            "var x = malloc(1); switch (v) { case 1: free(x); break; case 2: free(x); break; } free(x);",
        );
        // each case starts from the entry snapshot and the switch leaves
        // the entry state in place, so the trailing free is legal
        assert!(result.safe, "report: {}", result.report);
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let stmts = parsed(
            "var a = malloc(1); var b = malloc(2); if (c) { free(a); } else { free(b); } print a;",
        );
        let first = MemorySafetyAnalyzer::new().analyze(&stmts);
        let second = MemorySafetyAnalyzer::new().analyze(&stmts);
        assert_eq!(first, second);
    }

    #[test]
    fn test_report_sections() {
        let result = run("var x = malloc(1);");
        assert!(result.report.contains("=== MEMORY SAFETY ERRORS ==="));
        assert!(result.report.contains("MEMORY LEAK at Line 1"));
    }
}
