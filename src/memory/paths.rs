//! Bounded path enumeration
//!
//! Depth-first enumeration of acyclic entry-to-exit paths, replaying the
//! allocation transfer function along each one. A visited set keeps loop
//! back edges from recursing forever, and hard caps on path count and
//! depth guarantee termination on pathological graphs. Anything still
//! allocated at a path's end is a potential leak, reported as a warning
//! rather than a hard error: some other path may free it.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::cfg::{Cfg, NodeId};
use super::dataflow::transfer_stmt;
use super::state::{AllocationInfo, MemoryState};

/// Maximum number of complete paths to examine
pub const MAX_PATHS: usize = 10_000;
/// Maximum nodes along a single path
pub const MAX_PATH_DEPTH: usize = 1_000;

/// Enumerate acyclic paths and report per-path leak warnings.
pub fn leak_warnings(cfg: &Cfg) -> Vec<String> {
    let mut walker = PathWalker {
        cfg,
        visited: HashSet::new(),
        paths_found: 0,
        seen: BTreeSet::new(),
        warnings: Vec::new(),
    };

    walker.walk(cfg.entry, &BTreeMap::new(), 0);
    walker.warnings
}

struct PathWalker<'a> {
    cfg: &'a Cfg,
    visited: HashSet<NodeId>,
    paths_found: usize,
    /// Dedup: the same leak reported by many paths reads as noise
    seen: BTreeSet<String>,
    warnings: Vec<String>,
}

impl PathWalker<'_> {
    fn walk(&mut self, id: NodeId, map: &BTreeMap<String, AllocationInfo>, depth: usize) {
        if self.paths_found >= MAX_PATHS || depth >= MAX_PATH_DEPTH {
            return;
        }
        if self.visited.contains(&id) {
            return;
        }

        let mut map = map.clone();
        if let Some(stmt) = &self.cfg.node(id).stmt {
            transfer_stmt(stmt, &mut map);
        }

        if id == self.cfg.exit {
            self.paths_found += 1;
            for (var, alloc) in &map {
                if alloc.state == MemoryState::Allocated {
                    let warning = format!(
                        "Path-sensitive analysis: Potential leak of '{}' along execution path",
                        var
                    );
                    if self.seen.insert(warning.clone()) {
                        self.warnings.push(warning);
                    }
                }
            }
            return;
        }

        self.visited.insert(id);
        for &succ in &self.cfg.node(id).succs {
            self.walk(succ, &map, depth + 1);
        }
        self.visited.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use crate::parser;

    fn warnings_for(source: &str) -> Vec<String> {
        let tokens = lexer::lex(source).expect("lex failed");
        let stmts = parser::parse(tokens, source).expect("parse failed");
        let cfg = Cfg::build_function(&stmts).expect("cfg");
        leak_warnings(&cfg)
    }

    #[test]
    fn test_unfreed_allocation_warns() {
        let warnings = warnings_for("var x = malloc(10); print 1;");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Potential leak of 'x'"));
    }

    #[test]
    fn test_freed_allocation_is_silent() {
        let warnings = warnings_for("var x = malloc(10); free(x);");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_branch_with_leaking_path_warns() {
        let warnings = warnings_for("var x = malloc(10); if (c) { free(x); } print 1;");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("'x'"));
    }

    #[test]
    fn test_both_branches_freeing_is_silent() {
        let warnings =
            warnings_for("var x = malloc(10); if (c) { free(x); } else { free(x); } print 1;");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_loop_does_not_recurse_forever() {
        let warnings = warnings_for("var x = malloc(10); while (c) { print 1; } free(x);");
        assert!(warnings.is_empty());
    }
}
