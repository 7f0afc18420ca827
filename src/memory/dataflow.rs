//! Worklist dataflow over the CFG
//!
//! Propagates the allocation-state map forward: the in-map of a node is
//! the join of its predecessors' out-maps, the transfer function models
//! allocator-call declarations and `free` statements, and nodes whose
//! out-map changed re-enqueue their successors until the fixed point.
//! After convergence a second sweep reports reads of resources whose
//! incoming state is `Freed`.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use super::cfg::Cfg;
use super::state::{join_states, AllocationInfo, MemoryState};
use crate::ast::{Expr, Stmt};

/// Name of the allocator called in a direct call expression, if any.
pub(super) fn allocator_call(expr: &Expr) -> Option<&str> {
    match expr.callee_name() {
        Some(name @ ("malloc" | "calloc" | "realloc")) => Some(name),
        _ => None,
    }
}

/// The variable a `free(x)` statement releases, if this is one.
pub(super) fn free_target(expr: &Expr) -> Option<&str> {
    let Expr::Call { callee, args, .. } = expr else {
        return None;
    };
    if callee.variable_name() != Some("free") {
        return None;
    }
    match args.first() {
        Some(arg) => arg.variable_name(),
        None => None,
    }
}

/// Apply one statement's effect to an allocation map. Returns the name of
/// the variable freed here, when the statement is a `free`.
pub(super) fn transfer_stmt(
    stmt: &Stmt,
    map: &mut BTreeMap<String, AllocationInfo>,
) -> Option<String> {
    match stmt {
        Stmt::Var {
            name,
            token,
            initializer: Some(init),
        } => {
            if let Some(func) = allocator_call(init) {
                let mut alloc =
                    AllocationInfo::new(name.clone(), token.clone(), MemoryState::Allocated, func == "calloc");
                if let Expr::Call { args, .. } = init {
                    alloc.size_expr = args.first().cloned();
                }
                map.insert(name.clone(), alloc);
            }
            None
        }
        Stmt::Expression { expr } => {
            if let Some(target) = free_target(expr) {
                if let Some(alloc) = map.get_mut(target) {
                    alloc.state = MemoryState::Freed;
                    return Some(target.to_string());
                }
            }
            None
        }
        _ => None,
    }
}

/// Run the worklist to a fixed point and report warnings: ambiguous
/// partial frees observed at joins, then freed-state reads per node.
pub fn run(cfg: &mut Cfg) -> Vec<String> {
    let mut worklist = VecDeque::new();
    let mut queued = HashSet::new();
    let mut conflicts: BTreeSet<String> = BTreeSet::new();

    for id in 0..cfg.len() {
        worklist.push_back(id);
        queued.insert(id);
    }

    while let Some(id) = worklist.pop_front() {
        queued.remove(&id);

        // Join predecessors' out-maps
        let mut in_map: BTreeMap<String, AllocationInfo> = BTreeMap::new();
        for &pred in &cfg.node(id).preds.clone() {
            for (var, alloc) in &cfg.node(pred).out_map {
                match in_map.get_mut(var) {
                    None => {
                        in_map.insert(var.clone(), alloc.clone());
                    }
                    Some(existing) => {
                        let (joined, conflict) = join_states(existing.state, alloc.state);
                        if conflict {
                            conflicts.insert(format!(
                                "Ambiguous partial free: '{}' is freed on some paths into node {} but not others",
                                var, id
                            ));
                        }
                        existing.state = joined;
                    }
                }
            }
        }

        // Transfer
        let mut out_map = in_map.clone();
        let mut freed_here = BTreeSet::new();
        if let Some(stmt) = cfg.node(id).stmt.clone() {
            if let Some(freed) = transfer_stmt(&stmt, &mut out_map) {
                freed_here.insert(freed);
            }
        }

        let node = cfg.node_mut(id);
        let changed = node.out_map != out_map || node.in_map != in_map;
        node.in_map = in_map;
        node.out_map = out_map;
        node.freed_here = freed_here;

        if changed {
            for &succ in &cfg.node(id).succs.clone() {
                if queued.insert(succ) {
                    worklist.push_back(succ);
                }
            }
        }
    }

    let mut warnings: Vec<String> = conflicts.into_iter().collect();
    warnings.extend(freed_read_warnings(cfg));
    warnings
}

/// Reads of a variable whose incoming state is already `Freed`.
fn freed_read_warnings(cfg: &Cfg) -> Vec<String> {
    let mut warnings = Vec::new();

    for node in cfg.nodes() {
        let mut accessed = BTreeSet::new();
        if let Some(expr) = &node.expr {
            collect_reads(expr, &mut accessed);
        } else if let Some(stmt) = &node.stmt {
            match stmt {
                Stmt::Expression { expr } | Stmt::Print { expr, .. } => {
                    collect_reads(expr, &mut accessed)
                }
                Stmt::Return {
                    value: Some(value), ..
                } => collect_reads(value, &mut accessed),
                _ => {}
            }
        }

        for var in accessed {
            if let Some(alloc) = node.in_map.get(&var) {
                if alloc.state == MemoryState::Freed {
                    warnings.push(format!(
                        "Potential use-after-free of '{}' in CFG node {}",
                        var, node.id
                    ));
                }
            }
        }
    }

    warnings
}

fn collect_reads(expr: &Expr, out: &mut BTreeSet<String>) {
    match expr {
        Expr::Variable { name, .. } => {
            out.insert(name.clone());
        }
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            collect_reads(left, out);
            collect_reads(right, out);
        }
        Expr::Unary { right, .. } => collect_reads(right, out),
        Expr::Grouping { expr } => collect_reads(expr, out),
        Expr::Call { args, .. } => {
            for a in args {
                collect_reads(a, out);
            }
        }
        Expr::Array { elements, .. } => {
            for e in elements {
                collect_reads(e, out);
            }
        }
        Expr::Dict { pairs, .. } => {
            for (k, v) in pairs {
                collect_reads(k, out);
                collect_reads(v, out);
            }
        }
        Expr::IndexGet { target, index, .. } => {
            collect_reads(target, out);
            collect_reads(index, out);
        }
        Expr::IndexSet {
            target,
            index,
            value,
            ..
        } => {
            collect_reads(target, out);
            collect_reads(index, out);
            collect_reads(value, out);
        }
        Expr::Assign { value, .. } => collect_reads(value, out),
        Expr::Literal { .. } => {}
    }
}
