//! Control-flow graph construction
//!
//! Nodes live in an arena owned by the [`Cfg`]; predecessors and
//! successors are stored as id vectors, which keeps loop back edges from
//! forming ownership cycles and makes the graph trivial to dump. Every
//! statement contributes a node pair `(entry, exit)`: for straight-line
//! statements both are the same node, an `if` spans from its `Branch`
//! node to its `Merge` node, and a `while` spans from its `LoopHeader` to
//! its `LoopExit` with a back edge out of the body.

use std::collections::{BTreeMap, BTreeSet};

use super::state::AllocationInfo;
use crate::ast::{Expr, Stmt};

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Entry,
    Exit,
    Statement,
    Branch,
    Merge,
    LoopHeader,
    LoopBody,
    LoopExit,
    FnCall,
    FnReturn,
}

/// One program point
#[derive(Debug, Clone)]
pub struct CfgNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub stmt: Option<Stmt>,
    pub expr: Option<Expr>,
    pub preds: Vec<NodeId>,
    pub succs: Vec<NodeId>,
    pub in_map: BTreeMap<String, AllocationInfo>,
    pub out_map: BTreeMap<String, AllocationInfo>,
    pub freed_here: BTreeSet<String>,
}

impl CfgNode {
    fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            stmt: None,
            expr: None,
            preds: Vec::new(),
            succs: Vec::new(),
            in_map: BTreeMap::new(),
            out_map: BTreeMap::new(),
            freed_here: BTreeSet::new(),
        }
    }
}

/// Arena-owned control-flow graph
#[derive(Debug, Clone)]
pub struct Cfg {
    nodes: Vec<CfgNode>,
    pub entry: NodeId,
    pub exit: NodeId,
}

impl Cfg {
    /// Build the graph for a whole program body, wrapped in Entry/Exit.
    pub fn build(statements: &[Stmt]) -> Option<Cfg> {
        Self::build_with(statements, NodeKind::Entry, NodeKind::Exit)
    }

    /// Build the graph for a function body, wrapped in FnCall/FnReturn
    /// so interprocedural reports can tell the two apart.
    pub fn build_function(body: &[Stmt]) -> Option<Cfg> {
        Self::build_with(body, NodeKind::FnCall, NodeKind::FnReturn)
    }

    fn build_with(statements: &[Stmt], entry_kind: NodeKind, exit_kind: NodeKind) -> Option<Cfg> {
        if statements.is_empty() {
            return None;
        }

        let mut cfg = Cfg {
            nodes: Vec::new(),
            entry: 0,
            exit: 0,
        };

        cfg.entry = cfg.add_node(entry_kind);
        cfg.exit = cfg.add_node(exit_kind);

        match cfg.build_seq(statements) {
            Some((first, last)) => {
                let entry = cfg.entry;
                let exit = cfg.exit;
                cfg.connect(entry, first);
                cfg.connect(last, exit);
            }
            None => {
                let entry = cfg.entry;
                let exit = cfg.exit;
                cfg.connect(entry, exit);
            }
        }

        Some(cfg)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &CfgNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut CfgNode {
        &mut self.nodes[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CfgNode> {
        self.nodes.iter()
    }

    fn add_node(&mut self, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(CfgNode::new(id, kind));
        id
    }

    fn connect(&mut self, from: NodeId, to: NodeId) {
        if !self.nodes[from].succs.contains(&to) {
            self.nodes[from].succs.push(to);
        }
        if !self.nodes[to].preds.contains(&from) {
            self.nodes[to].preds.push(from);
        }
    }

    /// Chain a statement sequence; returns its (entry, exit) node pair.
    fn build_seq(&mut self, statements: &[Stmt]) -> Option<(NodeId, NodeId)> {
        let mut first = None;
        let mut prev_exit: Option<NodeId> = None;

        for stmt in statements {
            let (entry, exit) = self.build_stmt(stmt);
            if first.is_none() {
                first = Some(entry);
            }
            if let Some(prev) = prev_exit {
                self.connect(prev, entry);
            }
            prev_exit = Some(exit);
        }

        first.map(|f| (f, prev_exit.unwrap_or(f)))
    }

    fn build_stmt(&mut self, stmt: &Stmt) -> (NodeId, NodeId) {
        match stmt {
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let branch = self.add_node(NodeKind::Branch);
                self.nodes[branch].stmt = Some(stmt.clone());
                self.nodes[branch].expr = Some(condition.clone());

                let merge = self.add_node(NodeKind::Merge);

                let (then_entry, then_exit) = self.build_stmt(then_branch);
                self.connect(branch, then_entry);
                self.connect(then_exit, merge);

                match else_branch {
                    Some(else_branch) => {
                        let (else_entry, else_exit) = self.build_stmt(else_branch);
                        self.connect(branch, else_entry);
                        self.connect(else_exit, merge);
                    }
                    None => self.connect(branch, merge),
                }

                (branch, merge)
            }
            Stmt::While {
                condition, body, ..
            } => {
                let header = self.add_node(NodeKind::LoopHeader);
                self.nodes[header].stmt = Some(stmt.clone());
                self.nodes[header].expr = Some(condition.clone());

                let loop_exit = self.add_node(NodeKind::LoopExit);

                let body_marker = self.add_node(NodeKind::LoopBody);
                self.connect(header, body_marker);

                let (body_entry, body_exit) = self.build_stmt(body);
                self.connect(body_marker, body_entry);
                // back edge
                self.connect(body_exit, header);

                self.connect(header, loop_exit);

                (header, loop_exit)
            }
            Stmt::Block { statements, .. } => match self.build_seq(statements) {
                Some(pair) => pair,
                None => {
                    let id = self.add_node(NodeKind::Statement);
                    (id, id)
                }
            },
            other => {
                let id = self.add_node(NodeKind::Statement);
                self.nodes[id].stmt = Some(other.clone());
                (id, id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use crate::parser;

    fn build(source: &str) -> Cfg {
        let tokens = lexer::lex(source).expect("lex failed");
        let stmts = parser::parse(tokens, source).expect("parse failed");
        Cfg::build(&stmts).expect("cfg should exist")
    }

    #[test]
    fn test_empty_program_has_no_cfg() {
        assert!(Cfg::build(&[]).is_none());
    }

    #[test]
    fn test_linear_chain() {
        let cfg = build("var a = 1; var b = 2;");
        // entry, exit, two statement nodes
        assert_eq!(cfg.len(), 4);
        assert_eq!(cfg.node(cfg.entry).kind, NodeKind::Entry);
        assert_eq!(cfg.node(cfg.exit).kind, NodeKind::Exit);
        assert_eq!(cfg.node(cfg.exit).preds.len(), 1);
    }

    #[test]
    fn test_if_produces_branch_and_merge() {
        let cfg = build("if (c) { print 1; } else { print 2; }");
        let branch = cfg.nodes().find(|n| n.kind == NodeKind::Branch).unwrap();
        assert_eq!(branch.succs.len(), 2);
        let merge = cfg.nodes().find(|n| n.kind == NodeKind::Merge).unwrap();
        assert_eq!(merge.preds.len(), 2);
        // the merge flows on to the exit
        assert_eq!(merge.succs, vec![cfg.exit]);
    }

    #[test]
    fn test_else_less_if_connects_branch_to_merge() {
        let cfg = build("if (c) print 1;");
        let branch = cfg.nodes().find(|n| n.kind == NodeKind::Branch).unwrap();
        let merge = cfg.nodes().find(|n| n.kind == NodeKind::Merge).unwrap();
        assert!(branch.succs.contains(&merge.id));
    }

    #[test]
    fn test_while_has_back_edge() {
        let cfg = build("while (c) { print 1; }");
        let header = cfg.nodes().find(|n| n.kind == NodeKind::LoopHeader).unwrap();
        // preds: entry plus the back edge from the body
        assert_eq!(header.preds.len(), 2);
        let exit = cfg.nodes().find(|n| n.kind == NodeKind::LoopExit).unwrap();
        assert!(header.succs.contains(&exit.id));
        assert!(cfg.nodes().any(|n| n.kind == NodeKind::LoopBody));
    }

    #[test]
    fn test_function_body_wrapping() {
        let source = "var a = 1;";
        let tokens = lexer::lex(source).unwrap();
        let stmts = parser::parse(tokens, source).unwrap();
        let cfg = Cfg::build_function(&stmts).unwrap();
        assert_eq!(cfg.node(cfg.entry).kind, NodeKind::FnCall);
        assert_eq!(cfg.node(cfg.exit).kind, NodeKind::FnReturn);
    }

    #[test]
    fn test_statement_after_if_hangs_off_merge() {
        let cfg = build("if (c) print 1; print 2;");
        let merge = cfg.nodes().find(|n| n.kind == NodeKind::Merge).unwrap();
        assert_eq!(merge.succs.len(), 1);
        let after = cfg.node(merge.succs[0]);
        assert_eq!(after.kind, NodeKind::Statement);
    }
}
