//! CFG builder (L2, phase two)
//!
//! Generates typed control flow edges over the lowered BFG skeleton:
//! - linear blocks flow Normal to their successor
//! - conditions branch True/False (False goes to the merge block when
//!   there is no else branch)
//! - loops: header → body (TrueBranch), single LoopBack via the latch,
//!   header → post-loop (FalseBranch); Break/Continue/Return get explicit
//!   edges to loop-exit / loop-header / function-exit
//! - every throwing block inside a try scope gets one Exception edge per
//!   enclosing catch handler (nested try = union of all enclosing catches)
//! - Suspend flows Normal to its Resume and Exception to enclosing catches
//! - a generator's Dispatcher fans out Normal edges per its dispatch table
//!
//! Silent partial output is forbidden: a BFG/CFG mismatch raises
//! `IrCorruption` and aborts the snapshot commit for this unit.

use std::collections::HashMap;

use crate::features::flow_graph::domain::{CfgEdge, CfgEdgeKind, ControlFlowGraph};
use crate::features::flow_graph::infrastructure::lowering::{
    entry_of, FunctionLowering, Structure, TerminatorKind,
};
use crate::shared::models::{AtlasError, Result};

pub struct CfgBuilder;

impl CfgBuilder {
    /// Build the CFG for one lowered function.
    pub fn build(lowering: &FunctionLowering) -> Result<ControlFlowGraph> {
        let bfg = &lowering.bfg;
        if bfg.blocks.is_empty()
            || bfg.get_block(&bfg.entry_block_id).is_none()
            || bfg.get_block(&bfg.exit_block_id).is_none()
        {
            return Err(AtlasError::ir_corruption(format!(
                "flow blocks for {} lack an enclosing graph",
                bfg.function_id
            )));
        }

        let mut gen = EdgeGen {
            edges: Vec::new(),
            exit_id: bfg.exit_block_id.clone(),
            loop_stack: Vec::new(),
            catch_stack: Vec::new(),
        };

        let exit = bfg.exit_block_id.clone();
        let body_entry = gen.gen_seq(&lowering.body, &exit);

        // The skeleton's entry must resolve to a known block; a dangling
        // entry means the two phases disagree about the function's shape.
        if !lowering.body.is_empty() && bfg.get_block(&body_entry).is_none() {
            return Err(AtlasError::ir_corruption(format!(
                "no control flow graph produced for non-empty flow blocks of {}",
                bfg.function_id
            )));
        }

        match &lowering.dispatcher_id {
            Some(dispatcher) => {
                gen.edge(&bfg.entry_block_id, dispatcher, CfgEdgeKind::Normal);
                if let Some(table) = bfg
                    .get_block(dispatcher)
                    .and_then(|b| b.dispatch_table.as_ref())
                {
                    for target in table.values() {
                        gen.edge(dispatcher, target, CfgEdgeKind::Normal);
                    }
                }
            }
            None => {
                gen.edge(&bfg.entry_block_id, &body_entry, CfgEdgeKind::Normal);
            }
        }

        let mut cfg = ControlFlowGraph {
            id: format!("{}:cfg", bfg.function_id),
            function_id: bfg.function_id.clone(),
            entry_block_id: bfg.entry_block_id.clone(),
            exit_block_id: bfg.exit_block_id.clone(),
            blocks: bfg.blocks.clone(),
            edges: gen.edges,
            predecessors: HashMap::new(),
            successors: HashMap::new(),
        };
        cfg.rebuild_adjacency();
        Ok(cfg)
    }
}

struct LoopCtx {
    header: String,
    after: String,
}

struct EdgeGen {
    edges: Vec<CfgEdge>,
    exit_id: String,
    loop_stack: Vec<LoopCtx>,
    /// Stack of enclosing catch handler lists (innermost last)
    catch_stack: Vec<Vec<String>>,
}

impl EdgeGen {
    fn edge(&mut self, from: &str, to: &str, kind: CfgEdgeKind) {
        let edge = CfgEdge {
            source_block_id: from.to_string(),
            target_block_id: to.to_string(),
            kind,
        };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    /// Normal edge, rewritten to LoopBack when it targets the innermost
    /// loop header (the latch's back edge).
    fn normal_edge(&mut self, from: &str, to: &str) {
        let kind = match self.loop_stack.last() {
            Some(ctx) if ctx.header == to => CfgEdgeKind::LoopBack,
            _ => CfgEdgeKind::Normal,
        };
        self.edge(from, to, kind);
    }

    /// One Exception edge per enclosing catch handler (union across all
    /// nested try scopes).
    fn exception_edges(&mut self, from: &str) {
        let targets: Vec<String> = self
            .catch_stack
            .iter()
            .flat_map(|catches| catches.iter().cloned())
            .collect();
        for target in targets {
            self.edge(from, &target, CfgEdgeKind::Exception);
        }
    }

    /// Generate edges for a sequence; returns the sequence's entry block
    /// (or `next` when the sequence is empty).
    fn gen_seq(&mut self, seq: &[Structure], next: &str) -> String {
        let mut next_id = next.to_string();
        for s in seq.iter().rev() {
            self.gen(s, &next_id);
            next_id = entry_of(s).to_string();
        }
        next_id
    }

    fn gen(&mut self, s: &Structure, next: &str) {
        match s {
            Structure::Linear { block } => {
                self.exception_edges(block);
                self.normal_edge(block, next);
            }
            Structure::Terminator { block, kind } => match kind {
                TerminatorKind::Return => {
                    self.exception_edges(block);
                    let exit = self.exit_id.clone();
                    self.edge(block, &exit, CfgEdgeKind::Return);
                }
                TerminatorKind::Raise => {
                    // Caught raises flow to their handlers; an uncaught
                    // throw leaves the block with no successor.
                    self.exception_edges(block);
                }
                TerminatorKind::Break => {
                    if let Some(ctx) = self.loop_stack.last() {
                        let after = ctx.after.clone();
                        self.edge(block, &after, CfgEdgeKind::Break);
                    }
                }
                TerminatorKind::Continue => {
                    if let Some(ctx) = self.loop_stack.last() {
                        let header = ctx.header.clone();
                        self.edge(block, &header, CfgEdgeKind::Continue);
                    }
                }
            },
            Structure::Cond {
                cond,
                then_branch,
                else_branch,
            } => {
                self.exception_edges(cond);
                let then_entry = self.gen_seq(then_branch, next);
                self.edge(cond, &then_entry, CfgEdgeKind::TrueBranch);
                if else_branch.is_empty() {
                    // No else: the false edge goes to the merge block
                    self.edge(cond, next, CfgEdgeKind::FalseBranch);
                } else {
                    let else_entry = self.gen_seq(else_branch, next);
                    self.edge(cond, &else_entry, CfgEdgeKind::FalseBranch);
                }
            }
            Structure::Loop { header, body } => {
                self.loop_stack.push(LoopCtx {
                    header: header.clone(),
                    after: next.to_string(),
                });
                let body_entry = self.gen_seq(body, header);
                self.loop_stack.pop();

                self.edge(header, &body_entry, CfgEdgeKind::TrueBranch);
                self.edge(header, next, CfgEdgeKind::FalseBranch);
            }
            Structure::Try {
                try_block,
                body,
                catches,
                finally,
            } => {
                // Finally receives Normal edges from the preceding try/catch
                // bodies and flows to the function-level successor.
                let after = match finally {
                    Some(f) => f.block.clone(),
                    None => next.to_string(),
                };

                // Catch bodies run outside this try's protection: a raise
                // inside a handler propagates to outer catches only.
                for catch in catches {
                    let catch_entry = self.gen_seq(&catch.body, &after);
                    self.normal_edge(&catch.block, &catch_entry);
                }
                if let Some(f) = finally {
                    let finally_entry = self.gen_seq(&f.body, next);
                    self.normal_edge(&f.block, &finally_entry);
                }

                let catch_ids: Vec<String> = catches.iter().map(|c| c.block.clone()).collect();
                self.catch_stack.push(catch_ids);
                let body_entry = self.gen_seq(body, &after);
                self.catch_stack.pop();

                self.normal_edge(try_block, &body_entry);
            }
            Structure::Await { suspend, resume } => {
                // The awaited computation can reject inside a try scope
                self.exception_edges(suspend);
                self.edge(suspend, resume, CfgEdgeKind::Normal);
                self.normal_edge(resume, next);
            }
        }
    }
}
