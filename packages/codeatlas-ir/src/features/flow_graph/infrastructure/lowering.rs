//! BFG lowering (L2, phase one)
//!
//! Partitions a function body into maximal single-entry single-exit blocks
//! and records the structural skeleton (conditions, loops, try scopes,
//! suspend points) the CFG phase needs to generate exact edges. The
//! generator dispatch table is computed here.

use std::collections::BTreeMap;

use crate::features::flow_graph::domain::{BasicFlowBlock, BasicFlowGraph, BlockKind};
use crate::features::parsing::domain::{SyntaxKind, SyntaxNode};
use crate::shared::models::Span;

/// Terminator statement kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminatorKind {
    Return,
    Raise,
    Break,
    Continue,
}

/// Catch handler: the Catch block plus its lowered body
#[derive(Debug, Clone)]
pub struct CatchArm {
    pub block: String,
    pub body: Vec<Structure>,
}

/// Finally handler
#[derive(Debug, Clone)]
pub struct FinallyArm {
    pub block: String,
    pub body: Vec<Structure>,
}

/// Structural skeleton of a lowered body, consumed by the CFG phase.
#[derive(Debug, Clone)]
pub enum Structure {
    Linear {
        block: String,
    },
    Terminator {
        block: String,
        kind: TerminatorKind,
    },
    Cond {
        cond: String,
        then_branch: Vec<Structure>,
        else_branch: Vec<Structure>,
    },
    Loop {
        header: String,
        body: Vec<Structure>,
    },
    Try {
        try_block: String,
        body: Vec<Structure>,
        catches: Vec<CatchArm>,
        finally: Option<FinallyArm>,
    },
    Await {
        suspend: String,
        resume: String,
    },
}

/// Entry block id of a structure.
pub fn entry_of(s: &Structure) -> &str {
    match s {
        Structure::Linear { block } => block,
        Structure::Terminator { block, .. } => block,
        Structure::Cond { cond, .. } => cond,
        Structure::Loop { header, .. } => header,
        Structure::Try { try_block, .. } => try_block,
        Structure::Await { suspend, .. } => suspend,
    }
}

/// Entry block id of a sequence (`next` if the sequence is empty).
pub fn entry_of_seq<'a>(seq: &'a [Structure], next: &'a str) -> &'a str {
    seq.first().map(entry_of).unwrap_or(next)
}

fn ends_in_terminator(seq: &[Structure]) -> bool {
    matches!(seq.last(), Some(Structure::Terminator { .. }))
}

/// Lowered function: the BFG plus the structural skeleton.
#[derive(Debug, Clone)]
pub struct FunctionLowering {
    pub bfg: BasicFlowGraph,
    pub body: Vec<Structure>,
    pub dispatcher_id: Option<String>,
}

/// BFG builder
pub struct BfgBuilder;

impl BfgBuilder {
    /// Lower one function's syntax subtree into a BFG + skeleton.
    pub fn build(function_id: &str, function_syntax: &SyntaxNode) -> FunctionLowering {
        let mut lowerer = Lowerer::new(function_id);

        let entry_id = lowerer.new_block(BlockKind::Entry, function_syntax.span, 0);

        let statements = function_body_statements(function_syntax);
        let body = if statements.is_empty() {
            // Lambda body is a bare expression; treat it as one block.
            if function_syntax.kind == SyntaxKind::LambdaDef {
                let block = lowerer.new_block(BlockKind::Block, function_syntax.span, 1);
                vec![Structure::Linear { block }]
            } else {
                Vec::new()
            }
        } else {
            lowerer.lower_stmts(&statements)
        };

        // Generator functions get a single Dispatcher fanning out to each
        // state block.
        let mut dispatcher_id = None;
        if !lowerer.yield_states.is_empty() {
            let id = lowerer.new_block(BlockKind::Dispatcher, function_syntax.span, 0);
            let mut table = BTreeMap::new();
            let exit_placeholder = String::new();
            let state0 = entry_of_seq(&body, &exit_placeholder).to_string();
            if !state0.is_empty() {
                table.insert(0u32, state0);
            }
            for (i, state) in lowerer.yield_states.iter().enumerate() {
                table.insert(i as u32 + 1, state.clone());
            }
            if let Some(block) = lowerer.blocks.iter_mut().find(|b| b.id == id) {
                block.dispatch_table = Some(table);
            }
            dispatcher_id = Some(id);
        }

        let exit_id = lowerer.new_block(BlockKind::Exit, function_syntax.span, 0);

        let bfg = BasicFlowGraph {
            id: format!("{}:bfg", function_id),
            function_id: function_id.to_string(),
            entry_block_id: entry_id,
            exit_block_id: exit_id,
            total_statements: lowerer.total_statements,
            blocks: lowerer.blocks,
        };

        FunctionLowering {
            bfg,
            body,
            dispatcher_id,
        }
    }
}

struct Lowerer {
    function_id: String,
    blocks: Vec<BasicFlowBlock>,
    counter: u32,
    total_statements: usize,
    /// Block ids that start a generator state (the block after each yield)
    yield_states: Vec<String>,
}

impl Lowerer {
    fn new(function_id: &str) -> Self {
        Self {
            function_id: function_id.to_string(),
            blocks: Vec::new(),
            counter: 0,
            total_statements: 0,
            yield_states: Vec::new(),
        }
    }

    fn new_block(&mut self, kind: BlockKind, span: Span, statement_count: usize) -> String {
        let id = format!("{}:b{}", self.function_id, self.counter);
        self.counter += 1;
        let mut block = BasicFlowBlock::new(&id, kind, &self.function_id, span);
        block.statement_count = statement_count;
        self.blocks.push(block);
        self.total_statements += statement_count;
        id
    }

    fn lower_stmts(&mut self, stmts: &[&SyntaxNode]) -> Vec<Structure> {
        let mut out: Vec<Structure> = Vec::new();
        // Accumulate consecutive simple statements into one maximal block
        let mut pending: Option<(Span, usize)> = None;

        macro_rules! flush {
            () => {
                if let Some((span, count)) = pending.take() {
                    let block = self.new_block(BlockKind::Block, span, count);
                    out.push(Structure::Linear { block });
                }
            };
        }

        for stmt in stmts {
            match classify_stmt(stmt) {
                StmtClass::Simple => {
                    pending = Some(match pending {
                        Some((span, count)) => (merge_spans(span, stmt.span), count + 1),
                        None => (stmt.span, 1),
                    });
                }
                StmtClass::With => {
                    // Transparent container: header statement then inner body
                    flush!();
                    let block = self.new_block(BlockKind::Block, stmt.span, 1);
                    out.push(Structure::Linear { block });
                    let inner = block_statements(stmt);
                    out.extend(self.lower_stmts(&inner));
                }
                StmtClass::If => {
                    flush!();
                    out.push(self.lower_if(stmt));
                }
                StmtClass::Match => {
                    flush!();
                    match self.lower_match(stmt) {
                        Some(s) => out.push(s),
                        None => {
                            let block = self.new_block(BlockKind::Block, stmt.span, 1);
                            out.push(Structure::Linear { block });
                        }
                    }
                }
                StmtClass::Loop => {
                    flush!();
                    out.push(self.lower_loop(stmt));
                }
                StmtClass::Try => {
                    flush!();
                    out.push(self.lower_try(stmt));
                }
                StmtClass::Await => {
                    flush!();
                    let suspend = self.new_block(BlockKind::Suspend, stmt.span, 1);
                    let resume = self.new_block(BlockKind::Resume, stmt.span, 0);
                    out.push(Structure::Await { suspend, resume });
                }
                StmtClass::Yield => {
                    flush!();
                    let block = self.new_block(BlockKind::Block, stmt.span, 1);
                    out.push(Structure::Linear { block });
                    // The block after a yield is a generator state target
                    let state = self.new_block(BlockKind::Block, stmt.span, 0);
                    self.yield_states.push(state.clone());
                    out.push(Structure::Linear { block: state });
                }
                StmtClass::Terminator(kind) => {
                    flush!();
                    let block = self.new_block(BlockKind::Block, stmt.span, 1);
                    out.push(Structure::Terminator { block, kind });
                }
            }
        }
        flush!();
        out
    }

    fn lower_if(&mut self, node: &SyntaxNode) -> Structure {
        let cond_span = condition_span(node);
        let cond = self.new_block(BlockKind::Condition, cond_span, 1);

        let then_stmts = block_statements(node);
        let then_branch = self.lower_stmts(&then_stmts);

        let clauses: Vec<&SyntaxNode> = node
            .children
            .iter()
            .filter(|c| {
                matches!(
                    c.raw_kind.as_deref(),
                    Some("elif_clause") | Some("else_clause")
                )
            })
            .collect();
        let else_branch = self.lower_else_chain(&clauses);

        Structure::Cond {
            cond,
            then_branch,
            else_branch,
        }
    }

    fn lower_else_chain(&mut self, clauses: &[&SyntaxNode]) -> Vec<Structure> {
        let Some((first, rest)) = clauses.split_first() else {
            return Vec::new();
        };

        if first.raw_kind.as_deref() == Some("elif_clause") {
            let cond = self.new_block(BlockKind::Condition, condition_span(first), 1);
            let then_stmts = block_statements(first);
            let then_branch = self.lower_stmts(&then_stmts);
            let else_branch = self.lower_else_chain(rest);
            return vec![Structure::Cond {
                cond,
                then_branch,
                else_branch,
            }];
        }

        // else clause: either a block, or a chained `else if` (TypeScript)
        if let Some(nested_if) = first.children.iter().find(|c| c.kind == SyntaxKind::IfStmt) {
            return vec![self.lower_if(nested_if)];
        }
        let stmts = block_statements(first);
        self.lower_stmts(&stmts)
    }

    fn lower_match(&mut self, node: &SyntaxNode) -> Option<Structure> {
        // A match statement lowers to a chain of conditions, one per case.
        // Case clauses sit either directly under the statement or inside
        // its body block, depending on the grammar.
        let mut cases: Vec<&SyntaxNode> = node
            .children
            .iter()
            .filter(|c| c.kind == SyntaxKind::MatchCase)
            .collect();
        if cases.is_empty() {
            if let Some(block) = node.children.iter().find(|c| c.kind == SyntaxKind::Block) {
                cases = block
                    .children
                    .iter()
                    .filter(|c| c.kind == SyntaxKind::MatchCase)
                    .collect();
            }
        }
        self.lower_case_chain(&cases)
    }

    fn lower_case_chain(&mut self, cases: &[&SyntaxNode]) -> Option<Structure> {
        let (first, rest) = cases.split_first()?;
        let cond = self.new_block(BlockKind::Condition, first.span, 1);
        let then_stmts = block_statements(first);
        let then_branch = self.lower_stmts(&then_stmts);
        let else_branch = self.lower_case_chain(rest).map(|s| vec![s]).unwrap_or_default();
        Some(Structure::Cond {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn lower_loop(&mut self, node: &SyntaxNode) -> Structure {
        let header = self.new_block(BlockKind::LoopHeader, condition_span(node), 1);
        let body_stmts = block_statements(node);
        let mut body = self.lower_stmts(&body_stmts);

        // Latch: route the back edge through a single block so each loop
        // has at most one LoopBack, unless the body ends in a jump.
        if !ends_in_terminator(&body) {
            let latch = self.new_block(BlockKind::Block, node.span, 0);
            body.push(Structure::Linear { block: latch });
        }

        Structure::Loop { header, body }
    }

    fn lower_try(&mut self, node: &SyntaxNode) -> Structure {
        let try_block = self.new_block(BlockKind::Try, node.span, 0);
        let mut body_stmts = block_statements(node);

        // try/else: the else suite runs when no exception was raised;
        // treat it as a continuation of the body.
        if let Some(else_clause) = node.find_raw("else_clause") {
            body_stmts.extend(block_statements(else_clause));
        }
        let body = self.lower_stmts(&body_stmts);

        let mut catches = Vec::new();
        for clause in &node.children {
            if clause.kind == SyntaxKind::ExceptClause {
                let block = self.new_block(BlockKind::Catch, clause.span, 1);
                let stmts = block_statements(clause);
                let catch_body = self.lower_stmts(&stmts);
                catches.push(CatchArm {
                    block,
                    body: catch_body,
                });
            }
        }

        let finally = node
            .children
            .iter()
            .find(|c| c.kind == SyntaxKind::FinallyClause)
            .map(|clause| {
                let block = self.new_block(BlockKind::Finally, clause.span, 1);
                let stmts = block_statements(clause);
                let body = self.lower_stmts(&stmts);
                FinallyArm { block, body }
            });

        Structure::Try {
            try_block,
            body,
            catches,
            finally,
        }
    }
}

enum StmtClass {
    Simple,
    If,
    Match,
    Loop,
    Try,
    With,
    Await,
    Yield,
    Terminator(TerminatorKind),
}

fn classify_stmt(stmt: &SyntaxNode) -> StmtClass {
    match stmt.kind {
        SyntaxKind::IfStmt => StmtClass::If,
        SyntaxKind::MatchStmt => StmtClass::Match,
        SyntaxKind::ForStmt | SyntaxKind::WhileStmt => StmtClass::Loop,
        SyntaxKind::TryStmt => StmtClass::Try,
        SyntaxKind::WithStmt => StmtClass::With,
        SyntaxKind::ReturnStmt => StmtClass::Terminator(TerminatorKind::Return),
        SyntaxKind::RaiseStmt => StmtClass::Terminator(TerminatorKind::Raise),
        SyntaxKind::BreakStmt => StmtClass::Terminator(TerminatorKind::Break),
        SyntaxKind::ContinueStmt => StmtClass::Terminator(TerminatorKind::Continue),
        _ => {
            let inner = stmt.descendants_until_definition();
            if stmt.kind == SyntaxKind::YieldExpr
                || inner.iter().any(|d| d.kind == SyntaxKind::YieldExpr)
            {
                StmtClass::Yield
            } else if stmt.kind == SyntaxKind::AwaitExpr
                || inner.iter().any(|d| d.kind == SyntaxKind::AwaitExpr)
            {
                StmtClass::Await
            } else {
                StmtClass::Simple
            }
        }
    }
}

/// Named statements of the first block child of `node`.
fn block_statements(node: &SyntaxNode) -> Vec<&SyntaxNode> {
    let Some(block) = node.children.iter().find(|c| c.kind == SyntaxKind::Block) else {
        return Vec::new();
    };
    block.children.iter().filter(|c| !c.is_token()).collect()
}

/// Body statements of a function definition.
fn function_body_statements(function: &SyntaxNode) -> Vec<&SyntaxNode> {
    block_statements(function)
}

/// Span of the condition / iterator part of a branching statement.
fn condition_span(node: &SyntaxNode) -> Span {
    node.children
        .iter()
        .find(|c| !c.is_token() && c.kind != SyntaxKind::Block && c.kind != SyntaxKind::Decorator)
        .map(|c| c.span)
        .unwrap_or(node.span)
}

fn merge_spans(a: Span, b: Span) -> Span {
    Span::new(
        a.start_line.min(b.start_line),
        if a.start_line <= b.start_line {
            a.start_col
        } else {
            b.start_col
        },
        a.end_line.max(b.end_line),
        if a.end_line >= b.end_line {
            a.end_col
        } else {
            b.end_col
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::parsing::ResilientParser;

    fn lower(source: &str) -> FunctionLowering {
        let tree = ResilientParser::python().parse(source, "t.py").unwrap();
        let func = tree
            .root
            .children
            .iter()
            .find(|c| c.kind == SyntaxKind::FunctionDef)
            .expect("function");
        BfgBuilder::build("t.f", func)
    }

    #[test]
    fn test_entry_and_exit_always_present() {
        let lowering = lower("def f():\n    pass\n");
        assert_eq!(lowering.bfg.blocks_of_kind(BlockKind::Entry).count(), 1);
        assert_eq!(lowering.bfg.blocks_of_kind(BlockKind::Exit).count(), 1);
    }

    #[test]
    fn test_consecutive_statements_merge_into_one_block() {
        let lowering = lower("def f():\n    a = 1\n    b = 2\n    c = 3\n");
        let blocks: Vec<_> = lowering.bfg.blocks_of_kind(BlockKind::Block).collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].statement_count, 3);
        assert_eq!(lowering.bfg.total_statements, 3);
    }

    #[test]
    fn test_if_produces_condition_block() {
        let lowering = lower("def f(x):\n    if x:\n        a = 1\n    b = 2\n");
        assert_eq!(lowering.bfg.blocks_of_kind(BlockKind::Condition).count(), 1);
        assert!(matches!(lowering.body[0], Structure::Cond { .. }));
    }

    #[test]
    fn test_loop_produces_header_and_latch() {
        let lowering = lower("def f():\n    while True:\n        a = 1\n");
        assert_eq!(lowering.bfg.blocks_of_kind(BlockKind::LoopHeader).count(), 1);
        let Structure::Loop { body, .. } = &lowering.body[0] else {
            panic!("expected loop");
        };
        // body block + latch
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn test_loop_body_ending_in_break_has_no_latch() {
        let lowering = lower("def f():\n    while True:\n        break\n");
        let Structure::Loop { body, .. } = &lowering.body[0] else {
            panic!("expected loop");
        };
        assert_eq!(body.len(), 1);
        assert!(matches!(
            body[0],
            Structure::Terminator {
                kind: TerminatorKind::Break,
                ..
            }
        ));
    }

    #[test]
    fn test_try_with_catch_and_finally() {
        let lowering = lower(
            "def f():\n    try:\n        go()\n    except ValueError:\n        a = 1\n    finally:\n        b = 2\n",
        );
        assert_eq!(lowering.bfg.blocks_of_kind(BlockKind::Try).count(), 1);
        assert_eq!(lowering.bfg.blocks_of_kind(BlockKind::Catch).count(), 1);
        assert_eq!(lowering.bfg.blocks_of_kind(BlockKind::Finally).count(), 1);
    }

    #[test]
    fn test_await_produces_suspend_resume_pair() {
        let lowering = lower("async def f():\n    await fetch()\n");
        assert_eq!(lowering.bfg.blocks_of_kind(BlockKind::Suspend).count(), 1);
        assert_eq!(lowering.bfg.blocks_of_kind(BlockKind::Resume).count(), 1);
    }

    #[test]
    fn test_generator_dispatch_table() {
        let lowering = lower("def gen():\n    a = 1\n    yield a\n    b = 2\n    yield b\n");
        let dispatcher_id = lowering.dispatcher_id.expect("dispatcher");
        let dispatcher = lowering.bfg.get_block(&dispatcher_id).unwrap();
        assert_eq!(dispatcher.kind, BlockKind::Dispatcher);
        let table = dispatcher.dispatch_table.as_ref().unwrap();
        // state 0 (function start) + one state per yield
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_deterministic_block_ids() {
        let a = lower("def f():\n    if x:\n        y = 1\n");
        let b = lower("def f():\n    if x:\n        y = 1\n");
        let ids_a: Vec<_> = a.bfg.blocks.iter().map(|bl| bl.id.clone()).collect();
        let ids_b: Vec<_> = b.bfg.blocks.iter().map(|bl| bl.id.clone()).collect();
        assert_eq!(ids_a, ids_b);
    }
}
