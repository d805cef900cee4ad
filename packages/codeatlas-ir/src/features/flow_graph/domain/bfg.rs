//! Basic Flow Graph domain model
//!
//! The BFG phase partitions each function body into maximal
//! single-entry single-exit blocks; the CFG phase adds typed edges.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::shared::models::Span;

/// Flow block kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    Entry,
    Exit,
    Block,
    Condition,
    LoopHeader,
    Try,
    Catch,
    Finally,
    Suspend,
    Resume,
    Dispatcher,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Entry => "Entry",
            BlockKind::Exit => "Exit",
            BlockKind::Block => "Block",
            BlockKind::Condition => "Condition",
            BlockKind::LoopHeader => "LoopHeader",
            BlockKind::Try => "Try",
            BlockKind::Catch => "Catch",
            BlockKind::Finally => "Finally",
            BlockKind::Suspend => "Suspend",
            BlockKind::Resume => "Resume",
            BlockKind::Dispatcher => "Dispatcher",
        }
    }

    /// Blocks of these kinds can raise inside a try scope.
    pub fn can_throw(&self) -> bool {
        matches!(self, BlockKind::Block | BlockKind::Condition)
    }
}

/// A single basic flow block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicFlowBlock {
    pub id: String,
    pub kind: BlockKind,
    pub function_id: String,
    pub span: Span,
    pub statement_count: usize,
    /// Generator dispatch table (state index → state block id), present on
    /// Dispatcher blocks only; computed in lowering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_table: Option<BTreeMap<u32, String>>,
}

impl BasicFlowBlock {
    pub fn new(
        id: impl Into<String>,
        kind: BlockKind,
        function_id: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            function_id: function_id.into(),
            span,
            statement_count: 0,
            dispatch_table: None,
        }
    }
}

/// Basic flow graph for one function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicFlowGraph {
    pub id: String,
    pub function_id: String,
    pub entry_block_id: String,
    pub exit_block_id: String,
    pub blocks: Vec<BasicFlowBlock>,
    pub total_statements: usize,
}

impl BasicFlowGraph {
    pub fn get_block(&self, id: &str) -> Option<&BasicFlowBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn blocks_of_kind(&self, kind: BlockKind) -> impl Iterator<Item = &BasicFlowBlock> {
        self.blocks.iter().filter(move |b| b.kind == kind)
    }
}
