//! Control Flow Graph domain model

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::features::flow_graph::domain::bfg::{BasicFlowBlock, BlockKind};

/// Control flow edge kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CfgEdgeKind {
    Normal,
    TrueBranch,
    FalseBranch,
    LoopBack,
    Break,
    Continue,
    Return,
    Exception,
}

impl CfgEdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CfgEdgeKind::Normal => "Normal",
            CfgEdgeKind::TrueBranch => "TrueBranch",
            CfgEdgeKind::FalseBranch => "FalseBranch",
            CfgEdgeKind::LoopBack => "LoopBack",
            CfgEdgeKind::Break => "Break",
            CfgEdgeKind::Continue => "Continue",
            CfgEdgeKind::Return => "Return",
            CfgEdgeKind::Exception => "Exception",
        }
    }
}

/// Typed edge between two flow blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CfgEdge {
    pub source_block_id: String,
    pub target_block_id: String,
    pub kind: CfgEdgeKind,
}

/// Control flow graph for one function: the BFG blocks plus typed edges
/// and derived predecessor/successor tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlFlowGraph {
    pub id: String,
    pub function_id: String,
    pub entry_block_id: String,
    pub exit_block_id: String,
    pub blocks: Vec<BasicFlowBlock>,
    pub edges: Vec<CfgEdge>,
    /// block id → predecessor block ids
    pub predecessors: HashMap<String, Vec<String>>,
    /// block id → successor block ids
    pub successors: HashMap<String, Vec<String>>,
}

impl ControlFlowGraph {
    /// Recompute predecessor/successor tables from the edge list.
    pub fn rebuild_adjacency(&mut self) {
        self.predecessors.clear();
        self.successors.clear();
        for block in &self.blocks {
            self.predecessors.entry(block.id.clone()).or_default();
            self.successors.entry(block.id.clone()).or_default();
        }
        for edge in &self.edges {
            self.successors
                .entry(edge.source_block_id.clone())
                .or_default()
                .push(edge.target_block_id.clone());
            self.predecessors
                .entry(edge.target_block_id.clone())
                .or_default()
                .push(edge.source_block_id.clone());
        }
    }

    pub fn get_block(&self, id: &str) -> Option<&BasicFlowBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn edges_from(&self, block_id: &str) -> Vec<&CfgEdge> {
        self.edges
            .iter()
            .filter(|e| e.source_block_id == block_id)
            .collect()
    }

    pub fn edges_of_kind(&self, kind: CfgEdgeKind) -> Vec<&CfgEdge> {
        self.edges.iter().filter(|e| e.kind == kind).collect()
    }

    pub fn blocks_of_kind(&self, kind: BlockKind) -> Vec<&BasicFlowBlock> {
        self.blocks.iter().filter(|b| b.kind == kind).collect()
    }
}
