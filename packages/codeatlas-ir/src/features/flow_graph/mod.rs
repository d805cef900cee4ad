//! Semantic IR — CFG/BFG (L2)
//!
//! Two-phase: the BFG phase partitions each function body into maximal
//! single-entry single-exit blocks; the CFG phase adds typed edges
//! (normal / branch / loop / exception / suspend-resume / dispatcher).

pub mod domain;
pub mod infrastructure;

pub use domain::{
    BasicFlowBlock, BasicFlowGraph, BlockKind, CfgEdge, CfgEdgeKind, ControlFlowGraph,
};
pub use infrastructure::{BfgBuilder, CfgBuilder, FunctionLowering};
