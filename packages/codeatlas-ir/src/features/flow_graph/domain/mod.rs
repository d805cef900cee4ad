//! Flow graph domain models

pub mod bfg;
pub mod cfg;

pub use bfg::{BasicFlowBlock, BasicFlowGraph, BlockKind};
pub use cfg::{CfgEdge, CfgEdgeKind, ControlFlowGraph};
