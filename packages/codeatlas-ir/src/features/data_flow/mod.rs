//! Data flow & SSA (L3)
//!
//! Per-function defs/uses/flow edges with phi nodes at merge points, plus
//! inter-procedural argument and return linking.

pub mod domain;
pub mod infrastructure;

pub use domain::{
    DataFlowGraph, DefSite, DfgEdge, DfgEdgeKind, InterProcEdge, InterProcEdgeKind, PhiNode,
    RhsShape, Variable, VariableKind, VariableUse,
};
pub use infrastructure::{DfgBuilder, InterProcLinker};
