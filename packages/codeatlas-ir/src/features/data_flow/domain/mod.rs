//! Data flow domain models

mod dfg;

pub use dfg::{
    DataFlowGraph, DefSite, DfgEdge, DfgEdgeKind, InterProcEdge, InterProcEdgeKind, PhiNode,
    RhsShape, Variable, VariableKind, VariableUse,
};
