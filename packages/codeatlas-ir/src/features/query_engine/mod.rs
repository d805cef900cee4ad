//! Unified query evaluator (L8)
//!
//! One graph over all IR layers with node selectors, edge-kind filters,
//! bounded path enumeration, and taint tracing.

pub mod domain;
pub mod infrastructure;

pub use domain::{
    EdgeKindSet, NodeSelector, PathQuery, PathResult, QueryEdgeKind, QueryOutcome,
};
pub use infrastructure::{
    QueryEvaluator, TaintConfig, TaintTraceResult, TaintTracer, UnifiedGraph, UnifiedNode,
    UnifiedNodeKind,
};
