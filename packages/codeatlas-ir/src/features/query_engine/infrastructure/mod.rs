//! Query engine infrastructure

pub mod taint;
pub mod traversal;
pub mod unified_graph;

pub use taint::{TaintConfig, TaintTraceResult, TaintTracer};
pub use traversal::QueryEvaluator;
pub use unified_graph::{UnifiedEdge, UnifiedGraph, UnifiedNode, UnifiedNodeKind};
