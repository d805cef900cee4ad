/*
 * CodeAtlas IR - layered code analysis engine
 *
 * Feature-first hexagonal architecture:
 * - shared/   : common models (Node, Edge, Span, errors, ids)
 * - features/ : vertical slices (parsing → structural IR → flow graphs →
 *               data flow → type inference → dependencies → queries →
 *               cross-language value flow)
 * - pipeline/ : snapshot orchestration, deltas, hooks
 *
 * Build order is strict per file (parse → L1 → L2 → L3); files fan out
 * across threads with rayon. Cross-file passes (inter-procedural links,
 * dependency resolution, type inference fixpoint) run once per snapshot.
 */

/// Shared models and utilities
pub mod shared;

/// Feature modules (pipeline layers)
pub mod features;

/// Pipeline orchestration
pub mod pipeline;

// Re-exports for the public API
pub use features::cross_lang::{BoundaryMatcher, BoundarySpec, Confidence, CrossServiceLink, ValueFlowOverlay};
pub use features::data_flow::{DataFlowGraph, DfgBuilder, InterProcEdge, InterProcLinker};
pub use features::dependency::{
    validate_workspace_imports, DependencyGraph, ImpactAnalyzer, ImpactReport, ImportResolver,
    WorkspaceBoundary, WorkspaceDetector,
};
pub use features::flow_graph::{BfgBuilder, CfgBuilder, ControlFlowGraph};
pub use features::parsing::{Language, ParsedTree, ResilientParser, SourceEdit};
pub use features::query_engine::{
    EdgeKindSet, NodeSelector, PathQuery, QueryEdgeKind, QueryEvaluator, QueryOutcome,
    TaintConfig, TaintTracer, UnifiedGraph,
};
pub use features::structural_ir::{IrDocument, StructuralIrBuilder};
pub use features::type_inference::{InferResult, InferSource, TypeInferenceEngine};
pub use pipeline::{SnapshotBuild, SnapshotBuilder, SnapshotDelta, SourceFile};
pub use shared::models::{
    AtlasError, ControlFlowSummary, Edge, EdgeKind, ErrorKind, Node, NodeId, NodeKind, Result,
    Span,
};
