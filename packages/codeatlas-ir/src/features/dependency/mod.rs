//! Dependency graph (L5)
//!
//! Cross-file import resolution, SCC cycle detection, Kahn layering,
//! change impact analysis, and workspace boundary validation.

pub mod domain;
pub mod infrastructure;

pub use domain::{
    BoundaryViolation, DependencyEdge, DependencyNode, DependencyNodeKind, ImpactReport,
    WorkspaceBoundary, WorkspacePackage, WorkspaceType,
};
pub use infrastructure::{
    validate_workspace_imports, DependencyGraph, ImpactAnalyzer, ImportResolver, PageRankConfig,
    WorkspaceDetector,
};
