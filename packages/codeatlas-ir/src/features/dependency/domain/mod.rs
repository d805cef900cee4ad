//! Dependency graph domain models

mod models;

pub use models::{
    BoundaryViolation, DependencyEdge, DependencyNode, DependencyNodeKind, ImpactReport,
    WorkspaceBoundary, WorkspacePackage, WorkspaceType,
};
