//! Dependency graph infrastructure

pub mod graph;
pub mod impact;
pub mod import_resolver;
pub mod workspace;

pub use graph::{DependencyGraph, PageRankConfig};
pub use impact::ImpactAnalyzer;
pub use import_resolver::ImportResolver;
pub use workspace::{validate_workspace_imports, WorkspaceDetector};
