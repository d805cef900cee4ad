//! Dependency graph domain models

use serde::{Deserialize, Serialize};

/// How a module resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyNodeKind {
    Internal,
    ExternalStdlib,
    ExternalPackage,
    Unresolved,
}

/// One module in the dependency graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyNode {
    pub module_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub kind: DependencyNodeKind,
}

impl DependencyNode {
    pub fn internal(module_path: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
            file_path: Some(file_path.into()),
            kind: DependencyNodeKind::Internal,
        }
    }

    pub fn external(module_path: impl Into<String>, kind: DependencyNodeKind) -> Self {
        Self {
            module_path: module_path.into(),
            file_path: None,
            kind,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.kind == DependencyNodeKind::Internal
    }
}

/// One import edge between modules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source_module: String,
    pub target_module: String,
    /// `file:line` of the import statement
    pub import_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_depth: Option<u32>,
}

/// Monorepo layout kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkspaceType {
    Npm,
    Yarn,
    Pnpm,
    Cargo,
    Go,
    Lerna,
    Nx,
}

impl WorkspaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceType::Npm => "npm",
            WorkspaceType::Yarn => "yarn",
            WorkspaceType::Pnpm => "pnpm",
            WorkspaceType::Cargo => "cargo",
            WorkspaceType::Go => "go",
            WorkspaceType::Lerna => "lerna",
            WorkspaceType::Nx => "nx",
        }
    }
}

/// One package inside a workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspacePackage {
    pub name: String,
    /// Path prefix owning this package's files
    pub root: String,
    /// Package names this package declares as dependencies
    pub declared_deps: Vec<String>,
    /// Public packages may be imported without a declaration
    pub public: bool,
}

/// Detected workspace boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceBoundary {
    pub workspace_type: WorkspaceType,
    pub packages: Vec<WorkspacePackage>,
}

impl WorkspaceBoundary {
    /// Package owning a file path (longest matching root wins).
    pub fn package_of(&self, file_path: &str) -> Option<&WorkspacePackage> {
        self.packages
            .iter()
            .filter(|p| file_path.starts_with(&p.root))
            .max_by_key(|p| p.root.len())
    }
}

/// A cross-package import that is not declared
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryViolation {
    pub source_package: String,
    pub target_package: String,
    pub source_module: String,
    pub target_module: String,
    pub import_location: String,
}

/// Change impact analysis result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactReport {
    pub changed_modules: Vec<String>,
    pub directly_affected: Vec<String>,
    pub transitively_affected: Vec<String>,
    pub max_depth: usize,
    /// 0.0-1.0
    pub risk_score: f64,
}

impl ImpactReport {
    pub fn total_affected(&self) -> usize {
        self.directly_affected.len() + self.transitively_affected.len()
    }

    pub fn empty(changed_modules: Vec<String>) -> Self {
        Self {
            changed_modules,
            directly_affected: Vec::new(),
            transitively_affected: Vec::new(),
            max_depth: 0,
            risk_score: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_of_longest_root_wins() {
        let boundary = WorkspaceBoundary {
            workspace_type: WorkspaceType::Pnpm,
            packages: vec![
                WorkspacePackage {
                    name: "core".to_string(),
                    root: "packages/core".to_string(),
                    declared_deps: vec![],
                    public: false,
                },
                WorkspacePackage {
                    name: "core-utils".to_string(),
                    root: "packages/core/utils".to_string(),
                    declared_deps: vec![],
                    public: false,
                },
            ],
        };
        let pkg = boundary.package_of("packages/core/utils/src/a.ts").unwrap();
        assert_eq!(pkg.name, "core-utils");
    }

    #[test]
    fn test_empty_impact_report() {
        let report = ImpactReport::empty(vec!["m".to_string()]);
        assert_eq!(report.risk_score, 0.0);
        assert_eq!(report.total_affected(), 0);
    }
}
