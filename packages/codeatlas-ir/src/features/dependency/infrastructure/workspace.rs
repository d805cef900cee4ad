//! Workspace boundary detection and validation
//!
//! Detects monorepo layouts (npm/yarn/pnpm workspaces, Cargo, Go, Lerna,
//! Nx) and validates cross-package imports: an edge from package A to
//! package B is a violation unless A declares B in its manifest or B is
//! marked public.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::features::dependency::domain::{
    BoundaryViolation, DependencyNodeKind, WorkspaceBoundary, WorkspacePackage, WorkspaceType,
};
use crate::features::dependency::infrastructure::graph::DependencyGraph;

pub struct WorkspaceDetector;

impl WorkspaceDetector {
    /// Auto-detect the workspace layout of a repository root.
    pub fn detect(repo_root: &Path) -> Option<WorkspaceBoundary> {
        let workspace_type = Self::detect_type(repo_root)?;
        let packages = Self::collect_packages(repo_root, workspace_type);
        if packages.is_empty() {
            return None;
        }
        info!(
            workspace_type = workspace_type.as_str(),
            package_count = packages.len(),
            "workspace_boundary_detected"
        );
        Some(WorkspaceBoundary {
            workspace_type,
            packages,
        })
    }

    fn detect_type(repo_root: &Path) -> Option<WorkspaceType> {
        if repo_root.join("pnpm-workspace.yaml").exists() {
            return Some(WorkspaceType::Pnpm);
        }
        if repo_root.join("lerna.json").exists() {
            return Some(WorkspaceType::Lerna);
        }
        if repo_root.join("nx.json").exists() {
            return Some(WorkspaceType::Nx);
        }
        if repo_root.join("go.work").exists() {
            return Some(WorkspaceType::Go);
        }
        if let Ok(content) = fs::read_to_string(repo_root.join("Cargo.toml")) {
            if content.contains("[workspace]") {
                return Some(WorkspaceType::Cargo);
            }
        }
        if let Ok(content) = fs::read_to_string(repo_root.join("package.json")) {
            if let Ok(json) = serde_json::from_str::<Value>(&content) {
                if json.get("workspaces").is_some() {
                    // Yarn and npm share the field; yarn.lock disambiguates
                    if repo_root.join("yarn.lock").exists() {
                        return Some(WorkspaceType::Yarn);
                    }
                    return Some(WorkspaceType::Npm);
                }
            }
        }
        None
    }

    fn collect_packages(repo_root: &Path, workspace_type: WorkspaceType) -> Vec<WorkspacePackage> {
        let mut packages = Vec::new();
        let Ok(walker) = fs::read_dir(repo_root) else {
            return packages;
        };

        // Common monorepo convention: one directory of packages. Scan two
        // levels for manifests.
        let mut candidate_dirs = vec![repo_root.to_path_buf()];
        for entry in walker.flatten() {
            let path = entry.path();
            if path.is_dir() {
                candidate_dirs.push(path.clone());
                if let Ok(children) = fs::read_dir(&path) {
                    for child in children.flatten() {
                        if child.path().is_dir() {
                            candidate_dirs.push(child.path());
                        }
                    }
                }
            }
        }

        for dir in candidate_dirs {
            if dir != repo_root {
                if let Some(pkg) = Self::read_package(repo_root, &dir, workspace_type) {
                    debug!(package = %pkg.name, root = %pkg.root, "workspace_package_found");
                    packages.push(pkg);
                }
            }
        }
        packages
    }

    fn read_package(
        repo_root: &Path,
        dir: &Path,
        workspace_type: WorkspaceType,
    ) -> Option<WorkspacePackage> {
        let root = dir
            .strip_prefix(repo_root)
            .ok()?
            .to_string_lossy()
            .replace('\\', "/");

        match workspace_type {
            WorkspaceType::Cargo => {
                let content = fs::read_to_string(dir.join("Cargo.toml")).ok()?;
                let name = toml_string_value(&content, "name")?;
                let declared_deps = toml_dependency_names(&content);
                Some(WorkspacePackage {
                    name,
                    root,
                    declared_deps,
                    public: false,
                })
            }
            WorkspaceType::Go => {
                let content = fs::read_to_string(dir.join("go.mod")).ok()?;
                let name = content
                    .lines()
                    .find_map(|l| l.trim().strip_prefix("module "))?
                    .trim()
                    .to_string();
                Some(WorkspacePackage {
                    name,
                    root,
                    declared_deps: Vec::new(),
                    public: false,
                })
            }
            _ => {
                let content = fs::read_to_string(dir.join("package.json")).ok()?;
                let json: Value = serde_json::from_str(&content).ok()?;
                let name = json.get("name")?.as_str()?.to_string();
                let mut declared_deps = Vec::new();
                for key in ["dependencies", "devDependencies", "peerDependencies"] {
                    if let Some(deps) = json.get(key).and_then(Value::as_object) {
                        declared_deps.extend(deps.keys().cloned());
                    }
                }
                let public = json
                    .get("private")
                    .and_then(Value::as_bool)
                    .map(|private| !private)
                    .unwrap_or(false);
                Some(WorkspacePackage {
                    name,
                    root,
                    declared_deps,
                    public,
                })
            }
        }
    }
}

/// Validate every internal dependency edge against a workspace boundary.
pub fn validate_workspace_imports(
    graph: &DependencyGraph,
    boundary: &WorkspaceBoundary,
) -> Vec<BoundaryViolation> {
    let mut violations = Vec::new();

    for edge in graph.raw_edges() {
        let (Some(source), Some(target)) = (
            graph.get_node(&edge.source_module),
            graph.get_node(&edge.target_module),
        ) else {
            continue;
        };
        if source.kind != DependencyNodeKind::Internal
            || target.kind != DependencyNodeKind::Internal
        {
            continue;
        }
        let (Some(source_file), Some(target_file)) = (&source.file_path, &target.file_path) else {
            continue;
        };
        let (Some(source_pkg), Some(target_pkg)) = (
            boundary.package_of(source_file),
            boundary.package_of(target_file),
        ) else {
            continue;
        };
        if source_pkg.name == target_pkg.name {
            continue;
        }
        if target_pkg.public || source_pkg.declared_deps.contains(&target_pkg.name) {
            continue;
        }
        violations.push(BoundaryViolation {
            source_package: source_pkg.name.clone(),
            target_package: target_pkg.name.clone(),
            source_module: edge.source_module.clone(),
            target_module: edge.target_module.clone(),
            import_location: edge.import_location.clone(),
        });
    }

    violations
}

/// Minimal TOML value scan (`name = "value"` under any table).
fn toml_string_value(content: &str, key: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let line = line.trim();
        let rest = line.strip_prefix(key)?.trim_start();
        let rest = rest.strip_prefix('=')?.trim();
        let value = rest.trim_matches('"');
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    })
}

/// Crate names from a `[dependencies]` table.
fn toml_dependency_names(content: &str) -> Vec<String> {
    let mut deps = Vec::new();
    let mut in_deps = false;
    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_deps = line == "[dependencies]" || line == "[dev-dependencies]";
            continue;
        }
        if in_deps && !line.is_empty() && !line.starts_with('#') {
            if let Some((name, _)) = line.split_once('=') {
                deps.push(name.trim().to_string());
            }
        }
    }
    deps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::dependency::domain::{DependencyEdge, DependencyNode};
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_detect_pnpm_workspace() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "pnpm-workspace.yaml", "packages:\n  - packages/*\n");
        write(
            tmp.path(),
            "packages/core/package.json",
            r#"{"name": "core", "dependencies": {"util": "1.0.0"}}"#,
        );
        write(tmp.path(), "packages/util/package.json", r#"{"name": "util"}"#);

        let boundary = WorkspaceDetector::detect(tmp.path()).unwrap();
        assert_eq!(boundary.workspace_type, WorkspaceType::Pnpm);
        assert_eq!(boundary.packages.len(), 2);
    }

    #[test]
    fn test_detect_cargo_workspace() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "Cargo.toml",
            "[workspace]\nmembers = [\"crates/a\"]\n",
        );
        write(
            tmp.path(),
            "crates/a/Cargo.toml",
            "[package]\nname = \"a\"\n\n[dependencies]\nserde = \"1\"\n",
        );

        let boundary = WorkspaceDetector::detect(tmp.path()).unwrap();
        assert_eq!(boundary.workspace_type, WorkspaceType::Cargo);
        assert_eq!(boundary.packages[0].name, "a");
        assert!(boundary.packages[0]
            .declared_deps
            .contains(&"serde".to_string()));
    }

    #[test]
    fn test_no_workspace_detected() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "main.py", "x = 1\n");
        assert!(WorkspaceDetector::detect(tmp.path()).is_none());
    }

    #[test]
    fn test_violation_for_undeclared_cross_package_import() {
        let boundary = WorkspaceBoundary {
            workspace_type: WorkspaceType::Pnpm,
            packages: vec![
                WorkspacePackage {
                    name: "app".to_string(),
                    root: "packages/app".to_string(),
                    declared_deps: vec![],
                    public: false,
                },
                WorkspacePackage {
                    name: "internal".to_string(),
                    root: "packages/internal".to_string(),
                    declared_deps: vec![],
                    public: false,
                },
            ],
        };

        let graph = DependencyGraph::build(
            vec![
                DependencyNode::internal("packages.app.main", "packages/app/main.ts"),
                DependencyNode::internal("packages.internal.secret", "packages/internal/secret.ts"),
            ],
            vec![DependencyEdge {
                source_module: "packages.app.main".to_string(),
                target_module: "packages.internal.secret".to_string(),
                import_location: "packages/app/main.ts:1".to_string(),
                relative_depth: None,
            }],
        );

        let violations = validate_workspace_imports(&graph, &boundary);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].source_package, "app");
        assert_eq!(violations[0].target_package, "internal");
    }

    #[test]
    fn test_declared_dependency_is_not_a_violation() {
        let boundary = WorkspaceBoundary {
            workspace_type: WorkspaceType::Pnpm,
            packages: vec![
                WorkspacePackage {
                    name: "app".to_string(),
                    root: "packages/app".to_string(),
                    declared_deps: vec!["util".to_string()],
                    public: false,
                },
                WorkspacePackage {
                    name: "util".to_string(),
                    root: "packages/util".to_string(),
                    declared_deps: vec![],
                    public: false,
                },
            ],
        };

        let graph = DependencyGraph::build(
            vec![
                DependencyNode::internal("packages.app.main", "packages/app/main.ts"),
                DependencyNode::internal("packages.util.index", "packages/util/index.ts"),
            ],
            vec![DependencyEdge {
                source_module: "packages.app.main".to_string(),
                target_module: "packages.util.index".to_string(),
                import_location: "packages/app/main.ts:1".to_string(),
                relative_depth: None,
            }],
        );

        assert!(validate_workspace_imports(&graph, &boundary).is_empty());
    }

    #[test]
    fn test_public_package_is_importable() {
        let boundary = WorkspaceBoundary {
            workspace_type: WorkspaceType::Npm,
            packages: vec![
                WorkspacePackage {
                    name: "app".to_string(),
                    root: "packages/app".to_string(),
                    declared_deps: vec![],
                    public: false,
                },
                WorkspacePackage {
                    name: "shared".to_string(),
                    root: "packages/shared".to_string(),
                    declared_deps: vec![],
                    public: true,
                },
            ],
        };

        let graph = DependencyGraph::build(
            vec![
                DependencyNode::internal("packages.app.main", "packages/app/main.ts"),
                DependencyNode::internal("packages.shared.api", "packages/shared/api.ts"),
            ],
            vec![DependencyEdge {
                source_module: "packages.app.main".to_string(),
                target_module: "packages.shared.api".to_string(),
                import_location: "packages/app/main.ts:1".to_string(),
                relative_depth: None,
            }],
        );

        assert!(validate_workspace_imports(&graph, &boundary).is_empty());
    }
}
