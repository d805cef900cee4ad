//! Import resolution
//!
//! Absolute imports resolve stdlib first, then internal files, then fall
//! through to external packages. Relative imports walk up from the
//! enclosing module; walking above the repository root yields Unresolved.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

use crate::features::dependency::domain::{DependencyEdge, DependencyNode, DependencyNodeKind};
use crate::features::structural_ir::domain::IrDocument;
use crate::features::structural_ir::module_fqn_from_path;
use crate::shared::models::{EdgeKind, NodeKind};

static PYTHON_STDLIB: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "abc", "argparse", "asyncio", "base64", "collections", "contextlib", "copy", "csv",
        "dataclasses", "datetime", "enum", "functools", "glob", "hashlib", "heapq", "importlib",
        "inspect", "io", "itertools", "json", "logging", "math", "os", "pathlib", "pickle",
        "queue", "random", "re", "shutil", "socket", "sqlite3", "string", "struct", "subprocess",
        "sys", "tempfile", "threading", "time", "traceback", "types", "typing", "unittest",
        "urllib", "uuid", "warnings", "weakref",
    ]
    .into_iter()
    .collect()
});

static NODE_BUILTINS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "assert", "buffer", "child_process", "crypto", "events", "fs", "http", "https", "net",
        "os", "path", "process", "stream", "url", "util", "zlib",
    ]
    .into_iter()
    .collect()
});

/// Resolved module universe for one repository snapshot.
pub struct ImportResolver {
    /// module fqn → file path for every internal file
    internal: HashMap<String, String>,
}

impl ImportResolver {
    pub fn from_documents(docs: &[IrDocument]) -> Self {
        let internal = docs
            .iter()
            .map(|d| (module_fqn_from_path(&d.file_path), d.file_path.clone()))
            .collect();
        Self { internal }
    }

    /// Resolve every import in the documents into dependency nodes+edges.
    pub fn resolve(&self, docs: &[IrDocument]) -> (Vec<DependencyNode>, Vec<DependencyEdge>) {
        let mut nodes: HashMap<String, DependencyNode> = HashMap::new();
        let mut edges = Vec::new();

        // Every internal file is a node even with no imports
        for (module, file) in &self.internal {
            nodes.insert(module.clone(), DependencyNode::internal(module, file));
        }

        for doc in docs {
            let source_module = module_fqn_from_path(&doc.file_path);

            for import_edge in doc.edges_of_kind(EdgeKind::Imports) {
                let Some(import_node) = doc.get_node(&import_edge.target_id) else {
                    continue;
                };
                if import_node.kind != NodeKind::Import {
                    continue;
                }
                let Some(module) = import_node.attr_str("module") else {
                    continue;
                };
                let relative_depth = import_node
                    .attrs
                    .get("relative_depth")
                    .and_then(|v| v.as_u64())
                    .map(|v| v as u32);

                let resolved = self.resolve_one(module, &source_module, relative_depth);
                let target_module = resolved.module_path.clone();
                nodes.entry(target_module.clone()).or_insert(resolved);

                edges.push(DependencyEdge {
                    source_module: source_module.clone(),
                    target_module,
                    import_location: format!(
                        "{}:{}",
                        doc.file_path, import_node.span.start_line
                    ),
                    relative_depth,
                });
            }
        }

        let mut node_list: Vec<DependencyNode> = nodes.into_values().collect();
        node_list.sort_by(|a, b| a.module_path.cmp(&b.module_path));
        (node_list, edges)
    }

    fn resolve_one(
        &self,
        module: &str,
        source_module: &str,
        relative_depth: Option<u32>,
    ) -> DependencyNode {
        // Path-style relative imports (TypeScript)
        if module.starts_with("./") || module.starts_with("../") {
            return self.resolve_path_relative(module, source_module);
        }
        // Dotted relative imports (Python)
        let depth = relative_depth.unwrap_or(0);
        if depth > 0 || module.starts_with('.') {
            return self.resolve_dotted_relative(module, source_module, depth.max(1));
        }

        self.resolve_absolute(module)
    }

    fn resolve_absolute(&self, module: &str) -> DependencyNode {
        let head = module.split('.').next().unwrap_or(module);

        if PYTHON_STDLIB.contains(head) || NODE_BUILTINS.contains(module) {
            return DependencyNode::external(module, DependencyNodeKind::ExternalStdlib);
        }

        // Exact internal module, or a submodule of one
        if let Some(file) = self.internal.get(module) {
            return DependencyNode::internal(module, file.clone());
        }
        if let Some((fqn, file)) = self
            .internal
            .iter()
            .find(|(fqn, _)| fqn.ends_with(&format!(".{}", module)) || *fqn == module)
        {
            return DependencyNode {
                module_path: fqn.clone(),
                file_path: Some(file.clone()),
                kind: DependencyNodeKind::Internal,
            };
        }

        DependencyNode::external(module, DependencyNodeKind::ExternalPackage)
    }

    /// `from ..pkg import x` resolved by walking up from the enclosing
    /// module.
    fn resolve_dotted_relative(
        &self,
        module: &str,
        source_module: &str,
        depth: u32,
    ) -> DependencyNode {
        let suffix = module.trim_start_matches('.');
        let mut segments: Vec<&str> = source_module.split('.').collect();

        // One dot = current package: drop the file segment; each extra
        // dot climbs one more level
        for _ in 0..depth {
            if segments.pop().is_none() {
                return DependencyNode::external(module, DependencyNodeKind::Unresolved);
            }
        }

        let mut target = segments.join(".");
        if !suffix.is_empty() {
            if target.is_empty() {
                target = suffix.to_string();
            } else {
                target = format!("{}.{}", target, suffix);
            }
        }
        if target.is_empty() {
            return DependencyNode::external(module, DependencyNodeKind::Unresolved);
        }

        match self.internal.get(&target) {
            Some(file) => DependencyNode::internal(target, file.clone()),
            None => DependencyNode::external(target, DependencyNodeKind::Unresolved),
        }
    }

    /// `import { x } from "../util"` resolved against the importing file's
    /// directory.
    fn resolve_path_relative(&self, module: &str, source_module: &str) -> DependencyNode {
        let mut segments: Vec<&str> = source_module.split('.').collect();
        segments.pop(); // drop the file segment

        let mut rest = module;
        loop {
            if let Some(stripped) = rest.strip_prefix("./") {
                rest = stripped;
            } else if let Some(stripped) = rest.strip_prefix("../") {
                if segments.pop().is_none() {
                    return DependencyNode::external(module, DependencyNodeKind::Unresolved);
                }
                rest = stripped;
            } else {
                break;
            }
        }

        for part in rest.split('/') {
            if !part.is_empty() {
                segments.push(part);
            }
        }
        let target = segments.join(".");

        match self.internal.get(&target) {
            Some(file) => DependencyNode::internal(target, file.clone()),
            None => DependencyNode::external(target, DependencyNodeKind::Unresolved),
        }
    }
}
