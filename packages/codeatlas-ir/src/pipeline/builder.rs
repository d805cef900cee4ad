//! Snapshot builder
//!
//! Per file the layer order is strict: parse → structural IR → BFG → CFG
//! → DFG. Across files the work is unordered and fans out on rayon.
//! Cross-file passes (inter-procedural linking, dependency resolution,
//! type inference fixpoint) run after every file has settled.
//!
//! A file failing with `IrCorruption` or `ResourceExceeded` aborts that
//! file only; the batch continues and the failure is reported alongside
//! the build.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::features::data_flow::domain::{DataFlowGraph, InterProcEdge};
use crate::features::data_flow::infrastructure::{DfgBuilder, InterProcLinker};
use crate::features::dependency::infrastructure::{DependencyGraph, ImportResolver};
use crate::features::flow_graph::domain::ControlFlowGraph;
use crate::features::flow_graph::infrastructure::{BfgBuilder, CfgBuilder};
use crate::features::parsing::{Language, ParsedTree, ResilientParser};
use crate::features::structural_ir::domain::IrDocument;
use crate::features::structural_ir::StructuralIrBuilder;
use crate::features::type_inference::TypeInferenceEngine;
use crate::shared::models::{AtlasError, Result};

/// One input file
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

/// Fully analyzed file (layers L0-L3)
pub struct FileAnalysis {
    pub tree: ParsedTree,
    pub doc: IrDocument,
    pub cfgs: Vec<ControlFlowGraph>,
    pub dfgs: Vec<DataFlowGraph>,
}

/// Complete snapshot build output, handed to the store on commit.
#[derive(Debug)]
pub struct SnapshotBuild {
    pub repo_id: String,
    pub snapshot_id: String,
    pub documents: Vec<IrDocument>,
    pub cfgs: Vec<ControlFlowGraph>,
    pub dfgs: Vec<DataFlowGraph>,
    pub inter_proc: Vec<InterProcEdge>,
    pub dependency_graph: DependencyGraph,
    pub type_engine: TypeInferenceEngine,
    /// Per-file failures that aborted that file but not the batch
    pub failures: Vec<(String, AtlasError)>,
}

pub struct SnapshotBuilder {
    repo_id: String,
    snapshot_id: String,
}

impl SnapshotBuilder {
    pub fn new(repo_id: impl Into<String>, snapshot_id: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            snapshot_id: snapshot_id.into(),
        }
    }

    /// Build a full snapshot from in-memory sources. Cancellation is
    /// checked between files; cancelling returns a Timeout error after
    /// releasing per-file state.
    pub fn build(&self, files: &[SourceFile], cancel: &AtomicBool) -> Result<SnapshotBuild> {
        let analyses: Vec<std::result::Result<FileAnalysis, (String, AtlasError)>> = files
            .par_iter()
            .filter(|f| Language::from_path(&f.path).is_some())
            .map(|file| {
                if cancel.load(Ordering::Relaxed) {
                    return Err((
                        file.path.clone(),
                        AtlasError::timeout("snapshot build cancelled"),
                    ));
                }
                self.analyze_file(file).map_err(|e| (file.path.clone(), e))
            })
            .collect();

        if cancel.load(Ordering::Relaxed) {
            return Err(AtlasError::timeout("snapshot build cancelled"));
        }

        let mut files_ok = Vec::new();
        let mut failures = Vec::new();
        for analysis in analyses {
            match analysis {
                Ok(a) => files_ok.push(a),
                Err((path, error)) => {
                    warn!(file = %path, error = %error, "file_analysis_failed");
                    failures.push((path, error));
                }
            }
        }

        // Cross-file passes over the settled documents
        let docs: Vec<IrDocument> = files_ok.iter().map(|a| a.doc.clone()).collect();
        let dfg_map: HashMap<String, DataFlowGraph> = files_ok
            .iter()
            .flat_map(|a| a.dfgs.iter().cloned())
            .map(|g| (g.function_fqn.clone(), g))
            .collect();

        let mut inter_proc = Vec::new();
        for analysis in &files_ok {
            inter_proc.extend(InterProcLinker::link(
                &analysis.doc,
                &analysis.tree.root,
                &dfg_map,
            ));
        }

        let resolver = ImportResolver::from_documents(&docs);
        let (dep_nodes, dep_edges) = resolver.resolve(&docs);
        let dependency_graph = DependencyGraph::build(dep_nodes, dep_edges);

        let mut type_engine = TypeInferenceEngine::new();
        type_engine.compute_summaries(&docs, &dfg_map);

        let cfgs: Vec<ControlFlowGraph> =
            files_ok.iter().flat_map(|a| a.cfgs.iter().cloned()).collect();
        let dfgs: Vec<DataFlowGraph> = dfg_map.into_values().collect();

        info!(
            repo_id = %self.repo_id,
            snapshot_id = %self.snapshot_id,
            files = files_ok.len(),
            failed = failures.len(),
            functions = cfgs.len(),
            "snapshot_built"
        );

        Ok(SnapshotBuild {
            repo_id: self.repo_id.clone(),
            snapshot_id: self.snapshot_id.clone(),
            documents: docs,
            cfgs,
            dfgs,
            inter_proc,
            dependency_graph,
            type_engine,
            failures,
        })
    }

    /// Strictly ordered per-file pipeline: parse → L1 → L2 → L3.
    fn analyze_file(&self, file: &SourceFile) -> Result<FileAnalysis> {
        let language = Language::from_path(&file.path)
            .ok_or_else(|| AtlasError::parse("unsupported language").with_file(&file.path))?;
        let parser = ResilientParser::new(language);
        let tree = parser.parse(&file.content, &file.path)?;

        let doc = StructuralIrBuilder::new(&self.repo_id).build(&tree);

        let mut cfgs = Vec::new();
        for func in doc.callables() {
            let Some(syntax) = tree.root.find_definition_at(func.span.start_line) else {
                continue;
            };
            let lowering = BfgBuilder::build(&func.fqn, syntax);
            let cfg = CfgBuilder::build(&lowering)
                .map_err(|e| e.with_file(&file.path))?;
            cfgs.push(cfg);
        }

        let dfgs = DfgBuilder::build_all(&doc, &tree.root);

        Ok(FileAnalysis {
            tree,
            doc,
            cfgs,
            dfgs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile {
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_empty_repo_builds_empty_snapshot() {
        let builder = SnapshotBuilder::new("repo", "snap1");
        let build = builder.build(&[], &AtomicBool::new(false)).unwrap();
        assert!(build.documents.is_empty());
        assert!(build.cfgs.is_empty());
        assert_eq!(build.dependency_graph.node_count(), 0);
    }

    #[test]
    fn test_single_file_repo() {
        let builder = SnapshotBuilder::new("repo", "snap1");
        let build = builder
            .build(
                &[file("app.py", "def main():\n    x = 1\n    return x\n")],
                &AtomicBool::new(false),
            )
            .unwrap();
        assert_eq!(build.documents.len(), 1);
        assert_eq!(build.cfgs.len(), 1);
        // Single file: no inter-procedural edges, one internal node
        assert!(build.inter_proc.is_empty());
        assert_eq!(build.dependency_graph.internal_modules().len(), 1);
    }

    #[test]
    fn test_parse_errors_do_not_fail_the_batch() {
        let builder = SnapshotBuilder::new("repo", "snap1");
        let build = builder
            .build(
                &[
                    file("bad.py", "def broken(:\n    pass\n"),
                    file("good.py", "def ok():\n    pass\n"),
                ],
                &AtomicBool::new(false),
            )
            .unwrap();
        // Both files yield documents: parsing is resilient
        assert_eq!(build.documents.len(), 2);
        assert!(build.failures.is_empty());
    }

    #[test]
    fn test_cancellation_between_files() {
        let builder = SnapshotBuilder::new("repo", "snap1");
        let cancel = AtomicBool::new(true);
        let err = builder
            .build(&[file("a.py", "x = 1\n")], &cancel)
            .unwrap_err();
        assert_eq!(err.kind, crate::shared::models::ErrorKind::Timeout);
    }

    #[test]
    fn test_cross_file_call_graph_and_dependencies() {
        let builder = SnapshotBuilder::new("repo", "snap1");
        let build = builder
            .build(
                &[
                    file("app/util.py", "def helper(v):\n    return v\n"),
                    file(
                        "app/main.py",
                        "import app.util\n\ndef run(data):\n    out = helper(data)\n",
                    ),
                ],
                &AtomicBool::new(false),
            )
            .unwrap();

        assert_eq!(build.dependency_graph.internal_modules().len(), 2);
        assert!(build
            .dependency_graph
            .get_dependencies("app.main")
            .contains(&"app.util".to_string()));
    }

    #[test]
    fn test_deterministic_ids_across_builds() {
        let sources = [file("m.py", "def f():\n    return 1\n")];
        let a = SnapshotBuilder::new("repo", "s")
            .build(&sources, &AtomicBool::new(false))
            .unwrap();
        let b = SnapshotBuilder::new("repo", "s")
            .build(&sources, &AtomicBool::new(false))
            .unwrap();
        let ids_a: Vec<_> = a.documents[0].nodes.iter().map(|n| n.id.clone()).collect();
        let ids_b: Vec<_> = b.documents[0].nodes.iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_unsupported_files_skipped() {
        let builder = SnapshotBuilder::new("repo", "snap1");
        let build = builder
            .build(
                &[file("README.md", "# nope"), file("ok.py", "x = 1\n")],
                &AtomicBool::new(false),
            )
            .unwrap();
        assert_eq!(build.documents.len(), 1);
    }
}
