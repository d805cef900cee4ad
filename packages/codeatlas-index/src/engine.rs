//! Engine façade
//!
//! The combined surface CLIs and agents consume: snapshot indexing into
//! the multi-index store, hybrid retrieval, path/taint tracing over the
//! unified graph, and change impact analysis.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use codeatlas_ir::features::query_engine::infrastructure::unified_graph::UnifiedGraph;
use codeatlas_ir::{
    AtlasError, EdgeKind, EdgeKindSet, ImpactAnalyzer, ImpactReport, NodeSelector, QueryEdgeKind,
    QueryEvaluator, QueryOutcome, Result, SnapshotBuild, SnapshotBuilder, SourceFile, TaintConfig,
    TaintTracer,
};

use crate::domain::document::IndexDocument;
use crate::domain::ports::{GraphPort, IndexingPort};
use crate::infrastructure::store::MultiIndexStore;
use crate::retriever::hybrid::{HybridRetriever, RetrievalResult};
use crate::retriever::intent::IntentKind;

struct RepoState {
    snapshot_id: String,
    build: SnapshotBuild,
    graph: UnifiedGraph,
}

/// Combined engine façade over builder, store, and retriever.
pub struct Engine {
    store: Arc<MultiIndexStore>,
    repos: RwLock<HashMap<String, RepoState>>,
}

#[derive(Debug, Clone)]
pub struct IndexSummary {
    pub files: usize,
    pub chunks: usize,
    pub functions: usize,
    pub failed_files: usize,
}

impl Engine {
    pub fn new(store: Arc<MultiIndexStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            repos: RwLock::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> Arc<MultiIndexStore> {
        self.store.clone()
    }

    /// Build a snapshot from sources and commit it to every index.
    pub async fn index_repository(
        &self,
        repo_id: &str,
        snapshot_id: &str,
        files: &[SourceFile],
    ) -> Result<IndexSummary> {
        let builder = SnapshotBuilder::new(repo_id, snapshot_id);
        let build = builder.build(files, &AtomicBool::new(false))?;

        // Chunks: one per symbol plus one per file
        let sources: HashMap<&str, &str> = files
            .iter()
            .map(|f| (f.path.as_str(), f.content.as_str()))
            .collect();
        let importance = build.dependency_graph.compute_pagerank(None);
        let docs = make_chunks(repo_id, snapshot_id, &build, &sources, &importance);

        self.store.index(repo_id, snapshot_id, &docs).await?;

        // Graph index edges: calls + imports
        let mut edges: Vec<(String, String)> = Vec::new();
        for doc in &build.documents {
            for edge in doc.edges_of_kind(EdgeKind::Calls) {
                let (Some(from), Some(to)) =
                    (doc.get_node(&edge.source_id), doc.get_node(&edge.target_id))
                else {
                    continue;
                };
                edges.push((from.fqn.clone(), to.fqn.clone()));
            }
        }
        for edge in build.dependency_graph.raw_edges() {
            edges.push((edge.source_module.clone(), edge.target_module.clone()));
        }
        self.store.add_graph_edges(repo_id, snapshot_id, &edges);

        let graph = UnifiedGraph::build(
            &build.documents,
            &build.dfgs,
            &build.cfgs,
            &build.inter_proc,
        );

        let summary = IndexSummary {
            files: build.documents.len(),
            chunks: docs.len(),
            functions: build.cfgs.len(),
            failed_files: build.failures.len(),
        };

        let mut repos = self.repos.write().await;
        repos.insert(
            repo_id.to_string(),
            RepoState {
                snapshot_id: snapshot_id.to_string(),
                build,
                graph,
            },
        );

        info!(
            repo_id,
            snapshot_id,
            files = summary.files,
            chunks = summary.chunks,
            "repository_indexed"
        );
        Ok(summary)
    }

    /// Hybrid search over an indexed repository.
    pub async fn search(
        &self,
        repo_id: &str,
        query: &str,
        top_k: usize,
        intent: Option<IntentKind>,
        include_inactive: bool,
    ) -> Result<RetrievalResult> {
        let snapshot_id = self.snapshot_of(repo_id).await?;
        let call_graph = self.call_graph(repo_id).await;
        let retriever =
            HybridRetriever::new(self.store.clone()).with_call_graph(call_graph);
        retriever
            .retrieve(repo_id, &snapshot_id, query, top_k, intent, include_inactive)
            .await
    }

    /// Forward path trace between two symbols.
    pub async fn trace(
        &self,
        repo_id: &str,
        from_fqn: &str,
        to_fqn: Option<&str>,
        max_depth: usize,
        timeout_ms: u64,
    ) -> Result<QueryOutcome> {
        let repos = self.repos.read().await;
        let state = repos
            .get(repo_id)
            .ok_or_else(|| AtlasError::config(format!("repository not indexed: {}", repo_id)))?;

        let sink = match to_fqn {
            Some(fqn) => NodeSelector::Function(fqn.to_string()),
            None => NodeSelector::Any,
        };
        let query = (NodeSelector::Function(from_fqn.to_string()) >> sink)
            .via(QueryEdgeKind::Calls | QueryEdgeKind::InterProc | QueryEdgeKind::Contains)
            .depth(max_depth)
            .timeout(timeout_ms);

        Ok(QueryEvaluator::new(&state.graph).evaluate(&query))
    }

    /// Taint trace between two symbols' variables, filtered by label.
    pub async fn trace_taint(
        &self,
        repo_id: &str,
        source_var: &str,
        sink_var: &str,
        label: &str,
        max_depth: usize,
        timeout_ms: u64,
    ) -> Result<codeatlas_ir::features::query_engine::infrastructure::taint::TaintTraceResult>
    {
        let mut repos = self.repos.write().await;
        let state = repos
            .get_mut(repo_id)
            .ok_or_else(|| AtlasError::config(format!("repository not indexed: {}", repo_id)))?;

        state.graph.tag_source(source_var, label);
        state.graph.tag_sink(sink_var, label);

        let config = TaintConfig {
            label: Some(label.to_string()),
            via: EdgeKindSet::data_flow(),
            max_depth,
            max_paths: 100,
            timeout_ms,
        };
        Ok(TaintTracer::new(&state.graph).trace(&config))
    }

    /// Change impact for a set of files.
    pub async fn impact(&self, repo_id: &str, files: &[String]) -> Result<ImpactReport> {
        let repos = self.repos.read().await;
        let state = repos
            .get(repo_id)
            .ok_or_else(|| AtlasError::config(format!("repository not indexed: {}", repo_id)))?;

        // Accept file paths or module paths
        let modules: Vec<String> = files
            .iter()
            .map(|f| codeatlas_ir::features::structural_ir::module_fqn_from_path(f))
            .collect();
        Ok(ImpactAnalyzer::new(&state.build.dependency_graph).analyze(&modules, None))
    }

    async fn snapshot_of(&self, repo_id: &str) -> Result<String> {
        let repos = self.repos.read().await;
        repos
            .get(repo_id)
            .map(|s| s.snapshot_id.clone())
            .ok_or_else(|| AtlasError::config(format!("repository not indexed: {}", repo_id)))
    }

    async fn call_graph(&self, repo_id: &str) -> HashMap<String, Vec<String>> {
        let repos = self.repos.read().await;
        let Some(state) = repos.get(repo_id) else {
            return HashMap::new();
        };
        let mut out: HashMap<String, Vec<String>> = HashMap::new();
        for doc in &state.build.documents {
            for edge in doc.edges_of_kind(EdgeKind::Calls) {
                let (Some(from), Some(to)) =
                    (doc.get_node(&edge.source_id), doc.get_node(&edge.target_id))
                else {
                    continue;
                };
                out.entry(from.fqn.clone()).or_default().push(to.fqn.clone());
            }
        }
        out
    }
}

#[async_trait]
impl GraphPort for Engine {
    async fn get_callers(&self, fqn: &str) -> Result<Vec<String>> {
        let repos = self.repos.read().await;
        let mut out = Vec::new();
        for state in repos.values() {
            for doc in &state.build.documents {
                for edge in doc.edges_of_kind(EdgeKind::Calls) {
                    let (Some(from), Some(to)) =
                        (doc.get_node(&edge.source_id), doc.get_node(&edge.target_id))
                    else {
                        continue;
                    };
                    if to.fqn == fqn {
                        out.push(from.fqn.clone());
                    }
                }
            }
        }
        Ok(out)
    }

    async fn get_callees(&self, fqn: &str) -> Result<Vec<String>> {
        let repos = self.repos.read().await;
        let mut out = Vec::new();
        for state in repos.values() {
            for doc in &state.build.documents {
                for edge in doc.edges_of_kind(EdgeKind::Calls) {
                    let (Some(from), Some(to)) =
                        (doc.get_node(&edge.source_id), doc.get_node(&edge.target_id))
                    else {
                        continue;
                    };
                    if from.fqn == fqn {
                        out.push(to.fqn.clone());
                    }
                }
            }
        }
        Ok(out)
    }

    async fn get_dependencies(&self, module: &str) -> Result<Vec<String>> {
        let repos = self.repos.read().await;
        for state in repos.values() {
            let deps = state.build.dependency_graph.get_dependencies(module);
            if !deps.is_empty() {
                return Ok(deps);
            }
        }
        Ok(Vec::new())
    }

    async fn get_dependents(&self, module: &str) -> Result<Vec<String>> {
        let repos = self.repos.read().await;
        for state in repos.values() {
            let deps = state.build.dependency_graph.get_dependents(module);
            if !deps.is_empty() {
                return Ok(deps);
            }
        }
        Ok(Vec::new())
    }
}

/// Produce index documents from a snapshot build: one chunk per symbol
/// plus one per file.
fn make_chunks(
    repo_id: &str,
    snapshot_id: &str,
    build: &SnapshotBuild,
    sources: &HashMap<&str, &str>,
    importance: &HashMap<String, f64>,
) -> Vec<IndexDocument> {
    use codeatlas_ir::NodeKind;

    let mut docs = Vec::new();
    for doc in &build.documents {
        let Some(source) = sources.get(doc.file_path.as_str()) else {
            continue;
        };
        let module = codeatlas_ir::features::structural_ir::module_fqn_from_path(&doc.file_path);
        let file_importance = importance.get(&module).copied().unwrap_or(0.0);

        for node in &doc.nodes {
            let (kind, content) = match node.kind {
                NodeKind::File => ("file_segment", source.to_string()),
                NodeKind::Class => ("class", slice_span(source, node.span)),
                NodeKind::Function => ("function", slice_span(source, node.span)),
                NodeKind::Method => ("method", slice_span(source, node.span)),
                _ => continue,
            };
            docs.push(
                IndexDocument::new(
                    format!("{}:{}", doc.file_path, node.fqn),
                    repo_id,
                    snapshot_id,
                    &doc.file_path,
                    content,
                )
                .with_symbol(&node.fqn, kind)
                .with_language(&doc.language)
                .with_importance(file_importance),
            );
        }
    }
    docs
}

fn slice_span(source: &str, span: codeatlas_ir::Span) -> String {
    let start = span.start_line.saturating_sub(1) as usize;
    let end = span.end_line as usize;
    source
        .lines()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::embedding::HashingEmbedder;
    use crate::infrastructure::vector::VectorIndexConfig;

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile {
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    async fn engine_with_repo() -> Arc<Engine> {
        let store = MultiIndexStore::new(
            Arc::new(HashingEmbedder::new(64)),
            VectorIndexConfig::default(),
        );
        let engine = Engine::new(store);
        engine
            .index_repository(
                "repo",
                "main",
                &[
                    file(
                        "app/models.py",
                        "class User:\n    def __init__(self):\n        self.name = \"\"\n",
                    ),
                    file(
                        "app/service.py",
                        "import app.models\n\ndef get_user(user_id):\n    return user_id\n",
                    ),
                ],
            )
            .await
            .unwrap();
        engine
    }

    #[tokio::test]
    async fn test_index_and_search() {
        let engine = engine_with_repo().await;
        let result = engine
            .search("repo", "User class definition", 5, None, false)
            .await
            .unwrap();
        assert!(!result.hits.is_empty());
    }

    #[tokio::test]
    async fn test_graph_port_dependencies() {
        let engine = engine_with_repo().await;
        let deps = engine.get_dependencies("app.service").await.unwrap();
        assert_eq!(deps, vec!["app.models".to_string()]);
        let dependents = engine.get_dependents("app.models").await.unwrap();
        assert_eq!(dependents, vec!["app.service".to_string()]);
    }

    #[tokio::test]
    async fn test_impact_on_unindexed_repo_fails() {
        let store = MultiIndexStore::new(
            Arc::new(HashingEmbedder::new(64)),
            VectorIndexConfig::default(),
        );
        let engine = Engine::new(store);
        assert!(engine.impact("ghost", &["a.py".to_string()]).await.is_err());
    }

    #[tokio::test]
    async fn test_impact_reports_dependents() {
        let engine = engine_with_repo().await;
        let report = engine
            .impact("repo", &["app/models.py".to_string()])
            .await
            .unwrap();
        assert_eq!(report.directly_affected, vec!["app.service".to_string()]);
    }
}
