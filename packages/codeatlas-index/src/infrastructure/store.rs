//! Multi-index store façade
//!
//! Routes writes to all four indexes and exposes the combined read
//! surface. Writers are serialized per collection by each index's own
//! locking; readers never see a partially committed snapshot because a
//! snapshot's documents land before its id is announced to readers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use codeatlas_ir::Result;

use crate::domain::document::{IndexDocument, SearchHit};
use crate::domain::ports::{EmbeddingPort, IndexingPort, SearchPort};
use crate::infrastructure::graph_index::GraphIndex;
use crate::infrastructure::lexical::LexicalIndex;
use crate::infrastructure::symbol::SymbolIndex;
use crate::infrastructure::vector::{VectorIndex, VectorIndexConfig};

pub struct MultiIndexStore {
    pub vector: Arc<VectorIndex>,
    pub lexical: Arc<LexicalIndex>,
    pub symbol: Arc<SymbolIndex>,
    pub graph: Arc<GraphIndex>,
}

impl MultiIndexStore {
    pub fn new(embedder: Arc<dyn EmbeddingPort>, vector_config: VectorIndexConfig) -> Arc<Self> {
        Arc::new(Self {
            vector: VectorIndex::new(embedder, vector_config),
            lexical: Arc::new(LexicalIndex::new()),
            symbol: Arc::new(SymbolIndex::new()),
            graph: Arc::new(GraphIndex::new()),
        })
    }

    /// Count probe for the cold start trigger: a repository snapshot is
    /// considered indexed when any active points exist.
    pub async fn is_indexed(&self, repo_id: &str, snapshot_id: &str) -> bool {
        self.vector.count(repo_id, snapshot_id).await > 0
    }

    /// Register graph edges for reachability scoring.
    pub fn add_graph_edges(&self, repo_id: &str, snapshot_id: &str, edges: &[(String, String)]) {
        self.graph.add_edges(repo_id, snapshot_id, edges);
    }

    /// Size of the vector deletion queue (tests and health probes).
    pub async fn deletion_queue_size(&self) -> usize {
        self.vector.deletion_queue_size().await
    }

    /// Search every index and return the concatenated raw hits; fusion is
    /// the retriever's job.
    #[allow(clippy::too_many_arguments)]
    pub async fn search_all(
        &self,
        repo_id: &str,
        snapshot_id: &str,
        query: &str,
        limit_per_index: usize,
        include_inactive: bool,
    ) -> Result<PerIndexHits> {
        let vector = self
            .vector
            .search(repo_id, snapshot_id, query, limit_per_index, None, include_inactive)
            .await
            .unwrap_or_else(|e| {
                error!(error = %e, "vector_search_failed");
                Vec::new()
            });
        let lexical = self
            .lexical
            .search(repo_id, snapshot_id, query, limit_per_index)
            .unwrap_or_else(|e| {
                error!(error = %e, "lexical_search_failed");
                Vec::new()
            });
        let symbol = self
            .symbol
            .search(repo_id, snapshot_id, query, limit_per_index, include_inactive);
        let graph = self
            .graph
            .search(repo_id, snapshot_id, query, limit_per_index, include_inactive);

        Ok(PerIndexHits {
            vector,
            lexical,
            symbol,
            graph,
        })
    }
}

/// Raw per-index result sets, pre-fusion.
#[derive(Debug, Default)]
pub struct PerIndexHits {
    pub vector: Vec<SearchHit>,
    pub lexical: Vec<SearchHit>,
    pub symbol: Vec<SearchHit>,
    pub graph: Vec<SearchHit>,
}

#[async_trait]
impl IndexingPort for MultiIndexStore {
    async fn index(&self, repo_id: &str, snapshot_id: &str, docs: &[IndexDocument]) -> Result<()> {
        self.vector.index(repo_id, snapshot_id, docs).await?;
        self.lexical.index(repo_id, snapshot_id, docs)?;
        self.symbol.index(repo_id, snapshot_id, docs);
        self.graph.index(repo_id, snapshot_id, docs);
        info!(repo_id, snapshot_id, documents = docs.len(), "store_index_committed");
        Ok(())
    }

    async fn upsert(&self, repo_id: &str, snapshot_id: &str, docs: &[IndexDocument]) -> Result<()> {
        self.index(repo_id, snapshot_id, docs).await
    }

    async fn delete(&self, repo_id: &str, snapshot_id: &str, ids: &[String]) -> Result<()> {
        self.vector.delete(repo_id, snapshot_id, ids).await?;
        self.lexical.delete(repo_id, snapshot_id, ids)?;
        self.symbol.delete(repo_id, snapshot_id, ids);
        self.graph.delete(repo_id, snapshot_id, ids);
        Ok(())
    }
}

#[async_trait]
impl SearchPort for MultiIndexStore {
    async fn search(
        &self,
        repo_id: &str,
        snapshot_id: &str,
        query: &str,
        limit: usize,
        chunk_ids: Option<&[String]>,
        include_inactive: bool,
    ) -> Result<Vec<SearchHit>> {
        // Port-level search: vector similarity with the store's filters
        self.vector
            .search(repo_id, snapshot_id, query, limit, chunk_ids, include_inactive)
            .await
    }
}
