//! Hybrid retriever (L7)
//!
//! classify intent → per-index top-k → normalize + fuse → optional LLM
//! rerank → intent-aware ordering for context assembly.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use codeatlas_ir::Result;

use crate::domain::document::clamp_search_limit;
use crate::domain::ports::OrderedChunk;
use crate::infrastructure::store::MultiIndexStore;
use crate::retriever::intent::{classify_intent, IntentKind};
use crate::retriever::interleaver::{FusedHit, SmartInterleaver};
use crate::retriever::ordering::ChunkOrdering;
use crate::retriever::reranker::LlmReranker;

const DEFAULT_TOP_K_PER_INDEX: usize = 10;

pub struct HybridRetriever {
    store: Arc<MultiIndexStore>,
    reranker: Option<LlmReranker>,
    ordering: ChunkOrdering,
}

pub struct RetrievalResult {
    pub intent: IntentKind,
    pub hits: Vec<FusedHit>,
    pub ordered: Vec<OrderedChunk>,
}

impl HybridRetriever {
    pub fn new(store: Arc<MultiIndexStore>) -> Self {
        Self {
            store,
            reranker: None,
            ordering: ChunkOrdering::default(),
        }
    }

    pub fn with_reranker(mut self, reranker: LlmReranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_call_graph(mut self, call_graph: HashMap<String, Vec<String>>) -> Self {
        self.ordering = ChunkOrdering::new(call_graph);
        self
    }

    /// End-to-end retrieval for one query.
    pub async fn retrieve(
        &self,
        repo_id: &str,
        snapshot_id: &str,
        query: &str,
        top_k: usize,
        intent_override: Option<IntentKind>,
        include_inactive: bool,
    ) -> Result<RetrievalResult> {
        let top_k = clamp_search_limit(top_k);
        let intent = intent_override.unwrap_or_else(|| classify_intent(query));

        let per_index = self
            .store
            .search_all(
                repo_id,
                snapshot_id,
                query,
                DEFAULT_TOP_K_PER_INDEX.max(top_k),
                include_inactive,
            )
            .await?;

        let interleaver = SmartInterleaver::for_intent(intent);
        let mut fused = interleaver.interleave(
            vec![
                per_index.vector,
                per_index.lexical,
                per_index.symbol,
                per_index.graph,
            ],
            top_k,
        );

        if let Some(reranker) = &self.reranker {
            fused = reranker.rerank(query, fused).await;
        }

        let ordered = self.ordering.order(&fused, intent);

        info!(
            repo_id,
            snapshot_id,
            intent = intent.as_str(),
            results = fused.len(),
            "hybrid_retrieval_completed"
        );

        Ok(RetrievalResult {
            intent,
            hits: fused,
            ordered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::IndexDocument;
    use crate::domain::ports::IndexingPort;
    use crate::infrastructure::embedding::HashingEmbedder;
    use crate::infrastructure::vector::VectorIndexConfig;

    async fn seeded_store() -> Arc<MultiIndexStore> {
        let store = MultiIndexStore::new(
            Arc::new(HashingEmbedder::new(64)),
            VectorIndexConfig::default(),
        );
        store
            .index(
                "repo",
                "s1",
                &[
                    IndexDocument::new(
                        "class_def",
                        "repo",
                        "s1",
                        "app/models.py",
                        "class User: fields id name email",
                    )
                    .with_symbol("app.models.User", "class"),
                    IndexDocument::new(
                        "method_chunk",
                        "repo",
                        "s1",
                        "app/service.py",
                        "def get_user(self): query the User by id",
                    )
                    .with_symbol("app.service.Service.get_user", "method"),
                    IndexDocument::new(
                        "helper",
                        "repo",
                        "s1",
                        "app/util.py",
                        "def unrelated_helper(): misc work",
                    )
                    .with_symbol("app.util.unrelated_helper", "function"),
                ],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_symbol_nav_class_definition_ranks_first() {
        // "User class definition": the class definition chunk must sit at
        // rank 1, strictly above method chunks sharing the symbol name.
        let store = seeded_store().await;
        let retriever = HybridRetriever::new(store);
        let result = retriever
            .retrieve("repo", "s1", "User class definition", 3, None, false)
            .await
            .unwrap();

        assert_eq!(result.intent, IntentKind::SymbolNav);
        assert!(!result.hits.is_empty());
        assert_eq!(result.hits[0].hit.chunk_id, "class_def");
        if let Some(method) = result
            .hits
            .iter()
            .find(|h| h.hit.chunk_id == "method_chunk")
        {
            assert!(result.hits[0].final_score > method.final_score);
        }
    }

    #[tokio::test]
    async fn test_intent_override() {
        let store = seeded_store().await;
        let retriever = HybridRetriever::new(store);
        let result = retriever
            .retrieve(
                "repo",
                "s1",
                "User",
                5,
                Some(IntentKind::ConceptSearch),
                false,
            )
            .await
            .unwrap();
        assert_eq!(result.intent, IntentKind::ConceptSearch);
    }

    #[tokio::test]
    async fn test_empty_store_returns_empty() {
        let store = MultiIndexStore::new(
            Arc::new(HashingEmbedder::new(64)),
            VectorIndexConfig::default(),
        );
        let retriever = HybridRetriever::new(store);
        let result = retriever
            .retrieve("ghost", "s1", "anything", 5, None, false)
            .await
            .unwrap();
        assert!(result.hits.is_empty());
        assert!(result.ordered.is_empty());
    }
}
