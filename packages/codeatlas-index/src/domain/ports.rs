//! External ports consumed by the core
//!
//! Everything above the engine (CLIs, agents, frontends) talks through
//! these async traits; everything below (embedding providers, LLMs)
//! plugs in behind them.

use async_trait::async_trait;
use codeatlas_ir::Result;

use crate::domain::document::{IndexDocument, SearchHit};

/// Write side of the multi-index store
#[async_trait]
pub trait IndexingPort: Send + Sync {
    async fn index(&self, repo_id: &str, snapshot_id: &str, docs: &[IndexDocument]) -> Result<()>;

    async fn upsert(&self, repo_id: &str, snapshot_id: &str, docs: &[IndexDocument]) -> Result<()>;

    async fn delete(&self, repo_id: &str, snapshot_id: &str, ids: &[String]) -> Result<()>;
}

/// Read side of the multi-index store
#[async_trait]
pub trait SearchPort: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn search(
        &self,
        repo_id: &str,
        snapshot_id: &str,
        query: &str,
        limit: usize,
        chunk_ids: Option<&[String]>,
        include_inactive: bool,
    ) -> Result<Vec<SearchHit>>;
}

/// Call/dependency graph navigation
#[async_trait]
pub trait GraphPort: Send + Sync {
    async fn get_callers(&self, fqn: &str) -> Result<Vec<String>>;
    async fn get_callees(&self, fqn: &str) -> Result<Vec<String>>;
    async fn get_dependencies(&self, module: &str) -> Result<Vec<String>>;
    async fn get_dependents(&self, module: &str) -> Result<Vec<String>>;
}

/// One ordered chunk handed to a context assembler
#[derive(Debug, Clone)]
pub struct OrderedChunk {
    pub chunk_id: String,
    pub content: String,
    pub score: f64,
    pub order_reason: String,
}

/// Context assembly for downstream consumers
#[async_trait]
pub trait ContextPort: Send + Sync {
    async fn assemble_context(
        &self,
        hits: &[SearchHit],
        intent: &str,
        token_budget: usize,
    ) -> Result<Vec<OrderedChunk>>;
}

/// Optional LLM provider (reranking, intent assistance)
#[async_trait]
pub trait LlmPort: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: usize, temperature: f64) -> Result<String>;
}

/// Embedding provider behind the vector index
#[async_trait]
pub trait EmbeddingPort: Send + Sync {
    /// Embedding dimension
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
