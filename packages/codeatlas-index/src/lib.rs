/*
 * CodeAtlas Index - multi-index store and hybrid retrieval
 *
 * Four logical indexes (vector, lexical, symbol, graph) keyed by
 * (repo_id, snapshot_id), an intent-aware hybrid retriever fusing them,
 * and the indexing triggers (cold start + watch mode) that keep the
 * store fresh. The `Engine` façade combines the analysis pipeline from
 * codeatlas-ir with this store for CLIs and agents.
 */

pub mod config;
pub mod domain;
pub mod engine;
pub mod infrastructure;
pub mod retriever;
pub mod triggers;

pub use config::EnvConfig;
pub use domain::{
    clamp_search_limit, ContextPort, EmbeddingPort, GraphPort, IndexDocument, IndexingPort,
    LlmPort, OrderedChunk, SearchHit, SearchPort, SearchSource,
};
pub use engine::{Engine, IndexSummary};
pub use infrastructure::{
    HashingEmbedder, LexicalIndex, MultiIndexStore, SymbolIndex, VectorIndex, VectorIndexConfig,
};
pub use retriever::{
    classify_intent, HybridRetriever, IntentKind, LlmReranker, RerankConfig, RetrievalResult,
    SmartInterleaver,
};
pub use triggers::{
    BatchHandler, ColdStartManager, IntelligentDebouncer, RateLimiter, Reindexer, RepoEntry,
    RepoWatcher, WatchConfig,
};
