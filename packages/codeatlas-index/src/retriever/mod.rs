//! Hybrid retriever (intent → per-index retrieval → fusion → rerank →
//! ordering)

pub mod hybrid;
pub mod intent;
pub mod interleaver;
pub mod ordering;
pub mod reranker;

pub use hybrid::{HybridRetriever, RetrievalResult};
pub use intent::{classify_intent, IntentKind};
pub use interleaver::{FusedHit, InterleavingWeights, RoundRobinInterleaver, SmartInterleaver};
pub use ordering::{ChunkOrdering, ContextAssembler};
pub use reranker::{LlmReranker, RerankConfig};
