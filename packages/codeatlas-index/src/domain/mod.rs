//! Domain models and ports

pub mod document;
pub mod ports;

pub use document::{clamp_search_limit, IndexDocument, SearchHit, SearchSource};
pub use ports::{
    ContextPort, EmbeddingPort, GraphPort, IndexingPort, LlmPort, OrderedChunk, SearchPort,
};
