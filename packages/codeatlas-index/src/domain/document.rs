//! Index documents and search hits
//!
//! The unit of persisted content is the chunk: a symbol, block, or file
//! segment. Search hits point back at chunks with a source-tagged score.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A chunk of content to index, keyed by `(repo_id, snapshot_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub chunk_id: String,
    pub repo_id: String,
    pub snapshot_id: String,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_fqn: Option<String>,
    /// Chunk kind: function, class, method, file_segment, ...
    pub kind: String,
    pub language: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
    pub importance_score: f64,
}

impl IndexDocument {
    pub fn new(
        chunk_id: impl Into<String>,
        repo_id: impl Into<String>,
        snapshot_id: impl Into<String>,
        file_path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            repo_id: repo_id.into(),
            snapshot_id: snapshot_id.into(),
            file_path: file_path.into(),
            symbol_fqn: None,
            kind: "file_segment".to_string(),
            language: "unknown".to_string(),
            content: content.into(),
            tags: HashMap::new(),
            importance_score: 0.0,
        }
    }

    pub fn with_symbol(mut self, fqn: impl Into<String>, kind: impl Into<String>) -> Self {
        self.symbol_fqn = Some(fqn.into());
        self.kind = kind.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_importance(mut self, score: f64) -> Self {
        self.importance_score = score;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Stored preview: the first 500 bytes of content.
    pub fn content_preview(&self) -> &str {
        let end = self
            .content
            .char_indices()
            .take_while(|(i, _)| *i < 500)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        &self.content[..end]
    }
}

/// Which index produced a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    Vector,
    Lexical,
    Symbol,
    Graph,
}

impl SearchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchSource::Vector => "vector",
            SearchSource::Lexical => "lexical",
            SearchSource::Symbol => "symbol",
            SearchSource::Graph => "graph",
        }
    }
}

/// One search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub score: f64,
    pub source: SearchSource,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl SearchHit {
    pub fn new(chunk_id: impl Into<String>, score: f64, source: SearchSource) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            score,
            source,
            metadata: HashMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Clamp a caller-provided limit to 1-1000.
pub fn clamp_search_limit(limit: usize) -> usize {
    limit.clamp(1, 1000)
}
