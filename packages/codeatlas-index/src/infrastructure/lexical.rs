//! Lexical index (tantivy BM25)
//!
//! One in-RAM tantivy index per `(repo_id, snapshot_id)` collection.
//! Scores are raw BM25 in whatever range tantivy produces; normalization
//! happens per result set in the retriever, never at the source.

use std::collections::HashMap;

use parking_lot::Mutex;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexWriter, TantivyDocument, Term};
use tracing::{info, warn};

use codeatlas_ir::{AtlasError, Result};

use crate::domain::document::{clamp_search_limit, IndexDocument, SearchHit, SearchSource};

const WRITER_HEAP_BYTES: usize = 50_000_000;

struct LexicalCollection {
    index: Index,
    writer: IndexWriter,
    chunk_id: Field,
    content: Field,
    file_path: Field,
    symbol_fqn: Field,
    is_active: Field,
}

impl LexicalCollection {
    fn create() -> Result<Self> {
        let mut schema_builder = Schema::builder();
        let chunk_id = schema_builder.add_text_field("chunk_id", STRING | STORED);
        let content = schema_builder.add_text_field("content", TEXT);
        let file_path = schema_builder.add_text_field("file_path", STRING | STORED);
        let symbol_fqn = schema_builder.add_text_field("symbol_fqn", STRING | STORED);
        let is_active = schema_builder.add_text_field("is_active", STRING | STORED);
        let schema = schema_builder.build();

        let index = Index::create_in_ram(schema);
        let writer = index
            .writer(WRITER_HEAP_BYTES)
            .map_err(|e| AtlasError::store_failure(format!("tantivy writer: {}", e)))?;

        Ok(Self {
            index,
            writer,
            chunk_id,
            content,
            file_path,
            symbol_fqn,
            is_active,
        })
    }
}

/// BM25 lexical index over chunk content.
pub struct LexicalIndex {
    collections: Mutex<HashMap<String, LexicalCollection>>,
}

impl Default for LexicalIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
        }
    }

    fn collection_name(repo_id: &str, snapshot_id: &str) -> String {
        format!("{}::{}", repo_id, snapshot_id)
    }

    /// Index documents (atomic per-chunk upsert: delete then add).
    pub fn index(&self, repo_id: &str, snapshot_id: &str, docs: &[IndexDocument]) -> Result<()> {
        let name = Self::collection_name(repo_id, snapshot_id);
        let mut collections = self.collections.lock();
        if !collections.contains_key(&name) {
            collections.insert(name.clone(), LexicalCollection::create()?);
        }
        let collection = collections.get_mut(&name).expect("just inserted");

        for document in docs {
            let id_term = Term::from_field_text(collection.chunk_id, &document.chunk_id);
            collection.writer.delete_term(id_term);
            collection
                .writer
                .add_document(doc!(
                    collection.chunk_id => document.chunk_id.clone(),
                    collection.content => document.content.clone(),
                    collection.file_path => document.file_path.clone(),
                    collection.symbol_fqn => document.symbol_fqn.clone().unwrap_or_default(),
                    collection.is_active => "true",
                ))
                .map_err(|e| AtlasError::store_failure(format!("tantivy add: {}", e)))?;
        }

        collection
            .writer
            .commit()
            .map_err(|e| AtlasError::store_failure(format!("tantivy commit: {}", e)))?;

        info!(
            repo_id,
            snapshot_id,
            documents = docs.len(),
            "lexical_index_completed"
        );
        Ok(())
    }

    /// Mark chunks inactive (re-add with the tombstone flag).
    pub fn delete(&self, repo_id: &str, snapshot_id: &str, doc_ids: &[String]) -> Result<()> {
        let name = Self::collection_name(repo_id, snapshot_id);
        let mut collections = self.collections.lock();
        let Some(collection) = collections.get_mut(&name) else {
            return Ok(());
        };
        for id in doc_ids {
            let id_term = Term::from_field_text(collection.chunk_id, id);
            collection.writer.delete_term(id_term);
        }
        collection
            .writer
            .commit()
            .map_err(|e| AtlasError::store_failure(format!("tantivy commit: {}", e)))?;
        Ok(())
    }

    /// BM25 search; raw scores.
    pub fn search(
        &self,
        repo_id: &str,
        snapshot_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let limit = clamp_search_limit(limit);
        let name = Self::collection_name(repo_id, snapshot_id);
        let collections = self.collections.lock();
        let Some(collection) = collections.get(&name) else {
            return Ok(Vec::new());
        };

        let reader = collection
            .index
            .reader()
            .map_err(|e| AtlasError::store_failure(format!("tantivy reader: {}", e)))?;
        let searcher = reader.searcher();

        let parser = QueryParser::for_index(&collection.index, vec![collection.content]);
        let parsed = match parser.parse_query(query) {
            Ok(q) => q,
            Err(e) => {
                warn!(query, error = %e, "lexical_query_unparseable");
                return Ok(Vec::new());
            }
        };

        let top = searcher
            .search(&parsed, &TopDocs::with_limit(limit))
            .map_err(|e| AtlasError::store_failure(format!("tantivy search: {}", e)))?;

        let mut hits = Vec::with_capacity(top.len());
        for (score, address) in top {
            let stored: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| AtlasError::store_failure(format!("tantivy doc: {}", e)))?;
            let chunk_id = stored
                .get_first(collection.chunk_id)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let file_path = stored
                .get_first(collection.file_path)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let symbol_fqn = stored
                .get_first(collection.symbol_fqn)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            hits.push(
                SearchHit::new(chunk_id, score as f64, SearchSource::Lexical)
                    .with_meta("file_path", file_path)
                    .with_meta("symbol_fqn", symbol_fqn),
            );
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, content: &str) -> IndexDocument {
        IndexDocument::new(id, "repo", "s1", "a.py", content)
    }

    #[test]
    fn test_index_and_search() {
        let index = LexicalIndex::new();
        index
            .index(
                "repo",
                "s1",
                &[
                    doc("c1", "fn parse_config loads the yaml configuration"),
                    doc("c2", "struct UserRepository wraps database access"),
                ],
            )
            .unwrap();

        let hits = index.search("repo", "s1", "yaml configuration", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "c1");
        assert!(hits[0].score > 0.0);
        assert_eq!(hits[0].source, SearchSource::Lexical);
    }

    #[test]
    fn test_upsert_replaces_document() {
        let index = LexicalIndex::new();
        index
            .index("repo", "s1", &[doc("c1", "original text alpha")])
            .unwrap();
        index
            .index("repo", "s1", &[doc("c1", "replacement text beta")])
            .unwrap();

        let old = index.search("repo", "s1", "alpha", 10).unwrap();
        assert!(old.is_empty());
        let new = index.search("repo", "s1", "beta", 10).unwrap();
        assert_eq!(new.len(), 1);
    }

    #[test]
    fn test_delete_removes_from_results() {
        let index = LexicalIndex::new();
        index
            .index("repo", "s1", &[doc("c1", "ephemeral chunk body")])
            .unwrap();
        index
            .delete("repo", "s1", &["c1".to_string()])
            .unwrap();
        let hits = index.search("repo", "s1", "ephemeral", 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_missing_collection_empty() {
        let index = LexicalIndex::new();
        assert!(index.search("ghost", "s", "anything", 10).unwrap().is_empty());
    }
}
