//! Symbol index (exact FQN lookup)
//!
//! Hits are binary-like: an exact FQN match scores 1.0, a trailing-path
//! match slightly less.

use dashmap::DashMap;

use crate::domain::document::{clamp_search_limit, IndexDocument, SearchHit, SearchSource};

#[derive(Debug, Clone)]
struct SymbolEntry {
    chunk_id: String,
    fqn: String,
    kind: String,
    file_path: String,
    is_active: bool,
}

/// Exact symbol lookup per collection.
#[derive(Default)]
pub struct SymbolIndex {
    /// collection → fqn → entry
    collections: DashMap<String, DashMap<String, SymbolEntry>>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection_name(repo_id: &str, snapshot_id: &str) -> String {
        format!("{}::{}", repo_id, snapshot_id)
    }

    pub fn index(&self, repo_id: &str, snapshot_id: &str, docs: &[IndexDocument]) {
        let name = Self::collection_name(repo_id, snapshot_id);
        let collection = self.collections.entry(name).or_default();
        for doc in docs {
            let Some(fqn) = &doc.symbol_fqn else {
                continue;
            };
            collection.insert(
                fqn.clone(),
                SymbolEntry {
                    chunk_id: doc.chunk_id.clone(),
                    fqn: fqn.clone(),
                    kind: doc.kind.clone(),
                    file_path: doc.file_path.clone(),
                    is_active: true,
                },
            );
        }
    }

    pub fn delete(&self, repo_id: &str, snapshot_id: &str, doc_ids: &[String]) {
        let name = Self::collection_name(repo_id, snapshot_id);
        let Some(collection) = self.collections.get(&name) else {
            return;
        };
        for mut entry in collection.iter_mut() {
            if doc_ids.contains(&entry.chunk_id) {
                entry.is_active = false;
            }
        }
    }

    /// Lookup by symbol name or FQN. Exact FQN scores 1.0; a match on the
    /// trailing path (`Service.run` for `app.svc.Service.run`) scores 0.9.
    pub fn search(
        &self,
        repo_id: &str,
        snapshot_id: &str,
        query: &str,
        limit: usize,
        include_inactive: bool,
    ) -> Vec<SearchHit> {
        let limit = clamp_search_limit(limit);
        let name = Self::collection_name(repo_id, snapshot_id);
        let Some(collection) = self.collections.get(&name) else {
            return Vec::new();
        };

        // Symbol-ish tokens from the query (identifiers with dots)
        let tokens: Vec<String> = query
            .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        let mut hits = Vec::new();
        for entry in collection.iter() {
            if !include_inactive && !entry.is_active {
                continue;
            }
            let mut best: Option<f64> = None;
            for token in &tokens {
                let score = if &entry.fqn == token {
                    Some(1.0)
                } else if entry.fqn.ends_with(&format!(".{}", token)) {
                    Some(0.9)
                } else {
                    None
                };
                if let Some(s) = score {
                    best = Some(best.map_or(s, |b: f64| b.max(s)));
                }
            }
            if let Some(score) = best {
                hits.push(
                    SearchHit::new(&entry.chunk_id, score, SearchSource::Symbol)
                        .with_meta("symbol_fqn", &entry.fqn)
                        .with_meta("kind", &entry.kind)
                        .with_meta("file_path", &entry.file_path),
                );
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(limit);
        hits
    }
}
