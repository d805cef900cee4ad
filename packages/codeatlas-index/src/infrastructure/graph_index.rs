//! Graph index
//!
//! Scores chunks by reachability from a seed symbol over the combined
//! dependency + call graph: closer in the graph means higher score, with
//! a per-hop decay.

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::RwLock;

use crate::domain::document::{clamp_search_limit, IndexDocument, SearchHit, SearchSource};

const HOP_DECAY: f64 = 0.5;
const MAX_HOPS: usize = 4;

#[derive(Default)]
struct GraphCollection {
    /// symbol fqn → chunk id
    symbol_to_chunk: HashMap<String, String>,
    /// fqn → neighboring fqns (calls + imports, both directions)
    adjacency: HashMap<String, Vec<String>>,
    inactive: HashSet<String>,
}

/// Reachability-scored index over the dependency and call graph.
#[derive(Default)]
pub struct GraphIndex {
    collections: RwLock<HashMap<String, GraphCollection>>,
}

impl GraphIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection_name(repo_id: &str, snapshot_id: &str) -> String {
        format!("{}::{}", repo_id, snapshot_id)
    }

    /// Register chunks for symbol lookup.
    pub fn index(&self, repo_id: &str, snapshot_id: &str, docs: &[IndexDocument]) {
        let name = Self::collection_name(repo_id, snapshot_id);
        let mut collections = self.collections.write();
        let collection = collections.entry(name).or_default();
        for doc in docs {
            if let Some(fqn) = &doc.symbol_fqn {
                collection
                    .symbol_to_chunk
                    .insert(fqn.clone(), doc.chunk_id.clone());
                collection.inactive.remove(&doc.chunk_id);
            }
        }
    }

    /// Register graph edges (call graph and dependency graph combined).
    /// Edges are bidirectional for reachability scoring.
    pub fn add_edges(&self, repo_id: &str, snapshot_id: &str, edges: &[(String, String)]) {
        let name = Self::collection_name(repo_id, snapshot_id);
        let mut collections = self.collections.write();
        let collection = collections.entry(name).or_default();
        for (from, to) in edges {
            collection
                .adjacency
                .entry(from.clone())
                .or_default()
                .push(to.clone());
            collection
                .adjacency
                .entry(to.clone())
                .or_default()
                .push(from.clone());
        }
    }

    pub fn delete(&self, repo_id: &str, snapshot_id: &str, doc_ids: &[String]) {
        let name = Self::collection_name(repo_id, snapshot_id);
        let mut collections = self.collections.write();
        if let Some(collection) = collections.get_mut(&name) {
            for id in doc_ids {
                collection.inactive.insert(id.clone());
            }
        }
    }

    /// Score chunks reachable from any symbol mentioned in the query.
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
        let collections = self.collections.read();
        let Some(collection) = collections.get(&name) else {
            return Vec::new();
        };

        // Seeds: symbols whose name appears in the query
        let tokens: HashSet<String> = query
            .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        let seeds: Vec<&String> = collection
            .symbol_to_chunk
            .keys()
            .filter(|fqn| {
                let short = fqn.rsplit('.').next().unwrap_or(fqn);
                tokens.contains(*fqn) || tokens.contains(short)
            })
            .collect();
        if seeds.is_empty() {
            return Vec::new();
        }

        // BFS out from the seeds with per-hop decay
        let mut best_score: HashMap<String, f64> = HashMap::new();
        let mut queue = VecDeque::new();
        for seed in seeds {
            best_score.insert(seed.clone(), 1.0);
            queue.push_back((seed.clone(), 0usize));
        }
        while let Some((fqn, hops)) = queue.pop_front() {
            if hops >= MAX_HOPS {
                continue;
            }
            let score = best_score[&fqn] * HOP_DECAY;
            if let Some(neighbors) = collection.adjacency.get(&fqn) {
                for neighbor in neighbors {
                    let entry = best_score.entry(neighbor.clone()).or_insert(0.0);
                    if score > *entry {
                        *entry = score;
                        queue.push_back((neighbor.clone(), hops + 1));
                    }
                }
            }
        }

        let mut hits: Vec<SearchHit> = best_score
            .into_iter()
            .filter_map(|(fqn, score)| {
                let chunk_id = collection.symbol_to_chunk.get(&fqn)?;
                if !include_inactive && collection.inactive.contains(chunk_id) {
                    return None;
                }
                Some(
                    SearchHit::new(chunk_id, score, SearchSource::Graph)
                        .with_meta("symbol_fqn", fqn),
                )
            })
            .collect();

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

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, fqn: &str) -> IndexDocument {
        IndexDocument::new(id, "repo", "s1", "a.py", "body").with_symbol(fqn, "function")
    }

    fn setup() -> GraphIndex {
        let index = GraphIndex::new();
        index.index(
            "repo",
            "s1",
            &[
                doc("c1", "app.fetch"),
                doc("c2", "app.parse"),
                doc("c3", "app.store"),
                doc("c4", "app.unrelated"),
            ],
        );
        index.add_edges(
            "repo",
            "s1",
            &[
                ("app.fetch".to_string(), "app.parse".to_string()),
                ("app.parse".to_string(), "app.store".to_string()),
            ],
        );
        index
    }

    #[test]
    fn test_seed_scores_highest_then_decays() {
        let index = setup();
        let hits = index.search("repo", "s1", "trace flow from fetch", 10, false);
        assert_eq!(hits[0].chunk_id, "c1");
        assert_eq!(hits[0].score, 1.0);

        let parse = hits.iter().find(|h| h.chunk_id == "c2").unwrap();
        let store = hits.iter().find(|h| h.chunk_id == "c3").unwrap();
        assert!(parse.score > store.score);
        assert!(!hits.iter().any(|h| h.chunk_id == "c4"));
    }

    #[test]
    fn test_no_seed_no_hits() {
        let index = setup();
        assert!(index
            .search("repo", "s1", "completely unrelated words", 10, false)
            .is_empty());
    }

    #[test]
    fn test_deleted_chunks_filtered() {
        let index = setup();
        index.delete("repo", "s1", &["c2".to_string()]);
        let hits = index.search("repo", "s1", "fetch", 10, false);
        assert!(!hits.iter().any(|h| h.chunk_id == "c2"));
    }
}
