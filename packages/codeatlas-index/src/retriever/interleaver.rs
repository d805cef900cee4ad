//! Smart interleaving of multi-index results
//!
//! Scores are min-max normalized within each index's result set, then
//! fused with intent-specific weights, a reciprocal rank decay of
//! `1/(1 + 0.1·rank)`, and a consensus boost of
//! `1 + 0.2·(strategies − 1)` for chunks several indexes agree on.
//! Fusion is rank-based, so it is invariant under monotonic rescaling of
//! any per-index score stream.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::document::{SearchHit, SearchSource};
use crate::retriever::intent::IntentKind;

const RANK_DECAY: f64 = 0.1;
const CONSENSUS_BOOST: f64 = 0.2;

/// Per-index weights for one intent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterleavingWeights {
    pub vector: f64,
    pub lexical: f64,
    pub symbol: f64,
    pub graph: f64,
}

impl InterleavingWeights {
    pub fn for_intent(intent: IntentKind) -> Self {
        match intent {
            IntentKind::SymbolNav => Self {
                vector: 0.2,
                lexical: 0.2,
                symbol: 0.5,
                graph: 0.1,
            },
            IntentKind::CodeSearch => Self {
                vector: 0.5,
                lexical: 0.3,
                symbol: 0.1,
                graph: 0.1,
            },
            IntentKind::FlowTrace => Self {
                vector: 0.2,
                lexical: 0.1,
                symbol: 0.2,
                graph: 0.5,
            },
            IntentKind::ConceptSearch => Self {
                vector: 0.7,
                lexical: 0.2,
                symbol: 0.05,
                graph: 0.05,
            },
            IntentKind::Balanced => Self {
                vector: 0.4,
                lexical: 0.3,
                symbol: 0.2,
                graph: 0.1,
            },
        }
    }

    fn for_source(&self, source: SearchSource) -> f64 {
        match source {
            SearchSource::Vector => self.vector,
            SearchSource::Lexical => self.lexical,
            SearchSource::Symbol => self.symbol,
            SearchSource::Graph => self.graph,
        }
    }
}

/// A fused result with its fusion metadata
#[derive(Debug, Clone)]
pub struct FusedHit {
    pub hit: SearchHit,
    pub final_score: f64,
    pub strategy_count: usize,
    pub strategies: Vec<SearchSource>,
}

pub struct SmartInterleaver {
    weights: InterleavingWeights,
}

impl SmartInterleaver {
    pub fn new(weights: InterleavingWeights) -> Self {
        Self { weights }
    }

    pub fn for_intent(intent: IntentKind) -> Self {
        Self::new(InterleavingWeights::for_intent(intent))
    }

    /// Fuse per-index result lists into one ranked list.
    pub fn interleave(&self, per_index: Vec<Vec<SearchHit>>, top_k: usize) -> Vec<FusedHit> {
        struct Appearance {
            source: SearchSource,
            normalized: f64,
            rank: usize,
        }

        let mut appearances: HashMap<String, Vec<Appearance>> = HashMap::new();
        let mut first_hit: HashMap<String, SearchHit> = HashMap::new();

        for hits in per_index {
            let normalized = normalize_scores(&hits);
            for (rank, (hit, score)) in hits.into_iter().zip(normalized).enumerate() {
                appearances
                    .entry(hit.chunk_id.clone())
                    .or_default()
                    .push(Appearance {
                        source: hit.source,
                        normalized: score,
                        rank,
                    });
                first_hit.entry(hit.chunk_id.clone()).or_insert(hit);
            }
        }

        let mut fused: Vec<FusedHit> = appearances
            .into_iter()
            .map(|(chunk_id, appearances)| {
                let mut score = 0.0;
                for a in &appearances {
                    let weight = self.weights.for_source(a.source);
                    let rank_decay = 1.0 / (1.0 + a.rank as f64 * RANK_DECAY);
                    score += weight * a.normalized * rank_decay;
                }
                if appearances.len() > 1 {
                    score *= 1.0 + CONSENSUS_BOOST * (appearances.len() as f64 - 1.0);
                }
                let strategies: Vec<SearchSource> =
                    appearances.iter().map(|a| a.source).collect();
                FusedHit {
                    hit: first_hit.remove(&chunk_id).expect("hit recorded"),
                    final_score: score,
                    strategy_count: appearances.len(),
                    strategies,
                }
            })
            .collect();

        fused.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.hit.chunk_id.cmp(&b.hit.chunk_id))
        });
        fused.truncate(top_k);

        debug!(results = fused.len(), "interleaving_completed");
        fused
    }
}

/// Round-robin baseline interleaver (kept for A/B comparisons).
pub struct RoundRobinInterleaver;

impl RoundRobinInterleaver {
    pub fn interleave(per_index: Vec<Vec<SearchHit>>, top_k: usize) -> Vec<SearchHit> {
        let mut pointers = vec![0usize; per_index.len()];
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        let total: usize = per_index.iter().map(Vec::len).sum();

        let mut strategy = 0usize;
        for _ in 0..total * per_index.len().max(1) {
            if out.len() >= top_k || out.len() >= total {
                break;
            }
            if per_index.is_empty() {
                break;
            }
            let list = &per_index[strategy];
            let pointer = &mut pointers[strategy];
            if *pointer < list.len() {
                let hit = &list[*pointer];
                *pointer += 1;
                if seen.insert(hit.chunk_id.clone()) {
                    out.push(hit.clone());
                }
            }
            strategy = (strategy + 1) % per_index.len();
        }
        out
    }
}

/// Min-max normalize a result set to [0, 1]; uniform sets become 0.5.
fn normalize_scores(hits: &[SearchHit]) -> Vec<f64> {
    if hits.is_empty() {
        return Vec::new();
    }
    let min = hits.iter().map(|h| h.score).fold(f64::INFINITY, f64::min);
    let max = hits
        .iter()
        .map(|h| h.score)
        .fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < 1e-6 {
        return vec![0.5; hits.len()];
    }
    hits.iter()
        .map(|h| (h.score - min) / (max - min))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f64, source: SearchSource) -> SearchHit {
        SearchHit::new(id, score, source)
    }

    #[test]
    fn test_consensus_boost_promotes_agreement() {
        let interleaver = SmartInterleaver::for_intent(IntentKind::Balanced);
        let fused = interleaver.interleave(
            vec![
                vec![
                    hit("shared", 0.9, SearchSource::Vector),
                    hit("vector_only", 1.0, SearchSource::Vector),
                ],
                vec![hit("shared", 5.0, SearchSource::Lexical)],
                vec![hit("shared", 1.0, SearchSource::Symbol)],
            ],
            10,
        );

        let shared = fused.iter().find(|f| f.hit.chunk_id == "shared").unwrap();
        let solo = fused
            .iter()
            .find(|f| f.hit.chunk_id == "vector_only")
            .unwrap();
        assert_eq!(shared.strategy_count, 3);
        assert!(shared.final_score > solo.final_score);
    }

    #[test]
    fn test_invariant_under_monotonic_rescaling() {
        let interleaver = SmartInterleaver::for_intent(IntentKind::Balanced);
        let base = vec![
            vec![
                hit("a", 0.9, SearchSource::Vector),
                hit("b", 0.5, SearchSource::Vector),
                hit("c", 0.1, SearchSource::Vector),
            ],
            vec![
                hit("b", 12.0, SearchSource::Lexical),
                hit("a", 4.0, SearchSource::Lexical),
            ],
        ];
        // Rescale the lexical stream by 100x + 7 (monotonic)
        let rescaled = vec![
            base[0].clone(),
            vec![
                hit("b", 1207.0, SearchSource::Lexical),
                hit("a", 407.0, SearchSource::Lexical),
            ],
        ];

        let order =
            |fused: Vec<FusedHit>| -> Vec<String> { fused.into_iter().map(|f| f.hit.chunk_id).collect() };
        assert_eq!(
            order(interleaver.interleave(base, 10)),
            order(interleaver.interleave(rescaled, 10))
        );
    }

    #[test]
    fn test_symbol_nav_weights_put_definition_first() {
        // Scenario: query "User class definition" with mixed results; the
        // class definition chunk must outrank method chunks with the same
        // symbol name.
        let interleaver = SmartInterleaver::for_intent(IntentKind::SymbolNav);
        let fused = interleaver.interleave(
            vec![
                // vector finds both, slightly preferring the method body
                vec![
                    hit("method_chunk", 0.82, SearchSource::Vector),
                    hit("class_def_chunk", 0.80, SearchSource::Vector),
                ],
                // lexical splits similarly
                vec![
                    hit("method_chunk", 7.0, SearchSource::Lexical),
                    hit("class_def_chunk", 6.5, SearchSource::Lexical),
                ],
                // the symbol index is authoritative for definitions
                vec![hit("class_def_chunk", 1.0, SearchSource::Symbol)],
            ],
            3,
        );

        assert_eq!(fused[0].hit.chunk_id, "class_def_chunk");
        let method = fused
            .iter()
            .find(|f| f.hit.chunk_id == "method_chunk")
            .unwrap();
        assert!(fused[0].final_score > method.final_score);
    }

    #[test]
    fn test_rank_decay_prefers_earlier_results() {
        let interleaver = SmartInterleaver::for_intent(IntentKind::Balanced);
        // Same normalized score, different ranks
        let fused = interleaver.interleave(
            vec![vec![
                hit("first", 1.0, SearchSource::Vector),
                hit("mid", 1.0, SearchSource::Vector),
                hit("last", 1.0, SearchSource::Vector),
            ]],
            10,
        );
        // Uniform scores normalize to 0.5 each; decay orders by rank
        assert_eq!(fused[0].hit.chunk_id, "first");
        assert_eq!(fused[2].hit.chunk_id, "last");
    }

    #[test]
    fn test_round_robin_alternates() {
        let out = RoundRobinInterleaver::interleave(
            vec![
                vec![hit("a1", 1.0, SearchSource::Vector), hit("a2", 0.9, SearchSource::Vector)],
                vec![hit("b1", 1.0, SearchSource::Lexical)],
            ],
            10,
        );
        let ids: Vec<&str> = out.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "b1", "a2"]);
    }

    #[test]
    fn test_empty_input() {
        let interleaver = SmartInterleaver::for_intent(IntentKind::Balanced);
        assert!(interleaver.interleave(vec![], 10).is_empty());
        assert!(RoundRobinInterleaver::interleave(vec![], 10).is_empty());
    }
}
