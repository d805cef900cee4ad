//! Intent-aware chunk ordering for context assembly
//!
//! flow_trace orders chunks along a topological walk of the call graph;
//! symbol_nav puts definitions before references; everything else sorts
//! by final score.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::domain::ports::OrderedChunk;
use crate::retriever::intent::IntentKind;
use crate::retriever::interleaver::FusedHit;

pub struct ChunkOrdering {
    /// caller fqn → callee fqns, used for the flow walk
    call_graph: HashMap<String, Vec<String>>,
}

impl Default for ChunkOrdering {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl ChunkOrdering {
    pub fn new(call_graph: HashMap<String, Vec<String>>) -> Self {
        Self { call_graph }
    }

    pub fn order(&self, fused: &[FusedHit], intent: IntentKind) -> Vec<OrderedChunk> {
        match intent {
            IntentKind::FlowTrace => self.order_by_flow(fused),
            IntentKind::SymbolNav => order_definitions_first(fused),
            _ => order_by_score(fused, "score"),
        }
    }

    /// Topological walk of the call graph restricted to returned chunks:
    /// callers come before their callees so the reader follows execution.
    fn order_by_flow(&self, fused: &[FusedHit]) -> Vec<OrderedChunk> {
        let by_fqn: HashMap<&str, &FusedHit> = fused
            .iter()
            .filter_map(|f| f.hit.metadata.get("symbol_fqn").map(|s| (s.as_str(), f)))
            .filter(|(fqn, _)| !fqn.is_empty())
            .collect();

        if by_fqn.is_empty() {
            return order_by_score(fused, "score");
        }

        // In-degrees within the returned subgraph
        let mut in_degree: HashMap<&str, usize> = by_fqn.keys().map(|k| (*k, 0)).collect();
        for (caller, callees) in &self.call_graph {
            if !by_fqn.contains_key(caller.as_str()) {
                continue;
            }
            for callee in callees {
                if let Some(deg) = in_degree.get_mut(callee.as_str()) {
                    *deg += 1;
                }
            }
        }

        let mut queue: VecDeque<&str> = {
            let mut roots: Vec<&str> = in_degree
                .iter()
                .filter(|(_, &d)| d == 0)
                .map(|(k, _)| *k)
                .collect();
            roots.sort_unstable();
            roots.into_iter().collect()
        };

        let mut ordered = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        while let Some(fqn) = queue.pop_front() {
            if !visited.insert(fqn) {
                continue;
            }
            if let Some(f) = by_fqn.get(fqn) {
                ordered.push(to_ordered(f, "flow_topological"));
            }
            if let Some(callees) = self.call_graph.get(fqn) {
                for callee in callees {
                    if let Some(deg) = in_degree.get_mut(callee.as_str()) {
                        *deg = deg.saturating_sub(1);
                        if *deg == 0 {
                            queue.push_back(callee.as_str());
                        }
                    }
                }
            }
        }

        // Chunks outside the walk (cycles, no symbol) follow by score
        let placed: HashSet<&str> = ordered.iter().map(|c| c.chunk_id.as_str()).collect();
        let mut rest: Vec<&FusedHit> = fused
            .iter()
            .filter(|f| !placed.contains(f.hit.chunk_id.as_str()))
            .collect();
        rest.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ordered.extend(rest.into_iter().map(|f| to_ordered(f, "flow_residual")));
        ordered
    }
}

/// Definitions first (classes, then functions), references after, both
/// score-sorted within their group.
fn order_definitions_first(fused: &[FusedHit]) -> Vec<OrderedChunk> {
    let is_definition = |f: &FusedHit| {
        matches!(
            f.hit.metadata.get("kind").map(String::as_str),
            Some("class") | Some("function") | Some("method")
        )
    };

    let mut definitions: Vec<&FusedHit> = fused.iter().filter(|f| is_definition(f)).collect();
    let mut references: Vec<&FusedHit> = fused.iter().filter(|f| !is_definition(f)).collect();

    let by_score = |a: &&FusedHit, b: &&FusedHit| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    };
    definitions.sort_by(by_score);
    references.sort_by(by_score);

    definitions
        .into_iter()
        .map(|f| to_ordered(f, "definition"))
        .chain(references.into_iter().map(|f| to_ordered(f, "reference")))
        .collect()
}

fn order_by_score(fused: &[FusedHit], reason: &str) -> Vec<OrderedChunk> {
    let mut sorted: Vec<&FusedHit> = fused.iter().collect();
    sorted.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.into_iter().map(|f| to_ordered(f, reason)).collect()
}

fn to_ordered(f: &FusedHit, reason: &str) -> OrderedChunk {
    OrderedChunk {
        chunk_id: f.hit.chunk_id.clone(),
        content: f
            .hit
            .metadata
            .get("content_preview")
            .cloned()
            .unwrap_or_default(),
        score: f.final_score,
        order_reason: reason.to_string(),
    }
}

/// ContextPort implementation: orders hits for a token budget, assuming
/// roughly four characters per token for the cutoff.
pub struct ContextAssembler {
    ordering: ChunkOrdering,
}

impl ContextAssembler {
    pub fn new(call_graph: HashMap<String, Vec<String>>) -> Self {
        Self {
            ordering: ChunkOrdering::new(call_graph),
        }
    }
}

#[async_trait::async_trait]
impl crate::domain::ports::ContextPort for ContextAssembler {
    async fn assemble_context(
        &self,
        hits: &[crate::domain::document::SearchHit],
        intent: &str,
        token_budget: usize,
    ) -> codeatlas_ir::Result<Vec<OrderedChunk>> {
        let intent = IntentKind::parse(intent).unwrap_or(IntentKind::Balanced);
        let fused: Vec<FusedHit> = hits
            .iter()
            .map(|hit| FusedHit {
                hit: hit.clone(),
                final_score: hit.score,
                strategy_count: 1,
                strategies: vec![hit.source],
            })
            .collect();

        let ordered = self.ordering.order(&fused, intent);
        let char_budget = token_budget.saturating_mul(4);
        let mut used = 0usize;
        let mut out = Vec::new();
        for chunk in ordered {
            let cost = chunk.content.len().max(1);
            if used + cost > char_budget && !out.is_empty() {
                break;
            }
            used += cost;
            out.push(chunk);
        }
        Ok(out)
    }
}
