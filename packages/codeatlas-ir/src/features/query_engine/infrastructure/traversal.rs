//! Path enumeration over the unified graph
//!
//! BFS with a cycle-free visited set per path (not global), so a node can
//! be re-entered through different predecessors. Inter-procedural edges
//! are ordinary edges; recursion is bounded only by depth and path caps.
//! On deadline expiry the partial result is returned with a truncation
//! flag.

use std::collections::VecDeque;
use std::time::Instant;

use crate::features::query_engine::domain::{PathQuery, PathResult, QueryOutcome};
use crate::features::query_engine::infrastructure::unified_graph::UnifiedGraph;

pub struct QueryEvaluator<'a> {
    graph: &'a UnifiedGraph,
}

impl<'a> QueryEvaluator<'a> {
    pub fn new(graph: &'a UnifiedGraph) -> Self {
        Self { graph }
    }

    /// Enumerate paths for a query.
    pub fn evaluate(&self, query: &PathQuery) -> QueryOutcome {
        let sources: Vec<String> = match &query.source_id {
            Some(id) => vec![id.clone()],
            None => self
                .graph
                .select(&query.source)
                .map(str::to_string)
                .collect(),
        };
        let sinks: Vec<String> = match &query.sink_id {
            Some(id) => vec![id.clone()],
            None => self.graph.select(&query.sink).map(str::to_string).collect(),
        };

        self.find_paths(&sources, &sinks, query)
    }

    pub fn find_paths(
        &self,
        sources: &[String],
        sinks: &[String],
        query: &PathQuery,
    ) -> QueryOutcome {
        let started = Instant::now();
        let mut paths = Vec::new();
        let mut truncated = false;

        // (current node, path so far); the path doubles as the per-path
        // visited set
        let mut queue: VecDeque<(String, Vec<String>)> = VecDeque::new();
        for source in sources {
            if self.graph.get_node(source).is_some() {
                queue.push_back((source.clone(), vec![source.clone()]));
            }
        }

        while let Some((current, path)) = queue.pop_front() {
            if paths.len() >= query.limit_paths {
                break;
            }
            if started.elapsed().as_millis() > query.timeout_ms as u128 {
                truncated = true;
                break;
            }

            if sinks.contains(&current) && path.len() > 1 {
                paths.push(PathResult {
                    node_ids: path.clone(),
                });
                if paths.len() >= query.limit_paths {
                    break;
                }
            }

            if path.len() > query.max_depth {
                continue;
            }

            for edge in self.graph.edges_from(&current) {
                if !query.via.contains(edge.kind) {
                    continue;
                }
                // Cycle-free per path only: other paths may revisit
                if path.contains(&edge.target) {
                    continue;
                }
                let mut next_path = path.clone();
                next_path.push(edge.target.clone());
                queue.push_back((edge.target.clone(), next_path));
            }
        }

        QueryOutcome { paths, truncated }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::query_engine::domain::{EdgeKindSet, NodeSelector, QueryEdgeKind};
    use crate::features::query_engine::infrastructure::unified_graph::{
        UnifiedNode, UnifiedNodeKind,
    };
    use std::collections::HashSet;

    fn var(id: &str, name: &str) -> UnifiedNode {
        UnifiedNode {
            id: id.to_string(),
            name: name.to_string(),
            kind: UnifiedNodeKind::Variable,
            source_labels: HashSet::new(),
            sink_labels: HashSet::new(),
        }
    }

    fn chain_graph() -> UnifiedGraph {
        let mut graph = UnifiedGraph::new();
        for (id, name) in [("f::a", "a"), ("f::b", "b"), ("f::c", "c")] {
            graph.add_node(var(id, name));
        }
        graph.add_edge("f::a", "f::b", QueryEdgeKind::Dfg);
        graph.add_edge("f::b", "f::c", QueryEdgeKind::Dfg);
        graph
    }

    #[test]
    fn test_simple_path() {
        let graph = chain_graph();
        let outcome = QueryEvaluator::new(&graph)
            .evaluate(&(NodeSelector::var("a") >> NodeSelector::var("c")));
        assert_eq!(outcome.paths.len(), 1);
        assert_eq!(
            outcome.paths[0].node_ids,
            vec!["f::a".to_string(), "f::b".to_string(), "f::c".to_string()]
        );
        assert!(!outcome.truncated);
    }

    #[test]
    fn test_depth_limit_blocks_long_paths() {
        let graph = chain_graph();
        let query = (NodeSelector::var("a") >> NodeSelector::var("c")).depth(1);
        let outcome = QueryEvaluator::new(&graph).evaluate(&query);
        assert!(outcome.paths.is_empty());
    }

    #[test]
    fn test_via_filters_edge_kinds() {
        let mut graph = chain_graph();
        graph.add_node(var("f::d", "d"));
        graph.add_edge("f::c", "f::d", QueryEdgeKind::Cfg);

        let query = (NodeSelector::var("a") >> NodeSelector::var("d"))
            .via(EdgeKindSet::of(QueryEdgeKind::Dfg));
        let outcome = QueryEvaluator::new(&graph).evaluate(&query);
        assert!(outcome.paths.is_empty());

        let query = (NodeSelector::var("a") >> NodeSelector::var("d"))
            .via(QueryEdgeKind::Dfg | QueryEdgeKind::Cfg);
        let outcome = QueryEvaluator::new(&graph).evaluate(&query);
        assert_eq!(outcome.paths.len(), 1);
    }

    #[test]
    fn test_cycle_terminates_via_per_path_visited() {
        let mut graph = UnifiedGraph::new();
        graph.add_node(var("f::a", "a"));
        graph.add_node(var("f::b", "b"));
        graph.add_edge("f::a", "f::b", QueryEdgeKind::Dfg);
        graph.add_edge("f::b", "f::a", QueryEdgeKind::Dfg);

        let outcome = QueryEvaluator::new(&graph)
            .evaluate(&(NodeSelector::var("a") >> NodeSelector::var("b")));
        assert_eq!(outcome.paths.len(), 1);
        assert!(!outcome.truncated);
    }

    #[test]
    fn test_reentry_through_different_predecessor() {
        // a → m, b → m, m → z : both a→m→z and (from source b) b→m→z
        // exist; the shared node m is revisited across paths.
        let mut graph = UnifiedGraph::new();
        for (id, name) in [("s::a", "a"), ("s::b", "b"), ("s::m", "m"), ("s::z", "z")] {
            graph.add_node(var(id, name));
        }
        graph.add_edge("s::a", "s::m", QueryEdgeKind::Dfg);
        graph.add_edge("s::b", "s::m", QueryEdgeKind::Dfg);
        graph.add_edge("s::m", "s::z", QueryEdgeKind::Dfg);

        let evaluator = QueryEvaluator::new(&graph);
        let outcome = evaluator.find_paths(
            &["s::a".to_string(), "s::b".to_string()],
            &["s::z".to_string()],
            &(NodeSelector::any_var() >> NodeSelector::var("z")),
        );
        assert_eq!(outcome.paths.len(), 2);
    }

    #[test]
    fn test_limit_paths_cap() {
        let mut graph = UnifiedGraph::new();
        // Fan: a → {m1..m4} → z, four distinct paths
        graph.add_node(var("f::a", "a"));
        graph.add_node(var("f::z", "z"));
        for i in 0..4 {
            let id = format!("f::m{}", i);
            graph.add_node(var(&id, &format!("m{}", i)));
            graph.add_edge("f::a", &id, QueryEdgeKind::Dfg);
            graph.add_edge(&id, "f::z", QueryEdgeKind::Dfg);
        }

        let query = (NodeSelector::var("a") >> NodeSelector::var("z")).limit_paths(2);
        let outcome = QueryEvaluator::new(&graph).evaluate(&query);
        assert_eq!(outcome.paths.len(), 2);
    }

    #[test]
    fn test_pinned_source_and_sink_ids() {
        let graph = chain_graph();
        let query = (NodeSelector::any_var() >> NodeSelector::any_var())
            .source_id("f::a")
            .sink_id("f::b");
        let outcome = QueryEvaluator::new(&graph).evaluate(&query);
        assert_eq!(outcome.paths.len(), 1);
        assert_eq!(outcome.paths[0].node_ids, vec!["f::a", "f::b"]);
    }
}
