//! Taint tracing over the unified graph
//!
//! Multi-source BFS from every node tagged `is_source` to any `is_sink`,
//! with an optional label filter. Parent pointers keep the front linear
//! in the visited subgraph; output is capped by `max_paths` and the
//! wall-clock deadline.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::features::query_engine::domain::{EdgeKindSet, PathResult};
use crate::features::query_engine::infrastructure::unified_graph::UnifiedGraph;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaintConfig {
    /// Only trace sources/sinks carrying this label (e.g. "PII")
    pub label: Option<String>,
    pub via: EdgeKindSet,
    pub max_depth: usize,
    pub max_paths: usize,
    pub timeout_ms: u64,
}

impl Default for TaintConfig {
    fn default() -> Self {
        Self {
            label: None,
            via: EdgeKindSet::data_flow(),
            max_depth: 50,
            max_paths: 100,
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaintTraceResult {
    pub paths: Vec<PathResult>,
    pub truncated: bool,
}

pub struct TaintTracer<'a> {
    graph: &'a UnifiedGraph,
}

impl<'a> TaintTracer<'a> {
    pub fn new(graph: &'a UnifiedGraph) -> Self {
        Self { graph }
    }

    pub fn trace(&self, config: &TaintConfig) -> TaintTraceResult {
        let started = Instant::now();
        let label = config.label.as_deref();

        let sources: Vec<String> = self
            .graph
            .sources(label)
            .into_iter()
            .map(|n| n.id.clone())
            .collect();
        let sink_ids: Vec<String> = self
            .graph
            .sinks(label)
            .into_iter()
            .map(|n| n.id.clone())
            .collect();

        if sources.is_empty() || sink_ids.is_empty() {
            return TaintTraceResult {
                paths: Vec::new(),
                truncated: false,
            };
        }

        // Multi-source BFS with parent pointers: each node is visited
        // once, so the front is O(V+E)
        let mut parent: HashMap<String, Option<String>> = HashMap::new();
        let mut depth: HashMap<String, usize> = HashMap::new();
        let mut queue = VecDeque::new();
        for source in &sources {
            if self.graph.get_node(source).is_some() && !parent.contains_key(source) {
                parent.insert(source.clone(), None);
                depth.insert(source.clone(), 0);
                queue.push_back(source.clone());
            }
        }

        let mut paths = Vec::new();
        let mut truncated = false;

        while let Some(current) = queue.pop_front() {
            if paths.len() >= config.max_paths {
                break;
            }
            if started.elapsed().as_millis() > config.timeout_ms as u128 {
                truncated = true;
                break;
            }

            let current_depth = depth[&current];

            if sink_ids.contains(&current) && current_depth > 0 {
                paths.push(PathResult {
                    node_ids: reconstruct(&parent, &current),
                });
                if paths.len() >= config.max_paths {
                    break;
                }
            }

            if current_depth >= config.max_depth {
                continue;
            }

            for edge in self.graph.edges_from(&current) {
                if !config.via.contains(edge.kind) {
                    continue;
                }
                if !parent.contains_key(&edge.target) {
                    parent.insert(edge.target.clone(), Some(current.clone()));
                    depth.insert(edge.target.clone(), current_depth + 1);
                    queue.push_back(edge.target.clone());
                }
            }
        }

        TaintTraceResult { paths, truncated }
    }
}

fn reconstruct(parent: &HashMap<String, Option<String>>, sink: &str) -> Vec<String> {
    let mut path = vec![sink.to_string()];
    let mut current = sink.to_string();
    while let Some(Some(prev)) = parent.get(&current) {
        path.push(prev.clone());
        current = prev.clone();
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::query_engine::domain::QueryEdgeKind;
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

    #[test]
    fn test_taint_reaches_sink() {
        let mut graph = UnifiedGraph::new();
        graph.add_node(var("f::input", "input"));
        graph.add_node(var("f::query", "query"));
        graph.add_edge("f::input", "f::query", QueryEdgeKind::Dfg);
        graph.tag_source("f::input", "PII");
        graph.tag_sink("f::query", "PII");

        let result = TaintTracer::new(&graph).trace(&TaintConfig::default());
        assert_eq!(result.paths.len(), 1);
        assert_eq!(result.paths[0].node_ids, vec!["f::input", "f::query"]);
    }

    #[test]
    fn test_label_filter_excludes_other_labels() {
        let mut graph = UnifiedGraph::new();
        graph.add_node(var("f::a", "a"));
        graph.add_node(var("f::b", "b"));
        graph.add_edge("f::a", "f::b", QueryEdgeKind::Dfg);
        graph.tag_source("f::a", "SECRET");
        graph.tag_sink("f::b", "SECRET");

        let config = TaintConfig {
            label: Some("PII".to_string()),
            ..Default::default()
        };
        let result = TaintTracer::new(&graph).trace(&config);
        assert!(result.paths.is_empty());
    }

    #[test]
    fn test_field_sensitive_no_path_between_sibling_fields() {
        // user.id = input() ; query = f"...{user.name}..."
        // source on user.id, sink on query: zero paths.
        let mut graph = UnifiedGraph::new();
        graph.add_node(var("f::user.id", "user.id"));
        graph.add_node(var("f::user.name", "user.name"));
        graph.add_node(var("f::query", "query"));
        graph.add_edge("f::user.name", "f::query", QueryEdgeKind::Field);
        graph.tag_source("f::user.id", "PII");
        graph.tag_sink("f::query", "PII");

        let result = TaintTracer::new(&graph).trace(&TaintConfig::default());
        assert!(result.paths.is_empty());
    }

    #[test]
    fn test_recursive_cycle_terminates() {
        let mut graph = UnifiedGraph::new();
        graph.add_node(var("f::a", "a"));
        graph.add_node(var("f::b", "b"));
        graph.add_node(var("f::sink", "sink"));
        graph.add_edge("f::a", "f::b", QueryEdgeKind::InterProc);
        graph.add_edge("f::b", "f::a", QueryEdgeKind::InterProc);
        graph.add_edge("f::b", "f::sink", QueryEdgeKind::Dfg);
        graph.tag_source("f::a", "PII");
        graph.tag_sink("f::sink", "PII");

        let config = TaintConfig {
            max_depth: 5,
            max_paths: 3,
            ..Default::default()
        };
        let result = TaintTracer::new(&graph).trace(&config);
        assert_eq!(result.paths.len(), 1);
        assert!(!result.truncated);
    }

    #[test]
    fn test_no_sources_no_paths() {
        let mut graph = UnifiedGraph::new();
        graph.add_node(var("f::x", "x"));
        graph.tag_sink("f::x", "PII");
        let result = TaintTracer::new(&graph).trace(&TaintConfig::default());
        assert!(result.paths.is_empty());
        assert!(!result.truncated);
    }
}
