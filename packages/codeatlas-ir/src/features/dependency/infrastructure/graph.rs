//! Module dependency graph (L5)
//!
//! Directed petgraph over resolved imports. Tarjan SCC for cycle
//! detection, Kahn layering with a trailing cyclic layer, PageRank file
//! importance, and Brandes betweenness centrality for impact scoring.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::features::dependency::domain::{DependencyEdge, DependencyNode};

/// PageRank configuration
#[derive(Debug, Clone)]
pub struct PageRankConfig {
    pub damping: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

/// Module dependency graph: A → B means A imports B.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    module_to_node: HashMap<String, NodeIndex>,
    nodes: HashMap<String, DependencyNode>,
    edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    /// Build from resolved nodes and edges. Self-loops are dropped.
    pub fn build(nodes: Vec<DependencyNode>, edges: Vec<DependencyEdge>) -> Self {
        let mut graph = DiGraph::new();
        let mut module_to_node = HashMap::new();
        let mut node_map = HashMap::new();

        for node in nodes {
            let idx = graph.add_node(node.module_path.clone());
            module_to_node.insert(node.module_path.clone(), idx);
            node_map.insert(node.module_path.clone(), node);
        }

        for edge in &edges {
            if edge.source_module == edge.target_module {
                continue;
            }
            if let (Some(&from), Some(&to)) = (
                module_to_node.get(&edge.source_module),
                module_to_node.get(&edge.target_module),
            ) {
                if graph.find_edge(from, to).is_none() {
                    graph.add_edge(from, to, ());
                }
            }
        }

        Self {
            graph,
            module_to_node,
            nodes: node_map,
            edges,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn get_node(&self, module: &str) -> Option<&DependencyNode> {
        self.nodes.get(module)
    }

    pub fn internal_modules(&self) -> Vec<String> {
        self.nodes
            .values()
            .filter(|n| n.is_internal())
            .map(|n| n.module_path.clone())
            .collect()
    }

    pub fn raw_edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Modules this module imports
    pub fn get_dependencies(&self, module: &str) -> Vec<String> {
        self.neighbors(module, Direction::Outgoing)
    }

    /// Modules importing this module
    pub fn get_dependents(&self, module: &str) -> Vec<String> {
        self.neighbors(module, Direction::Incoming)
    }

    fn neighbors(&self, module: &str, direction: Direction) -> Vec<String> {
        match self.module_to_node.get(module) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, direction)
                .map(|n| self.graph[n].clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Transitive dependents with per-module depth (BFS over incoming
    /// edges). `max_depth` of None is unlimited.
    pub fn transitive_dependents(
        &self,
        module: &str,
        max_depth: Option<usize>,
    ) -> HashMap<String, usize> {
        self.transitive(module, Direction::Incoming, max_depth)
    }

    pub fn transitive_dependencies(
        &self,
        module: &str,
        max_depth: Option<usize>,
    ) -> HashMap<String, usize> {
        self.transitive(module, Direction::Outgoing, max_depth)
    }

    fn transitive(
        &self,
        module: &str,
        direction: Direction,
        max_depth: Option<usize>,
    ) -> HashMap<String, usize> {
        let mut visited: HashMap<String, usize> = HashMap::new();
        let Some(&start) = self.module_to_node.get(module) else {
            return visited;
        };

        let mut queue = VecDeque::new();
        queue.push_back((start, 0usize));

        while let Some((idx, depth)) = queue.pop_front() {
            if let Some(cap) = max_depth {
                if depth >= cap {
                    continue;
                }
            }
            for neighbor in self.graph.neighbors_directed(idx, direction) {
                let name = self.graph[neighbor].clone();
                if name == module {
                    continue;
                }
                if !visited.contains_key(&name) {
                    visited.insert(name, depth + 1);
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }
        visited
    }

    /// Strongly connected components of size > 1 over the internal
    /// subgraph (every such SCC is an import cycle).
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        let internal: HashSet<&str> = self
            .nodes
            .values()
            .filter(|n| n.is_internal())
            .map(|n| n.module_path.as_str())
            .collect();

        tarjan_scc(&self.graph)
            .into_iter()
            .map(|scc| {
                scc.into_iter()
                    .map(|idx| self.graph[idx].clone())
                    .filter(|m| internal.contains(m.as_str()))
                    .collect::<Vec<_>>()
            })
            .filter(|scc| scc.len() > 1)
            .collect()
    }

    /// Kahn topological layering over the internal subgraph. Layer 0 has
    /// no dependencies; modules stuck in cycles land in a trailing layer.
    ///
    /// Returns (layers, cyclic_trailing_layer_index).
    pub fn dependency_layers(&self) -> (Vec<Vec<String>>, Option<usize>) {
        let internal: HashSet<String> = self.internal_modules().into_iter().collect();

        let mut in_degree: HashMap<String, usize> = HashMap::new();
        for module in &internal {
            let deps = self.get_dependencies(module);
            let count = deps.iter().filter(|d| internal.contains(*d)).count();
            in_degree.insert(module.clone(), count);
        }

        let mut layers: Vec<Vec<String>> = Vec::new();
        let mut remaining: HashSet<String> = internal.clone();
        let mut cyclic_layer = None;

        while !remaining.is_empty() {
            let mut current: Vec<String> = remaining
                .iter()
                .filter(|m| in_degree.get(*m).copied().unwrap_or(0) == 0)
                .cloned()
                .collect();
            current.sort();

            if current.is_empty() {
                // Cycle prevents further layering; dump the rest
                let mut rest: Vec<String> = remaining.iter().cloned().collect();
                rest.sort();
                cyclic_layer = Some(layers.len());
                layers.push(rest);
                break;
            }

            for module in &current {
                remaining.remove(module);
                for dependent in self.get_dependents(module) {
                    if remaining.contains(&dependent) {
                        if let Some(deg) = in_degree.get_mut(&dependent) {
                            *deg = deg.saturating_sub(1);
                        }
                    }
                }
            }
            layers.push(current);
        }

        (layers, cyclic_layer)
    }

    /// PageRank importance with dangling-node redistribution.
    pub fn compute_pagerank(&self, config: Option<PageRankConfig>) -> HashMap<String, f64> {
        let config = config.unwrap_or_default();
        let n = self.graph.node_count();
        if n == 0 {
            return HashMap::new();
        }
        let nf = n as f64;

        let mut scores: HashMap<NodeIndex, f64> = self
            .graph
            .node_indices()
            .map(|idx| (idx, 1.0 / nf))
            .collect();

        let out_degrees: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                (
                    idx,
                    self.graph
                        .neighbors_directed(idx, Direction::Outgoing)
                        .count(),
                )
            })
            .collect();

        for _ in 0..config.max_iterations {
            let dangling_sum: f64 = self
                .graph
                .node_indices()
                .filter(|idx| out_degrees[idx] == 0)
                .map(|idx| scores[&idx])
                .sum();

            let mut new_scores = HashMap::new();
            let mut max_diff: f64 = 0.0;

            for idx in self.graph.node_indices() {
                let mut score = (1.0 - config.damping) / nf + config.damping * dangling_sum / nf;
                for incoming in self.graph.neighbors_directed(idx, Direction::Incoming) {
                    let out = out_degrees[&incoming] as f64;
                    if out > 0.0 {
                        score += config.damping * scores[&incoming] / out;
                    }
                }
                max_diff = max_diff.max((score - scores[&idx]).abs());
                new_scores.insert(idx, score);
            }

            scores = new_scores;
            if max_diff < config.tolerance {
                break;
            }
        }

        scores
            .into_iter()
            .map(|(idx, score)| (self.graph[idx].clone(), score))
            .collect()
    }

    /// Brandes betweenness centrality (unweighted, normalized). Graphs
    /// with no edges score 0 for every node.
    pub fn betweenness_centrality(&self) -> HashMap<String, f64> {
        let n = self.graph.node_count();
        let mut centrality: HashMap<NodeIndex, f64> =
            self.graph.node_indices().map(|i| (i, 0.0)).collect();

        if self.graph.edge_count() == 0 || n < 3 {
            return centrality
                .into_iter()
                .map(|(idx, c)| (self.graph[idx].clone(), c))
                .collect();
        }

        for s in self.graph.node_indices() {
            let mut stack = Vec::new();
            let mut predecessors: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
            let mut sigma: HashMap<NodeIndex, f64> = HashMap::new();
            let mut dist: HashMap<NodeIndex, i64> = HashMap::new();
            sigma.insert(s, 1.0);
            dist.insert(s, 0);

            let mut queue = VecDeque::new();
            queue.push_back(s);
            while let Some(v) = queue.pop_front() {
                stack.push(v);
                let dv = dist[&v];
                for w in self.graph.neighbors_directed(v, Direction::Outgoing) {
                    if !dist.contains_key(&w) {
                        dist.insert(w, dv + 1);
                        queue.push_back(w);
                    }
                    if dist[&w] == dv + 1 {
                        let sv = sigma[&v];
                        *sigma.entry(w).or_insert(0.0) += sv;
                        predecessors.entry(w).or_default().push(v);
                    }
                }
            }

            let mut delta: HashMap<NodeIndex, f64> = HashMap::new();
            while let Some(w) = stack.pop() {
                let dw = delta.get(&w).copied().unwrap_or(0.0);
                if let Some(preds) = predecessors.get(&w) {
                    for &v in preds {
                        let share = sigma[&v] / sigma[&w] * (1.0 + dw);
                        *delta.entry(v).or_insert(0.0) += share;
                    }
                }
                if w != s {
                    *centrality.get_mut(&w).unwrap() += dw;
                }
            }
        }

        // Normalize for directed graphs
        let scale = 1.0 / ((n as f64 - 1.0) * (n as f64 - 2.0));
        centrality
            .into_iter()
            .map(|(idx, c)| (self.graph[idx].clone(), c * scale))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::dependency::domain::DependencyNodeKind;

    fn edge(from: &str, to: &str) -> DependencyEdge {
        DependencyEdge {
            source_module: from.to_string(),
            target_module: to.to_string(),
            import_location: format!("{}.py:1", from),
            relative_depth: None,
        }
    }

    fn internal(name: &str) -> DependencyNode {
        DependencyNode::internal(name, format!("{}.py", name))
    }

    fn build(names: &[&str], edges: Vec<DependencyEdge>) -> DependencyGraph {
        DependencyGraph::build(names.iter().map(|n| internal(n)).collect(), edges)
    }

    #[test]
    fn test_empty_graph() {
        let graph = DependencyGraph::build(vec![], vec![]);
        assert_eq!(graph.node_count(), 0);
        assert!(graph.detect_cycles().is_empty());
        assert!(graph.compute_pagerank(None).is_empty());
    }

    #[test]
    fn test_dependencies_and_dependents() {
        let graph = build(&["a", "b"], vec![edge("a", "b")]);
        assert_eq!(graph.get_dependencies("a"), vec!["b".to_string()]);
        assert_eq!(graph.get_dependents("b"), vec!["a".to_string()]);
    }

    #[test]
    fn test_three_module_cycle() {
        // a imports b, b imports c, c imports a
        let graph = build(
            &["a", "b", "c"],
            vec![edge("a", "b"), edge("b", "c"), edge("c", "a")],
        );
        let cycles = graph.detect_cycles();
        assert_eq!(cycles.len(), 1);
        let cycle: HashSet<_> = cycles[0].iter().cloned().collect();
        assert_eq!(
            cycle,
            ["a", "b", "c"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[test]
    fn test_cycles_exclude_external_modules() {
        let mut nodes: Vec<DependencyNode> = ["a", "b"].iter().map(|n| internal(n)).collect();
        nodes.push(DependencyNode::external(
            "numpy",
            DependencyNodeKind::ExternalPackage,
        ));
        let graph = DependencyGraph::build(
            nodes,
            vec![edge("a", "b"), edge("b", "a"), edge("a", "numpy")],
        );
        let cycles = graph.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 2);
    }

    #[test]
    fn test_layers_simple_chain() {
        // a → b → c : c is layer 0, b layer 1, a layer 2
        let graph = build(&["a", "b", "c"], vec![edge("a", "b"), edge("b", "c")]);
        let (layers, cyclic) = graph.dependency_layers();
        assert!(cyclic.is_none());
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0], vec!["c".to_string()]);
        assert_eq!(layers[1], vec!["b".to_string()]);
        assert_eq!(layers[2], vec!["a".to_string()]);
    }

    #[test]
    fn test_layers_cyclic_trailing_layer() {
        let graph = build(
            &["a", "b", "base"],
            vec![edge("a", "b"), edge("b", "a"), edge("a", "base")],
        );
        let (layers, cyclic) = graph.dependency_layers();
        assert_eq!(layers[0], vec!["base".to_string()]);
        let idx = cyclic.expect("cyclic trailing layer");
        assert_eq!(idx, 1);
        assert_eq!(layers[idx].len(), 2);
    }

    #[test]
    fn test_transitive_dependents_with_depth() {
        // a → b → c ; dependents of c: b at depth 1, a at depth 2
        let graph = build(&["a", "b", "c"], vec![edge("a", "b"), edge("b", "c")]);
        let deps = graph.transitive_dependents("c", None);
        assert_eq!(deps.get("b"), Some(&1));
        assert_eq!(deps.get("a"), Some(&2));

        let capped = graph.transitive_dependents("c", Some(1));
        assert_eq!(capped.len(), 1);
        assert!(capped.contains_key("b"));
    }

    #[test]
    fn test_pagerank_hub_scores_highest() {
        let graph = build(
            &["a", "b", "hub"],
            vec![edge("a", "hub"), edge("b", "hub")],
        );
        let scores = graph.compute_pagerank(None);
        assert!(scores["hub"] > scores["a"]);
        assert!(scores["hub"] > scores["b"]);
        let total: f64 = scores.values().sum();
        assert!((total - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_pagerank_deterministic() {
        let graph = build(
            &["a", "b", "c"],
            vec![edge("a", "b"), edge("b", "c"), edge("c", "a")],
        );
        let first = graph.compute_pagerank(None);
        let second = graph.compute_pagerank(None);
        for (k, v) in &first {
            assert!((v - second[k]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_betweenness_zero_for_edgeless_graph() {
        let graph = build(&["a", "b"], vec![]);
        let centrality = graph.betweenness_centrality();
        assert!(centrality.values().all(|&c| c == 0.0));
    }

    #[test]
    fn test_betweenness_middle_of_chain_highest() {
        let graph = build(&["a", "b", "c"], vec![edge("a", "b"), edge("b", "c")]);
        let centrality = graph.betweenness_centrality();
        assert!(centrality["b"] > centrality["a"]);
        assert!(centrality["b"] > centrality["c"]);
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let graph = build(&["a", "b"], vec![edge("a", "b"), edge("a", "b")]);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_self_loop_dropped() {
        let graph = build(&["a"], vec![edge("a", "a")]);
        assert_eq!(graph.edge_count(), 0);
    }
}
