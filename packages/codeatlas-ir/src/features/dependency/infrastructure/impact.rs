//! Change impact analysis
//!
//! Given a change-set, finds direct and transitive dependents and scores
//! the blast radius:
//!
//! `risk = 0.4·(affected/nodes) + 0.3·min(depth/10, 1) + 0.3·avg_betweenness(changed)`

use std::collections::{BTreeSet, HashMap};

use crate::features::dependency::domain::ImpactReport;
use crate::features::dependency::infrastructure::graph::DependencyGraph;

pub struct ImpactAnalyzer<'a> {
    graph: &'a DependencyGraph,
}

impl<'a> ImpactAnalyzer<'a> {
    pub fn new(graph: &'a DependencyGraph) -> Self {
        Self { graph }
    }

    pub fn analyze(&self, changed_modules: &[String], max_depth: Option<usize>) -> ImpactReport {
        if self.graph.node_count() == 0 {
            return ImpactReport::empty(changed_modules.to_vec());
        }

        let changed: BTreeSet<&String> = changed_modules.iter().collect();
        let mut directly: BTreeSet<String> = BTreeSet::new();
        let mut transitively: BTreeSet<String> = BTreeSet::new();
        let mut deepest = 0usize;

        for module in changed_modules {
            for dependent in self.graph.get_dependents(module) {
                if !changed.contains(&dependent) {
                    directly.insert(dependent);
                }
            }
            for (dependent, depth) in self.graph.transitive_dependents(module, max_depth) {
                if changed.contains(&dependent) {
                    continue;
                }
                deepest = deepest.max(depth);
                if depth >= 2 {
                    transitively.insert(dependent);
                }
            }
        }

        // A module reached directly from one change-set member is direct,
        // not transitive
        for module in &directly {
            transitively.remove(module);
        }

        let risk_score = self.risk_score(changed_modules, directly.len() + transitively.len(), deepest);

        ImpactReport {
            changed_modules: changed_modules.to_vec(),
            directly_affected: directly.into_iter().collect(),
            transitively_affected: transitively.into_iter().collect(),
            max_depth: deepest,
            risk_score,
        }
    }

    fn risk_score(&self, changed: &[String], affected_count: usize, max_depth: usize) -> f64 {
        let total = self.graph.node_count();
        if total == 0 {
            return 0.0;
        }

        let affected_ratio = affected_count as f64 / total as f64;
        let depth_penalty = (max_depth as f64 / 10.0).min(1.0);

        let centrality_score = if self.graph.edge_count() > 0 && !changed.is_empty() {
            let centrality: HashMap<String, f64> = self.graph.betweenness_centrality();
            let sum: f64 = changed
                .iter()
                .map(|m| centrality.get(m).copied().unwrap_or(0.0))
                .sum();
            sum / changed.len() as f64
        } else {
            0.0
        };

        (affected_ratio * 0.4 + depth_penalty * 0.3 + centrality_score * 0.3).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::dependency::domain::{DependencyEdge, DependencyNode};

    fn edge(from: &str, to: &str) -> DependencyEdge {
        DependencyEdge {
            source_module: from.to_string(),
            target_module: to.to_string(),
            import_location: format!("{}.py:1", from),
            relative_depth: None,
        }
    }

    fn build(names: &[&str], edges: Vec<DependencyEdge>) -> DependencyGraph {
        DependencyGraph::build(
            names
                .iter()
                .map(|n| DependencyNode::internal(*n, format!("{}.py", n)))
                .collect(),
            edges,
        )
    }

    #[test]
    fn test_impact_diamond() {
        // A→B, B→C, D→C ; changing C directly affects B and D,
        // transitively affects A, max depth 2.
        let graph = build(
            &["A", "B", "C", "D"],
            vec![edge("A", "B"), edge("B", "C"), edge("D", "C")],
        );
        let report = ImpactAnalyzer::new(&graph).analyze(&["C".to_string()], None);

        assert_eq!(
            report.directly_affected,
            vec!["B".to_string(), "D".to_string()]
        );
        assert_eq!(report.transitively_affected, vec!["A".to_string()]);
        assert_eq!(report.max_depth, 2);
        assert!(report.risk_score > 0.0);
    }

    #[test]
    fn test_empty_graph_zero_risk() {
        let graph = build(&[], vec![]);
        let report = ImpactAnalyzer::new(&graph).analyze(&["X".to_string()], None);
        assert_eq!(report.risk_score, 0.0);
        assert_eq!(report.total_affected(), 0);
    }

    #[test]
    fn test_leaf_module_no_impact() {
        // A→B ; changing A (nothing depends on it) affects nothing
        let graph = build(&["A", "B"], vec![edge("A", "B")]);
        let report = ImpactAnalyzer::new(&graph).analyze(&["A".to_string()], None);
        assert!(report.directly_affected.is_empty());
        assert!(report.transitively_affected.is_empty());
        assert_eq!(report.max_depth, 0);
    }

    #[test]
    fn test_risk_score_bounded() {
        let graph = build(
            &["a", "b", "c", "d"],
            vec![edge("b", "a"), edge("c", "a"), edge("d", "a")],
        );
        let report = ImpactAnalyzer::new(&graph).analyze(&["a".to_string()], None);
        assert!(report.risk_score <= 1.0);
        assert!(report.risk_score > 0.0);
    }

    #[test]
    fn test_changed_modules_excluded_from_affected() {
        let graph = build(&["a", "b"], vec![edge("a", "b"), edge("b", "a")]);
        let report =
            ImpactAnalyzer::new(&graph).analyze(&["a".to_string(), "b".to_string()], None);
        assert!(report.directly_affected.is_empty());
    }
}
