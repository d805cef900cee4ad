//! Unified query graph
//!
//! One adjacency structure over every IR layer: structural nodes and
//! edges, per-function data flow variables, CFG blocks, and
//! inter-procedural links. Taint tags live here as node metadata.

use std::collections::HashSet;

use ahash::AHashMap;

use crate::features::data_flow::domain::{DataFlowGraph, InterProcEdge};
use crate::features::flow_graph::domain::ControlFlowGraph;
use crate::features::query_engine::domain::{NodeSelector, QueryEdgeKind};
use crate::features::structural_ir::domain::IrDocument;
use crate::shared::models::{EdgeKind, NodeKind};
use crate::features::data_flow::domain::DfgEdgeKind;

/// Kind of a node in the unified graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnifiedNodeKind {
    Ir(NodeKind),
    Variable,
    CfgBlock,
}

/// One node in the unified graph
#[derive(Debug, Clone)]
pub struct UnifiedNode {
    pub id: String,
    pub name: String,
    pub kind: UnifiedNodeKind,
    /// Taint labels when tagged as a source
    pub source_labels: HashSet<String>,
    /// Taint labels when tagged as a sink
    pub sink_labels: HashSet<String>,
}

#[derive(Debug, Clone)]
pub struct UnifiedEdge {
    pub source: String,
    pub target: String,
    pub kind: QueryEdgeKind,
}

/// Unified graph over all IR layers
#[derive(Default)]
pub struct UnifiedGraph {
    nodes: AHashMap<String, UnifiedNode>,
    forward: AHashMap<String, Vec<UnifiedEdge>>,
    backward: AHashMap<String, Vec<UnifiedEdge>>,
    edge_count: usize,
}

impl UnifiedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble the unified graph from every layer's output.
    pub fn build(
        docs: &[IrDocument],
        dfgs: &[DataFlowGraph],
        cfgs: &[ControlFlowGraph],
        inter_proc: &[InterProcEdge],
    ) -> Self {
        let mut graph = Self::new();

        for doc in docs {
            for node in &doc.nodes {
                graph.add_node(UnifiedNode {
                    id: node.id.clone(),
                    name: node.fqn.clone(),
                    kind: UnifiedNodeKind::Ir(node.kind),
                    source_labels: HashSet::new(),
                    sink_labels: HashSet::new(),
                });
            }
            for edge in &doc.edges {
                let kind = match edge.kind {
                    EdgeKind::Calls => QueryEdgeKind::Calls,
                    EdgeKind::Contains => QueryEdgeKind::Contains,
                    EdgeKind::Imports | EdgeKind::Inherits | EdgeKind::Captures => {
                        QueryEdgeKind::Contains
                    }
                    _ => continue,
                };
                graph.add_edge(&edge.source_id, &edge.target_id, kind);
            }
        }

        for dfg in dfgs {
            for var in &dfg.variables {
                graph.add_node(UnifiedNode {
                    id: var.id.clone(),
                    name: var.name.clone(),
                    kind: UnifiedNodeKind::Variable,
                    source_labels: HashSet::new(),
                    sink_labels: HashSet::new(),
                });
            }
            // The synthetic return variable participates in edges
            let ret = DataFlowGraph::return_variable(&dfg.function_fqn);
            graph.add_node(UnifiedNode {
                id: ret,
                name: "<return>".to_string(),
                kind: UnifiedNodeKind::Variable,
                source_labels: HashSet::new(),
                sink_labels: HashSet::new(),
            });
            for edge in &dfg.edges {
                let kind = match edge.kind {
                    DfgEdgeKind::FieldRead | DfgEdgeKind::FieldWrite => QueryEdgeKind::Field,
                    _ => QueryEdgeKind::Dfg,
                };
                graph.ensure_variable(&edge.from_var);
                graph.ensure_variable(&edge.to_var);
                graph.add_edge(&edge.from_var, &edge.to_var, kind);
            }
        }

        for cfg in cfgs {
            for block in &cfg.blocks {
                graph.add_node(UnifiedNode {
                    id: block.id.clone(),
                    name: format!("{}:{}", cfg.function_id, block.kind.as_str()),
                    kind: UnifiedNodeKind::CfgBlock,
                    source_labels: HashSet::new(),
                    sink_labels: HashSet::new(),
                });
            }
            for edge in &cfg.edges {
                graph.add_edge(
                    &edge.source_block_id,
                    &edge.target_block_id,
                    QueryEdgeKind::Cfg,
                );
            }
        }

        for edge in inter_proc {
            graph.ensure_variable(&edge.from_var);
            graph.ensure_variable(&edge.to_var);
            graph.add_edge(&edge.from_var, &edge.to_var, QueryEdgeKind::InterProc);
        }

        graph
    }

    pub fn add_node(&mut self, node: UnifiedNode) {
        self.nodes.entry(node.id.clone()).or_insert(node);
    }

    fn ensure_variable(&mut self, id: &str) {
        if !self.nodes.contains_key(id) {
            let name = id.rsplit("::").next().unwrap_or(id).to_string();
            self.add_node(UnifiedNode {
                id: id.to_string(),
                name,
                kind: UnifiedNodeKind::Variable,
                source_labels: HashSet::new(),
                sink_labels: HashSet::new(),
            });
        }
    }

    pub fn add_edge(&mut self, source: &str, target: &str, kind: QueryEdgeKind) {
        let edge = UnifiedEdge {
            source: source.to_string(),
            target: target.to_string(),
            kind,
        };
        self.forward
            .entry(source.to_string())
            .or_default()
            .push(edge.clone());
        self.backward.entry(target.to_string()).or_default().push(edge);
        self.edge_count += 1;
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn get_node(&self, id: &str) -> Option<&UnifiedNode> {
        self.nodes.get(id)
    }

    pub fn edges_from(&self, id: &str) -> &[UnifiedEdge] {
        self.forward.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edges_to(&self, id: &str) -> &[UnifiedEdge] {
        self.backward.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tag a node as a taint source with a label (e.g. "PII").
    pub fn tag_source(&mut self, id: &str, label: &str) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.source_labels.insert(label.to_string());
        }
    }

    /// Tag a node as a taint sink with a label.
    pub fn tag_sink(&mut self, id: &str, label: &str) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.sink_labels.insert(label.to_string());
        }
    }

    pub fn sources(&self, label: Option<&str>) -> Vec<&UnifiedNode> {
        self.nodes
            .values()
            .filter(|n| match label {
                Some(l) => n.source_labels.contains(l),
                None => !n.source_labels.is_empty(),
            })
            .collect()
    }

    pub fn sinks(&self, label: Option<&str>) -> Vec<&UnifiedNode> {
        self.nodes
            .values()
            .filter(|n| match label {
                Some(l) => n.sink_labels.contains(l),
                None => !n.sink_labels.is_empty(),
            })
            .collect()
    }

    /// Resolve a selector to matching node ids. Wildcards yield a lazy
    /// iterator over every variable node; callers materialize as needed.
    pub fn select<'a>(&'a self, selector: &'a NodeSelector) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        match selector {
            NodeSelector::Var(Some(name)) => Box::new(
                self.nodes
                    .values()
                    .filter(move |n| n.kind == UnifiedNodeKind::Variable && &n.name == name)
                    .map(|n| n.id.as_str()),
            ),
            NodeSelector::Var(None) => Box::new(
                self.nodes
                    .values()
                    .filter(|n| n.kind == UnifiedNodeKind::Variable)
                    .map(|n| n.id.as_str()),
            ),
            NodeSelector::Field(object, field) => {
                let wanted = format!("{}.{}", object, field);
                Box::new(
                    self.nodes
                        .values()
                        .filter(move |n| {
                            n.kind == UnifiedNodeKind::Variable && n.name == wanted
                        })
                        .map(|n| n.id.as_str()),
                )
            }
            NodeSelector::Class(name) => Box::new(
                self.nodes
                    .values()
                    .filter(move |n| {
                        n.kind == UnifiedNodeKind::Ir(NodeKind::Class)
                            && (n.name.ends_with(&format!(".{}", name)) || &n.name == name)
                    })
                    .map(|n| n.id.as_str()),
            ),
            NodeSelector::Function(fqn) => Box::new(
                self.nodes
                    .values()
                    .filter(move |n| {
                        matches!(
                            n.kind,
                            UnifiedNodeKind::Ir(NodeKind::Function)
                                | UnifiedNodeKind::Ir(NodeKind::Method)
                                | UnifiedNodeKind::Ir(NodeKind::Lambda)
                        ) && &n.name == fqn
                    })
                    .map(|n| n.id.as_str()),
            ),
            NodeSelector::Id(id) => Box::new(
                self.nodes
                    .values()
                    .filter(move |n| &n.id == id)
                    .map(|n| n.id.as_str()),
            ),
            NodeSelector::Any => Box::new(self.nodes.values().map(|n| n.id.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var_node(id: &str, name: &str) -> UnifiedNode {
        UnifiedNode {
            id: id.to_string(),
            name: name.to_string(),
            kind: UnifiedNodeKind::Variable,
            source_labels: HashSet::new(),
            sink_labels: HashSet::new(),
        }
    }

    #[test]
    fn test_select_variable_by_name() {
        let mut graph = UnifiedGraph::new();
        graph.add_node(var_node("f::x", "x"));
        graph.add_node(var_node("g::x", "x"));
        graph.add_node(var_node("f::y", "y"));

        let selector = NodeSelector::var("x");
        let matches: Vec<_> = graph.select(&selector).collect();
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn test_select_field_distinguishes_fields() {
        let mut graph = UnifiedGraph::new();
        graph.add_node(var_node("f::user.id", "user.id"));
        graph.add_node(var_node("f::user.name", "user.name"));
        graph.add_node(var_node("f::user", "user"));

        let selector = NodeSelector::field("user", "id");
        let matches: Vec<_> = graph.select(&selector).collect();
        assert_eq!(matches, vec!["f::user.id"]);
    }

    #[test]
    fn test_wildcard_selects_all_variables() {
        let mut graph = UnifiedGraph::new();
        graph.add_node(var_node("f::a", "a"));
        graph.add_node(var_node("f::b", "b"));

        let selector = NodeSelector::any_var();
        let matches: Vec<_> = graph.select(&selector).collect();
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn test_taint_tagging() {
        let mut graph = UnifiedGraph::new();
        graph.add_node(var_node("f::x", "x"));
        graph.tag_source("f::x", "PII");

        assert_eq!(graph.sources(Some("PII")).len(), 1);
        assert_eq!(graph.sources(Some("SECRET")).len(), 0);
        assert_eq!(graph.sources(None).len(), 1);
        assert!(graph.sinks(None).is_empty());
    }
}
