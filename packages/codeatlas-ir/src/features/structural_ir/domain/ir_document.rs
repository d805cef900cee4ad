//! Structural IR document
//!
//! One `IrDocument` per parsed file: the node/edge arena produced by the
//! structural builder. Relationships are derived from the edge table, never
//! stored as pointers, so documents can be merged and snapshotted freely.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::features::parsing::domain::ParseDiagnostic;
use crate::shared::models::{Edge, EdgeKind, Node, NodeId, NodeKind};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IrDocument {
    pub repo_id: String,
    pub file_path: String,
    pub language: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Parse diagnostics carried through from the resilient parser
    #[serde(skip)]
    pub diagnostics: Vec<ParseDiagnostic>,
    #[serde(skip)]
    edge_ids: HashSet<String>,
}

impl IrDocument {
    pub fn new(
        repo_id: impl Into<String>,
        file_path: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            repo_id: repo_id.into(),
            file_path: file_path.into(),
            language: language.into(),
            ..Default::default()
        }
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Add an edge, keeping at most one edge of a given kind per pair.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        if self.edge_ids.insert(edge.id.clone()) {
            self.edges.push(edge);
            true
        } else {
            false
        }
    }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn file_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.kind == NodeKind::File)
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    /// All callable nodes (functions, methods, lambdas)
    pub fn callables(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.kind.is_callable())
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    pub fn find_by_fqn(&self, fqn: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.fqn == fqn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::Span;
    use crate::shared::utils::ids;

    #[test]
    fn test_duplicate_edges_collapse() {
        let mut doc = IrDocument::new("r", "a.py", "python");
        let id = ids::edge_id(EdgeKind::Calls, "a", "b");
        assert!(doc.add_edge(Edge::new(id.clone(), EdgeKind::Calls, "a", "b")));
        assert!(!doc.add_edge(Edge::new(id, EdgeKind::Calls, "a", "b")));
        assert_eq!(doc.edges.len(), 1);
    }

    #[test]
    fn test_lookup_helpers() {
        let mut doc = IrDocument::new("r", "a.py", "python");
        doc.add_node(Node::new(
            "f1",
            NodeKind::File,
            "a",
            "a",
            "a.py",
            Span::zero(),
            "python",
        ));
        doc.add_node(Node::new(
            "fn1",
            NodeKind::Function,
            "main",
            "a.main",
            "a.py",
            Span::new(1, 0, 3, 0),
            "python",
        ));

        assert!(doc.file_node().is_some());
        assert_eq!(doc.callables().count(), 1);
        assert_eq!(doc.find_by_fqn("a.main").unwrap().id, "fn1");
    }
}
