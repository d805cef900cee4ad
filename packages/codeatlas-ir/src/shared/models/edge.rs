//! IR edge model
//!
//! At most one edge of a given kind exists between a given source/target
//! pair; edge ids are content hashes of (kind, source, target).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::shared::models::{NodeId, Span};

/// Edge identifier (deterministic content hash)
pub type EdgeId = String;

/// Structural / semantic edge kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Contains,
    Calls,
    Imports,
    Inherits,
    Captures,
    Defines,
    Uses,
    Reads,
    Writes,
    ControlFlow,
    InterProcArg,
    InterProcReturn,
    Field,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Contains => "Contains",
            EdgeKind::Calls => "Calls",
            EdgeKind::Imports => "Imports",
            EdgeKind::Inherits => "Inherits",
            EdgeKind::Captures => "Captures",
            EdgeKind::Defines => "Defines",
            EdgeKind::Uses => "Uses",
            EdgeKind::Reads => "Reads",
            EdgeKind::Writes => "Writes",
            EdgeKind::ControlFlow => "ControlFlow",
            EdgeKind::InterProcArg => "InterProcArg",
            EdgeKind::InterProcReturn => "InterProcReturn",
            EdgeKind::Field => "Field",
        }
    }

    pub fn is_data_flow(&self) -> bool {
        matches!(
            self,
            EdgeKind::Defines
                | EdgeKind::Uses
                | EdgeKind::Reads
                | EdgeKind::Writes
                | EdgeKind::Field
        )
    }

    pub fn is_inter_proc(&self) -> bool {
        matches!(self, EdgeKind::InterProcArg | EdgeKind::InterProcReturn)
    }
}

/// IR edge between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub kind: EdgeKind,
    pub source_id: NodeId,
    pub target_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attrs: Map<String, Value>,
}

impl Edge {
    pub fn new(
        id: impl Into<EdgeId>,
        kind: EdgeKind,
        source_id: impl Into<NodeId>,
        target_id: impl Into<NodeId>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            source_id: source_id.into(),
            target_id: target_id.into(),
            span: None,
            attrs: Map::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_kind_classification() {
        assert!(EdgeKind::Reads.is_data_flow());
        assert!(EdgeKind::Field.is_data_flow());
        assert!(!EdgeKind::Calls.is_data_flow());
        assert!(EdgeKind::InterProcArg.is_inter_proc());
        assert!(!EdgeKind::Contains.is_inter_proc());
    }

    #[test]
    fn test_edge_builder() {
        let edge = Edge::new("e1", EdgeKind::Calls, "caller", "callee")
            .with_span(Span::new(5, 4, 5, 20));
        assert_eq!(edge.kind, EdgeKind::Calls);
        assert_eq!(edge.span.unwrap().start_line, 5);
    }
}
