//! IR node model
//!
//! Every structural entity extracted from a source tree becomes a `Node`.
//! Nodes live in arenas keyed by id; relationships are edge tables, never
//! stored pointers, so snapshots are trivially copyable.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::shared::models::Span;

/// Node identifier (deterministic content hash, see `shared::utils::ids`)
pub type NodeId = String;

/// Structural node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Class,
    Function,
    Method,
    Lambda,
    Variable,
    Import,
    Block,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::File => "File",
            NodeKind::Class => "Class",
            NodeKind::Function => "Function",
            NodeKind::Method => "Method",
            NodeKind::Lambda => "Lambda",
            NodeKind::Variable => "Variable",
            NodeKind::Import => "Import",
            NodeKind::Block => "Block",
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            NodeKind::Function | NodeKind::Method | NodeKind::Lambda
        )
    }
}

/// Per-function control flow summary
///
/// Cyclomatic complexity = 1 + branches + short-circuit operands
/// + except handlers + comprehensions + match cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlFlowSummary {
    pub cyclomatic: u32,
    pub has_loop: bool,
    pub has_try: bool,
    pub branch_count: u32,
}

/// Structural IR node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    /// Dotted fully qualified name, unique across files
    pub fqn: String,
    pub file_path: String,
    pub span: Span,
    pub language: String,
    pub parent_id: Option<NodeId>,
    /// Open metadata map (docstring, decorators, annotations, ...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attrs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_flow_summary: Option<ControlFlowSummary>,
}

impl Node {
    pub fn new(
        id: impl Into<NodeId>,
        kind: NodeKind,
        name: impl Into<String>,
        fqn: impl Into<String>,
        file_path: impl Into<String>,
        span: Span,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            fqn: fqn.into(),
            file_path: file_path.into(),
            span,
            language: language.into(),
            parent_id: None,
            attrs: Map::new(),
            control_flow_summary: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<NodeId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    pub fn with_summary(mut self, summary: ControlFlowSummary) -> Self {
        self.control_flow_summary = Some(summary);
        self
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(Value::as_str)
    }

    pub fn attr_bool(&self, key: &str) -> bool {
        self.attrs
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
