//! Shared models

mod edge;
mod error;
mod node;
mod span;

pub use edge::{Edge, EdgeId, EdgeKind};
pub use error::{AtlasError, ErrorKind, Result};
pub use node::{ControlFlowSummary, Node, NodeId, NodeKind};
pub use span::{Location, Span};

// Re-export serde_json::Value for convenience (used by Node/Edge attrs)
pub use serde_json::Value;
