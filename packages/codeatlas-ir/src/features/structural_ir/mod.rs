//! Structural IR (L1)
//!
//! Nodes (File/Class/Function/Method/Lambda/Variable/Import) plus
//! Contains/Calls/Imports/Inherits/Captures edges and per-function
//! control flow summaries.

pub mod domain;
pub mod infrastructure;

pub use domain::IrDocument;
pub use infrastructure::{module_fqn_from_path, StructuralIrBuilder};
