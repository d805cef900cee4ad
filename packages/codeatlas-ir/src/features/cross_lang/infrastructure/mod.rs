//! Cross-language infrastructure

pub mod boundary_matcher;
pub mod value_flow;

pub use boundary_matcher::BoundaryMatcher;
pub use value_flow::{CrossServiceLink, ValueFlowOverlay};
