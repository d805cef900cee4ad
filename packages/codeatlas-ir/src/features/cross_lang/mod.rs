//! Cross-language value flow (L9)
//!
//! Service boundary specs, boundary-to-handler matching with confidence
//! labels, and the cross-service edge overlay on the unified graph.

pub mod domain;
pub mod infrastructure;

pub use domain::{BoundarySpec, Confidence, MatchCandidate};
pub use infrastructure::{BoundaryMatcher, CrossServiceLink, ValueFlowOverlay};
