//! Cross-language domain models

mod boundary;

pub use boundary::{BoundarySpec, Confidence, MatchCandidate};
