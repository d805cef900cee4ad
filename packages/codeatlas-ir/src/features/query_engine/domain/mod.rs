//! Query engine domain models

mod selectors;

pub use selectors::{
    EdgeKindSet, NodeSelector, PathQuery, PathResult, QueryEdgeKind, QueryOutcome,
    DEFAULT_LIMIT_PATHS, DEFAULT_MAX_DEPTH, DEFAULT_TIMEOUT_MS,
};
