//! Type inference (L4)
//!
//! Fallback chain with source-tagged confidence, inter-procedural
//! return-type summaries propagated to fixpoint, and generics carried as
//! type-parameter tuples instantiated at call sites.

pub mod domain;
pub mod infrastructure;

pub use domain::{InferResult, InferSource, ReturnTypeSummary};
pub use infrastructure::{
    literal_type, BuiltinMethodTable, ExternalTypeProvider, NarrowingAnalyzer, NarrowingContext,
    OverloadGroups, TypeInferenceEngine,
};
