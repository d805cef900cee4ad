//! Type inference infrastructure

pub mod builtins;
pub mod engine;
pub mod narrowing;

pub use builtins::BuiltinMethodTable;
pub use engine::{
    literal_type, ExternalTypeProvider, NarrowingContext, OverloadGroups, TypeInferenceEngine,
};
pub use narrowing::NarrowingAnalyzer;
