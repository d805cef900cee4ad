//! Type inference domain models

mod models;

pub use models::{InferResult, InferSource, ReturnTypeSummary};
