//! Structural IR infrastructure

mod builder;

pub use builder::{module_fqn_from_path, StructuralIrBuilder};
