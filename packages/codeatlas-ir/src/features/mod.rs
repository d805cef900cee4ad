//! Feature modules (pipeline layers L0-L5 plus the query surfaces)

pub mod cross_lang;
pub mod data_flow;
pub mod dependency;
pub mod flow_graph;
pub mod parsing;
pub mod query_engine;
pub mod structural_ir;
pub mod type_inference;
