//! Data flow infrastructure

pub mod dfg_builder;
pub mod inter_proc;

pub use dfg_builder::DfgBuilder;
pub use inter_proc::InterProcLinker;
