//! Flow graph infrastructure

pub mod cfg_builder;
pub mod lowering;

pub use cfg_builder::CfgBuilder;
pub use lowering::{
    entry_of, entry_of_seq, BfgBuilder, CatchArm, FinallyArm, FunctionLowering, Structure,
    TerminatorKind,
};
