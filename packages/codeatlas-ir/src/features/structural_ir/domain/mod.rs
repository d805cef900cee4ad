//! Structural IR domain models

mod ir_document;

pub use ir_document::IrDocument;
