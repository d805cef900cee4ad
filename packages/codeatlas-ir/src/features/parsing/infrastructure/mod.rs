//! Parsing infrastructure (tree-sitter)

mod parser;

pub use parser::{Language, ResilientParser, MAX_AST_DEPTH, MAX_FILE_SIZE};
