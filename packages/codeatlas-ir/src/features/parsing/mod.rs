//! Parsing & source model (L0)
//!
//! Raw source + language tag → language-neutral AST with byte-accurate
//! spans, resilient to syntax errors, with an incremental-reparse path.

pub mod domain;
pub mod infrastructure;

pub use domain::{ParseDiagnostic, ParsedTree, SourceEdit, SyntaxKind, SyntaxNode};
pub use infrastructure::{Language, ResilientParser, MAX_AST_DEPTH, MAX_FILE_SIZE};
