//! Parsed tree with diagnostics
//!
//! Parsing is resilient: syntax errors become diagnostics on a best-effort
//! partial tree, never a failed parse. Downstream layers emit IR only for
//! parseable regions.

use crate::features::parsing::domain::SyntaxNode;
use crate::shared::models::Span;

/// Parse diagnostic for an unparseable or missing region
#[derive(Debug, Clone)]
pub struct ParseDiagnostic {
    pub message: String,
    pub span: Span,
}

/// Result of parsing one file
#[derive(Debug, Clone)]
pub struct ParsedTree {
    pub root: SyntaxNode,
    pub source: String,
    pub file_path: String,
    pub language: String,
    pub errors: Vec<ParseDiagnostic>,
}

impl ParsedTree {
    pub fn new(
        root: SyntaxNode,
        source: String,
        file_path: String,
        language: String,
    ) -> Self {
        Self {
            root,
            source,
            file_path,
            language,
            errors: Vec::new(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<ParseDiagnostic>) -> Self {
        self.errors = errors;
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// A single text edit, expressed in byte offsets into the old content.
///
/// Used by the incremental-reparse interface: the parser applies the edit
/// to its previous tree so unchanged subtrees are reused.
#[derive(Debug, Clone, Copy)]
pub struct SourceEdit {
    pub start_byte: usize,
    pub old_end_byte: usize,
    pub new_end_byte: usize,
}

impl SourceEdit {
    /// Compute the single contiguous edit between two versions of a file
    /// (common prefix/suffix trim).
    pub fn between(old: &str, new: &str) -> Self {
        let old_bytes = old.as_bytes();
        let new_bytes = new.as_bytes();

        let mut start = 0;
        while start < old_bytes.len()
            && start < new_bytes.len()
            && old_bytes[start] == new_bytes[start]
        {
            start += 1;
        }

        let mut old_end = old_bytes.len();
        let mut new_end = new_bytes.len();
        while old_end > start && new_end > start && old_bytes[old_end - 1] == new_bytes[new_end - 1]
        {
            old_end -= 1;
            new_end -= 1;
        }

        Self {
            start_byte: start,
            old_end_byte: old_end,
            new_end_byte: new_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_edit_between_insert() {
        let edit = SourceEdit::between("abc", "abXc");
        assert_eq!(edit.start_byte, 2);
        assert_eq!(edit.old_end_byte, 2);
        assert_eq!(edit.new_end_byte, 3);
    }

    #[test]
    fn test_source_edit_between_identical() {
        let edit = SourceEdit::between("same", "same");
        assert_eq!(edit.start_byte, edit.old_end_byte);
        assert_eq!(edit.old_end_byte, edit.new_end_byte);
    }

    #[test]
    fn test_source_edit_between_replace() {
        let edit = SourceEdit::between("x = 1\ny = 2\n", "x = 1\ny = 99\n");
        assert_eq!(edit.start_byte, 10);
        assert_eq!(edit.old_end_byte, 11);
        assert_eq!(edit.new_end_byte, 12);
    }
}
