//! Language-neutral syntax node representation
//!
//! Abstracts tree-sitter nodes so downstream layers never touch a grammar.

use crate::shared::models::Span;

/// Syntax node kind (language-neutral)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxKind {
    // Definitions
    FunctionDef,
    ClassDef,
    MethodDef,
    LambdaDef,

    // Declarations
    VariableDecl,
    ParameterDecl,
    FieldDecl,
    ImportDecl,

    // Expressions
    CallExpr,
    NameExpr,
    AttributeExpr,
    LiteralExpr,
    BinaryExpr,
    BooleanExpr,
    UnaryExpr,
    ComprehensionExpr,

    // Statements
    AssignmentStmt,
    ReturnStmt,
    IfStmt,
    ForStmt,
    WhileStmt,
    TryStmt,
    ExceptClause,
    FinallyClause,
    WithStmt,
    MatchStmt,
    MatchCase,

    // Control flow
    BreakStmt,
    ContinueStmt,
    RaiseStmt,
    YieldExpr,
    AwaitExpr,

    // Other
    Block,
    Decorator,
    TypeAnnotation,

    // Unknown/Other
    Other(String),
}

impl SyntaxKind {
    pub fn is_definition(&self) -> bool {
        matches!(
            self,
            SyntaxKind::FunctionDef
                | SyntaxKind::ClassDef
                | SyntaxKind::MethodDef
                | SyntaxKind::LambdaDef
        )
    }

    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            SyntaxKind::IfStmt | SyntaxKind::ForStmt | SyntaxKind::WhileStmt
        )
    }

    pub fn is_control_flow(&self) -> bool {
        matches!(
            self,
            SyntaxKind::IfStmt
                | SyntaxKind::ForStmt
                | SyntaxKind::WhileStmt
                | SyntaxKind::TryStmt
                | SyntaxKind::MatchStmt
                | SyntaxKind::BreakStmt
                | SyntaxKind::ContinueStmt
                | SyntaxKind::ReturnStmt
                | SyntaxKind::RaiseStmt
        )
    }
}

/// Language-neutral syntax node
#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub kind: SyntaxKind,
    pub span: Span,
    pub text: Option<String>,
    pub children: Vec<SyntaxNode>,

    /// Original grammar kind (kept for language-specific lookups)
    pub raw_kind: Option<String>,
}

impl SyntaxNode {
    pub fn new(kind: SyntaxKind, span: Span) -> Self {
        Self {
            kind,
            span,
            text: None,
            children: Vec::new(),
            raw_kind: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_children(mut self, children: Vec<SyntaxNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_raw_kind(mut self, raw_kind: impl Into<String>) -> Self {
        self.raw_kind = Some(raw_kind.into());
        self
    }

    /// Find first child of given kind
    pub fn find_child(&self, kind: &SyntaxKind) -> Option<&SyntaxNode> {
        self.children.iter().find(|c| &c.kind == kind)
    }

    /// Find all children of given kind
    pub fn find_children(&self, kind: &SyntaxKind) -> Vec<&SyntaxNode> {
        self.children.iter().filter(|c| &c.kind == kind).collect()
    }

    /// First child whose raw grammar kind matches
    pub fn find_raw(&self, raw_kind: &str) -> Option<&SyntaxNode> {
        self.children
            .iter()
            .find(|c| c.raw_kind.as_deref() == Some(raw_kind))
    }

    /// Depth-first walk over all descendants (self excluded)
    pub fn descendants(&self) -> Vec<&SyntaxNode> {
        let mut out = Vec::new();
        let mut stack: Vec<&SyntaxNode> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Descendants of this node, not descending into nested definitions
    /// (their bodies belong to their own analyses).
    pub fn descendants_until_definition(&self) -> Vec<&SyntaxNode> {
        let mut out = Vec::new();
        let mut stack: Vec<&SyntaxNode> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            if !node.kind.is_definition() {
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// Named statements of this node's body block.
    pub fn body_statements(&self) -> Vec<&SyntaxNode> {
        let Some(block) = self.children.iter().find(|c| c.kind == SyntaxKind::Block) else {
            return Vec::new();
        };
        block.children.iter().filter(|c| !c.is_token()).collect()
    }

    /// Find the definition node starting on the given line (used to match
    /// IR nodes back to their syntax subtrees).
    pub fn find_definition_at(&self, start_line: u32) -> Option<&SyntaxNode> {
        if self.kind.is_definition() && self.span.start_line == start_line {
            return Some(self);
        }
        for child in &self.children {
            if let Some(found) = child.find_definition_at(start_line) {
                return Some(found);
            }
        }
        None
    }

    /// True for anonymous grammar tokens (keywords, punctuation).
    pub fn is_token(&self) -> bool {
        matches!(self.kind, SyntaxKind::Other(_))
            && self.children.is_empty()
            && self.raw_kind.as_deref() == Some(self.text())
    }

    /// Get leaf text content
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Maximum nesting depth below this node
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(SyntaxNode::depth)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_kind_is_definition() {
        assert!(SyntaxKind::FunctionDef.is_definition());
        assert!(SyntaxKind::ClassDef.is_definition());
        assert!(!SyntaxKind::CallExpr.is_definition());
    }

    #[test]
    fn test_descendants_walks_depth_first() {
        let leaf = SyntaxNode::new(SyntaxKind::NameExpr, Span::zero()).with_text("x");
        let call =
            SyntaxNode::new(SyntaxKind::CallExpr, Span::zero()).with_children(vec![leaf]);
        let root = SyntaxNode::new(SyntaxKind::Block, Span::zero()).with_children(vec![call]);

        let all = root.descendants();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind, SyntaxKind::CallExpr);
        assert_eq!(all[1].kind, SyntaxKind::NameExpr);
        assert_eq!(root.depth(), 3);
    }
}
