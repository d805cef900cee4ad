//! Control flow type narrowing
//!
//! Scans a function body for instance checks and `is None` guards and
//! records the narrowed type per variable. Guards feed the inference
//! chain just below explicit annotations.

use std::collections::HashMap;

use crate::features::parsing::domain::{SyntaxKind, SyntaxNode};
use crate::features::type_inference::infrastructure::engine::NarrowingContext;

pub struct NarrowingAnalyzer;

impl NarrowingAnalyzer {
    /// Collect narrowing facts for one function.
    pub fn analyze(function_syntax: &SyntaxNode) -> NarrowingContext {
        let mut narrowed = HashMap::new();
        for node in function_syntax.descendants_until_definition() {
            if node.kind != SyntaxKind::IfStmt {
                continue;
            }
            let Some(condition) = node
                .children
                .iter()
                .find(|c| !c.is_token() && c.kind != SyntaxKind::Block)
            else {
                continue;
            };
            if let Some((var, ty)) = isinstance_guard(condition) {
                narrowed.insert(var, ty);
            } else if let Some(var) = is_none_guard(condition) {
                narrowed.insert(var, "None".to_string());
            }
        }
        NarrowingContext { narrowed }
    }
}

/// `isinstance(x, str)` → (x, str)
fn isinstance_guard(condition: &SyntaxNode) -> Option<(String, String)> {
    let call = if condition.kind == SyntaxKind::CallExpr {
        condition
    } else {
        condition
            .children
            .iter()
            .find(|c| c.kind == SyntaxKind::CallExpr)?
    };
    let callee = call.children.first()?;
    if callee.kind != SyntaxKind::NameExpr || callee.text() != "isinstance" {
        return None;
    }
    let args = call
        .children
        .iter()
        .find(|c| matches!(c.raw_kind.as_deref(), Some("argument_list") | Some("arguments")))?;
    let named: Vec<&SyntaxNode> = args
        .children
        .iter()
        .filter(|c| c.kind == SyntaxKind::NameExpr)
        .collect();
    if named.len() < 2 {
        return None;
    }
    Some((named[0].text().to_string(), named[1].text().to_string()))
}

/// `x is None` → x
fn is_none_guard(condition: &SyntaxNode) -> Option<String> {
    if condition.kind != SyntaxKind::BinaryExpr {
        return None;
    }
    let has_is = condition
        .children
        .iter()
        .any(|c| c.is_token() && c.text() == "is");
    let has_not = condition
        .children
        .iter()
        .any(|c| c.is_token() && c.text() == "not");
    let has_none = condition
        .children
        .iter()
        .any(|c| c.kind == SyntaxKind::LiteralExpr && c.text() == "None");
    if !has_is || !has_none || has_not {
        return None;
    }
    condition
        .children
        .iter()
        .find(|c| c.kind == SyntaxKind::NameExpr)
        .map(|c| c.text().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::parsing::ResilientParser;

    fn analyze(source: &str) -> NarrowingContext {
        let tree = ResilientParser::python().parse(source, "t.py").unwrap();
        let func = tree.root.find_definition_at(1).unwrap();
        NarrowingAnalyzer::analyze(func)
    }

    #[test]
    fn test_isinstance_narrowing() {
        let ctx = analyze("def f(x):\n    if isinstance(x, str):\n        y = x\n");
        assert_eq!(ctx.narrowed.get("x").map(String::as_str), Some("str"));
    }

    #[test]
    fn test_is_none_narrowing() {
        let ctx = analyze("def f(x):\n    if x is None:\n        return\n");
        assert_eq!(ctx.narrowed.get("x").map(String::as_str), Some("None"));
    }

    #[test]
    fn test_is_not_none_not_narrowed_to_none() {
        let ctx = analyze("def f(x):\n    if x is not None:\n        return\n");
        assert!(ctx.narrowed.get("x").is_none());
    }

    #[test]
    fn test_plain_condition_no_narrowing() {
        let ctx = analyze("def f(x):\n    if x > 3:\n        return\n");
        assert!(ctx.narrowed.is_empty());
    }
}
