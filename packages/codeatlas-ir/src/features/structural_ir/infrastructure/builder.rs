//! Structural IR builder (L1)
//!
//! Walks the language-neutral AST and produces nodes plus CONTAINS /
//! IMPORTS / INHERITS / CALLS / CAPTURES edges. Call edges are emitted at
//! every call site even when the callee is unresolved; unresolved targets
//! get synthetic `external:<name>` ids and are refined later by the
//! dependency layer.

use std::collections::HashMap;

use serde_json::Value;

use crate::features::parsing::domain::{ParsedTree, SyntaxKind, SyntaxNode};
use crate::features::structural_ir::domain::IrDocument;
use crate::shared::models::{
    ControlFlowSummary, Edge, EdgeKind, Node, NodeId, NodeKind, Span,
};
use crate::shared::utils::ids;

/// Pending call site recorded during the walk, resolved after all
/// definitions in the file are known.
struct PendingCall {
    caller_id: NodeId,
    callee_name: String,
    span: Span,
}

struct PendingInherit {
    class_id: NodeId,
    base_name: String,
}

/// One lexical scope on the walk stack
struct Scope {
    node_id: NodeId,
    fqn: String,
    kind: NodeKind,
    /// name → variable/parameter node id declared in this scope
    variables: HashMap<String, NodeId>,
}

pub struct StructuralIrBuilder {
    repo_id: String,
}

impl StructuralIrBuilder {
    pub fn new(repo_id: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
        }
    }

    /// Build the structural IR for one parsed file.
    pub fn build(&self, tree: &ParsedTree) -> IrDocument {
        let mut doc = IrDocument::new(&self.repo_id, &tree.file_path, &tree.language);
        doc.diagnostics = tree.errors.clone();

        let module_fqn = module_fqn_from_path(&tree.file_path);
        let file_name = module_fqn
            .rsplit('.')
            .next()
            .unwrap_or(&module_fqn)
            .to_string();

        let file_id = ids::node_id(
            &self.repo_id,
            &tree.file_path,
            NodeKind::File,
            &module_fqn,
            tree.root.span.start_line,
        );
        doc.add_node(Node::new(
            file_id.clone(),
            NodeKind::File,
            file_name,
            module_fqn.clone(),
            &tree.file_path,
            tree.root.span,
            &tree.language,
        ));

        let mut calls = Vec::new();
        let mut inherits = Vec::new();
        let mut scopes = vec![Scope {
            node_id: file_id,
            fqn: module_fqn,
            kind: NodeKind::File,
            variables: HashMap::new(),
        }];

        for child in &tree.root.children {
            self.walk(child, &mut scopes, &mut doc, &mut calls, &mut inherits);
        }

        self.resolve_calls(&mut doc, calls);
        self.resolve_inherits(&mut doc, inherits);
        doc
    }

    fn walk(
        &self,
        node: &SyntaxNode,
        scopes: &mut Vec<Scope>,
        doc: &mut IrDocument,
        calls: &mut Vec<PendingCall>,
        inherits: &mut Vec<PendingInherit>,
    ) {
        match &node.kind {
            SyntaxKind::FunctionDef | SyntaxKind::MethodDef => {
                self.enter_callable(node, scopes, doc, calls, inherits);
            }
            SyntaxKind::ClassDef => {
                self.enter_class(node, scopes, doc, calls, inherits);
            }
            SyntaxKind::LambdaDef => {
                self.enter_lambda(node, scopes, doc, calls, inherits);
            }
            SyntaxKind::ImportDecl => {
                self.emit_import(node, scopes, doc);
            }
            SyntaxKind::AssignmentStmt => {
                self.emit_variable(node, scopes, doc);
                self.walk_children(node, scopes, doc, calls, inherits);
            }
            SyntaxKind::CallExpr => {
                if let Some(callee) = callee_name(node) {
                    let caller_id = enclosing_callable(scopes);
                    calls.push(PendingCall {
                        caller_id,
                        callee_name: callee,
                        span: node.span,
                    });
                }
                self.walk_children(node, scopes, doc, calls, inherits);
            }
            _ => self.walk_children(node, scopes, doc, calls, inherits),
        }
    }

    fn walk_children(
        &self,
        node: &SyntaxNode,
        scopes: &mut Vec<Scope>,
        doc: &mut IrDocument,
        calls: &mut Vec<PendingCall>,
        inherits: &mut Vec<PendingInherit>,
    ) {
        for child in &node.children {
            self.walk(child, scopes, doc, calls, inherits);
        }
    }

    fn enter_callable(
        &self,
        node: &SyntaxNode,
        scopes: &mut Vec<Scope>,
        doc: &mut IrDocument,
        calls: &mut Vec<PendingCall>,
        inherits: &mut Vec<PendingInherit>,
    ) {
        let name = definition_name(node).unwrap_or_else(|| "<anonymous>".to_string());
        let parent = scopes.last().expect("scope stack never empty");
        let kind = if parent.kind == NodeKind::Class {
            NodeKind::Method
        } else {
            NodeKind::Function
        };
        let fqn = format!("{}.{}", parent.fqn, name);
        let parent_id = parent.node_id.clone();

        let id = ids::node_id(&self.repo_id, &doc.file_path, kind, &fqn, node.span.start_line);
        let mut ir_node = Node::new(
            id.clone(),
            kind,
            &name,
            &fqn,
            doc.file_path.clone(),
            node.span,
            doc.language.clone(),
        )
        .with_parent(parent_id.clone())
        .with_summary(control_flow_summary(node));

        if let Some(ret) = type_annotation_text(node) {
            ir_node = ir_node.with_attr("return_annotation", Value::String(ret));
        }
        if is_async(node) {
            ir_node = ir_node.with_attr("is_async", Value::Bool(true));
        }
        if is_generator(node) {
            ir_node = ir_node.with_attr("is_generator", Value::Bool(true));
        }
        let decorators = decorator_names(node);
        if !decorators.is_empty() {
            ir_node = ir_node.with_attr(
                "decorators",
                Value::Array(decorators.into_iter().map(Value::String).collect()),
            );
        }

        doc.add_node(ir_node);
        self.contains(doc, &parent_id, &id);

        scopes.push(Scope {
            node_id: id.clone(),
            fqn,
            kind,
            variables: HashMap::new(),
        });
        self.collect_parameters(node, scopes, doc);
        self.walk_children(node, scopes, doc, calls, inherits);
        scopes.pop();
    }

    fn enter_class(
        &self,
        node: &SyntaxNode,
        scopes: &mut Vec<Scope>,
        doc: &mut IrDocument,
        calls: &mut Vec<PendingCall>,
        inherits: &mut Vec<PendingInherit>,
    ) {
        let name = definition_name(node).unwrap_or_else(|| "<anonymous>".to_string());
        let parent = scopes.last().expect("scope stack never empty");
        let fqn = format!("{}.{}", parent.fqn, name);
        let parent_id = parent.node_id.clone();

        let id = ids::node_id(
            &self.repo_id,
            &doc.file_path,
            NodeKind::Class,
            &fqn,
            node.span.start_line,
        );
        doc.add_node(
            Node::new(
                id.clone(),
                NodeKind::Class,
                &name,
                &fqn,
                doc.file_path.clone(),
                node.span,
                doc.language.clone(),
            )
            .with_parent(parent_id.clone()),
        );
        self.contains(doc, &parent_id, &id);

        for base in base_class_names(node) {
            inherits.push(PendingInherit {
                class_id: id.clone(),
                base_name: base,
            });
        }

        scopes.push(Scope {
            node_id: id.clone(),
            fqn,
            kind: NodeKind::Class,
            variables: HashMap::new(),
        });
        self.walk_children(node, scopes, doc, calls, inherits);
        scopes.pop();
    }

    fn enter_lambda(
        &self,
        node: &SyntaxNode,
        scopes: &mut Vec<Scope>,
        doc: &mut IrDocument,
        calls: &mut Vec<PendingCall>,
        inherits: &mut Vec<PendingInherit>,
    ) {
        let parent = scopes.last().expect("scope stack never empty");
        let name = format!("<lambda@{}>", node.span.start_line);
        let fqn = format!("{}.{}", parent.fqn, name);
        let parent_id = parent.node_id.clone();

        let id = ids::node_id(
            &self.repo_id,
            &doc.file_path,
            NodeKind::Lambda,
            &fqn,
            node.span.start_line,
        );
        doc.add_node(
            Node::new(
                id.clone(),
                NodeKind::Lambda,
                &name,
                &fqn,
                doc.file_path.clone(),
                node.span,
                doc.language.clone(),
            )
            .with_parent(parent_id.clone())
            .with_summary(control_flow_summary(node)),
        );
        self.contains(doc, &parent_id, &id);

        // Free variables in the body capture enclosing definitions
        let params = parameter_names(node);
        for free in free_variables(node, &params) {
            if let Some(var_id) = lookup_variable(scopes, &free) {
                let eid = ids::edge_id(EdgeKind::Captures, &id, &var_id);
                doc.add_edge(
                    Edge::new(eid, EdgeKind::Captures, id.clone(), var_id).with_span(node.span),
                );
            }
        }

        scopes.push(Scope {
            node_id: id.clone(),
            fqn,
            kind: NodeKind::Lambda,
            variables: HashMap::new(),
        });
        self.collect_parameters(node, scopes, doc);
        self.walk_children(node, scopes, doc, calls, inherits);
        scopes.pop();
    }

    fn collect_parameters(&self, node: &SyntaxNode, scopes: &mut Vec<Scope>, doc: &mut IrDocument) {
        let scope = scopes.last_mut().expect("scope stack never empty");
        for param in collect_parameter_nodes(node) {
            let Some(pname) = first_identifier(param) else {
                continue;
            };
            if pname == "self" || pname == "cls" {
                continue;
            }
            let fqn = format!("{}.{}", scope.fqn, pname);
            let id = ids::node_id(
                &self.repo_id,
                &doc.file_path,
                NodeKind::Variable,
                &fqn,
                param.span.start_line,
            );
            let mut param_node = Node::new(
                id.clone(),
                NodeKind::Variable,
                &pname,
                &fqn,
                doc.file_path.clone(),
                param.span,
                doc.language.clone(),
            )
            .with_parent(scope.node_id.clone())
            .with_attr("role", Value::String("parameter".to_string()));
            if let Some(annotation) = type_annotation_text(param) {
                param_node = param_node.with_attr("type_annotation", Value::String(annotation));
            }
            doc.add_node(param_node);
            let eid = ids::edge_id(EdgeKind::Contains, &scope.node_id, &id);
            let edge = Edge::new(eid, EdgeKind::Contains, scope.node_id.clone(), id.clone());
            doc.add_edge(edge);
            scope.variables.insert(pname, id);
        }
    }

    fn emit_variable(&self, node: &SyntaxNode, scopes: &mut Vec<Scope>, doc: &mut IrDocument) {
        let Some(var_name) = assignment_target(node) else {
            return;
        };
        let scope = scopes.last_mut().expect("scope stack never empty");
        if scope.variables.contains_key(&var_name) {
            return; // re-assignment, declaration already recorded
        }

        let fqn = format!("{}.{}", scope.fqn, var_name);
        let id = ids::node_id(
            &self.repo_id,
            &doc.file_path,
            NodeKind::Variable,
            &fqn,
            node.span.start_line,
        );
        let mut var_node = Node::new(
            id.clone(),
            NodeKind::Variable,
            &var_name,
            &fqn,
            doc.file_path.clone(),
            node.span,
            doc.language.clone(),
        )
        .with_parent(scope.node_id.clone());

        if let Some(annotation) = type_annotation_text(node) {
            var_node = var_node.with_attr("type_annotation", Value::String(annotation));
        }

        doc.add_node(var_node);
        let eid = ids::edge_id(EdgeKind::Contains, &scope.node_id, &id);
        doc.add_edge(Edge::new(
            eid,
            EdgeKind::Contains,
            scope.node_id.clone(),
            id.clone(),
        ));
        scope.variables.insert(var_name, id);
    }

    fn emit_import(&self, node: &SyntaxNode, scopes: &mut Vec<Scope>, doc: &mut IrDocument) {
        let Some(module) = import_module_path(node) else {
            return;
        };
        // Imports attach to the importing scope (the file)
        let file_scope = &scopes[0];
        let fqn = format!("{}#import:{}", file_scope.fqn, module);
        let id = ids::node_id(
            &self.repo_id,
            &doc.file_path,
            NodeKind::Import,
            &fqn,
            node.span.start_line,
        );
        let relative_depth = import_relative_depth(node);
        let mut import_node = Node::new(
            id.clone(),
            NodeKind::Import,
            &module,
            &fqn,
            doc.file_path.clone(),
            node.span,
            doc.language.clone(),
        )
        .with_parent(file_scope.node_id.clone())
        .with_attr("module", Value::String(module.clone()));
        if relative_depth > 0 {
            import_node = import_node.with_attr("relative_depth", Value::from(relative_depth));
        }
        doc.add_node(import_node);

        let eid = ids::edge_id(EdgeKind::Imports, &file_scope.node_id, &id);
        doc.add_edge(
            Edge::new(eid, EdgeKind::Imports, file_scope.node_id.clone(), id).with_span(node.span),
        );
    }

    fn resolve_calls(&self, doc: &mut IrDocument, calls: Vec<PendingCall>) {
        let by_name: HashMap<String, NodeId> = doc
            .callables()
            .map(|n| (n.name.clone(), n.id.clone()))
            .collect();
        let by_fqn: HashMap<String, NodeId> = doc
            .callables()
            .map(|n| (n.fqn.clone(), n.id.clone()))
            .collect();

        for call in calls {
            let short_name = call
                .callee_name
                .rsplit('.')
                .next()
                .unwrap_or(&call.callee_name);
            let (target, resolved) = if let Some(id) = by_fqn.get(&call.callee_name) {
                (id.clone(), true)
            } else if let Some(id) = by_name.get(short_name) {
                (id.clone(), true)
            } else {
                (format!("external:{}", call.callee_name), false)
            };

            let eid = ids::edge_id(EdgeKind::Calls, &call.caller_id, &target);
            doc.add_edge(
                Edge::new(eid, EdgeKind::Calls, call.caller_id.clone(), target)
                    .with_span(call.span)
                    .with_attr("callee", Value::String(call.callee_name.clone()))
                    .with_attr("resolved", Value::Bool(resolved)),
            );
        }
    }

    fn resolve_inherits(&self, doc: &mut IrDocument, inherits: Vec<PendingInherit>) {
        let classes: HashMap<String, NodeId> = doc
            .nodes_of_kind(NodeKind::Class)
            .map(|n| (n.name.clone(), n.id.clone()))
            .collect();

        for inherit in inherits {
            let target = classes
                .get(&inherit.base_name)
                .cloned()
                .unwrap_or_else(|| format!("external:{}", inherit.base_name));
            let eid = ids::edge_id(EdgeKind::Inherits, &inherit.class_id, &target);
            doc.add_edge(
                Edge::new(eid, EdgeKind::Inherits, inherit.class_id.clone(), target)
                    .with_attr("base", Value::String(inherit.base_name.clone())),
            );
        }
    }

    fn contains(&self, doc: &mut IrDocument, parent_id: &str, child_id: &str) {
        let eid = ids::edge_id(EdgeKind::Contains, parent_id, child_id);
        doc.add_edge(Edge::new(
            eid,
            EdgeKind::Contains,
            parent_id.to_string(),
            child_id.to_string(),
        ));
    }
}

// ── AST helpers ──────────────────────────────────────────────────────────

/// Derive a dotted module FQN from a file path.
pub fn module_fqn_from_path(path: &str) -> String {
    let trimmed = path.trim_start_matches("./");
    let without_ext = trimmed.rsplit_once('.').map(|(p, _)| p).unwrap_or(trimmed);
    without_ext.replace(['/', '\\'], ".")
}

fn definition_name(node: &SyntaxNode) -> Option<String> {
    node.find_child(&SyntaxKind::NameExpr)
        .map(|n| n.text().to_string())
        .filter(|s| !s.is_empty())
}

fn is_async(node: &SyntaxNode) -> bool {
    node.children
        .iter()
        .any(|c| c.raw_kind.as_deref() == Some("async"))
        || node
            .descendants_until_definition()
            .iter()
            .any(|d| d.kind == SyntaxKind::AwaitExpr)
}

fn is_generator(node: &SyntaxNode) -> bool {
    node.descendants_until_definition()
        .iter()
        .any(|d| d.kind == SyntaxKind::YieldExpr)
}

fn decorator_names(node: &SyntaxNode) -> Vec<String> {
    node.children
        .iter()
        .filter(|c| c.kind == SyntaxKind::Decorator)
        .map(|c| collect_text(c).trim_start_matches('@').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// First identifier leaf anywhere below (or at) this node.
fn first_identifier(node: &SyntaxNode) -> Option<String> {
    if node.kind == SyntaxKind::NameExpr {
        return Some(node.text().to_string());
    }
    for child in &node.children {
        if let Some(found) = first_identifier(child) {
            return Some(found);
        }
    }
    None
}

/// Dotted callee name of a call expression (`foo`, `obj.method`).
fn callee_name(node: &SyntaxNode) -> Option<String> {
    let target = node.children.first()?;
    match target.kind {
        SyntaxKind::NameExpr => Some(target.text().to_string()),
        SyntaxKind::AttributeExpr => {
            let parts: Vec<String> = identifier_leaves(target);
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("."))
            }
        }
        _ => None,
    }
}

fn identifier_leaves(node: &SyntaxNode) -> Vec<String> {
    let mut out = Vec::new();
    if node.kind == SyntaxKind::NameExpr {
        out.push(node.text().to_string());
    }
    for child in &node.children {
        out.extend(identifier_leaves(child));
    }
    out
}

fn base_class_names(node: &SyntaxNode) -> Vec<String> {
    // Python: class Foo(Base1, Base2) → argument_list of identifiers
    // TypeScript: class Foo extends Base → class_heritage
    node.children
        .iter()
        .filter(|c| {
            matches!(
                c.raw_kind.as_deref(),
                Some("argument_list") | Some("class_heritage")
            )
        })
        .flat_map(identifier_leaves)
        .collect()
}

fn collect_parameter_nodes(node: &SyntaxNode) -> Vec<&SyntaxNode> {
    let mut out = Vec::new();
    for child in &node.children {
        if matches!(
            child.raw_kind.as_deref(),
            Some("parameters") | Some("lambda_parameters") | Some("formal_parameters")
        ) {
            for param in &child.children {
                if param.kind == SyntaxKind::ParameterDecl || param.kind == SyntaxKind::NameExpr {
                    out.push(param);
                }
            }
        }
    }
    out
}

fn parameter_names(node: &SyntaxNode) -> Vec<String> {
    collect_parameter_nodes(node)
        .into_iter()
        .filter_map(first_identifier)
        .collect()
}

/// Name bound by an assignment's left-hand side.
fn assignment_target(node: &SyntaxNode) -> Option<String> {
    let first = node.children.first()?;
    match first.kind {
        SyntaxKind::NameExpr => Some(first.text().to_string()),
        // TS lexical_declaration wraps variable_declarator
        SyntaxKind::VariableDecl => first_identifier(first),
        _ => {
            if first.kind == SyntaxKind::AttributeExpr {
                None // field writes are DFG concerns, not declarations
            } else {
                node.children
                    .iter()
                    .find(|c| c.kind == SyntaxKind::VariableDecl)
                    .and_then(first_identifier)
            }
        }
    }
}

fn type_annotation_text(node: &SyntaxNode) -> Option<String> {
    node.children
        .iter()
        .find(|c| c.kind == SyntaxKind::TypeAnnotation)
        .map(|t| collect_text(t).trim_start_matches(':').trim().to_string())
        .filter(|s| !s.is_empty())
}

fn collect_text(node: &SyntaxNode) -> String {
    if node.children.is_empty() {
        return node.text().to_string();
    }
    node.children
        .iter()
        .map(collect_text)
        .collect::<Vec<_>>()
        .join("")
}

/// Dotted module path of an import statement.
fn import_module_path(node: &SyntaxNode) -> Option<String> {
    // Relative first: `from ..util import x` nests its dotted_name inside
    // the relative_import node, and the trailing dotted_name is the
    // imported symbol, not the module.
    if let Some(relative) = node.find_raw("relative_import") {
        let dots = ".".repeat(import_relative_depth(node).max(1) as usize);
        let parts: Vec<String> = identifier_leaves(relative);
        return Some(format!("{}{}", dots, parts.join(".")));
    }
    // Python: import a.b / from a.b import c ; dotted_name holds the path.
    if let Some(dotted) = node.find_raw("dotted_name") {
        let parts = identifier_leaves(dotted);
        if !parts.is_empty() {
            return Some(parts.join("."));
        }
    }
    // TypeScript: import { x } from "mod" ; the string literal is the module.
    if let Some(string) = node
        .children
        .iter()
        .find(|c| c.kind == SyntaxKind::LiteralExpr)
    {
        let text = collect_text(string);
        let cleaned = text.trim_matches(|c| c == '"' || c == '\'');
        if !cleaned.is_empty() {
            return Some(cleaned.to_string());
        }
    }
    // import aliased / bare identifier fallback
    first_identifier(node)
}

/// Number of leading dots in a relative import (0 for absolute).
fn import_relative_depth(node: &SyntaxNode) -> u32 {
    fn count_dots(node: &SyntaxNode) -> u32 {
        let mut dots = 0;
        if node.raw_kind.as_deref() == Some("import_prefix") {
            dots += node
                .children
                .iter()
                .filter(|c| c.text() == ".")
                .count()
                .max(1) as u32;
            if node.children.is_empty() {
                dots = node.text().chars().filter(|&c| c == '.').count() as u32;
            }
        }
        for child in &node.children {
            dots += count_dots(child);
        }
        dots
    }
    count_dots(node)
}

fn enclosing_callable(scopes: &[Scope]) -> NodeId {
    scopes
        .iter()
        .rev()
        .find(|s| s.kind.is_callable())
        .map(|s| s.node_id.clone())
        .unwrap_or_else(|| scopes[0].node_id.clone())
}

fn lookup_variable(scopes: &[Scope], name: &str) -> Option<NodeId> {
    scopes
        .iter()
        .rev()
        .find_map(|s| s.variables.get(name).cloned())
}

/// Free identifiers in a lambda body (excluding its own parameters).
fn free_variables(node: &SyntaxNode, params: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    let body: Vec<&SyntaxNode> = node
        .children
        .iter()
        .filter(|c| {
            !matches!(
                c.raw_kind.as_deref(),
                Some("parameters") | Some("lambda_parameters") | Some("formal_parameters")
            )
        })
        .collect();
    for part in body {
        for leaf in identifier_leaves(part) {
            if !params.contains(&leaf) && !seen.contains(&leaf) {
                seen.push(leaf);
            }
        }
    }
    seen
}

/// Count cyclomatic contributors inside one definition body, stopping at
/// nested definitions (their complexity is their own).
fn control_flow_summary(node: &SyntaxNode) -> ControlFlowSummary {
    let body = node.descendants_until_definition();

    let mut branch_count = 0u32;
    let mut short_circuit = 0u32;
    let mut handlers = 0u32;
    let mut comprehensions = 0u32;
    let mut match_cases = 0u32;
    let mut has_loop = false;
    let mut has_try = false;

    for d in &body {
        match d.kind {
            SyntaxKind::IfStmt => branch_count += 1,
            SyntaxKind::ForStmt | SyntaxKind::WhileStmt => {
                branch_count += 1;
                has_loop = true;
            }
            SyntaxKind::BooleanExpr => short_circuit += 1,
            SyntaxKind::ExceptClause => handlers += 1,
            SyntaxKind::TryStmt => has_try = true,
            SyntaxKind::ComprehensionExpr => comprehensions += 1,
            SyntaxKind::MatchCase => match_cases += 1,
            _ => {}
        }
    }

    ControlFlowSummary {
        cyclomatic: 1 + branch_count + short_circuit + handlers + comprehensions + match_cases,
        has_loop,
        has_try,
        branch_count: branch_count + match_cases,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::parsing::ResilientParser;

    fn build(source: &str) -> IrDocument {
        let parser = ResilientParser::python();
        let tree = parser.parse(source, "app/main.py").unwrap();
        StructuralIrBuilder::new("repo").build(&tree)
    }

    #[test]
    fn test_module_fqn_from_path() {
        assert_eq!(module_fqn_from_path("src/app/client.py"), "src.app.client");
        assert_eq!(module_fqn_from_path("./a.py"), "a");
    }

    #[test]
    fn test_file_node_and_function() {
        let doc = build("def main():\n    pass\n");
        assert!(doc.file_node().is_some());
        let func = doc.find_by_fqn("app.main.main").expect("function node");
        assert_eq!(func.kind, NodeKind::Function);

        let contains: Vec<_> = doc.edges_of_kind(EdgeKind::Contains).collect();
        assert!(contains
            .iter()
            .any(|e| e.source_id == doc.file_node().unwrap().id && e.target_id == func.id));
    }

    #[test]
    fn test_method_inside_class() {
        let doc = build("class Service:\n    def run(self):\n        pass\n");
        let class = doc.find_by_fqn("app.main.Service").unwrap();
        assert_eq!(class.kind, NodeKind::Class);
        let method = doc.find_by_fqn("app.main.Service.run").unwrap();
        assert_eq!(method.kind, NodeKind::Method);
        assert_eq!(method.parent_id.as_ref(), Some(&class.id));
    }

    #[test]
    fn test_inherits_external_target() {
        let doc = build("class Child(Base):\n    pass\n");
        let inherits: Vec<_> = doc.edges_of_kind(EdgeKind::Inherits).collect();
        assert_eq!(inherits.len(), 1);
        assert_eq!(inherits[0].target_id, "external:Base");
    }

    #[test]
    fn test_inherits_internal_target() {
        let doc = build("class Base:\n    pass\n\nclass Child(Base):\n    pass\n");
        let base = doc.find_by_fqn("app.main.Base").unwrap();
        let inherits: Vec<_> = doc.edges_of_kind(EdgeKind::Inherits).collect();
        assert_eq!(inherits[0].target_id, base.id);
    }

    #[test]
    fn test_call_edge_unresolved_callee() {
        let doc = build("def go():\n    fetch_remote()\n");
        let calls: Vec<_> = doc.edges_of_kind(EdgeKind::Calls).collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].target_id, "external:fetch_remote");
        assert_eq!(
            calls[0].attrs.get("resolved").and_then(|v| v.as_bool()),
            Some(false)
        );
    }

    #[test]
    fn test_call_edge_resolved_within_file() {
        let doc = build("def helper():\n    pass\n\ndef go():\n    helper()\n");
        let helper = doc.find_by_fqn("app.main.helper").unwrap();
        let calls: Vec<_> = doc.edges_of_kind(EdgeKind::Calls).collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].target_id, helper.id);
    }

    #[test]
    fn test_import_edge_attached_to_file() {
        let doc = build("import os.path\n\ndef f():\n    pass\n");
        let imports: Vec<_> = doc.edges_of_kind(EdgeKind::Imports).collect();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].source_id, doc.file_node().unwrap().id);
        let import_node = doc.get_node(&imports[0].target_id).unwrap();
        assert_eq!(import_node.name, "os.path");
    }

    #[test]
    fn test_lambda_captures_enclosing_variable() {
        let doc = build("def outer():\n    factor = 2\n    scale = lambda x: x * factor\n");
        let captures: Vec<_> = doc.edges_of_kind(EdgeKind::Captures).collect();
        assert_eq!(captures.len(), 1);
        let target = doc.get_node(&captures[0].target_id).unwrap();
        assert_eq!(target.name, "factor");
    }

    #[test]
    fn test_cyclomatic_complexity() {
        let doc = build(
            "def gnarly(x):\n    if x and x > 1:\n        return 1\n    for i in range(3):\n        try:\n            go()\n        except ValueError:\n            pass\n    return 0\n",
        );
        let func = doc.find_by_fqn("app.main.gnarly").unwrap();
        let summary = func.control_flow_summary.as_ref().unwrap();
        // 1 base + if + boolean + for + except
        assert_eq!(summary.cyclomatic, 5);
        assert!(summary.has_loop);
        assert!(summary.has_try);
        assert_eq!(summary.branch_count, 2);
    }

    #[test]
    fn test_deterministic_node_ids_across_runs() {
        let a = build("def main():\n    pass\n");
        let b = build("def main():\n    pass\n");
        let ids_a: Vec<_> = a.nodes.iter().map(|n| n.id.clone()).collect();
        let ids_b: Vec<_> = b.nodes.iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids_a, ids_b);
    }
}
