//! DFG/SSA builder (L3)
//!
//! Walks function bodies in structured order, tracking the current def of
//! every variable. Branch merge points (if/else, loops, try handlers)
//! insert phi nodes whose operands are the reaching def sites. Field
//! accesses are their own variables, keeping the graph field-sensitive.

use std::collections::HashMap;

use crate::features::data_flow::domain::{
    DataFlowGraph, DefSite, DfgEdge, DfgEdgeKind, PhiNode, RhsShape, Variable, VariableKind,
    VariableUse,
};
use crate::features::parsing::domain::{SyntaxKind, SyntaxNode};
use crate::features::structural_ir::domain::IrDocument;
use crate::shared::models::{EdgeKind, NodeKind, Span};

pub struct DfgBuilder;

impl DfgBuilder {
    /// Build per-function DFGs for every callable in the document.
    pub fn build_all(doc: &IrDocument, root: &SyntaxNode) -> Vec<DataFlowGraph> {
        let mut graphs = Vec::new();
        for func in doc.callables() {
            if let Some(syntax) = root.find_definition_at(func.span.start_line) {
                graphs.push(Self::build_function(&func.fqn, syntax));
            }
        }
        Self::link_captures(doc, &mut graphs);
        graphs
    }

    /// Build the DFG for one function from its syntax subtree.
    pub fn build_function(function_fqn: &str, syntax: &SyntaxNode) -> DataFlowGraph {
        let mut ctx = FnCtx::new(function_fqn);

        let parameters = parameter_names(syntax);
        for param in &parameters {
            ctx.declare(param, VariableKind::Parameter, syntax.span);
        }

        let statements = syntax.body_statements();
        ctx.walk_stmts(&statements);

        let mut variables: Vec<Variable> = ctx.variables.into_values().collect();
        variables.sort_by(|a, b| a.id.cmp(&b.id));

        DataFlowGraph {
            function_fqn: function_fqn.to_string(),
            variables,
            parameters,
            edges: ctx.edges,
            defs: ctx.all_defs,
            uses: ctx.uses,
            phi_nodes: ctx.phis,
        }
    }

    /// Captured variables participate as implicit parameter edges into the
    /// capturing lambda's scope.
    fn link_captures(doc: &IrDocument, graphs: &mut [DataFlowGraph]) {
        for capture in doc.edges_of_kind(EdgeKind::Captures) {
            let Some(lambda) = doc.get_node(&capture.source_id) else {
                continue;
            };
            let Some(var_node) = doc.get_node(&capture.target_id) else {
                continue;
            };
            if lambda.kind != NodeKind::Lambda {
                continue;
            }
            let Some(owner_fqn) = var_node.fqn.rsplit_once('.').map(|(owner, _)| owner) else {
                continue;
            };

            let from = Variable::make_id(owner_fqn, &var_node.name);
            let to = Variable::make_id(&lambda.fqn, &var_node.name);
            if let Some(graph) = graphs.iter_mut().find(|g| g.function_fqn == lambda.fqn) {
                graph.variables.push(Variable {
                    id: to.clone(),
                    function_fqn: lambda.fqn.clone(),
                    name: var_node.name.clone(),
                    kind: VariableKind::Parameter,
                    declared_span: lambda.span,
                });
                let id = format!("{}->{}", from, to);
                graph.edges.push(DfgEdge {
                    id,
                    from_var: from,
                    to_var: to,
                    kind: DfgEdgeKind::Param,
                    span: lambda.span,
                    function_fqn: lambda.fqn.clone(),
                });
            }
        }
    }
}

struct FnCtx {
    function_fqn: String,
    variables: HashMap<String, Variable>,
    /// variable name → currently reaching def
    defs: HashMap<String, DefSite>,
    all_defs: Vec<DefSite>,
    edges: Vec<DfgEdge>,
    uses: Vec<VariableUse>,
    phis: Vec<PhiNode>,
    def_counter: u32,
    phi_counter: u32,
}

impl FnCtx {
    fn new(function_fqn: &str) -> Self {
        Self {
            function_fqn: function_fqn.to_string(),
            variables: HashMap::new(),
            defs: HashMap::new(),
            all_defs: Vec::new(),
            edges: Vec::new(),
            uses: Vec::new(),
            phis: Vec::new(),
            def_counter: 0,
            phi_counter: 0,
        }
    }

    fn declare(&mut self, name: &str, kind: VariableKind, span: Span) -> String {
        let id = Variable::make_id(&self.function_fqn, name);
        self.variables.entry(name.to_string()).or_insert(Variable {
            id: id.clone(),
            function_fqn: self.function_fqn.clone(),
            name: name.to_string(),
            kind,
            declared_span: span,
        });
        id
    }

    fn define(&mut self, name: &str, kind: VariableKind, span: Span, rhs: RhsShape) -> String {
        let var_id = self.declare(name, kind, span);
        let def = DefSite {
            id: format!("{}#{}", var_id, self.def_counter),
            variable: name.to_string(),
            span,
            rhs,
        };
        self.def_counter += 1;
        self.defs.insert(name.to_string(), def.clone());
        self.all_defs.push(def);
        var_id
    }

    fn record_use(&mut self, name: &str, span: Span) {
        if self.variables.contains_key(name) {
            self.uses.push(VariableUse {
                variable: name.to_string(),
                span,
            });
        }
    }

    fn edge(&mut self, from: &str, to: &str, kind: DfgEdgeKind, span: Span) {
        let id = format!("{}->{}:{:?}", from, to, kind);
        if self.edges.iter().any(|e| e.id == id) {
            return;
        }
        self.edges.push(DfgEdge {
            id,
            from_var: from.to_string(),
            to_var: to.to_string(),
            kind,
            span,
            function_fqn: self.function_fqn.clone(),
        });
    }

    fn walk_stmts(&mut self, stmts: &[&SyntaxNode]) {
        for stmt in stmts {
            self.walk_stmt(stmt);
        }
    }

    fn walk_stmt(&mut self, stmt: &SyntaxNode) {
        match stmt.kind {
            SyntaxKind::AssignmentStmt => self.handle_assignment(stmt),
            SyntaxKind::ReturnStmt => self.handle_return(stmt),
            SyntaxKind::IfStmt => self.handle_branch(stmt),
            SyntaxKind::ForStmt | SyntaxKind::WhileStmt => self.handle_loop(stmt),
            SyntaxKind::TryStmt => self.handle_try(stmt),
            SyntaxKind::WithStmt | SyntaxKind::MatchStmt | SyntaxKind::MatchCase => {
                let inner = stmt.body_statements();
                self.walk_stmts(&inner);
            }
            SyntaxKind::Block => {
                let inner: Vec<&SyntaxNode> =
                    stmt.children.iter().filter(|c| !c.is_token()).collect();
                self.walk_stmts(&inner);
            }
            // Nested definitions own their data flow
            SyntaxKind::FunctionDef | SyntaxKind::MethodDef | SyntaxKind::ClassDef => {}
            _ => {
                // `expression_statement` wraps assignments in Python
                let assignments: Vec<&SyntaxNode> = stmt
                    .children
                    .iter()
                    .filter(|c| c.kind == SyntaxKind::AssignmentStmt)
                    .collect();
                if assignments.is_empty() {
                    for name in read_names(stmt) {
                        self.record_use(&name, stmt.span);
                    }
                } else {
                    for assignment in assignments {
                        self.handle_assignment(assignment);
                    }
                }
            }
        }
    }

    fn handle_assignment(&mut self, stmt: &SyntaxNode) {
        let Some(rhs_node) = assignment_rhs(stmt) else {
            return;
        };
        let rhs_shape = classify_rhs(rhs_node);

        // Record uses and incoming edges from every variable read on the RHS
        let reads = read_names(rhs_node);

        match assignment_lhs(stmt) {
            Some(Lhs::Name(name)) => {
                let to_id = self.define(&name, VariableKind::Local, stmt.span, rhs_shape.clone());
                self.wire_rhs(rhs_node, &to_id, &rhs_shape, &reads, stmt.span);
            }
            Some(Lhs::Field(path)) => {
                // Field write: `obj.attr = rhs`
                let to_id = self.define(&path, VariableKind::Field, stmt.span, rhs_shape.clone());
                for read in &reads {
                    self.record_use(read, stmt.span);
                    let from = Variable::make_id(&self.function_fqn, read);
                    self.edge(&from, &to_id, DfgEdgeKind::FieldWrite, stmt.span);
                }
            }
            None => {}
        }
    }

    fn wire_rhs(
        &mut self,
        rhs_node: &SyntaxNode,
        to_id: &str,
        rhs_shape: &RhsShape,
        reads: &[String],
        span: Span,
    ) {
        match rhs_shape {
            RhsShape::Name(name) => {
                self.record_use(name, span);
                let from = Variable::make_id(&self.function_fqn, name);
                self.edge(&from, to_id, DfgEdgeKind::Assign, span);
            }
            RhsShape::FieldAccess(path) => {
                let from_id =
                    self.define_field_read(path, rhs_node.span);
                self.edge(&from_id, to_id, DfgEdgeKind::FieldRead, span);
            }
            _ => {
                for read in reads {
                    self.record_use(read, span);
                    let from = Variable::make_id(&self.function_fqn, read);
                    self.edge(&from, to_id, DfgEdgeKind::Compute, span);
                }
                // Field reads nested in a larger expression stay
                // field-sensitive
                for path in field_reads(rhs_node) {
                    let from_id = self.define_field_read(&path, span);
                    self.edge(&from_id, to_id, DfgEdgeKind::FieldRead, span);
                }
            }
        }
    }

    fn define_field_read(&mut self, path: &str, span: Span) -> String {
        self.declare(path, VariableKind::Field, span)
    }

    fn handle_return(&mut self, stmt: &SyntaxNode) {
        let ret_var = DataFlowGraph::return_variable(&self.function_fqn);
        let Some(value) = stmt.children.iter().find(|c| !c.is_token()) else {
            return;
        };
        let shape = classify_rhs(value);
        self.define("<return>", VariableKind::Local, stmt.span, shape);
        for name in read_names(value) {
            self.record_use(&name, stmt.span);
            let from = Variable::make_id(&self.function_fqn, &name);
            self.edge(&from, &ret_var, DfgEdgeKind::Return, stmt.span);
        }
    }

    fn handle_branch(&mut self, stmt: &SyntaxNode) {
        for name in read_names_shallow(stmt) {
            self.record_use(&name, stmt.span);
        }

        let before = self.defs.clone();

        let then_stmts = stmt.body_statements();
        self.walk_stmts(&then_stmts);
        let after_then = std::mem::replace(&mut self.defs, before.clone());

        for clause in &stmt.children {
            if matches!(
                clause.raw_kind.as_deref(),
                Some("elif_clause") | Some("else_clause")
            ) {
                let inner = clause.body_statements();
                self.walk_stmts(&inner);
            }
        }
        let after_else = std::mem::replace(&mut self.defs, before);

        self.merge_branches(&[after_then, after_else], stmt.span);
    }

    fn handle_loop(&mut self, stmt: &SyntaxNode) {
        // Loop target of `for x in xs` defines x
        if stmt.kind == SyntaxKind::ForStmt {
            if let Some(target) = stmt.children.iter().find(|c| c.kind == SyntaxKind::NameExpr) {
                self.define(
                    target.text(),
                    VariableKind::Local,
                    stmt.span,
                    RhsShape::Expr,
                );
            }
        }
        for name in read_names_shallow(stmt) {
            self.record_use(&name, stmt.span);
        }

        let before = self.defs.clone();
        let body = stmt.body_statements();
        self.walk_stmts(&body);
        let after_body = std::mem::replace(&mut self.defs, before.clone());

        // Variables redefined in the body merge with their entry defs at
        // the loop header
        self.merge_branches(&[before, after_body], stmt.span);
    }

    fn handle_try(&mut self, stmt: &SyntaxNode) {
        let before = self.defs.clone();
        let body = stmt.body_statements();
        self.walk_stmts(&body);
        let after_body = std::mem::replace(&mut self.defs, before.clone());

        let mut outcomes = vec![after_body];
        for clause in &stmt.children {
            if clause.kind == SyntaxKind::ExceptClause {
                self.defs = before.clone();
                let inner = clause.body_statements();
                self.walk_stmts(&inner);
                outcomes.push(std::mem::replace(&mut self.defs, before.clone()));
            }
        }

        self.defs = before;
        self.merge_branches(&outcomes, stmt.span);

        if let Some(finally) = stmt
            .children
            .iter()
            .find(|c| c.kind == SyntaxKind::FinallyClause)
        {
            let inner = finally.body_statements();
            self.walk_stmts(&inner);
        }
    }

    /// Merge branch outcomes: variables whose reaching defs differ across
    /// branches get a phi node; the phi becomes the current def.
    fn merge_branches(&mut self, outcomes: &[HashMap<String, DefSite>], span: Span) {
        let names: Vec<String> = outcomes
            .iter()
            .flat_map(|o| o.keys().cloned())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        for name in names {
            let reaching: Vec<&DefSite> = outcomes
                .iter()
                .filter_map(|o| o.get(&name))
                .collect();
            let mut unique_ids: Vec<&str> = reaching.iter().map(|d| d.id.as_str()).collect();
            unique_ids.sort_unstable();
            unique_ids.dedup();

            if unique_ids.len() > 1 {
                let phi = PhiNode {
                    id: format!("{}::phi{}", self.function_fqn, self.phi_counter),
                    variable: name.clone(),
                    operands: reaching.iter().map(|d| (*d).clone()).collect(),
                };
                self.phi_counter += 1;
                // The merged def reaches forward as the phi result
                let merged = DefSite {
                    id: phi.id.clone(),
                    variable: name.clone(),
                    span,
                    rhs: RhsShape::Expr,
                };
                self.defs.insert(name.clone(), merged);
                self.phis.push(phi);
            } else if let Some(def) = reaching.first() {
                self.defs.insert(name.clone(), (*def).clone());
            }
        }
    }
}

enum Lhs {
    Name(String),
    Field(String),
}

fn assignment_lhs(stmt: &SyntaxNode) -> Option<Lhs> {
    let first = stmt.children.iter().find(|c| !c.is_token())?;
    match first.kind {
        SyntaxKind::NameExpr => Some(Lhs::Name(first.text().to_string())),
        SyntaxKind::AttributeExpr => {
            let path = dotted_path(first)?;
            Some(Lhs::Field(path))
        }
        SyntaxKind::VariableDecl => {
            let name = first
                .children
                .iter()
                .find(|c| c.kind == SyntaxKind::NameExpr)
                .map(|c| c.text().to_string())?;
            Some(Lhs::Name(name))
        }
        _ => None,
    }
}

fn assignment_rhs(stmt: &SyntaxNode) -> Option<&SyntaxNode> {
    // RHS is the last non-token child that is not the LHS / annotation
    let non_tokens: Vec<&SyntaxNode> = stmt.children.iter().filter(|c| !c.is_token()).collect();
    if non_tokens.len() < 2 {
        // TS variable_declarator nesting
        if let Some(decl) = stmt
            .children
            .iter()
            .find(|c| c.kind == SyntaxKind::VariableDecl)
        {
            let inner: Vec<&SyntaxNode> = decl.children.iter().filter(|c| !c.is_token()).collect();
            return inner
                .last()
                .copied()
                .filter(|n| inner.len() >= 2 && n.kind != SyntaxKind::TypeAnnotation);
        }
        return None;
    }
    non_tokens
        .last()
        .copied()
        .filter(|n| n.kind != SyntaxKind::TypeAnnotation)
}

fn classify_rhs(rhs: &SyntaxNode) -> RhsShape {
    match rhs.kind {
        SyntaxKind::LiteralExpr => RhsShape::Literal(collect_text(rhs)),
        SyntaxKind::NameExpr => RhsShape::Name(rhs.text().to_string()),
        SyntaxKind::CallExpr => match rhs.children.first() {
            Some(callee) => match dotted_path(callee) {
                Some(path) => RhsShape::Call(path),
                None => RhsShape::Expr,
            },
            None => RhsShape::Expr,
        },
        SyntaxKind::AttributeExpr => match dotted_path(rhs) {
            Some(path) => RhsShape::FieldAccess(path),
            None => RhsShape::Expr,
        },
        SyntaxKind::AwaitExpr => rhs
            .children
            .iter()
            .find(|c| !c.is_token())
            .map(classify_rhs)
            .unwrap_or(RhsShape::Expr),
        _ => RhsShape::Expr,
    }
}

/// Dotted path of an attribute chain (`user.name`); None when the chain
/// contains calls or subscripts.
fn dotted_path(node: &SyntaxNode) -> Option<String> {
    match node.kind {
        SyntaxKind::NameExpr => Some(node.text().to_string()),
        SyntaxKind::AttributeExpr => {
            let parts: Vec<String> = node
                .children
                .iter()
                .filter(|c| !c.is_token())
                .map(|c| match c.kind {
                    SyntaxKind::NameExpr => Some(c.text().to_string()),
                    SyntaxKind::AttributeExpr => dotted_path(c),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("."))
            }
        }
        _ => None,
    }
}

/// Plain variable names read by an expression (attribute bases excluded;
/// field reads are collected separately to stay field-sensitive).
fn read_names(node: &SyntaxNode) -> Vec<String> {
    let mut out = Vec::new();
    collect_reads(node, &mut out);
    out
}

fn collect_reads(node: &SyntaxNode, out: &mut Vec<String>) {
    match node.kind {
        SyntaxKind::NameExpr => {
            let name = node.text().to_string();
            if !name.is_empty() && !out.contains(&name) {
                out.push(name);
            }
        }
        // Attribute chains are field variables, not reads of the base
        SyntaxKind::AttributeExpr => {}
        SyntaxKind::FunctionDef | SyntaxKind::MethodDef | SyntaxKind::ClassDef => {}
        SyntaxKind::CallExpr => {
            // Skip the callee name; arguments are reads
            for child in node.children.iter().skip(1) {
                collect_reads(child, out);
            }
        }
        _ => {
            for child in &node.children {
                collect_reads(child, out);
            }
        }
    }
}

/// Reads in a statement header only (condition/iterator), not its body.
fn read_names_shallow(stmt: &SyntaxNode) -> Vec<String> {
    let mut out = Vec::new();
    for child in &stmt.children {
        if child.kind != SyntaxKind::Block && !child.is_token() {
            collect_reads(child, &mut out);
        }
    }
    out
}

/// Dotted field reads anywhere below this node.
fn field_reads(node: &SyntaxNode) -> Vec<String> {
    let mut out = Vec::new();
    collect_field_reads(node, &mut out);
    out
}

fn collect_field_reads(node: &SyntaxNode, out: &mut Vec<String>) {
    if node.kind == SyntaxKind::AttributeExpr {
        if let Some(path) = dotted_path(node) {
            if !out.contains(&path) {
                out.push(path);
            }
            return;
        }
    }
    for child in &node.children {
        collect_field_reads(child, out);
    }
}

fn parameter_names(node: &SyntaxNode) -> Vec<String> {
    let mut out = Vec::new();
    for child in &node.children {
        if matches!(
            child.raw_kind.as_deref(),
            Some("parameters") | Some("lambda_parameters") | Some("formal_parameters")
        ) {
            for param in &child.children {
                if param.kind == SyntaxKind::ParameterDecl || param.kind == SyntaxKind::NameExpr {
                    if let Some(name) = first_identifier(param) {
                        if name != "self" && name != "cls" {
                            out.push(name);
                        }
                    }
                }
            }
        }
    }
    out
}

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
