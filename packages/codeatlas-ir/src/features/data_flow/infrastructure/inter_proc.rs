//! Inter-procedural data flow linking
//!
//! Connects call sites across functions: each positional argument flows
//! into the callee's matching parameter (ArgToParam), and the callee's
//! synthetic return variable flows back into the variable the call's
//! result is assigned to (ReturnToCallSite).

use std::collections::HashMap;

use crate::features::data_flow::domain::{
    DataFlowGraph, InterProcEdge, InterProcEdgeKind, RhsShape, Variable,
};
use crate::features::parsing::domain::{SyntaxKind, SyntaxNode};
use crate::features::structural_ir::domain::IrDocument;
use crate::shared::models::{EdgeKind, Span};

pub struct InterProcLinker;

impl InterProcLinker {
    /// Link call sites in one document against the DFGs of every known
    /// function (callees may live in other files).
    pub fn link(
        doc: &IrDocument,
        root: &SyntaxNode,
        dfgs: &HashMap<String, DataFlowGraph>,
    ) -> Vec<InterProcEdge> {
        let mut edges = Vec::new();

        for call in doc.edges_of_kind(EdgeKind::Calls) {
            let Some(caller) = doc.get_node(&call.source_id) else {
                continue;
            };
            let Some(callee) = doc.get_node(&call.target_id) else {
                continue; // external callee
            };
            let Some(callee_dfg) = dfgs.get(&callee.fqn) else {
                continue;
            };
            let Some(span) = call.span else {
                continue;
            };
            let Some(call_expr) = find_call_at(root, span) else {
                continue;
            };

            // ArgToParam: positional arguments onto parameters
            let args = positional_args(call_expr);
            for (position, arg_name) in args.iter().enumerate() {
                let Some(arg_name) = arg_name else {
                    continue; // literal or complex expression argument
                };
                let Some(param) = callee_dfg.parameters.get(position) else {
                    continue;
                };
                let from = Variable::make_id(&caller.fqn, arg_name);
                let to = Variable::make_id(&callee.fqn, param);
                edges.push(InterProcEdge {
                    id: format!("{}=>{}@{}", from, to, span.start_line),
                    kind: InterProcEdgeKind::ArgToParam,
                    from_var: from,
                    to_var: to,
                    call_site_id: call.id.clone(),
                    caller_fqn: caller.fqn.clone(),
                    callee_fqn: callee.fqn.clone(),
                    arg_position: Some(position as u32),
                });
            }

            // ReturnToCallSite: callee return value into the assigned var
            if let Some(caller_dfg) = dfgs.get(&caller.fqn) {
                if let Some(target) = assigned_target_of_call(caller_dfg, &callee.name, span) {
                    let from = DataFlowGraph::return_variable(&callee.fqn);
                    let to = Variable::make_id(&caller.fqn, &target);
                    edges.push(InterProcEdge {
                        id: format!("{}=>{}@{}", from, to, span.start_line),
                        kind: InterProcEdgeKind::ReturnToCallSite,
                        from_var: from,
                        to_var: to,
                        call_site_id: call.id.clone(),
                        caller_fqn: caller.fqn.clone(),
                        callee_fqn: callee.fqn.clone(),
                        arg_position: None,
                    });
                }
            }
        }

        edges
    }
}

/// Find the call expression whose span starts where the call edge points.
fn find_call_at(node: &SyntaxNode, span: Span) -> Option<&SyntaxNode> {
    if node.kind == SyntaxKind::CallExpr
        && node.span.start_line == span.start_line
        && node.span.start_col == span.start_col
    {
        return Some(node);
    }
    for child in &node.children {
        if let Some(found) = find_call_at(child, span) {
            return Some(found);
        }
    }
    None
}

/// Positional argument variable names; None entries are non-name args.
fn positional_args(call: &SyntaxNode) -> Vec<Option<String>> {
    let Some(arg_list) = call
        .children
        .iter()
        .find(|c| matches!(c.raw_kind.as_deref(), Some("argument_list") | Some("arguments")))
    else {
        return Vec::new();
    };
    arg_list
        .children
        .iter()
        .filter(|c| !c.is_token())
        .map(|arg| match arg.kind {
            SyntaxKind::NameExpr => Some(arg.text().to_string()),
            _ => None,
        })
        .collect()
}

/// Variable a call's result is assigned to, found through the caller's
/// def sites (`x = callee(...)` on the call line).
fn assigned_target_of_call(dfg: &DataFlowGraph, callee_name: &str, span: Span) -> Option<String> {
    dfg.defs.iter().find_map(|def| {
        if def.span.start_line != span.start_line {
            return None;
        }
        match &def.rhs {
            RhsShape::Call(path) => {
                let short = path.rsplit('.').next().unwrap_or(path);
                if short == callee_name {
                    Some(def.variable.clone())
                } else {
                    None
                }
            }
            _ => None,
        }
    })
}
