//! Data flow graph domain model
//!
//! Per-function defs, uses, and flow edges. SSA versions are internal to
//! the builder; merge points surface as phi nodes whose operand def sites
//! feed the type inferencer's union types.

use serde::{Deserialize, Serialize};

use crate::shared::models::Span;

/// Variable kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableKind {
    Parameter,
    Local,
    Field,
    Global,
}

/// A variable within one function scope. Field accesses are tracked as
/// their own variables (`obj.name` is distinct from `obj`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub id: String,
    pub function_fqn: String,
    pub name: String,
    pub kind: VariableKind,
    pub declared_span: Span,
}

impl Variable {
    pub fn make_id(function_fqn: &str, name: &str) -> String {
        format!("{}::{}", function_fqn, name)
    }
}

/// Data flow edge kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DfgEdgeKind {
    Assign,
    Compute,
    Return,
    Param,
    FieldRead,
    FieldWrite,
}

/// Intra-procedural data flow edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DfgEdge {
    pub id: String,
    pub from_var: String,
    pub to_var: String,
    pub kind: DfgEdgeKind,
    pub span: Span,
    pub function_fqn: String,
}

/// Inter-procedural edge kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterProcEdgeKind {
    ArgToParam,
    ReturnToCallSite,
}

/// Inter-procedural data flow edge (argument passing / return values)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterProcEdge {
    pub id: String,
    pub kind: InterProcEdgeKind,
    pub from_var: String,
    pub to_var: String,
    pub call_site_id: String,
    pub caller_fqn: String,
    pub callee_fqn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg_position: Option<u32>,
}

/// How the right-hand side of a def site is shaped; consumed by the type
/// inference fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RhsShape {
    /// Literal text, e.g. `42`, `"s"`, `True`, `[1, 2]`
    Literal(String),
    /// Call with dotted callee name
    Call(String),
    /// Plain copy of another variable
    Name(String),
    /// Attribute read, dotted
    FieldAccess(String),
    /// Anything else
    Expr,
}

/// One definition of a variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefSite {
    pub id: String,
    pub variable: String,
    pub span: Span,
    pub rhs: RhsShape,
}

/// A use of a variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableUse {
    pub variable: String,
    pub span: Span,
}

/// Phi node inserted at a merge point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhiNode {
    pub id: String,
    pub variable: String,
    /// Def sites reaching the merge from each predecessor
    pub operands: Vec<DefSite>,
}

/// Per-function data flow graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataFlowGraph {
    pub function_fqn: String,
    pub variables: Vec<Variable>,
    /// Parameter names in declaration order
    pub parameters: Vec<String>,
    pub edges: Vec<DfgEdge>,
    pub defs: Vec<DefSite>,
    pub uses: Vec<VariableUse>,
    pub phi_nodes: Vec<PhiNode>,
}

impl DataFlowGraph {
    pub fn new(function_fqn: impl Into<String>) -> Self {
        Self {
            function_fqn: function_fqn.into(),
            ..Default::default()
        }
    }

    pub fn get_variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn edges_of_kind(&self, kind: DfgEdgeKind) -> Vec<&DfgEdge> {
        self.edges.iter().filter(|e| e.kind == kind).collect()
    }

    pub fn edges_into(&self, var_id: &str) -> Vec<&DfgEdge> {
        self.edges.iter().filter(|e| e.to_var == var_id).collect()
    }

    pub fn phi_for(&self, variable: &str) -> Option<&PhiNode> {
        self.phi_nodes.iter().find(|p| p.variable == variable)
    }

    /// Name of the synthetic return variable
    pub fn return_variable(function_fqn: &str) -> String {
        Variable::make_id(function_fqn, "<return>")
    }
}
