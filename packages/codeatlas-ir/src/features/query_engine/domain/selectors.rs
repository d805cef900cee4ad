//! Query selectors and combinators
//!
//! Node selectors pick path endpoints; edge-kind sets restrict which
//! layers a path may traverse. `Var(None)` is the wildcard selector and
//! expands lazily during evaluation.

use serde::{Deserialize, Serialize};

/// Node selector for query endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeSelector {
    /// Variable by name; None matches any variable (wildcard)
    Var(Option<String>),
    /// Field-sensitive selector: `Field("user", "id")` matches `user.id`
    /// and nothing else
    Field(String, String),
    /// Class by name
    Class(String),
    /// Function by fully qualified name
    Function(String),
    /// Pinned node id
    Id(String),
    /// Any node of any kind
    Any,
}

impl NodeSelector {
    pub fn var(name: impl Into<String>) -> Self {
        NodeSelector::Var(Some(name.into()))
    }

    pub fn any_var() -> Self {
        NodeSelector::Var(None)
    }

    pub fn field(object: impl Into<String>, field: impl Into<String>) -> Self {
        NodeSelector::Field(object.into(), field.into())
    }
}

/// Edge kinds visible to the query layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryEdgeKind {
    Dfg,
    Cfg,
    Calls,
    Contains,
    InterProc,
    Field,
}

/// Set of edge kinds, built with `|`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeKindSet {
    kinds: Vec<QueryEdgeKind>,
}

impl EdgeKindSet {
    pub fn of(kind: QueryEdgeKind) -> Self {
        Self { kinds: vec![kind] }
    }

    pub fn all() -> Self {
        Self {
            kinds: vec![
                QueryEdgeKind::Dfg,
                QueryEdgeKind::Cfg,
                QueryEdgeKind::Calls,
                QueryEdgeKind::Contains,
                QueryEdgeKind::InterProc,
                QueryEdgeKind::Field,
            ],
        }
    }

    /// Default for value-flow queries: data flow plus inter-procedural
    /// and field edges.
    pub fn data_flow() -> Self {
        EdgeKindSet::of(QueryEdgeKind::Dfg) | QueryEdgeKind::InterProc | QueryEdgeKind::Field
    }

    pub fn contains(&self, kind: QueryEdgeKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn kinds(&self) -> &[QueryEdgeKind] {
        &self.kinds
    }
}

impl std::ops::BitOr<QueryEdgeKind> for EdgeKindSet {
    type Output = EdgeKindSet;

    fn bitor(mut self, rhs: QueryEdgeKind) -> Self::Output {
        if !self.kinds.contains(&rhs) {
            self.kinds.push(rhs);
        }
        self
    }
}

impl std::ops::BitOr for QueryEdgeKind {
    type Output = EdgeKindSet;

    fn bitor(self, rhs: Self) -> Self::Output {
        EdgeKindSet::of(self) | rhs
    }
}

/// Path query: source selector, sink selector, and traversal limits.
///
/// Built with `source.to(sink)` (the `a >> b` form) and refined with
/// `via` / `depth` / `limit_paths` / `timeout`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathQuery {
    pub source: NodeSelector,
    pub sink: NodeSelector,
    pub via: EdgeKindSet,
    pub max_depth: usize,
    pub limit_paths: usize,
    pub timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink_id: Option<String>,
}

pub const DEFAULT_MAX_DEPTH: usize = 50;
pub const DEFAULT_LIMIT_PATHS: usize = 100;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

impl PathQuery {
    pub fn new(source: NodeSelector, sink: NodeSelector) -> Self {
        Self {
            source,
            sink,
            via: EdgeKindSet::all(),
            max_depth: DEFAULT_MAX_DEPTH,
            limit_paths: DEFAULT_LIMIT_PATHS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            source_id: None,
            sink_id: None,
        }
    }

    pub fn via(mut self, kinds: EdgeKindSet) -> Self {
        self.via = kinds;
        self
    }

    pub fn depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn limit_paths(mut self, limit: usize) -> Self {
        self.limit_paths = limit;
        self
    }

    pub fn timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn source_id(mut self, id: impl Into<String>) -> Self {
        self.source_id = Some(id.into());
        self
    }

    pub fn sink_id(mut self, id: impl Into<String>) -> Self {
        self.sink_id = Some(id.into());
        self
    }
}

impl NodeSelector {
    /// `a.to(b)`: path query from a to b (the `a >> b` combinator).
    pub fn to(self, sink: NodeSelector) -> PathQuery {
        PathQuery::new(self, sink)
    }
}

impl std::ops::Shr for NodeSelector {
    type Output = PathQuery;

    fn shr(self, rhs: NodeSelector) -> PathQuery {
        PathQuery::new(self, rhs)
    }
}

/// One enumerated path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathResult {
    pub node_ids: Vec<String>,
}

/// Query outcome; `truncated` is set when the deadline expired before the
/// search space was exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub paths: Vec<PathResult>,
    pub truncated: bool,
}
