use serde::{Deserialize, Serialize};

/// The kind of directed edge between two nodes in the code graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Caller -> callee. Originates only from callable nodes.
    Calls,
    /// File node -> imported target.
    Imports,
    /// Container -> member, mirroring the symbol tree.
    Contains,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Calls => "calls",
            EdgeKind::Imports => "imports",
            EdgeKind::Contains => "contains",
        }
    }
}

/// Payload of a resolved edge in the adjacency. Confidence starts at 1.0 and
/// is multiplied down when the resolver had to pick among ambiguous targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub kind: EdgeKind,
    /// 1-based source line of the relation site.
    pub line: usize,
    pub confidence: f32,
}

impl EdgeData {
    pub fn new(kind: EdgeKind, line: usize) -> Self {
        Self {
            kind,
            line,
            confidence: 1.0,
        }
    }
}

/// An edge whose target is still a raw name. Lives in the store's pending
/// table until the resolver links it to a node, or forever when no target
/// exists (still a valid, observable edge).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedEdge {
    /// Node id of the (always resolved) origin.
    pub from: String,
    /// Raw target name as written at the relation site.
    pub to_name: String,
    pub kind: EdgeKind,
    pub line: usize,
    pub confidence: f32,
}

/// The target of an edge draft handed to `GraphStore::add`: either an already
/// known node id (contains edges) or a raw name awaiting resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeTarget {
    Node(String),
    Name(String),
}

/// An edge as produced by the lowering pass, before insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeDraft {
    pub from: String,
    pub to: EdgeTarget,
    pub kind: EdgeKind,
    pub line: usize,
}
