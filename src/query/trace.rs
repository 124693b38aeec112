use std::collections::{HashSet, VecDeque};

use petgraph::Direction;
use serde::Serialize;

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::graph::GraphStore;
use crate::graph::edge::EdgeKind;
use crate::graph::node::GraphNode;

/// Which adjacency a trace follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceDirection {
    /// Outgoing edges: what does the start reach?
    Forward,
    /// Incoming edges: what reaches the start?
    Backward,
}

impl TraceDirection {
    fn petgraph(self) -> Direction {
        match self {
            TraceDirection::Forward => Direction::Outgoing,
            TraceDirection::Backward => Direction::Incoming,
        }
    }

    pub fn parse(s: &str) -> Option<TraceDirection> {
        match s.to_lowercase().as_str() {
            "forward" | "down" | "callees" => Some(TraceDirection::Forward),
            "backward" | "up" | "callers" => Some(TraceDirection::Backward),
            _ => None,
        }
    }
}

/// A node reached by a trace, with its minimum distance from the start.
#[derive(Debug, Clone, Serialize)]
pub struct TraceHop {
    pub node: GraphNode,
    pub depth: usize,
}

/// The result of a bounded breadth-first trace.
#[derive(Debug, Clone, Serialize)]
pub struct TraceResult {
    /// False when the start id did not name a node; the trace is then empty
    /// rather than an error.
    pub start_found: bool,
    /// Reached nodes in breadth-first order, each at its minimum depth in
    /// `1..=max_depth`. The start node itself is not included.
    pub nodes: Vec<TraceHop>,
}

/// Bounded BFS from `start_id`. `edge_kinds: None` follows all edge kinds
/// (the generic trace default); the caller/callee convenience APIs pass
/// `[Calls]`. The visited set guarantees termination on cycles; the
/// cancellation token is checked at every node expansion.
pub fn trace(
    store: &GraphStore,
    start_id: &str,
    direction: TraceDirection,
    max_depth: usize,
    edge_kinds: Option<&[EdgeKind]>,
    cancel: Option<&CancellationToken>,
) -> Result<TraceResult> {
    let Some(start) = store.node_index(start_id) else {
        return Ok(TraceResult {
            start_found: false,
            nodes: Vec::new(),
        });
    };

    let mut result = TraceResult {
        start_found: true,
        nodes: Vec::new(),
    };
    let mut visited = HashSet::from([start]);
    let mut queue = VecDeque::from([(start, 0usize)]);

    while let Some((idx, depth)) = queue.pop_front() {
        if let Some(token) = cancel {
            token.check()?;
        }
        if depth >= max_depth {
            continue;
        }
        for (next, _) in store.neighbors(idx, direction.petgraph(), edge_kinds) {
            if !visited.insert(next) {
                continue;
            }
            result.nodes.push(TraceHop {
                node: store.node(next).clone(),
                depth: depth + 1,
            });
            queue.push_back((next, depth + 1));
        }
    }
    Ok(result)
}
