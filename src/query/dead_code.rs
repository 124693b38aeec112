use std::collections::{HashSet, VecDeque};

use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use regex::Regex;
use serde::Serialize;

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::graph::GraphStore;
use crate::graph::edge::EdgeKind;
use crate::graph::node::GraphNode;

/// A callable that no exported entry point reaches.
#[derive(Debug, Clone, Serialize)]
pub struct DeadSymbol {
    pub node: GraphNode,
    pub reason: String,
}

/// The result of exported-entry-point reachability analysis.
#[derive(Debug, Clone, Serialize)]
pub struct DeadCodeResult {
    /// Number of exported nodes used as reachability roots.
    pub entry_points: usize,
    /// Size of the union of all forward-reachable sets (roots included).
    pub reachable: usize,
    /// Unreachable callables, sorted by file then line.
    pub dead: Vec<DeadSymbol>,
}

const REASON: &str = "unreachable from exports";

/// Find callables unreachable from any exported node.
///
/// Entry points are all nodes with `is_exported = true`; from each, a forward
/// trace over `calls` edges with unbounded depth builds the reachable union.
/// Every callable (`function | method | constructor`) outside that union is
/// dead. `file_pattern` restricts the output only; reachability always runs
/// over the whole graph.
pub fn find_dead_code(
    store: &GraphStore,
    file_pattern: Option<&Regex>,
    cancel: Option<&CancellationToken>,
) -> Result<DeadCodeResult> {
    let entries: Vec<NodeIndex> = store
        .graph
        .node_indices()
        .filter(|&idx| store.node(idx).is_exported)
        .collect();

    // Multi-source BFS: the union of per-entry forward traces.
    let mut reachable: HashSet<NodeIndex> = entries.iter().copied().collect();
    let mut queue: VecDeque<NodeIndex> = entries.iter().copied().collect();
    while let Some(idx) = queue.pop_front() {
        if let Some(token) = cancel {
            token.check()?;
        }
        for (next, _) in store.neighbors(idx, Direction::Outgoing, Some(&[EdgeKind::Calls])) {
            if reachable.insert(next) {
                queue.push_back(next);
            }
        }
    }

    let mut dead: Vec<DeadSymbol> = Vec::new();
    for idx in store.graph.node_indices() {
        let node = store.node(idx);
        if !node.kind.is_callable() || reachable.contains(&idx) {
            continue;
        }
        if let Some(pattern) = file_pattern
            && !pattern.is_match(&node.file)
        {
            continue;
        }
        dead.push(DeadSymbol {
            node: node.clone(),
            reason: REASON.to_owned(),
        });
    }
    dead.sort_by(|a, b| {
        a.node
            .file
            .cmp(&b.node.file)
            .then(a.node.line.cmp(&b.node.line))
    });

    Ok(DeadCodeResult {
        entry_points: entries.len(),
        reachable: reachable.len(),
        dead,
    })
}
