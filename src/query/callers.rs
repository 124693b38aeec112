use std::collections::HashSet;

use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;

use crate::graph::GraphStore;
use crate::graph::edge::EdgeKind;
use crate::graph::node::GraphNode;

/// Nodes that call `target`, where `target` is a node id or a short name
/// (all nodes bearing the name are considered). Unknown targets yield an
/// empty set, not an error.
pub fn get_callers(store: &GraphStore, target: &str) -> Vec<GraphNode> {
    collect_adjacent(store, target, Direction::Incoming)
}

/// Nodes called by `source`; symmetric to [`get_callers`] over outgoing
/// adjacency.
pub fn get_callees(store: &GraphStore, source: &str) -> Vec<GraphNode> {
    collect_adjacent(store, source, Direction::Outgoing)
}

fn collect_adjacent(store: &GraphStore, target: &str, direction: Direction) -> Vec<GraphNode> {
    let anchors: Vec<NodeIndex> = match store.node_index(target) {
        Some(idx) => vec![idx],
        None => store.nodes_by_name(target).to_vec(),
    };

    let mut seen: HashSet<&str> = HashSet::new();
    let mut results: Vec<GraphNode> = Vec::new();
    for anchor in anchors {
        for (other, _) in store.neighbors(anchor, direction, Some(&[EdgeKind::Calls])) {
            let node = store.node(other);
            if seen.insert(node.id.as_str()) {
                results.push(node.clone());
            }
        }
    }
    results.sort_by(|a, b| a.file.cmp(&b.file).then(a.line.cmp(&b.line)));
    results
}
