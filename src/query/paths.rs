use std::collections::VecDeque;

use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use serde::Serialize;

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::graph::GraphStore;
use crate::graph::edge::EdgeKind;
use crate::graph::node::GraphNode;

/// The result of simple-path enumeration between two nodes.
#[derive(Debug, Clone, Serialize)]
pub struct PathsResult {
    pub start_found: bool,
    pub target_found: bool,
    /// Simple paths over `calls` edges, sorted by length ascending (ties keep
    /// discovery order). Each path includes both endpoints; `from == to`
    /// yields the single zero-length path `[from]`.
    pub paths: Vec<Vec<GraphNode>>,
    /// True when enumeration stopped at the result cap.
    pub truncated: bool,
}

/// Enumerate simple paths from `from_id` to `to_id` over `calls` edges, up to
/// `max_depth` hops and at most `max_paths` results.
///
/// This is a BFS over path states `(current, path)`, not a plain node BFS: a
/// node may appear in many paths, but never twice in one (simple paths), so
/// cycles terminate. A path reaching the target is recorded and not extended.
/// The cancellation token is checked at every expansion.
pub fn find_paths(
    store: &GraphStore,
    from_id: &str,
    to_id: &str,
    max_depth: usize,
    max_paths: usize,
    cancel: Option<&CancellationToken>,
) -> Result<PathsResult> {
    let from = store.node_index(from_id);
    let to = store.node_index(to_id);
    let (Some(from), Some(to)) = (from, to) else {
        return Ok(PathsResult {
            start_found: from.is_some(),
            target_found: to.is_some(),
            paths: Vec::new(),
            truncated: false,
        });
    };

    let mut result = PathsResult {
        start_found: true,
        target_found: true,
        paths: Vec::new(),
        truncated: false,
    };

    if from == to {
        result.paths.push(vec![store.node(from).clone()]);
        return Ok(result);
    }

    let mut queue: VecDeque<Vec<NodeIndex>> = VecDeque::from([vec![from]]);
    'outer: while let Some(path) = queue.pop_front() {
        if let Some(token) = cancel {
            token.check()?;
        }
        let current = *path.last().expect("paths are never empty");
        if path.len() > max_depth {
            continue;
        }
        for (next, _) in store.neighbors(current, Direction::Outgoing, Some(&[EdgeKind::Calls])) {
            if path.contains(&next) {
                continue; // simple paths only
            }
            let mut extended = path.clone();
            extended.push(next);
            if next == to {
                result.paths.push(
                    extended.iter().map(|&idx| store.node(idx).clone()).collect(),
                );
                if result.paths.len() >= max_paths {
                    result.truncated = true;
                    break 'outer;
                }
            } else {
                queue.push_back(extended);
            }
        }
    }

    // BFS discovers paths in nondecreasing length already; the stable sort
    // keeps discovery order among equal lengths.
    result.paths.sort_by_key(Vec::len);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::{EdgeDraft, EdgeTarget};
    use crate::graph::node::node_id;
    use crate::model::SymbolKind;

    fn node(qname: &str) -> GraphNode {
        GraphNode {
            id: node_id("p.ts", qname),
            name: qname.to_owned(),
            qualified_name: qname.to_owned(),
            kind: SymbolKind::Function,
            file: "p.ts".to_owned(),
            line: 1,
            is_exported: false,
        }
    }

    fn call(from: &str, to: &str) -> EdgeDraft {
        EdgeDraft {
            from: node_id("p.ts", from),
            to: EdgeTarget::Name(to.to_owned()),
            kind: EdgeKind::Calls,
            line: 1,
        }
    }

    /// a -> b -> d, a -> c -> d, a -> d (three paths a..d), plus cycle d -> a.
    fn fixture() -> GraphStore {
        let mut store = GraphStore::new();
        store.add_file(
            "p.ts",
            false,
            vec![node("a"), node("b"), node("c"), node("d")],
            vec![
                call("a", "b"),
                call("b", "d"),
                call("a", "c"),
                call("c", "d"),
                call("a", "d"),
                call("d", "a"),
            ],
        );
        store.resolve_pending(0.7);
        store
    }

    fn path_names(path: &[GraphNode]) -> Vec<&str> {
        path.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn test_all_paths_sorted_by_length() {
        let store = fixture();
        let result = find_paths(&store, "p.ts:a", "p.ts:d", 10, 100, None).unwrap();
        assert_eq!(result.paths.len(), 3);
        assert_eq!(path_names(&result.paths[0]), vec!["a", "d"], "shortest first");
        assert_eq!(result.paths[1].len(), 3);
        assert_eq!(result.paths[2].len(), 3);
        assert!(!result.truncated);
    }

    #[test]
    fn test_paths_are_simple_under_cycles() {
        let store = fixture();
        let result = find_paths(&store, "p.ts:a", "p.ts:d", 10, 100, None).unwrap();
        for path in &result.paths {
            let mut ids: Vec<_> = path.iter().map(|n| n.id.as_str()).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), path.len(), "no node repeats within a path");
        }
    }

    #[test]
    fn test_max_depth_bound() {
        let store = fixture();
        let result = find_paths(&store, "p.ts:a", "p.ts:d", 1, 100, None).unwrap();
        assert_eq!(result.paths.len(), 1, "only the direct edge fits in depth 1");
    }

    #[test]
    fn test_zero_length_path() {
        let store = fixture();
        let result = find_paths(&store, "p.ts:a", "p.ts:a", 5, 100, None).unwrap();
        assert_eq!(result.paths.len(), 1);
        assert_eq!(path_names(&result.paths[0]), vec!["a"]);
    }

    #[test]
    fn test_unknown_endpoints_flagged() {
        let store = fixture();
        let result = find_paths(&store, "p.ts:ghost", "p.ts:d", 5, 100, None).unwrap();
        assert!(!result.start_found);
        assert!(result.target_found);
        assert!(result.paths.is_empty());
    }

    #[test]
    fn test_path_cap_truncates() {
        let store = fixture();
        let result = find_paths(&store, "p.ts:a", "p.ts:d", 10, 2, None).unwrap();
        assert_eq!(result.paths.len(), 2);
        assert!(result.truncated);
    }

    #[test]
    fn test_cancellation() {
        let store = fixture();
        let token = CancellationToken::new();
        token.cancel();
        let err = find_paths(&store, "p.ts:a", "p.ts:d", 10, 100, Some(&token)).unwrap_err();
        assert!(matches!(err, crate::error::AtlasError::Cancelled));
    }
}
