pub mod build;
pub mod edge;
pub mod node;
pub mod resolve;

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use regex::Regex;
use serde::Serialize;

use crate::model::SymbolKind;

use edge::{EdgeData, EdgeDraft, EdgeKind, EdgeTarget, UnresolvedEdge};
use node::GraphNode;

/// Per-file bookkeeping in the store.
#[derive(Debug, Default, Clone)]
pub struct FileEntry {
    /// Every node declared in the file, in insertion order.
    pub nodes: Vec<NodeIndex>,
    /// Marker set when the file was indexed from a tree with syntax errors.
    pub parse_errors: bool,
}

/// Aggregate counts reported by [`GraphStore::stats`].
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StoreStats {
    pub nodes: usize,
    pub edges: usize,
    pub unresolved_edges: usize,
    pub files: usize,
    pub files_with_parse_errors: usize,
    pub files_skipped: usize,
}

/// The in-memory code graph: a petgraph `StableGraph` arena with O(1) lookup
/// indexes by id, short name, and file.
///
/// Resolved edges live in the adjacency; edges whose target is still a raw
/// name sit in the `pending` table until [`resolve`](Self::resolve_pending)
/// links them (or forever, observable via [`unresolved_edges`](Self::unresolved_edges)).
pub struct GraphStore {
    pub(crate) graph: StableGraph<GraphNode, EdgeData>,
    pub(crate) id_index: HashMap<String, NodeIndex>,
    pub(crate) name_index: HashMap<String, Vec<NodeIndex>>,
    pub(crate) file_index: HashMap<String, FileEntry>,
    pub(crate) pending: Vec<UnresolvedEdge>,
    /// Files the last scan skipped due to I/O errors (carried for stats).
    pub(crate) files_skipped: usize,
}

impl GraphStore {
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            id_index: HashMap::new(),
            name_index: HashMap::new(),
            file_index: HashMap::new(),
            pending: Vec::new(),
            files_skipped: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Insert the nodes and edges of one file. Nodes with an already-known id
    /// merge into the existing node (first wins); drafts targeting a known
    /// node id land in the adjacency, name targets in the pending table.
    pub fn add_file(
        &mut self,
        file: &str,
        parse_errors: bool,
        nodes: Vec<GraphNode>,
        edges: Vec<EdgeDraft>,
    ) {
        let entry = self.file_index.entry(file.to_owned()).or_default();
        entry.parse_errors = parse_errors;

        for node in nodes {
            if self.id_index.contains_key(&node.id) {
                continue; // duplicate (file, qualified name): first wins
            }
            let id = node.id.clone();
            let name = node.name.clone();
            let idx = self.graph.add_node(node);
            self.id_index.insert(id, idx);
            self.name_index.entry(name).or_default().push(idx);
            entry.nodes.push(idx);
        }

        for draft in edges {
            let Some(&from) = self.id_index.get(&draft.from) else {
                tracing::debug!(from = %draft.from, "dropping edge with unknown origin");
                continue;
            };
            match draft.to {
                EdgeTarget::Node(id) => match self.id_index.get(&id) {
                    Some(&to) => {
                        self.graph
                            .add_edge(from, to, EdgeData::new(draft.kind, draft.line));
                    }
                    None => self.pending.push(UnresolvedEdge {
                        from: draft.from,
                        to_name: id,
                        kind: draft.kind,
                        line: draft.line,
                        confidence: 1.0,
                    }),
                },
                EdgeTarget::Name(name) => self.pending.push(UnresolvedEdge {
                    from: draft.from,
                    to_name: name,
                    kind: draft.kind,
                    line: draft.line,
                    confidence: 1.0,
                }),
            }
        }
    }

    /// Remove a file and exactly its nodes, plus every edge touching them.
    ///
    /// Edges from surviving nodes into the removed set are demoted to pending
    /// unresolved edges carrying the removed target's short name, so a later
    /// re-add can relink them. Returns the number of removed nodes.
    pub fn remove_file(&mut self, file: &str) -> usize {
        let Some(entry) = self.file_index.remove(file) else {
            return 0;
        };
        let removed: HashSet<NodeIndex> = entry.nodes.iter().copied().collect();

        // Demote severed incoming edges before the nodes disappear.
        let mut demoted: Vec<UnresolvedEdge> = Vec::new();
        for &idx in &removed {
            let target_name = self.graph[idx].name.clone();
            for edge in self.graph.edges_directed(idx, Direction::Incoming) {
                if removed.contains(&edge.source()) {
                    continue;
                }
                let data = edge.weight();
                demoted.push(UnresolvedEdge {
                    from: self.graph[edge.source()].id.clone(),
                    to_name: target_name.clone(),
                    kind: data.kind,
                    line: data.line,
                    confidence: data.confidence,
                });
            }
        }

        for &idx in &entry.nodes {
            if let Some(node) = self.graph.remove_node(idx) {
                self.id_index.remove(&node.id);
                if let Some(indices) = self.name_index.get_mut(&node.name) {
                    indices.retain(|i| *i != idx);
                    if indices.is_empty() {
                        self.name_index.remove(&node.name);
                    }
                }
            }
        }

        // Pending edges originating in the removed file die with it.
        self.pending.retain(|e| self.id_index.contains_key(&e.from));
        self.pending.extend(demoted);

        entry.nodes.len()
    }

    /// Reset all tables.
    pub fn clear(&mut self) {
        self.graph = StableGraph::new();
        self.id_index.clear();
        self.name_index.clear();
        self.file_index.clear();
        self.pending.clear();
        self.files_skipped = 0;
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn get_node(&self, id: &str) -> Option<&GraphNode> {
        self.id_index.get(id).map(|&idx| &self.graph[idx])
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.id_index.get(id).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &GraphNode {
        &self.graph[idx]
    }

    /// Node indices bearing a short name, in insertion order.
    pub fn nodes_by_name(&self, name: &str) -> &[NodeIndex] {
        self.name_index.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn file_entry(&self, file: &str) -> Option<&FileEntry> {
        self.file_index.get(file)
    }

    /// Direct adjacency lookup, optionally filtered by edge kinds.
    pub fn neighbors(
        &self,
        idx: NodeIndex,
        direction: Direction,
        kinds: Option<&[EdgeKind]>,
    ) -> Vec<(NodeIndex, EdgeData)> {
        self.graph
            .edges_directed(idx, direction)
            .filter(|e| kinds.is_none_or(|ks| ks.contains(&e.weight().kind)))
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (other, *e.weight())
            })
            .collect()
    }

    /// Scan the node table for symbols whose short or qualified name matches
    /// `pattern`, filtered by `kinds` when given, stopping at `limit`.
    ///
    /// File nodes only surface when `kinds` names them explicitly. Iteration
    /// order is insertion order; no sort is promised.
    pub fn find_symbols(
        &self,
        pattern: &Regex,
        kinds: Option<&[SymbolKind]>,
        limit: usize,
    ) -> Vec<GraphNode> {
        let mut results = Vec::new();
        for idx in self.graph.node_indices() {
            if results.len() >= limit {
                break;
            }
            let node = &self.graph[idx];
            match kinds {
                Some(ks) => {
                    if !ks.contains(&node.kind) {
                        continue;
                    }
                }
                None => {
                    if node.kind == SymbolKind::File {
                        continue;
                    }
                }
            }
            if pattern.is_match(&node.name) || pattern.is_match(&node.qualified_name) {
                results.push(node.clone());
            }
        }
        results
    }

    /// All edges whose target is still a raw name.
    pub fn unresolved_edges(&self) -> &[UnresolvedEdge] {
        &self.pending
    }

    /// Every resolved edge as (from, to, data). Order is unspecified.
    pub fn edges(&self) -> impl Iterator<Item = (&GraphNode, &GraphNode, &EdgeData)> {
        self.graph.edge_indices().filter_map(|e| {
            let (from, to) = self.graph.edge_endpoints(e)?;
            Some((&self.graph[from], &self.graph[to], &self.graph[e]))
        })
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            nodes: self.graph.node_count(),
            edges: self.graph.edge_count(),
            unresolved_edges: self.pending.len(),
            files: self.file_index.len(),
            files_with_parse_errors: self
                .file_index
                .values()
                .filter(|e| e.parse_errors)
                .count(),
            files_skipped: self.files_skipped,
        }
    }

    /// Node counts broken down by symbol kind.
    pub fn symbols_by_kind(&self) -> HashMap<SymbolKind, usize> {
        let mut map: HashMap<SymbolKind, usize> = HashMap::new();
        for idx in self.graph.node_indices() {
            *map.entry(self.graph[idx].kind).or_insert(0) += 1;
        }
        map
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node::node_id;

    fn make_node(file: &str, qname: &str, kind: SymbolKind) -> GraphNode {
        let name = qname.rsplit('.').next().unwrap_or(qname).to_owned();
        GraphNode {
            id: node_id(file, qname),
            name,
            qualified_name: qname.to_owned(),
            kind,
            file: file.to_owned(),
            line: 1,
            is_exported: false,
        }
    }

    fn calls(from: &str, to_name: &str) -> EdgeDraft {
        EdgeDraft {
            from: from.to_owned(),
            to: EdgeTarget::Name(to_name.to_owned()),
            kind: EdgeKind::Calls,
            line: 1,
        }
    }

    #[test]
    fn test_add_and_lookup() {
        let mut store = GraphStore::new();
        store.add_file(
            "a.ts",
            false,
            vec![
                make_node("a.ts", "f", SymbolKind::Function),
                make_node("a.ts", "g", SymbolKind::Function),
            ],
            vec![calls("a.ts:f", "g")],
        );
        assert_eq!(store.stats().nodes, 2);
        assert_eq!(store.stats().unresolved_edges, 1, "name targets start pending");
        assert!(store.get_node("a.ts:f").is_some());
        assert_eq!(store.nodes_by_name("g").len(), 1);
    }

    #[test]
    fn test_duplicate_id_merges() {
        let mut store = GraphStore::new();
        store.add_file(
            "a.ts",
            false,
            vec![
                make_node("a.ts", "T", SymbolKind::Class),
                make_node("a.ts", "T", SymbolKind::Interface),
            ],
            vec![],
        );
        assert_eq!(store.stats().nodes, 1, "same (file, qname) merges");
        assert_eq!(store.get_node("a.ts:T").unwrap().kind, SymbolKind::Class, "first wins");
    }

    #[test]
    fn test_remove_file_demotes_severed_edges() {
        let mut store = GraphStore::new();
        store.add_file(
            "a.ts",
            false,
            vec![make_node("a.ts", "caller", SymbolKind::Function)],
            vec![calls("a.ts:caller", "helper")],
        );
        store.add_file(
            "b.ts",
            false,
            vec![make_node("b.ts", "helper", SymbolKind::Function)],
            vec![],
        );
        store.resolve_pending(0.7);
        assert_eq!(store.stats().edges, 1);
        assert_eq!(store.stats().unresolved_edges, 0);

        let removed = store.remove_file("b.ts");
        assert_eq!(removed, 1);
        assert_eq!(store.stats().edges, 0);
        let pending = store.unresolved_edges();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].from, "a.ts:caller");
        assert_eq!(pending[0].to_name, "helper", "raw name restored on severing");
    }

    #[test]
    fn test_remove_file_drops_own_pending() {
        let mut store = GraphStore::new();
        store.add_file(
            "a.ts",
            false,
            vec![make_node("a.ts", "caller", SymbolKind::Function)],
            vec![calls("a.ts:caller", "nowhere")],
        );
        assert_eq!(store.stats().unresolved_edges, 1);
        store.remove_file("a.ts");
        assert_eq!(store.stats().unresolved_edges, 0);
        assert_eq!(store.stats().nodes, 0);
        assert!(store.nodes_by_name("caller").is_empty());
    }

    #[test]
    fn test_find_symbols_filters() {
        let mut store = GraphStore::new();
        store.add_file(
            "a.ts",
            false,
            vec![
                make_node("a.ts", "", SymbolKind::File),
                make_node("a.ts", "UserService", SymbolKind::Class),
                make_node("a.ts", "User", SymbolKind::Interface),
            ],
            vec![],
        );
        let re = Regex::new("User").unwrap();
        let all = store.find_symbols(&re, None, 10);
        assert_eq!(all.len(), 2, "file nodes excluded by default");

        let interfaces = store.find_symbols(&re, Some(&[SymbolKind::Interface]), 10);
        assert_eq!(interfaces.len(), 1);
        assert_eq!(interfaces[0].name, "User");

        let limited = store.find_symbols(&re, None, 1);
        assert_eq!(limited.len(), 1, "limit stops the scan");
    }

    #[test]
    fn test_clear() {
        let mut store = GraphStore::new();
        store.add_file(
            "a.ts",
            true,
            vec![make_node("a.ts", "f", SymbolKind::Function)],
            vec![calls("a.ts:f", "g")],
        );
        store.clear();
        let stats = store.stats();
        assert_eq!(stats.nodes, 0);
        assert_eq!(stats.files, 0);
        assert_eq!(stats.unresolved_edges, 0);
    }

    #[test]
    fn test_parse_error_marker() {
        let mut store = GraphStore::new();
        store.add_file("bad.ts", true, vec![], vec![]);
        assert!(store.file_entry("bad.ts").unwrap().parse_errors);
        assert_eq!(store.stats().files_with_parse_errors, 1);
    }
}
