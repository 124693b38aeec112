use std::collections::HashMap;

use petgraph::stable_graph::NodeIndex;

use crate::model::SymbolKind;

use super::GraphStore;
use super::edge::{EdgeData, EdgeKind, UnresolvedEdge};

/// Counts reported by an edge-resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOutcome {
    pub resolved: usize,
    pub unresolved: usize,
}

impl GraphStore {
    /// Run the edge resolver over the pending table.
    ///
    /// For each unresolved edge, in order:
    /// 1. an exact qualified-name match wins, confidence unchanged (a
    ///    same-file candidate is preferred when several files declare the
    ///    same qualified name);
    /// 2. else a unique short-name match wins, confidence unchanged;
    /// 3. else, among several short-name candidates, the first encountered is
    ///    taken and the edge's confidence is multiplied by
    ///    `ambiguity_confidence`;
    /// 4. else the edge stays pending with its raw name (still a valid edge).
    ///
    /// Import edges resolve against file nodes only, keyed by the final path
    /// segment of the specifier.
    pub fn resolve_pending(&mut self, ambiguity_confidence: f32) -> ResolveOutcome {
        if self.pending.is_empty() {
            return ResolveOutcome::default();
        }

        // Qualified-name index over all current nodes, built per pass.
        let mut qualified_index: HashMap<&str, Vec<NodeIndex>> = HashMap::new();
        for idx in self.graph.node_indices() {
            let node = &self.graph[idx];
            if !node.qualified_name.is_empty() {
                qualified_index
                    .entry(node.qualified_name.as_str())
                    .or_default()
                    .push(idx);
            }
        }

        let pending = std::mem::take(&mut self.pending);
        let mut outcome = ResolveOutcome::default();
        let mut resolved: Vec<(NodeIndex, NodeIndex, EdgeData)> = Vec::new();
        let mut still_pending: Vec<UnresolvedEdge> = Vec::new();

        for edge in pending {
            let Some(&from) = self.id_index.get(&edge.from) else {
                continue; // origin vanished between passes
            };
            let from_file = self.graph[from].file.clone();

            let target = match edge.kind {
                EdgeKind::Imports => self.resolve_import_target(&edge.to_name),
                _ => self.resolve_name_target(
                    &qualified_index,
                    &edge.to_name,
                    &from_file,
                    ambiguity_confidence,
                ),
            };

            match target {
                Some((to, multiplier)) => {
                    resolved.push((
                        from,
                        to,
                        EdgeData {
                            kind: edge.kind,
                            line: edge.line,
                            confidence: edge.confidence * multiplier,
                        },
                    ));
                    outcome.resolved += 1;
                }
                None => {
                    still_pending.push(edge);
                    outcome.unresolved += 1;
                }
            }
        }

        for (from, to, data) in resolved {
            self.graph.add_edge(from, to, data);
        }
        self.pending = still_pending;

        tracing::debug!(
            resolved = outcome.resolved,
            unresolved = outcome.unresolved,
            "edge resolution pass complete"
        );
        outcome
    }

    /// Resolution for calls (and any non-import kind): qualified name first,
    /// then short name. Returns the target and a confidence multiplier.
    fn resolve_name_target(
        &self,
        qualified_index: &HashMap<&str, Vec<NodeIndex>>,
        to_name: &str,
        from_file: &str,
        ambiguity_confidence: f32,
    ) -> Option<(NodeIndex, f32)> {
        if let Some(candidates) = qualified_index.get(to_name) {
            let same_file = candidates
                .iter()
                .copied()
                .find(|&idx| self.graph[idx].file == from_file);
            let target = same_file.or_else(|| candidates.first().copied());
            if let Some(target) = target {
                return Some((target, 1.0));
            }
        }

        let candidates = self.nodes_by_name(to_name);
        match candidates.len() {
            0 => None,
            1 => Some((candidates[0], 1.0)),
            _ => Some((candidates[0], ambiguity_confidence)),
        }
    }

    /// Import edges link file nodes: the final path segment of the specifier
    /// (without extension) must match a file node's short name uniquely.
    fn resolve_import_target(&self, specifier: &str) -> Option<(NodeIndex, f32)> {
        let key = import_key(specifier);
        let candidates: Vec<NodeIndex> = self
            .nodes_by_name(&key)
            .iter()
            .copied()
            .filter(|&idx| self.graph[idx].kind == SymbolKind::File)
            .collect();
        match candidates.len() {
            1 => Some((candidates[0], 1.0)),
            _ => None, // ambiguous module specifiers stay unresolved
        }
    }
}

/// The lookup key for an import specifier: last `/`- or `::`-separated
/// segment, without a file extension. `"./user.ts"` -> `user`,
/// `"crate::engine::Engine"` -> `Engine`.
pub(crate) fn import_key(specifier: &str) -> String {
    let trimmed = specifier.trim_end_matches('/');
    let segment = trimmed
        .rsplit(['/', ':'])
        .find(|s| !s.is_empty())
        .unwrap_or(trimmed);
    match segment.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem.to_owned(),
        _ => segment.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::{EdgeDraft, EdgeTarget};
    use crate::graph::node::{GraphNode, node_id};
    use petgraph::Direction;

    fn node(file: &str, qname: &str, kind: SymbolKind) -> GraphNode {
        let name = qname.rsplit('.').next().unwrap_or(qname).to_owned();
        GraphNode {
            id: node_id(file, qname),
            name: if kind == SymbolKind::File {
                file.rsplit('/')
                    .next()
                    .unwrap_or(file)
                    .split('.')
                    .next()
                    .unwrap_or(file)
                    .to_owned()
            } else {
                name
            },
            qualified_name: qname.to_owned(),
            kind,
            file: file.to_owned(),
            line: 1,
            is_exported: false,
        }
    }

    fn call_draft(from: &str, to: &str) -> EdgeDraft {
        EdgeDraft {
            from: from.to_owned(),
            to: EdgeTarget::Name(to.to_owned()),
            kind: EdgeKind::Calls,
            line: 3,
        }
    }

    #[test]
    fn test_qualified_match_preferred() {
        let mut store = GraphStore::new();
        store.add_file(
            "a.ts",
            false,
            vec![
                node("a.ts", "caller", SymbolKind::Function),
                node("a.ts", "Svc.run", SymbolKind::Method),
            ],
            vec![call_draft("a.ts:caller", "Svc.run")],
        );
        // A decoy with the same short name in another file.
        store.add_file(
            "b.ts",
            false,
            vec![node("b.ts", "run", SymbolKind::Function)],
            vec![],
        );

        let outcome = store.resolve_pending(0.7);
        assert_eq!(outcome, ResolveOutcome { resolved: 1, unresolved: 0 });

        let from = store.node_index("a.ts:caller").unwrap();
        let neighbors = store.neighbors(from, Direction::Outgoing, Some(&[EdgeKind::Calls]));
        assert_eq!(store.node(neighbors[0].0).id, "a.ts:Svc.run");
        assert_eq!(neighbors[0].1.confidence, 1.0, "qualified match keeps confidence");
    }

    #[test]
    fn test_unique_short_name_match() {
        let mut store = GraphStore::new();
        store.add_file(
            "a.ts",
            false,
            vec![node("a.ts", "caller", SymbolKind::Function)],
            vec![call_draft("a.ts:caller", "helper")],
        );
        store.add_file(
            "b.ts",
            false,
            vec![node("b.ts", "Util.helper", SymbolKind::Method)],
            vec![],
        );

        store.resolve_pending(0.7);
        let from = store.node_index("a.ts:caller").unwrap();
        let neighbors = store.neighbors(from, Direction::Outgoing, None);
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].1.confidence, 1.0);
    }

    #[test]
    fn test_ambiguous_match_downgrades_confidence() {
        let mut store = GraphStore::new();
        store.add_file(
            "a.ts",
            false,
            vec![node("a.ts", "caller", SymbolKind::Function)],
            vec![call_draft("a.ts:caller", "helper")],
        );
        store.add_file(
            "b.ts",
            false,
            vec![node("b.ts", "Util.helper", SymbolKind::Method)],
            vec![],
        );
        store.add_file(
            "c.ts",
            false,
            vec![node("c.ts", "Other.helper", SymbolKind::Method)],
            vec![],
        );

        store.resolve_pending(0.7);
        let from = store.node_index("a.ts:caller").unwrap();
        let neighbors = store.neighbors(from, Direction::Outgoing, None);
        assert_eq!(neighbors.len(), 1);
        assert!((neighbors[0].1.confidence - 0.7).abs() < 1e-6);
        assert_eq!(
            store.node(neighbors[0].0).id,
            "b.ts:Util.helper",
            "first encountered candidate wins"
        );
    }

    #[test]
    fn test_unmatched_stays_pending() {
        let mut store = GraphStore::new();
        store.add_file(
            "a.ts",
            false,
            vec![node("a.ts", "caller", SymbolKind::Function)],
            vec![call_draft("a.ts:caller", "ghost")],
        );
        let outcome = store.resolve_pending(0.7);
        assert_eq!(outcome, ResolveOutcome { resolved: 0, unresolved: 1 });
        assert_eq!(store.unresolved_edges()[0].to_name, "ghost");
    }

    #[test]
    fn test_import_resolves_to_file_node() {
        let mut store = GraphStore::new();
        store.add_file(
            "src/main.ts",
            false,
            vec![node("src/main.ts", "", SymbolKind::File)],
            vec![EdgeDraft {
                from: "src/main.ts:".to_owned(),
                to: EdgeTarget::Name("./user".to_owned()),
                kind: EdgeKind::Imports,
                line: 1,
            }],
        );
        store.add_file(
            "src/user.ts",
            false,
            vec![node("src/user.ts", "", SymbolKind::File)],
            vec![],
        );

        store.resolve_pending(0.7);
        let from = store.node_index("src/main.ts:").unwrap();
        let neighbors = store.neighbors(from, Direction::Outgoing, Some(&[EdgeKind::Imports]));
        assert_eq!(neighbors.len(), 1);
        assert_eq!(store.node(neighbors[0].0).file, "src/user.ts");
    }

    #[test]
    fn test_import_key() {
        assert_eq!(import_key("./user.ts"), "user");
        assert_eq!(import_key("../models/user"), "user");
        assert_eq!(import_key("react"), "react");
        assert_eq!(import_key("std::collections::HashMap"), "HashMap");
        assert_eq!(import_key("pkg/sub/"), "sub");
    }

    #[test]
    fn test_confidence_multiplies_on_rereresolution() {
        // A severed edge that was already ambiguous keeps multiplying down.
        let mut store = GraphStore::new();
        store.add_file(
            "a.ts",
            false,
            vec![node("a.ts", "caller", SymbolKind::Function)],
            vec![call_draft("a.ts:caller", "helper")],
        );
        store.add_file(
            "b.ts",
            false,
            vec![node("b.ts", "B.helper", SymbolKind::Method)],
            vec![],
        );
        store.add_file(
            "c.ts",
            false,
            vec![node("c.ts", "C.helper", SymbolKind::Method)],
            vec![],
        );
        store.resolve_pending(0.7); // ambiguous: 1.0 -> 0.7 (target b.ts)
        store.remove_file("b.ts"); // demoted back to pending at 0.7
        store.resolve_pending(0.7); // unique now: c.ts, confidence unchanged

        let from = store.node_index("a.ts:caller").unwrap();
        let neighbors = store.neighbors(from, Direction::Outgoing, None);
        assert_eq!(store.node(neighbors[0].0).file, "c.ts");
        assert!((neighbors[0].1.confidence - 0.7).abs() < 1e-6);
    }
}
