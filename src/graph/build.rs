use std::collections::HashSet;

use crate::model::{ExportInfo, Symbol, SymbolKind};
use crate::parser::FileAnalysis;

use super::edge::{EdgeDraft, EdgeKind, EdgeTarget};
use super::node::{GraphNode, node_id};

/// Metadata key whose value is prefixed to the qualified name. Set by the Go
/// and Rust extractors for methods declared outside their type.
const QUALIFIER_KEY: &str = "qualifier";

/// The nodes and edge drafts lowered from one file's analysis, ready for
/// `GraphStore::add_file`.
#[derive(Debug, Default)]
pub struct FileGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<EdgeDraft>,
}

/// Lower a parsed file into graph nodes and edge drafts.
///
/// - One file node anchors the `contains` forest and the `imports` edges.
/// - Every symbol becomes a node with id `"<file>:<qualified_name>"`;
///   `is_exported` derives from an export binding referencing the name, and
///   members of an exported container inherit the flag.
/// - Call sites become name-targeted `calls` drafts from their enclosing
///   callable; sites outside any callable lower to nothing.
pub fn lower_file(file: &str, analysis: &FileAnalysis) -> FileGraph {
    let exported = exported_names(&analysis.exports);
    let mut out = FileGraph::default();

    let file_node_id = node_id(file, "");
    out.nodes.push(GraphNode {
        id: file_node_id.clone(),
        name: file_stem(file),
        qualified_name: String::new(),
        kind: SymbolKind::File,
        file: file.to_owned(),
        line: 1,
        is_exported: false,
    });

    for symbol in &analysis.tree.symbols {
        lower_symbol(file, symbol, "", &file_node_id, &exported, false, &mut out);
    }

    for import in &analysis.imports {
        out.edges.push(EdgeDraft {
            from: file_node_id.clone(),
            to: EdgeTarget::Name(import.source.clone()),
            kind: EdgeKind::Imports,
            line: import.line,
        });
    }

    for call in &analysis.calls {
        let Some(caller) = &call.caller else {
            continue;
        };
        out.edges.push(EdgeDraft {
            from: node_id(file, caller),
            to: EdgeTarget::Name(call.callee.clone()),
            kind: EdgeKind::Calls,
            line: call.line,
        });
    }

    out
}

fn lower_symbol(
    file: &str,
    symbol: &Symbol,
    parent_qualified: &str,
    parent_id: &str,
    exported: &HashSet<String>,
    parent_exported: bool,
    out: &mut FileGraph,
) {
    let qualified = qualified_name(parent_qualified, symbol);
    let id = node_id(file, &qualified);
    let is_exported = parent_exported || exported.contains(&symbol.name);

    out.nodes.push(GraphNode {
        id: id.clone(),
        name: symbol.name.clone(),
        qualified_name: qualified.clone(),
        kind: symbol.kind,
        file: file.to_owned(),
        line: symbol.span.start.line,
        is_exported,
    });
    out.edges.push(EdgeDraft {
        from: parent_id.to_owned(),
        to: EdgeTarget::Node(id.clone()),
        kind: EdgeKind::Contains,
        line: symbol.span.start.line,
    });

    for child in &symbol.children {
        lower_symbol(file, child, &qualified, &id, exported, is_exported, out);
    }
}

/// Ancestor chain, then the qualifier metadata (receiver / impl type), then
/// the short name.
fn qualified_name(parent_qualified: &str, symbol: &Symbol) -> String {
    let qualifier = symbol
        .metadata
        .as_ref()
        .and_then(|m| m.get(QUALIFIER_KEY))
        .map(String::as_str);
    let mut parts: Vec<&str> = Vec::new();
    if !parent_qualified.is_empty() {
        parts.push(parent_qualified);
    }
    if let Some(q) = qualifier {
        parts.push(q);
    }
    parts.push(&symbol.name);
    parts.join(".")
}

/// Local names referenced by export bindings. Re-exports (with a source) bind
/// nothing locally.
fn exported_names(exports: &[ExportInfo]) -> HashSet<String> {
    let mut names = HashSet::new();
    for export in exports {
        if export.source.is_some() {
            continue;
        }
        for binding in &export.bindings {
            match &binding.local {
                Some(local) => names.insert(local.clone()),
                None => names.insert(binding.exported.clone()),
            };
        }
    }
    names
}

fn file_stem(file: &str) -> String {
    std::path::Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file)
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::LanguageKind;
    use crate::parser::parse_source;

    fn lower_ts(src: &str) -> FileGraph {
        let analysis = parse_source("src/mod.ts", LanguageKind::TypeScript, src.as_bytes()).unwrap();
        lower_file("src/mod.ts", &analysis)
    }

    #[test]
    fn test_file_node_and_contains_forest() {
        let fg = lower_ts("export class Svc { run() {} }\n");
        let ids: Vec<_> = fg.nodes.iter().map(|n| n.id.as_str()).collect();
        assert!(ids.contains(&"src/mod.ts:"));
        assert!(ids.contains(&"src/mod.ts:Svc"));
        assert!(ids.contains(&"src/mod.ts:Svc.run"));

        let contains: Vec<_> = fg
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Contains)
            .collect();
        assert_eq!(contains.len(), 2);
        assert_eq!(contains[0].from, "src/mod.ts:");
        assert_eq!(contains[1].from, "src/mod.ts:Svc");
    }

    #[test]
    fn test_export_flag_propagates_to_members() {
        let fg = lower_ts("export class Svc { run() {} }\nclass Hidden { go() {} }\n");
        let by_id = |id: &str| fg.nodes.iter().find(|n| n.id == id).unwrap();
        assert!(by_id("src/mod.ts:Svc").is_exported);
        assert!(
            by_id("src/mod.ts:Svc.run").is_exported,
            "members of exported containers are reachable entry points"
        );
        assert!(!by_id("src/mod.ts:Hidden").is_exported);
        assert!(!by_id("src/mod.ts:Hidden.go").is_exported);
    }

    #[test]
    fn test_calls_lowered_from_enclosing_callable() {
        let fg = lower_ts("function a() { b(); }\n");
        let calls: Vec<_> = fg
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Calls)
            .collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].from, "src/mod.ts:a");
        assert_eq!(calls[0].to, EdgeTarget::Name("b".to_owned()));
    }

    #[test]
    fn test_imports_lowered_from_file_node() {
        let fg = lower_ts("import { x } from './other';\n");
        let imports: Vec<_> = fg
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Imports)
            .collect();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].from, "src/mod.ts:");
        assert_eq!(imports[0].to, EdgeTarget::Name("./other".to_owned()));
    }

    #[test]
    fn test_rust_impl_method_qualified() {
        let analysis = parse_source(
            "src/engine.rs",
            LanguageKind::Rust,
            b"struct Engine;\nimpl Engine {\n    fn run(&self) {}\n}\n",
        )
        .unwrap();
        let fg = lower_file("src/engine.rs", &analysis);
        assert!(
            fg.nodes.iter().any(|n| n.id == "src/engine.rs:Engine.run"),
            "impl methods qualify under the self type"
        );
    }

    #[test]
    fn test_reexport_does_not_mark_local() {
        let fg = lower_ts("export { helper } from './other';\nfunction helper() {}\n");
        let helper = fg
            .nodes
            .iter()
            .find(|n| n.qualified_name == "helper")
            .unwrap();
        assert!(!helper.is_exported, "re-export with source binds nothing locally");
    }
}
