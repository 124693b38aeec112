pub mod common;
mod go;
pub mod languages;
mod python;
mod rust;
mod typescript;

use std::cell::RefCell;

use serde::{Deserialize, Serialize};
use tree_sitter::{Parser, Tree};

use crate::error::{AtlasError, Result};
use crate::language::LanguageKind;
use crate::model::{CallSite, ExportInfo, ImportInfo, Symbol, SymbolTree, check_tree_invariant};

use languages::Grammar;

// Thread-local Parser instances, one per worker thread and grammar: zero
// lock contention. Initialised lazily on first use per thread.
thread_local! {
    static PARSER_TS: RefCell<Parser> = RefCell::new(make_parser(Grammar::TypeScript));
    static PARSER_TSX: RefCell<Parser> = RefCell::new(make_parser(Grammar::Tsx));
    static PARSER_JS: RefCell<Parser> = RefCell::new(make_parser(Grammar::JavaScript));
    static PARSER_PY: RefCell<Parser> = RefCell::new(make_parser(Grammar::Python));
    static PARSER_GO: RefCell<Parser> = RefCell::new(make_parser(Grammar::Go));
    static PARSER_RS: RefCell<Parser> = RefCell::new(make_parser(Grammar::Rust));
}

fn make_parser(grammar: Grammar) -> Parser {
    let mut parser = Parser::new();
    parser
        .set_language(&grammar.language())
        .expect("grammar version mismatch with tree-sitter runtime");
    parser
}

/// Everything extracted from a single source file in one parse: the nested
/// symbol tree plus the flat import/export/call lists born from the same
/// syntax tree. This is the unit the symbol cache stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub tree: SymbolTree,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<ExportInfo>,
    pub calls: Vec<CallSite>,
    /// True when the syntax tree contained error nodes; extraction still ran
    /// over the well-formed subtrees.
    pub parse_errors: bool,
}

impl FileAnalysis {
    /// An empty analysis with the parse-error marker set, used when the
    /// parser could not produce a tree at all.
    pub fn empty_with_errors(language: LanguageKind) -> Self {
        Self {
            tree: SymbolTree {
                language,
                symbols: Vec::new(),
            },
            imports: Vec::new(),
            exports: Vec::new(),
            calls: Vec::new(),
            parse_errors: true,
        }
    }
}

/// Intermediate extraction output shared by the language modules.
#[derive(Debug, Default)]
pub(crate) struct Extraction {
    pub symbols: Vec<Symbol>,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<ExportInfo>,
    pub calls: Vec<CallSite>,
}

/// Parse one file and extract symbols, imports, exports, and call sites.
///
/// `rel_path` is the workspace-relative path (used for language/grammar
/// selection and stamped into call sites). Extraction recovers past syntax
/// errors: ill-formed regions are skipped and `parse_errors` is set, so the
/// result is a valid (possibly partial) analysis rather than a failure.
///
/// # Errors
/// - `Parse` when tree-sitter cannot produce a tree at all.
/// - `Invariant` when the extracted tree violates span nesting (a bug).
pub fn parse_source(rel_path: &str, language: LanguageKind, source: &[u8]) -> Result<FileAnalysis> {
    let ext = std::path::Path::new(rel_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    let grammar = Grammar::select(language, &ext);

    let tree = parse_with_grammar(grammar, source)
        .ok_or_else(|| AtlasError::parse(rel_path, "tree-sitter returned no tree"))?;

    let extraction = match grammar {
        Grammar::TypeScript | Grammar::Tsx => typescript::extract(&tree, source, rel_path, true),
        Grammar::JavaScript => typescript::extract(&tree, source, rel_path, false),
        Grammar::Python => python::extract(&tree, source, rel_path),
        Grammar::Go => go::extract(&tree, source, rel_path),
        Grammar::Rust => rust::extract(&tree, source, rel_path),
    };

    let analysis = FileAnalysis {
        tree: SymbolTree {
            language,
            symbols: extraction.symbols,
        },
        imports: extraction.imports,
        exports: extraction.exports,
        calls: extraction.calls,
        parse_errors: tree.root_node().has_error(),
    };

    if let Some(violation) = check_tree_invariant(&analysis.tree) {
        return Err(AtlasError::invariant(rel_path, violation));
    }
    Ok(analysis)
}

fn parse_with_grammar(grammar: Grammar, source: &[u8]) -> Option<Tree> {
    let cell = match grammar {
        Grammar::TypeScript => &PARSER_TS,
        Grammar::Tsx => &PARSER_TSX,
        Grammar::JavaScript => &PARSER_JS,
        Grammar::Python => &PARSER_PY,
        Grammar::Go => &PARSER_GO,
        Grammar::Rust => &PARSER_RS,
    };
    cell.with(|p| p.borrow_mut().parse(source, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SymbolKind;

    #[test]
    fn test_parse_source_typescript() {
        let src = b"export function hello() {}\n";
        let analysis = parse_source("src/a.ts", LanguageKind::TypeScript, src).unwrap();
        assert!(!analysis.parse_errors);
        assert_eq!(analysis.tree.symbols.len(), 1);
        assert_eq!(analysis.tree.symbols[0].name, "hello");
        assert_eq!(analysis.tree.symbols[0].kind, SymbolKind::Function);
    }

    #[test]
    fn test_parse_source_recovers_from_errors() {
        // The dangling brace breaks the tail; the leading function survives.
        let src = b"function ok() {}\nfunction broken( {\n";
        let analysis = parse_source("src/a.ts", LanguageKind::TypeScript, src).unwrap();
        assert!(analysis.parse_errors, "error marker must be set");
        assert!(
            analysis.tree.symbols.iter().any(|s| s.name == "ok"),
            "well-formed subtree must still be extracted"
        );
    }

    #[test]
    fn test_parse_source_all_languages_smoke() {
        let cases: &[(&str, LanguageKind, &[u8])] = &[
            ("a.ts", LanguageKind::TypeScript, b"const x = 1;\n"),
            ("a.tsx", LanguageKind::TypeScript, b"export const App = () => <div/>;\n"),
            ("a.js", LanguageKind::JavaScript, b"function f() {}\n"),
            ("a.py", LanguageKind::Python, b"def f():\n    pass\n"),
            ("a.go", LanguageKind::Go, b"package main\nfunc F() {}\n"),
            ("a.rs", LanguageKind::Rust, b"pub fn f() {}\n"),
        ];
        for (path, lang, src) in cases {
            let analysis = parse_source(path, *lang, src)
                .unwrap_or_else(|e| panic!("{path} failed: {e}"));
            assert!(!analysis.parse_errors, "{path} should parse cleanly");
        }
    }
}
