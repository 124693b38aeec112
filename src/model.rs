use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::language::LanguageKind;

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// A position in a source file. Lines and columns are 1-indexed for display;
/// `offset` is the 0-indexed byte offset into the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// An ordered pair of locations with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Location,
    pub end: Location,
}

impl Span {
    /// True when `other` lies entirely within this span (byte-offset containment).
    pub fn contains(&self, other: &Span) -> bool {
        self.start.offset <= other.start.offset && other.end.offset <= self.end.offset
    }

    /// True when this span and `other` share at least one byte.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start.offset < other.end.offset && other.start.offset < self.end.offset
    }
}

// ---------------------------------------------------------------------------
// Symbols
// ---------------------------------------------------------------------------

/// The kind of a declaration. Closed set; protocol text forms exist only at
/// serialization boundaries (`as_str` / `parse`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    File,
    Class,
    Interface,
    Function,
    Method,
    Property,
    Variable,
    Constant,
    Enum,
    EnumMember,
    TypeAlias,
    Namespace,
    Module,
    Constructor,
    Field,
    Parameter,
    Import,
}

impl SymbolKind {
    /// Lowercase wire form, used in CLI output and kind filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::File => "file",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Property => "property",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::Enum => "enum",
            SymbolKind::EnumMember => "enum_member",
            SymbolKind::TypeAlias => "type_alias",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Module => "module",
            SymbolKind::Constructor => "constructor",
            SymbolKind::Field => "field",
            SymbolKind::Parameter => "parameter",
            SymbolKind::Import => "import",
        }
    }

    /// Parse a wire-form kind string. Case-insensitive.
    pub fn parse(s: &str) -> Option<SymbolKind> {
        match s.to_lowercase().as_str() {
            "file" => Some(SymbolKind::File),
            "class" => Some(SymbolKind::Class),
            "interface" => Some(SymbolKind::Interface),
            "function" => Some(SymbolKind::Function),
            "method" => Some(SymbolKind::Method),
            "property" => Some(SymbolKind::Property),
            "variable" => Some(SymbolKind::Variable),
            "constant" => Some(SymbolKind::Constant),
            "enum" => Some(SymbolKind::Enum),
            "enum_member" => Some(SymbolKind::EnumMember),
            "type_alias" | "type" => Some(SymbolKind::TypeAlias),
            "namespace" => Some(SymbolKind::Namespace),
            "module" => Some(SymbolKind::Module),
            "constructor" => Some(SymbolKind::Constructor),
            "field" => Some(SymbolKind::Field),
            "parameter" => Some(SymbolKind::Parameter),
            "import" => Some(SymbolKind::Import),
            _ => None,
        }
    }

    /// Callable kinds are the only legal origins for `calls` edges.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            SymbolKind::Function | SymbolKind::Method | SymbolKind::Constructor
        )
    }
}

/// A declaration recognized at module, class, interface, namespace, or enum
/// scope, or a member thereof. Local variables are never symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    /// Short, unqualified name. Anonymous/default declarations use `"default"`.
    pub name: String,
    pub kind: SymbolKind,
    /// Full span of the declaration, including any body.
    pub span: Span,
    /// Body span for callables; `None` for everything else and bodiless signatures.
    pub body_span: Option<Span>,
    /// Member declarations, in source order. Child spans nest inside `span`.
    pub children: Vec<Symbol>,
    /// Documentation text with comment markers stripped.
    pub doc: Option<String>,
    /// Per-language extras (e.g. `receiver` for Go methods, `impl_of` for Rust).
    pub metadata: Option<BTreeMap<String, String>>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, span: Span) -> Self {
        Self {
            name: name.into(),
            kind,
            span,
            body_span: None,
            children: Vec::new(),
            doc: None,
            metadata: None,
        }
    }

    pub fn metadata_entry(&mut self, key: &str, value: impl Into<String>) {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_owned(), value.into());
    }
}

/// The ordered forest of symbols for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolTree {
    pub language: LanguageKind,
    pub symbols: Vec<Symbol>,
}

/// Check the structural invariant of a symbol tree: every child span is
/// contained in its parent's span and sibling spans are disjoint.
///
/// Returns a description of the first violation, or `None` when the tree is
/// well-formed. Callers surface violations as `AtlasError::Invariant`.
pub fn check_tree_invariant(tree: &SymbolTree) -> Option<String> {
    fn check_level(parent: Option<&Symbol>, symbols: &[Symbol]) -> Option<String> {
        for (i, sym) in symbols.iter().enumerate() {
            if let Some(p) = parent
                && !p.span.contains(&sym.span)
            {
                return Some(format!(
                    "child '{}' (bytes {}..{}) escapes parent '{}' (bytes {}..{})",
                    sym.name,
                    sym.span.start.offset,
                    sym.span.end.offset,
                    p.name,
                    p.span.start.offset,
                    p.span.end.offset,
                ));
            }
            for other in &symbols[i + 1..] {
                if sym.span.overlaps(&other.span) {
                    return Some(format!(
                        "siblings '{}' and '{}' overlap at bytes {}..{}",
                        sym.name, other.name, other.span.start.offset, sym.span.end.offset,
                    ));
                }
            }
            if let Some(v) = check_level(Some(sym), &sym.children) {
                return Some(v);
            }
        }
        None
    }
    check_level(None, &tree.symbols)
}

// ---------------------------------------------------------------------------
// Imports / exports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Default,
    Named,
    Namespace,
    SideEffect,
    Type,
    Require,
}

/// A single name bound by an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBinding {
    /// Name as visible in the importing file.
    pub local: String,
    /// Original name when aliased (`import { original as local }`).
    pub original: Option<String>,
    pub type_only: bool,
}

/// An import statement extracted from a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportInfo {
    /// Raw module specifier as written (`"./utils"`, `"react"`, `"std::fmt"`).
    pub source: String,
    pub kind: ImportKind,
    pub bindings: Vec<ImportBinding>,
    /// 1-based source line of the statement.
    pub line: usize,
    /// True for `import('x')` style dynamic imports.
    pub dynamic: bool,
    /// Raw statement text.
    pub raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Default,
    Named,
    Declaration,
    Reexport,
    Namespace,
}

/// A single name made visible by an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBinding {
    pub exported: String,
    /// Local name when the export renames (`export { local as exported }`).
    pub local: Option<String>,
    pub type_only: bool,
    /// Kind of the exported declaration when known at the export site.
    pub symbol_kind: Option<SymbolKind>,
}

/// An export statement extracted from a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportInfo {
    pub kind: ExportKind,
    pub bindings: Vec<ExportBinding>,
    /// Source module for re-exports; re-exports with a source produce no local symbols.
    pub source: Option<String>,
    pub line: usize,
    pub raw: String,
}

// ---------------------------------------------------------------------------
// Call sites
// ---------------------------------------------------------------------------

/// A call expression recorded inside a callable body. The callee is the name
/// as written, not a resolved target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSite {
    pub callee: String,
    /// Workspace-relative file path.
    pub file: String,
    pub line: usize,
    pub column: usize,
    /// Qualified name of the enclosing callable symbol.
    pub caller: Option<String>,
    /// The raw source line containing the call.
    pub context: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: usize, offset: usize) -> Location {
        Location {
            line,
            column: 1,
            offset,
        }
    }

    fn span(a: usize, b: usize) -> Span {
        Span {
            start: loc(1, a),
            end: loc(1, b),
        }
    }

    #[test]
    fn test_span_containment() {
        let outer = span(0, 100);
        let inner = span(10, 20);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(outer.contains(&outer), "a span contains itself");
    }

    #[test]
    fn test_span_overlap() {
        assert!(span(0, 10).overlaps(&span(5, 15)));
        assert!(!span(0, 10).overlaps(&span(10, 20)), "touching spans do not overlap");
    }

    #[test]
    fn test_kind_wire_roundtrip() {
        for kind in [
            SymbolKind::Class,
            SymbolKind::EnumMember,
            SymbolKind::TypeAlias,
            SymbolKind::Constructor,
        ] {
            assert_eq!(SymbolKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SymbolKind::parse("Class"), Some(SymbolKind::Class));
        assert_eq!(SymbolKind::parse("widget"), None);
    }

    #[test]
    fn test_tree_invariant_ok() {
        let mut class = Symbol::new("Svc", SymbolKind::Class, span(0, 50));
        class
            .children
            .push(Symbol::new("run", SymbolKind::Method, span(10, 20)));
        class
            .children
            .push(Symbol::new("stop", SymbolKind::Method, span(25, 40)));
        let tree = SymbolTree {
            language: crate::language::LanguageKind::TypeScript,
            symbols: vec![class],
        };
        assert!(check_tree_invariant(&tree).is_none());
    }

    #[test]
    fn test_tree_invariant_escaping_child() {
        let mut class = Symbol::new("Svc", SymbolKind::Class, span(0, 30));
        class
            .children
            .push(Symbol::new("run", SymbolKind::Method, span(10, 60)));
        let tree = SymbolTree {
            language: crate::language::LanguageKind::TypeScript,
            symbols: vec![class],
        };
        let violation = check_tree_invariant(&tree).expect("should detect violation");
        assert!(violation.contains("escapes parent"), "got: {violation}");
    }

    #[test]
    fn test_tree_invariant_overlapping_siblings() {
        let tree = SymbolTree {
            language: crate::language::LanguageKind::TypeScript,
            symbols: vec![
                Symbol::new("a", SymbolKind::Function, span(0, 20)),
                Symbol::new("b", SymbolKind::Function, span(15, 30)),
            ],
        };
        let violation = check_tree_invariant(&tree).expect("should detect violation");
        assert!(violation.contains("overlap"), "got: {violation}");
    }
}
