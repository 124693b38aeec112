use tree_sitter::{Node, Tree};

use crate::model::{
    CallSite, ExportBinding, ExportInfo, ExportKind, ImportBinding, ImportInfo, ImportKind,
    Symbol, SymbolKind,
};

use super::Extraction;
use super::common::{context_line, line_of, span_of, strip_string_quotes};

/// Extract symbols, imports, exports, and call sites from a Python module.
///
/// Python has no export syntax; `__all__` entries win when present, otherwise
/// every top-level name not starting with `_` is treated as an exported
/// declaration (the conventional public surface).
pub(crate) fn extract(tree: &Tree, source: &[u8], file: &str) -> Extraction {
    let ctx = Ctx { source, file };
    let mut out = Extraction::default();
    let mut scope = Vec::new();

    let root = tree.root_node();
    let mut symbols = Vec::new();
    let mut dunder_all: Option<Vec<String>> = None;
    block_items(&ctx, root, &mut scope, true, &mut symbols, &mut out, &mut dunder_all);
    out.symbols = symbols;

    synthesize_exports(&out.symbols, dunder_all, &mut out.exports);
    out
}

struct Ctx<'a> {
    source: &'a [u8],
    file: &'a str,
}

impl<'a> Ctx<'a> {
    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source).unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Statement dispatch
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn block_items(
    ctx: &Ctx,
    container: Node,
    scope: &mut Vec<String>,
    module_level: bool,
    symbols: &mut Vec<Symbol>,
    out: &mut Extraction,
    dunder_all: &mut Option<Vec<String>>,
) {
    let mut cursor = container.walk();
    for child in container.children(&mut cursor) {
        match child.kind() {
            "function_definition" => {
                symbols.push(function_symbol(ctx, child, scope, module_level, out));
            }
            "class_definition" => {
                symbols.push(class_symbol(ctx, child, scope, out));
            }
            "decorated_definition" => {
                if let Some(inner) = child.child_by_field_name("definition") {
                    match inner.kind() {
                        "function_definition" => {
                            symbols.push(function_symbol(ctx, inner, scope, module_level, out));
                        }
                        "class_definition" => {
                            symbols.push(class_symbol(ctx, inner, scope, out));
                        }
                        _ => {}
                    }
                }
            }
            "import_statement" | "import_from_statement" => {
                if let Some(import) = extract_import(ctx, child) {
                    out.imports.push(import);
                }
            }
            "expression_statement" => {
                if let Some(assignment) = first_child_of_kind(child, "assignment") {
                    handle_assignment(
                        ctx,
                        child,
                        assignment,
                        module_level,
                        symbols,
                        dunder_all,
                    );
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

fn function_symbol(
    ctx: &Ctx,
    node: Node,
    scope: &mut Vec<String>,
    module_level: bool,
    out: &mut Extraction,
) -> Symbol {
    let name = node
        .child_by_field_name("name")
        .map(|n| ctx.text(n).to_owned())
        .unwrap_or_else(|| "default".to_owned());
    let kind = if module_level {
        SymbolKind::Function
    } else if name == "__init__" {
        SymbolKind::Constructor
    } else {
        SymbolKind::Method
    };
    let mut sym = Symbol::new(name.clone(), kind, span_of(node));
    if let Some(body) = node.child_by_field_name("body") {
        sym.body_span = Some(span_of(body));
        sym.doc = docstring(ctx, body);
        let qualified = qualified(scope, &name);
        collect_calls(ctx, body, &qualified, &mut out.calls);
    }
    sym
}

fn class_symbol(ctx: &Ctx, node: Node, scope: &mut Vec<String>, out: &mut Extraction) -> Symbol {
    let name = node
        .child_by_field_name("name")
        .map(|n| ctx.text(n).to_owned())
        .unwrap_or_else(|| "default".to_owned());
    let mut sym = Symbol::new(name.clone(), SymbolKind::Class, span_of(node));

    if let Some(body) = node.child_by_field_name("body") {
        sym.doc = docstring(ctx, body);
        scope.push(name);
        let mut children = Vec::new();
        let mut no_all = None;
        block_items(ctx, body, scope, false, &mut children, out, &mut no_all);
        scope.pop();
        sym.children = children;
    }
    sym
}

/// Module-level assignments become constants (UPPER_CASE) or variables;
/// class-level assignments become fields. `__all__` is captured for export
/// synthesis instead of being recorded as a symbol.
fn handle_assignment(
    ctx: &Ctx,
    statement: Node,
    assignment: Node,
    module_level: bool,
    symbols: &mut Vec<Symbol>,
    dunder_all: &mut Option<Vec<String>>,
) {
    let Some(left) = assignment.child_by_field_name("left") else {
        return;
    };
    if left.kind() != "identifier" {
        return;
    }
    let name = ctx.text(left).to_owned();

    if module_level && name == "__all__" {
        if let Some(right) = assignment.child_by_field_name("right") {
            *dunder_all = Some(string_list(ctx, right));
        }
        return;
    }
    if name.starts_with("__") && name.ends_with("__") {
        return; // other dunders (__version__ stays out of the graph too)
    }

    let kind = if !module_level {
        SymbolKind::Field
    } else if name.chars().all(|c| !c.is_lowercase()) {
        SymbolKind::Constant
    } else {
        SymbolKind::Variable
    };
    symbols.push(Symbol::new(name, kind, span_of(statement)));
}

/// Collect the string elements of a `__all__` list or tuple.
fn string_list(ctx: &Ctx, node: Node) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "string" {
            names.push(strip_string_quotes(ctx.text(child)).to_owned());
        }
    }
    names
}

/// The leading docstring of a `def`/`class` body, when present.
fn docstring(ctx: &Ctx, body: Node) -> Option<String> {
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0)?;
    if string.kind() != "string" {
        return None;
    }
    let text = strip_string_quotes(ctx.text(string)).trim().to_owned();
    if text.is_empty() { None } else { Some(text) }
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

fn extract_import(ctx: &Ctx, node: Node) -> Option<ImportInfo> {
    let line = line_of(node);
    let raw = ctx.text(node).trim().to_owned();

    if node.kind() == "import_statement" {
        // `import a.b` / `import a.b as c` binds the module object.
        let mut bindings = Vec::new();
        let mut source = String::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "dotted_name" => {
                    // `import a.b` binds the top-level name `a`.
                    let path = ctx.text(child).to_owned();
                    bindings.push(ImportBinding {
                        local: path.split('.').next().unwrap_or(&path).to_owned(),
                        original: None,
                        type_only: false,
                    });
                    if source.is_empty() {
                        source = path;
                    }
                }
                "aliased_import" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| ctx.text(n).to_owned())
                        .unwrap_or_default();
                    let alias = child
                        .child_by_field_name("alias")
                        .map(|n| ctx.text(n).to_owned());
                    if source.is_empty() {
                        source = name.clone();
                    }
                    bindings.push(ImportBinding {
                        local: alias.unwrap_or_else(|| {
                            name.split('.').next_back().unwrap_or(&name).to_owned()
                        }),
                        original: Some(name),
                        type_only: false,
                    });
                }
                _ => {}
            }
        }
        if source.is_empty() {
            return None;
        }
        return Some(ImportInfo {
            source,
            kind: ImportKind::Namespace,
            bindings,
            line,
            dynamic: false,
            raw,
        });
    }

    // `from m import a, b as c` / `from m import *`
    let module = node.child_by_field_name("module_name")?;
    let source = ctx.text(module).to_owned();
    let mut bindings = Vec::new();
    let mut wildcard = false;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "dotted_name" if child.id() != module.id() => {
                let name = ctx.text(child).to_owned();
                bindings.push(ImportBinding {
                    local: name,
                    original: None,
                    type_only: false,
                });
            }
            "aliased_import" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| ctx.text(n).to_owned())
                    .unwrap_or_default();
                let alias = child
                    .child_by_field_name("alias")
                    .map(|n| ctx.text(n).to_owned());
                bindings.push(ImportBinding {
                    local: alias.unwrap_or_else(|| name.clone()),
                    original: Some(name),
                    type_only: false,
                });
            }
            "wildcard_import" => wildcard = true,
            _ => {}
        }
    }

    Some(ImportInfo {
        source,
        kind: if wildcard {
            ImportKind::Namespace
        } else {
            ImportKind::Named
        },
        bindings,
        line,
        dynamic: false,
        raw,
    })
}

// ---------------------------------------------------------------------------
// Exports
// ---------------------------------------------------------------------------

/// Synthesize export records: `__all__` wins, else public top-level names.
fn synthesize_exports(
    symbols: &[Symbol],
    dunder_all: Option<Vec<String>>,
    out: &mut Vec<ExportInfo>,
) {
    match dunder_all {
        Some(names) => {
            let bindings: Vec<ExportBinding> = names
                .into_iter()
                .map(|name| {
                    let symbol_kind = symbols.iter().find(|s| s.name == name).map(|s| s.kind);
                    ExportBinding {
                        exported: name,
                        local: None,
                        type_only: false,
                        symbol_kind,
                    }
                })
                .collect();
            if !bindings.is_empty() {
                out.push(ExportInfo {
                    kind: ExportKind::Named,
                    bindings,
                    source: None,
                    line: 1,
                    raw: "__all__".to_owned(),
                });
            }
        }
        None => {
            for sym in symbols {
                if sym.name.starts_with('_') {
                    continue;
                }
                out.push(ExportInfo {
                    kind: ExportKind::Declaration,
                    bindings: vec![ExportBinding {
                        exported: sym.name.clone(),
                        local: None,
                        type_only: false,
                        symbol_kind: Some(sym.kind),
                    }],
                    source: None,
                    line: sym.span.start.line,
                    raw: String::new(),
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

/// Record call expressions inside a callable body. `obj.method()` records the
/// attribute name; `func()` the identifier.
fn collect_calls(ctx: &Ctx, node: Node, caller: &str, out: &mut Vec<CallSite>) {
    if node.kind() == "call"
        && let Some(function) = node.child_by_field_name("function")
    {
        let name = match function.kind() {
            "identifier" => Some(ctx.text(function).to_owned()),
            "attribute" => function
                .child_by_field_name("attribute")
                .map(|a| ctx.text(a).to_owned()),
            _ => None,
        };
        if let Some(callee) = name {
            let span = span_of(node);
            out.push(CallSite {
                callee,
                file: ctx.file.to_owned(),
                line: span.start.line,
                column: span.start.column,
                caller: Some(caller.to_owned()),
                context: context_line(ctx.source, span.start.line - 1),
            });
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls(ctx, child, caller, out);
    }
}

fn qualified(scope: &[String], name: &str) -> String {
    if scope.is_empty() {
        name.to_owned()
    } else {
        format!("{}.{}", scope.join("."), name)
    }
}

fn first_child_of_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::LanguageKind;
    use crate::parser::parse_source;

    fn py(src: &str) -> crate::parser::FileAnalysis {
        parse_source("test.py", LanguageKind::Python, src.as_bytes()).unwrap()
    }

    #[test]
    fn test_function_and_docstring() {
        let a = py("def fetch(url):\n    \"\"\"Fetch a url.\"\"\"\n    return get(url)\n");
        let sym = &a.tree.symbols[0];
        assert_eq!(sym.name, "fetch");
        assert_eq!(sym.kind, SymbolKind::Function);
        assert_eq!(sym.doc.as_deref(), Some("Fetch a url."));
        assert_eq!(a.calls[0].callee, "get");
        assert_eq!(a.calls[0].caller.as_deref(), Some("fetch"));
    }

    #[test]
    fn test_class_with_methods() {
        let a = py(r#"
class Repo:
    def __init__(self):
        self.items = []

    def find(self, key):
        return self.scan(key)
"#);
        let class = &a.tree.symbols[0];
        assert_eq!(class.kind, SymbolKind::Class);
        let kinds: Vec<_> = class
            .children
            .iter()
            .map(|c| (c.name.as_str(), c.kind))
            .collect();
        assert!(kinds.contains(&("__init__", SymbolKind::Constructor)));
        assert!(kinds.contains(&("find", SymbolKind::Method)));
        assert!(a.calls.iter().any(|c| c.callee == "scan" && c.caller.as_deref() == Some("Repo.find")));
    }

    #[test]
    fn test_decorated_function() {
        let a = py("@cached\ndef slow():\n    pass\n");
        assert_eq!(a.tree.symbols[0].name, "slow");
    }

    #[test]
    fn test_module_constants_and_variables() {
        let a = py("MAX_SIZE = 10\ncurrent = 0\n_private = 1\n");
        let kinds: Vec<_> = a
            .tree
            .symbols
            .iter()
            .map(|s| (s.name.as_str(), s.kind))
            .collect();
        assert!(kinds.contains(&("MAX_SIZE", SymbolKind::Constant)));
        assert!(kinds.contains(&("current", SymbolKind::Variable)));
        assert!(kinds.contains(&("_private", SymbolKind::Variable)));
    }

    #[test]
    fn test_imports() {
        let a = py("import os.path\nfrom collections import OrderedDict as OD\n");
        assert_eq!(a.imports[0].kind, ImportKind::Namespace);
        assert_eq!(a.imports[0].source, "os.path");
        assert_eq!(a.imports[0].bindings[0].local, "os", "dotted import binds the top-level name");
        assert_eq!(a.imports[1].kind, ImportKind::Named);
        assert_eq!(a.imports[1].bindings[0].local, "OD");
        assert_eq!(
            a.imports[1].bindings[0].original.as_deref(),
            Some("OrderedDict")
        );
    }

    #[test]
    fn test_dunder_all_exports() {
        let a = py("__all__ = [\"fetch\"]\n\ndef fetch():\n    pass\n\ndef helper():\n    pass\n");
        assert_eq!(a.exports.len(), 1);
        let names: Vec<_> = a.exports[0]
            .bindings
            .iter()
            .map(|b| b.exported.as_str())
            .collect();
        assert_eq!(names, vec!["fetch"], "__all__ wins over convention");
    }

    #[test]
    fn test_convention_exports() {
        let a = py("def public():\n    pass\n\ndef _internal():\n    pass\n");
        let exported: Vec<_> = a
            .exports
            .iter()
            .flat_map(|e| e.bindings.iter().map(|b| b.exported.as_str()))
            .collect();
        assert_eq!(exported, vec!["public"], "underscore names stay private");
    }

    #[test]
    fn test_no_locals() {
        let a = py("def f():\n    local = 1\n    return local\n");
        let names: Vec<_> = a.tree.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["f"]);
    }
}
