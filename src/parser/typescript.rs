use tree_sitter::{Node, Tree};

use crate::model::{
    CallSite, ExportBinding, ExportInfo, ExportKind, ImportBinding, ImportInfo, ImportKind,
    Symbol, SymbolKind,
};

use super::Extraction;
use super::common::{context_line, line_of, preceding_doc, span_of, strip_string_quotes};

/// Extract symbols, imports, exports, and call sites from a TypeScript or
/// JavaScript syntax tree. `ts` enables the TypeScript-only constructs
/// (interfaces, type aliases, enums, namespaces, type-only imports).
pub(crate) fn extract(tree: &Tree, source: &[u8], file: &str, ts: bool) -> Extraction {
    let ctx = Ctx { source, file, ts };
    let mut out = Extraction::default();
    let mut scope = Vec::new();

    let root = tree.root_node();
    let mut symbols = Vec::new();
    module_items(&ctx, root, &mut scope, &mut symbols, &mut out);
    out.symbols = symbols;

    collect_dynamic_imports(&ctx, root, &mut out.imports);
    out
}

struct Ctx<'a> {
    source: &'a [u8],
    file: &'a str,
    ts: bool,
}

impl<'a> Ctx<'a> {
    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source).unwrap_or("")
    }

    fn doc_for(&self, anchor: Node) -> Option<String> {
        preceding_doc(anchor, self.source, |raw| raw.starts_with("/**"))
    }

    fn qualified(&self, scope: &[String], name: &str) -> String {
        if scope.is_empty() {
            name.to_owned()
        } else {
            format!("{}.{}", scope.join("."), name)
        }
    }
}

// ---------------------------------------------------------------------------
// Module-level dispatch
// ---------------------------------------------------------------------------

/// Walk the statements of a module or namespace body, appending declared
/// symbols to `symbols` and flat extracts to `out`.
fn module_items(
    ctx: &Ctx,
    container: Node,
    scope: &mut Vec<String>,
    symbols: &mut Vec<Symbol>,
    out: &mut Extraction,
) {
    let mut cursor = container.walk();
    for child in container.children(&mut cursor) {
        match child.kind() {
            "import_statement" => {
                if let Some(import) = extract_import(ctx, child) {
                    out.imports.push(import);
                }
            }
            "export_statement" => {
                handle_export(ctx, child, scope, symbols, out);
            }
            "expression_statement" => {
                // `namespace X {}` nests inside an expression_statement in
                // some grammar versions; unwrap it.
                if let Some(inner) = child.named_child(0)
                    && inner.kind() == "internal_module"
                {
                    if let Some(sym) = namespace_symbol(ctx, inner, child, scope, out) {
                        symbols.push(sym);
                    }
                }
            }
            "internal_module" => {
                if let Some(sym) = namespace_symbol(ctx, child, child, scope, out) {
                    symbols.push(sym);
                }
            }
            _ => {
                symbols.extend(declaration_symbols(ctx, child, child, scope, out));
            }
        }
    }
}

/// Extract the symbols declared by a single statement (usually one; several
/// for multi-declarator `const a = 1, b = 2`), or empty when the node is not
/// a declaration we record. `anchor` is the node whose preceding sibling
/// carries the doc comment (the export statement for exported declarations).
fn declaration_symbols(
    ctx: &Ctx,
    node: Node,
    anchor: Node,
    scope: &mut Vec<String>,
    out: &mut Extraction,
) -> Vec<Symbol> {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            vec![function_symbol(ctx, node, anchor, scope, out)]
        }
        "class_declaration" | "abstract_class_declaration" => {
            vec![class_symbol(ctx, node, anchor, scope, out)]
        }
        "interface_declaration" if ctx.ts => vec![interface_symbol(ctx, node, anchor, scope)],
        "type_alias_declaration" if ctx.ts => {
            let Some(name_node) = node.child_by_field_name("name") else {
                return Vec::new();
            };
            let mut sym = Symbol::new(
                ctx.text(name_node).to_owned(),
                SymbolKind::TypeAlias,
                span_of(node),
            );
            sym.doc = ctx.doc_for(anchor);
            vec![sym]
        }
        "enum_declaration" if ctx.ts => vec![enum_symbol(ctx, node, anchor)],
        "lexical_declaration" | "variable_declaration" => {
            variable_symbols(ctx, node, anchor, scope, out)
        }
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

fn function_symbol(
    ctx: &Ctx,
    node: Node,
    anchor: Node,
    scope: &mut Vec<String>,
    out: &mut Extraction,
) -> Symbol {
    let name = node
        .child_by_field_name("name")
        .map(|n| ctx.text(n).to_owned())
        .unwrap_or_else(|| "default".to_owned());
    let mut sym = Symbol::new(name.clone(), SymbolKind::Function, span_of(node));
    sym.doc = ctx.doc_for(anchor);
    if let Some(body) = node.child_by_field_name("body") {
        sym.body_span = Some(span_of(body));
        let qualified = ctx.qualified(scope, &name);
        collect_calls(ctx, body, &qualified, &mut out.calls);
    }
    sym
}

fn class_symbol(
    ctx: &Ctx,
    node: Node,
    anchor: Node,
    scope: &mut Vec<String>,
    out: &mut Extraction,
) -> Symbol {
    let name = node
        .child_by_field_name("name")
        .map(|n| ctx.text(n).to_owned())
        .unwrap_or_else(|| "default".to_owned());
    let mut sym = Symbol::new(name.clone(), SymbolKind::Class, span_of(node));
    sym.doc = ctx.doc_for(anchor);

    if let Some(body) = node.child_by_field_name("body") {
        scope.push(name);
        let mut cursor = body.walk();
        for member in body.children(&mut cursor) {
            match member.kind() {
                "method_definition" => {
                    if let Some(child) = method_symbol(ctx, member, scope, out) {
                        sym.children.push(child);
                    }
                }
                "public_field_definition" | "field_definition" => {
                    if let Some(child) = class_field_symbol(ctx, member, scope, out) {
                        sym.children.push(child);
                    }
                }
                "abstract_method_signature" | "method_signature" => {
                    if let Some(name_node) = member.child_by_field_name("name") {
                        let mut child = Symbol::new(
                            ctx.text(name_node).to_owned(),
                            SymbolKind::Method,
                            span_of(member),
                        );
                        child.doc = ctx.doc_for(member);
                        sym.children.push(child);
                    }
                }
                _ => {}
            }
        }
        scope.pop();
    }
    sym
}

fn method_symbol(
    ctx: &Ctx,
    node: Node,
    scope: &mut Vec<String>,
    out: &mut Extraction,
) -> Option<Symbol> {
    let name_node = node.child_by_field_name("name")?;
    let name = ctx.text(name_node).to_owned();
    let kind = if name == "constructor" {
        SymbolKind::Constructor
    } else {
        SymbolKind::Method
    };
    let mut sym = Symbol::new(name.clone(), kind, span_of(node));
    sym.doc = ctx.doc_for(node);
    if let Some(body) = node.child_by_field_name("body") {
        sym.body_span = Some(span_of(body));
        let qualified = ctx.qualified(scope, &name);
        collect_calls(ctx, body, &qualified, &mut out.calls);
    }
    Some(sym)
}

/// A class field. Arrow-function fields are callables and classified as
/// methods; plain value fields become `field`.
fn class_field_symbol(
    ctx: &Ctx,
    node: Node,
    scope: &mut Vec<String>,
    out: &mut Extraction,
) -> Option<Symbol> {
    let name_node = node.child_by_field_name("name")?;
    let name = ctx.text(name_node).to_owned();
    let value = node.child_by_field_name("value");
    let is_callable = value.is_some_and(is_function_value);

    let kind = if is_callable {
        SymbolKind::Method
    } else {
        SymbolKind::Field
    };
    let mut sym = Symbol::new(name.clone(), kind, span_of(node));
    sym.doc = ctx.doc_for(node);
    if is_callable
        && let Some(body) = value.and_then(|v| v.child_by_field_name("body"))
    {
        sym.body_span = Some(span_of(body));
        let qualified = ctx.qualified(scope, &name);
        collect_calls(ctx, body, &qualified, &mut out.calls);
    }
    Some(sym)
}

fn interface_symbol(ctx: &Ctx, node: Node, anchor: Node, _scope: &mut Vec<String>) -> Symbol {
    let name = node
        .child_by_field_name("name")
        .map(|n| ctx.text(n).to_owned())
        .unwrap_or_else(|| "default".to_owned());
    let mut sym = Symbol::new(name, SymbolKind::Interface, span_of(node));
    sym.doc = ctx.doc_for(anchor);

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.children(&mut cursor) {
            let kind = match member.kind() {
                "property_signature" => SymbolKind::Property,
                "method_signature" => SymbolKind::Method,
                _ => continue,
            };
            if let Some(name_node) = member.child_by_field_name("name") {
                let mut child =
                    Symbol::new(ctx.text(name_node).to_owned(), kind, span_of(member));
                child.doc = ctx.doc_for(member);
                sym.children.push(child);
            }
        }
    }
    sym
}

fn enum_symbol(ctx: &Ctx, node: Node, anchor: Node) -> Symbol {
    let name = node
        .child_by_field_name("name")
        .map(|n| ctx.text(n).to_owned())
        .unwrap_or_else(|| "default".to_owned());
    let mut sym = Symbol::new(name, SymbolKind::Enum, span_of(node));
    sym.doc = ctx.doc_for(anchor);

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.children(&mut cursor) {
            match member.kind() {
                "enum_assignment" => {
                    if let Some(name_node) = member.child_by_field_name("name") {
                        sym.children.push(Symbol::new(
                            ctx.text(name_node).to_owned(),
                            SymbolKind::EnumMember,
                            span_of(member),
                        ));
                    }
                }
                "property_identifier" => {
                    sym.children.push(Symbol::new(
                        ctx.text(member).to_owned(),
                        SymbolKind::EnumMember,
                        span_of(member),
                    ));
                }
                _ => {}
            }
        }
    }
    sym
}

fn namespace_symbol(
    ctx: &Ctx,
    node: Node,
    anchor: Node,
    scope: &mut Vec<String>,
    out: &mut Extraction,
) -> Option<Symbol> {
    let name = ctx.text(node.child_by_field_name("name")?).to_owned();
    let mut sym = Symbol::new(name.clone(), SymbolKind::Namespace, span_of(node));
    sym.doc = ctx.doc_for(anchor);
    if let Some(body) = node.child_by_field_name("body") {
        scope.push(name);
        let mut children = Vec::new();
        module_items(ctx, body, scope, &mut children, out);
        scope.pop();
        sym.children = children;
    }
    Some(sym)
}

/// Top-level `const`/`let`/`var` declarators. Arrow-function and function
/// values become function symbols; other `const` values become constants,
/// the rest variables. Require-call values additionally record an import.
/// Only the first declarator inherits the statement's doc comment.
fn variable_symbols(
    ctx: &Ctx,
    node: Node,
    anchor: Node,
    scope: &mut Vec<String>,
    out: &mut Extraction,
) -> Vec<Symbol> {
    let is_const = node
        .child(0)
        .map(|t| ctx.text(t) == "const")
        .unwrap_or(false);

    let mut produced: Vec<Symbol> = Vec::new();
    let mut cursor = node.walk();
    for declarator in node.children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let name_node = match declarator.child_by_field_name("name") {
            Some(n) if n.kind() == "identifier" => n,
            _ => continue, // destructuring patterns are not symbols
        };
        let name = ctx.text(name_node).to_owned();
        let value = declarator.child_by_field_name("value");

        if let Some(value) = value
            && let Some(import) = require_import(ctx, node, name.clone(), value)
        {
            out.imports.push(import);
        }

        let is_callable = value.is_some_and(is_function_value);
        let kind = if is_callable {
            SymbolKind::Function
        } else if is_const {
            SymbolKind::Constant
        } else {
            SymbolKind::Variable
        };

        let mut sym = Symbol::new(name.clone(), kind, span_of(declarator));
        if produced.is_empty() {
            sym.doc = ctx.doc_for(anchor);
        }
        if is_callable
            && let Some(body) = value.and_then(|v| v.child_by_field_name("body"))
        {
            sym.body_span = Some(span_of(body));
            let qualified = ctx.qualified(scope, &name);
            collect_calls(ctx, body, &qualified, &mut out.calls);
        }
        produced.push(sym);
    }
    produced
}

fn is_function_value(node: Node) -> bool {
    matches!(
        node.kind(),
        "arrow_function" | "function_expression" | "function" | "generator_function"
    )
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

fn extract_import(ctx: &Ctx, node: Node) -> Option<ImportInfo> {
    let source_node = node.child_by_field_name("source")?;
    let source = strip_string_quotes(ctx.text(source_node)).to_owned();

    // `import type { X } from 'm'`: the `type` token sits between `import`
    // and the clause.
    let type_import = has_token(ctx, node, "type");

    let mut bindings = Vec::new();
    let mut kind = ImportKind::SideEffect;

    if let Some(clause) = child_of_kind(node, "import_clause") {
        let mut cursor = clause.walk();
        for part in clause.children(&mut cursor) {
            match part.kind() {
                "identifier" => {
                    kind = ImportKind::Default;
                    bindings.push(ImportBinding {
                        local: ctx.text(part).to_owned(),
                        original: None,
                        type_only: type_import,
                    });
                }
                "namespace_import" => {
                    kind = ImportKind::Namespace;
                    if let Some(name) = child_of_kind(part, "identifier") {
                        bindings.push(ImportBinding {
                            local: ctx.text(name).to_owned(),
                            original: None,
                            type_only: type_import,
                        });
                    }
                }
                "named_imports" => {
                    if kind != ImportKind::Namespace {
                        kind = ImportKind::Named;
                    }
                    let mut inner = part.walk();
                    for spec in part.children(&mut inner) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        let name = spec
                            .child_by_field_name("name")
                            .map(|n| ctx.text(n).to_owned());
                        let alias = spec
                            .child_by_field_name("alias")
                            .map(|n| ctx.text(n).to_owned());
                        let Some(name) = name else { continue };
                        let spec_type_only = type_import || has_token(ctx, spec, "type");
                        match alias {
                            Some(alias) => bindings.push(ImportBinding {
                                local: alias,
                                original: Some(name),
                                type_only: spec_type_only,
                            }),
                            None => bindings.push(ImportBinding {
                                local: name,
                                original: None,
                                type_only: spec_type_only,
                            }),
                        }
                    }
                }
                _ => {}
            }
        }
    }

    if type_import {
        kind = ImportKind::Type;
    }

    Some(ImportInfo {
        source,
        kind,
        bindings,
        line: line_of(node),
        dynamic: false,
        raw: ctx.text(node).trim().to_owned(),
    })
}

/// A `const X = require('m')` declarator as an import record.
fn require_import(ctx: &Ctx, statement: Node, local: String, value: Node) -> Option<ImportInfo> {
    if value.kind() != "call_expression" {
        return None;
    }
    let callee = value.child_by_field_name("function")?;
    if callee.kind() != "identifier" || ctx.text(callee) != "require" {
        return None;
    }
    let args = value.child_by_field_name("arguments")?;
    let arg = child_of_kind(args, "string")?;
    Some(ImportInfo {
        source: strip_string_quotes(ctx.text(arg)).to_owned(),
        kind: ImportKind::Require,
        bindings: vec![ImportBinding {
            local,
            original: None,
            type_only: false,
        }],
        line: line_of(statement),
        dynamic: false,
        raw: ctx.text(statement).trim().to_owned(),
    })
}

/// Scan the whole tree for `import('m')` calls. These can occur at any depth,
/// so they are collected independently of the statement walk.
fn collect_dynamic_imports(ctx: &Ctx, node: Node, out: &mut Vec<ImportInfo>) {
    if node.kind() == "call_expression"
        && let Some(callee) = node.child_by_field_name("function")
        && callee.kind() == "import"
        && let Some(args) = node.child_by_field_name("arguments")
        && let Some(arg) = child_of_kind(args, "string")
    {
        out.push(ImportInfo {
            source: strip_string_quotes(ctx.text(arg)).to_owned(),
            kind: ImportKind::SideEffect,
            bindings: Vec::new(),
            line: line_of(node),
            dynamic: true,
            raw: ctx.text(node).trim().to_owned(),
        });
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_dynamic_imports(ctx, child, out);
    }
}

// ---------------------------------------------------------------------------
// Exports
// ---------------------------------------------------------------------------

fn handle_export(
    ctx: &Ctx,
    node: Node,
    scope: &mut Vec<String>,
    symbols: &mut Vec<Symbol>,
    out: &mut Extraction,
) {
    let is_default = has_token(ctx, node, "default");
    let type_export = has_token(ctx, node, "type");
    let source = node
        .child_by_field_name("source")
        .map(|n| strip_string_quotes(ctx.text(n)).to_owned());
    let raw = ctx.text(node).trim().to_owned();
    let line = line_of(node);

    // `export * as ns from 'm'`
    if let Some(ns) = child_of_kind(node, "namespace_export") {
        let exported = child_of_kind(ns, "identifier")
            .map(|n| ctx.text(n).to_owned())
            .unwrap_or_else(|| "*".to_owned());
        out.exports.push(ExportInfo {
            kind: ExportKind::Namespace,
            bindings: vec![ExportBinding {
                exported,
                local: None,
                type_only: false,
                symbol_kind: None,
            }],
            source,
            line,
            raw,
        });
        return;
    }

    // `export { a, b as c }` / `export { a } from 'm'` / `export * from 'm'`
    if let Some(clause) = child_of_kind(node, "export_clause") {
        let mut bindings = Vec::new();
        let mut cursor = clause.walk();
        for spec in clause.children(&mut cursor) {
            if spec.kind() != "export_specifier" {
                continue;
            }
            let name = spec
                .child_by_field_name("name")
                .map(|n| ctx.text(n).to_owned());
            let alias = spec
                .child_by_field_name("alias")
                .map(|n| ctx.text(n).to_owned());
            let Some(name) = name else { continue };
            let type_only = type_export || has_token(ctx, spec, "type");
            match alias {
                Some(alias) => bindings.push(ExportBinding {
                    exported: alias,
                    local: Some(name),
                    type_only,
                    symbol_kind: None,
                }),
                None => bindings.push(ExportBinding {
                    exported: name,
                    local: None,
                    type_only,
                    symbol_kind: None,
                }),
            }
        }
        out.exports.push(ExportInfo {
            kind: if source.is_some() {
                ExportKind::Reexport
            } else {
                ExportKind::Named
            },
            bindings,
            source,
            line,
            raw,
        });
        return;
    }

    if source.is_some() {
        // `export * from 'm'`: no clause, just the source.
        out.exports.push(ExportInfo {
            kind: ExportKind::Reexport,
            bindings: Vec::new(),
            source,
            line,
            raw,
        });
        return;
    }

    // `export <declaration>` / `export default <declaration>`
    if let Some(decl) = node.child_by_field_name("declaration").or_else(|| {
        let mut cursor = node.walk();
        let found = node
            .children(&mut cursor)
            .find(|c| is_declaration_kind(c.kind()) || c.kind() == "internal_module");
        found
    }) {
        let before = symbols.len();
        if decl.kind() == "internal_module" {
            if let Some(sym) = namespace_symbol(ctx, decl, node, scope, out) {
                symbols.push(sym);
            }
        } else {
            symbols.extend(declaration_symbols(ctx, decl, node, scope, out));
        }
        let bindings: Vec<ExportBinding> = symbols[before..]
            .iter()
            .map(|sym| ExportBinding {
                exported: if is_default {
                    "default".to_owned()
                } else {
                    sym.name.clone()
                },
                local: if is_default { Some(sym.name.clone()) } else { None },
                type_only: false,
                symbol_kind: Some(sym.kind),
            })
            .collect();
        if !bindings.is_empty() {
            out.exports.push(ExportInfo {
                kind: if is_default {
                    ExportKind::Default
                } else {
                    ExportKind::Declaration
                },
                bindings,
                source: None,
                line,
                raw,
            });
            return;
        }
    }

    // `export default <expression>;`
    if is_default {
        let local = node
            .child_by_field_name("value")
            .filter(|v| v.kind() == "identifier")
            .map(|v| ctx.text(v).to_owned());
        out.exports.push(ExportInfo {
            kind: ExportKind::Default,
            bindings: vec![ExportBinding {
                exported: "default".to_owned(),
                local,
                type_only: false,
                symbol_kind: None,
            }],
            source: None,
            line,
            raw,
        });
    }
}

fn is_declaration_kind(kind: &str) -> bool {
    matches!(
        kind,
        "function_declaration"
            | "generator_function_declaration"
            | "class_declaration"
            | "abstract_class_declaration"
            | "interface_declaration"
            | "type_alias_declaration"
            | "enum_declaration"
            | "lexical_declaration"
            | "variable_declaration"
    )
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

/// Record every call expression inside `node` (a callable body), attributed
/// to `caller`. The callee name is the rightmost identifier as written:
/// `foo()` -> `foo`, `obj.method()` -> `method`, `new Foo()` -> `Foo`.
fn collect_calls(ctx: &Ctx, node: Node, caller: &str, out: &mut Vec<CallSite>) {
    match node.kind() {
        "call_expression" => {
            if let Some(callee) = node.child_by_field_name("function")
                && let Some(name) = callee_name(ctx, callee)
                && name != "require"
            {
                push_call(ctx, node, name, caller, out);
            }
        }
        "new_expression" => {
            if let Some(ctor) = node.child_by_field_name("constructor")
                && let Some(name) = callee_name(ctx, ctor)
            {
                push_call(ctx, node, name, caller, out);
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls(ctx, child, caller, out);
    }
}

fn callee_name(ctx: &Ctx, callee: Node) -> Option<String> {
    match callee.kind() {
        "identifier" => Some(ctx.text(callee).to_owned()),
        "member_expression" => callee
            .child_by_field_name("property")
            .map(|p| ctx.text(p).to_owned()),
        _ => None,
    }
}

fn push_call(ctx: &Ctx, node: Node, callee: String, caller: &str, out: &mut Vec<CallSite>) {
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

// ---------------------------------------------------------------------------
// Node helpers
// ---------------------------------------------------------------------------

fn child_of_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

/// True when `node` has a direct child token with exactly the given text.
fn has_token(ctx: &Ctx, node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| !c.is_named() && ctx.text(c) == token);
    found
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
