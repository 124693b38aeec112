use tree_sitter::{Node, Tree};

use crate::model::{
    CallSite, ExportBinding, ExportInfo, ExportKind, ImportBinding, ImportInfo, ImportKind,
    Symbol, SymbolKind,
};

use super::Extraction;
use super::common::{context_line, line_of, preceding_doc, span_of};

/// Metadata key carrying the self type of an `impl` method; the graph builder
/// prefixes it to the qualified name (`Engine.run`).
pub(crate) const QUALIFIER_KEY: &str = "qualifier";

/// Extract symbols, imports, exports, and call sites from a Rust source file.
///
/// `impl` blocks produce no symbol of their own; their associated functions
/// surface as top-level methods with the self type as qualifier. `pub` items
/// synthesize declaration exports, and `pub use` re-exports.
pub(crate) fn extract(tree: &Tree, source: &[u8], file: &str) -> Extraction {
    let ctx = Ctx { source, file };
    let mut out = Extraction::default();
    let mut scope = Vec::new();

    let root = tree.root_node();
    let mut symbols = Vec::new();
    items(&ctx, root, &mut scope, &mut symbols, &mut out);
    out.symbols = symbols;
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

    fn doc_for(&self, node: Node) -> Option<String> {
        preceding_doc(node, self.source, |raw| {
            raw.starts_with("///") || raw.starts_with("//!") || raw.starts_with("/**")
        })
    }
}

// ---------------------------------------------------------------------------
// Item dispatch
// ---------------------------------------------------------------------------

fn items(
    ctx: &Ctx,
    container: Node,
    scope: &mut Vec<String>,
    symbols: &mut Vec<Symbol>,
    out: &mut Extraction,
) {
    let mut cursor = container.walk();
    for child in container.children(&mut cursor) {
        match child.kind() {
            "function_item" => {
                let sym = function_symbol(ctx, child, None, scope, out);
                record_visibility(child, &sym, out);
                symbols.push(sym);
            }
            "struct_item" => {
                let sym = struct_symbol(ctx, child);
                record_visibility(child, &sym, out);
                symbols.push(sym);
            }
            "enum_item" => {
                let sym = enum_symbol(ctx, child);
                record_visibility(child, &sym, out);
                symbols.push(sym);
            }
            "trait_item" => {
                let sym = trait_symbol(ctx, child, scope, out);
                record_visibility(child, &sym, out);
                symbols.push(sym);
            }
            "impl_item" => {
                impl_methods(ctx, child, scope, symbols, out);
            }
            "mod_item" => {
                if let Some(sym) = mod_symbol(ctx, child, scope, out) {
                    record_visibility(child, &sym, out);
                    symbols.push(sym);
                }
            }
            "const_item" | "static_item" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let kind = if child.kind() == "const_item" {
                        SymbolKind::Constant
                    } else {
                        SymbolKind::Variable
                    };
                    let mut sym =
                        Symbol::new(ctx.text(name_node).to_owned(), kind, span_of(child));
                    sym.doc = ctx.doc_for(child);
                    record_visibility(child, &sym, out);
                    symbols.push(sym);
                }
            }
            "type_item" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    let mut sym = Symbol::new(
                        ctx.text(name_node).to_owned(),
                        SymbolKind::TypeAlias,
                        span_of(child),
                    );
                    sym.doc = ctx.doc_for(child);
                    record_visibility(child, &sym, out);
                    symbols.push(sym);
                }
            }
            "use_declaration" => use_declaration(ctx, child, out),
            _ => {}
        }
    }
}

fn is_pub(node: Node) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| c.kind() == "visibility_modifier");
    found
}

/// `pub` items synthesize a declaration-kind export binding.
fn record_visibility(node: Node, sym: &Symbol, out: &mut Extraction) {
    if !is_pub(node) {
        return;
    }
    out.exports.push(ExportInfo {
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

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

fn function_symbol(
    ctx: &Ctx,
    node: Node,
    qualifier: Option<&str>,
    scope: &mut Vec<String>,
    out: &mut Extraction,
) -> Symbol {
    let name = node
        .child_by_field_name("name")
        .map(|n| ctx.text(n).to_owned())
        .unwrap_or_else(|| "default".to_owned());
    let kind = match qualifier {
        Some(_) if name == "new" => SymbolKind::Constructor,
        Some(_) => SymbolKind::Method,
        None => SymbolKind::Function,
    };
    let mut sym = Symbol::new(name.clone(), kind, span_of(node));
    sym.doc = ctx.doc_for(node);

    let qualified = {
        let mut parts: Vec<&str> = scope.iter().map(|s| s.as_str()).collect();
        if let Some(q) = qualifier {
            sym.metadata_entry(QUALIFIER_KEY, q);
            parts.push(q);
        }
        parts.push(&name);
        parts.join(".")
    };
    if let Some(body) = node.child_by_field_name("body") {
        sym.body_span = Some(span_of(body));
        collect_calls(ctx, body, &qualified, &mut out.calls);
    }
    sym
}

fn struct_symbol(ctx: &Ctx, node: Node) -> Symbol {
    let name = node
        .child_by_field_name("name")
        .map(|n| ctx.text(n).to_owned())
        .unwrap_or_else(|| "default".to_owned());
    let mut sym = Symbol::new(name, SymbolKind::Class, span_of(node));
    sym.doc = ctx.doc_for(node);

    if let Some(body) = node.child_by_field_name("body")
        && body.kind() == "field_declaration_list"
    {
        let mut cursor = body.walk();
        for field in body.children(&mut cursor) {
            if field.kind() != "field_declaration" {
                continue;
            }
            if let Some(name_node) = field.child_by_field_name("name") {
                let mut child = Symbol::new(
                    ctx.text(name_node).to_owned(),
                    SymbolKind::Field,
                    span_of(field),
                );
                child.doc = ctx.doc_for(field);
                sym.children.push(child);
            }
        }
    }
    sym
}

fn enum_symbol(ctx: &Ctx, node: Node) -> Symbol {
    let name = node
        .child_by_field_name("name")
        .map(|n| ctx.text(n).to_owned())
        .unwrap_or_else(|| "default".to_owned());
    let mut sym = Symbol::new(name, SymbolKind::Enum, span_of(node));
    sym.doc = ctx.doc_for(node);

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for variant in body.children(&mut cursor) {
            if variant.kind() != "enum_variant" {
                continue;
            }
            if let Some(name_node) = variant.child_by_field_name("name") {
                let mut child = Symbol::new(
                    ctx.text(name_node).to_owned(),
                    SymbolKind::EnumMember,
                    span_of(variant),
                );
                child.doc = ctx.doc_for(variant);
                sym.children.push(child);
            }
        }
    }
    sym
}

fn trait_symbol(ctx: &Ctx, node: Node, scope: &mut Vec<String>, out: &mut Extraction) -> Symbol {
    let name = node
        .child_by_field_name("name")
        .map(|n| ctx.text(n).to_owned())
        .unwrap_or_else(|| "default".to_owned());
    let mut sym = Symbol::new(name.clone(), SymbolKind::Interface, span_of(node));
    sym.doc = ctx.doc_for(node);

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.children(&mut cursor) {
            match member.kind() {
                // Default methods carry bodies; required methods are signatures.
                "function_item" => {
                    scope.push(name.clone());
                    let mut child = function_symbol(ctx, member, None, scope, out);
                    scope.pop();
                    child.kind = SymbolKind::Method;
                    sym.children.push(child);
                }
                "function_signature_item" => {
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
    }
    sym
}

/// Associated functions of an `impl` block become top-level method symbols
/// qualified by the self type. `impl Trait for Type` methods record the trait
/// in metadata.
fn impl_methods(
    ctx: &Ctx,
    node: Node,
    scope: &mut Vec<String>,
    symbols: &mut Vec<Symbol>,
    out: &mut Extraction,
) {
    let Some(self_ty) = node.child_by_field_name("type").map(|t| type_name(ctx, t)) else {
        return;
    };
    let trait_name = node.child_by_field_name("trait").map(|t| type_name(ctx, t));

    let Some(body) = node.child_by_field_name("body") else {
        return;
    };
    let mut cursor = body.walk();
    for member in body.children(&mut cursor) {
        match member.kind() {
            "function_item" => {
                let mut sym = function_symbol(ctx, member, Some(&self_ty), scope, out);
                if let Some(trait_name) = &trait_name {
                    sym.metadata_entry("trait_impl", trait_name.clone());
                }
                record_visibility(member, &sym, out);
                symbols.push(sym);
            }
            "const_item" => {
                if let Some(name_node) = member.child_by_field_name("name") {
                    let mut sym = Symbol::new(
                        ctx.text(name_node).to_owned(),
                        SymbolKind::Constant,
                        span_of(member),
                    );
                    sym.metadata_entry(QUALIFIER_KEY, self_ty.clone());
                    symbols.push(sym);
                }
            }
            _ => {}
        }
    }
}

fn mod_symbol(
    ctx: &Ctx,
    node: Node,
    scope: &mut Vec<String>,
    out: &mut Extraction,
) -> Option<Symbol> {
    let name = ctx.text(node.child_by_field_name("name")?).to_owned();
    let mut sym = Symbol::new(name.clone(), SymbolKind::Namespace, span_of(node));
    sym.doc = ctx.doc_for(node);
    if let Some(body) = node.child_by_field_name("body") {
        scope.push(name);
        let mut children = Vec::new();
        items(ctx, body, scope, &mut children, out);
        scope.pop();
        sym.children = children;
    }
    Some(sym)
}

/// The bare name of a type node (`Vec<T>` -> `Vec`, `a::b::C` -> `C`).
fn type_name(ctx: &Ctx, node: Node) -> String {
    match node.kind() {
        "generic_type" => node
            .child_by_field_name("type")
            .map(|t| type_name(ctx, t))
            .unwrap_or_else(|| ctx.text(node).to_owned()),
        "scoped_type_identifier" | "scoped_identifier" => node
            .child_by_field_name("name")
            .map(|t| ctx.text(t).to_owned())
            .unwrap_or_else(|| ctx.text(node).to_owned()),
        _ => ctx.text(node).to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Use declarations
// ---------------------------------------------------------------------------

/// Record a `use` declaration as an import; `pub use` additionally records a
/// re-export.
fn use_declaration(ctx: &Ctx, node: Node, out: &mut Extraction) {
    let Some(argument) = node.child_by_field_name("argument") else {
        return;
    };
    let path = ctx.text(argument).to_owned();
    let mut bindings = Vec::new();
    use_leaves(ctx, argument, &mut bindings);

    out.imports.push(ImportInfo {
        source: path.clone(),
        kind: ImportKind::Named,
        bindings: bindings.clone(),
        line: line_of(node),
        dynamic: false,
        raw: ctx.text(node).trim().to_owned(),
    });

    if is_pub(node) {
        out.exports.push(ExportInfo {
            kind: ExportKind::Reexport,
            bindings: bindings
                .into_iter()
                .map(|b| ExportBinding {
                    exported: b.local,
                    local: b.original,
                    type_only: false,
                    symbol_kind: None,
                })
                .collect(),
            source: Some(path),
            line: line_of(node),
            raw: ctx.text(node).trim().to_owned(),
        });
    }
}

/// Collect the leaf names a `use` tree binds: the last path segment, list
/// items, and `as` aliases. Wildcards bind nothing.
fn use_leaves(ctx: &Ctx, node: Node, out: &mut Vec<ImportBinding>) {
    match node.kind() {
        "identifier" | "type_identifier" | "self" | "crate" => out.push(ImportBinding {
            local: ctx.text(node).to_owned(),
            original: None,
            type_only: false,
        }),
        "scoped_identifier" => {
            if let Some(name) = node.child_by_field_name("name") {
                out.push(ImportBinding {
                    local: ctx.text(name).to_owned(),
                    original: None,
                    type_only: false,
                });
            }
        }
        "use_as_clause" => {
            let original = node
                .child_by_field_name("path")
                .map(|p| last_segment(ctx.text(p)).to_owned());
            if let Some(alias) = node.child_by_field_name("alias") {
                out.push(ImportBinding {
                    local: ctx.text(alias).to_owned(),
                    original,
                    type_only: false,
                });
            }
        }
        "scoped_use_list" => {
            // Only the braced list binds names; the path prefix does not.
            if let Some(list) = node.child_by_field_name("list") {
                use_leaves(ctx, list, out);
            }
        }
        "use_list" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.is_named() {
                    use_leaves(ctx, child, out);
                }
            }
        }
        "use_wildcard" => {}
        _ => {}
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

/// Record call expressions inside a callable body. `free()` records the
/// identifier, `path::to::func()` the last segment, `value.method()` the
/// method name. Macro invocations are not calls.
fn collect_calls(ctx: &Ctx, node: Node, caller: &str, out: &mut Vec<CallSite>) {
    if node.kind() == "call_expression"
        && let Some(function) = node.child_by_field_name("function")
    {
        let name = match function.kind() {
            "identifier" => Some(ctx.text(function).to_owned()),
            "scoped_identifier" => function
                .child_by_field_name("name")
                .map(|n| ctx.text(n).to_owned()),
            "field_expression" => function
                .child_by_field_name("field")
                .map(|f| ctx.text(f).to_owned()),
            "generic_function" => function
                .child_by_field_name("function")
                .and_then(|inner| match inner.kind() {
                    "identifier" => Some(ctx.text(inner).to_owned()),
                    "scoped_identifier" => inner
                        .child_by_field_name("name")
                        .map(|n| ctx.text(n).to_owned()),
                    _ => None,
                }),
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

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
