use tree_sitter::{Node, Tree};

use crate::model::{
    CallSite, ExportBinding, ExportInfo, ExportKind, ImportBinding, ImportInfo, ImportKind,
    Symbol, SymbolKind,
};

use super::Extraction;
use super::common::{context_line, line_of, preceding_doc, span_of, strip_string_quotes};

/// Metadata key carrying the receiver type of a method; the graph builder
/// prefixes it to the qualified name (`Repo.Find`).
pub(crate) const QUALIFIER_KEY: &str = "qualifier";

/// Extract symbols, imports, exports, and call sites from a Go source file.
///
/// Methods stay top-level symbols (Go declares them outside the type) with
/// the receiver recorded as a qualifier. Export records are synthesized from
/// capitalization: every top-level identifier starting with an uppercase
/// letter is exported.
pub(crate) fn extract(tree: &Tree, source: &[u8], file: &str) -> Extraction {
    let ctx = Ctx { source, file };
    let mut out = Extraction::default();

    let root = tree.root_node();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "function_declaration" => {
                let sym = function_symbol(&ctx, child, None, &mut out);
                out.symbols.push(sym);
            }
            "method_declaration" => {
                let receiver = receiver_type(&ctx, child);
                let sym = function_symbol(&ctx, child, receiver, &mut out);
                out.symbols.push(sym);
            }
            "type_declaration" => type_specs(&ctx, child, &mut out),
            "const_declaration" => value_specs(&ctx, child, SymbolKind::Constant, &mut out),
            "var_declaration" => value_specs(&ctx, child, SymbolKind::Variable, &mut out),
            "import_declaration" => import_specs(&ctx, child, &mut out),
            _ => {}
        }
    }

    synthesize_exports(&out.symbols, &mut out.exports);
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
            raw.starts_with("//") || raw.starts_with("/*")
        })
    }
}

// ---------------------------------------------------------------------------
// Functions and methods
// ---------------------------------------------------------------------------

fn function_symbol(
    ctx: &Ctx,
    node: Node,
    receiver: Option<String>,
    out: &mut Extraction,
) -> Symbol {
    let name = node
        .child_by_field_name("name")
        .map(|n| ctx.text(n).to_owned())
        .unwrap_or_else(|| "default".to_owned());
    let kind = if receiver.is_some() {
        SymbolKind::Method
    } else {
        SymbolKind::Function
    };
    let mut sym = Symbol::new(name.clone(), kind, span_of(node));
    sym.doc = ctx.doc_for(node);

    let qualified = match &receiver {
        Some(recv) => {
            sym.metadata_entry(QUALIFIER_KEY, recv.clone());
            format!("{recv}.{name}")
        }
        None => name,
    };
    if let Some(body) = node.child_by_field_name("body") {
        sym.body_span = Some(span_of(body));
        collect_calls(ctx, body, &qualified, &mut out.calls);
    }
    sym
}

/// The bare receiver type name of a method (`func (r *Repo) Find` -> `Repo`).
fn receiver_type(ctx: &Ctx, node: Node) -> Option<String> {
    let receiver = node.child_by_field_name("receiver")?;
    let mut cursor = receiver.walk();
    let decl = receiver
        .children(&mut cursor)
        .find(|c| c.kind() == "parameter_declaration")?;
    let ty = decl.child_by_field_name("type")?;
    let name = match ty.kind() {
        "pointer_type" => ty.named_child(0).map(|t| ctx.text(t)),
        _ => Some(ctx.text(ty)),
    }?;
    // Drop generic brackets on parameterized receivers: `List[T]` -> `List`.
    Some(name.split('[').next().unwrap_or(name).to_owned())
}

// ---------------------------------------------------------------------------
// Types, consts, vars
// ---------------------------------------------------------------------------

fn type_specs(ctx: &Ctx, decl: Node, out: &mut Extraction) {
    let mut cursor = decl.walk();
    for spec in decl.children(&mut cursor) {
        if spec.kind() != "type_spec" {
            continue;
        }
        let Some(name_node) = spec.child_by_field_name("name") else {
            continue;
        };
        let name = ctx.text(name_node).to_owned();
        let ty = spec.child_by_field_name("type");

        let mut sym = match ty.map(|t| t.kind()) {
            Some("struct_type") => {
                let mut sym = Symbol::new(name, SymbolKind::Class, span_of(spec));
                if let Some(ty) = ty {
                    sym.children = struct_fields(ctx, ty);
                }
                sym
            }
            Some("interface_type") => {
                let mut sym = Symbol::new(name, SymbolKind::Interface, span_of(spec));
                if let Some(ty) = ty {
                    sym.children = interface_methods(ctx, ty);
                }
                sym
            }
            _ => Symbol::new(name, SymbolKind::TypeAlias, span_of(spec)),
        };
        // Doc sits above the `type` keyword for single-spec declarations.
        sym.doc = ctx.doc_for(decl).or_else(|| ctx.doc_for(spec));
        out.symbols.push(sym);
    }
}

fn struct_fields(ctx: &Ctx, struct_type: Node) -> Vec<Symbol> {
    let mut fields = Vec::new();
    let Some(list) = first_child_of_kind(struct_type, "field_declaration_list") else {
        return fields;
    };
    let mut cursor = list.walk();
    for field in list.children(&mut cursor) {
        if field.kind() != "field_declaration" {
            continue;
        }
        let mut inner = field.walk();
        for part in field.children(&mut inner) {
            // Use the identifier's own span: `Name, Alias string` declares two
            // fields whose spans must stay disjoint.
            if part.kind() == "field_identifier" {
                fields.push(Symbol::new(
                    ctx.text(part).to_owned(),
                    SymbolKind::Field,
                    span_of(part),
                ));
            }
        }
    }
    fields
}

fn interface_methods(ctx: &Ctx, interface_type: Node) -> Vec<Symbol> {
    let mut methods = Vec::new();
    let mut cursor = interface_type.walk();
    for member in interface_type.children(&mut cursor) {
        // Grammar versions differ on the element node name.
        if !matches!(member.kind(), "method_elem" | "method_spec") {
            continue;
        }
        if let Some(name_node) = member.child_by_field_name("name") {
            methods.push(Symbol::new(
                ctx.text(name_node).to_owned(),
                SymbolKind::Method,
                span_of(member),
            ));
        }
    }
    methods
}

fn value_specs(ctx: &Ctx, decl: Node, kind: SymbolKind, out: &mut Extraction) {
    let mut cursor = decl.walk();
    for spec in decl.children(&mut cursor) {
        if !matches!(spec.kind(), "const_spec" | "var_spec") {
            continue;
        }
        let mut inner = spec.walk();
        for part in spec.children(&mut inner) {
            // Identifier span, not spec span: `const a, b = 1, 2` declares two
            // symbols whose spans must stay disjoint.
            if part.kind() == "identifier" {
                let mut sym = Symbol::new(ctx.text(part).to_owned(), kind, span_of(part));
                sym.doc = ctx.doc_for(decl);
                out.symbols.push(sym);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Imports and exports
// ---------------------------------------------------------------------------

fn import_specs(ctx: &Ctx, decl: Node, out: &mut Extraction) {
    let mut specs = Vec::new();
    collect_import_specs(decl, &mut specs);
    for spec in specs {
        let Some(path_node) = spec.child_by_field_name("path") else {
            continue;
        };
        let source = strip_string_quotes(ctx.text(path_node)).to_owned();
        let explicit = spec
            .child_by_field_name("name")
            .map(|n| ctx.text(n).to_owned());
        let local = explicit
            .clone()
            .unwrap_or_else(|| source.rsplit('/').next().unwrap_or(&source).to_owned());
        out.imports.push(ImportInfo {
            source,
            kind: if explicit.as_deref() == Some("_") {
                ImportKind::SideEffect
            } else {
                ImportKind::Namespace
            },
            bindings: if explicit.as_deref() == Some("_") {
                Vec::new()
            } else {
                vec![ImportBinding {
                    local,
                    original: None,
                    type_only: false,
                }]
            },
            line: line_of(spec),
            dynamic: false,
            raw: ctx.text(spec).trim().to_owned(),
        });
    }
}

fn collect_import_specs<'a>(node: Node<'a>, out: &mut Vec<Node<'a>>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_spec" => out.push(child),
            "import_spec_list" => collect_import_specs(child, out),
            _ => {}
        }
    }
}

/// Go's export rule: a top-level identifier is exported iff it starts with an
/// uppercase letter.
fn synthesize_exports(symbols: &[Symbol], out: &mut Vec<ExportInfo>) {
    for sym in symbols {
        let exported = sym
            .name
            .chars()
            .next()
            .is_some_and(|c| c.is_uppercase());
        if !exported {
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

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

fn collect_calls(ctx: &Ctx, node: Node, caller: &str, out: &mut Vec<CallSite>) {
    if node.kind() == "call_expression"
        && let Some(function) = node.child_by_field_name("function")
    {
        let name = match function.kind() {
            "identifier" => Some(ctx.text(function).to_owned()),
            "selector_expression" => function
                .child_by_field_name("field")
                .map(|f| ctx.text(f).to_owned()),
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

fn first_child_of_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
