use tree_sitter::Node;

use crate::model::{Location, Span};

/// Extract the UTF-8 text of a node from the original source bytes.
pub fn node_text<'a>(node: Node<'a>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// The source span of a node. Lines/columns are converted to 1-indexed.
pub fn span_of(node: Node) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span {
        start: Location {
            line: start.row + 1,
            column: start.column + 1,
            offset: node.start_byte(),
        },
        end: Location {
            line: end.row + 1,
            column: end.column + 1,
            offset: node.end_byte(),
        },
    }
}

/// 1-based start line of a node.
pub fn line_of(node: Node) -> usize {
    node.start_position().row + 1
}

/// The trimmed text of the 0-indexed `row` in `source`. Used for call-site
/// context lines.
pub fn context_line(source: &[u8], row: usize) -> String {
    let text = String::from_utf8_lossy(source);
    text.lines().nth(row).unwrap_or("").trim().to_owned()
}

/// Strip comment markers from a doc comment block and normalize whitespace.
///
/// Handles `/** ... */` (leading `*` gutters removed), `///`, `//!`, `//`,
/// and `#` line prefixes.
pub fn strip_doc_markers(raw: &str) -> String {
    let raw = raw.trim();
    let body = raw
        .strip_prefix("/**")
        .or_else(|| raw.strip_prefix("/*"))
        .map(|s| s.strip_suffix("*/").unwrap_or(s))
        .unwrap_or(raw);

    let mut lines = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        let line = line
            .strip_prefix("///")
            .or_else(|| line.strip_prefix("//!"))
            .or_else(|| line.strip_prefix("//"))
            .or_else(|| line.strip_prefix('*'))
            .or_else(|| line.strip_prefix('#'))
            .unwrap_or(line)
            .trim();
        lines.push(line);
    }
    // Drop leading/trailing blank lines left by comment framing.
    while lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Strip the quotes of a string literal (single, double, or triple).
pub fn strip_string_quotes(raw: &str) -> &str {
    let raw = raw.trim();
    for quotes in ["\"\"\"", "'''"] {
        if let Some(inner) = raw
            .strip_prefix(quotes)
            .and_then(|s| s.strip_suffix(quotes))
        {
            return inner;
        }
    }
    for quote in ['"', '\'', '`'] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return &raw[1..raw.len() - 1];
        }
    }
    raw
}

/// Collect the doc comment immediately preceding `node`, if any.
///
/// `is_doc` decides whether a single comment's raw text counts as
/// documentation; contiguous qualifying line comments directly above the
/// declaration are merged (for languages without block doc comments).
pub fn preceding_doc<F>(node: Node, source: &[u8], is_doc: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    let mut parts: Vec<String> = Vec::new();
    let mut expected_row = node.start_position().row;
    let mut current = node.prev_sibling();

    while let Some(sib) = current {
        if !sib.kind().ends_with("comment") {
            break;
        }
        let raw = node_text(sib, source);
        // Must be directly above: the comment ends on the line before the
        // node (or the previous collected comment).
        if sib.end_position().row + 1 != expected_row {
            break;
        }
        if !is_doc(raw) {
            break;
        }
        parts.push(raw.to_owned());
        // Block comments satisfy the lookup on their own.
        if raw.starts_with("/*") {
            break;
        }
        expected_row = sib.start_position().row;
        current = sib.prev_sibling();
    }

    if parts.is_empty() {
        return None;
    }
    parts.reverse();
    let text = strip_doc_markers(&parts.join("\n"));
    if text.is_empty() { None } else { Some(text) }
}
