use regex::Regex;

use crate::error::{AtlasError, Result};
use crate::graph::GraphStore;
use crate::graph::node::GraphNode;
use crate::model::SymbolKind;

/// Compile a user-supplied symbol pattern, surfacing failures as a `Parse`
/// error carrying the pattern text.
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| AtlasError::parse(pattern, format!("invalid symbol pattern: {e}")))
}

/// Search the node table for symbols matching `pattern` (against short or
/// qualified name), optionally restricted to `kinds`, stopping at `limit`.
/// Deterministic: insertion-order scan of the store.
pub fn find_symbols(
    store: &GraphStore,
    pattern: &str,
    kinds: Option<&[SymbolKind]>,
    limit: usize,
) -> Result<Vec<GraphNode>> {
    let re = compile_pattern(pattern)?;
    Ok(store.find_symbols(&re, kinds, limit))
}
