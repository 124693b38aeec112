use serde::{Deserialize, Serialize};

use crate::model::SymbolKind;

/// A symbol promoted into the graph store.
///
/// The id is the stable external handle: `"<relative_file>:<qualified_name>"`,
/// both components verbatim (case-preserving, no normalization beyond
/// workspace relativization). File nodes use an empty qualified name, so their
/// id is the path followed by a bare colon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    /// Short, unqualified name.
    pub name: String,
    /// Dot-separated ancestor path, e.g. `UserService.getUser`.
    pub qualified_name: String,
    pub kind: SymbolKind,
    /// Workspace-relative file path.
    pub file: String,
    /// 1-based start line of the declaration.
    pub line: usize,
    /// Derived from an export binding referencing this name (or an exported
    /// container: members of an exported class are reachable from outside).
    pub is_exported: bool,
}

/// Compose the stable node id for a (file, qualified name) pair.
pub fn node_id(file: &str, qualified_name: &str) -> String {
    format!("{file}:{qualified_name}")
}

impl GraphNode {
    /// The id of the file node owning this node.
    pub fn file_id(&self) -> String {
        node_id(&self.file, "")
    }
}
