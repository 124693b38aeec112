//! code-atlas: a workspace-scoped, multi-language code graph.
//!
//! The pipeline: the [`scanner`] enumerates workspace files, the [`parser`]
//! turns each into a symbol tree plus import/export/call-site lists (cached
//! by mtime in the [`cache`]), the [`graph`] store holds nodes and edges with
//! an edge resolver linking raw callee names to nodes, and the [`query`]
//! engine answers symbol search, caller/callee lookup, bounded traces, path
//! enumeration, and dead-code analysis. The [`watcher`] feeds incremental
//! updates back through the same path.
//!
//! [`CodeAtlas`] is the facade tying the stages together:
//!
//! ```no_run
//! use code_atlas::CodeAtlas;
//!
//! let atlas = CodeAtlas::open("/path/to/workspace");
//! let stats = atlas.index(None)?;
//! println!("{} nodes, {} edges", stats.nodes, stats.edges);
//! for node in atlas.get_callers("findById") {
//!     println!("{} ({}:{})", node.qualified_name, node.file, node.line);
//! }
//! # Ok::<(), code_atlas::AtlasError>(())
//! ```

pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod language;
pub mod model;
pub mod parser;
pub mod query;
pub mod scanner;
pub mod watcher;

pub use cancel::CancellationToken;
pub use config::AtlasConfig;
pub use error::{AtlasError, Result};
pub use graph::edge::{EdgeKind, UnresolvedEdge};
pub use graph::node::GraphNode;
pub use graph::{GraphStore, StoreStats};
pub use indexer::CodeAtlas;
pub use language::LanguageKind;
pub use model::{
    CallSite, ExportInfo, ExportKind, ImportInfo, ImportKind, Location, Span, Symbol, SymbolKind,
    SymbolTree,
};
pub use query::{DeadCodeResult, PathsResult, TraceDirection, TraceResult};
pub use watcher::{WatchEvent, WatcherHandle, watch};
