use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use rayon::prelude::*;

use crate::cache::SymbolCache;
use crate::cancel::CancellationToken;
use crate::config::AtlasConfig;
use crate::error::{AtlasError, Result};
use crate::graph::build::lower_file;
use crate::graph::edge::EdgeKind;
use crate::graph::node::GraphNode;
use crate::graph::{GraphStore, StoreStats};
use crate::language::LanguageKind;
use crate::model::SymbolKind;
use crate::parser::{FileAnalysis, parse_source};
use crate::query;
use crate::query::{DeadCodeResult, PathsResult, TraceDirection, TraceResult};
use crate::scanner::{rel_path_str, scan_workspace};

/// The indexing facade: scanner -> parser -> symbol cache -> graph store ->
/// resolver, with the query engine on top.
///
/// Concurrency follows the single-writer / multi-reader discipline: queries
/// take the store's read lock and may run in parallel; every mutation
/// (initial build, incremental update) takes the write lock, so a query
/// observes either the pre-update or post-update state, never a partial one.
pub struct CodeAtlas {
    config: AtlasConfig,
    cache: SymbolCache,
    store: RwLock<GraphStore>,
}

enum FileOutcome {
    Analyzed(String, Arc<FileAnalysis>),
    Skipped,
}

impl CodeAtlas {
    pub fn new(config: AtlasConfig) -> Self {
        Self {
            config,
            cache: SymbolCache::new(),
            store: RwLock::new(GraphStore::new()),
        }
    }

    /// Open a workspace with configuration loaded from its `code-atlas.toml`
    /// overlay (falling back to defaults).
    pub fn open(workspace_root: impl Into<PathBuf>) -> Self {
        Self::new(AtlasConfig::load(workspace_root))
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Indexing
    // -----------------------------------------------------------------------

    /// Build the full workspace index.
    ///
    /// Parsing runs with `parser_workers`-bounded parallelism; the graph is
    /// built into a fresh store and swapped in only on success, so a
    /// cancelled or failed build discards partial results and leaves the
    /// previous index visible (discard-partial policy for initial builds).
    pub fn index(&self, cancel: Option<&CancellationToken>) -> Result<StoreStats> {
        let started = std::time::Instant::now();
        let scan = scan_workspace(&self.config)?;
        let mut skipped = scan.skipped;

        let outcomes: Vec<FileOutcome> = if self.config.parser_workers > 1 {
            self.analyze_parallel(&scan.files, cancel)?
        } else {
            let mut outcomes = Vec::with_capacity(scan.files.len());
            for rel in &scan.files {
                if let Some(token) = cancel {
                    token.check()?;
                }
                outcomes.push(self.analyze_file(rel)?);
            }
            outcomes
        };

        let mut fresh = GraphStore::new();
        for outcome in outcomes {
            match outcome {
                FileOutcome::Analyzed(rel, analysis) => {
                    let lowered = lower_file(&rel, &analysis);
                    fresh.add_file(&rel, analysis.parse_errors, lowered.nodes, lowered.edges);
                }
                FileOutcome::Skipped => skipped += 1,
            }
        }
        fresh.files_skipped = skipped;
        fresh.resolve_pending(self.config.edge_resolver_ambiguity_confidence);

        let stats = fresh.stats();
        *self.store.write().expect("graph store lock poisoned") = fresh;

        tracing::info!(
            nodes = stats.nodes,
            edges = stats.edges,
            files = stats.files,
            skipped = stats.files_skipped,
            parse_errors = stats.files_with_parse_errors,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "workspace indexed"
        );
        Ok(stats)
    }

    /// Drop the current index and symbol cache, then rebuild from scratch.
    pub fn reindex(&self, cancel: Option<&CancellationToken>) -> Result<StoreStats> {
        self.cache.clear();
        self.store.write().expect("graph store lock poisoned").clear();
        self.index(cancel)
    }

    fn analyze_parallel(
        &self,
        files: &[PathBuf],
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<FileOutcome>> {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.parser_workers)
            .build()
        {
            Ok(pool) => pool,
            Err(err) => {
                tracing::warn!("falling back to sequential parsing: {err}");
                let mut outcomes = Vec::with_capacity(files.len());
                for rel in files {
                    outcomes.push(self.analyze_file(rel)?);
                }
                return Ok(outcomes);
            }
        };
        pool.install(|| {
            files
                .par_iter()
                .map(|rel| {
                    if let Some(token) = cancel {
                        token.check()?;
                    }
                    self.analyze_file(rel)
                })
                .collect()
        })
    }

    /// Parse one file through the symbol cache.
    ///
    /// `Io` failures skip the file; an unparseable file is indexed with an
    /// empty tree and the parse-error marker. Only `Invariant` propagates.
    fn analyze_file(&self, rel: &Path) -> Result<FileOutcome> {
        let rel_str = rel_path_str(rel);
        let abs = self.config.workspace_root.join(rel);
        let Some(language) = language_of(rel) else {
            return Ok(FileOutcome::Skipped);
        };

        let mtime = match std::fs::metadata(&abs).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(err) => {
                tracing::debug!(file = %rel_str, "stat failed: {err}");
                return Ok(FileOutcome::Skipped);
            }
        };

        if self.config.cache_enabled
            && let Some(hit) = self.cache.get(&abs, mtime)
        {
            return Ok(FileOutcome::Analyzed(rel_str, hit));
        }

        let source = match std::fs::read(&abs) {
            Ok(source) => source,
            Err(err) => {
                tracing::debug!(file = %rel_str, "read failed: {err}");
                return Ok(FileOutcome::Skipped);
            }
        };

        let analysis = match parse_source(&rel_str, language, &source) {
            Ok(analysis) => analysis,
            Err(AtlasError::Parse { path, message }) => {
                tracing::warn!(file = %path.display(), "parse failed: {message}");
                FileAnalysis::empty_with_errors(language)
            }
            Err(err) => return Err(err),
        };

        let analysis = Arc::new(analysis);
        if self.config.cache_enabled {
            self.cache.set(&abs, mtime, Arc::clone(&analysis));
        }
        Ok(FileOutcome::Analyzed(rel_str, analysis))
    }

    // -----------------------------------------------------------------------
    // Incremental updates
    // -----------------------------------------------------------------------

    /// Re-parse one file and rewrite its region of the graph.
    ///
    /// The sequence `remove_file -> add -> resolve` runs under one write lock,
    /// so queries never observe a partial update. Resolution is scoped by
    /// construction: the pending table holds exactly the new file's edges
    /// plus previously unresolved or freshly severed ones.
    pub fn add_or_update_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let rel = self.relativize(path.as_ref());
        let rel_str = rel_path_str(&rel);
        self.cache.invalidate(&self.config.workspace_root.join(&rel));

        if !self.config.workspace_root.join(&rel).exists() {
            self.remove_file(&rel);
            return Ok(());
        }

        match self.analyze_file(&rel)? {
            FileOutcome::Analyzed(rel_str, analysis) => {
                let lowered = lower_file(&rel_str, &analysis);
                let mut store = self.store.write().expect("graph store lock poisoned");
                store.remove_file(&rel_str);
                store.add_file(&rel_str, analysis.parse_errors, lowered.nodes, lowered.edges);
                store.resolve_pending(self.config.edge_resolver_ambiguity_confidence);
                tracing::debug!(file = %rel_str, "incremental update applied");
            }
            FileOutcome::Skipped => {
                tracing::debug!(file = %rel_str, "update skipped: file unreadable");
            }
        }
        Ok(())
    }

    /// Remove a file's nodes and every edge touching them. Severed edges from
    /// surviving callers become unresolved; no re-parse happens.
    pub fn remove_file(&self, path: impl AsRef<Path>) -> usize {
        let rel = self.relativize(path.as_ref());
        let rel_str = rel_path_str(&rel);
        self.cache.invalidate(&self.config.workspace_root.join(&rel));
        let mut store = self.store.write().expect("graph store lock poisoned");
        let removed = store.remove_file(&rel_str);
        tracing::debug!(file = %rel_str, removed, "file removed from index");
        removed
    }

    fn relativize(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.config.workspace_root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => path.to_path_buf(),
        }
    }

    // -----------------------------------------------------------------------
    // Queries (read lock; pure)
    // -----------------------------------------------------------------------

    pub fn find_symbols(
        &self,
        pattern: &str,
        kinds: Option<&[SymbolKind]>,
        limit: usize,
    ) -> Result<Vec<GraphNode>> {
        let store = self.store.read().expect("graph store lock poisoned");
        query::find_symbols(&store, pattern, kinds, limit)
    }

    pub fn get_node(&self, id: &str) -> Option<GraphNode> {
        let store = self.store.read().expect("graph store lock poisoned");
        store.get_node(id).cloned()
    }

    pub fn get_callers(&self, target: &str) -> Vec<GraphNode> {
        let store = self.store.read().expect("graph store lock poisoned");
        query::get_callers(&store, target)
    }

    pub fn get_callees(&self, source: &str) -> Vec<GraphNode> {
        let store = self.store.read().expect("graph store lock poisoned");
        query::get_callees(&store, source)
    }

    /// Bounded BFS from `start`. `max_depth: None` uses the configured
    /// default; `edge_kinds: None` follows all kinds.
    pub fn trace(
        &self,
        start: &str,
        direction: TraceDirection,
        max_depth: Option<usize>,
        edge_kinds: Option<&[EdgeKind]>,
        cancel: Option<&CancellationToken>,
    ) -> Result<TraceResult> {
        let depth = max_depth.unwrap_or(self.config.trace_default_depth);
        let store = self.store.read().expect("graph store lock poisoned");
        query::trace(&store, start, direction, depth, edge_kinds, cancel)
    }

    /// Simple `calls` paths from `from` to `to`, capped by
    /// `max_paths_returned`.
    pub fn find_paths(
        &self,
        from: &str,
        to: &str,
        max_depth: Option<usize>,
        cancel: Option<&CancellationToken>,
    ) -> Result<PathsResult> {
        let depth = max_depth.unwrap_or(self.config.trace_default_depth);
        let store = self.store.read().expect("graph store lock poisoned");
        query::find_paths(
            &store,
            from,
            to,
            depth,
            self.config.max_paths_returned,
            cancel,
        )
    }

    /// Callables unreachable from exported entry points, optionally filtered
    /// (output only) by a file-path pattern.
    pub fn find_dead_code(
        &self,
        file_pattern: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<DeadCodeResult> {
        let pattern = file_pattern.map(query::compile_pattern).transpose()?;
        let store = self.store.read().expect("graph store lock poisoned");
        query::find_dead_code(&store, pattern.as_ref(), cancel)
    }

    pub fn stats(&self) -> StoreStats {
        self.store.read().expect("graph store lock poisoned").stats()
    }

    pub fn symbols_by_kind(&self) -> std::collections::HashMap<SymbolKind, usize> {
        self.store
            .read()
            .expect("graph store lock poisoned")
            .symbols_by_kind()
    }

    /// Unresolved call/import edges currently in the pending table.
    pub fn unresolved_edges(&self) -> Vec<crate::graph::edge::UnresolvedEdge> {
        self.store
            .read()
            .expect("graph store lock poisoned")
            .unresolved_edges()
            .to_vec()
    }

    /// True when the file is currently part of the index.
    pub fn contains_file(&self, path: impl AsRef<Path>) -> bool {
        let rel = self.relativize(path.as_ref());
        let store = self.store.read().expect("graph store lock poisoned");
        store.file_entry(&rel_path_str(&rel)).is_some()
    }

    /// Number of entries currently held by the symbol cache.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

fn language_of(rel: &Path) -> Option<LanguageKind> {
    crate::config::extension_of(rel).and_then(|ext| LanguageKind::from_extension(&ext))
}
