use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};

use crate::error::{AtlasError, Result};
use crate::indexer::CodeAtlas;
use crate::scanner::IgnoreSet;

/// A debounced, classified file event. Paths are workspace-relative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Added(PathBuf),
    Changed(PathBuf),
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Added(p) | WatchEvent::Changed(p) | WatchEvent::Removed(p) => p,
        }
    }
}

/// Handle to a running watcher. Dropping it stops the OS watcher.
pub struct WatcherHandle {
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
}

/// Start watching the atlas workspace and apply incremental updates.
///
/// Events are debounced with the configured coalescing window (bursts on the
/// same file collapse into one re-parse), filtered through the same ignore
/// set and extension whitelist the scanner uses, classified into
/// added/changed/removed, applied to the index in arrival order, and then
/// forwarded on the returned channel for observability.
pub fn watch(atlas: Arc<CodeAtlas>) -> Result<(WatcherHandle, mpsc::Receiver<WatchEvent>)> {
    let config = atlas.config();
    let root = config.workspace_root.clone();
    let mut ignore = IgnoreSet::from_config(config);
    if config.use_gitignore {
        ignore.load_gitignore(&root);
    }
    let debounce = Duration::from_millis(config.watch_debounce_ms);

    let (tx, rx) = mpsc::channel::<WatchEvent>();
    let callback_atlas = Arc::clone(&atlas);
    let callback_root = root.clone();

    let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| match result {
        Ok(events) => {
            for event in events {
                let Some(classified) =
                    classify(&callback_atlas, &callback_root, &ignore, &event.path)
                else {
                    continue;
                };
                apply_event(&callback_atlas, &classified);
                // Receiver may be gone; updates were already applied.
                let _ = tx.send(classified);
            }
        }
        Err(err) => tracing::warn!("watcher error: {err}"),
    })
    .map_err(|e| AtlasError::io(&root, std::io::Error::other(e)))?;

    debouncer
        .watcher()
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| AtlasError::io(&root, std::io::Error::other(e)))?;

    tracing::info!(root = %root.display(), "file watcher started");
    Ok((WatcherHandle { _debouncer: debouncer }, rx))
}

/// Filter and classify a raw event path.
///
/// Order: workspace containment, ignored directory components, extension
/// whitelist, ignore patterns, then existence (added/changed vs removed).
fn classify(
    atlas: &CodeAtlas,
    root: &Path,
    ignore: &IgnoreSet,
    path: &Path,
) -> Option<WatchEvent> {
    let rel = path.strip_prefix(root).ok()?;
    if rel
        .components()
        .any(|c| ignore.ignores_dir_name(&c.as_os_str().to_string_lossy()))
    {
        return None;
    }
    let ext = crate::config::extension_of(rel)?;
    if !atlas.config().accepts_extension(&ext) {
        return None;
    }
    if ignore.ignores_path(rel) {
        return None;
    }

    if path.exists() {
        if atlas.contains_file(rel) {
            Some(WatchEvent::Changed(rel.to_path_buf()))
        } else {
            Some(WatchEvent::Added(rel.to_path_buf()))
        }
    } else {
        Some(WatchEvent::Removed(rel.to_path_buf()))
    }
}

/// React to one classified event: re-parse on add/change, drop on remove.
pub fn apply_event(atlas: &CodeAtlas, event: &WatchEvent) {
    match event {
        WatchEvent::Added(path) | WatchEvent::Changed(path) => {
            if let Err(err) = atlas.add_or_update_file(path) {
                tracing::warn!(file = %path.display(), "incremental update failed: {err}");
            }
        }
        WatchEvent::Removed(path) => {
            atlas.remove_file(path);
        }
    }
}
