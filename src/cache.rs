use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use crate::parser::FileAnalysis;

/// In-memory cache of parse results, keyed by path + modification time.
///
/// `get` returns the stored analysis only when the stored mtime equals the
/// requested one; any drift is a miss. A single `RwLock` over the map gives
/// the required parallel-reader / serialized-writer discipline, and entries
/// are `Arc`-shared so hits never clone a tree. A stale entry can never be
/// observed as fresh: the mtime comparison happens under the read lock.
#[derive(Debug, Default)]
pub struct SymbolCache {
    entries: RwLock<HashMap<PathBuf, CacheEntry>>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    mtime: SystemTime,
    analysis: Arc<FileAnalysis>,
}

impl SymbolCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached analysis for `path` at exactly `mtime`, or a miss.
    pub fn get(&self, path: &Path, mtime: SystemTime) -> Option<Arc<FileAnalysis>> {
        let entries = self.entries.read().expect("symbol cache lock poisoned");
        entries
            .get(path)
            .filter(|entry| entry.mtime == mtime)
            .map(|entry| Arc::clone(&entry.analysis))
    }

    /// Store (overwrite) the analysis for `path` at `mtime`.
    pub fn set(&self, path: &Path, mtime: SystemTime, analysis: Arc<FileAnalysis>) {
        let mut entries = self.entries.write().expect("symbol cache lock poisoned");
        entries.insert(path.to_path_buf(), CacheEntry { mtime, analysis });
    }

    /// Drop the entry for `path`, if any.
    pub fn invalidate(&self, path: &Path) {
        let mut entries = self.entries.write().expect("symbol cache lock poisoned");
        entries.remove(path);
    }

    /// Drop all entries.
    pub fn clear(&self) {
        let mut entries = self.entries.write().expect("symbol cache lock poisoned");
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("symbol cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::language::LanguageKind;
    use crate::model::SymbolTree;

    fn analysis() -> Arc<FileAnalysis> {
        Arc::new(FileAnalysis {
            tree: SymbolTree {
                language: LanguageKind::TypeScript,
                symbols: vec![],
            },
            imports: vec![],
            exports: vec![],
            calls: vec![],
            parse_errors: false,
        })
    }

    #[test]
    fn test_hit_requires_exact_mtime() {
        let cache = SymbolCache::new();
        let path = Path::new("src/a.ts");
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let t1 = SystemTime::UNIX_EPOCH + Duration::from_secs(101);

        cache.set(path, t0, analysis());
        assert!(cache.get(path, t0).is_some());
        assert!(cache.get(path, t1).is_none(), "newer mtime must miss");
        assert!(
            cache.get(Path::new("src/b.ts"), t0).is_none(),
            "unknown path must miss"
        );
    }

    #[test]
    fn test_set_overwrites() {
        let cache = SymbolCache::new();
        let path = Path::new("src/a.ts");
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let t1 = SystemTime::UNIX_EPOCH + Duration::from_secs(200);

        cache.set(path, t0, analysis());
        cache.set(path, t1, analysis());
        assert!(cache.get(path, t0).is_none(), "old mtime evicted by overwrite");
        assert!(cache.get(path, t1).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = SymbolCache::new();
        let t = SystemTime::UNIX_EPOCH;
        cache.set(Path::new("a.ts"), t, analysis());
        cache.set(Path::new("b.ts"), t, analysis());

        cache.invalidate(Path::new("a.ts"));
        assert!(cache.get(Path::new("a.ts"), t).is_none());
        assert!(cache.get(Path::new("b.ts"), t).is_some());

        cache.clear();
        assert!(cache.is_empty());
    }
}
