use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::language::DEFAULT_EXTENSIONS;

/// Directory names skipped unconditionally during scanning and watching.
pub const ALWAYS_IGNORE_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".svn",
    ".hg",
    "dist",
    "build",
    "out",
    ".next",
    ".nuxt",
    ".output",
    "coverage",
    ".nyc_output",
    "__pycache__",
    ".pytest_cache",
    "venv",
    ".venv",
    "env",
    ".env",
    "target",
    "vendor",
    ".idea",
    ".vscode",
];

/// File patterns skipped unconditionally: minified bundles, declaration-only
/// files, and test/mock files.
pub const ALWAYS_IGNORE_PATTERNS: &[&str] = &[
    r"\.min\.(js|css)$",
    r"\.bundle\.js$",
    r"\.d\.ts$",
    r"\.test\.",
    r"\.spec\.",
    r"__tests__",
    r"__mocks__",
];

/// Options for an indexing session. Every field except `workspace_root` has a
/// default; `AtlasConfig::new` applies them and `load` overlays an optional
/// `code-atlas.toml` at the workspace root.
#[derive(Debug, Clone)]
pub struct AtlasConfig {
    /// Root directory for scanning; all node file paths are relative to it.
    pub workspace_root: PathBuf,
    /// File extensions to index (lowercase, without dot).
    pub extensions: HashSet<String>,
    /// Directory names skipped unconditionally.
    pub always_ignore_dirs: Vec<String>,
    /// Regex patterns (matched against relative paths) skipped unconditionally.
    pub always_ignore_patterns: Vec<String>,
    /// Whether to parse `.gitignore` at the workspace root.
    pub use_gitignore: bool,
    /// Hard cap on the number of paths `find_paths` returns.
    pub max_paths_returned: usize,
    /// Default `max_depth` when a trace caller omits it.
    pub trace_default_depth: usize,
    /// Confidence multiplier applied to ambiguous edge resolutions.
    pub edge_resolver_ambiguity_confidence: f32,
    /// Whether the symbol cache is consulted on re-parse.
    pub cache_enabled: bool,
    /// Coalescing window for file-watcher events, in milliseconds.
    pub watch_debounce_ms: u64,
    /// Bounded parallelism for the initial build.
    pub parser_workers: usize,
}

impl AtlasConfig {
    /// Defaults for a workspace root.
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            always_ignore_dirs: ALWAYS_IGNORE_DIRS.iter().map(|d| d.to_string()).collect(),
            always_ignore_patterns: ALWAYS_IGNORE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            use_gitignore: true,
            max_paths_returned: 100,
            trace_default_depth: 5,
            edge_resolver_ambiguity_confidence: 0.7,
            cache_enabled: true,
            watch_debounce_ms: 100,
            parser_workers: 1,
        }
    }

    /// Defaults overlaid with `code-atlas.toml` from the workspace root, when
    /// present. Missing or unparseable files fall back to plain defaults with
    /// a warning, never an error.
    pub fn load(workspace_root: impl Into<PathBuf>) -> Self {
        let mut config = Self::new(workspace_root);
        let path = config.workspace_root.join("code-atlas.toml");
        if !path.exists() {
            return config;
        }

        let overlay: ConfigFile = match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(overlay) => overlay,
                Err(err) => {
                    tracing::warn!("failed to parse {}: {err}. Using defaults.", path.display());
                    return config;
                }
            },
            Err(err) => {
                tracing::warn!("failed to read {}: {err}. Using defaults.", path.display());
                return config;
            }
        };

        if let Some(exts) = overlay.extensions {
            config.extensions = exts.into_iter().map(|e| e.to_lowercase()).collect();
        }
        if let Some(dirs) = overlay.ignore_dirs {
            config.always_ignore_dirs.extend(dirs);
        }
        if let Some(patterns) = overlay.ignore_patterns {
            config.always_ignore_patterns.extend(patterns);
        }
        if let Some(v) = overlay.use_gitignore {
            config.use_gitignore = v;
        }
        if let Some(v) = overlay.max_paths_returned {
            config.max_paths_returned = v;
        }
        if let Some(v) = overlay.trace_default_depth {
            config.trace_default_depth = v;
        }
        if let Some(v) = overlay.cache_enabled {
            config.cache_enabled = v;
        }
        if let Some(v) = overlay.watch_debounce_ms {
            config.watch_debounce_ms = v;
        }
        if let Some(v) = overlay.parser_workers {
            config.parser_workers = v.max(1);
        }
        config
    }

    /// True when `ext` (any case) is in the configured extension set.
    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.extensions.contains(&ext.to_lowercase())
    }
}

/// On-disk overlay schema. Additional keys are rejected so typos surface in
/// the parse warning instead of being silently ignored.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    extensions: Option<Vec<String>>,
    ignore_dirs: Option<Vec<String>>,
    ignore_patterns: Option<Vec<String>>,
    use_gitignore: Option<bool>,
    max_paths_returned: Option<usize>,
    trace_default_depth: Option<usize>,
    cache_enabled: Option<bool>,
    watch_debounce_ms: Option<u64>,
    parser_workers: Option<usize>,
}

/// Extract the lowercase extension of a path, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}
