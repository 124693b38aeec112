use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use crate::config::AtlasConfig;
use crate::error::{AtlasError, Result};

/// What a workspace scan produced: relative paths to index plus the number of
/// entries that failed with I/O errors and were skipped.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub files: Vec<PathBuf>,
    pub skipped: usize,
}

/// Enumerate the files of a workspace that match the configured extension set.
///
/// Walks depth-first from `config.workspace_root` without following symlinks,
/// skipping the always-ignored directory names, the always-ignored file
/// patterns, and (when enabled) patterns from the root `.gitignore`. Returned
/// paths are workspace-relative.
///
/// Fails with `Io` if the root does not exist or is not a directory;
/// unreadable entries below the root are counted and skipped.
pub fn scan_workspace(config: &AtlasConfig) -> Result<ScanResult> {
    let root = &config.workspace_root;
    let meta = std::fs::metadata(root).map_err(|e| AtlasError::io(root, e))?;
    if !meta.is_dir() {
        return Err(AtlasError::io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotADirectory, "workspace root is not a directory"),
        ));
    }

    let mut skip = IgnoreSet::from_config(config);
    if config.use_gitignore {
        skip.load_gitignore(root);
    }

    let mut result = ScanResult::default();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            // Prune ignored directories before descending into them.
            if entry.file_type().is_dir() {
                let name = entry.file_name().to_str().unwrap_or("");
                return entry.depth() == 0 || !skip.ignores_dir_name(name);
            }
            true
        });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::debug!("scan skipped entry: {err}");
                result.skipped += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match crate::config::extension_of(entry.path()) {
            Some(ext) if config.accepts_extension(&ext) => {}
            _ => continue,
        }

        let rel = match entry.path().strip_prefix(root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => continue,
        };
        if skip.ignores_path(&rel) {
            continue;
        }
        result.files.push(rel);
    }

    tracing::debug!(
        files = result.files.len(),
        skipped = result.skipped,
        "workspace scan complete"
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Ignore set
// ---------------------------------------------------------------------------

/// Compiled skip rules: directory names, path regexes, and the gitignore
/// subset. Shared by the scanner and the file watcher so both sides agree on
/// what is ignored.
pub(crate) struct IgnoreSet {
    dir_names: Vec<String>,
    patterns: Vec<Regex>,
}

impl IgnoreSet {
    pub(crate) fn from_config(config: &AtlasConfig) -> Self {
        let patterns = config
            .always_ignore_patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(err) => {
                    tracing::warn!("ignoring invalid ignore pattern {p:?}: {err}");
                    None
                }
            })
            .collect();
        Self {
            dir_names: config.always_ignore_dirs.clone(),
            patterns,
        }
    }

    /// Add rules translated from the root `.gitignore`, when one exists.
    pub(crate) fn load_gitignore(&mut self, root: &Path) {
        let path = root.join(".gitignore");
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return,
        };
        for line in contents.lines() {
            if let Some(re) = translate_gitignore_line(line) {
                self.patterns.push(re);
            }
        }
    }

    pub(crate) fn ignores_dir_name(&self, name: &str) -> bool {
        self.dir_names.iter().any(|d| d == name)
    }

    /// Match a workspace-relative path (with `/` separators) against the
    /// pattern set.
    pub(crate) fn ignores_path(&self, rel: &Path) -> bool {
        let text = rel_path_str(rel);
        self.patterns.iter().any(|re| re.is_match(&text))
    }
}

/// Normalize a relative path to forward slashes for pattern matching.
pub fn rel_path_str(rel: &Path) -> String {
    let mut out = String::new();
    for component in rel.components() {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    out
}

/// Translate one `.gitignore` line into a regex over relative paths.
///
/// Supported subset: `**` matches across separators, `*` within a segment,
/// `?` a single character; a leading `/` anchors at the workspace root; a
/// trailing `/` restricts to directories. Comments, blank lines, and negated
/// (`!`) patterns yield `None`.
pub fn translate_gitignore_line(line: &str) -> Option<Regex> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
        return None;
    }

    // A trailing `/` marks a directory pattern; the subset treats both forms
    // as "ignore the match and everything beneath it".
    let pattern = line.strip_suffix('/').unwrap_or(line);

    let mut out = String::new();
    match pattern.strip_prefix('/') {
        Some(anchored) => {
            out.push('^');
            translate_glob(anchored, &mut out);
        }
        None => {
            // Unanchored: match at any path-segment boundary.
            out.push_str("(?:^|.*/)");
            translate_glob(pattern, &mut out);
        }
    }
    out.push_str("(?:/.*)?$");

    match Regex::new(&out) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::warn!("skipping untranslatable gitignore line {line:?}: {err}");
            None
        }
    }
}

/// Append the regex translation of a glob body to `out`.
fn translate_glob(glob: &str, out: &mut String) {
    let bytes = glob.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'*' => {
                if bytes.get(i + 1) == Some(&b'*') {
                    out.push_str(".*");
                    i += 2;
                    // Collapse "**/" so `a/**/b` also matches `a/b`-adjacent forms.
                    if bytes.get(i) == Some(&b'/') {
                        out.push_str("/?");
                        i += 1;
                    }
                } else {
                    out.push_str("[^/]*");
                    i += 1;
                }
            }
            b'?' => {
                out.push('.');
                i += 1;
            }
            c => {
                let ch = c as char;
                if regex_syntax_special(ch) {
                    out.push('\\');
                }
                out.push(ch);
                i += 1;
            }
        }
    }
}

fn regex_syntax_special(c: char) -> bool {
    matches!(
        c,
        '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\'
    )
}
