use serde::{Deserialize, Serialize};

/// A programming language handled by code-atlas.
///
/// Plain enum (not trait objects) so dispatch sites pattern-match; cheap to
/// copy across the parser and cache layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageKind {
    TypeScript,
    JavaScript,
    Python,
    Go,
    Rust,
}

/// Default extension set: everything any supported language claims.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs", "py", "pyi", "go", "rs",
];

impl LanguageKind {
    /// Map a file extension (lowercase, without dot) to a language.
    pub fn from_extension(ext: &str) -> Option<LanguageKind> {
        match ext {
            "ts" | "tsx" | "mts" | "cts" => Some(LanguageKind::TypeScript),
            "js" | "jsx" | "mjs" | "cjs" => Some(LanguageKind::JavaScript),
            "py" | "pyi" => Some(LanguageKind::Python),
            "go" => Some(LanguageKind::Go),
            "rs" => Some(LanguageKind::Rust),
            _ => None,
        }
    }

    /// True if this language claims the given extension.
    pub fn matches_extension(&self, ext: &str) -> bool {
        LanguageKind::from_extension(ext) == Some(*self)
    }

    /// Stable identifier used in output and the `SymbolTree.language` field.
    pub fn id(&self) -> &'static str {
        match self {
            LanguageKind::TypeScript => "typescript",
            LanguageKind::JavaScript => "javascript",
            LanguageKind::Python => "python",
            LanguageKind::Go => "go",
            LanguageKind::Rust => "rust",
        }
    }

    /// Parse a CLI flag string. Case-insensitive, accepts short forms.
    pub fn from_str_loose(s: &str) -> Option<LanguageKind> {
        match s.to_lowercase().as_str() {
            "typescript" | "ts" => Some(LanguageKind::TypeScript),
            "javascript" | "js" => Some(LanguageKind::JavaScript),
            "python" | "py" => Some(LanguageKind::Python),
            "go" => Some(LanguageKind::Go),
            "rust" | "rs" => Some(LanguageKind::Rust),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(LanguageKind::from_extension("ts"), Some(LanguageKind::TypeScript));
        assert_eq!(LanguageKind::from_extension("mts"), Some(LanguageKind::TypeScript));
        assert_eq!(LanguageKind::from_extension("cjs"), Some(LanguageKind::JavaScript));
        assert_eq!(LanguageKind::from_extension("pyi"), Some(LanguageKind::Python));
        assert_eq!(LanguageKind::from_extension("go"), Some(LanguageKind::Go));
        assert_eq!(LanguageKind::from_extension("rs"), Some(LanguageKind::Rust));
        assert_eq!(LanguageKind::from_extension("java"), None);
    }

    #[test]
    fn test_matches_extension() {
        assert!(LanguageKind::TypeScript.matches_extension("tsx"));
        assert!(!LanguageKind::TypeScript.matches_extension("js"));
        assert!(LanguageKind::Rust.matches_extension("rs"));
    }

    #[test]
    fn test_from_str_loose() {
        assert_eq!(LanguageKind::from_str_loose("TypeScript"), Some(LanguageKind::TypeScript));
        assert_eq!(LanguageKind::from_str_loose("PY"), Some(LanguageKind::Python));
        assert_eq!(LanguageKind::from_str_loose("rs"), Some(LanguageKind::Rust));
        assert_eq!(LanguageKind::from_str_loose("cobol"), None);
    }

    #[test]
    fn test_default_extensions_all_map() {
        for ext in DEFAULT_EXTENSIONS {
            assert!(
                LanguageKind::from_extension(ext).is_some(),
                "extension {ext} must map to a language"
            );
        }
    }
}
