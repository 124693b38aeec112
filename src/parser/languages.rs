use tree_sitter::Language;

use crate::language::LanguageKind;

/// The concrete grammar variant used to parse a file. Distinct from
/// [`LanguageKind`] because TypeScript needs two grammars:
///
/// - `.tsx` MUST use the TSX grammar (the TypeScript grammar cannot parse JSX)
/// - `.ts`/`.mts`/`.cts` MUST use the TypeScript grammar (the TSX grammar
///   breaks angle-bracket type assertions `<T>expr`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    TypeScript,
    Tsx,
    JavaScript,
    Python,
    Go,
    Rust,
}

impl Grammar {
    /// Select the grammar for a language + extension pair.
    pub fn select(language: LanguageKind, ext: &str) -> Grammar {
        match language {
            LanguageKind::TypeScript => {
                if ext == "tsx" {
                    Grammar::Tsx
                } else {
                    Grammar::TypeScript
                }
            }
            LanguageKind::JavaScript => Grammar::JavaScript,
            LanguageKind::Python => Grammar::Python,
            LanguageKind::Go => Grammar::Go,
            LanguageKind::Rust => Grammar::Rust,
        }
    }

    /// The tree-sitter grammar object.
    pub fn language(&self) -> Language {
        match self {
            Grammar::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Grammar::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Grammar::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Grammar::Python => tree_sitter_python::LANGUAGE.into(),
            Grammar::Go => tree_sitter_go::LANGUAGE.into(),
            Grammar::Rust => tree_sitter_rust::LANGUAGE.into(),
        }
    }
}
