use std::path::PathBuf;

use thiserror::Error;

/// The closed error taxonomy of the indexing core.
///
/// Per-file `Io`/`Parse` errors are recovered locally during indexing (the
/// file is skipped or indexed partially); queries surface `NotFound` as typed
/// empty results instead of raising it. Only `Invariant` aborts an operation.
#[derive(Debug, Error)]
pub enum AtlasError {
    /// A file or directory could not be read or listed.
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The parser could not produce a tree for a file.
    #[error("parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A query referenced a symbol or node id that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A query observed its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// An internal consistency check failed. This is a bug; the diagnostic
    /// identifies the offending file and span.
    #[error("invariant violated in {file}: {message}")]
    Invariant { file: PathBuf, message: String },
}

impl AtlasError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AtlasError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        AtlasError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invariant(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        AtlasError::Invariant {
            file: file.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AtlasError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_path() {
        let err = AtlasError::io(
            "src/missing.ts",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let text = err.to_string();
        assert!(text.contains("src/missing.ts"), "got: {text}");
    }

    #[test]
    fn test_invariant_display() {
        let err = AtlasError::invariant("src/a.ts", "child escapes parent");
        assert!(err.to_string().contains("invariant violated"));
    }
}
