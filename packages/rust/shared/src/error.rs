//! Error types for DocHub.
//!
//! Library crates use [`DocHubError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Conversions never return recoverable issues as `Err`: the mappers render
//! them through this type's `Display` into the warning/error lists of a
//! conversion result instead.

use std::path::PathBuf;

/// Category of a markdown parse failure or warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Malformed syntax (unterminated fences, truncated tables).
    Syntax,
    /// Well-formed syntax with inconsistent structure (column mismatches).
    Structure,
    /// Content that could not be interpreted (invalid front matter).
    Content,
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::Structure => write!(f, "structure"),
            Self::Content => write!(f, "content"),
        }
    }
}

/// Top-level error type for all DocHub operations.
#[derive(Debug, thiserror::Error)]
pub enum DocHubError {
    /// Configuration loading or option validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Markdown parsing error.
    #[error("{kind} error at line {line}: {message}")]
    Parse {
        kind: ParseErrorKind,
        line: usize,
        message: String,
    },

    /// A construct with no counterpart in the target format.
    #[error("unsupported block: {block_type}")]
    UnsupportedBlock { block_type: String },

    /// Text longer than the structured-document service accepts.
    #[error("{block_type} content is {length} characters, exceeding the {limit} character limit")]
    ContentLengthExceeded {
        block_type: String,
        length: usize,
        limit: usize,
    },

    /// A source file that does not exist.
    #[error("file not found: {path:?}")]
    FileNotFound { path: PathBuf },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Unknown conversion job identifier.
    #[error("job not found: {id}")]
    JobNotFound { id: String },

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Structured-document service failure.
    #[error("network error: {0}")]
    Network(String),

    /// Conversion that produced errors severe enough to abort a page flow.
    #[error("conversion error: {0}")]
    Conversion(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocHubError>;

impl DocHubError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error of the given kind at a 1-based line.
    pub fn parse(kind: ParseErrorKind, line: usize, msg: impl Into<String>) -> Self {
        Self::Parse {
            kind,
            line,
            message: msg.into(),
        }
    }

    /// Create an unsupported-block error for the named construct.
    pub fn unsupported(block_type: impl Into<String>) -> Self {
        Self::UnsupportedBlock {
            block_type: block_type.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    ///
    /// `NotFound` errors become [`DocHubError::FileNotFound`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::FileNotFound { path };
        }
        Self::Io { path, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DocHubError::config("max_heading_level must be between 1 and 6");
        assert_eq!(
            err.to_string(),
            "config error: max_heading_level must be between 1 and 6"
        );

        let err = DocHubError::parse(ParseErrorKind::Syntax, 12, "unterminated code fence");
        assert_eq!(
            err.to_string(),
            "syntax error at line 12: unterminated code fence"
        );

        let err = DocHubError::ContentLengthExceeded {
            block_type: "paragraph".into(),
            length: 5000,
            limit: 2000,
        };
        assert!(err.to_string().contains("5000 characters"));
    }

    #[test]
    fn io_not_found_maps_to_file_not_found() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = DocHubError::io("docs/missing.md", source);
        assert!(matches!(err, DocHubError::FileNotFound { .. }));

        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = DocHubError::io("docs/locked.md", source);
        assert!(matches!(err, DocHubError::Io { .. }));
    }
}
