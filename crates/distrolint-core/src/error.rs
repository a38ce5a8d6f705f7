//! Error types for archive indexing and validation.
//!
//! Policy violations are never reported through these types; they are
//! recorded as [`ValidationIssue`](crate::report::ValidationIssue)s. A
//! `LintError` means an operation could not be carried out at all.

use thiserror::Error;

/// Result type alias using `LintError`.
pub type Result<T> = std::result::Result<T, LintError>;

/// Errors that can occur while opening or inspecting a distribution archive.
#[derive(Error, Debug)]
pub enum LintError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The tar framing of the archive could not be read.
    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    /// The byte stream is not a (possibly compressed) tar archive.
    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    /// A distribution manifest is structurally invalid.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LintError {
    /// Returns `true` if this error aborts the validation of an archive.
    ///
    /// Fatal errors prevent the archive index from being built, so no policy
    /// check can run. They must be reported separately from policy issues.
    ///
    /// # Examples
    ///
    /// ```
    /// use distrolint_core::LintError;
    ///
    /// let err = LintError::InvalidArchive("truncated header".to_string());
    /// assert!(err.is_fatal());
    ///
    /// let err = LintError::InvalidManifest("missing ModernDistributions".to_string());
    /// assert!(!err.is_fatal());
    /// ```
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::InvalidArchive(_) | Self::UnsupportedFormat(_)
        )
    }

    /// Returns a context string for this error, if available.
    ///
    /// # Examples
    ///
    /// ```
    /// use distrolint_core::LintError;
    ///
    /// let err = LintError::InvalidArchive("bad header".to_string());
    /// assert_eq!(err.context(), Some("bad header"));
    /// ```
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        match self {
            Self::InvalidArchive(msg)
            | Self::UnsupportedFormat(msg)
            | Self::InvalidManifest(msg) => Some(msg),
            Self::Io(_) | Self::Json(_) => None,
        }
    }
}
