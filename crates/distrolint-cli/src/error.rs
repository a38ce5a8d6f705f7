//! Error conversion utilities for CLI.
//!
//! Converts distrolint-core's typed errors (thiserror) into user-friendly
//! contextual errors (anyhow) with actionable guidance.

use anyhow::anyhow;
use distrolint_core::LintError;
use std::path::Path;

/// Converts `LintError` to user-friendly anyhow error with context
pub fn convert_lint_error(err: LintError, path: &Path) -> anyhow::Error {
    match err {
        LintError::Io(io_err) => {
            anyhow!(
                "I/O error while reading '{}': {}\n\
                 HINT: Check that the file exists and is readable.",
                path.display(),
                io_err
            )
        }
        LintError::InvalidArchive(reason) => {
            anyhow!(
                "Invalid archive '{}': {}\n\
                 HINT: The file is truncated or not a tar archive. WSL images are \
                 gzip or xz compressed tarballs.",
                path.display(),
                reason
            )
        }
        LintError::UnsupportedFormat(reason) => {
            anyhow!(
                "Archive format not supported: {} ({})\n\
                 HINT: Supported formats: tar, tar.gz, tar.xz, tar.zst, tar.bz2",
                path.display(),
                reason
            )
        }
        LintError::InvalidManifest(reason) => {
            anyhow!(
                "Invalid manifest '{}': {}\n\
                 HINT: Expected {{\"ModernDistributions\": {{\"<flavor>\": [ ... ]}}}}",
                path.display(),
                reason
            )
        }
        LintError::Json(json_err) => {
            anyhow!(
                "Manifest '{}' is not valid JSON: {}",
                path.display(),
                json_err
            )
        }
    }
}

/// Adds context to a result from distrolint-core
pub fn add_path_context<T>(
    result: Result<T, LintError>,
    path: &Path,
) -> anyhow::Result<T> {
    result.map_err(|e| convert_lint_error(e, path))
}
