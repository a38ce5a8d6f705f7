//! Output formatter trait for CLI results.

use anyhow::Result;
use distrolint_core::IssueSink;
use distrolint_core::formats::ArchiveFormat;
use distrolint_core::manifest::EntryOutcome;
use serde::Serialize;
use std::path::Path;

/// Result of validating one archive file.
pub struct CheckSummary<'a> {
    pub archive: &'a Path,
    pub format: ArchiveFormat,
    pub sha256: String,
    pub sink: &'a IssueSink,
}

/// Result of validating a manifest.
pub struct ManifestSummary<'a> {
    pub manifest: &'a Path,
    pub outcomes: &'a [EntryOutcome],
    pub sink: &'a IssueSink,
}

/// Common output formatter trait
pub trait OutputFormatter {
    /// Format the result of `check`
    fn format_check_result(&self, summary: &CheckSummary<'_>) -> Result<()>;

    /// Format the result of `manifest`
    fn format_manifest_result(&self, summary: &ManifestSummary<'_>) -> Result<()>;

    /// Format error message
    fn format_error(&self, error: &anyhow::Error);

    /// Format warning message
    fn format_warning(&self, message: &str);
}

/// Generic JSON output structure
#[derive(Debug, Serialize)]
pub struct JsonOutput<T> {
    pub operation: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
    Error,
}

impl<T: Serialize> JsonOutput<T> {
    /// A validation report; `Failed` when `passed` is false.
    pub fn report(operation: impl Into<String>, passed: bool, data: T) -> Self {
        Self {
            operation: operation.into(),
            status: if passed { Status::Passed } else { Status::Failed },
            data: Some(data),
            error: None,
        }
    }

    pub fn error(operation: impl Into<String>, error: impl Into<String>) -> JsonOutput<()> {
        JsonOutput {
            operation: operation.into(),
            status: Status::Error,
            data: None,
            error: Some(error.into()),
        }
    }
}
