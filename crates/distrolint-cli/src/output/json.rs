//! JSON output formatter for machine-readable results.

use super::formatter::CheckSummary;
use super::formatter::JsonOutput;
use super::formatter::ManifestSummary;
use super::formatter::OutputFormatter;
use anyhow::Result;
use distrolint_core::manifest::EntryStatus;
use distrolint_core::report::AbortedEntry;
use distrolint_core::report::ValidationIssue;
use serde::Serialize;
use std::io::Write;
use std::io::{self};

pub struct JsonFormatter;

impl JsonFormatter {
    fn output<T: Serialize>(value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        writeln!(io::stdout(), "{json}")?;
        Ok(())
    }
}

const fn status_name(status: EntryStatus) -> &'static str {
    match status {
        EntryStatus::Checked => "checked",
        EntryStatus::New => "new",
        EntryStatus::Changed => "changed",
        EntryStatus::Unchanged => "unchanged",
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_check_result(&self, summary: &CheckSummary<'_>) -> Result<()> {
        #[derive(Serialize)]
        struct CheckOutput<'a> {
            archive: String,
            format: &'static str,
            sha256: &'a str,
            errors: usize,
            warnings: usize,
            issues: &'a [ValidationIssue],
        }

        let sink = summary.sink;
        let data = CheckOutput {
            archive: summary.archive.display().to_string(),
            format: summary.format.description(),
            sha256: &summary.sha256,
            errors: sink.error_count(),
            warnings: sink.warning_count(),
            issues: sink.issues(),
        };

        let output = JsonOutput::report("check", !sink.has_errors(), data);
        Self::output(&output)
    }

    fn format_manifest_result(&self, summary: &ManifestSummary<'_>) -> Result<()> {
        #[derive(Serialize)]
        struct EntryOutput<'a> {
            flavor: &'a str,
            name: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            line: Option<usize>,
            status: &'static str,
        }

        #[derive(Serialize)]
        struct ManifestOutput<'a> {
            manifest: String,
            entries: Vec<EntryOutput<'a>>,
            errors: usize,
            warnings: usize,
            issues: &'a [ValidationIssue],
            aborted: &'a [AbortedEntry],
        }

        let sink = summary.sink;
        let entries = summary
            .outcomes
            .iter()
            .map(|outcome| EntryOutput {
                flavor: &outcome.flavor,
                name: &outcome.name,
                line: outcome.location.line(),
                status: status_name(outcome.status),
            })
            .collect();
        let data = ManifestOutput {
            manifest: summary.manifest.display().to_string(),
            entries,
            errors: sink.error_count(),
            warnings: sink.warning_count(),
            issues: sink.issues(),
            aborted: sink.aborted(),
        };

        let output = JsonOutput::report("manifest", !sink.has_errors(), data);
        Self::output(&output)
    }

    fn format_error(&self, error: &anyhow::Error) {
        let output = JsonOutput::<()>::error("unknown", format!("{error:#}"));
        let _ = Self::output(&output);
    }

    fn format_warning(&self, message: &str) {
        // stdout carries a single JSON document
        let _ = writeln!(io::stderr(), "warning: {message}");
    }
}
