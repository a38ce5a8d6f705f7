//! Human-readable output formatter with colors and styling.

use super::formatter::CheckSummary;
use super::formatter::ManifestSummary;
use super::formatter::OutputFormatter;
use anyhow::Result;
use console::Term;
use console::style;
use distrolint_core::IssueSink;
use distrolint_core::manifest::EntryStatus;
use distrolint_core::report::AbortedEntry;
use distrolint_core::report::IssueLocation;
use distrolint_core::report::Severity;
use distrolint_core::report::ValidationIssue;

pub struct HumanFormatter {
    verbose: bool,
    quiet: bool,
    use_colors: bool,
    term: Term,
}

impl HumanFormatter {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            use_colors: console::colors_enabled(),
            term: Term::stdout(),
        }
    }

    fn plural(count: usize, noun: &str) -> String {
        if count == 1 {
            format!("{count} {noun}")
        } else {
            format!("{count} {noun}s")
        }
    }

    fn counts(sink: &IssueSink) -> String {
        let mut parts = vec![
            Self::plural(sink.error_count(), "error"),
            Self::plural(sink.warning_count(), "warning"),
        ];
        if !sink.aborted().is_empty() {
            parts.push(format!("{} aborted", sink.aborted().len()));
        }
        parts.join(", ")
    }

    fn where_(subject: Option<&str>, location: IssueLocation) -> String {
        match (subject, location.line()) {
            (Some(subject), Some(line)) => format!("{subject} (line {line}): "),
            (Some(subject), None) => format!("{subject}: "),
            (None, Some(line)) => format!("line {line}: "),
            (None, None) => String::new(),
        }
    }

    fn format_issue(&self, issue: &ValidationIssue) -> String {
        let severity = if self.use_colors {
            match issue.severity {
                Severity::Error => style("ERROR").red().bold().to_string(),
                Severity::Warning => style("WARNING").yellow().to_string(),
            }
        } else {
            format!("[{}]", issue.severity)
        };
        format!(
            "  {severity} {}{}",
            Self::where_(issue.subject.as_deref(), issue.location),
            issue.message
        )
    }

    fn format_aborted(&self, entry: &AbortedEntry) -> String {
        let label = if self.use_colors {
            style("ABORTED").red().bold().to_string()
        } else {
            "[aborted]".to_string()
        };
        format!(
            "  {label} {}{}",
            Self::where_(entry.subject.as_deref(), entry.location),
            entry.reason
        )
    }

    fn write_status(&self, passed: bool, headline: &str) {
        let line = match (self.use_colors, passed) {
            (true, true) => format!("{} {headline}", style("✓").green().bold()),
            (true, false) => format!("{} {headline}", style("✗").red().bold()),
            (false, _) => headline.to_string(),
        };
        let _ = self.term.write_line(&line);
    }

    /// Issues and aborted entries; warnings are hidden in quiet mode.
    fn write_issues(&self, sink: &IssueSink) {
        let shown: Vec<&ValidationIssue> = sink
            .issues()
            .iter()
            .filter(|issue| !self.quiet || issue.severity == Severity::Error)
            .collect();
        if shown.is_empty() && sink.aborted().is_empty() {
            return;
        }

        if !self.quiet {
            let _ = self.term.write_line("");
            let _ = self.term.write_line("Issues:");
        }
        for entry in sink.aborted() {
            let _ = self.term.write_line(&self.format_aborted(entry));
        }
        for issue in shown {
            let _ = self.term.write_line(&self.format_issue(issue));
        }
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_check_result(&self, summary: &CheckSummary<'_>) -> Result<()> {
        let sink = summary.sink;
        if !self.quiet {
            let passed = !sink.has_errors();
            let verdict = if passed { "passed" } else { "failed" };
            self.write_status(
                passed,
                &format!(
                    "{} {verdict} ({})",
                    summary.archive.display(),
                    Self::counts(sink)
                ),
            );
            let _ = self
                .term
                .write_line(&format!("  Format: {}", summary.format.description()));
            if self.verbose {
                let _ = self
                    .term
                    .write_line(&format!("  SHA-256: {}", summary.sha256));
            }
        }

        self.write_issues(sink);
        Ok(())
    }

    fn format_manifest_result(&self, summary: &ManifestSummary<'_>) -> Result<()> {
        let sink = summary.sink;
        if !self.quiet {
            for outcome in summary.outcomes {
                let label = match outcome.status {
                    EntryStatus::New => "new",
                    EntryStatus::Changed => "changed",
                    EntryStatus::Checked if self.verbose => "checked",
                    EntryStatus::Unchanged if self.verbose => "unchanged, skipped",
                    EntryStatus::Checked | EntryStatus::Unchanged => continue,
                };
                let location = outcome
                    .location
                    .line()
                    .map_or_else(String::new, |line| format!(" (line {line})"));
                let _ = self.term.write_line(&format!(
                    "{}/{}{location}: {label}",
                    outcome.flavor, outcome.name
                ));
            }

            let passed = !sink.has_errors();
            let verdict = if passed { "passed" } else { "failed" };
            self.write_status(
                passed,
                &format!(
                    "{} {verdict}: {} ({})",
                    summary.manifest.display(),
                    Self::plural(summary.outcomes.len(), "entry"),
                    Self::counts(sink)
                ),
            );
        }

        self.write_issues(sink);
        Ok(())
    }

    fn format_error(&self, error: &anyhow::Error) {
        // Always show errors, even in quiet mode
        let term = Term::stderr();
        if self.use_colors {
            let _ = term.write_line(&format!("{} {error:?}", style("ERROR:").red().bold()));
        } else {
            let _ = term.write_line(&format!("ERROR: {error:?}"));
        }
    }

    fn format_warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let term = Term::stderr();
        if self.use_colors {
            let _ = term.write_line(&format!("{} {message}", style("⚠").yellow().bold()));
        } else {
            let _ = term.write_line(&format!("WARNING: {message}"));
        }
    }
}
