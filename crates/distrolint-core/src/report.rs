//! Validation issue collection.
//!
//! Every check appends to an [`IssueSink`] that the caller owns and passes
//! down by `&mut`. Nothing is stored globally, so one sink can be reset and
//! reused for the next manifest or archive.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

/// Severity of a validation issue.
///
/// Ordered so that `Error > Warning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Style or best-practice deviation; does not block acceptance.
    Warning,
    /// Policy violation that blocks acceptance.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Where an issue should be reported.
///
/// Plain archive checks have no location; manifest entries carry the
/// 1-based source line of their `"Name"` key so CI annotations can point at
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueLocation {
    /// No source location.
    #[default]
    None,
    /// Line in the manifest file.
    Line(usize),
}

impl IssueLocation {
    /// Returns the line number, if any.
    #[must_use]
    pub const fn line(self) -> Option<usize> {
        match self {
            Self::None => None,
            Self::Line(line) => Some(line),
        }
    }
}

/// The distribution an issue belongs to, plus its location.
///
/// Checks receive a scope and stamp it onto every issue they emit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IssueScope {
    /// Source location of the entry.
    pub location: IssueLocation,
    /// `flavor/name` of the entry, when validating a manifest.
    pub subject: Option<String>,
}

impl IssueScope {
    /// Scope for a stand-alone archive.
    #[must_use]
    pub fn archive() -> Self {
        Self::default()
    }

    /// Scope for a manifest entry.
    #[must_use]
    pub fn entry(location: IssueLocation, subject: impl Into<String>) -> Self {
        Self {
            location,
            subject: Some(subject.into()),
        }
    }
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Error or warning.
    pub severity: Severity,
    /// Where to report it.
    pub location: IssueLocation,
    /// `flavor/name` of the entry, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subject {
            Some(subject) => write!(f, "{subject}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// An entry whose archive could not be opened at all.
///
/// Kept apart from policy issues: no check ran for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbortedEntry {
    /// Where to report it.
    pub location: IssueLocation,
    /// `flavor/name` of the entry, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Why the archive could not be opened.
    pub reason: String,
}

/// Append-only collector of validation issues.
///
/// # Examples
///
/// ```
/// use distrolint_core::report::IssueScope;
/// use distrolint_core::report::IssueSink;
///
/// let mut sink = IssueSink::new();
/// let scope = IssueScope::archive();
/// sink.warning(&scope, "file: \"/etc/shadow\" has unexpected mode: 0o644");
/// sink.error(&scope, "No root (uid=0) found in /etc/passwd");
///
/// assert!(sink.has_errors());
/// assert_eq!(sink.error_count(), 1);
/// assert_eq!(sink.warning_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct IssueSink {
    issues: Vec<ValidationIssue>,
    aborted: Vec<AbortedEntry>,
}

impl IssueSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an issue.
    pub fn push(&mut self, issue: ValidationIssue) {
        debug!(severity = %issue.severity, "{issue}");
        self.issues.push(issue);
    }

    /// Records an error in `scope`.
    pub fn error(&mut self, scope: &IssueScope, message: impl Into<String>) {
        self.record(Severity::Error, scope, message.into());
    }

    /// Records a warning in `scope`.
    pub fn warning(&mut self, scope: &IssueScope, message: impl Into<String>) {
        self.record(Severity::Warning, scope, message.into());
    }

    /// Records an entry whose archive could not be opened.
    pub fn abort(&mut self, scope: &IssueScope, reason: impl Into<String>) {
        let entry = AbortedEntry {
            location: scope.location,
            subject: scope.subject.clone(),
            reason: reason.into(),
        };
        debug!(reason = %entry.reason, "validation aborted");
        self.aborted.push(entry);
    }

    fn record(&mut self, severity: Severity, scope: &IssueScope, message: String) {
        self.push(ValidationIssue {
            severity,
            location: scope.location,
            subject: scope.subject.clone(),
            message,
        });
    }

    /// All issues in the order they were recorded.
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// All aborted entries.
    #[must_use]
    pub fn aborted(&self) -> &[AbortedEntry] {
        &self.aborted
    }

    /// Issues of one severity, in recording order.
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    /// Number of errors recorded.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.with_severity(Severity::Error).count()
    }

    /// Number of warnings recorded.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.with_severity(Severity::Warning).count()
    }

    /// Returns `true` if any error was recorded or any entry was aborted.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.aborted.is_empty() || self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    /// Groups issues by location, preserving recording order inside each
    /// group.
    #[must_use]
    pub fn grouped(&self) -> BTreeMap<IssueLocation, Vec<&ValidationIssue>> {
        let mut groups: BTreeMap<IssueLocation, Vec<&ValidationIssue>> = BTreeMap::new();
        for issue in &self.issues {
            groups.entry(issue.location).or_default().push(issue);
        }
        groups
    }

    /// Clears the sink for the next top-level validation.
    pub fn reset(&mut self) {
        self.issues.clear();
        self.aborted.clear();
    }
}
