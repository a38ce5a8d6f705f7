//! GitHub workflow command annotations.
//!
//! Each issue becomes one `::error file=…,line=…::message` line, which the
//! Actions runner attaches to the manifest line of the entry.

use distrolint_core::IssueSink;
use distrolint_core::report::IssueLocation;
use distrolint_core::report::Severity;
use std::io;
use std::io::Write;
use std::path::Path;

/// Writes one annotation per issue and aborted entry.
pub fn write_annotations<W: Write>(out: &mut W, file: &Path, sink: &IssueSink) -> io::Result<()> {
    let file = escape_property(&file.display().to_string());

    for entry in sink.aborted() {
        let message = match &entry.subject {
            Some(subject) => format!("{subject}: {}", entry.reason),
            None => entry.reason.clone(),
        };
        write_command(out, "error", &file, entry.location, &message)?;
    }
    for issue in sink.issues() {
        let command = match issue.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write_command(out, command, &file, issue.location, &issue.to_string())?;
    }
    Ok(())
}

fn write_command<W: Write>(
    out: &mut W,
    command: &str,
    file: &str,
    location: IssueLocation,
    message: &str,
) -> io::Result<()> {
    match location.line() {
        Some(line) => writeln!(out, "::{command} file={file},line={line}::{}", escape_data(message)),
        None => writeln!(out, "::{command} file={file}::{}", escape_data(message)),
    }
}

fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(value: &str) -> String {
    escape_data(value).replace(':', "%3A").replace(',', "%2C")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use distrolint_core::report::IssueScope;

    #[test]
    fn test_annotations() {
        let mut sink = IssueSink::new();
        let scope = IssueScope::entry(IssueLocation::Line(12), "Ubuntu/Ubuntu-24.04");
        sink.error(&scope, "No URL found");
        sink.warning(&IssueScope::entry(IssueLocation::None, "Ubuntu"), "100% odd\nline");
        sink.abort(&scope, "invalid archive: bad header");

        let mut out = Vec::new();
        write_annotations(&mut out, Path::new("DistributionInfo.json"), &sink).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec![
                "::error file=DistributionInfo.json,line=12::Ubuntu/Ubuntu-24.04: invalid archive: bad header",
                "::error file=DistributionInfo.json,line=12::Ubuntu/Ubuntu-24.04: No URL found",
                "::warning file=DistributionInfo.json::Ubuntu: 100%25 odd%0Aline",
            ]
        );
    }

    #[test]
    fn test_escape_property() {
        assert_eq!(escape_property("C:\\a,b.json"), "C%3A\\a%2Cb.json");
    }
}
