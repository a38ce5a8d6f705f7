//! High-level public API for validating distribution archives.

use std::io::Read;
use std::io::Seek;
use std::path::Path;

use tracing::info;

use crate::PolicyConfig;
use crate::Result;
use crate::archive::ArchiveIndex;
use crate::formats::ArchiveFormat;
use crate::formats::ArchiveSource;
use crate::policy::PolicyValidator;
use crate::report::IssueScope;
use crate::report::IssueSink;

/// Indexes a plain tar stream and runs the policy checklist on it.
///
/// Policy violations are appended to `sink`; only a failure to read the tar
/// framing is returned as an error, in which case no check has run.
///
/// # Errors
///
/// Returns `LintError::InvalidArchive` if the tar framing is malformed.
///
/// # Examples
///
/// ```
/// use distrolint_core::PolicyConfig;
/// use distrolint_core::report::IssueScope;
/// use distrolint_core::report::IssueSink;
/// use distrolint_core::test_utils::minimal_image;
/// use distrolint_core::types::Architecture;
/// use distrolint_core::validate_archive;
/// use std::io::Cursor;
///
/// let data = minimal_image(Architecture::X64).build();
/// let mut sink = IssueSink::new();
/// validate_archive(Cursor::new(data), &PolicyConfig::default(), &IssueScope::archive(), &mut sink)
///     .unwrap();
/// assert!(!sink.has_errors());
/// ```
pub fn validate_archive<R: Read + Seek>(
    reader: R,
    config: &PolicyConfig,
    scope: &IssueScope,
    sink: &mut IssueSink,
) -> Result<()> {
    let (index, mut content) = ArchiveIndex::open(reader)?;
    let before = sink.issues().len();
    PolicyValidator::new(config).validate(&index, &mut content, scope, sink);
    info!(
        members = index.len(),
        issues = sink.issues().len() - before,
        "archive validated"
    );
    Ok(())
}

/// Opens, decompresses and validates the archive at `path`.
///
/// Returns the detected container format so callers can report archives WSL
/// cannot install even when their content is valid.
///
/// # Errors
///
/// Returns an error if the file cannot be read, decompression fails, or the
/// tar framing is malformed.
///
/// # Examples
///
/// ```no_run
/// use distrolint_core::PolicyConfig;
/// use distrolint_core::report::IssueScope;
/// use distrolint_core::report::IssueSink;
/// use distrolint_core::validate_archive_file;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut sink = IssueSink::new();
/// let format = validate_archive_file(
///     "ubuntu-24.04.wsl",
///     &PolicyConfig::default(),
///     &IssueScope::archive(),
///     &mut sink,
/// )?;
/// println!("{}: {} errors", format.description(), sink.error_count());
/// # Ok(())
/// # }
/// ```
pub fn validate_archive_file<P: AsRef<Path>>(
    path: P,
    config: &PolicyConfig,
    scope: &IssueScope,
    sink: &mut IssueSink,
) -> Result<ArchiveFormat> {
    let source = ArchiveSource::open(path)?;
    let format = source.format();
    validate_archive(source.into_reader(), config, scope, sink)?;
    Ok(format)
}
