//! `DistributionInfo.json` manifest checks.
//!
//! A manifest lists, per flavor, the distribution versions WSL can install:
//!
//! ```json
//! {
//!   "ModernDistributions": {
//!     "Ubuntu": [
//!       {
//!         "Name": "Ubuntu-24.04",
//!         "FriendlyName": "Ubuntu 24.04 LTS",
//!         "Default": true,
//!         "Amd64Url": { "Url": "file:///srv/ubuntu-24.04.wsl", "Sha256": "0x..." }
//!       }
//!     ]
//!   }
//! }
//! ```
//!
//! Each entry is checked for shape, then every archive it points at is
//! validated with the entry's `flavor/name` and source line stamped on the
//! resulting issues. Remote URLs are never fetched.

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde_json::Value;
use tracing::debug;
use tracing::info;

use crate::LintError;
use crate::PolicyConfig;
use crate::Result;
use crate::formats::ArchiveSource;
use crate::report::IssueLocation;
use crate::report::IssueScope;
use crate::report::IssueSink;
use crate::types::Architecture;
use crate::types::Node;

/// Keys an entry may carry.
pub const ENTRY_KEYS: &[&str] = &["Name", "FriendlyName", "Default", "Amd64Url", "Arm64Url"];

const ARCHIVE_EXTENSION: &str = ".wsl";

/// One distribution version of a flavor.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    /// `Name`, if present and a string.
    pub name: Option<String>,
    /// Line of the `"Name"` key in the manifest file.
    pub location: IssueLocation,
    /// The whole entry.
    pub node: Node,
}

/// A parsed `ModernDistributions` manifest.
///
/// # Examples
///
/// ```
/// use distrolint_core::manifest::Manifest;
/// use distrolint_core::report::IssueLocation;
///
/// let text = r#"{
///   "ModernDistributions": {
///     "Debian": [
///       { "Name": "Debian", "FriendlyName": "Debian GNU/Linux" }
///     ]
///   }
/// }"#;
/// let manifest = Manifest::parse(text).unwrap();
/// let entry = manifest.find("Debian", "Debian").unwrap();
/// assert_eq!(entry.location, IssueLocation::Line(4));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    flavors: BTreeMap<String, Vec<ManifestEntry>>,
}

impl Manifest {
    /// Parses manifest JSON.
    ///
    /// # Errors
    ///
    /// Returns `LintError::Json` for malformed JSON and
    /// `LintError::InvalidManifest` if `ModernDistributions` is missing or
    /// not a map of lists.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let Some(distributions) = value.get("ModernDistributions") else {
            return Err(LintError::InvalidManifest(
                "missing \"ModernDistributions\"".to_string(),
            ));
        };
        let Value::Object(flavors) = distributions else {
            return Err(LintError::InvalidManifest(
                "\"ModernDistributions\" must be an object".to_string(),
            ));
        };

        let mut manifest = Self::default();
        for (flavor, versions) in flavors {
            let Value::Array(items) = versions else {
                return Err(LintError::InvalidManifest(format!(
                    "flavor \"{flavor}\" must be a list"
                )));
            };

            let entries = items
                .iter()
                .map(|item| {
                    let name = item.get("Name").and_then(Value::as_str).map(str::to_string);
                    let location = name
                        .as_deref()
                        .and_then(|name| name_line(text, name))
                        .map_or(IssueLocation::None, IssueLocation::Line);
                    ManifestEntry {
                        name,
                        location,
                        node: Node::from(item.clone()),
                    }
                })
                .collect();
            manifest.flavors.insert(flavor.clone(), entries);
        }

        Ok(manifest)
    }

    /// Reads and parses a manifest file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Flavors and their entries, sorted by flavor.
    pub fn flavors(&self) -> impl Iterator<Item = (&str, &[ManifestEntry])> {
        self.flavors
            .iter()
            .map(|(flavor, entries)| (flavor.as_str(), entries.as_slice()))
    }

    /// Returns `true` if the manifest has the flavor.
    #[must_use]
    pub fn has_flavor(&self, flavor: &str) -> bool {
        self.flavors.contains_key(flavor)
    }

    /// The entry named `name` in `flavor`.
    #[must_use]
    pub fn find(&self, flavor: &str, name: &str) -> Option<&ManifestEntry> {
        self.flavors
            .get(flavor)?
            .iter()
            .find(|entry| entry.name.as_deref() == Some(name))
    }
}

/// 1-based line of the first `"Name": "<name>"` pair in `text`.
fn name_line(text: &str, name: &str) -> Option<usize> {
    let literal = serde_json::to_string(name).ok()?;
    text.lines()
        .position(|line| {
            line.split_once("\"Name\"").is_some_and(|(_, rest)| {
                rest.trim_start()
                    .strip_prefix(':')
                    .is_some_and(|value| value.trim_start().starts_with(&literal))
            })
        })
        .map(|index| index + 1)
}

/// How an entry compared to the baseline manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// No baseline given; the entry was validated.
    Checked,
    /// Not in the baseline; validated.
    New,
    /// Differs from the baseline; validated.
    Changed,
    /// Identical to the baseline; skipped.
    Unchanged,
}

/// What happened to one named entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOutcome {
    /// Flavor the entry belongs to.
    pub flavor: String,
    /// Entry name.
    pub name: String,
    /// Line of the entry.
    pub location: IssueLocation,
    /// Baseline comparison result.
    pub status: EntryStatus,
}

/// Validates manifests and the archives they reference.
///
/// Relative archive paths and `file://` URLs are resolved against
/// `base_dir` (normally the manifest's directory).
#[derive(Debug, Clone)]
pub struct ManifestValidator<'a> {
    config: &'a PolicyConfig,
    base_dir: PathBuf,
    baseline: Option<&'a Manifest>,
}

impl<'a> ManifestValidator<'a> {
    /// Creates a validator.
    #[must_use]
    pub fn new(config: &'a PolicyConfig, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            base_dir: base_dir.into(),
            baseline: None,
        }
    }

    /// Skips entries structurally equal to their counterpart in `baseline`.
    #[must_use]
    pub const fn with_baseline(mut self, baseline: &'a Manifest) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Validates every entry of `manifest`, appending issues to `sink`.
    ///
    /// Returns one outcome per named entry, in manifest order.
    pub fn validate(&self, manifest: &Manifest, sink: &mut IssueSink) -> Vec<EntryOutcome> {
        let mut outcomes = Vec::new();

        for (flavor, entries) in manifest.flavors() {
            for entry in entries {
                let Some(name) = entry.name.as_deref() else {
                    sink.error(
                        &IssueScope::entry(entry.location, flavor),
                        "Found nameless distribution",
                    );
                    continue;
                };

                let status = self.baseline_status(flavor, name, entry);
                outcomes.push(EntryOutcome {
                    flavor: flavor.to_string(),
                    name: name.to_string(),
                    location: entry.location,
                    status,
                });
                if status == EntryStatus::Unchanged {
                    debug!(flavor, name, "entry unchanged, skipping");
                    continue;
                }

                info!(flavor, name, "validating distribution entry");
                let scope = IssueScope::entry(entry.location, format!("{flavor}/{name}"));
                self.validate_entry(flavor, name, entry, &scope, sink);
            }

            let defaults = entries
                .iter()
                .filter(|entry| entry.node.get("Default").and_then(Node::as_bool) == Some(true))
                .count();
            if defaults != 1 {
                let message = if defaults == 0 {
                    "Found no default distribution"
                } else {
                    "Found multiple default distributions"
                };
                sink.error(&IssueScope::entry(IssueLocation::None, flavor), message);
            }
        }

        outcomes
    }

    fn baseline_status(&self, flavor: &str, name: &str, entry: &ManifestEntry) -> EntryStatus {
        let Some(baseline) = self.baseline else {
            return EntryStatus::Checked;
        };
        match baseline.find(flavor, name) {
            None => EntryStatus::New,
            Some(previous) if previous.node.structurally_equal(&entry.node) => {
                EntryStatus::Unchanged
            }
            Some(_) => EntryStatus::Changed,
        }
    }

    fn validate_entry(
        &self,
        flavor: &str,
        name: &str,
        entry: &ManifestEntry,
        scope: &IssueScope,
        sink: &mut IssueSink,
    ) {
        if entry.node.get("FriendlyName").is_none() {
            sink.error(scope, "Manifest entry is missing a \"FriendlyName\" entry");
        }

        if !name.starts_with(flavor) {
            sink.error(scope, format!("Name should start with \"{flavor}\""));
        }

        let mut url_found = false;
        for (key, architecture) in [("Amd64Url", Architecture::X64), ("Arm64Url", Architecture::Arm64)] {
            if let Some(url) = entry.node.get(key) {
                self.check_url(url, architecture, scope, sink);
                url_found = true;
            }
        }
        if !url_found {
            sink.error(scope, "No URL found");
        }

        if let Some(keys) = entry.node.as_mapping() {
            for key in keys.keys().filter(|key| !ENTRY_KEYS.contains(&key.as_str())) {
                sink.error(scope, format!("Unexpected key: \"{key}\""));
            }
        }
    }

    fn check_url(&self, url: &Node, architecture: Architecture, scope: &IssueScope, sink: &mut IssueSink) {
        let Some(location) = url.get("Url").and_then(Node::as_str) else {
            sink.error(scope, "URL entry is missing a \"Url\" string");
            return;
        };

        if !location.ends_with(ARCHIVE_EXTENSION) {
            sink.warning(scope, format!("Url does not point to a .wsl file: {location}"));
        }

        let expected_sha = url.get("Sha256").and_then(Node::as_str);
        if expected_sha.is_none() {
            sink.error(scope, "URL is missing \"Sha256\"");
        }

        let Some(path) = self.local_path(location) else {
            sink.warning(scope, format!("Remote archive not fetched: {location}"));
            return;
        };

        let source = match ArchiveSource::open(&path) {
            Ok(source) => source,
            Err(e) => {
                sink.abort(scope, format!("{location}: {e}"));
                return;
            }
        };
        let format = source.format();
        let actual_sha = source.sha256_hex();
        let matches = expected_sha.map(|expected| source.sha256_matches(expected));

        let config = self.config.clone().with_architecture(architecture);
        if let Err(e) = crate::validate_archive(source.into_reader(), &config, scope, sink) {
            sink.abort(scope, format!("{location}: {e}"));
        }

        if let (Some(expected), Some(false)) = (expected_sha, matches) {
            sink.error(
                scope,
                format!(
                    "URL {location} Sha256 does not match. Expected: {}, actual: {actual_sha}",
                    expected.strip_prefix("0x").unwrap_or(expected)
                ),
            );
        } else if matches == Some(true) {
            debug!(url = location, sha256 = %actual_sha, "hash matches");
        }

        if !format.is_installable() {
            sink.error(scope, format!("Unknown tar format: {}", format.description()));
        }
    }

    /// Local file a URL refers to, or `None` for remote URLs.
    fn local_path(&self, location: &str) -> Option<PathBuf> {
        if location.starts_with("http://") || location.starts_with("https://") {
            return None;
        }
        let path = Path::new(location.strip_prefix("file://").unwrap_or(location));
        Some(if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::report::Severity;
    use crate::test_utils::TarTestBuilder;
    use crate::test_utils::minimal_image;
    use serde_json::json;
    use sha2::Digest;
    use sha2::Sha256;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        /// Writes `data` under the fixture directory and returns a URL
        /// object pointing at it.
        fn archive(&self, file_name: &str, data: &[u8]) -> Value {
            std::fs::write(self.dir.path().join(file_name), data).unwrap();
            let sha = format!("{:x}", Sha256::digest(data));
            json!({ "Url": format!("file://{}", self.dir.path().join(file_name).display()), "Sha256": format!("0x{sha}") })
        }

        fn run(&self, manifest: &Value) -> (IssueSink, Vec<EntryOutcome>) {
            let text = serde_json::to_string_pretty(manifest).unwrap();
            let manifest = Manifest::parse(&text).unwrap();
            let config = PolicyConfig::default();
            let mut sink = IssueSink::new();
            let outcomes = ManifestValidator::new(&config, self.dir.path()).validate(&manifest, &mut sink);
            (sink, outcomes)
        }
    }

    fn messages(sink: &IssueSink, severity: Severity) -> Vec<String> {
        sink.with_severity(severity).map(ToString::to_string).collect()
    }

    fn good_archive(fixture: &Fixture) -> Value {
        fixture.archive("test.wsl", &minimal_image(Architecture::X64).build_gzip())
    }

    #[test]
    fn test_parse_requires_modern_distributions() {
        assert!(matches!(Manifest::parse("{}"), Err(LintError::InvalidManifest(_))));
        assert!(matches!(
            Manifest::parse(r#"{"ModernDistributions": {"Ubuntu": {}}}"#),
            Err(LintError::InvalidManifest(_))
        ));
        assert!(matches!(Manifest::parse("{"), Err(LintError::Json(_))));
    }

    #[test]
    fn test_name_lines() {
        let text = "{\n  \"ModernDistributions\": {\n    \"Test\": [\n      {\"Name\": \"Test-1\"},\n      {\n        \"Name\" : \"Test-2\"\n      }\n    ]\n  }\n}\n";
        let manifest = Manifest::parse(text).unwrap();
        assert_eq!(manifest.find("Test", "Test-1").unwrap().location, IssueLocation::Line(4));
        assert_eq!(manifest.find("Test", "Test-2").unwrap().location, IssueLocation::Line(6));
        assert!(manifest.find("Test", "Test-3").is_none());
        assert!(manifest.has_flavor("Test"));
    }

    #[test]
    fn test_valid_entry() {
        let fixture = Fixture::new();
        let url = good_archive(&fixture);
        let (sink, outcomes) = fixture.run(&json!({
            "ModernDistributions": {
                "Test": [
                    { "Name": "Test-1", "FriendlyName": "Test 1", "Default": true, "Amd64Url": url }
                ]
            }
        }));

        assert!(sink.issues().is_empty(), "unexpected issues: {:?}", sink.issues());
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, EntryStatus::Checked);
        assert!(matches!(outcomes[0].location, IssueLocation::Line(_)));
    }

    #[test]
    fn test_entry_shape_errors() {
        let fixture = Fixture::new();
        let (sink, _) = fixture.run(&json!({
            "ModernDistributions": {
                "Test": [
                    { "Name": "Other", "Default": true, "Extra": 1 },
                    { "FriendlyName": "nameless" }
                ]
            }
        }));

        assert_eq!(
            messages(&sink, Severity::Error),
            vec![
                "Test/Other: Manifest entry is missing a \"FriendlyName\" entry",
                "Test/Other: Name should start with \"Test\"",
                "Test/Other: No URL found",
                "Test/Other: Unexpected key: \"Extra\"",
                "Test: Found nameless distribution",
            ]
        );
    }

    #[test]
    fn test_default_counts() {
        let fixture = Fixture::new();
        let url = good_archive(&fixture);
        let (sink, _) = fixture.run(&json!({
            "ModernDistributions": {
                "None": [ { "Name": "None-1", "FriendlyName": "x", "Amd64Url": url } ],
                "Many": [
                    { "Name": "Many-1", "FriendlyName": "x", "Default": true, "Amd64Url": url },
                    { "Name": "Many-2", "FriendlyName": "x", "Default": true, "Amd64Url": url }
                ]
            }
        }));
        assert_eq!(
            messages(&sink, Severity::Error),
            vec![
                "Many: Found multiple default distributions",
                "None: Found no default distribution",
            ]
        );
    }

    #[test]
    fn test_url_checks() {
        let fixture = Fixture::new();
        let mut url = fixture.archive("test.tar", &minimal_image(Architecture::X64).build());
        url["Sha256"] = json!("00");
        let (sink, _) = fixture.run(&json!({
            "ModernDistributions": {
                "Test": [ { "Name": "Test", "FriendlyName": "x", "Default": true, "Amd64Url": url } ]
            }
        }));

        let location = url["Url"].as_str().unwrap();
        assert_eq!(
            messages(&sink, Severity::Warning),
            vec![format!("Test/Test: Url does not point to a .wsl file: {location}")]
        );
        let errors = messages(&sink, Severity::Error);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with(&format!("Test/Test: URL {location} Sha256 does not match. Expected: 00, actual: ")));
        assert_eq!(errors[1], "Test/Test: Unknown tar format: POSIX tar archive");
    }

    #[test]
    fn test_missing_sha_and_remote_url() {
        let fixture = Fixture::new();
        let (sink, _) = fixture.run(&json!({
            "ModernDistributions": {
                "Test": [ {
                    "Name": "Test", "FriendlyName": "x", "Default": true,
                    "Arm64Url": { "Url": "https://example.com/test.wsl" }
                } ]
            }
        }));
        assert_eq!(messages(&sink, Severity::Error), vec!["Test/Test: URL is missing \"Sha256\""]);
        assert_eq!(
            messages(&sink, Severity::Warning),
            vec!["Test/Test: Remote archive not fetched: https://example.com/test.wsl"]
        );
    }

    #[test]
    fn test_arm64_url_uses_arm64_policy() {
        let fixture = Fixture::new();
        let url = good_archive(&fixture);
        let (sink, _) = fixture.run(&json!({
            "ModernDistributions": {
                "Test": [ { "Name": "Test", "FriendlyName": "x", "Default": true, "Arm64Url": url } ]
            }
        }));
        let errors = messages(&sink, Severity::Error);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.contains("unexpected magic type")));
    }

    #[test]
    fn test_corrupt_archive_aborts_entry() {
        let fixture = Fixture::new();
        let url = fixture.archive("broken.wsl", &[0x42; 2048]);
        let (sink, _) = fixture.run(&json!({
            "ModernDistributions": {
                "Test": [ { "Name": "Test", "FriendlyName": "x", "Default": true, "Amd64Url": url } ]
            }
        }));

        assert_eq!(sink.aborted().len(), 1);
        assert_eq!(sink.aborted()[0].subject.as_deref(), Some("Test/Test"));
        assert!(sink.has_errors());
        assert_eq!(messages(&sink, Severity::Error), vec!["Test/Test: Unknown tar format: data"]);
    }

    #[test]
    fn test_missing_archive_aborts_entry() {
        let fixture = Fixture::new();
        let (sink, _) = fixture.run(&json!({
            "ModernDistributions": {
                "Test": [ {
                    "Name": "Test", "FriendlyName": "x", "Default": true,
                    "Amd64Url": { "Url": "missing.wsl", "Sha256": "00" }
                } ]
            }
        }));
        assert_eq!(sink.aborted().len(), 1);
        assert!(sink.issues().is_empty());
    }

    #[test]
    fn test_baseline_skips_unchanged() {
        let fixture = Fixture::new();
        let url = good_archive(&fixture);
        let current = json!({
            "ModernDistributions": {
                "Test": [
                    { "Name": "Test-1", "FriendlyName": "One", "Default": true, "Amd64Url": url },
                    { "Name": "Test-2", "FriendlyName": "Two", "Amd64Url": url },
                    { "Name": "Test-3", "FriendlyName": "Three", "Amd64Url": url }
                ]
            }
        });
        let baseline = json!({
            "ModernDistributions": {
                "Test": [
                    { "Default": true, "FriendlyName": "One", "Name": "Test-1", "Amd64Url": url },
                    { "Name": "Test-2", "FriendlyName": "Old", "Amd64Url": url }
                ]
            }
        });

        let current = Manifest::parse(&current.to_string()).unwrap();
        let baseline = Manifest::parse(&baseline.to_string()).unwrap();
        let config = PolicyConfig::default();
        let mut sink = IssueSink::new();
        let outcomes = ManifestValidator::new(&config, fixture.dir.path())
            .with_baseline(&baseline)
            .validate(&current, &mut sink);

        let statuses: Vec<_> = outcomes.iter().map(|o| (o.name.as_str(), o.status)).collect();
        assert_eq!(
            statuses,
            vec![
                ("Test-1", EntryStatus::Unchanged),
                ("Test-2", EntryStatus::Changed),
                ("Test-3", EntryStatus::New),
            ]
        );
        assert!(sink.issues().is_empty());
    }

    #[test]
    fn test_relative_path_resolved_against_base_dir() {
        let fixture = Fixture::new();
        let data = TarTestBuilder::new().build_xz();
        std::fs::write(fixture.dir.path().join("empty.wsl"), &data).unwrap();
        let sha = format!("{:x}", Sha256::digest(&data));
        let (sink, _) = fixture.run(&json!({
            "ModernDistributions": {
                "Test": [ {
                    "Name": "Test", "FriendlyName": "x", "Default": true,
                    "Amd64Url": { "Url": "empty.wsl", "Sha256": sha }
                } ]
            }
        }));

        assert!(sink.aborted().is_empty());
        assert!(messages(&sink, Severity::Error).contains(&"Test/Test: File \"/etc/passwd\" not found in tar".to_string()));
    }
}
