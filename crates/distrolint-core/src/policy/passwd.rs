//! `/etc/passwd` sanity checks.

use std::collections::BTreeMap;

use crate::report::IssueScope;
use crate::report::IssueSink;

/// Number of colon-separated fields in a passwd line.
const PASSWD_FIELDS: usize = 7;

/// One well-formed passwd line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdEntry<'a> {
    /// Login name (field 1).
    pub name: &'a str,
    /// Numeric user id (field 3).
    pub uid: u32,
    /// The full line.
    pub line: &'a str,
}

/// Parses one passwd line, or `None` if it does not have seven fields and a
/// numeric uid.
#[must_use]
pub fn parse_line(line: &str) -> Option<PasswdEntry<'_>> {
    let fields: Vec<&str> = line.split(':').collect();
    if fields.len() != PASSWD_FIELDS {
        return None;
    }
    let uid = fields[2].parse().ok()?;
    Some(PasswdEntry {
        name: fields[0],
        uid,
        line,
    })
}

/// Checks the content of `/etc/passwd`.
///
/// - a malformed line is an error (and is otherwise ignored)
/// - a uid seen twice is an error
/// - no uid 0, or a uid 0 not named `root`, is an error
/// - `default_uid` already taken is a warning
///
/// Blank lines are skipped. The first line of a duplicated uid is the one
/// kept.
///
/// # Examples
///
/// ```
/// use distrolint_core::policy::passwd::check_passwd;
/// use distrolint_core::report::IssueScope;
/// use distrolint_core::report::IssueSink;
///
/// let mut sink = IssueSink::new();
/// check_passwd(
///     "root:x:0:0:root:/root:/bin/bash\n",
///     Some(1000),
///     &IssueScope::archive(),
///     &mut sink,
/// );
/// assert!(sink.issues().is_empty());
/// ```
pub fn check_passwd(text: &str, default_uid: Option<u32>, scope: &IssueScope, sink: &mut IssueSink) {
    let mut entries: BTreeMap<u32, PasswdEntry<'_>> = BTreeMap::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some(entry) = parse_line(line) else {
            sink.error(scope, format!("Invalid passwd entry: {line}"));
            continue;
        };
        if entries.contains_key(&entry.uid) {
            sink.error(scope, format!("Found duplicated uid in /etc/passwd: {}", entry.uid));
        } else {
            entries.insert(entry.uid, entry);
        }
    }

    match entries.get(&0) {
        None => sink.error(scope, "No root (uid=0) found in /etc/passwd"),
        Some(root) if root.name != "root" => sink.error(
            scope,
            format!("/etc/passwd has a uid=0, but it is not root: {}", root.name),
        ),
        Some(_) => {}
    }

    if let Some(existing) = default_uid.and_then(|uid| entries.get(&uid)) {
        sink.warning(
            scope,
            format!(
                "/etc/passwd already has an entry for default uid: {}",
                existing.line
            ),
        );
    }
}
