//! Read-only index over the members of a tar archive.
//!
//! The index is built in a single pass over the tar framing. Member data is
//! not kept in memory: every member remembers its data offset, and
//! [`ContentReader`] seeks back to it when a check needs the bytes.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;

use tracing::debug;
use tracing::warn;

use crate::LintError;
use crate::Result;
use crate::resolve::normalize;
use crate::types::ArchiveMember;
use crate::types::MemberKind;

const PAX_XATTR_PREFIXES: [&str; 2] = ["SCHILY.xattr.", "LIBARCHIVE.xattr."];

/// Hard links pointing at hard links are followed at most this many times.
const MAX_HARDLINK_CHAIN: usize = 8;

/// Index of every member of one archive.
///
/// Owned by a single validation pass. Lookups are by exact member name; use
/// [`ArchiveIndex::lookup_spellings`] to tolerate the `/p`, `./p` and `p`
/// spellings tar writers use for the same logical path.
///
/// # Examples
///
/// ```
/// use distrolint_core::archive::ArchiveIndex;
/// use distrolint_core::test_utils::TarTestBuilder;
/// use std::io::Cursor;
///
/// let data = TarTestBuilder::new()
///     .add_file("./etc/hostname", b"wsl\n")
///     .build();
/// let (index, _content) = ArchiveIndex::open(Cursor::new(data)).unwrap();
///
/// assert!(index.lookup("/etc/hostname").is_none());
/// assert!(index.lookup_spellings("/etc/hostname").is_some());
/// ```
#[derive(Debug, Default)]
pub struct ArchiveIndex {
    members: Vec<ArchiveMember>,
    by_name: HashMap<String, usize>,
    children: BTreeMap<String, BTreeSet<String>>,
    implicit_dirs: HashMap<String, ArchiveMember>,
    damaged: Vec<DamagedMember>,
}

/// A member whose header carried a field that could not be parsed.
///
/// The member is still indexed, with the unreadable field read as `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DamagedMember {
    /// Logical path of the member (`/etc/passwd`).
    pub path: String,

    /// Which field was unreadable and why.
    pub reason: String,
}

impl ArchiveIndex {
    /// Reads the tar framing of `reader` and indexes every member.
    ///
    /// Returns the index together with a [`ContentReader`] over the same
    /// stream.
    ///
    /// # Errors
    ///
    /// Returns `LintError::InvalidArchive` if the tar framing is malformed.
    /// This is the only fatal condition of a validation pass.
    pub fn open<R: Read + Seek>(reader: R) -> Result<(Self, ContentReader<R>)> {
        let mut archive = tar::Archive::new(reader);
        let mut index = Self::default();

        let entries = archive
            .entries_with_seek()
            .map_err(|e| LintError::InvalidArchive(format!("failed to read tar entries: {e}")))?;

        for entry_result in entries {
            let mut entry = entry_result
                .map_err(|e| LintError::InvalidArchive(format!("failed to read tar entry: {e}")))?;
            let (member, problems) = read_member(&mut entry)?;
            for reason in problems {
                warn!(member = %member.name, %reason, "damaged tar header");
                index.damaged.push(DamagedMember {
                    path: logical_path(&member.name),
                    reason,
                });
            }
            index.insert(member);
        }
        index.add_implicit_directories();

        debug!(
            members = index.members.len(),
            implicit_dirs = index.implicit_dirs.len(),
            "archive indexed"
        );
        Ok((index, ContentReader::new(archive.into_inner())))
    }

    fn insert(&mut self, member: ArchiveMember) {
        let logical = logical_path(&member.name);
        self.register_ancestors(&logical);

        // Later entries replace earlier ones, as on extraction.
        let slot = self.members.len();
        self.by_name.insert(member.name.clone(), slot);
        self.members.push(member);
    }

    fn register_ancestors(&mut self, logical: &str) {
        let mut current = logical.to_string();
        while current != "/" {
            let (parent, base) = split_parent(&current);
            self.children
                .entry(parent.clone())
                .or_default()
                .insert(base);
            current = parent;
        }
    }

    /// Directories that only exist as ancestors of other members get a
    /// synthesized root-owned 0o755 entry, as extraction would create them.
    fn add_implicit_directories(&mut self) {
        let missing: Vec<String> = self
            .children
            .keys()
            .filter(|dir| spellings(dir).iter().all(|name| !self.by_name.contains_key(name)))
            .cloned()
            .collect();

        for dir in missing {
            let member = ArchiveMember {
                name: dir.clone(),
                kind: MemberKind::Directory,
                mode: 0o755,
                uid: 0,
                gid: 0,
                size: 0,
                xattrs: Vec::new(),
                data_offset: 0,
            };
            self.implicit_dirs.insert(dir, member);
        }
    }

    /// Looks a member up by its exact name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&ArchiveMember> {
        self.by_name.get(name).map(|&slot| &self.members[slot])
    }

    /// Looks a logical path up under each of its three tar spellings and
    /// returns the first member found. Implicit directories are found
    /// last.
    ///
    /// The caller's spelling is tried first:
    /// - `/p`: `/p`, `./p`, `p`
    /// - `./p`: `./p`, `/p`, `p`
    /// - `p`: `p`, `./p`, `/p`
    #[must_use]
    pub fn lookup_spellings(&self, path: &str) -> Option<&ArchiveMember> {
        spellings(path)
            .iter()
            .find_map(|name| self.lookup(name))
            .or_else(|| self.implicit_dirs.get(&logical_path(path)))
    }

    /// Names of all stored members, in archive order. Implicit directories
    /// are not included.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.name.as_str())
    }

    /// All members, in archive order.
    #[must_use]
    pub fn members(&self) -> &[ArchiveMember] {
        &self.members
    }

    /// Members whose headers had unreadable numeric fields, in archive
    /// order.
    #[must_use]
    pub fn damaged(&self) -> &[DamagedMember] {
        &self.damaged
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the archive has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Names of the immediate children of a directory, sorted.
    ///
    /// The directory is matched by its logical path, so members spelled
    /// `./etc/x` and `/etc/y` both appear under `/etc`. Directories that
    /// have no entry of their own but contain members are listed too.
    #[must_use]
    pub fn list_directory(&self, dir: &str) -> Vec<String> {
        self.children
            .get(&logical_path(dir))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Reads member data back from the archive stream.
#[derive(Debug)]
pub struct ContentReader<R> {
    reader: R,
}

impl<R: Read + Seek> ContentReader<R> {
    /// Wraps the stream the index was built from.
    pub const fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads up to `limit` bytes of a member's data (all of it when `limit`
    /// is `None`). Hard links read the data of the member they point at.
    ///
    /// # Errors
    ///
    /// Returns an error if the member has no data (directories, symlinks,
    /// dangling hard links) or the stream cannot be read.
    pub fn read(
        &mut self,
        index: &ArchiveIndex,
        member: &ArchiveMember,
        limit: Option<u64>,
    ) -> Result<Vec<u8>> {
        let data_member = data_member(index, member)?;

        let size = limit.map_or(data_member.size, |l| l.min(data_member.size));
        self.reader.seek(SeekFrom::Start(data_member.data_offset))?;

        let capacity = usize::try_from(size).unwrap_or(0);
        let mut buffer = Vec::with_capacity(capacity);
        (&mut self.reader).take(size).read_to_end(&mut buffer)?;

        if (buffer.len() as u64) < size {
            return Err(LintError::InvalidArchive(format!(
                "truncated data for {}",
                member.name
            )));
        }
        Ok(buffer)
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

fn data_member<'a>(index: &'a ArchiveIndex, member: &'a ArchiveMember) -> Result<&'a ArchiveMember> {
    let mut current = member;
    for _ in 0..MAX_HARDLINK_CHAIN {
        match &current.kind {
            MemberKind::File => return Ok(current),
            MemberKind::Hardlink { target } => {
                current = index.lookup_spellings(target).ok_or_else(|| {
                    LintError::InvalidArchive(format!(
                        "hard link {} points at missing member {target}",
                        member.name
                    ))
                })?;
            }
            MemberKind::Directory | MemberKind::Symlink { .. } | MemberKind::Special => {
                return Err(LintError::InvalidArchive(format!(
                    "{} has no file data",
                    current.name
                )));
            }
        }
    }
    Err(LintError::InvalidArchive(format!(
        "hard link chain too long at {}",
        member.name
    )))
}

/// Reads one member's header. Unparsable numeric fields are read as `0` and
/// reported in the returned list; only broken pax framing is fatal.
fn read_member<R: Read>(entry: &mut tar::Entry<'_, R>) -> Result<(ArchiveMember, Vec<String>)> {
    let name = member_name(&entry.path_bytes());
    let header = entry.header();

    let kind = match header.entry_type() {
        tar::EntryType::Directory => MemberKind::Directory,
        tar::EntryType::Symlink => MemberKind::Symlink {
            target: link_name(entry),
        },
        tar::EntryType::Link => MemberKind::Hardlink {
            target: link_name(entry),
        },
        tar::EntryType::Regular | tar::EntryType::Continuous | tar::EntryType::GNUSparse => {
            MemberKind::File
        }
        _ => MemberKind::Special,
    };

    let mut problems = Vec::new();
    let mode = header_field(header.mode(), "mode", &mut problems) & 0o7777;
    let mut uid = header_field(header.uid(), "uid", &mut problems);
    let mut gid = header_field(header.gid(), "gid", &mut problems);
    let size = entry.size();
    let data_offset = entry.raw_file_position();

    let mut xattrs = Vec::new();
    if let Some(extensions) = entry
        .pax_extensions()
        .map_err(|e| LintError::InvalidArchive(format!("invalid pax header for {name}: {e}")))?
    {
        for extension in extensions {
            let extension = extension.map_err(|e| {
                LintError::InvalidArchive(format!("invalid pax record for {name}: {e}"))
            })?;
            let Ok(key) = extension.key() else {
                continue;
            };

            if let Some(attribute) = PAX_XATTR_PREFIXES
                .iter()
                .find_map(|prefix| key.strip_prefix(prefix))
            {
                xattrs.push(attribute.to_string());
            } else if key == "uid" {
                uid = pax_number(extension.value_bytes()).unwrap_or(uid);
            } else if key == "gid" {
                gid = pax_number(extension.value_bytes()).unwrap_or(gid);
            }
        }
    }

    let member = ArchiveMember {
        name,
        kind,
        mode,
        uid,
        gid,
        size,
        xattrs,
        data_offset,
    };
    Ok((member, problems))
}

fn header_field<T: Default>(value: std::io::Result<T>, field: &str, problems: &mut Vec<String>) -> T {
    value.unwrap_or_else(|e| {
        problems.push(format!("unreadable {field} ({e})"));
        T::default()
    })
}

fn link_name<R: Read>(entry: &tar::Entry<'_, R>) -> String {
    entry
        .link_name_bytes()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn pax_number(value: &[u8]) -> Option<u64> {
    std::str::from_utf8(value).ok()?.trim().parse().ok()
}

/// Member name as stored, without the trailing `/` directories carry.
fn member_name(raw: &Cow<'_, [u8]>) -> String {
    let name = String::from_utf8_lossy(raw);
    let trimmed = name.trim_end_matches('/');
    if trimmed.is_empty() && !name.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Absolute, normalized form of a member name or path (`./etc/` -> `/etc`).
pub(crate) fn logical_path(name: &str) -> String {
    normalize(&format!("/{name}"))
}

fn split_parent(logical: &str) -> (String, String) {
    match logical.rfind('/') {
        Some(0) => ("/".to_string(), logical[1..].to_string()),
        Some(pos) => (logical[..pos].to_string(), logical[pos + 1..].to_string()),
        None => ("/".to_string(), logical.to_string()),
    }
}

/// The three tar spellings of `path`, caller's spelling first.
fn spellings(path: &str) -> [String; 3] {
    if let Some(rest) = path.strip_prefix("./") {
        [path.to_string(), format!("/{rest}"), rest.to_string()]
    } else if let Some(rest) = path.strip_prefix('/') {
        [path.to_string(), format!("./{rest}"), rest.to_string()]
    } else {
        [path.to_string(), format!("./{path}"), format!("/{path}")]
    }
}
