//! Archive member metadata.

/// Kind of a member stored in a tar archive.
///
/// Produced once when the archive is indexed, so later lookups never have
/// to probe the raw tar headers again.
///
/// # Examples
///
/// ```
/// use distrolint_core::types::MemberKind;
///
/// let link = MemberKind::Symlink {
///     target: "../lib/systemd/systemd".to_string(),
/// };
/// assert!(link.is_symlink());
/// assert_eq!(link.link_target(), Some("../lib/systemd/systemd"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Regular file.
    File,

    /// Directory.
    Directory,

    /// Symbolic link.
    ///
    /// The target is stored exactly as written in the archive and may be
    /// absolute, relative, or dangling.
    Symlink {
        /// Link target as stored in the archive.
        target: String,
    },

    /// Hard link to another member of the same archive.
    Hardlink {
        /// Name of the member whose data this entry shares.
        target: String,
    },

    /// Character/block device, FIFO, or any other special entry.
    Special,
}

impl MemberKind {
    /// Returns `true` if this is a regular file.
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self, Self::File)
    }

    /// Returns `true` if this is a directory.
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        matches!(self, Self::Directory)
    }

    /// Returns `true` if this is a symbolic link.
    #[must_use]
    pub const fn is_symlink(&self) -> bool {
        matches!(self, Self::Symlink { .. })
    }

    /// Returns `true` if this is a hard link.
    #[must_use]
    pub const fn is_hardlink(&self) -> bool {
        matches!(self, Self::Hardlink { .. })
    }

    /// Returns `true` if the entry carries file data (regular files and
    /// hard links).
    #[must_use]
    pub const fn has_data(&self) -> bool {
        matches!(self, Self::File | Self::Hardlink { .. })
    }

    /// Returns the link target of a symbolic or hard link.
    #[must_use]
    pub fn link_target(&self) -> Option<&str> {
        match self {
            Self::Symlink { target } | Self::Hardlink { target } => Some(target),
            Self::File | Self::Directory | Self::Special => None,
        }
    }
}

/// One entry of a tar archive, as seen by the validator.
///
/// The `name` is the member name exactly as spelled in the archive (minus any
/// trailing `/`), which may be `/etc/passwd`, `etc/passwd`, or
/// `./etc/passwd` for the same logical file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    /// Member name as stored in the archive.
    pub name: String,

    /// Kind of entry.
    pub kind: MemberKind,

    /// Permission bits (`mode & 0o7777`).
    pub mode: u32,

    /// Owner user id.
    pub uid: u64,

    /// Owner group id.
    pub gid: u64,

    /// Size of the member's data in bytes.
    pub size: u64,

    /// Names of the extended attributes recorded for this member.
    pub xattrs: Vec<String>,

    /// Offset of the member's data in the tar stream.
    pub data_offset: u64,
}

impl ArchiveMember {
    /// Returns the permission bits formatted the way policy messages show
    /// them (`0o755`).
    #[must_use]
    pub fn mode_string(&self) -> String {
        format!("{:#o}", self.mode)
    }
}
