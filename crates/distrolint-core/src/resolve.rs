//! Path normalization and symbolic-link resolution inside an archive.
//!
//! Nothing here touches the host filesystem: `..` is collapsed lexically and
//! links are followed through the [`ArchiveIndex`] only.

use tracing::debug;
use tracing::warn;

use crate::archive::ArchiveIndex;
use crate::archive::logical_path;
use crate::config::DEFAULT_MAX_SYMLINK_HOPS;
use crate::types::ArchiveMember;
use crate::types::MemberKind;

/// Lexically normalizes a Linux path.
///
/// Empty and `.` segments are dropped, `..` pops the previous segment (and
/// is ignored at the top), and a leading `/` is kept iff the input had one.
///
/// # Examples
///
/// ```
/// use distrolint_core::resolve::normalize;
///
/// assert_eq!(normalize("/usr/lib/../bin/./bash"), "/usr/bin/bash");
/// assert_eq!(normalize("../../etc//passwd"), "etc/passwd");
/// assert_eq!(normalize("/.."), "/");
/// ```
#[must_use]
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if path.starts_with('/') {
        format!("/{joined}")
    } else {
        joined
    }
}

/// `dirname(3)`-style parent of a path string (`/etc` -> `/`, `etc` -> ``).
fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(pos) => &path[..pos],
        None => "",
    }
}

fn basename_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Where a symlink stored at `link_path` with target `target` points.
fn link_destination(link_path: &str, target: &str) -> String {
    if target.starts_with('/') {
        normalize(target)
    } else {
        normalize(&format!("{}/{target}", parent_of(link_path)))
    }
}

/// A path resolved to a concrete archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath<'a> {
    path: String,
    member: &'a ArchiveMember,
}

impl<'a> ResolvedPath<'a> {
    /// Canonical absolute path of the member (`/usr/bin/bash`).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The member the path denotes.
    #[must_use]
    pub const fn member(&self) -> &'a ArchiveMember {
        self.member
    }
}

/// Index and remaining hop budget, threaded through recursive resolution.
#[derive(Debug, Clone, Copy)]
struct ResolutionContext<'a> {
    index: &'a ArchiveIndex,
    hops_remaining: usize,
}

impl ResolutionContext<'_> {
    /// Consumes one hop, or returns `None` once the budget is spent.
    fn hop(self, path: &str) -> Option<Self> {
        if let Some(hops_remaining) = self.hops_remaining.checked_sub(1) {
            Some(Self {
                hops_remaining,
                ..self
            })
        } else {
            warn!(path, "exceeded maximum symlink depth");
            None
        }
    }
}

/// Resolves logical paths against an [`ArchiveIndex`], following symbolic
/// links up to a hop budget.
///
/// # Examples
///
/// ```
/// use distrolint_core::archive::ArchiveIndex;
/// use distrolint_core::resolve::PathResolver;
/// use distrolint_core::test_utils::TarTestBuilder;
/// use std::io::Cursor;
///
/// let data = TarTestBuilder::new()
///     .add_file("./usr/bin/bash", b"\x7fELF")
///     .add_symlink("./bin", "usr/bin")
///     .build();
/// let (index, _) = ArchiveIndex::open(Cursor::new(data)).unwrap();
/// let resolver = PathResolver::new(&index);
///
/// let resolved = resolver.resolve("/bin/bash", true).unwrap();
/// assert_eq!(resolved.path(), "/usr/bin/bash");
/// assert!(resolver.resolve("/bin/bash", false).is_none());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PathResolver<'a> {
    index: &'a ArchiveIndex,
    max_hops: usize,
}

impl<'a> PathResolver<'a> {
    /// Creates a resolver with the default hop budget.
    #[must_use]
    pub const fn new(index: &'a ArchiveIndex) -> Self {
        Self::with_max_hops(index, DEFAULT_MAX_SYMLINK_HOPS)
    }

    /// Creates a resolver with a custom hop budget.
    #[must_use]
    pub const fn with_max_hops(index: &'a ArchiveIndex, max_hops: usize) -> Self {
        Self { index, max_hops }
    }

    /// The index this resolver reads.
    #[must_use]
    pub const fn index(&self) -> &'a ArchiveIndex {
        self.index
    }

    const fn context(&self) -> ResolutionContext<'a> {
        ResolutionContext {
            index: self.index,
            hops_remaining: self.max_hops,
        }
    }

    /// Resolves `path` to an archive member.
    ///
    /// Without `follow_symlink`, only a direct lookup is made and a symlink
    /// member is returned as-is. With it, symlinks are followed, and a path
    /// that does not exist literally is retried through its parent directory
    /// when an ancestor is itself a symlink (`/lib/x` with `/lib -> usr/lib`).
    ///
    /// Returns `None` when nothing is found or the hop budget runs out.
    #[must_use]
    pub fn resolve(&self, path: &str, follow_symlink: bool) -> Option<ResolvedPath<'a>> {
        self.resolve_in(self.context(), path, follow_symlink)
    }

    fn resolve_in(
        &self,
        ctx: ResolutionContext<'a>,
        path: &str,
        follow_symlink: bool,
    ) -> Option<ResolvedPath<'a>> {
        if let Some(member) = ctx.index.lookup_spellings(path) {
            return match &member.kind {
                MemberKind::Symlink { target } if follow_symlink => {
                    let destination = link_destination(path, target);
                    debug!(path, destination = %destination, "following symlink");
                    self.resolve_in(ctx.hop(path)?, &destination, true)
                }
                _ => Some(ResolvedPath {
                    path: logical_path(path),
                    member,
                }),
            };
        }

        if !follow_symlink {
            return None;
        }

        // The path may run through a symlinked directory.
        let parent = parent_of(path);
        if parent == path || parent.is_empty() {
            return None;
        }

        let ctx = ctx.hop(path)?;
        let resolved_parent = self.resolve_in(ctx, parent, true)?;
        if resolved_parent.path == logical_path(parent) {
            return None;
        }

        let retry = format!(
            "{}/{}",
            resolved_parent.path.trim_end_matches('/'),
            basename_of(path)
        );
        self.resolve_in(ctx, &retry, true)
    }

    /// Follows the symlink chain starting at `path` as far as it goes.
    ///
    /// Returns the canonical path the chain ends at, even when that final
    /// path does not exist in the archive (a masked unit pointing at
    /// `/dev/null` in an image without device nodes). Returns `None` when
    /// `path` itself does not exist or the hop budget runs out.
    #[must_use]
    pub fn trace(&self, path: &str) -> Option<String> {
        match self.trace_in(self.context(), path) {
            Trace::Reached(destination) => Some(destination),
            Trace::Missing | Trace::Exhausted => None,
        }
    }

    fn trace_in(&self, ctx: ResolutionContext<'a>, path: &str) -> Trace {
        let Some(member) = ctx.index.lookup_spellings(path) else {
            return self
                .resolve_in(ctx, path, true)
                .map_or(Trace::Missing, |r| Trace::Reached(r.path));
        };

        match &member.kind {
            MemberKind::Symlink { target } => {
                let destination = link_destination(path, target);
                let Some(next) = ctx.hop(path) else {
                    return Trace::Exhausted;
                };
                match self.trace_in(next, &destination) {
                    Trace::Missing => Trace::Reached(logical_path(&destination)),
                    other => other,
                }
            }
            _ => Trace::Reached(logical_path(path)),
        }
    }
}

/// Where a traced chain stopped.
enum Trace {
    Reached(String),
    Missing,
    Exhausted,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::test_utils::TarTestBuilder;
    use std::io::Cursor;

    fn index(builder: TarTestBuilder) -> ArchiveIndex {
        ArchiveIndex::open(Cursor::new(builder.build()))
            .expect("archive should open")
            .0
    }

    fn chain(length: usize) -> TarTestBuilder {
        let mut builder = TarTestBuilder::new().add_file("./target", b"data");
        for i in 0..length {
            let next = if i + 1 == length {
                "target".to_string()
            } else {
                format!("link{}", i + 1)
            };
            builder = builder.add_symlink(&format!("./link{i}"), &next);
        }
        builder
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/etc/./systemd//system/"), "/etc/systemd/system");
        assert_eq!(normalize("a/b/../c"), "a/c");
        assert_eq!(normalize(".."), "");
        assert_eq!(normalize("/../../x"), "/x");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("./etc"), "etc");
    }

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of("/etc/passwd"), "/etc");
        assert_eq!(parent_of("/etc"), "/");
        assert_eq!(parent_of("/"), "/");
        assert_eq!(parent_of("etc/passwd"), "etc");
        assert_eq!(parent_of("etc"), "");
    }

    #[test]
    fn test_link_destination() {
        assert_eq!(
            link_destination("/etc/systemd/system/a.target.wants/x.service", "../x.service"),
            "/etc/systemd/system/x.service"
        );
        assert_eq!(link_destination("/sbin/init", "/lib/systemd/systemd"), "/lib/systemd/systemd");
        assert_eq!(link_destination("/bin", "usr/bin"), "/usr/bin");
    }

    #[test]
    fn test_resolve_plain_file_follow_or_not() {
        let index = index(TarTestBuilder::new().add_file("etc/passwd", b"root"));
        let resolver = PathResolver::new(&index);

        let followed = resolver.resolve("/etc/passwd", true).unwrap();
        let direct = resolver.resolve("/etc/passwd", false).unwrap();
        assert_eq!(followed, direct);
        assert_eq!(followed.path(), "/etc/passwd");
    }

    #[test]
    fn test_resolve_symlink_without_follow_returns_link() {
        let index = index(
            TarTestBuilder::new()
                .add_file("usr/lib/systemd/systemd", b"")
                .add_symlink("sbin/init", "../usr/lib/systemd/systemd"),
        );
        let resolver = PathResolver::new(&index);

        let link = resolver.resolve("/sbin/init", false).unwrap();
        assert!(link.member().kind.is_symlink());

        let target = resolver.resolve("/sbin/init", true).unwrap();
        assert_eq!(target.path(), "/usr/lib/systemd/systemd");
        assert!(target.member().kind.is_file());
    }

    #[test]
    fn test_resolve_absolute_target() {
        let index = index(
            TarTestBuilder::new()
                .add_file("./usr/bin/dash", b"")
                .add_symlink("./bin/sh", "/usr/bin/dash"),
        );
        let resolved = PathResolver::new(&index).resolve("bin/sh", true).unwrap();
        assert_eq!(resolved.path(), "/usr/bin/dash");
    }

    #[test]
    fn test_resolve_through_symlinked_directory() {
        let index = index(
            TarTestBuilder::new()
                .add_file("./usr/lib/systemd/systemd", b"")
                .add_symlink("./lib", "usr/lib")
                .add_symlink("./sbin/init", "/lib/systemd/systemd"),
        );
        let resolved = PathResolver::new(&index).resolve("/sbin/init", true).unwrap();
        assert_eq!(resolved.path(), "/usr/lib/systemd/systemd");
    }

    #[test]
    fn test_resolve_missing() {
        let index = index(TarTestBuilder::new().add_file("etc/passwd", b""));
        let resolver = PathResolver::new(&index);
        assert!(resolver.resolve("/etc/shadow", true).is_none());
        assert!(resolver.resolve("/etc/shadow", false).is_none());
        assert!(resolver.resolve("/etc/passwd/x", true).is_none());
    }

    #[test]
    fn test_chain_at_budget_resolves() {
        let index = index(chain(DEFAULT_MAX_SYMLINK_HOPS));
        let resolved = PathResolver::new(&index).resolve("/link0", true);
        assert_eq!(resolved.unwrap().path(), "/target");
    }

    #[test]
    fn test_chain_over_budget_not_found() {
        let index = index(chain(DEFAULT_MAX_SYMLINK_HOPS + 1));
        assert!(PathResolver::new(&index).resolve("/link0", true).is_none());
    }

    #[test]
    fn test_trace_over_budget_not_found() {
        let over = index(chain(DEFAULT_MAX_SYMLINK_HOPS + 1));
        assert!(PathResolver::new(&over).trace("/link0").is_none());

        let at = index(chain(DEFAULT_MAX_SYMLINK_HOPS));
        assert_eq!(PathResolver::new(&at).trace("/link0").as_deref(), Some("/target"));
    }

    #[test]
    fn test_custom_budget() {
        let index = index(chain(3));
        assert!(PathResolver::with_max_hops(&index, 2).resolve("/link0", true).is_none());
        assert!(PathResolver::with_max_hops(&index, 3).resolve("/link0", true).is_some());
    }

    #[test]
    fn test_cycle_terminates() {
        let index = index(
            TarTestBuilder::new()
                .add_symlink("a", "b")
                .add_symlink("b", "a"),
        );
        assert!(PathResolver::new(&index).resolve("/a", true).is_none());
        assert!(PathResolver::new(&index).trace("/a").is_none());
    }

    #[test]
    fn test_trace_dangling_dev_null() {
        let index = index(
            TarTestBuilder::new().add_symlink("./etc/systemd/system/foo.service", "/dev/null"),
        );
        let resolver = PathResolver::new(&index);
        assert_eq!(
            resolver.trace("/etc/systemd/system/foo.service").as_deref(),
            Some("/dev/null")
        );
        assert!(resolver.resolve("/etc/systemd/system/foo.service", true).is_none());
    }

    #[test]
    fn test_trace_chain_to_dev_null() {
        let index = index(
            TarTestBuilder::new()
                .add_symlink("etc/systemd/system/foo.service", "/etc/alternatives/foo")
                .add_symlink("etc/alternatives/foo", "../../dev/null"),
        );
        assert_eq!(
            PathResolver::new(&index)
                .trace("/etc/systemd/system/foo.service")
                .as_deref(),
            Some("/dev/null")
        );
    }

    #[test]
    fn test_trace_regular_file_is_itself() {
        let index = index(TarTestBuilder::new().add_file("./usr/lib/systemd/system/x.service", b""));
        assert_eq!(
            PathResolver::new(&index)
                .trace("/usr/lib/systemd/system/x.service")
                .as_deref(),
            Some("/usr/lib/systemd/system/x.service")
        );
        assert!(PathResolver::new(&index).trace("/missing").is_none());
    }
}
