//! Approximate systemd unit enablement from the `.wants` symlink farm.
//!
//! Only `*.target.wants` directories and `/dev/null` masks (in
//! `/etc/systemd/system` or inside any `.wants` directory) are considered. `[Install]` sections, drop-ins and template instances are not
//! parsed.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use tracing::debug;

use crate::resolve::PathResolver;

/// Unit directories scanned for `*.target.wants`, in scan order.
pub const UNIT_ROOTS: [&str; 3] = [
    "/usr/local/lib/systemd/system",
    "/usr/lib/systemd/system",
    "/etc/systemd/system",
];

/// Directory where a unit is masked by linking it to `/dev/null`.
pub const MASK_ROOT: &str = "/etc/systemd/system";

const DEV_NULL: &str = "/dev/null";

const WANTS_SUFFIX: &str = ".target.wants";

/// Enabled, non-masked units mapped to the `.wants` path enabling them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitEnablementRecord {
    units: BTreeMap<String, String>,
}

impl UnitEnablementRecord {
    /// The `.wants` path that enables `unit`, if it is enabled.
    #[must_use]
    pub fn get(&self, unit: &str) -> Option<&str> {
        self.units.get(unit).map(String::as_str)
    }

    /// Returns `true` if `unit` is enabled and not masked.
    #[must_use]
    pub fn contains(&self, unit: &str) -> bool {
        self.units.contains_key(unit)
    }

    /// `(unit, wants_path)` pairs sorted by unit name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.units.iter().map(|(u, p)| (u.as_str(), p.as_str()))
    }

    /// Number of enabled units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if no unit is enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Walks the unit roots of one archive.
///
/// # Examples
///
/// ```
/// use distrolint_core::archive::ArchiveIndex;
/// use distrolint_core::resolve::PathResolver;
/// use distrolint_core::test_utils::TarTestBuilder;
/// use distrolint_core::units::UnitEnablementDetector;
/// use std::io::Cursor;
///
/// let data = TarTestBuilder::new()
///     .add_file("./usr/lib/systemd/system/ssh.service", b"[Unit]\n")
///     .add_symlink(
///         "./etc/systemd/system/multi-user.target.wants/ssh.service",
///         "/usr/lib/systemd/system/ssh.service",
///     )
///     .build();
/// let (index, _) = ArchiveIndex::open(Cursor::new(data)).unwrap();
///
/// let record = UnitEnablementDetector::new(PathResolver::new(&index)).detect();
/// assert_eq!(
///     record.get("ssh.service"),
///     Some("/etc/systemd/system/multi-user.target.wants/ssh.service")
/// );
/// ```
#[derive(Debug, Clone, Copy)]
pub struct UnitEnablementDetector<'a> {
    resolver: PathResolver<'a>,
}

impl<'a> UnitEnablementDetector<'a> {
    /// Creates a detector resolving through `resolver`.
    #[must_use]
    pub const fn new(resolver: PathResolver<'a>) -> Self {
        Self { resolver }
    }

    /// Builds the enablement record.
    ///
    /// The first `.wants` path seen for a unit is kept (root order, then
    /// directory name order). A unit masked anywhere, whether through
    /// `/etc/systemd/system/<unit>` or a `.wants` link to `/dev/null`, is
    /// dropped whichever root enables it.
    #[must_use]
    pub fn detect(&self) -> UnitEnablementRecord {
        let index = self.resolver.index();
        let mut record = UnitEnablementRecord::default();
        let mut masked = BTreeSet::new();

        for root in UNIT_ROOTS {
            let wants_dirs = index
                .list_directory(root)
                .into_iter()
                .filter(|name| name.ends_with(WANTS_SUFFIX));

            for wants in wants_dirs {
                let wants_dir = format!("{root}/{wants}");
                for unit in index.list_directory(&wants_dir) {
                    let wants_path = format!("{wants_dir}/{unit}");
                    if self.leads_to_dev_null(&wants_path) {
                        debug!(path = %wants_path, "unit masked in wants directory");
                        masked.insert(unit);
                        continue;
                    }
                    if !self.enables(&wants_path) {
                        debug!(path = %wants_path, "unit link does not reach a unit file");
                        continue;
                    }
                    if self.is_masked(&unit) {
                        debug!(unit = %unit, "unit is masked");
                        continue;
                    }
                    record.units.entry(unit).or_insert(wants_path);
                }
            }
        }

        record.units.retain(|unit, _| !masked.contains(unit));

        debug!(enabled = record.len(), "systemd units detected");
        record
    }

    /// Returns `true` if `wants_path` resolves to a regular file other than
    /// `/dev/null`.
    fn enables(&self, wants_path: &str) -> bool {
        self.resolver
            .resolve(wants_path, true)
            .is_some_and(|resolved| {
                resolved.path() != DEV_NULL && resolved.member().kind.has_data()
            })
    }

    /// Returns `true` if `/etc/systemd/system/<unit>` leads to `/dev/null`.
    #[must_use]
    pub fn is_masked(&self, unit: &str) -> bool {
        self.leads_to_dev_null(&format!("{MASK_ROOT}/{unit}"))
    }

    fn leads_to_dev_null(&self, path: &str) -> bool {
        self.resolver
            .trace(path)
            .is_some_and(|target| target == DEV_NULL)
    }
}
