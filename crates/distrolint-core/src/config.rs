//! Validation settings for a distribution image.

use crate::types::Architecture;

/// Default number of symbolic links followed before resolution gives up.
pub const DEFAULT_MAX_SYMLINK_HOPS: usize = 10;

/// Per-image validation settings.
///
/// The fixed policy tables live in [`crate::policy::tables`]; this struct
/// carries the values that vary between images or callers.
///
/// # Examples
///
/// ```
/// use distrolint_core::PolicyConfig;
/// use distrolint_core::types::Architecture;
///
/// let config = PolicyConfig::default().with_architecture(Architecture::Arm64);
/// assert_eq!(config.architecture, Architecture::Arm64);
/// assert_eq!(config.max_symlink_hops, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Architecture executables must be built for.
    pub architecture: Architecture,

    /// Maximum number of chained symbolic links followed per lookup.
    pub max_symlink_hops: usize,

    /// Maximum size of the icon and terminal profile assets in bytes.
    pub max_asset_size: u64,

    /// Uid the out-of-box experience is expected to create.
    pub expected_default_uid: u32,

    /// Directory WSL assets (OOBE script, icon, terminal profile) should
    /// live in.
    pub wsl_asset_prefix: String,
}

impl Default for PolicyConfig {
    /// Default values:
    /// - `architecture`: X64
    /// - `max_symlink_hops`: 10
    /// - `max_asset_size`: 1 MiB
    /// - `expected_default_uid`: 1000
    /// - `wsl_asset_prefix`: `/usr/lib/wsl`
    fn default() -> Self {
        Self {
            architecture: Architecture::X64,
            max_symlink_hops: DEFAULT_MAX_SYMLINK_HOPS,
            max_asset_size: 1024 * 1024,
            expected_default_uid: 1000,
            wsl_asset_prefix: "/usr/lib/wsl".to_string(),
        }
    }
}

impl PolicyConfig {
    /// Sets the expected architecture.
    #[must_use]
    pub const fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    /// Sets the symbolic link hop budget.
    #[must_use]
    pub const fn with_max_symlink_hops(mut self, hops: usize) -> Self {
        self.max_symlink_hops = hops;
        self
    }

    /// Returns `true` if `path` lies under the WSL asset directory.
    #[must_use]
    pub fn is_wsl_asset_path(&self, path: &str) -> bool {
        path.starts_with(&self.wsl_asset_prefix)
    }
}
