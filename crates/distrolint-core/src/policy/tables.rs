//! Fixed policy tables.
//!
//! These are the versioned constants every image is checked against. Values
//! that vary per image or caller live in [`PolicyConfig`](crate::PolicyConfig).

/// Distribution configuration read by WSL at install time.
pub const DISTRIBUTION_CONF: &str = "/etc/wsl-distribution.conf";

/// Per-distribution WSL settings.
pub const WSL_CONF: &str = "/etc/wsl.conf";

/// User database.
pub const PASSWD: &str = "/etc/passwd";

/// Shadow password database.
pub const SHADOW: &str = "/etc/shadow";

/// Default login shell.
pub const BASH: &str = "/bin/bash";

/// POSIX shell.
pub const SH: &str = "/bin/sh";

/// Init binary, checked only when systemd boot is enabled.
pub const INIT: &str = "/sbin/init";

/// Keys allowed in `/etc/wsl-distribution.conf`.
pub const DISTRIBUTION_CONF_KEYS: &[&str] = &[
    "oobe.command",
    "oobe.defaultuid",
    "shortcut.icon",
    "oobe.defaultname",
    "windowsterminal.profiletemplate",
];

/// Keys allowed in `/etc/wsl.conf`.
pub const WSL_CONF_KEYS: &[&str] = &["boot.systemd"];

/// Units that conflict with what WSL configures itself.
pub const DISCOURAGED_UNITS: &[&str] = &[
    "systemd-resolved.service",
    "systemd-networkd.service",
    "systemd-networkd-wait-online.service",
    "systemd-tmpfiles-setup.service",
    "systemd-tmpfiles-clean.service",
    "systemd-tmpfiles-setup-dev-early.service",
    "systemd-tmpfiles-setup-dev.service",
    "tmp.mount",
    "NetworkManager.service",
    "networking.service",
];

/// Security-label attributes WSL cannot apply on import.
pub const UNSUPPORTED_XATTR_PREFIXES: &[&str] = &[
    "security.selinux",
    "security.ima",
    "security.evm",
    "security.SMACK64",
    "security.apparmor",
];

/// Expected permission bits and ownership of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRule {
    /// Accepted permission bits.
    pub modes: &'static [u32],
    /// Required owner.
    pub uid: u64,
    /// Required group, or `None` when any group is accepted.
    pub gid: Option<u64>,
}

impl FileRule {
    /// Returns `true` if `mode` is one of the accepted modes.
    #[must_use]
    pub fn accepts_mode(&self, mode: u32) -> bool {
        self.modes.contains(&mode)
    }

    /// Accepted modes joined for messages (`0o664 or 0o644`).
    #[must_use]
    pub fn describe_modes(&self) -> String {
        self.modes
            .iter()
            .map(|mode| format!("{mode:#o}"))
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

/// Root-owned configuration files.
pub const CONFIG_FILE: FileRule = FileRule {
    modes: &[0o664, 0o644],
    uid: 0,
    gid: Some(0),
};

/// Root-owned executables.
pub const EXECUTABLE: FileRule = FileRule {
    modes: &[0o755, 0o775],
    uid: 0,
    gid: Some(0),
};

/// The Windows Terminal profile template.
pub const PROFILE_TEMPLATE: FileRule = FileRule {
    modes: &[0o660, 0o640],
    uid: 0,
    gid: Some(0),
};

/// `/etc/shadow`; its group differs between distributions.
pub const SHADOW_FILE: FileRule = FileRule {
    modes: &[0o640, 0o600],
    uid: 0,
    gid: None,
};

/// Returns `true` if `unit` is on the discouraged list.
#[must_use]
pub fn is_discouraged_unit(unit: &str) -> bool {
    DISCOURAGED_UNITS.contains(&unit)
}

/// Returns `true` if `attribute` carries an unsupported security label.
#[must_use]
pub fn is_unsupported_xattr(attribute: &str) -> bool {
    UNSUPPORTED_XATTR_PREFIXES
        .iter()
        .any(|prefix| attribute.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_modes() {
        assert_eq!(CONFIG_FILE.describe_modes(), "0o664 or 0o644");
        assert!(EXECUTABLE.accepts_mode(0o775));
        assert!(!EXECUTABLE.accepts_mode(0o777));
    }

    #[test]
    fn test_unsupported_xattr() {
        assert!(is_unsupported_xattr("security.selinux"));
        assert!(is_unsupported_xattr("security.SMACK64EXEC"));
        assert!(!is_unsupported_xattr("security.capability"));
        assert!(!is_unsupported_xattr("user.comment"));
    }

    #[test]
    fn test_discouraged_unit() {
        assert!(is_discouraged_unit("systemd-resolved.service"));
        assert!(!is_discouraged_unit("ssh.service"));
    }
}
