//! Policy validation orchestrator.
//!
//! This module provides [`PolicyValidator`], which runs the fixed checklist
//! against one indexed image and records every finding in an
//! [`IssueSink`].

use std::collections::BTreeSet;
use std::io::Read;
use std::io::Seek;

use tracing::debug;

use crate::PolicyConfig;
use crate::archive::ArchiveIndex;
use crate::archive::ContentReader;
use crate::archive::logical_path;
use crate::policy::config_file::ConfigFile;
use crate::policy::magic;
use crate::policy::magic::ElfHeader;
use crate::policy::passwd;
use crate::policy::tables;
use crate::policy::tables::FileRule;
use crate::report::IssueScope;
use crate::report::IssueSink;
use crate::resolve::PathResolver;
use crate::resolve::ResolvedPath;
use crate::units::UnitEnablementDetector;

/// Runs the policy checklist against distribution images.
///
/// Holds no state between images. Each check is attempted independently: a
/// missing or unreadable file becomes an error issue and the remaining
/// checks still run.
///
/// # Examples
///
/// ```
/// use distrolint_core::PolicyConfig;
/// use distrolint_core::archive::ArchiveIndex;
/// use distrolint_core::policy::PolicyValidator;
/// use distrolint_core::report::IssueScope;
/// use distrolint_core::report::IssueSink;
/// use distrolint_core::test_utils::TarTestBuilder;
/// use std::io::Cursor;
///
/// let data = TarTestBuilder::new()
///     .add_file("./etc/passwd", b"root:x:0:0:root:/root:/bin/bash\n")
///     .build();
/// let (index, mut content) = ArchiveIndex::open(Cursor::new(data)).unwrap();
///
/// let config = PolicyConfig::default();
/// let mut sink = IssueSink::new();
/// PolicyValidator::new(&config).validate(&index, &mut content, &IssueScope::archive(), &mut sink);
///
/// // No distribution config, shadow file or shells in this image.
/// assert!(sink.has_errors());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PolicyValidator<'a> {
    config: &'a PolicyConfig,
}

impl<'a> PolicyValidator<'a> {
    /// Creates a validator with the given settings.
    #[must_use]
    pub const fn new(config: &'a PolicyConfig) -> Self {
        Self { config }
    }

    /// Validates one image, appending issues stamped with `scope` to `sink`.
    pub fn validate<R: Read + Seek>(
        &self,
        index: &ArchiveIndex,
        content: &mut ContentReader<R>,
        scope: &IssueScope,
        sink: &mut IssueSink,
    ) {
        let mut pass = Pass {
            config: self.config,
            index,
            resolver: PathResolver::with_max_hops(index, self.config.max_symlink_hops),
            content,
            scope,
            sink,
        };
        pass.run();
    }
}

/// What to verify about one path.
#[derive(Debug, Clone, Copy)]
struct FileCheck<'c> {
    path: &'c str,
    rule: FileRule,
    required: bool,
    follow_symlink: bool,
    max_size: Option<u64>,
    expect_elf: bool,
}

impl<'c> FileCheck<'c> {
    const fn new(path: &'c str, rule: FileRule) -> Self {
        Self {
            path,
            rule,
            required: true,
            follow_symlink: false,
            max_size: None,
            expect_elf: false,
        }
    }

    const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    const fn max_size(mut self, max: u64) -> Self {
        self.max_size = Some(max);
        self
    }

    const fn executable(mut self) -> Self {
        self.follow_symlink = true;
        self.expect_elf = true;
        self
    }
}

/// State of one validation pass.
struct Pass<'p, R> {
    config: &'p PolicyConfig,
    index: &'p ArchiveIndex,
    resolver: PathResolver<'p>,
    content: &'p mut ContentReader<R>,
    scope: &'p IssueScope,
    sink: &'p mut IssueSink,
}

impl<'p, R: Read + Seek> Pass<'p, R> {
    fn run(&mut self) {
        debug!(
            architecture = %self.config.architecture,
            members = self.index.len(),
            "validating image"
        );

        self.check_damaged_members();
        let default_uid = self.check_distribution_conf();
        self.check_wsl_conf();
        self.check_passwd(default_uid);
        self.check_file(FileCheck::new(tables::SHADOW, tables::SHADOW_FILE));
        self.check_file(FileCheck::new(tables::BASH, tables::EXECUTABLE).executable());
        self.check_file(FileCheck::new(tables::SH, tables::EXECUTABLE).executable());
        self.check_units();
        self.check_xattrs();
    }

    fn error(&mut self, message: impl Into<String>) {
        self.sink.error(self.scope, message);
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.sink.warning(self.scope, message);
    }

    /// Presence, mode, owner, size and content type of one path.
    fn check_file(&mut self, check: FileCheck<'_>) -> Option<ResolvedPath<'p>> {
        let path = check.path;
        let Some(resolved) = self.resolver.resolve(path, check.follow_symlink) else {
            if check.required {
                self.error(format!("File \"{path}\" not found in tar"));
            } else {
                debug!(path, "optional file absent");
            }
            return None;
        };

        let member = resolved.member();
        if !check.rule.accepts_mode(member.mode) {
            self.warning(format!(
                "file: \"{path}\" has unexpected mode: {} (expected: {})",
                member.mode_string(),
                check.rule.describe_modes()
            ));
        }
        if member.uid != check.rule.uid {
            self.warning(format!(
                "file: \"{path}\" has unexpected uid: {} (expected: {})",
                member.uid, check.rule.uid
            ));
        }
        if let Some(gid) = check.rule.gid
            && member.gid != gid
        {
            self.warning(format!(
                "file: \"{path}\" has unexpected gid: {} (expected: {gid})",
                member.gid
            ));
        }
        if let Some(max) = check.max_size
            && member.size > max
        {
            self.error(format!(
                "file: \"{path}\" is too big ({} bytes), max: {max}",
                member.size
            ));
        }
        if check.expect_elf {
            self.check_architecture(path, &resolved);
        }

        Some(resolved)
    }

    /// Reads the data behind `resolved`, following a symlink first if the
    /// lookup did not. Failures become an error naming `path`.
    fn read_content(
        &mut self,
        path: &str,
        resolved: &ResolvedPath<'p>,
        limit: Option<u64>,
    ) -> Option<Vec<u8>> {
        let member = if resolved.member().kind.is_symlink() {
            if let Some(target) = self.resolver.resolve(path, true) {
                target.member()
            } else {
                self.error(format!("File \"{path}\" is a dangling symbolic link"));
                return None;
            }
        } else {
            resolved.member()
        };

        match self.content.read(self.index, member, limit) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                self.error(format!("Failed to read \"{path}\": {e}"));
                None
            }
        }
    }

    fn check_architecture(&mut self, path: &str, resolved: &ResolvedPath<'p>) {
        let Some(head) = self.read_content(path, resolved, Some(magic::MAGIC_PROBE_LEN)) else {
            return;
        };

        let architecture = self.config.architecture;
        if ElfHeader::parse(&head).is_some_and(|header| header.matches(architecture)) {
            return;
        }
        self.error(format!(
            "file: \"{path}\" has unexpected magic type: {} (expected: {})",
            magic::describe_content(&head),
            magic::expected_description(architecture)
        ));
    }

    /// Parses a configuration file and reports keys outside `allowed`.
    fn read_config(&mut self, path: &str, allowed: &[&str]) -> Option<ConfigFile> {
        let Some(resolved) = self.resolver.resolve(path, false) else {
            self.error(format!("File \"{path}\" not found in tar"));
            return None;
        };
        let bytes = self.read_content(path, &resolved, None)?;

        let config = match ConfigFile::parse(&String::from_utf8_lossy(&bytes)) {
            Ok(config) => config,
            Err(e) => {
                self.error(format!("Failed to parse \"{path}\": {e}"));
                return None;
            }
        };

        for key in config.unexpected_keys(allowed) {
            self.error(format!("Found unexpected key in \"{path}\": {key}"));
        }
        debug!(path, keys = ?config.keys().collect::<Vec<_>>(), "configuration parsed");
        Some(config)
    }

    fn check_asset_location(&mut self, key: &str, value: &str) {
        if !self.config.is_wsl_asset_path(value) {
            self.warning(format!(
                "value for {key} is not under {}: \"{value}\"",
                self.config.wsl_asset_prefix
            ));
        }
    }

    /// Checks `/etc/wsl-distribution.conf` and the assets it names.
    ///
    /// Returns the configured default uid, if any.
    fn check_distribution_conf(&mut self) -> Option<u32> {
        self.check_file(FileCheck::new(tables::DISTRIBUTION_CONF, tables::CONFIG_FILE))?;
        let config = self.read_config(tables::DISTRIBUTION_CONF, tables::DISTRIBUTION_CONF_KEYS)?;

        if let Some(command) = config.get("oobe.command") {
            self.check_file(FileCheck::new(command, tables::EXECUTABLE));
            self.check_asset_location("oobe.command", command);
        }

        let default_uid = config
            .get("oobe.defaultuid")
            .and_then(|value| self.parse_default_uid(value));

        let max_asset_size = self.config.max_asset_size;
        if let Some(icon) = config.get("shortcut.icon") {
            self.check_file(FileCheck::new(icon, tables::CONFIG_FILE).max_size(max_asset_size));
            self.check_asset_location("shortcut.icon", icon);
        }

        if let Some(template) = config.get("windowsterminal.profiletemplate") {
            self.check_file(
                FileCheck::new(template, tables::PROFILE_TEMPLATE).max_size(max_asset_size),
            );
            self.check_asset_location("windowsterminal.profileTemplate", template);
        }

        default_uid
    }

    fn parse_default_uid(&mut self, value: &str) -> Option<u32> {
        let Ok(uid) = value.trim().parse::<u32>() else {
            self.error(format!("Invalid value for oobe.defaultUid: \"{value}\""));
            return None;
        };
        if uid != self.config.expected_default_uid {
            self.warning(format!(
                "Default UID is not {}. Found: {uid}",
                self.config.expected_default_uid
            ));
        }
        Some(uid)
    }

    /// Checks the optional `/etc/wsl.conf` and, when it enables systemd,
    /// `/sbin/init`.
    fn check_wsl_conf(&mut self) {
        let wsl_conf = FileCheck::new(tables::WSL_CONF, tables::CONFIG_FILE).optional();
        if self.check_file(wsl_conf).is_none() {
            return;
        }
        let Some(config) = self.read_config(tables::WSL_CONF, tables::WSL_CONF_KEYS) else {
            return;
        };

        if config.get_bool("boot.systemd") {
            self.check_file(FileCheck::new(tables::INIT, tables::EXECUTABLE).executable());
        } else {
            debug!("systemd boot not enabled, skipping init check");
        }
    }

    fn check_passwd(&mut self, default_uid: Option<u32>) {
        let Some(resolved) = self.check_file(FileCheck::new(tables::PASSWD, tables::CONFIG_FILE))
        else {
            return;
        };
        let Some(bytes) = self.read_content(tables::PASSWD, &resolved, None) else {
            return;
        };
        passwd::check_passwd(
            &String::from_utf8_lossy(&bytes),
            default_uid,
            self.scope,
            self.sink,
        );
    }

    fn check_units(&mut self) {
        let record = UnitEnablementDetector::new(self.resolver).detect();
        for (unit, wants_path) in record.iter() {
            if tables::is_discouraged_unit(unit) {
                self.warning(format!("Found discouraged system unit: {wants_path}"));
            }
        }
    }

    fn check_damaged_members(&mut self) {
        let index = self.index;
        for damaged in index.damaged() {
            self.error(format!(
                "File \"{}\" has a damaged tar header: {}",
                damaged.path, damaged.reason
            ));
        }
    }

    fn check_xattrs(&mut self) {
        let index = self.index;
        let mut first_file = None;
        let mut found = BTreeSet::new();

        for member in index.members() {
            for attribute in &member.xattrs {
                if tables::is_unsupported_xattr(attribute) {
                    first_file.get_or_insert_with(|| logical_path(&member.name));
                    found.insert(attribute.as_str());
                }
            }
        }

        if let Some(first_file) = first_file {
            let names: Vec<&str> = found.into_iter().collect();
            self.warning(format!(
                "Found unsupported extended attributes on \"{first_file}\" (and possibly other files): {}",
                names.join(", ")
            ));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::report::Severity;
    use crate::test_utils::TarTestBuilder;
    use crate::test_utils::damage_uid;
    use crate::test_utils::elf64_header;
    use crate::test_utils::minimal_image;
    use crate::types::Architecture;
    use std::io::Cursor;

    const PASSWD: &[u8] = b"root:x:0:0:root:/root:/bin/bash\n";

    fn base_image() -> TarTestBuilder {
        minimal_image(Architecture::X64)
    }

    fn with_systemd(builder: TarTestBuilder, init_machine: u16) -> TarTestBuilder {
        builder
            .add_file("./etc/wsl.conf", b"[boot]\nsystemd=true\n")
            .add_file_with_mode("./usr/lib/systemd/systemd", &elf64_header(init_machine), 0o755)
            .add_symlink("./sbin", "usr/sbin")
            .add_symlink("./usr/sbin/init", "../lib/systemd/systemd")
    }

    fn validate_with(builder: TarTestBuilder, architecture: Architecture) -> IssueSink {
        let (index, mut content) = ArchiveIndex::open(Cursor::new(builder.build())).unwrap();
        let config = PolicyConfig::default().with_architecture(architecture);
        let mut sink = IssueSink::new();
        PolicyValidator::new(&config).validate(&index, &mut content, &IssueScope::archive(), &mut sink);
        sink
    }

    fn validate(builder: TarTestBuilder) -> IssueSink {
        validate_with(builder, Architecture::X64)
    }

    fn messages(sink: &IssueSink, severity: Severity) -> Vec<String> {
        sink.with_severity(severity).map(|i| i.message.clone()).collect()
    }

    #[test]
    fn test_clean_image() {
        let sink = validate(base_image());
        assert!(sink.issues().is_empty(), "unexpected issues: {:?}", sink.issues());
    }

    #[test]
    fn test_init_matches_x64() {
        let sink = validate_with(with_systemd(base_image(), 0x3e), Architecture::X64);
        assert!(sink.issues().is_empty(), "unexpected issues: {:?}", sink.issues());
    }

    #[test]
    fn test_init_mismatch_under_arm64() {
        let image = with_systemd(TarTestBuilder::new(), 0x3e)
            .add_file("./etc/passwd", PASSWD);
        let sink = validate_with(image, Architecture::Arm64);

        let magic_errors: Vec<_> = messages(&sink, Severity::Error)
            .into_iter()
            .filter(|m| m.contains("unexpected magic type"))
            .collect();
        assert_eq!(
            magic_errors,
            vec![
                "file: \"/sbin/init\" has unexpected magic type: ELF 64-bit LSB executable, x86-64 (expected: ELF 64-bit LSB, ARM aarch64)"
            ]
        );
    }

    #[test]
    fn test_systemd_disabled_skips_init() {
        let image = base_image().add_file("./etc/wsl.conf", b"[boot]\nsystemd=false\n");
        let sink = validate(image);
        assert!(sink.issues().is_empty(), "unexpected issues: {:?}", sink.issues());
    }

    #[test]
    fn test_unknown_config_key() {
        let image = base_image().add_file("./etc/wsl.conf", b"[Oobe]\nUnknown = 1\n");
        let sink = validate(image);
        assert_eq!(
            messages(&sink, Severity::Error),
            vec!["Found unexpected key in \"/etc/wsl.conf\": oobe.unknown"]
        );
    }

    #[test]
    fn test_unparsable_config_other_checks_run() {
        let image = TarTestBuilder::new()
            .add_file("etc/wsl-distribution.conf", b"not an ini file\n")
            .add_file("etc/passwd", b"daemon:x:1:1::/:/bin/false\n");
        let errors = messages(&validate(image), Severity::Error);

        assert!(errors.contains(&"Failed to parse \"/etc/wsl-distribution.conf\": line 1: expected 'key = value'".to_string()));
        assert!(errors.contains(&"No root (uid=0) found in /etc/passwd".to_string()));
        assert!(errors.contains(&"File \"/etc/shadow\" not found in tar".to_string()));
    }

    #[test]
    fn test_missing_required_and_optional() {
        let sink = validate(TarTestBuilder::new());
        let errors = messages(&sink, Severity::Error);
        assert_eq!(
            errors,
            vec![
                "File \"/etc/wsl-distribution.conf\" not found in tar",
                "File \"/etc/passwd\" not found in tar",
                "File \"/etc/shadow\" not found in tar",
                "File \"/bin/bash\" not found in tar",
                "File \"/bin/sh\" not found in tar",
            ]
        );
        assert_eq!(sink.warning_count(), 0);
    }

    #[test]
    fn test_mode_and_owner_warnings() {
        let image = base_image().add_file_with_owner("./etc/passwd", PASSWD, 0o600, 1000, 1000);
        let warnings = messages(&validate(image), Severity::Warning);
        assert_eq!(
            warnings,
            vec![
                "file: \"/etc/passwd\" has unexpected mode: 0o600 (expected: 0o664 or 0o644)",
                "file: \"/etc/passwd\" has unexpected uid: 1000 (expected: 0)",
                "file: \"/etc/passwd\" has unexpected gid: 1000 (expected: 0)",
            ]
        );
    }

    #[test]
    fn test_oversized_icon() {
        let image = base_image().add_file("./usr/lib/wsl/test.ico", &vec![0_u8; 1024 * 1024 + 1]);
        assert_eq!(
            messages(&validate(image), Severity::Error),
            vec!["file: \"/usr/lib/wsl/test.ico\" is too big (1048577 bytes), max: 1048576"]
        );
    }

    #[test]
    fn test_assets_outside_wsl_prefix_and_default_uid() {
        let conf = b"[oobe]\ncommand = /opt/oobe.sh\ndefaultUid = 1001\n";
        let image = base_image()
            .add_file("./etc/wsl-distribution.conf", conf)
            .add_file_with_mode("./opt/oobe.sh", b"#!/bin/sh\n", 0o755);
        let warnings = messages(&validate(image), Severity::Warning);
        assert_eq!(
            warnings,
            vec![
                "value for oobe.command is not under /usr/lib/wsl: \"/opt/oobe.sh\"",
                "Default UID is not 1000. Found: 1001",
            ]
        );
    }

    #[test]
    fn test_invalid_default_uid() {
        let image = base_image().add_file("./etc/wsl-distribution.conf", b"[oobe]\ndefaultUid = abc\n");
        assert_eq!(
            messages(&validate(image), Severity::Error),
            vec!["Invalid value for oobe.defaultUid: \"abc\""]
        );
    }

    #[test]
    fn test_default_uid_squatted() {
        let image = base_image().add_file(
            "./etc/passwd",
            b"root:x:0:0:root:/root:/bin/bash\nuser:x:1000:1000::/home/user:/bin/bash\n",
        );
        let warnings = messages(&validate(image), Severity::Warning);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("/etc/passwd already has an entry for default uid"));
    }

    #[test]
    fn test_discouraged_unit() {
        let image = base_image()
            .add_file("./usr/lib/systemd/system/systemd-resolved.service", b"[Unit]\n")
            .add_symlink(
                "./etc/systemd/system/multi-user.target.wants/systemd-resolved.service",
                "/usr/lib/systemd/system/systemd-resolved.service",
            );
        assert_eq!(
            messages(&validate(image), Severity::Warning),
            vec!["Found discouraged system unit: /etc/systemd/system/multi-user.target.wants/systemd-resolved.service"]
        );
    }

    #[test]
    fn test_masked_discouraged_unit_not_reported() {
        let image = base_image()
            .add_file("./usr/lib/systemd/system/systemd-networkd.service", b"[Unit]\n")
            .add_symlink(
                "./usr/lib/systemd/system/multi-user.target.wants/systemd-networkd.service",
                "../systemd-networkd.service",
            )
            .add_symlink("./etc/systemd/system/systemd-networkd.service", "/dev/null");
        assert!(validate(image).issues().is_empty());
    }

    #[test]
    fn test_unsupported_xattrs_single_warning() {
        let image = base_image()
            .add_file_with_pax(
                "./usr/bin/ping",
                b"",
                &[
                    ("SCHILY.xattr.security.selinux", b"label".as_slice()),
                    ("SCHILY.xattr.security.capability", b"\x01".as_slice()),
                ],
            )
            .add_file_with_pax(
                "./usr/bin/ls",
                b"",
                &[("SCHILY.xattr.security.ima", b"sig".as_slice())],
            );
        assert_eq!(
            messages(&validate(image), Severity::Warning),
            vec!["Found unsupported extended attributes on \"/usr/bin/ping\" (and possibly other files): security.ima, security.selinux"]
        );
    }

    #[test]
    fn test_shell_script_as_bash() {
        let image = base_image().add_file_with_mode("./usr/bin/bash", b"#!/bin/busybox sh\n", 0o755);
        assert_eq!(
            messages(&validate(image), Severity::Error),
            vec![
                "file: \"/bin/bash\" has unexpected magic type: script, interpreter /bin/busybox (expected: ELF 64-bit LSB, x86-64)",
                "file: \"/bin/sh\" has unexpected magic type: script, interpreter /bin/busybox (expected: ELF 64-bit LSB, x86-64)",
            ]
        );
    }

    #[test]
    fn test_damaged_member_reported_other_checks_run() {
        let mut data = base_image().build();
        damage_uid(&mut data, 0);

        let (index, mut content) = ArchiveIndex::open(Cursor::new(data)).unwrap();
        let config = PolicyConfig::default();
        let mut sink = IssueSink::new();
        PolicyValidator::new(&config).validate(&index, &mut content, &IssueScope::archive(), &mut sink);

        let errors = messages(&sink, Severity::Error);
        assert_eq!(errors.len(), 1, "unexpected errors: {errors:?}");
        assert!(errors[0].starts_with("File \"/\" has a damaged tar header: unreadable uid"));
        assert!(messages(&sink, Severity::Warning).is_empty());
    }

    #[test]
    fn test_shadow_group_not_checked() {
        let image = base_image().add_file_with_owner("./etc/shadow", b"", 0o600, 0, 999);
        assert!(validate(image).issues().is_empty());
    }
}
