//! Test utilities for building distribution images in memory.
//!
//! Member names are written into the tar header verbatim, so tests can
//! produce the `/p`, `./p` and `p` spellings real image builders emit.
//!
//! # Panics
//!
//! All functions in this module may panic on I/O errors since they are
//! designed for test use only where panics are acceptable.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::io::Write;

use crate::types::Architecture;

/// Builder for tar test archives with the entry types a root filesystem
/// contains.
///
/// # Examples
///
/// ```
/// use distrolint_core::test_utils::TarTestBuilder;
///
/// let tar_data = TarTestBuilder::new()
///     .add_directory("./etc/")
///     .add_file("./etc/passwd", b"root:x:0:0:root:/root:/bin/bash\n")
///     .add_symlink("./bin", "usr/bin")
///     .build();
/// assert!(!tar_data.is_empty());
/// ```
pub struct TarTestBuilder {
    builder: tar::Builder<Vec<u8>>,
}

impl Default for TarTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TarTestBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            builder: tar::Builder::new(Vec::new()),
        }
    }

    /// Adds a root-owned regular file with mode 0o644.
    #[must_use]
    pub fn add_file(self, path: &str, data: &[u8]) -> Self {
        self.add_file_with_owner(path, data, 0o644, 0, 0)
    }

    /// Adds a root-owned regular file with a custom mode.
    #[must_use]
    pub fn add_file_with_mode(self, path: &str, data: &[u8], mode: u32) -> Self {
        self.add_file_with_owner(path, data, mode, 0, 0)
    }

    /// Adds a regular file with custom mode and ownership.
    #[must_use]
    pub fn add_file_with_owner(
        mut self,
        path: &str,
        data: &[u8],
        mode: u32,
        uid: u64,
        gid: u64,
    ) -> Self {
        let mut header = header(path, tar::EntryType::Regular, mode, data.len() as u64);
        header.set_uid(uid);
        header.set_gid(gid);
        header.set_cksum();
        self.builder.append(&header, data).unwrap();
        self
    }

    /// Adds a regular file preceded by a pax extended header carrying
    /// `records` (`SCHILY.xattr.*`, `uid`, ...).
    #[must_use]
    pub fn add_file_with_pax(mut self, path: &str, data: &[u8], records: &[(&str, &[u8])]) -> Self {
        self.builder
            .append_pax_extensions(records.iter().copied())
            .unwrap();
        let mut header = header(path, tar::EntryType::Regular, 0o644, data.len() as u64);
        header.set_cksum();
        self.builder.append(&header, data).unwrap();
        self
    }

    /// Adds a directory with mode 0o755.
    #[must_use]
    pub fn add_directory(mut self, path: &str) -> Self {
        let mut header = header(path, tar::EntryType::Directory, 0o755, 0);
        header.set_cksum();
        self.builder.append(&header, std::io::empty()).unwrap();
        self
    }

    /// Adds a symbolic link.
    #[must_use]
    pub fn add_symlink(mut self, path: &str, target: &str) -> Self {
        let mut header = header(path, tar::EntryType::Symlink, 0o777, 0);
        set_raw(&mut header.as_old_mut().linkname, target);
        header.set_cksum();
        self.builder.append(&header, std::io::empty()).unwrap();
        self
    }

    /// Adds a hard link.
    #[must_use]
    pub fn add_hardlink(mut self, path: &str, target: &str) -> Self {
        let mut header = header(path, tar::EntryType::Link, 0o644, 0);
        set_raw(&mut header.as_old_mut().linkname, target);
        header.set_cksum();
        self.builder.append(&header, std::io::empty()).unwrap();
        self
    }

    /// Adds a character device node.
    #[must_use]
    pub fn add_char_device(mut self, path: &str) -> Self {
        let mut header = header(path, tar::EntryType::Char, 0o666, 0);
        header.set_cksum();
        self.builder.append(&header, std::io::empty()).unwrap();
        self
    }

    /// Finishes the archive and returns its bytes.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.builder.into_inner().unwrap()
    }

    /// Finishes the archive and gzip-compresses it.
    #[must_use]
    pub fn build_gzip(self) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        encoder.write_all(&self.build()).unwrap();
        encoder.finish().unwrap()
    }

    /// Finishes the archive and xz-compresses it.
    #[must_use]
    pub fn build_xz(self) -> Vec<u8> {
        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 1);
        encoder.write_all(&self.build()).unwrap();
        encoder.finish().unwrap()
    }
}

fn header(path: &str, entry_type: tar::EntryType, mode: u32, size: u64) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    set_raw(&mut header.as_old_mut().name, path);
    header.set_entry_type(entry_type);
    header.set_mode(mode);
    header.set_uid(0);
    header.set_gid(0);
    header.set_size(size);
    header.set_mtime(0);
    header
}

/// Writes `value` into a fixed header field without the path rewriting
/// `Header::set_path` applies (it drops `./` and rejects absolute names).
fn set_raw(field: &mut [u8], value: &str) {
    assert!(value.len() <= field.len(), "name too long for test header: {value}");
    field.fill(0);
    field[..value.len()].copy_from_slice(value.as_bytes());
}

/// A small image for `architecture` that passes every policy check.
///
/// Contains the distribution config with OOBE script and icon under
/// `/usr/lib/wsl`, `/etc/passwd`, `/etc/shadow`, and ELF shells reached
/// through the `/bin -> usr/bin` link. There is no `/etc/wsl.conf`.
///
/// # Examples
///
/// ```
/// use distrolint_core::test_utils::minimal_image;
/// use distrolint_core::types::Architecture;
///
/// let tar_data = minimal_image(Architecture::X64).build();
/// assert!(!tar_data.is_empty());
/// ```
#[must_use]
pub fn minimal_image(architecture: Architecture) -> TarTestBuilder {
    let elf = elf64_header(architecture.elf_machine());
    TarTestBuilder::new()
        .add_directory("./")
        .add_directory("./etc/")
        .add_file(
            "./etc/wsl-distribution.conf",
            b"[oobe]\ncommand = /usr/lib/wsl/oobe.sh\ndefaultUid = 1000\ndefaultName = Test\n\n[shortcut]\nicon = /usr/lib/wsl/test.ico\n",
        )
        .add_file_with_mode("./usr/lib/wsl/oobe.sh", b"#!/bin/sh\n", 0o755)
        .add_file("./usr/lib/wsl/test.ico", &[0_u8; 64])
        .add_file("./etc/passwd", b"root:x:0:0:root:/root:/bin/bash\n")
        .add_file_with_owner("./etc/shadow", b"root:*:19000:0:99999:7:::\n", 0o640, 0, 42)
        .add_directory("./usr/bin/")
        .add_file_with_mode("./usr/bin/bash", &elf, 0o755)
        .add_symlink("./usr/bin/sh", "bash")
        .add_symlink("./bin", "usr/bin")
}

/// Overwrites the uid field of the tar header at `offset` with non-octal
/// bytes and fixes up the header checksum, so only the field is damaged.
pub fn damage_uid(data: &mut [u8], offset: usize) {
    let header = &mut data[offset..offset + 512];
    header[108..116].copy_from_slice(b"zzzzzzz\0");
    header[148..156].fill(b' ');
    let sum: u32 = header.iter().map(|&b| u32::from(b)).sum();
    header[148..156].copy_from_slice(format!("{sum:06o}\0 ").as_bytes());
}

/// The first 64 bytes of a little-endian ELF64 executable for `machine`.
///
/// # Examples
///
/// ```
/// use distrolint_core::test_utils::elf64_header;
///
/// let header = elf64_header(0x3e);
/// assert_eq!(&header[..4], b"\x7fELF");
/// ```
#[must_use]
pub fn elf64_header(machine: u16) -> Vec<u8> {
    let mut header = vec![0_u8; 64];
    header[..4].copy_from_slice(b"\x7fELF");
    header[4] = 2; // ELFCLASS64
    header[5] = 1; // ELFDATA2LSB
    header[6] = 1; // EV_CURRENT
    header[16..18].copy_from_slice(&2_u16.to_le_bytes()); // ET_EXEC
    header[18..20].copy_from_slice(&machine.to_le_bytes());
    header[20..24].copy_from_slice(&1_u32.to_le_bytes());
    header
}
