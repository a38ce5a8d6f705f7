//! Content-type detection from leading bytes.
//!
//! Only what the policy needs is recognized: ELF headers in detail, `#!`
//! scripts, and a generic fallback. Descriptions follow the wording of
//! `file(1)` so messages read familiarly.

use crate::types::Architecture;

/// Number of leading bytes read for content detection.
pub const MAGIC_PROBE_LEN: u64 = 256;

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";
const ELF_HEADER_LEN: usize = 20;

const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ELFDATA2MSB: u8 = 2;

/// The identifying fields of an ELF header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeader {
    /// `true` for ELFCLASS64.
    pub is_64bit: bool,
    /// `true` for little-endian data encoding.
    pub little_endian: bool,
    /// `e_type`.
    pub file_type: u16,
    /// `e_machine`.
    pub machine: u16,
}

impl ElfHeader {
    /// Parses the first bytes of a file. Returns `None` for anything that is
    /// not an ELF header.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < ELF_HEADER_LEN || !bytes.starts_with(ELF_MAGIC) {
            return None;
        }

        let is_64bit = match bytes[4] {
            ELFCLASS32 => false,
            ELFCLASS64 => true,
            _ => return None,
        };
        let little_endian = match bytes[5] {
            ELFDATA2LSB => true,
            ELFDATA2MSB => false,
            _ => return None,
        };

        let read_u16 = |offset: usize| {
            let raw = [bytes[offset], bytes[offset + 1]];
            if little_endian {
                u16::from_le_bytes(raw)
            } else {
                u16::from_be_bytes(raw)
            }
        };

        Some(Self {
            is_64bit,
            little_endian,
            file_type: read_u16(16),
            machine: read_u16(18),
        })
    }

    /// Returns `true` if this is a 64-bit little-endian executable or shared
    /// object for `architecture`.
    #[must_use]
    pub fn matches(&self, architecture: Architecture) -> bool {
        self.is_64bit
            && self.little_endian
            && matches!(self.file_type, 2 | 3)
            && self.machine == architecture.elf_machine()
    }

    /// `ELF 64-bit LSB executable, x86-64`
    #[must_use]
    pub fn describe(&self) -> String {
        let class = if self.is_64bit { "64-bit" } else { "32-bit" };
        let order = if self.little_endian { "LSB" } else { "MSB" };
        let file_type = match self.file_type {
            1 => "relocatable",
            2 => "executable",
            3 => "shared object",
            4 => "core file",
            _ => "unknown type",
        };
        format!("ELF {class} {order} {file_type}, {}", machine_name(self.machine))
    }
}

fn machine_name(machine: u16) -> String {
    if let Some(architecture) = Architecture::from_elf_machine(machine) {
        return architecture.machine_name().to_string();
    }
    match machine {
        0x03 => "Intel 80386".to_string(),
        0x08 => "MIPS".to_string(),
        0x14 => "PowerPC".to_string(),
        0x15 => "64-bit PowerPC".to_string(),
        0x16 => "IBM S/390".to_string(),
        0x28 => "ARM".to_string(),
        0xf3 => "RISC-V".to_string(),
        0x102 => "LoongArch".to_string(),
        other => format!("unknown machine {other:#x}"),
    }
}

/// Describes file content for messages.
///
/// # Examples
///
/// ```
/// use distrolint_core::policy::magic::describe_content;
///
/// assert_eq!(describe_content(b"#!/bin/sh\necho hi\n"), "script, interpreter /bin/sh");
/// assert_eq!(describe_content(b""), "empty");
/// ```
#[must_use]
pub fn describe_content(bytes: &[u8]) -> String {
    if let Some(header) = ElfHeader::parse(bytes) {
        return header.describe();
    }
    if bytes.is_empty() {
        return "empty".to_string();
    }
    if let Some(rest) = bytes.strip_prefix(b"#!") {
        let line = rest.split(|&b| b == b'\n').next().unwrap_or_default();
        let line = String::from_utf8_lossy(line);
        let interpreter = line.split_whitespace().next().unwrap_or_default();
        return format!("script, interpreter {interpreter}");
    }
    if bytes.starts_with(ELF_MAGIC) {
        return "ELF, truncated header".to_string();
    }
    if std::str::from_utf8(bytes).is_ok() {
        return "text".to_string();
    }
    "data".to_string()
}

/// Expected description for messages (`ELF 64-bit LSB, x86-64`).
#[must_use]
pub fn expected_description(architecture: Architecture) -> String {
    format!("ELF 64-bit LSB, {}", architecture.machine_name())
}
