//! Target CPU architecture of a distribution image.

use std::fmt;

/// CPU architecture an image is built for.
///
/// Determines which ELF machine type the executables in the image must
/// carry.
///
/// # Examples
///
/// ```
/// use distrolint_core::types::Architecture;
///
/// assert_eq!(Architecture::X64.elf_machine(), 0x3e);
/// assert_eq!(Architecture::Arm64.to_string(), "ARM64");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Architecture {
    /// x86-64 (`EM_X86_64`).
    #[default]
    X64,

    /// AArch64 (`EM_AARCH64`).
    Arm64,
}

impl Architecture {
    /// Returns the `e_machine` value of a 64-bit ELF file for this
    /// architecture.
    #[must_use]
    pub const fn elf_machine(self) -> u16 {
        match self {
            Self::X64 => 0x3e,
            Self::Arm64 => 0xb7,
        }
    }

    /// Returns the human-readable machine name, as `file(1)` prints it.
    #[must_use]
    pub const fn machine_name(self) -> &'static str {
        match self {
            Self::X64 => "x86-64",
            Self::Arm64 => "ARM aarch64",
        }
    }

    /// Maps an ELF `e_machine` value back to an architecture.
    #[must_use]
    pub const fn from_elf_machine(machine: u16) -> Option<Self> {
        match machine {
            0x3e => Some(Self::X64),
            0xb7 => Some(Self::Arm64),
            _ => None,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X64 => f.write_str("X64"),
            Self::Arm64 => f.write_str("ARM64"),
        }
    }
}
