//! Compression codecs a distribution tarball may be wrapped in.
//!
//! # Supported Codecs
//!
//! - **Gzip**: the common `.wsl` encoding, accepted by every WSL version
//! - **Xz**: accepted by every WSL version
//! - **Zstd** and **Bzip2**: readable here, but not installable by WSL

use std::io::BufRead;
use std::io::Read;

use crate::Result;

/// Offset of the `ustar` magic in a tar header.
const USTAR_MAGIC_OFFSET: usize = 257;

/// Compression codec detected from the leading bytes of a file.
///
/// # Examples
///
/// ```
/// use distrolint_core::formats::compression::CompressionCodec;
///
/// assert_eq!(CompressionCodec::from_magic(&[0x1f, 0x8b, 0x08]), Some(CompressionCodec::Gzip));
/// assert_eq!(CompressionCodec::Xz.name(), "xz");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionCodec {
    /// Gzip compression (deflate algorithm).
    Gzip,

    /// Bzip2 compression (Burrows-Wheeler algorithm).
    Bzip2,

    /// Xz compression (LZMA2 algorithm).
    Xz,

    /// Zstd compression (Zstandard algorithm).
    Zstd,
}

impl CompressionCodec {
    /// Returns a human-readable name for this codec.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }

    /// Identifies a codec by its stream magic.
    #[must_use]
    pub fn from_magic(head: &[u8]) -> Option<Self> {
        if head.starts_with(&[0x1f, 0x8b]) {
            Some(Self::Gzip)
        } else if head.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Some(Self::Xz)
        } else if head.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Some(Self::Zstd)
        } else if head.starts_with(b"BZh") {
            Some(Self::Bzip2)
        } else {
            None
        }
    }

    /// Wraps `reader` in a decoder for this codec.
    pub fn decoder<'r, R: BufRead + 'r>(self, reader: R) -> Result<Box<dyn Read + 'r>> {
        Ok(match self {
            Self::Gzip => Box::new(flate2::bufread::MultiGzDecoder::new(reader)),
            Self::Bzip2 => Box::new(bzip2::bufread::MultiBzDecoder::new(reader)),
            Self::Xz => Box::new(xz2::bufread::XzDecoder::new_multi_decoder(reader)),
            Self::Zstd => Box::new(zstd::stream::read::Decoder::with_buffer(reader)?),
        })
    }
}

/// Container format of an archive file, as detected from its first bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// Uncompressed tar with a `ustar` header.
    Tar,

    /// Tar wrapped in a compression codec.
    Compressed(CompressionCodec),

    /// Anything else. Still read as tar; the framing decides.
    Unknown,
}

impl ArchiveFormat {
    /// Detects the format from at least the first 512 bytes of a file.
    ///
    /// # Examples
    ///
    /// ```
    /// use distrolint_core::formats::compression::ArchiveFormat;
    /// use distrolint_core::formats::compression::CompressionCodec;
    ///
    /// assert_eq!(
    ///     ArchiveFormat::detect(b"\xfd7zXZ\x00rest"),
    ///     ArchiveFormat::Compressed(CompressionCodec::Xz)
    /// );
    /// assert_eq!(ArchiveFormat::detect(b"PK\x03\x04"), ArchiveFormat::Unknown);
    /// ```
    #[must_use]
    pub fn detect(head: &[u8]) -> Self {
        if let Some(codec) = CompressionCodec::from_magic(head) {
            return Self::Compressed(codec);
        }
        match head.get(USTAR_MAGIC_OFFSET..USTAR_MAGIC_OFFSET + 5) {
            Some(b"ustar") => Self::Tar,
            _ => Self::Unknown,
        }
    }

    /// Returns `true` for the encodings WSL can install from a URL (gzip
    /// and xz compressed tar).
    #[must_use]
    pub const fn is_installable(self) -> bool {
        matches!(
            self,
            Self::Compressed(CompressionCodec::Gzip | CompressionCodec::Xz)
        )
    }

    /// `file(1)`-style description used in messages.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Tar => "POSIX tar archive",
            Self::Compressed(CompressionCodec::Gzip) => "gzip compressed data",
            Self::Compressed(CompressionCodec::Xz) => "XZ compressed data",
            Self::Compressed(CompressionCodec::Zstd) => "Zstandard compressed data",
            Self::Compressed(CompressionCodec::Bzip2) => "bzip2 compressed data",
            Self::Unknown => "data",
        }
    }
}
