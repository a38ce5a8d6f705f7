//! Opening an archive file for validation.
//!
//! The raw bytes are hashed in one pass. Compressed archives are then decoded
//! into an anonymous temporary file, so the index can seek within plain tar
//! without keeping member data in memory.

use std::fs::File;
use std::io;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;

use sha2::Digest;
use sha2::Sha256;
use tracing::debug;

use crate::Result;
use crate::formats::compression::ArchiveFormat;

/// Bytes inspected for format detection (one tar header).
const PROBE_LEN: usize = 512;

const HASH_CHUNK: usize = 64 * 1024;

/// An archive file ready to be indexed.
///
/// # Examples
///
/// ```no_run
/// use distrolint_core::formats::ArchiveSource;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let source = ArchiveSource::open("ubuntu-24.04.wsl")?;
/// println!("{} {}", source.format().description(), source.sha256_hex());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ArchiveSource {
    reader: File,
    format: ArchiveFormat,
    sha256: [u8; 32],
}

impl ArchiveSource {
    /// Opens, hashes and (if needed) decompresses the archive at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read or the compressed
    /// stream is corrupt.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let (sha256, head) = hash_stream(&mut file)?;
        let format = ArchiveFormat::detect(&head);
        debug!(path = %path.display(), format = format.description(), "archive opened");

        file.seek(SeekFrom::Start(0))?;
        let reader = match format {
            ArchiveFormat::Compressed(codec) => {
                let mut decoder = codec.decoder(BufReader::new(file))?;
                let mut spool = tempfile::tempfile()?;
                let written = io::copy(&mut decoder, &mut spool)?;
                spool.seek(SeekFrom::Start(0))?;
                debug!(codec = codec.name(), bytes = written, "archive decompressed");
                spool
            }
            ArchiveFormat::Tar | ArchiveFormat::Unknown => file,
        };

        Ok(Self {
            reader,
            format,
            sha256,
        })
    }

    /// Detected container format.
    #[must_use]
    pub const fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// SHA-256 of the file as stored (before decompression).
    #[must_use]
    pub const fn sha256(&self) -> &[u8; 32] {
        &self.sha256
    }

    /// Lowercase hex form of [`sha256`](Self::sha256).
    #[must_use]
    pub fn sha256_hex(&self) -> String {
        hex(&self.sha256)
    }

    /// Returns `true` if `expected` (hex, optionally `0x`-prefixed, any
    /// case) equals the file digest.
    #[must_use]
    pub fn sha256_matches(&self, expected: &str) -> bool {
        let expected = expected.strip_prefix("0x").unwrap_or(expected);
        expected.eq_ignore_ascii_case(&self.sha256_hex())
    }

    /// Seekable plain tar stream.
    #[must_use]
    pub fn into_reader(self) -> File {
        self.reader
    }
}

/// Hashes a whole stream, returning the digest and its first bytes.
fn hash_stream<R: Read>(reader: &mut R) -> Result<([u8; 32], Vec<u8>)> {
    let mut hasher = Sha256::new();
    let mut head = Vec::with_capacity(PROBE_LEN);
    let mut buffer = vec![0_u8; HASH_CHUNK];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        if head.len() < PROBE_LEN {
            let take = (PROBE_LEN - head.len()).min(read);
            head.extend_from_slice(&buffer[..take]);
        }
        hasher.update(&buffer[..read]);
    }

    let mut digest = [0_u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    Ok((digest, head))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
