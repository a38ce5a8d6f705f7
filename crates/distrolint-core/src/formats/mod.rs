//! Archive file formats.
//!
//! Only tar is a container format here; everything else is a compression
//! layer decoded before indexing.

pub mod compression;
pub mod source;

pub use compression::ArchiveFormat;
pub use compression::CompressionCodec;
pub use source::ArchiveSource;
