//! Path resolver and policy validator for WSL distribution archives.
//!
//! `distrolint-core` indexes a distribution root filesystem tarball without
//! extracting it, resolves paths through the symbolic links inside the image
//! the way the Linux VFS would, and checks the image against the WSL
//! packaging policy: configuration files, account database, shells, init,
//! enabled systemd units and extended attributes. It also validates
//! `DistributionInfo.json` manifests and every archive they reference.
//!
//! # Examples
//!
//! ```no_run
//! use distrolint_core::PolicyConfig;
//! use distrolint_core::report::IssueScope;
//! use distrolint_core::report::IssueSink;
//! use distrolint_core::validate_archive_file;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PolicyConfig::default();
//! let mut sink = IssueSink::new();
//! validate_archive_file("debian.wsl", &config, &IssueScope::archive(), &mut sink)?;
//! for issue in sink.issues() {
//!     println!("{}: {issue}", issue.severity);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod archive;
pub mod config;
pub mod error;
pub mod formats;
pub mod manifest;
pub mod policy;
pub mod report;
pub mod resolve;
pub mod test_utils;
pub mod types;
pub mod units;

// Re-export main API types
pub use api::validate_archive;
pub use api::validate_archive_file;
pub use config::PolicyConfig;
pub use error::LintError;
pub use error::Result;
pub use manifest::Manifest;
pub use manifest::ManifestValidator;
pub use report::IssueSink;
pub use resolve::PathResolver;
