//! Subcommand implementations.
//!
//! Validation commands return `Ok(false)` when the input was read but failed
//! policy, and `Err` when it could not be read at all.

pub mod check;
pub mod completion;
pub mod manifest;
