//! Policy checks for distribution images.

pub mod config_file;
pub mod magic;
pub mod passwd;
pub mod tables;
pub mod validator;

pub use config_file::ConfigFile;
pub use config_file::ConfigSyntaxError;
pub use tables::FileRule;
pub use validator::PolicyValidator;
