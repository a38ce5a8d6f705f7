//! Core value types.

pub mod arch;
pub mod member;
pub mod node;

pub use arch::Architecture;
pub use member::ArchiveMember;
pub use member::MemberKind;
pub use node::Node;
pub use node::Scalar;
