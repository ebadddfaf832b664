//! Collaborators the request handlers depend on, each behind a trait so the
//! storage-backed implementations can be swapped for test doubles.

pub mod component;
pub mod decorator;
pub mod index;
pub mod permission;

pub use component::ComponentDirectory;
pub use decorator::{HtmlDecorator, HtmlSourceDecorator};
pub use index::SourceLineIndex;
pub use permission::PermissionAuthority;
