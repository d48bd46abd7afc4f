// Backend-neutral file abstraction: the entry trait, permissions and
// extension-derived metadata shared by both backends.

pub mod entry;
pub mod mime;
pub mod permissions;

pub use entry::{EntryInfo, FsEntry};
pub use mime::IconHint;
pub use permissions::Permissions;
