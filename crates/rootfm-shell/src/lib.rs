// Shell-backed filesystem access: command construction, the persistent
// privileged shell session, listing parsing, and the entry built on top.

pub mod cmdline;
pub mod file;
pub mod listing;
pub mod session;

pub use cmdline::{escape, Commands};
pub use file::{filesystem_type, probe_exists, ShellFile};
pub use listing::{parse_line, ListingRecord};
pub use session::{CommandResult, Session, ShellCommand, ShellError, ShellSession};
