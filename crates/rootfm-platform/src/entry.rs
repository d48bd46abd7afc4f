use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::mime::{self, IconHint};
use crate::permissions::Permissions;

/// Serializable snapshot of one entry's metadata, the record shape handed to
/// UI layers and emitted by `rootfm ls --json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryInfo {
    pub name: String,
    pub path: String,
    pub exists: bool,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub size: u64,
    /// UTC epoch milliseconds, 0 when absent.
    pub modified: i64,
    /// Symbolic rwx string, e.g. `rwxr-xr-x`.
    pub permissions: Option<String>,
    pub owner: u32,
    pub group: u32,
    pub mime_type: Option<String>,
    pub icon_hint: IconHint,
}

/// The capability set shared by both backends.
///
/// Implementations hold an immutable state snapshot taken at construction;
/// mutating operations replace the whole snapshot on success and leave it
/// untouched on failure, so a `false` return guarantees the entry still
/// reports its pre-call state. Two entries refer to the same file iff their
/// paths are equal; sizes and timestamps are snapshot data, not identity.
pub trait FsEntry: Send {
    fn path(&self) -> &Path;

    fn exists(&self) -> bool;
    fn is_dir(&self) -> bool;
    fn is_symlink(&self) -> bool;
    fn permissions(&self) -> Option<Permissions>;

    /// Size in bytes, 0 when the entry does not exist.
    fn len(&self) -> u64;

    /// Last modification time as UTC epoch milliseconds, 0 when absent.
    fn modified_millis(&self) -> i64;

    /// Numeric owner/group ids. Only the shell backend reports real values
    /// for paths the calling process cannot stat itself.
    fn owner(&self) -> u32;
    fn group(&self) -> u32;

    /// Children of a directory, same backend as `self`. `Some(vec![])` for an
    /// empty directory; `None` when the listing itself failed (unreadable
    /// directory, dead shell session).
    fn list(&self) -> Option<Vec<Box<dyn FsEntry>>>;

    /// Creates an empty regular file. Returns `false` without side effects
    /// when the entry already exists.
    fn create_new_file(&mut self) -> bool;

    /// Creates this directory; the parent must already exist.
    fn mkdir(&mut self) -> bool;

    /// Creates this directory and any missing intermediate directories.
    /// Returns whether the terminal directory now exists.
    fn mkdirs(&mut self) -> bool;

    /// Removes the file, or the directory tree rooted here. On success the
    /// entry transitions to the "does not exist" state.
    fn delete(&mut self) -> bool;

    /// Recursive, attribute-preserving copy. `self` is left untouched.
    fn copy_to(&self, target: &Path) -> bool;

    /// Move/rename across arbitrary paths. On success `self` transitions to
    /// the "does not exist" state.
    fn move_to(&mut self, target: &Path) -> bool;

    /// Applies a new permission triple. No-op success when unchanged; the new
    /// value is only adopted after the backend reports success.
    fn set_permissions(&mut self, perms: Permissions) -> bool;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path().to_string_lossy().into_owned())
    }

    fn can_read(&self) -> bool {
        self.permissions().map(|p| p.ur).unwrap_or(false)
    }

    fn can_write(&self) -> bool {
        self.permissions().map(|p| p.uw).unwrap_or(false)
    }

    fn can_execute(&self) -> bool {
        self.permissions().map(|p| p.ux).unwrap_or(false)
    }

    /// Rename to a sibling path; a plain move.
    fn rename_to(&mut self, new_path: &Path) -> bool {
        self.move_to(new_path)
    }

    /// `list` with a caller-supplied predicate applied to each child.
    fn list_filtered(&self, filter: &dyn Fn(&dyn FsEntry) -> bool) -> Option<Vec<Box<dyn FsEntry>>> {
        self.list()
            .map(|children| children.into_iter().filter(|c| filter(c.as_ref())).collect())
    }

    fn same_entry(&self, other: &dyn FsEntry) -> bool {
        self.path() == other.path()
    }

    fn mime_type(&self) -> Option<&'static str> {
        if self.is_dir() {
            None
        } else {
            mime::mime_for_path(self.path())
        }
    }

    /// Coarse icon category, derived from the directory flag and extension.
    fn icon_hint(&self) -> IconHint {
        mime::icon_hint(self.is_dir(), self.path())
    }

    fn info(&self) -> EntryInfo {
        EntryInfo {
            name: self.name(),
            path: self.path().to_string_lossy().into_owned(),
            exists: self.exists(),
            is_dir: self.is_dir(),
            is_symlink: self.is_symlink(),
            size: self.len(),
            modified: self.modified_millis(),
            permissions: self.permissions().map(|p| p.to_string()),
            owner: self.owner(),
            group: self.group(),
            mime_type: self.mime_type().map(String::from),
            icon_hint: self.icon_hint(),
        }
    }
}

/// Sort order used by both backends: directories first, then
/// case-insensitive by name.
pub fn sort_entries(entries: &mut [Box<dyn FsEntry>]) {
    entries.sort_by(|a, b| {
        b.is_dir()
            .cmp(&a.is_dir())
            .then_with(|| a.name().to_lowercase().cmp(&b.name().to_lowercase()))
    });
}
