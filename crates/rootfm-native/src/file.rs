//! The native-I/O file entry.
//!
//! The snapshot is taken with a stat at construction time. Mutations go
//! through std::fs and, on success, re-stat and swap the snapshot so both
//! backends expose the same post-operation view.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use tracing::warn;

use rootfm_platform::entry::sort_entries;
use rootfm_platform::{FsEntry, Permissions};

#[derive(Debug, Clone, Default)]
struct EntryState {
    exists: bool,
    is_dir: bool,
    is_symlink: bool,
    permissions: Option<Permissions>,
    size: u64,
    modified: i64,
    owner: u32,
    group: u32,
}

pub struct NativeFile {
    path: PathBuf,
    state: EntryState,
}

impl NativeFile {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = snapshot(&path);
        Self { path, state }
    }

    /// Re-stat and swap the snapshot. Returns whether the path now exists.
    fn refresh(&mut self) -> bool {
        self.state = snapshot(&self.path);
        self.state.exists
    }

    /// Run a mutation; log and report `false` on failure, refresh on
    /// success.
    fn mutate(&mut self, op: Result<()>) -> bool {
        match op {
            Ok(()) => {
                self.refresh();
                true
            }
            Err(e) => {
                warn!("{:#}", e);
                false
            }
        }
    }
}

fn snapshot(path: &Path) -> EntryState {
    let Ok(link_meta) = fs::symlink_metadata(path) else {
        return EntryState::default();
    };
    let is_symlink = link_meta.file_type().is_symlink();
    // Follow the link for the rest; a broken link falls back to the link's
    // own metadata.
    let meta = fs::metadata(path).unwrap_or(link_meta);

    let modified = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    #[cfg(unix)]
    let (permissions, owner, group) = {
        use std::os::unix::fs::MetadataExt;
        (
            Some(Permissions::from_mode(meta.mode() & 0o777)),
            meta.uid(),
            meta.gid(),
        )
    };
    #[cfg(not(unix))]
    let (permissions, owner, group) = (
        Some(Permissions::from_mode(if meta.permissions().readonly() {
            0o444
        } else {
            0o644
        })),
        0,
        0,
    );

    EntryState {
        exists: true,
        is_dir: meta.is_dir(),
        is_symlink,
        permissions,
        size: meta.len(),
        modified,
        owner,
        group,
    }
}

fn copy_recursive(source: &Path, target: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(source)
        .with_context(|| format!("failed to stat {}", source.display()))?;
    if meta.is_dir() {
        fs::create_dir_all(target)
            .with_context(|| format!("failed to create {}", target.display()))?;
        let entries = fs::read_dir(source)
            .with_context(|| format!("failed to read directory {}", source.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to read entry under {}", source.display()))?;
            copy_recursive(&entry.path(), &target.join(entry.file_name()))?;
        }
        fs::set_permissions(target, meta.permissions())
            .with_context(|| format!("failed to set permissions on {}", target.display()))?;
    } else if meta.file_type().is_symlink() {
        let link = fs::read_link(source)
            .with_context(|| format!("failed to read link {}", source.display()))?;
        #[cfg(unix)]
        std::os::unix::fs::symlink(&link, target)
            .with_context(|| format!("failed to relink {}", target.display()))?;
        #[cfg(not(unix))]
        fs::copy(source, target)
            .map(|_| ())
            .with_context(|| format!("failed to copy {}", source.display()))?;
    } else {
        // fs::copy carries the permission bits over.
        fs::copy(source, target)
            .with_context(|| format!("failed to copy {} to {}", source.display(), target.display()))?;
    }
    Ok(())
}

impl FsEntry for NativeFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn exists(&self) -> bool {
        self.state.exists
    }

    fn is_dir(&self) -> bool {
        self.state.is_dir
    }

    fn is_symlink(&self) -> bool {
        self.state.is_symlink
    }

    fn permissions(&self) -> Option<Permissions> {
        self.state.permissions
    }

    fn len(&self) -> u64 {
        self.state.size
    }

    fn modified_millis(&self) -> i64 {
        self.state.modified
    }

    fn owner(&self) -> u32 {
        self.state.owner
    }

    fn group(&self) -> u32 {
        self.state.group
    }

    fn list(&self) -> Option<Vec<Box<dyn FsEntry>>> {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("failed to read directory {}: {}", self.path.display(), e);
                return None;
            }
        };
        let mut children: Vec<Box<dyn FsEntry>> = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => children.push(Box::new(NativeFile::open(entry.path()))),
                Err(e) => warn!("skipping dir entry: {}", e),
            }
        }
        sort_entries(&mut children);
        Some(children)
    }

    fn create_new_file(&mut self) -> bool {
        if self.state.exists {
            return false;
        }
        self.mutate(
            fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.path)
                .map(|_| ())
                .with_context(|| format!("failed to create {}", self.path.display())),
        )
    }

    fn mkdir(&mut self) -> bool {
        if self.state.exists {
            return false;
        }
        self.mutate(
            fs::create_dir(&self.path)
                .with_context(|| format!("failed to create directory {}", self.path.display())),
        ) && self.state.is_dir
    }

    fn mkdirs(&mut self) -> bool {
        if self.state.is_dir {
            return true;
        }
        self.mutate(
            fs::create_dir_all(&self.path)
                .with_context(|| format!("failed to create directories {}", self.path.display())),
        ) && self.state.is_dir
    }

    fn delete(&mut self) -> bool {
        let result = if self.state.is_dir {
            fs::remove_dir_all(&self.path)
                .with_context(|| format!("failed to delete directory {}", self.path.display()))
        } else {
            fs::remove_file(&self.path)
                .with_context(|| format!("failed to delete {}", self.path.display()))
        };
        match result {
            Ok(()) => {
                self.state = EntryState::default();
                true
            }
            Err(e) => {
                warn!("{:#}", e);
                false
            }
        }
    }

    fn copy_to(&self, target: &Path) -> bool {
        match copy_recursive(&self.path, target) {
            Ok(()) => true,
            Err(e) => {
                warn!("{:#}", e);
                false
            }
        }
    }

    fn move_to(&mut self, target: &Path) -> bool {
        match fs::rename(&self.path, target) {
            Ok(()) => {
                self.state = EntryState::default();
                true
            }
            Err(e) => {
                warn!(
                    "failed to move {} to {}: {}",
                    self.path.display(),
                    target.display(),
                    e
                );
                false
            }
        }
    }

    fn set_permissions(&mut self, perms: Permissions) -> bool {
        if self.state.permissions == Some(perms) {
            return true;
        }
        if !self.state.exists {
            return false;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            self.mutate(
                fs::set_permissions(&self.path, fs::Permissions::from_mode(perms.mode()))
                    .with_context(|| format!("failed to chmod {}", self.path.display())),
            )
        }
        #[cfg(not(unix))]
        {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn absent_entry_reports_sentinels() {
        let dir = TempDir::new().unwrap();
        let file = NativeFile::open(dir.path().join("missing.txt"));
        assert!(!file.exists());
        assert!(!file.is_dir());
        assert!(!file.is_symlink());
        assert_eq!(file.len(), 0);
        assert_eq!(file.modified_millis(), 0);
        assert!(file.permissions().is_none());
    }

    #[test]
    fn create_write_list_delete_scenario() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scenario.txt");

        let mut file = NativeFile::open(&path);
        assert!(file.create_new_file());
        assert!(file.exists());
        assert_eq!(file.len(), 0);
        // Creating again is a no-op failure.
        assert!(!file.create_new_file());

        fs::write(&path, b"hello").unwrap();
        let relisted = NativeFile::open(&path);
        assert_eq!(relisted.len(), 5);
        assert_eq!(relisted.mime_type(), Some("text/plain"));

        let parent = NativeFile::open(dir.path());
        let children = parent.list().unwrap();
        assert!(children.iter().any(|c| c.name() == "scenario.txt"));

        assert!(file.delete());
        assert!(!file.exists());
        assert!(!path.exists());
    }

    #[test]
    fn mkdirs_and_listing_order() {
        let dir = TempDir::new().unwrap();
        let mut nested = NativeFile::open(dir.path().join("a/b/c"));
        assert!(nested.mkdirs());
        assert!(nested.is_dir());
        // Already a directory: no-op success.
        assert!(nested.mkdirs());

        fs::write(dir.path().join("a/zz.txt"), b"x").unwrap();
        let a = NativeFile::open(dir.path().join("a"));
        let names: Vec<String> = a.list().unwrap().iter().map(|c| c.name()).collect();
        // Directories sort before files.
        assert_eq!(names, vec!["b", "zz.txt"]);
    }

    #[test]
    fn failed_move_preserves_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keep.txt");
        fs::write(&path, b"data").unwrap();

        let mut file = NativeFile::open(&path);
        assert!(!file.move_to(&dir.path().join("no/such/dir/keep.txt")));
        assert!(file.exists());
        assert_eq!(file.len(), 4);
    }

    #[test]
    fn move_invalidates_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("src.txt");
        fs::write(&path, b"data").unwrap();

        let mut file = NativeFile::open(&path);
        let target = dir.path().join("dst.txt");
        assert!(file.move_to(&target));
        assert!(!file.exists());
        assert!(target.exists());

        // rename_to is a plain move to a sibling path.
        let mut renamed = NativeFile::open(&target);
        let sibling = dir.path().join("renamed.txt");
        assert!(renamed.rename_to(&sibling));
        assert!(!renamed.exists());
        assert!(sibling.exists());
    }

    #[test]
    fn recursive_copy_preserves_contents() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("tree/sub")).unwrap();
        fs::write(dir.path().join("tree/f1.txt"), b"one").unwrap();
        fs::write(dir.path().join("tree/sub/f2.txt"), b"two").unwrap();

        let tree = NativeFile::open(dir.path().join("tree"));
        let target = dir.path().join("copy");
        assert!(tree.copy_to(&target));
        assert!(tree.exists());
        assert_eq!(fs::read(target.join("f1.txt")).unwrap(), b"one");
        assert_eq!(fs::read(target.join("sub/f2.txt")).unwrap(), b"two");
    }

    #[cfg(unix)]
    #[test]
    fn set_permissions_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mode.txt");
        fs::write(&path, b"x").unwrap();

        let mut file = NativeFile::open(&path);
        let target = Permissions::from_mode(0o640);
        assert!(file.set_permissions(target));
        assert_eq!(file.permissions(), Some(target));
        // Unchanged triple short-circuits.
        assert!(file.set_permissions(target));

        let reread = NativeFile::open(&path);
        assert_eq!(reread.permissions(), Some(target));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_flag_from_link_stat() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("real.txt");
        fs::write(&target, b"x").unwrap();
        let link = dir.path().join("link.txt");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let entry = NativeFile::open(&link);
        assert!(entry.is_symlink());
        assert!(entry.exists());
        assert_eq!(entry.len(), 1);
    }
}
