//! The shell-backed file entry.
//!
//! Every inspection and mutation goes command line -> session -> listing
//! parser. The entry keeps an immutable metadata snapshot; successful
//! mutations swap the whole snapshot (from a fresh `ls -d` line, or to the
//! absent state after delete/move), failed ones leave it untouched.

use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::Arc;

use tracing::debug;

use rootfm_platform::entry::sort_entries;
use rootfm_platform::{FsEntry, Permissions};

use crate::cmdline::Commands;
use crate::listing::{self, ListingRecord};
use crate::session::Session;

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

impl EntryState {
    fn absent() -> Self {
        Self::default()
    }

    fn from_record(record: &ListingRecord) -> Self {
        Self {
            exists: true,
            is_dir: record.is_dir,
            is_symlink: record.is_symlink,
            permissions: Some(record.permissions),
            size: record.size,
            modified: record.modified,
            owner: record.owner,
            group: record.group,
        }
    }

    /// The root directory is never parsed from listing output; its metadata
    /// is fixed and its existence assumed.
    fn root() -> Self {
        Self {
            exists: true,
            is_dir: true,
            is_symlink: false,
            permissions: Permissions::from_symbolic("drwxr-xr-x"),
            size: 0,
            modified: 0,
            owner: 0,
            group: 0,
        }
    }
}

pub struct ShellFile {
    session: Arc<dyn Session>,
    commands: Commands,
    path: PathBuf,
    state: EntryState,
}

impl ShellFile {
    /// Open an entry, taking its initial snapshot through the session. A
    /// path the shell cannot list starts in the "does not exist" state.
    pub fn open(session: Arc<dyn Session>, commands: Commands, path: impl Into<PathBuf>) -> Self {
        let path = normalize(path.into());
        let state = if is_root(&path) {
            EntryState::root()
        } else {
            stat(session.as_ref(), &commands, &path)
        };
        Self {
            session,
            commands,
            path,
            state,
        }
    }

    fn from_record(
        session: Arc<dyn Session>,
        commands: Commands,
        parent: &Path,
        record: ListingRecord,
    ) -> Self {
        let state = EntryState::from_record(&record);
        Self {
            session,
            commands,
            path: parent.join(&record.name),
            state,
        }
    }

    fn is_root(&self) -> bool {
        is_root(&self.path)
    }

    fn path_str(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Re-stat and swap the snapshot; keeps the prior state when the fresh
    /// listing is unavailable.
    fn adopt_fresh(&mut self) -> bool {
        let fresh = stat(self.session.as_ref(), &self.commands, &self.path);
        if fresh.exists {
            self.state = fresh;
            true
        } else {
            false
        }
    }
}

fn normalize(path: PathBuf) -> PathBuf {
    let s = path.to_string_lossy();
    if s.len() > 1 && s.ends_with(MAIN_SEPARATOR) {
        PathBuf::from(s.trim_end_matches(MAIN_SEPARATOR))
    } else {
        path
    }
}

fn is_root(path: &Path) -> bool {
    path.parent().is_none()
}

fn stat(session: &dyn Session, commands: &Commands, path: &Path) -> EntryState {
    let command = commands.list_entry(&path.to_string_lossy());
    match session.execute_for_output(&command) {
        Some(lines) => lines
            .iter()
            .find_map(|line| listing::parse_line(line))
            .map(|record| EntryState::from_record(&record))
            .unwrap_or_else(EntryState::absent),
        None => EntryState::absent(),
    }
}

/// `stat -f` probe: the filesystem type token (`vfat`, `ext4`, ...) for the
/// mount holding `path`.
pub fn filesystem_type(session: &dyn Session, commands: &Commands, path: &Path) -> Option<String> {
    let command = commands.fs_type(&path.to_string_lossy());
    session
        .execute_for_output(&command)?
        .into_iter()
        .map(|l| l.trim().to_string())
        .find(|l| !l.is_empty())
}

/// `test -e` probe: cheap existence check without parsing a listing.
pub fn probe_exists(session: &dyn Session, commands: &Commands, path: &Path) -> bool {
    let command = commands.exists_probe(&path.to_string_lossy());
    session
        .execute_for_output(&command)
        .map(|lines| lines.iter().any(|l| l.trim() == "exists"))
        .unwrap_or(false)
}

impl FsEntry for ShellFile {
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
        if !self.state.is_dir {
            return None;
        }
        let command = self.commands.list_dir(&self.path_str());
        let lines = self.session.execute_for_output(&command)?;
        let mut children: Vec<Box<dyn FsEntry>> = Vec::new();
        for line in &lines {
            match listing::parse_line(line) {
                Some(record) => children.push(Box::new(Self::from_record(
                    self.session.clone(),
                    self.commands.clone(),
                    &self.path,
                    record,
                ))),
                None => debug!("skipping unparsable listing line: {}", line),
            }
        }
        sort_entries(&mut children);
        Some(children)
    }

    fn create_new_file(&mut self) -> bool {
        if self.state.exists {
            return false;
        }
        if !self.session.execute(&self.commands.touch(&self.path_str())) {
            return false;
        }
        self.adopt_fresh() && !self.state.is_dir
    }

    fn mkdir(&mut self) -> bool {
        if self.state.exists {
            return false;
        }
        if !self
            .session
            .execute(&self.commands.mkdir(&self.path_str(), false))
        {
            return false;
        }
        self.adopt_fresh() && self.state.is_dir
    }

    fn mkdirs(&mut self) -> bool {
        if self.state.is_dir {
            return true;
        }
        if !self
            .session
            .execute(&self.commands.mkdir(&self.path_str(), true))
        {
            return false;
        }
        if !probe_exists(self.session.as_ref(), &self.commands, &self.path) {
            return false;
        }
        self.adopt_fresh() && self.state.is_dir
    }

    fn delete(&mut self) -> bool {
        if self.is_root() {
            return false;
        }
        if self.session.execute(&self.commands.remove(&self.path_str())) {
            self.state = EntryState::absent();
            true
        } else {
            false
        }
    }

    fn copy_to(&self, target: &Path) -> bool {
        self.session
            .execute(&self.commands.copy(&self.path_str(), &target.to_string_lossy()))
    }

    fn move_to(&mut self, target: &Path) -> bool {
        if self.is_root() {
            return false;
        }
        if self
            .session
            .execute(&self.commands.r#move(&self.path_str(), &target.to_string_lossy()))
        {
            // The source entry is invalidated; open the target for the new
            // location.
            self.state = EntryState::absent();
            true
        } else {
            false
        }
    }

    fn set_permissions(&mut self, perms: Permissions) -> bool {
        if self.state.permissions == Some(perms) {
            return true;
        }
        if !self.state.exists {
            return false;
        }
        if self
            .session
            .execute(&self.commands.chmod(&perms.octal_string(), &self.path_str()))
        {
            self.state.permissions = Some(perms);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted session: maps exact command lines to canned results and
    /// records everything executed.
    #[derive(Default)]
    struct FakeSession {
        ok: Mutex<HashMap<String, Vec<String>>>,
        fail: Mutex<Vec<String>>,
        log: Mutex<Vec<String>>,
    }

    impl FakeSession {
        fn ok(self, command: &str, output: &[&str]) -> Self {
            self.ok
                .lock()
                .unwrap()
                .insert(command.into(), output.iter().map(|s| s.to_string()).collect());
            self
        }

        fn failing(self, command: &str) -> Self {
            self.fail.lock().unwrap().push(command.into());
            self
        }

        fn executed(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl Session for FakeSession {
        fn execute(&self, line: &str) -> bool {
            self.execute_for_output(line).is_some()
        }

        fn execute_for_output(&self, line: &str) -> Option<Vec<String>> {
            self.log.lock().unwrap().push(line.to_string());
            if self.fail.lock().unwrap().iter().any(|c| c == line) {
                return None;
            }
            let ok = self.ok.lock().unwrap();
            match ok.get(line) {
                Some(output) => Some(output.clone()),
                None => panic!("unscripted command: {line}"),
            }
        }

        fn is_privileged(&self) -> bool {
            true
        }
    }

    fn cmds() -> Commands {
        Commands::new(None, false)
    }

    const JPG_LINE: &str = "-rw-r--r-- 1 1000 1000 4 Jan 1 00:00 2020 test1.jpg";

    fn open_jpg(session: FakeSession) -> ShellFile {
        let session = session.ok("ls -l -n -p -e -d /sdcard/test1.jpg", &[JPG_LINE]);
        ShellFile::open(Arc::new(session), cmds(), "/sdcard/test1.jpg")
    }

    #[test]
    fn open_populates_snapshot_from_listing() {
        let file = open_jpg(FakeSession::default());
        assert!(file.exists());
        assert!(!file.is_dir());
        assert_eq!(file.len(), 4);
        assert_eq!(file.owner(), 1000);
        assert_eq!(file.group(), 1000);
        assert_eq!(file.permissions().unwrap().octal_string(), "644");
        assert_eq!(file.mime_type(), Some("image/jpeg"));
    }

    #[test]
    fn unlistable_path_starts_absent() {
        let session = FakeSession::default().failing("ls -l -n -p -e -d /data/hidden");
        let file = ShellFile::open(Arc::new(session), cmds(), "/data/hidden");
        assert!(!file.exists());
        assert_eq!(file.len(), 0);
        assert!(file.permissions().is_none());
        assert!(!file.is_dir());
        assert!(!file.is_symlink());
    }

    #[test]
    fn root_never_touches_the_session() {
        // Any session call would panic as unscripted.
        let file = ShellFile::open(Arc::new(FakeSession::default()), cmds(), "/");
        assert!(file.exists());
        assert!(file.is_dir());
        assert_eq!(file.permissions().unwrap().to_string(), "rwxr-xr-x");
        assert_eq!(file.owner(), 0);
    }

    #[test]
    fn failed_move_preserves_state() {
        let mut file = open_jpg(FakeSession::default().failing("mv -f /sdcard/test1.jpg /sdcard/gone.jpg"));
        assert!(!file.move_to(Path::new("/sdcard/gone.jpg")));
        assert!(file.exists());
        assert_eq!(file.len(), 4);
        assert_eq!(file.permissions().unwrap().octal_string(), "644");
    }

    #[test]
    fn successful_move_invalidates_source() {
        let mut file = open_jpg(FakeSession::default().ok("mv -f /sdcard/test1.jpg /sdcard/new.jpg", &[]));
        assert!(file.move_to(Path::new("/sdcard/new.jpg")));
        assert!(!file.exists());
        assert_eq!(file.len(), 0);
        assert!(file.permissions().is_none());
    }

    #[test]
    fn copy_leaves_source_intact() {
        let file = open_jpg(FakeSession::default().ok("cp -rfp /sdcard/test1.jpg /backup/test1.jpg", &[]));
        assert!(file.copy_to(Path::new("/backup/test1.jpg")));
        assert!(file.exists());
        assert_eq!(file.len(), 4);
    }

    #[test]
    fn delete_transitions_to_absent() {
        let mut file = open_jpg(FakeSession::default().ok("rm -rf /sdcard/test1.jpg", &[]));
        assert!(file.delete());
        assert!(!file.exists());
        assert_eq!(file.len(), 0);
        assert!(file.permissions().is_none());
    }

    #[test]
    fn create_on_existing_entry_is_a_no_op_failure() {
        // No touch command is scripted; issuing one would panic.
        let mut file = open_jpg(FakeSession::default());
        assert!(!file.create_new_file());
        assert!(file.exists());
    }

    #[test]
    fn create_new_file_refreshes_from_echoed_listing() {
        let session = FakeSession::default()
            .failing("ls -l -n -p -e -d /sdcard/new.txt")
            .ok("touch /sdcard/new.txt", &[]);
        let session = Arc::new(session);
        let mut file = ShellFile::open(session.clone(), cmds(), "/sdcard/new.txt");
        assert!(!file.exists());

        // After touch succeeds, the re-list returns the fresh line.
        session.fail.lock().unwrap().clear();
        session.ok.lock().unwrap().insert(
            "ls -l -n -p -e -d /sdcard/new.txt".into(),
            vec!["-rw-rw-rw- 1 0 0 0 Aug 9 12:30 2025 new.txt".into()],
        );
        assert!(file.create_new_file());
        assert!(file.exists());
        assert!(!file.is_dir());
        assert_eq!(file.len(), 0);
        assert_eq!(file.owner(), 0);
    }

    #[test]
    fn mkdirs_probes_then_relists() {
        let session = FakeSession::default()
            .failing("ls -l -n -p -e -d /sdcard/a/b")
            .ok("mkdir -p /sdcard/a/b", &[])
            .ok("test -e /sdcard/a/b && echo exists", &["exists"]);
        let session = Arc::new(session);
        let mut dir = ShellFile::open(session.clone(), cmds(), "/sdcard/a/b");

        session.fail.lock().unwrap().clear();
        session.ok.lock().unwrap().insert(
            "ls -l -n -p -e -d /sdcard/a/b".into(),
            vec!["drwxrwxrwx 2 0 0 4096 Aug 9 12:30 2025 b/".into()],
        );
        assert!(dir.mkdirs());
        assert!(dir.is_dir());
    }

    #[test]
    fn set_permissions_noop_when_unchanged() {
        let file = open_jpg(FakeSession::default());
        let mut file = file;
        let same = Permissions::from_symbolic("-rw-r--r--").unwrap();
        // No chmod command is scripted; a round-trip would panic.
        assert!(file.set_permissions(same));
    }

    #[test]
    fn set_permissions_adopts_only_on_success() {
        let target = Permissions::from_symbolic("-rw-------").unwrap();
        let mut file = open_jpg(FakeSession::default().failing("chmod 600 /sdcard/test1.jpg"));
        assert!(!file.set_permissions(target));
        assert_eq!(file.permissions().unwrap().octal_string(), "644");

        let mut file = open_jpg(FakeSession::default().ok("chmod 600 /sdcard/test1.jpg", &[]));
        assert!(file.set_permissions(target));
        assert_eq!(file.permissions().unwrap().octal_string(), "600");
    }

    #[test]
    fn list_skips_warning_lines_and_sorts() {
        let session = FakeSession::default()
            .ok(
                "ls -l -n -p -e -d /sdcard",
                &["drwxrwx--x 4 1000 1000 4096 Aug 9 12:30 2025 /sdcard/"],
            )
            .ok(
                "ls -l -n -p -e /sdcard/",
                &[
                    "-rw-r--r-- 1 1000 1000 4 Jan 1 00:00 2020 zz.txt",
                    "ls: ./secret: Permission denied",
                    "drwxrwx--x 2 1000 1000 4096 Jan 1 00:00 2020 DCIM/",
                    "-rw-r--r-- 1 1000 1000 9 Jan 1 00:00 2020 a space name.bin",
                ],
            );
        let dir = ShellFile::open(Arc::new(session), cmds(), "/sdcard");
        let children = dir.list().unwrap();
        let names: Vec<String> = children.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["DCIM", "a space name.bin", "zz.txt"]);
        assert!(children[0].is_dir());
        assert_eq!(children[0].path(), Path::new("/sdcard/DCIM"));

        let dirs_only = dir.list_filtered(&|c| c.is_dir()).unwrap();
        assert_eq!(dirs_only.len(), 1);
        assert_eq!(dirs_only[0].name(), "DCIM");
    }

    #[test]
    fn list_unavailable_when_command_fails() {
        let session = FakeSession::default()
            .ok(
                "ls -l -n -p -e -d /data",
                &["drwxrwx--x 4 0 0 4096 Aug 9 12:30 2025 /data/"],
            )
            .failing("ls -l -n -p -e /data/");
        let dir = ShellFile::open(Arc::new(session), cmds(), "/data");
        assert!(dir.list().is_none());
    }

    #[test]
    fn probes() {
        let session = FakeSession::default()
            .ok("stat -f -c \"%T\" /sdcard", &["vfat"])
            .ok("test -e /sdcard/x && echo exists", &["exists"])
            .failing("test -e /sdcard/y && echo exists");
        assert_eq!(
            filesystem_type(&session, &cmds(), Path::new("/sdcard")),
            Some("vfat".to_string())
        );
        assert!(probe_exists(&session, &cmds(), Path::new("/sdcard/x")));
        assert!(!probe_exists(&session, &cmds(), Path::new("/sdcard/y")));
        assert_eq!(session.executed().len(), 3);
    }
}
