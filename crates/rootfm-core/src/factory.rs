//! Backend selection.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use rootfm_native::NativeFile;
use rootfm_platform::FsEntry;
use rootfm_shell::{Commands, Session, ShellFile, ShellSession};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Native,
    Shell,
}

/// Pure selection function: the shell backend is used only when configured
/// and a shell session can actually be established.
pub fn select_backend(use_shell_backend: bool, shell_available: bool) -> Backend {
    if use_shell_backend && shell_available {
        Backend::Shell
    } else {
        Backend::Native
    }
}

/// Hands out file entries of the appropriate variant. Owns the process-wide
/// shell session; entries share it by `Arc`.
pub struct FileFactory {
    config: Config,
    session: Arc<ShellSession>,
}

impl FileFactory {
    pub fn new(config: Config) -> Self {
        let session = Arc::new(ShellSession::new(
            config.privileged_shell.clone(),
            config.fallback_shell.clone(),
        ));
        Self { config, session }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Arc<ShellSession> {
        &self.session
    }

    fn commands(&self) -> Commands {
        Commands::new(self.config.helper_binary.clone(), self.config.show_hidden)
    }

    pub fn backend(&self) -> Backend {
        // Availability is only probed when the shell backend is wanted, so a
        // native-only configuration never spawns a shell.
        let available = self.config.use_shell_backend && self.session.is_available();
        select_backend(self.config.use_shell_backend, available)
    }

    pub fn open(&self, path: impl AsRef<Path>) -> Box<dyn FsEntry> {
        let path = path.as_ref();
        match self.backend() {
            Backend::Shell => {
                debug!("opening {} via shell backend", path.display());
                let session: Arc<dyn Session> = self.session.clone();
                Box::new(ShellFile::open(session, self.commands(), path))
            }
            Backend::Native => {
                debug!("opening {} via native backend", path.display());
                Box::new(NativeFile::open(path))
            }
        }
    }

    /// Existence probe: the shell's `test -e` when a session is in use,
    /// a plain stat otherwise.
    pub fn probe_exists(&self, path: &Path) -> bool {
        match self.backend() {
            Backend::Shell => {
                rootfm_shell::probe_exists(self.session.as_ref(), &self.commands(), path)
            }
            Backend::Native => path.exists(),
        }
    }

    /// Filesystem type of the mount holding `path`; shell-only probe, `None`
    /// whenever the native backend is selected.
    pub fn filesystem_type(&self, path: &Path) -> Option<String> {
        if self.backend() != Backend::Shell {
            return None;
        }
        rootfm_shell::filesystem_type(self.session.as_ref(), &self.commands(), path)
    }
}
