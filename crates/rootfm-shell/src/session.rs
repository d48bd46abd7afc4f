//! Persistent interactive shell session with serialized command dispatch.
//!
//! One shell process lives for the whole application: the privileged shell
//! is preferred, the unprivileged one is the fallback. Every command is
//! funneled through a single dispatch lock, so at most one command is in
//! flight system-wide; the submitting thread blocks on the command object
//! until the shell reports completion. A dead shell is detected on the next
//! submission and a fresh session is established transparently.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

/// Sentinel echoed after every command so the reader knows where one
/// command's output ends and what its exit status was.
const END_MARKER: &str = "::rootfm:done::";

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("failed to spawn shell `{shell}`: {source}")]
    Spawn {
        shell: String,
        source: std::io::Error,
    },
    #[error("shell `{shell}` exited during handshake")]
    Handshake { shell: String },
    #[error("no usable shell available")]
    Unavailable,
}

/// Outcome of one dispatched command.
#[derive(Debug)]
pub struct CommandResult {
    pub success: bool,
    pub output: Vec<String>,
}

enum CommandPhase {
    Running,
    Finished(i32),
    /// The waiter abandoned the command; output is discarded when the shell
    /// eventually finishes it.
    Terminated,
}

struct CommandState {
    output: Vec<String>,
    phase: CommandPhase,
}

/// One command submitted to the session. The submitting thread blocks in
/// [`ShellCommand::wait`]; any other holder of the `Arc` may call
/// [`ShellCommand::terminate`] to release the waiter early.
pub struct ShellCommand {
    line: String,
    state: Mutex<CommandState>,
    done: Condvar,
}

impl ShellCommand {
    pub fn new(line: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            line: line.into(),
            state: Mutex::new(CommandState {
                output: Vec::new(),
                phase: CommandPhase::Running,
            }),
            done: Condvar::new(),
        })
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    /// Abandon the command: the waiter returns failure immediately. The
    /// shell process may still be mid-command; the session drains its output
    /// up to the end marker so the next command starts clean.
    pub fn terminate(&self) {
        let mut state = self.state.lock().unwrap();
        if matches!(state.phase, CommandPhase::Running) {
            state.phase = CommandPhase::Terminated;
            self.done.notify_all();
        }
    }

    fn complete(&self, exit_code: i32, output: Vec<String>) {
        let mut state = self.state.lock().unwrap();
        match state.phase {
            CommandPhase::Running => {
                state.output = output;
                state.phase = CommandPhase::Finished(exit_code);
                self.done.notify_all();
            }
            // Waiter is gone; the result is dropped on the floor.
            CommandPhase::Terminated => {
                debug!("discarding output of terminated command: {}", self.line);
            }
            CommandPhase::Finished(_) => {}
        }
    }

    fn wait(&self) -> CommandResult {
        let mut state = self.state.lock().unwrap();
        loop {
            match state.phase {
                CommandPhase::Running => state = self.done.wait(state).unwrap(),
                CommandPhase::Finished(code) => {
                    return CommandResult {
                        success: code == 0,
                        output: std::mem::take(&mut state.output),
                    };
                }
                CommandPhase::Terminated => {
                    return CommandResult {
                        success: false,
                        output: Vec::new(),
                    };
                }
            }
        }
    }
}

/// The seam the shell-backed entry talks through, so tests can substitute a
/// scripted fake for the real process.
pub trait Session: Send + Sync {
    /// Run a command; `true` when the shell reports exit status 0.
    fn execute(&self, line: &str) -> bool;

    /// Run a command and collect its stdout lines. `None` when no session
    /// could be established or the command failed.
    fn execute_for_output(&self, line: &str) -> Option<Vec<String>>;

    fn is_privileged(&self) -> bool;
}

struct Worker {
    tx: Sender<Arc<ShellCommand>>,
    dead: Arc<AtomicBool>,
    privileged: bool,
}

/// The process-wide shell session. Construct once, share via `Arc`.
pub struct ShellSession {
    privileged_shell: String,
    fallback_shell: String,
    /// Serializes submission: held from submit until the command completes.
    dispatch: Mutex<()>,
    worker: Mutex<Option<Worker>>,
}

impl ShellSession {
    pub fn new(privileged_shell: impl Into<String>, fallback_shell: impl Into<String>) -> Self {
        Self {
            privileged_shell: privileged_shell.into(),
            fallback_shell: fallback_shell.into(),
            dispatch: Mutex::new(()),
            worker: Mutex::new(None),
        }
    }

    /// Whether a shell session can be (or already is) established.
    pub fn is_available(&self) -> bool {
        let mut worker = self.worker.lock().unwrap();
        self.ensure_worker(&mut worker)
    }

    pub fn is_privileged(&self) -> bool {
        self.worker
            .lock()
            .unwrap()
            .as_ref()
            .map(|w| w.privileged)
            .unwrap_or(false)
    }

    /// Tear the session down; the next submission starts a fresh shell.
    pub fn close(&self) {
        if self.worker.lock().unwrap().take().is_some() {
            info!("shell session closed");
        }
    }

    /// Submit a command and block until it completes. Holding the `Arc`
    /// elsewhere allows `terminate()` during the wait.
    pub fn run(&self, command: &Arc<ShellCommand>) -> CommandResult {
        let _in_flight = self.dispatch.lock().unwrap();
        if !self.send(command) {
            return CommandResult {
                success: false,
                output: Vec::new(),
            };
        }
        command.wait()
    }

    fn send(&self, command: &Arc<ShellCommand>) -> bool {
        let mut worker = self.worker.lock().unwrap();
        for _ in 0..2 {
            if !self.ensure_worker(&mut worker) {
                return false;
            }
            match worker.as_ref() {
                Some(w) => {
                    if w.tx.send(command.clone()).is_ok() {
                        return true;
                    }
                    // Worker thread is gone; retry once with a fresh shell.
                    *worker = None;
                }
                None => return false,
            }
        }
        false
    }

    fn ensure_worker(&self, worker: &mut Option<Worker>) -> bool {
        let dead = worker
            .as_ref()
            .map(|w| w.dead.load(Ordering::SeqCst))
            .unwrap_or(true);
        if !dead {
            return true;
        }
        *worker = match self.spawn_worker() {
            Ok(w) => Some(w),
            Err(e) => {
                warn!("shell session unavailable: {}", e);
                None
            }
        };
        worker.is_some()
    }

    fn spawn_worker(&self) -> Result<Worker, ShellError> {
        let (spawned, privileged) = match SpawnedShell::start(&self.privileged_shell) {
            Ok(s) => (s, true),
            Err(e) => {
                debug!(
                    "privileged shell `{}` unavailable ({}); falling back to `{}`",
                    self.privileged_shell, e, self.fallback_shell
                );
                (SpawnedShell::start(&self.fallback_shell)?, false)
            }
        };

        let (tx, rx) = mpsc::channel::<Arc<ShellCommand>>();
        let dead = Arc::new(AtomicBool::new(false));
        let worker_dead = dead.clone();
        thread::Builder::new()
            .name("rootfm-shell".into())
            .spawn(move || spawned.serve(rx, worker_dead))
            .map_err(|source| ShellError::Spawn {
                shell: "worker thread".into(),
                source,
            })?;

        info!(
            "shell session started: {} (privileged={})",
            if privileged {
                &self.privileged_shell
            } else {
                &self.fallback_shell
            },
            privileged
        );
        Ok(Worker {
            tx,
            dead,
            privileged,
        })
    }
}

impl Session for ShellSession {
    fn execute(&self, line: &str) -> bool {
        let command = ShellCommand::new(line);
        self.run(&command).success
    }

    fn execute_for_output(&self, line: &str) -> Option<Vec<String>> {
        let command = ShellCommand::new(line);
        let result = self.run(&command);
        if result.success {
            Some(result.output)
        } else {
            None
        }
    }

    fn is_privileged(&self) -> bool {
        ShellSession::is_privileged(self)
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        self.close();
    }
}

struct SpawnedShell {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
}

impl SpawnedShell {
    /// Spawn the shell and handshake: it must echo the end marker back
    /// before we hand it to the worker thread.
    fn start(shell: &str) -> Result<Self, ShellError> {
        let mut child = Command::new(shell)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ShellError::Spawn {
                shell: shell.to_string(),
                source,
            })?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let mut spawned = Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
        };

        if spawned.write_command(&format!("echo {END_MARKER} 0")).is_err()
            || spawned.read_to_marker(&mut Vec::new()).is_none()
        {
            spawned.kill();
            return Err(ShellError::Handshake {
                shell: shell.to_string(),
            });
        }
        Ok(spawned)
    }

    fn write_command(&mut self, line: &str) -> std::io::Result<()> {
        writeln!(self.stdin, "{line}")?;
        self.stdin.flush()
    }

    /// Read lines into `output` until the end marker; returns the exit code,
    /// or `None` when the shell died.
    fn read_to_marker(&mut self, output: &mut Vec<String>) -> Option<i32> {
        loop {
            let mut buf = String::new();
            match self.reader.read_line(&mut buf) {
                Ok(0) => return None,
                Ok(_) => {
                    let line = buf.trim_end_matches(['\r', '\n']);
                    if let Some(rest) = line.strip_prefix(END_MARKER) {
                        return Some(rest.trim().parse().unwrap_or(-1));
                    }
                    output.push(line.to_string());
                }
                Err(e) => {
                    warn!("shell read failed: {}", e);
                    return None;
                }
            }
        }
    }

    /// Worker loop: one command at a time off the channel. After the shell
    /// dies every queued command fails fast instead of hanging its waiter.
    fn serve(mut self, rx: Receiver<Arc<ShellCommand>>, dead: Arc<AtomicBool>) {
        for command in rx.iter() {
            if dead.load(Ordering::SeqCst) {
                command.complete(-1, Vec::new());
                continue;
            }

            let submit = self
                .write_command(command.line())
                .and_then(|_| self.write_command(&format!("echo \"{END_MARKER} $?\"")));
            if submit.is_err() {
                self.mark_dead(&dead);
                command.complete(-1, Vec::new());
                continue;
            }

            let mut output = Vec::new();
            match self.read_to_marker(&mut output) {
                Some(code) => command.complete(code, output),
                None => {
                    self.mark_dead(&dead);
                    command.complete(-1, Vec::new());
                }
            }
        }
        // Session dropped or replaced.
        self.kill();
    }

    fn mark_dead(&mut self, dead: &AtomicBool) {
        warn!("shell process exited; session marked dead");
        dead.store(true, Ordering::SeqCst);
        self.kill();
    }

    fn kill(&mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            let pid = Pid::from_raw(self.child.id() as i32);
            let _ = kill(pid, Signal::SIGTERM);
            thread::sleep(Duration::from_millis(50));
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
