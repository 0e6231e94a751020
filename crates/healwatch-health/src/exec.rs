//! Bounded shell-command execution shared by probes and recovery actions.
//!
//! The exit status of `sh` decides the outcome. Output is collected on the
//! side, so a backgrounded grandchild that inherits the pipes cannot hold
//! the call open. On timeout the whole process group is killed.

use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::debug;

/// Bytes kept per stream; the rest is read and dropped.
const MAX_CAPTURE_BYTES: usize = 64 * 1024;

/// How long to keep reading output after `sh` has exited.
const OUTPUT_GRACE: Duration = Duration::from_millis(100);

/// What to do with the command's stdout and stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Output {
    /// Capture both streams for the diagnostic.
    Capture,
    /// Send both streams to `/dev/null`.
    Discard,
}

/// How a shell command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CommandOutcome {
    Exited {
        success: bool,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    TimedOut,
    SpawnFailed(String),
}

impl CommandOutcome {
    pub(crate) fn succeeded(&self) -> bool {
        matches!(self, CommandOutcome::Exited { success: true, .. })
    }

    /// Short diagnostic: stderr, else stdout, else the exit status.
    pub(crate) fn diagnostic(&self) -> String {
        match self {
            CommandOutcome::Exited {
                code,
                stdout,
                stderr,
                ..
            } => {
                if !stderr.trim().is_empty() {
                    stderr.trim().to_string()
                } else if !stdout.trim().is_empty() {
                    stdout.trim().to_string()
                } else {
                    match code {
                        Some(code) => format!("exit status {code}"),
                        None => "terminated by signal".to_string(),
                    }
                }
            }
            CommandOutcome::TimedOut => "timeout".to_string(),
            CommandOutcome::SpawnFailed(e) => e.clone(),
        }
    }
}

/// Run `command` through `sh -c`, killing its process group if `timeout`
/// elapses before `sh` exits.
pub(crate) async fn run_shell(command: &str, timeout: Duration, output: Output) -> CommandOutcome {
    let stdio = || match output {
        Output::Capture => Stdio::piped(),
        Output::Discard => Stdio::null(),
    };

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(stdio())
        .stderr(stdio())
        .kill_on_drop(true);
    // Own process group, so a timeout can take out everything `sh` started.
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return CommandOutcome::SpawnFailed(format!("failed to spawn: {e}")),
    };

    let stdout = child.stdout.take().map(Capture::start);
    let stderr = child.stderr.take().map(Capture::start);

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => CommandOutcome::Exited {
            success: status.success(),
            code: status.code(),
            stdout: Capture::finish(stdout).await,
            stderr: Capture::finish(stderr).await,
        },
        Ok(Err(e)) => {
            kill_group(&mut child).await;
            CommandOutcome::SpawnFailed(e.to_string())
        }
        Err(_) => {
            debug!(%command, timeout_ms = timeout.as_millis() as u64, "command timed out");
            kill_group(&mut child).await;
            Capture::abort(stdout);
            Capture::abort(stderr);
            CommandOutcome::TimedOut
        }
    }
}

/// SIGKILL the child's process group, then reap the child.
async fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: kill(2) with a negative pid only signals that process
            // group, which `process_group(0)` created for this child.
            unsafe {
                libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
            }
        }
    }
    let _ = child.kill().await;
}

/// Background reader for one output stream.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl Capture {
    fn start<R>(mut pipe: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = buf.clone();
        let task = tokio::spawn(async move {
            let mut chunk = [0u8; 4096];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let mut out = sink.lock().unwrap_or_else(PoisonError::into_inner);
                        let room = MAX_CAPTURE_BYTES.saturating_sub(out.len());
                        out.extend_from_slice(&chunk[..n.min(room)]);
                    }
                }
            }
        });
        Self { buf, task }
    }

    /// Wait briefly for EOF, then return whatever was read.
    async fn finish(capture: Option<Self>) -> String {
        let Some(mut capture) = capture else {
            return String::new();
        };
        if tokio::time::timeout(OUTPUT_GRACE, &mut capture.task)
            .await
            .is_err()
        {
            // Something still holds the pipe open.
            capture.task.abort();
        }
        let bytes = capture.buf.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn abort(capture: Option<Self>) {
        if let Some(capture) = capture {
            capture.task.abort();
        }
    }
}
