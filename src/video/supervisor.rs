//! Subprocess supervision for external video tools
//!
//! A [`ManagedProcess`] owns a spawned child through a monitor task. The
//! monitor waits for either process exit or cancellation of the session
//! token. Cancellation kills and reaps the child, and either way the token
//! ends up cancelled, so everything downstream sees one signal for "session over".

use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};

/// Program and arguments for a supervised process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Human-readable command line for logs
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// A running child process tied to a cancellation token
pub struct ManagedProcess {
    program: String,
    pid: Option<u32>,
    token: CancellationToken,
    monitor: Option<JoinHandle<()>>,
}

impl ManagedProcess {
    /// Spawn with stdout captured for the caller and stderr logged line by line.
    ///
    /// The session token is a child of `parent`, so cancelling the parent
    /// stops this process too.
    pub fn spawn_piped(
        spec: &ProcessSpec,
        parent: &CancellationToken,
    ) -> Result<(Self, ChildStdout)> {
        let mut child = Self::spawn_child(spec)?;
        let stdout = child.stdout.take().ok_or_else(|| AppError::SubprocessStartFailed {
            program: spec.program.clone(),
            reason: "stdout was not captured".to_string(),
        })?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_lines(spec.program.clone(), stderr));
        }
        Ok((Self::supervise(spec, child, parent), stdout))
    }

    /// Spawn with both stdout and stderr logged line by line.
    pub fn spawn_logged(spec: &ProcessSpec, parent: &CancellationToken) -> Result<Self> {
        let mut child = Self::spawn_child(spec)?;
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(log_lines(spec.program.clone(), stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_lines(spec.program.clone(), stderr));
        }
        Ok(Self::supervise(spec, child, parent))
    }

    fn spawn_child(spec: &ProcessSpec) -> Result<Child> {
        info!("Executing: {}", spec.command_line());

        Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::SubprocessStartFailed {
                program: spec.program.clone(),
                reason: e.to_string(),
            })
    }

    fn supervise(spec: &ProcessSpec, child: Child, parent: &CancellationToken) -> Self {
        let pid = child.id();
        let token = parent.child_token();
        let monitor = tokio::spawn(monitor(spec.program.clone(), child, token.clone()));
        debug!("{} started with PID {:?}", spec.program, pid);

        Self {
            program: spec.program.clone(),
            pid,
            token,
            monitor: Some(monitor),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Token cancelled when the process exits or is stopped
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Kill the process and wait for the monitor to reap it.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(monitor) = self.monitor.take() {
            if let Err(e) = monitor.await {
                warn!("{} monitor task failed: {}", self.program, e);
            }
        }
        info!("{} stopped", self.program);
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        // Monitor kills the child once it observes the cancellation
        self.token.cancel();
    }
}

async fn monitor(program: String, mut child: Child, token: CancellationToken) {
    tokio::select! {
        status = child.wait() => {
            match status {
                Ok(status) if status.success() => info!("{} exited", program),
                Ok(status) => {
                    let err = AppError::SubprocessExited {
                        program: program.clone(),
                        status: status.to_string(),
                    };
                    if token.is_cancelled() {
                        debug!("{}", err);
                    } else {
                        warn!("{}", err);
                    }
                }
                Err(e) => warn!("Failed to wait for {}: {}", program, e),
            }
        }
        _ = token.cancelled() => {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill {}: {}", program, e);
            }
        }
    }
    token.cancel();
}

/// Forward each line of a child's output stream to the log.
pub(crate) async fn log_lines<R>(program: String, reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => info!("[{}] {}", program, line),
            Ok(None) => break,
            Err(e) => {
                debug!("[{}] output stream error: {}", program, e);
                break;
            }
        }
    }
}
