//! Child process handle for the external feed program.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::SniffwaveError;

pub struct FeedProcess {
    program: String,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_task: Option<JoinHandle<()>>,
}

impl FeedProcess {
    /// Start `program args...` with piped output. Stderr lines are forwarded
    /// to the log as warnings.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, SniffwaveError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SniffwaveError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SniffwaveError::MissingStdout {
                program: program.to_string(),
            })?;

        let stderr_task = child.stderr.take().map(|stderr| {
            let program = program.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("{}: {}", program, line);
                }
            })
        });

        Ok(Self {
            program: program.to_string(),
            child,
            stdout: BufReader::new(stdout),
            stderr_task,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Read one raw line (newline included) into `buf`. Returns 0 at EOF.
    pub async fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<usize, SniffwaveError> {
        self.stdout
            .read_until(b'\n', buf)
            .await
            .map_err(|source| SniffwaveError::Read {
                program: self.program.clone(),
                source,
            })
    }

    /// Wait for the program to exit on its own.
    pub async fn wait(&mut self) -> Result<ExitStatus, SniffwaveError> {
        self.child.wait().await.map_err(|source| SniffwaveError::Wait {
            program: self.program.clone(),
            source,
        })
    }

    /// Ask the program to terminate, and kill it if it is still running
    /// after `grace`.
    pub async fn terminate(mut self, grace: Duration) -> Result<ExitStatus, SniffwaveError> {
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }

        if let Some(status) = self.child.try_wait().map_err(|source| SniffwaveError::Wait {
            program: self.program.clone(),
            source,
        })? {
            return Ok(status);
        }

        self.request_termination();
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => self.wait_result(status),
            Err(_) => {
                warn!(
                    "{} still running {:?} after termination request, killing it",
                    self.program, grace
                );
                if let Err(e) = self.child.start_kill() {
                    debug!("Failed to kill {}: {}", self.program, e);
                }
                let status = self.child.wait().await;
                self.wait_result(status)
            }
        }
    }

    fn wait_result(&self, status: std::io::Result<ExitStatus>) -> Result<ExitStatus, SniffwaveError> {
        status.map_err(|source| SniffwaveError::Wait {
            program: self.program.clone(),
            source,
        })
    }

    #[cfg(unix)]
    fn request_termination(&mut self) {
        let Some(pid) = self.child.id() else {
            return;
        };
        // SAFETY: `pid` belongs to a child we spawned and have not reaped yet.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            debug!(
                "Failed to send SIGTERM to {} ({}): {}",
                self.program,
                pid,
                std::io::Error::last_os_error()
            );
        }
    }

    #[cfg(not(unix))]
    fn request_termination(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!("Failed to stop {}: {}", self.program, e);
        }
    }
}
