//! Deadline-bounded supervision of one container invocation.
//!
//! A supervised run moves through [`SupervisorState`]:
//! `Created -> Running -> Completed` when the runtime client exits first, or
//! `Created -> Running -> TimedOut` when the deadline fires. The only
//! suspension point is the race between those two events.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SupervisorError;
use crate::runtime::ContainerRuntime;

const TARGET: &str = "quire_sandbox::supervisor";

const READ_CHUNK: usize = 4096;

/// Upper bound on the time a forced kill may take to settle.
pub const MAX_KILL_GRACE: Duration = Duration::from_secs(24 * 60 * 60);

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

/// Lifecycle of a supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// The command has been prepared but not started.
    Created,
    /// The runtime client is running.
    Running,
    /// The runtime client exited before the deadline.
    Completed,
    /// The deadline passed and the container was killed.
    TimedOut,
}

/// How a supervised run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The runtime client exited on its own.
    Completed {
        /// Exit code, absent when the client was ended by a signal.
        exit_code: Option<i32>,
    },
    /// The deadline passed first.
    TimedOut,
}

/// Captured result of a supervised run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisedRun {
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Bytes written to standard output before the run ended.
    pub stdout: Vec<u8>,
    /// Bytes written to standard error before the run ended.
    pub stderr: Vec<u8>,
    /// Time from spawn to return.
    pub elapsed: Duration,
}

/// Runs one container at a time under a deadline.
#[derive(Debug, Clone)]
pub struct Supervisor {
    runtime: ContainerRuntime,
    deadline: Duration,
    kill_grace: Duration,
}

impl Supervisor {
    /// Creates a supervisor killing containers through `runtime`.
    #[must_use]
    pub const fn new(runtime: ContainerRuntime, deadline: Duration, kill_grace: Duration) -> Self {
        Self {
            runtime,
            deadline,
            kill_grace,
        }
    }

    /// Starts `command` and supervises it until it exits or the deadline
    /// passes, in which case `container` is killed by name.
    ///
    /// A non-zero exit is reported in the outcome, not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Spawn`] when the runtime client cannot be
    /// started and [`SupervisorError::Wait`] when waiting on it fails.
    pub async fn run(
        &self,
        container: &str,
        mut command: Command,
    ) -> Result<SupervisedRun, SupervisorError> {
        debug!(target: TARGET, container, state = ?SupervisorState::Created, "prepared container run");

        let started = Instant::now();
        let mut child = command.spawn().map_err(|source| SupervisorError::Spawn {
            program: PathBuf::from(command.as_std().get_program()),
            source: Arc::new(source),
        })?;
        info!(
            target: TARGET,
            container,
            pid = child.id(),
            deadline_ms = millis(self.deadline),
            state = ?SupervisorState::Running,
            "container started"
        );

        let stdout_buf = SharedBuffer::default();
        let stderr_buf = SharedBuffer::default();
        let readers = [
            child
                .stdout
                .take()
                .map(|stream| spawn_reader(stream, Arc::clone(&stdout_buf))),
            child
                .stderr
                .take()
                .map(|stream| spawn_reader(stream, Arc::clone(&stderr_buf))),
        ];

        let token = CancellationToken::new();
        let timer = {
            let token = token.clone();
            let deadline = self.deadline;
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                token.cancel();
            })
        };

        let outcome = tokio::select! {
            status = child.wait() => {
                timer.abort();
                let status = status.map_err(|source| SupervisorError::Wait {
                    source: Arc::new(source),
                })?;
                info!(
                    target: TARGET,
                    container,
                    exit_code = status.code(),
                    state = ?SupervisorState::Completed,
                    "container exited"
                );
                RunOutcome::Completed { exit_code: status.code() }
            }
            () = token.cancelled() => {
                warn!(
                    target: TARGET,
                    container,
                    deadline_ms = millis(self.deadline),
                    state = ?SupervisorState::TimedOut,
                    "deadline passed; killing container"
                );
                RunOutcome::TimedOut
            }
        };

        let settle_by = settle_deadline(Instant::now(), self.kill_grace);
        if outcome == RunOutcome::TimedOut {
            self.force_stop(container, &mut child, settle_by).await;
        }
        join_readers(readers, settle_by).await;

        let stdout = std::mem::take(&mut *stdout_buf.lock().await);
        let stderr = std::mem::take(&mut *stderr_buf.lock().await);
        let elapsed = started.elapsed();
        debug!(
            target: TARGET,
            container,
            stdout = %String::from_utf8_lossy(&stdout),
            stderr = %String::from_utf8_lossy(&stderr),
            elapsed_ms = millis(elapsed),
            "captured container output"
        );

        Ok(SupervisedRun {
            outcome,
            stdout,
            stderr,
            elapsed,
        })
    }

    /// Kills the container by name, then the local client if it outlives the
    /// grace period.
    async fn force_stop(&self, container: &str, child: &mut Child, settle_by: Instant) {
        match self.runtime.kill_command(container).spawn() {
            Ok(mut kill) => match tokio::time::timeout_at(settle_by, kill.wait()).await {
                Ok(Ok(status)) => {
                    debug!(target: TARGET, container, exit_code = status.code(), "kill issued");
                }
                Ok(Err(error)) => {
                    warn!(target: TARGET, container, %error, "kill command failed");
                }
                Err(_) => {
                    warn!(target: TARGET, container, "kill command did not finish within grace");
                }
            },
            Err(error) => {
                warn!(target: TARGET, container, %error, "failed to start kill command");
            }
        }

        if tokio::time::timeout_at(settle_by, child.wait()).await.is_ok() {
            return;
        }
        warn!(target: TARGET, container, "runtime client outlived kill grace; terminating it");
        if let Err(error) = child.start_kill() {
            warn!(target: TARGET, container, %error, "failed to terminate runtime client");
        }
    }
}

/// `now + grace`, capped at [`MAX_KILL_GRACE`] so an oversized grace cannot
/// overflow the clock.
fn settle_deadline(now: Instant, grace: Duration) -> Instant {
    now.checked_add(grace.min(MAX_KILL_GRACE)).unwrap_or(now)
}

fn spawn_reader<R>(mut stream: R, buffer: SharedBuffer) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = vec![0_u8; READ_CHUNK];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(read) => {
                    if let Some(bytes) = chunk.get(..read) {
                        buffer.lock().await.extend_from_slice(bytes);
                    }
                }
            }
        }
    })
}

/// Waits for the reader tasks, abandoning any still blocked at `settle_by`.
async fn join_readers(readers: [Option<JoinHandle<()>>; 2], settle_by: Instant) {
    for mut reader in readers.into_iter().flatten() {
        if tokio::time::timeout_at(settle_by, &mut reader).await.is_err() {
            debug!(target: TARGET, "output reader still open at grace expiry; abandoning it");
            reader.abort();
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
