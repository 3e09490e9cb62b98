//! Exit status resolution
//!
//! Every child gets exactly one waiter thread, started at launch, which
//! performs the only `waitpid` for that pid. The outcome is published once and
//! fanned out through a shared future, so any number of status queries observe
//! the same value and queries after termination resolve immediately.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::thread;

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::debug;
use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};

use crate::errors::{ProcError, Result};
use crate::resources::{ResourceId, ResourceTable};

/// How a child terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Exited normally with this code
    Exited(i32),
    /// Terminated by this signal number
    Signaled(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Exited(0))
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Exited(code) => Some(*code),
            ExitStatus::Signaled(_) => None,
        }
    }

    pub fn signal(&self) -> Option<i32> {
        match self {
            ExitStatus::Signaled(signal) => Some(*signal),
            ExitStatus::Exited(_) => None,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "exited with code {}", code),
            ExitStatus::Signaled(signal) => write!(f, "killed by signal {}", signal),
        }
    }
}

/// Waiter result. The error side is a message so the value stays `Clone`
/// and can be handed to every subscriber.
type WaitOutcome = std::result::Result<ExitStatus, String>;

/// Deferred exit status returned by [`resolve_status`]
pub type StatusFuture = BoxFuture<'static, Result<ExitStatus>>;

/// A spawned child tracked by the resource table
pub struct ChildProcess {
    pid: Pid,
    reaped: Arc<OnceLock<WaitOutcome>>,
    wait: Shared<BoxFuture<'static, WaitOutcome>>,
}

impl fmt::Debug for ChildProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildProcess")
            .field("pid", &self.pid)
            .field("reaped", &self.reaped.get())
            .finish()
    }
}

impl ChildProcess {
    /// Start the waiter thread for `pid`. The caller must be the parent of
    /// `pid` and must not wait on it anywhere else.
    pub fn watch(pid: Pid, stack_size: Option<usize>) -> std::io::Result<Self> {
        let (tx, rx) = oneshot::channel();
        let reaped = Arc::new(OnceLock::new());
        let slot = Arc::clone(&reaped);

        let mut builder = thread::Builder::new().name(format!("proc-wait-{}", pid));
        if let Some(size) = stack_size {
            builder = builder.stack_size(size);
        }

        builder.spawn(move || {
            let outcome = wait_for_exit(pid).map_err(|e| e.to_string());
            debug!("pid {} reaped: {:?}", pid, outcome);
            let _ = slot.set(outcome.clone());
            // Nobody listening is fine, the slot keeps the value
            let _ = tx.send(outcome);
        })?;

        let wait = rx
            .map(|received| {
                received.unwrap_or_else(|_| Err("status waiter exited without reporting".to_string()))
            })
            .boxed()
            .shared();

        Ok(Self { pid, reaped, wait })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Whether the waiter has reaped the child
    pub fn is_finished(&self) -> bool {
        self.reaped.get().is_some()
    }

    /// Cached status, if the child has been reaped successfully
    pub fn status(&self) -> Option<ExitStatus> {
        self.reaped.get().and_then(|outcome| outcome.as_ref().ok().copied())
    }

    fn subscribe(&self) -> StatusFuture {
        self.wait
            .clone()
            .map(|outcome| outcome.map_err(ProcError::Syscall))
            .boxed()
    }
}

/// Wait for a child and decode its termination
pub(crate) fn wait_for_exit(pid: Pid) -> Result<ExitStatus> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(ExitStatus::Exited(code)),
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                return Ok(ExitStatus::Signaled(signal as i32));
            }
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(ProcError::Syscall(format!("waitpid failed: {}", e))),
        }
    }
}

/// Deferred exit status of the process registered under `rid`.
///
/// Fails immediately for unknown, closed or non-process handles. The returned
/// future never blocks the calling thread; it completes when the waiter
/// publishes, or at once if it already has.
pub fn resolve_status(table: &ResourceTable, rid: ResourceId) -> Result<StatusFuture> {
    table.with_process(rid, |child| {
        debug!("run status rid={} pid={}", rid, child.pid());
        child.subscribe()
    })
}

/// Non-blocking peek at the cached status
pub fn try_status(table: &ResourceTable, rid: ResourceId) -> Result<Option<ExitStatus>> {
    table.with_process(rid, |child| child.status())
}
