//! Signal delivery

use log::debug;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use crate::errors::{ProcError, Result};
use crate::resources::ResourceTable;

/// Map a raw signal number. `0` only checks that the process exists and maps to `None`.
pub fn parse_signal(signo: i32) -> Result<Option<Signal>> {
    if signo == 0 {
        return Ok(None);
    }
    Signal::try_from(signo)
        .map(Some)
        .map_err(|_| ProcError::InvalidArgument(format!("unknown signal number {}", signo)))
}

fn target(pid: i32) -> Result<Pid> {
    // 0 and negative pids address process groups
    if pid <= 0 {
        return Err(ProcError::InvalidArgument(format!(
            "pid must be positive, got {}",
            pid
        )));
    }
    Ok(Pid::from_raw(pid))
}

/// Deliver `signo` to `pid`.
///
/// Returns `Ok(false)` when no such process exists, so signaling something
/// that already exited is a no-op report rather than an error.
pub fn send_signal(pid: i32, signo: i32) -> Result<bool> {
    let target = target(pid)?;
    let signal = parse_signal(signo)?;
    deliver(target, signal, signo)
}

fn deliver(pid: Pid, signal: Option<Signal>, signo: i32) -> Result<bool> {
    match kill(pid, signal) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(Errno::EPERM) => Err(ProcError::PermissionDenied(format!(
            "cannot send signal {} to pid {}: {}",
            signo,
            pid,
            Errno::EPERM.desc()
        ))),
        Err(e) => Err(ProcError::Syscall(format!(
            "kill({}, {}) failed: {}",
            pid, signo, e
        ))),
    }
}

/// Like [`send_signal`], but answers `false` without touching the OS when
/// `pid` belongs to a child in `table` that has already been reaped.
pub fn signal_process(table: &ResourceTable, pid: i32, signo: i32) -> Result<bool> {
    let target = target(pid)?;
    let signal = parse_signal(signo)?;

    if table.is_reaped_pid(pid) {
        debug!("kill pid={} skipped, already reaped", pid);
        return Ok(false);
    }

    debug!("kill pid={} signal={}", pid, signo);
    deliver(target, signal, signo)
}
