//! Pipe transfers off the caller's thread
//!
//! Both directions take the pipe end out of the table and hand it to a
//! short-lived worker thread, so a child blocked on a full or empty pipe never
//! blocks whoever asked for the transfer.

use std::io::{Read, Write};
use std::thread;

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{ProcError, Result};
use crate::resources::{ResourceId, ResourceTable, StdStream};

/// Everything read from an output pipe up to end of file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeOutput {
    pub bytes: usize,
    /// Contents with invalid UTF-8 replaced
    pub data: String,
}

pub type PipeFuture<T> = BoxFuture<'static, Result<T>>;

fn transfer<T, F>(name: String, work: F) -> Result<PipeFuture<T>>
where
    T: Send + 'static,
    F: FnOnce() -> std::io::Result<T> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    thread::Builder::new().name(name).spawn(move || {
        let _ = tx.send(work());
    })?;

    Ok(rx
        .map(|received| match received {
            Ok(result) => result.map_err(ProcError::Io),
            Err(_) => Err(ProcError::Syscall(
                "pipe worker exited without reporting".to_string(),
            )),
        })
        .boxed())
}

/// Drain the stdout or stderr pipe registered under `rid` until the child
/// closes it. The handle leaves the table.
pub fn read_pipe(table: &ResourceTable, rid: ResourceId) -> Result<PipeFuture<PipeOutput>> {
    let mut file = table.take_stream(rid, &[StdStream::Stdout, StdStream::Stderr])?;
    debug!("read pipe rid={}", rid);

    transfer(format!("pipe-read-{}", rid), move || {
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(PipeOutput {
            bytes: buf.len(),
            data: String::from_utf8_lossy(&buf).into_owned(),
        })
    })
}

/// Write `data` to the stdin pipe registered under `rid`, then close it so
/// the child sees end of file. Resolves to the number of bytes written.
pub fn write_pipe(table: &ResourceTable, rid: ResourceId, data: String) -> Result<PipeFuture<usize>> {
    let mut file = table.take_stream(rid, &[StdStream::Stdin])?;
    debug!("write pipe rid={} bytes={}", rid, data.len());

    transfer(format!("pipe-write-{}", rid), move || {
        file.write_all(data.as_bytes())?;
        Ok(data.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{ExitStatus, ProcessLauncher, RunRequest, StdioDirective, resolve_status};
    use futures::executor::block_on;

    #[test]
    fn read_drains_more_than_a_pipe_buffer() {
        let table = ResourceTable::new();
        let response = ProcessLauncher::default()
            .launch(
                &table,
                RunRequest {
                    stdout: StdioDirective::Piped,
                    ..RunRequest::new(["head", "-c", "200000", "/dev/zero"])
                },
            )
            .unwrap();

        let reading = read_pipe(&table, response.stdout_handle.unwrap()).unwrap();
        let status = resolve_status(&table, response.process_handle).unwrap();

        assert_eq!(block_on(reading).unwrap().bytes, 200_000);
        assert_eq!(block_on(status).unwrap(), ExitStatus::Exited(0));
    }

    #[test]
    fn write_then_read_through_cat() {
        let table = ResourceTable::new();
        let response = ProcessLauncher::default()
            .launch(
                &table,
                RunRequest {
                    stdin: StdioDirective::Piped,
                    stdout: StdioDirective::Piped,
                    ..RunRequest::new(["cat"])
                },
            )
            .unwrap();

        let written = write_pipe(&table, response.stdin_handle.unwrap(), "hello\n".to_string()).unwrap();
        assert_eq!(block_on(written).unwrap(), 6);

        let out = block_on(read_pipe(&table, response.stdout_handle.unwrap()).unwrap()).unwrap();
        assert_eq!(out.data, "hello\n");
        assert!(block_on(resolve_status(&table, response.process_handle).unwrap())
            .unwrap()
            .success());
    }

    #[test]
    fn direction_is_checked() {
        let table = ResourceTable::new();
        let response = ProcessLauncher::default()
            .launch(
                &table,
                RunRequest {
                    stdin: StdioDirective::Piped,
                    stdout: StdioDirective::Piped,
                    ..RunRequest::new(["cat"])
                },
            )
            .unwrap();
        let stdin = response.stdin_handle.unwrap();
        let stdout = response.stdout_handle.unwrap();

        assert!(matches!(read_pipe(&table, stdin), Err(ProcError::InvalidHandle(_))));
        assert!(matches!(
            write_pipe(&table, stdout, String::new()),
            Err(ProcError::InvalidHandle(_))
        ));
        assert!(matches!(
            read_pipe(&table, response.process_handle),
            Err(ProcError::InvalidHandle(_))
        ));

        table.close(stdin).unwrap();
        block_on(read_pipe(&table, stdout).unwrap()).unwrap();
        block_on(resolve_status(&table, response.process_handle).unwrap()).unwrap();
    }
}
