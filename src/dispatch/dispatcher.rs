//! Routing from operations to the execution layer

use std::fs::File;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::dispatch::ops::{Convention, Op, OpRegistry};
use crate::errors::{ProcError, Result};
use crate::execution::{
    self, ExitStatus, PipeFuture, PipeOutput, ProcessLauncher, RunRequest, RunResponse,
    StatusFuture,
};
use crate::resources::{ResourceId, ResourceTable};

/// Result of dispatching one operation
pub enum OpOutput {
    /// Already resolved
    Sync(Result<Value>),
    /// Resolves later, off the caller's thread
    Async(BoxFuture<'static, Result<Value>>),
}

/// A result that cannot be encoded is our fault, not the caller's
fn to_value<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| ProcError::Io(e.into()))
}

fn deferred<T>(started: Result<BoxFuture<'static, Result<T>>>) -> OpOutput
where
    T: Serialize + Send + 'static,
{
    OpOutput::Async(match started {
        Ok(fut) => fut.map(|result| result.and_then(to_value)).boxed(),
        Err(e) => future::ready(Err(e)).boxed(),
    })
}

/// The façade: every operation enters here, by name or already typed
pub struct Dispatcher {
    registry: Arc<OpRegistry>,
    table: Arc<ResourceTable>,
    launcher: ProcessLauncher,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<OpRegistry>,
        table: Arc<ResourceTable>,
        launcher: ProcessLauncher,
    ) -> Self {
        Self {
            registry,
            table,
            launcher,
        }
    }

    pub fn registry(&self) -> &OpRegistry {
        &self.registry
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.table
    }

    /// Run one typed operation under its own calling convention
    pub fn dispatch(&self, op: Op) -> OpOutput {
        debug!("{}", op.kind().name());
        match op {
            Op::Run(req) => OpOutput::Sync(self.run(req).and_then(to_value)),
            Op::RunStatus { rid } => deferred(self.run_status(rid)),
            Op::Kill { pid, signal } => OpOutput::Sync(self.kill(pid, signal).and_then(to_value)),
            Op::Close { rid } => OpOutput::Sync(self.close(rid).map(|()| Value::Null)),
            Op::ReadPipe { rid } => deferred(self.read_pipe(rid)),
            Op::WritePipe { rid, data } => deferred(self.write_pipe(rid, data)),
        }
    }

    /// Look up `name`, check it is used with `convention` and decode its arguments
    fn decode(&self, name: &str, args: Value, convention: Convention) -> Result<Op> {
        let kind = self.registry.lookup(name)?;
        if kind.convention() != convention {
            return Err(ProcError::ConventionMismatch {
                op: kind.name(),
                expected: kind.convention().describe(),
            });
        }
        Op::decode(kind, args)
    }

    /// Blocking convention, for `run`, `kill` and `close`
    pub fn send_sync(&self, name: &str, args: Value) -> Result<Value> {
        let op = self.decode(name, args, Convention::Sync)?;
        let kind = op.kind();
        match self.dispatch(op) {
            OpOutput::Sync(result) => result,
            OpOutput::Async(_) => Err(ProcError::ConventionMismatch {
                op: kind.name(),
                expected: Convention::Async.describe(),
            }),
        }
    }

    /// Future convention, for `run_status`, `read_pipe` and `write_pipe`
    pub fn send(&self, name: &str, args: Value) -> BoxFuture<'static, Result<Value>> {
        let op = match self.decode(name, args, Convention::Async) {
            Ok(op) => op,
            Err(e) => return future::ready(Err(e)).boxed(),
        };
        match self.dispatch(op) {
            OpOutput::Async(fut) => fut,
            OpOutput::Sync(result) => future::ready(result).boxed(),
        }
    }

    pub fn run(&self, req: RunRequest) -> Result<RunResponse> {
        self.launcher.launch(&self.table, req)
    }

    pub fn run_status(&self, rid: ResourceId) -> Result<StatusFuture> {
        execution::resolve_status(&self.table, rid)
    }

    pub fn try_status(&self, rid: ResourceId) -> Result<Option<ExitStatus>> {
        execution::try_status(&self.table, rid)
    }

    pub fn kill(&self, pid: i32, signal: i32) -> Result<bool> {
        execution::signal_process(&self.table, pid, signal)
    }

    pub fn close(&self, rid: ResourceId) -> Result<()> {
        self.table.close(rid)
    }

    /// Claim the caller's end of a piped stream
    pub fn take_pipe(&self, rid: ResourceId) -> Result<File> {
        self.table.take_pipe(rid)
    }

    pub fn read_pipe(&self, rid: ResourceId) -> Result<PipeFuture<PipeOutput>> {
        execution::read_pipe(&self.table, rid)
    }

    pub fn write_pipe(&self, rid: ResourceId, data: String) -> Result<PipeFuture<usize>> {
        execution::write_pipe(&self.table, rid, data)
    }
}
