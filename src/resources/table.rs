//! Handle table mapping opaque ids to pipe ends and child processes

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::errors::{ProcError, Result};
use crate::execution::status::ChildProcess;

/// Opaque handle naming one entry of a [`ResourceTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(u32);

impl ResourceId {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which standard stream of the child a pipe end is connected to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Stdin,
    Stdout,
    Stderr,
}

impl StdStream {
    pub fn name(&self) -> &'static str {
        match self {
            StdStream::Stdin => "stdin",
            StdStream::Stdout => "stdout",
            StdStream::Stderr => "stderr",
        }
    }
}

/// Entry stored in the table
#[derive(Debug)]
pub enum Resource {
    /// Caller-side end of a pipe connected to a child
    Pipe { stream: StdStream, file: File },
    /// A spawned child and its status waiter
    Process(ChildProcess),
}

impl Resource {
    fn describe(&self) -> &'static str {
        match self {
            Resource::Pipe { .. } => "pipe",
            Resource::Process(_) => "process",
        }
    }
}

/// Shared table of live resources.
///
/// All access goes through one lock; ids come from a monotonically increasing
/// counter and are never handed out twice.
#[derive(Debug)]
pub struct ResourceTable {
    entries: Mutex<HashMap<u32, Resource>>,
    next_id: AtomicU32,
}

impl Default for ResourceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceTable {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<u32, Resource>> {
        self.entries
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Register a resource under a fresh id
    pub fn add(&self, resource: Resource) -> ResourceId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries().insert(id, resource);
        ResourceId(id)
    }

    pub fn add_pipe(&self, stream: StdStream, file: File) -> ResourceId {
        self.add(Resource::Pipe { stream, file })
    }

    pub fn contains(&self, rid: ResourceId) -> bool {
        self.entries().contains_key(&rid.0)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Remove and return a resource of any kind
    pub fn remove(&self, rid: ResourceId) -> Result<Resource> {
        self.entries()
            .remove(&rid.0)
            .ok_or_else(|| unknown_handle(rid))
    }

    /// Release a resource. Dropping a pipe end closes it; dropping a process
    /// entry leaves the child running and its waiter still reaps it.
    pub fn close(&self, rid: ResourceId) -> Result<()> {
        self.remove(rid).map(drop)
    }

    /// Hand a pipe end over to the caller. The entry leaves the table.
    pub fn take_pipe(&self, rid: ResourceId) -> Result<File> {
        self.take_stream(rid, &[StdStream::Stdin, StdStream::Stdout, StdStream::Stderr])
    }

    /// Like [`ResourceTable::take_pipe`], but only for pipes connected to one
    /// of `streams`. Anything else stays in the table.
    pub fn take_stream(&self, rid: ResourceId, streams: &[StdStream]) -> Result<File> {
        let mut entries = self.entries();
        match entries.get(&rid.0) {
            Some(Resource::Pipe { stream, .. }) if streams.contains(stream) => {}
            Some(Resource::Pipe { stream, .. }) => {
                return Err(ProcError::InvalidHandle(format!(
                    "resource {} is the {} pipe",
                    rid,
                    stream.name()
                )));
            }
            Some(other) => return Err(wrong_kind(rid, "pipe", other)),
            None => return Err(unknown_handle(rid)),
        }
        match entries.remove(&rid.0) {
            Some(Resource::Pipe { file, .. }) => Ok(file),
            _ => Err(unknown_handle(rid)),
        }
    }

    /// Duplicate the descriptor behind a pipe end, leaving the entry in place
    pub fn clone_pipe(&self, rid: ResourceId) -> Result<File> {
        match self.entries().get(&rid.0) {
            Some(Resource::Pipe { file, .. }) => Ok(file.try_clone()?),
            Some(other) => Err(wrong_kind(rid, "pipe", other)),
            None => Err(unknown_handle(rid)),
        }
    }

    /// Run `f` against the process registered under `rid`
    pub fn with_process<T>(&self, rid: ResourceId, f: impl FnOnce(&ChildProcess) -> T) -> Result<T> {
        match self.entries().get(&rid.0) {
            Some(Resource::Process(child)) => Ok(f(child)),
            Some(other) => Err(wrong_kind(rid, "process", other)),
            None => Err(unknown_handle(rid)),
        }
    }

    /// Whether a tracked process with this pid has already been reaped
    pub fn is_reaped_pid(&self, pid: i32) -> bool {
        self.entries().values().any(|resource| match resource {
            Resource::Process(child) => child.pid().as_raw() == pid && child.is_finished(),
            Resource::Pipe { .. } => false,
        })
    }

    /// Empty the table, returning everything it held
    pub fn drain(&self) -> Vec<(ResourceId, Resource)> {
        let mut drained: Vec<_> = self
            .entries()
            .drain()
            .map(|(id, resource)| (ResourceId(id), resource))
            .collect();
        drained.sort_by_key(|(id, _)| *id);
        drained
    }
}

fn unknown_handle(rid: ResourceId) -> ProcError {
    ProcError::InvalidHandle(format!("resource {} does not exist or was closed", rid))
}

fn wrong_kind(rid: ResourceId, expected: &str, found: &Resource) -> ProcError {
    ProcError::InvalidHandle(format!(
        "resource {} is a {}, expected a {}",
        rid,
        found.describe(),
        expected
    ))
}
