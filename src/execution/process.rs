//! Process launching: request validation, stdio wiring, registration

use std::fs::File;
use std::os::fd::OwnedFd;
use std::process::{Command, Stdio};

use log::debug;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};

use crate::errors::{ProcError, Result};
use crate::execution::status::ChildProcess;
use crate::resources::{Resource, ResourceId, ResourceTable, StdStream};

/// What to connect one of the child's standard streams to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StdioRepr", into = "StdioRepr")]
pub enum StdioDirective {
    /// Share the caller's stream
    #[default]
    Inherit,
    /// Connect to the discard sink
    Null,
    /// Create a pipe and register the caller's end
    Piped,
    /// Attach a duplicate of a pipe end already in the table
    Resource(ResourceId),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StdioRepr {
    Keyword(String),
    Resource(ResourceId),
}

impl TryFrom<StdioRepr> for StdioDirective {
    type Error = String;

    fn try_from(repr: StdioRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            StdioRepr::Keyword(word) => match word.as_str() {
                "inherit" => Ok(StdioDirective::Inherit),
                "null" => Ok(StdioDirective::Null),
                "piped" => Ok(StdioDirective::Piped),
                other => Err(format!(
                    "unknown stdio directive {:?}, expected inherit, null, piped or a resource id",
                    other
                )),
            },
            StdioRepr::Resource(rid) => Ok(StdioDirective::Resource(rid)),
        }
    }
}

impl From<StdioDirective> for StdioRepr {
    fn from(directive: StdioDirective) -> Self {
        match directive {
            StdioDirective::Inherit => StdioRepr::Keyword("inherit".to_string()),
            StdioDirective::Null => StdioRepr::Keyword("null".to_string()),
            StdioDirective::Piped => StdioRepr::Keyword("piped".to_string()),
            StdioDirective::Resource(rid) => StdioRepr::Resource(rid),
        }
    }
}

/// Description of a process to start
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// Program followed by its arguments
    pub cmd: Vec<String>,
    /// Working directory, the caller's when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// `KEY=VALUE` entries replacing the inherited environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,
    #[serde(default)]
    pub stdin: StdioDirective,
    #[serde(default)]
    pub stdout: StdioDirective,
    #[serde(default)]
    pub stderr: StdioDirective,
}

impl RunRequest {
    pub fn new<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

/// Handles produced by a successful launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub process_handle: ResourceId,
    /// OS process id, for signaling
    pub pid: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin_handle: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout_handle: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_handle: Option<ResourceId>,
}

/// Split `KEY=VALUE` entries. Later duplicates override earlier ones when
/// applied to the command, in order.
pub(crate) fn parse_env(entries: &[String]) -> Result<Vec<(String, String)>> {
    entries
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(ProcError::InvalidArgument(format!(
                "env entry {:?} is not of the form KEY=VALUE",
                entry
            ))),
        })
        .collect()
}

fn stdio_for(table: &ResourceTable, directive: StdioDirective) -> Result<Stdio> {
    Ok(match directive {
        StdioDirective::Inherit => Stdio::inherit(),
        StdioDirective::Null => Stdio::null(),
        StdioDirective::Piped => Stdio::piped(),
        StdioDirective::Resource(rid) => Stdio::from(table.clone_pipe(rid)?),
    })
}

fn register_pipe<T>(table: &ResourceTable, stream: StdStream, end: Option<T>) -> Option<ResourceId>
where
    OwnedFd: From<T>,
{
    end.map(|end| table.add_pipe(stream, File::from(OwnedFd::from(end))))
}

/// Spawns children and registers them in a resource table
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    waiter_stack_size: Option<usize>,
}

impl ProcessLauncher {
    pub fn new(waiter_stack_size: Option<usize>) -> Self {
        Self { waiter_stack_size }
    }

    /// Start the process described by `req`.
    ///
    /// Nothing is registered unless the spawn succeeds; pipes created for a
    /// failed spawn are closed before returning.
    pub fn launch(&self, table: &ResourceTable, req: RunRequest) -> Result<RunResponse> {
        let (program, args) = req.cmd.split_first().ok_or_else(|| {
            ProcError::InvalidArgument("cmd must contain at least one element".to_string())
        })?;
        let env = req.env.as_deref().map(parse_env).transpose()?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(stdio_for(table, req.stdin)?)
            .stdout(stdio_for(table, req.stdout)?)
            .stderr(stdio_for(table, req.stderr)?);

        if let Some(cwd) = &req.cwd {
            command.current_dir(cwd);
        }
        if let Some(env) = env {
            command.env_clear().envs(env);
        }

        let mut child = command.spawn().map_err(|source| ProcError::SpawnFailed {
            program: program.clone(),
            source,
        })?;
        let pid = Pid::from_raw(child.id() as i32);

        let process = match ChildProcess::watch(pid, self.waiter_stack_size) {
            Ok(process) => process,
            Err(e) => {
                // No waiter means nobody would ever reap it
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcError::Io(e));
            }
        };

        let process_handle = table.add(Resource::Process(process));
        let response = RunResponse {
            process_handle,
            pid: pid.as_raw(),
            stdin_handle: register_pipe(table, StdStream::Stdin, child.stdin.take()),
            stdout_handle: register_pipe(table, StdStream::Stdout, child.stdout.take()),
            stderr_handle: register_pipe(table, StdStream::Stderr, child.stderr.take()),
        };

        debug!(
            "run {:?} pid={} rid={}",
            req.cmd, response.pid, response.process_handle
        );
        Ok(response)
    }
}
