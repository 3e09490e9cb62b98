//! Operation names, calling conventions and argument decoding

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::errors::{ProcError, Result};
use crate::execution::RunRequest;
use crate::resources::ResourceId;

/// How a caller receives an operation's result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// The result is ready when the call returns
    Sync,
    /// The call returns a future
    Async,
}

impl Convention {
    pub fn describe(&self) -> &'static str {
        match self {
            Convention::Sync => "synchronously",
            Convention::Async => "asynchronously",
        }
    }
}

/// The closed set of operations the façade routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Run,
    RunStatus,
    Kill,
    Close,
    ReadPipe,
    WritePipe,
}

impl OpKind {
    pub const ALL: [OpKind; 6] = [
        OpKind::Run,
        OpKind::RunStatus,
        OpKind::Kill,
        OpKind::Close,
        OpKind::ReadPipe,
        OpKind::WritePipe,
    ];

    /// Stable, case-sensitive operation name
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Run => "run",
            OpKind::RunStatus => "run_status",
            OpKind::Kill => "kill",
            OpKind::Close => "close",
            OpKind::ReadPipe => "read_pipe",
            OpKind::WritePipe => "write_pipe",
        }
    }

    pub fn convention(&self) -> Convention {
        match self {
            OpKind::RunStatus | OpKind::ReadPipe | OpKind::WritePipe => Convention::Async,
            OpKind::Run | OpKind::Kill | OpKind::Close => Convention::Sync,
        }
    }
}

/// A decoded operation with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Run(RunRequest),
    RunStatus { rid: ResourceId },
    Kill { pid: i32, signal: i32 },
    Close { rid: ResourceId },
    ReadPipe { rid: ResourceId },
    WritePipe { rid: ResourceId, data: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusArgs {
    #[serde(alias = "rid")]
    process_handle: ResourceId,
}

#[derive(Deserialize)]
struct KillArgs {
    pid: i32,
    signal: i32,
}

#[derive(Deserialize)]
struct HandleArgs {
    rid: ResourceId,
}

#[derive(Deserialize)]
struct WriteArgs {
    rid: ResourceId,
    data: String,
}

fn args<T: for<'de> Deserialize<'de>>(kind: OpKind, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        ProcError::InvalidArgument(format!("bad arguments for {}: {}", kind.name(), e))
    })
}

impl Op {
    pub fn kind(&self) -> OpKind {
        match self {
            Op::Run(_) => OpKind::Run,
            Op::RunStatus { .. } => OpKind::RunStatus,
            Op::Kill { .. } => OpKind::Kill,
            Op::Close { .. } => OpKind::Close,
            Op::ReadPipe { .. } => OpKind::ReadPipe,
            Op::WritePipe { .. } => OpKind::WritePipe,
        }
    }

    /// Decode JSON arguments into the typed operation for `kind`
    pub fn decode(kind: OpKind, value: Value) -> Result<Op> {
        Ok(match kind {
            OpKind::Run => Op::Run(args(kind, value)?),
            OpKind::RunStatus => {
                let StatusArgs { process_handle } = args(kind, value)?;
                Op::RunStatus {
                    rid: process_handle,
                }
            }
            OpKind::Kill => {
                let KillArgs { pid, signal } = args(kind, value)?;
                Op::Kill { pid, signal }
            }
            OpKind::Close => {
                let HandleArgs { rid } = args(kind, value)?;
                Op::Close { rid }
            }
            OpKind::ReadPipe => {
                let HandleArgs { rid } = args(kind, value)?;
                Op::ReadPipe { rid }
            }
            OpKind::WritePipe => {
                let WriteArgs { rid, data } = args(kind, value)?;
                Op::WritePipe { rid, data }
            }
        })
    }
}

/// Name → operation lookup, built once at startup and read-only afterwards
#[derive(Debug, Clone)]
pub struct OpRegistry {
    by_name: HashMap<&'static str, OpKind>,
}

impl Default for OpRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OpRegistry {
    pub fn new() -> Self {
        Self {
            by_name: OpKind::ALL.iter().map(|kind| (kind.name(), *kind)).collect(),
        }
    }

    pub fn lookup(&self, name: &str) -> Result<OpKind> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ProcError::UnknownOperation(name.to_string()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.by_name.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::StdioDirective;
    use serde_json::json;

    #[test]
    fn registry_knows_every_kind() {
        let registry = OpRegistry::new();
        for kind in OpKind::ALL {
            assert_eq!(registry.lookup(kind.name()).unwrap(), kind);
        }
        assert_eq!(
            registry.names(),
            vec!["close", "kill", "read_pipe", "run", "run_status", "write_pipe"]
        );
    }

    #[test]
    fn registry_is_case_sensitive() {
        let registry = OpRegistry::new();
        let err = registry.lookup("Run").unwrap_err();
        assert!(matches!(err, ProcError::UnknownOperation(name) if name == "Run"));
        assert!(registry.lookup("op_run").is_err());
    }

    #[test]
    fn conventions() {
        assert_eq!(OpKind::Run.convention(), Convention::Sync);
        assert_eq!(OpKind::Kill.convention(), Convention::Sync);
        assert_eq!(OpKind::Close.convention(), Convention::Sync);
        assert_eq!(OpKind::RunStatus.convention(), Convention::Async);
        assert_eq!(OpKind::ReadPipe.convention(), Convention::Async);
        assert_eq!(OpKind::WritePipe.convention(), Convention::Async);
    }

    #[test]
    fn decode_run() {
        let op = Op::decode(
            OpKind::Run,
            json!({ "cmd": ["echo", "hi"], "stdout": "piped" }),
        )
        .unwrap();
        match op {
            Op::Run(req) => {
                assert_eq!(req.cmd, vec!["echo", "hi"]);
                assert_eq!(req.stdout, StdioDirective::Piped);
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn decode_run_status_accepts_both_spellings() {
        let a = Op::decode(OpKind::RunStatus, json!({ "processHandle": 3 })).unwrap();
        let b = Op::decode(OpKind::RunStatus, json!({ "rid": 3 })).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.kind(), OpKind::RunStatus);
    }

    #[test]
    fn decode_kill_and_close() {
        assert_eq!(
            Op::decode(OpKind::Kill, json!({ "pid": 10, "signal": 15 })).unwrap(),
            Op::Kill { pid: 10, signal: 15 }
        );
        assert_eq!(
            Op::decode(OpKind::Close, json!({ "rid": 2 })).unwrap(),
            Op::Close {
                rid: ResourceId::from_raw(2)
            }
        );
    }

    #[test]
    fn decode_pipe_ops() {
        assert_eq!(
            Op::decode(OpKind::ReadPipe, json!({ "rid": 4 })).unwrap(),
            Op::ReadPipe {
                rid: ResourceId::from_raw(4)
            }
        );
        assert_eq!(
            Op::decode(OpKind::WritePipe, json!({ "rid": 5, "data": "abc" })).unwrap(),
            Op::WritePipe {
                rid: ResourceId::from_raw(5),
                data: "abc".to_string()
            }
        );
        assert!(Op::decode(OpKind::WritePipe, json!({ "rid": 5 })).is_err());
    }

    #[test]
    fn decode_rejects_malformed_arguments() {
        let err = Op::decode(OpKind::Kill, json!({ "pid": "ten" })).unwrap_err();
        assert!(matches!(err, ProcError::InvalidArgument(_)));
        assert!(err.to_string().contains("kill"));

        let err = Op::decode(OpKind::Run, json!({})).unwrap_err();
        assert!(matches!(err, ProcError::InvalidArgument(_)));
    }
}
