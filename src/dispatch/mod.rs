//! Dispatch layer: the externally visible operation surface
//!
//! Operations are a closed set ([`OpKind`]). Callers either hand over a typed
//! [`Op`] or a name plus JSON arguments; both paths end in the same
//! [`Dispatcher::dispatch`] core, which answers synchronously or with a future
//! depending on the operation.
//!
//! | Operation    | Convention | Arguments          |
//! |--------------|------------|--------------------|
//! | `run`        | sync       | `RunRequest`       |
//! | `run_status` | async      | `{processHandle}`  |
//! | `kill`       | sync       | `{pid, signal}`    |
//! | `close`      | sync       | `{rid}`            |
//! | `read_pipe`  | async      | `{rid}`            |
//! | `write_pipe` | async      | `{rid, data}`      |

pub mod dispatcher;
pub mod ops;

pub use dispatcher::{Dispatcher, OpOutput};
pub use ops::{Convention, Op, OpKind, OpRegistry};
