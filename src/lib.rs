//! proc-runner: child process lifecycle behind opaque handles
//!
//! Spawns processes, wires their standard streams to handles in a resource
//! table, resolves exit status off the caller's thread and delivers signals.
//!
//! # Modules
//!
//! - **resources**: Handle table for pipe ends and processes
//! - **execution**: Launching, status resolution and signaling
//! - **dispatch**: Named and typed operation routing (`run`, `run_status`, `kill`, `close`, pipe I/O)
//! - **runtime**: Process-wide state with explicit init/teardown
//!
//! # Example
//!
//! ```ignore
//! use proc_runner::{Runtime, RunRequest, StdioDirective};
//! use futures::executor::block_on;
//!
//! let runtime = Runtime::builder().kill_on_shutdown(true).build()?;
//! let d = runtime.dispatcher();
//!
//! let response = d.run(RunRequest {
//!     stdout: StdioDirective::Piped,
//!     ..RunRequest::new(["echo", "hi"])
//! })?;
//! let status = block_on(d.run_status(response.process_handle)?)?;
//! println!("{}", status);
//! runtime.shutdown();
//! ```

pub mod errors;

pub mod dispatch;
pub mod execution;
pub mod resources;
pub mod runtime;

// Public API
pub use dispatch::{Convention, Dispatcher, Op, OpKind, OpOutput, OpRegistry};
pub use errors::{ProcError, Result};
pub use execution::{ExitStatus, PipeOutput, ProcessLauncher, RunRequest, RunResponse, StdioDirective};
pub use resources::{ResourceId, ResourceTable};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig, ShutdownReport};
