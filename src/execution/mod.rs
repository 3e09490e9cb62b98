//! Execution layer: process lifecycle management
//!
//! This module owns spawn → monitor → signal → reap for child processes.
//!
//! # Features
//!
//! - **Launching**: argv/cwd/env forwarding and per-stream stdio wiring
//! - **Status**: one waiter thread per child, shared and cached exit status
//! - **Signals**: synchronous delivery with "already gone" reported as `false`
//! - **Pipes**: draining output and feeding input on worker threads
//!
//! # Examples
//!
//! ```ignore
//! use proc_runner::execution::{ProcessLauncher, RunRequest, StdioDirective};
//!
//! let req = RunRequest {
//!     stdout: StdioDirective::Piped,
//!     ..RunRequest::new(["echo", "hi"])
//! };
//! let response = ProcessLauncher::default().launch(&table, req)?;
//! ```

pub mod pipe;
pub mod process;
pub mod signal;
pub mod status;

pub use pipe::{PipeFuture, PipeOutput, read_pipe, write_pipe};
pub use process::{ProcessLauncher, RunRequest, RunResponse, StdioDirective};
pub use signal::{send_signal, signal_process};
pub use status::{ExitStatus, StatusFuture, resolve_status, try_status};
