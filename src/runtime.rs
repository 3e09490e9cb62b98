//! Process-wide state with explicit init and teardown

use std::sync::Arc;

use log::{debug, warn};
use nix::sys::signal::Signal;

use crate::dispatch::{Dispatcher, OpRegistry};
use crate::errors::{ProcError, Result};
use crate::execution::{ProcessLauncher, signal};
use crate::resources::{Resource, ResourceTable};

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Signal children that are still running when the runtime shuts down
    pub kill_on_shutdown: bool,
    /// Signal number used by `kill_on_shutdown`
    pub shutdown_signal: i32,
    /// Stack size for status waiter threads, platform default when unset
    pub waiter_stack_size: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            kill_on_shutdown: false,
            shutdown_signal: Signal::SIGKILL as i32,
            waiter_stack_size: None,
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<()> {
        if signal::parse_signal(self.shutdown_signal)?.is_none() {
            return Err(ProcError::InvalidArgument(
                "shutdown signal cannot be 0".to_string(),
            ));
        }

        if let Some(size) = self.waiter_stack_size {
            if size < MIN_WAITER_STACK {
                return Err(ProcError::InvalidArgument(format!(
                    "waiter stack size must be at least {} bytes",
                    MIN_WAITER_STACK
                )));
            }
        }

        Ok(())
    }
}

const MIN_WAITER_STACK: usize = 16 * 1024;

/// Builder pattern for runtime creation
#[derive(Debug, Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal live children on shutdown
    pub fn kill_on_shutdown(mut self, enabled: bool) -> Self {
        self.config.kill_on_shutdown = enabled;
        self
    }

    pub fn shutdown_signal(mut self, signo: i32) -> Self {
        self.config.shutdown_signal = signo;
        self
    }

    pub fn waiter_stack_size(mut self, bytes: usize) -> Self {
        self.config.waiter_stack_size = Some(bytes);
        self
    }

    pub fn build(self) -> Result<Runtime> {
        Runtime::init(self.config)
    }
}

/// Summary of what [`Runtime::shutdown`] released
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Pipe ends closed
    pub pipes_closed: usize,
    /// Process handles released
    pub processes_released: usize,
    /// Live children that were signaled
    pub processes_signaled: usize,
}

/// Owns the operation registry and resource table, and the dispatcher built
/// on them. Create one at startup, hand out [`Runtime::dispatcher`], and call
/// [`Runtime::shutdown`] at the end.
pub struct Runtime {
    config: RuntimeConfig,
    table: Arc<ResourceTable>,
    dispatcher: Dispatcher,
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn init(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(OpRegistry::new());
        debug!("registered ops: {}", registry.names().join(", "));

        let table = Arc::new(ResourceTable::new());
        let dispatcher = Dispatcher::new(
            registry,
            Arc::clone(&table),
            ProcessLauncher::new(config.waiter_stack_size),
        );

        Ok(Self {
            config,
            table,
            dispatcher,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Release every resource still in the table
    pub fn shutdown(self) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        for (rid, resource) in self.table.drain() {
            match resource {
                Resource::Pipe { stream, .. } => {
                    debug!("closing {} pipe rid={}", stream.name(), rid);
                    report.pipes_closed += 1;
                }
                Resource::Process(child) => {
                    report.processes_released += 1;
                    if !self.config.kill_on_shutdown || child.is_finished() {
                        continue;
                    }
                    let pid = child.pid().as_raw();
                    match signal::send_signal(pid, self.config.shutdown_signal) {
                        Ok(true) => report.processes_signaled += 1,
                        Ok(false) => {}
                        Err(e) => warn!("failed to signal pid {} on shutdown: {}", pid, e),
                    }
                }
            }
        }

        debug!("runtime shut down: {:?}", report);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{ExitStatus, RunRequest, StdioDirective};
    use futures::executor::block_on;

    #[test]
    fn test_config_default() {
        let config = RuntimeConfig::default();
        assert!(!config.kill_on_shutdown);
        assert_eq!(config.shutdown_signal, 9);
        assert!(config.waiter_stack_size.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_sets_fields() {
        let runtime = Runtime::builder()
            .kill_on_shutdown(true)
            .shutdown_signal(15)
            .waiter_stack_size(64 * 1024)
            .build()
            .unwrap();

        assert!(runtime.config().kill_on_shutdown);
        assert_eq!(runtime.config().shutdown_signal, 15);
        assert_eq!(runtime.config().waiter_stack_size, Some(64 * 1024));
    }

    #[test]
    fn test_builder_rejects_bad_signal() {
        assert!(Runtime::builder().shutdown_signal(0).build().is_err());
        assert!(Runtime::builder().shutdown_signal(4096).build().is_err());
    }

    #[test]
    fn test_builder_rejects_tiny_stack() {
        let err = Runtime::builder().waiter_stack_size(512).build().err().unwrap();
        assert!(matches!(err, ProcError::InvalidArgument(_)));
    }

    #[test]
    fn shutdown_releases_everything() {
        let runtime = Runtime::builder().build().unwrap();
        let d = runtime.dispatcher();
        let response = d
            .run(RunRequest {
                stdout: StdioDirective::Piped,
                stderr: StdioDirective::Piped,
                ..RunRequest::new(["true"])
            })
            .unwrap();
        block_on(d.run_status(response.process_handle).unwrap()).unwrap();

        let report = runtime.shutdown();
        assert_eq!(report.pipes_closed, 2);
        assert_eq!(report.processes_released, 1);
        assert_eq!(report.processes_signaled, 0);
    }

    #[test]
    fn shutdown_kills_live_children_when_configured() {
        let runtime = Runtime::builder()
            .kill_on_shutdown(true)
            .shutdown_signal(Signal::SIGTERM as i32)
            .build()
            .unwrap();
        let response = runtime.dispatcher().run(RunRequest::new(["sleep", "30"])).unwrap();
        let status = runtime
            .dispatcher()
            .run_status(response.process_handle)
            .unwrap();

        let report = runtime.shutdown();
        assert_eq!(report.processes_signaled, 1);
        assert_eq!(
            block_on(status).unwrap(),
            ExitStatus::Signaled(Signal::SIGTERM as i32)
        );
    }

    #[test]
    fn shutdown_leaves_children_alone_by_default() {
        let runtime = Runtime::builder().build().unwrap();
        let response = runtime.dispatcher().run(RunRequest::new(["sleep", "30"])).unwrap();
        let pid = response.pid;

        let report = runtime.shutdown();
        assert_eq!(report.processes_signaled, 0);
        assert!(signal::send_signal(pid, Signal::SIGKILL as i32).unwrap());
    }
}
