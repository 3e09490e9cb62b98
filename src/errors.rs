//! Error types for process operations

use std::io;
use thiserror::Error;

/// Result type for process operations
pub type Result<T> = std::result::Result<T, ProcError>;

/// Errors that can occur while launching, waiting on or signaling processes
#[derive(Error, Debug)]
pub enum ProcError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Operation {op} must be called {expected}")]
    ConventionMismatch {
        op: &'static str,
        expected: &'static str,
    },

    #[error("Syscall error: {0}")]
    Syscall(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ProcError {
    /// Stable variant name, used when errors cross a serialization boundary
    pub fn kind(&self) -> &'static str {
        match self {
            ProcError::InvalidArgument(_) => "InvalidArgument",
            ProcError::SpawnFailed { .. } => "SpawnFailed",
            ProcError::InvalidHandle(_) => "InvalidHandle",
            ProcError::PermissionDenied(_) => "PermissionDenied",
            ProcError::UnknownOperation(_) => "UnknownOperation",
            ProcError::ConventionMismatch { .. } => "ConventionMismatch",
            ProcError::Syscall(_) => "Syscall",
            ProcError::Io(_) => "Io",
        }
    }

    /// Whether the caller sent a malformed request, as opposed to the OS
    /// rejecting a well-formed one. Contract violations are never worth retrying.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ProcError::InvalidArgument(_)
                | ProcError::InvalidHandle(_)
                | ProcError::UnknownOperation(_)
                | ProcError::ConventionMismatch { .. }
        )
    }
}
