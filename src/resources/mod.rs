//! Resource layer: the handle table shared by every operation
//!
//! Pipe ends and spawned children are registered here and referred to by
//! opaque integer ids, so callers never see raw descriptors or pids where a
//! handle is expected.

pub mod table;

pub use table::{Resource, ResourceId, ResourceTable, StdStream};
