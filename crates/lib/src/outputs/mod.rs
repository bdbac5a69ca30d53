//! Output store and reference resolution.
//!
//! The store is the only state shared between stacks. The orchestrator writes
//! each succeeded stack's outputs exactly once; downstream stacks resolve
//! their required inputs from it.

mod persist;
mod store;

pub(crate) use persist::temp_path;
pub use persist::{OutputSnapshot, OutputSnapshotError, StackOutputs};
pub use store::{OutputStore, OutputStoreError, ResolvedInputs, UnresolvedReferenceError};
