//! Storage traits and backends.
//!
//! The traits define the abstract interface for the graph and conflict
//! stores. The in-memory backend lives in [`memory`].

pub mod memory;
mod traits;

pub use memory::{InMemoryConflictStore, InMemoryGraphStore, InMemoryStores};
pub use traits::{ConflictStore, GraphStore, StorageError};
