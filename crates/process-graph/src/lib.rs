//! Process Graph - Versioned workflow definitions and live execution trees
//!
//! This crate provides the data model the instance migrator works against:
//!
//! - Named, versioned process graphs of typed, nested nodes
//! - Execution trees of named pointers, each resting on one node
//! - Nested sub-process executions owned by process-state pointers
//! - A thread-safe versioned graph store with optional JSON persistence
//!
//! # Example
//!
//! ```ignore
//! use process_graph::{GraphBuilder, GraphRepository, GraphStore};
//!
//! let store = GraphStore::new();
//! store.deploy(GraphBuilder::new("order").start("start").state("A").build())?;
//! let latest = store.find_latest_graph("order")?;
//! let execution = latest.create_execution();
//! ```

pub mod builder;
pub mod error;
pub mod execution;
pub mod store;
pub mod types;

// Re-export key types
pub use builder::GraphBuilder;
pub use error::{GraphError, Result};
pub use execution::{
    join_path, ExecutionId, ExecutionPointer, ProcessExecution, SuperPointer, Variables,
    ROOT_POINTER_NAME,
};
pub use store::{GraphMetadata, GraphRepository, GraphStore};
pub use types::{GraphNode, NodeId, NodeKind, ProcessGraph, PATH_SEPARATOR};
