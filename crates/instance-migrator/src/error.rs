//! Error types for the instance migrator

use process_graph::{GraphError, NodeKind};
use thiserror::Error;

/// Result type alias using MigrationError
pub type Result<T> = std::result::Result<T, MigrationError>;

/// Errors that can occur while building a migrator or migrating an execution
///
/// None of these are transient: each points at a defect in the migration
/// configuration or in how the graph evolved.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The execution belongs to a different graph than this migrator
    #[error("Migrator for '{migrator}' cannot migrate executions of '{graph}'")]
    NotApplicable { migrator: String, graph: String },

    /// A migration step could not be folded into the composite table
    #[error("Migration step '{step}' conflicts with earlier steps: {source}")]
    Conflict {
        step: String,
        #[source]
        source: ConflictError,
    },

    /// A relocated pointer's node does not exist in the latest graph
    #[error("Node '{node}' for pointer '{pointer}' not found in '{graph}' v{version}")]
    NodeNotFound {
        graph: String,
        version: u32,
        node: String,
        pointer: String,
    },

    /// A pointer owning a sub-execution was relocated onto a node that cannot own one
    #[error("Pointer '{pointer}' owns a sub-process execution but '{node}' is a {kind} node")]
    IncompatibleNode {
        node: String,
        kind: NodeKind,
        pointer: String,
    },

    /// Dynamic resolution failed
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    /// Graph lookup failed
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejected composition of node mappings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    /// The mapping would lead back to its own deprecated identifier
    #[error("Mapping '{deprecated}' -> '{current}' forms a cycle")]
    Cycle { deprecated: String, current: String },

    /// The deprecated identifier is already mapped elsewhere
    #[error("'{deprecated}' is already mapped to '{existing}' and cannot also map to '{current}'")]
    Contradiction {
        deprecated: String,
        current: String,
        existing: String,
    },
}

/// Dynamic resolver lookup failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    /// The identifier is marked dynamic but names no resolver
    #[error("Malformed dynamic node reference: '{0}'")]
    MalformedReference(String),

    /// No resolver is registered under the name
    #[error("No dynamic resolver registered as '{0}'")]
    NotRegistered(String),

    /// The registered factory failed to produce a resolver
    #[error("Failed to instantiate dynamic resolver '{name}': {reason}")]
    Instantiation { name: String, reason: String },
}

/// Failure reported by a post-migration handler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Create a handler error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
