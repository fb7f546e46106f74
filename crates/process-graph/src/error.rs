//! Error types for process graphs and the graph store

use thiserror::Error;

/// Result type alias using GraphError
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that can occur while looking up or persisting process graphs
#[derive(Debug, Error)]
pub enum GraphError {
    /// No version of the named graph has been deployed
    #[error("Process graph not found: {0}")]
    GraphNotFound(String),

    /// The named graph exists but not at the requested version
    #[error("Process graph '{name}' has no version {version}")]
    VersionNotFound { name: String, version: u32 },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    /// Create a graph-not-found error for a name
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::GraphNotFound(name.into())
    }
}
