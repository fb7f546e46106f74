//! Instance Migrator - Moves in-flight executions onto the latest graph version
//!
//! When a process graph is redeployed with renamed, removed or restructured
//! nodes, executions started from an older version still point at the old
//! node identifiers. This crate relocates them:
//!
//! - Migration steps contribute deprecated-to-current node mappings, folded
//!   into one collapsed composite table at construction time
//! - Dynamic resolvers compute targets the table cannot express statically
//! - Pointer trees are rebuilt parent first, recursing into sub-process
//!   executions through per-graph sub-migrators
//! - Handlers run after a successful migration (e.g. ending the predecessor)
//! - Offline validation cross-checks a migrator against the target graph
//!
//! # Example
//!
//! ```ignore
//! use instance_migrator::{DeclaredStep, MigrationOutcome, ProcessMigrator};
//!
//! let migrator = ProcessMigrator::builder("order", store.clone())
//!     .step(DeclaredStep::new("order001").map("A", "first"))
//!     .build()?;
//!
//! if let MigrationOutcome::Migrated { execution, .. } = migrator.migrate(&mut old)? {
//!     persist(execution);
//! }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod handler;
pub mod migrator;
pub mod remap;
pub mod resolver;
pub mod step;
pub mod validation;

#[cfg(test)]
mod test_support;

// Re-export key types
pub use config::{ConfigError, MigratorConfig};
pub use error::{ConflictError, HandlerError, MigrationError, ResolverError, Result};
pub use handler::{EndPredecessorHandler, HandlerWarning, MigrationHandler};
pub use migrator::{MigrationMemo, MigrationOutcome, ProcessMigrator, ProcessMigratorBuilder};
pub use remap::NodeRemapTable;
pub use resolver::{
    dynamic_id, is_dynamic, resolver_name, DynamicResolver, ResolverDescriptor, ResolverRegistry,
};
pub use step::{DeclaredStep, MigrationStep, StepDescriptor, StepRegistry};
pub use validation::{validate_migrator, ValidationError};
