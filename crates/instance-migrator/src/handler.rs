//! Post-migration handlers
//!
//! Handlers run once a new execution has been fully built. A failing handler
//! never undoes the migration; its failure is returned as a warning.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use process_graph::ProcessExecution;

use crate::error::HandlerError;

/// Side effect applied after an execution has been migrated
pub trait MigrationHandler: Send + Sync {
    /// Name reported in warnings.
    ///
    /// Defaults to the implementing type's fully-qualified name.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Called with the predecessor and its freshly built successor
    fn on_migrated(
        &self,
        old: &mut ProcessExecution,
        new: &ProcessExecution,
    ) -> Result<(), HandlerError>;
}

/// Ends the predecessor execution once it has been migrated
#[derive(Debug, Clone, Copy, Default)]
pub struct EndPredecessorHandler;

impl MigrationHandler for EndPredecessorHandler {
    fn name(&self) -> &str {
        "EndPredecessorHandler"
    }

    fn on_migrated(
        &self,
        old: &mut ProcessExecution,
        new: &ProcessExecution,
    ) -> Result<(), HandlerError> {
        if old.has_ended() {
            log::debug!("Predecessor execution {} has already ended", old.id);
            return Ok(());
        }
        old.end();
        log::info!("Ended execution {} after migrating it to {}", old.id, new.id);
        Ok(())
    }
}

/// A handler failure, reported alongside a completed migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerWarning {
    pub handler: String,
    pub message: String,
}

impl std::fmt::Display for HandlerWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Migration handler '{}' failed: {}", self.handler, self.message)
    }
}

/// Run every handler in order, collecting failures
pub(crate) fn run_handlers(
    handlers: &[Arc<dyn MigrationHandler>],
    old: &mut ProcessExecution,
    new: &ProcessExecution,
) -> Vec<HandlerWarning> {
    let mut warnings = Vec::new();
    for handler in handlers {
        if let Err(e) = handler.on_migrated(old, new) {
            let warning = HandlerWarning {
                handler: handler.name().to_string(),
                message: e.to_string(),
            };
            log::warn!("{}", warning);
            warnings.push(warning);
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Refuse;

    impl MigrationHandler for Refuse {
        fn on_migrated(
            &self,
            _old: &mut ProcessExecution,
            _new: &ProcessExecution,
        ) -> Result<(), HandlerError> {
            Err(HandlerError::new("archive unavailable"))
        }
    }

    #[test]
    fn test_end_predecessor() {
        let mut old = ProcessExecution::new("order", 1, "A");
        let new = ProcessExecution::new("order", 2, "first");

        EndPredecessorHandler.on_migrated(&mut old, &new).unwrap();
        assert!(old.has_ended());
        assert!(old.root.has_ended());
        assert!(!new.has_ended());
    }

    #[test]
    fn test_failures_become_warnings() {
        let handlers: Vec<Arc<dyn MigrationHandler>> =
            vec![Arc::new(Refuse), Arc::new(EndPredecessorHandler)];
        let mut old = ProcessExecution::new("order", 1, "A");
        let new = ProcessExecution::new("order", 2, "first");

        let warnings = run_handlers(&handlers, &mut old, &new);

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].handler.ends_with("Refuse"));
        assert_eq!(warnings[0].message, "archive unavailable");
        // later handlers still run
        assert!(old.has_ended());
    }
}
