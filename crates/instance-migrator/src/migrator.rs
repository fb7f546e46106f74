//! Process execution migration
//!
//! A `ProcessMigrator` relocates every pointer of an outdated execution onto
//! the latest version of its graph. It is built once from a graph name, a
//! graph repository and a set of migration steps, and is immutable after
//! construction: the composite remap table is folded at build time, so a
//! conflicting set of steps fails `build()` rather than a later migration.
//!
//! # Migration
//!
//! 1. The execution must belong to this migrator's graph.
//! 2. If it and every nested sub-execution are already at their latest
//!    version nothing happens.
//! 3. Otherwise a new execution is created on the latest graph, variables are
//!    copied and a memo recording the predecessor is added.
//! 4. The pointer tree is rebuilt parent first, each pointer relocated through
//!    the composite table (and a dynamic resolver where the table says so).
//!    Sub-executions are rebuilt by the sub-migrator for their graph.
//! 5. Handlers run against the old and new executions.
//!
//! # Example
//!
//! ```ignore
//! let migrator = ProcessMigrator::builder("order", store.clone())
//!     .steps(registry.lookup_numbered("order"))
//!     .sub_migrator(billing_migrator)
//!     .handler(EndPredecessorHandler)
//!     .build()?;
//!
//! match migrator.migrate(&mut execution)? {
//!     MigrationOutcome::Unchanged => {}
//!     MigrationOutcome::Migrated { execution, warnings } => save(execution),
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use process_graph::{
    ExecutionId, ExecutionPointer, GraphRepository, NodeKind, ProcessExecution, ProcessGraph,
    SuperPointer,
};

use crate::config::MigratorConfig;
use crate::error::{MigrationError, Result};
use crate::handler::{run_handlers, EndPredecessorHandler, HandlerWarning, MigrationHandler};
use crate::remap::NodeRemapTable;
use crate::resolver::{is_dynamic, ResolverRegistry};
use crate::step::{compose, MigrationStep};

/// Audit record stored on every migrated execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationMemo {
    pub from_version: u32,
    pub to_version: u32,
    pub migrated_at: DateTime<Utc>,
    /// Execution this one was migrated from
    pub predecessor: ExecutionId,
}

impl MigrationMemo {
    /// Read the memo stored under `variable`, if any
    pub fn read(execution: &ProcessExecution, variable: &str) -> Option<Self> {
        execution
            .variables
            .get(variable)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

impl std::fmt::Display for MigrationMemo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Process migrated from version [{}] to [{}] on {}. Predecessor execution id => {}",
            self.from_version,
            self.to_version,
            self.migrated_at.to_rfc3339(),
            self.predecessor
        )
    }
}

/// Result of a migration request
#[derive(Debug)]
pub enum MigrationOutcome {
    /// Already current; nothing was built and no handler ran
    Unchanged,
    /// A new execution was built on the latest graph
    Migrated {
        execution: ProcessExecution,
        /// Handler failures, which did not undo the migration
        warnings: Vec<HandlerWarning>,
    },
}

impl MigrationOutcome {
    pub fn is_migrated(&self) -> bool {
        matches!(self, Self::Migrated { .. })
    }

    /// The new execution, if one was built
    pub fn execution(&self) -> Option<&ProcessExecution> {
        match self {
            Self::Unchanged => None,
            Self::Migrated { execution, .. } => Some(execution),
        }
    }

    /// Take the new execution, if one was built
    pub fn into_execution(self) -> Option<ProcessExecution> {
        match self {
            Self::Unchanged => None,
            Self::Migrated { execution, .. } => Some(execution),
        }
    }

    pub fn warnings(&self) -> &[HandlerWarning] {
        match self {
            Self::Unchanged => &[],
            Self::Migrated { warnings, .. } => warnings,
        }
    }
}

/// Sub-migrators by graph name: the declared ones, plus identity migrators
/// generated on first use for every other graph.
struct SubMigrators {
    declared: HashMap<String, Arc<ProcessMigrator>>,
    generated: RwLock<HashMap<String, Arc<ProcessMigrator>>>,
}

impl SubMigrators {
    fn new(declared: HashMap<String, Arc<ProcessMigrator>>) -> Self {
        Self {
            declared,
            generated: RwLock::new(HashMap::new()),
        }
    }
}

/// Migrates executions of one graph onto its latest version
pub struct ProcessMigrator {
    graph_name: String,
    repository: Arc<dyn GraphRepository>,
    remap: NodeRemapTable,
    step_names: Vec<String>,
    sub_migrators: SubMigrators,
    handlers: Vec<Arc<dyn MigrationHandler>>,
    resolvers: Arc<ResolverRegistry>,
    config: Arc<MigratorConfig>,
}

impl ProcessMigrator {
    /// Start building a migrator for the named graph
    pub fn builder(
        graph_name: impl Into<String>,
        repository: Arc<dyn GraphRepository>,
    ) -> ProcessMigratorBuilder {
        ProcessMigratorBuilder::new(graph_name, repository)
    }

    /// A migrator with no steps, no handlers and no declared sub-migrators
    fn identity(
        graph_name: &str,
        repository: Arc<dyn GraphRepository>,
        resolvers: Arc<ResolverRegistry>,
        config: Arc<MigratorConfig>,
    ) -> Self {
        Self {
            graph_name: graph_name.to_string(),
            repository,
            remap: NodeRemapTable::new(),
            step_names: Vec::new(),
            sub_migrators: SubMigrators::new(HashMap::new()),
            handlers: Vec::new(),
            resolvers,
            config,
        }
    }

    pub fn graph_name(&self) -> &str {
        &self.graph_name
    }

    /// The composite table folded from every step
    pub fn remap(&self) -> &NodeRemapTable {
        &self.remap
    }

    /// Names of the steps the composite table was built from, in fold order
    pub fn step_names(&self) -> &[String] {
        &self.step_names
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Whether this migrator handles executions of the named graph
    pub fn will_migrate(&self, graph_name: &str) -> bool {
        self.graph_name == graph_name
    }

    /// The migrator used for sub-executions of the named graph.
    ///
    /// Falls back to an identity migrator, generated once per name and cached.
    pub fn sub_migrator(&self, graph_name: &str) -> Arc<ProcessMigrator> {
        if let Some(declared) = self.sub_migrators.declared.get(graph_name) {
            return declared.clone();
        }
        if let Some(generated) = self.sub_migrators.generated.read().get(graph_name) {
            return generated.clone();
        }

        self.sub_migrators
            .generated
            .write()
            .entry(graph_name.to_string())
            .or_insert_with(|| {
                log::debug!(
                    "No sub-migrator declared for '{}', using an identity migrator",
                    graph_name
                );
                Arc::new(ProcessMigrator::identity(
                    graph_name,
                    self.repository.clone(),
                    self.resolvers.clone(),
                    self.config.clone(),
                ))
            })
            .clone()
    }

    /// Whether the execution, or any sub-execution nested in it, is behind
    /// the latest version of its graph
    pub fn requires_migration(&self, execution: &ProcessExecution) -> Result<bool> {
        if self.is_outdated(execution)? {
            return Ok(true);
        }
        for sub in execution.sub_executions() {
            if self.sub_migrator(&sub.graph_name).is_outdated(sub)? {
                log::info!(
                    "Execution {} requires migration: sub-execution {} of '{}' is outdated",
                    execution.id,
                    sub.id,
                    sub.graph_name
                );
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn is_outdated(&self, execution: &ProcessExecution) -> Result<bool> {
        let latest = self.repository.find_latest_graph(&execution.graph_name)?;
        let outdated = execution.graph_version != latest.version;
        log::info!(
            "Execution {} of '{}' is at v{}, latest is v{}: {}",
            execution.id,
            execution.graph_name,
            execution.graph_version,
            latest.version,
            if outdated { "migration required" } else { "up to date" }
        );
        Ok(outdated)
    }

    /// Migrate an execution onto the latest version of its graph.
    ///
    /// The old execution is only touched by handlers. Handler failures are
    /// returned as warnings on the outcome.
    pub fn migrate(&self, execution: &mut ProcessExecution) -> Result<MigrationOutcome> {
        if !self.will_migrate(&execution.graph_name) {
            log::error!(
                "Migrator for '{}' cannot migrate execution {} of '{}'",
                self.graph_name,
                execution.id,
                execution.graph_name
            );
            return Err(MigrationError::NotApplicable {
                migrator: self.graph_name.clone(),
                graph: execution.graph_name.clone(),
            });
        }

        if !self.requires_migration(execution)? {
            return Ok(MigrationOutcome::Unchanged);
        }

        let migrated = self.rebuild(execution, None)?;
        let warnings = run_handlers(&self.handlers, execution, &migrated);

        Ok(MigrationOutcome::Migrated {
            execution: migrated,
            warnings,
        })
    }

    /// Build the successor of `old` on the latest graph
    fn rebuild(
        &self,
        old: &ProcessExecution,
        super_pointer: Option<SuperPointer>,
    ) -> Result<ProcessExecution> {
        let latest = self.repository.find_latest_graph(&self.graph_name)?;
        log::info!(
            "Migrating execution {} of '{}' from v{} to v{}",
            old.id,
            self.graph_name,
            old.graph_version,
            latest.version
        );

        let mut new = latest.create_execution();
        new.super_pointer = super_pointer;

        new.variables
            .set_persisted_all(old.variables.persisted().clone());
        new.variables
            .set_transient_all(old.variables.transient().clone());
        log::info!(
            "Copied {} persisted and {} transient variables to execution {}",
            old.variables.persisted().len(),
            old.variables.transient().len(),
            new.id
        );

        let memo = MigrationMemo {
            from_version: old.graph_version,
            to_version: latest.version,
            migrated_at: Utc::now(),
            predecessor: old.id,
        };
        log::info!("{}", memo);
        new.variables
            .set(self.config.audit_variable.as_str(), serde_json::to_value(&memo)?);

        new.root = self.rebuild_pointer(old, &old.root, &[], &latest, new.id)?;

        log::info!(
            "Migrated execution {} to {} on '{}' v{}",
            old.id,
            new.id,
            self.graph_name,
            latest.version
        );
        Ok(new)
    }

    /// Rebuild one pointer and, parent first, everything below it
    fn rebuild_pointer(
        &self,
        old_execution: &ProcessExecution,
        old: &ExecutionPointer,
        path: &[String],
        latest: &ProcessGraph,
        new_execution_id: ExecutionId,
    ) -> Result<ExecutionPointer> {
        let (node, kind) = self.relocate(old_execution, old, latest)?;

        let mut pointer = match &old.name {
            Some(name) => ExecutionPointer::new(name.as_str(), node.as_str()),
            None => ExecutionPointer::root(node.as_str()),
        };

        if let Some(sub) = old.sub_execution.as_deref() {
            if !kind.can_own_sub_execution() {
                return Err(MigrationError::IncompatibleNode {
                    node,
                    kind,
                    pointer: self.pointer_name(old).to_string(),
                });
            }

            log::info!(
                "Delegating sub-execution {} of '{}' owned by pointer '{}'",
                sub.id,
                sub.graph_name,
                self.pointer_name(old)
            );
            let back_reference = SuperPointer {
                execution_id: new_execution_id,
                pointer_path: path.to_vec(),
            };
            let migrated = self
                .sub_migrator(&sub.graph_name)
                .rebuild(sub, Some(back_reference))?;
            pointer.sub_execution = Some(Box::new(migrated));
        }

        for (name, child) in &old.children {
            let mut child_path = path.to_vec();
            child_path.push(name.clone());
            let rebuilt =
                self.rebuild_pointer(old_execution, child, &child_path, latest, new_execution_id)?;
            pointer.add_child(rebuilt);
        }

        Ok(pointer)
    }

    /// Resolve where a pointer lands in the latest graph
    fn relocate(
        &self,
        old_execution: &ProcessExecution,
        old: &ExecutionPointer,
        latest: &ProcessGraph,
    ) -> Result<(String, NodeKind)> {
        let mut target = match self.remap.resolve(&old.node) {
            Some(current) => {
                log::debug!("Found mapping '{}' => '{}'", old.node, current);
                current.to_string()
            }
            None => {
                log::debug!("No mapping for '{}'", old.node);
                old.node.clone()
            }
        };

        if is_dynamic(&target) {
            let resolver = self.resolvers.for_reference(&target)?;
            let resolved = resolver.resolve(&old.node, old_execution);
            log::debug!("Resolved '{}' via '{}' to '{}'", old.node, target, resolved);
            target = resolved;
        }

        let Some(node) = latest.find_node(&target) else {
            log::error!(
                "Node '{}' for pointer '{}' not found in '{}' v{}",
                target,
                self.pointer_name(old),
                latest.name,
                latest.version
            );
            return Err(MigrationError::NodeNotFound {
                graph: latest.name.clone(),
                version: latest.version,
                node: target,
                pointer: self.pointer_name(old).to_string(),
            });
        };

        log::info!(
            "Pointer '{}': '{}' => '{}'",
            self.pointer_name(old),
            old.node,
            target
        );
        Ok((target, node.kind))
    }

    fn pointer_name<'a>(&'a self, pointer: &'a ExecutionPointer) -> &'a str {
        pointer.display_name(&self.config.root_pointer_name)
    }
}

impl std::fmt::Debug for ProcessMigrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sub_migrators: Vec<&str> = self
            .sub_migrators
            .declared
            .keys()
            .map(String::as_str)
            .collect();
        sub_migrators.sort_unstable();
        let handlers: Vec<&str> = self.handlers.iter().map(|h| h.name()).collect();

        f.debug_struct("ProcessMigrator")
            .field("graph_name", &self.graph_name)
            .field("steps", &self.step_names)
            .field("mappings", &self.remap.len())
            .field("sub_migrators", &sub_migrators)
            .field("handlers", &handlers)
            .finish()
    }
}

/// Fluent builder for `ProcessMigrator`
pub struct ProcessMigratorBuilder {
    graph_name: String,
    repository: Arc<dyn GraphRepository>,
    steps: Vec<Box<dyn MigrationStep>>,
    sub_migrators: HashMap<String, Arc<ProcessMigrator>>,
    handlers: Vec<Arc<dyn MigrationHandler>>,
    resolvers: Arc<ResolverRegistry>,
    config: MigratorConfig,
}

impl ProcessMigratorBuilder {
    /// Create a builder for the named graph
    pub fn new(graph_name: impl Into<String>, repository: Arc<dyn GraphRepository>) -> Self {
        Self {
            graph_name: graph_name.into(),
            repository,
            steps: Vec::new(),
            sub_migrators: HashMap::new(),
            handlers: Vec::new(),
            resolvers: Arc::new(ResolverRegistry::new()),
            config: MigratorConfig::default(),
        }
    }

    /// Add a migration step
    pub fn step(mut self, step: impl MigrationStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Add several migration steps
    pub fn steps(mut self, steps: impl IntoIterator<Item = Box<dyn MigrationStep>>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Declare the migrator for sub-executions of its graph
    pub fn sub_migrator(mut self, migrator: impl Into<Arc<ProcessMigrator>>) -> Self {
        let migrator = migrator.into();
        self.sub_migrators
            .insert(migrator.graph_name.clone(), migrator);
        self
    }

    /// Add a handler, run after handlers added before it
    pub fn handler(mut self, handler: impl MigrationHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Set the dynamic resolvers, shared with generated sub-migrators
    pub fn resolvers(mut self, resolvers: impl Into<Arc<ResolverRegistry>>) -> Self {
        self.resolvers = resolvers.into();
        self
    }

    pub fn config(mut self, config: MigratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Fold the steps into the composite table and build the migrator
    pub fn build(self) -> Result<ProcessMigrator> {
        let (remap, step_names) = compose(self.steps).map_err(|e| {
            log::error!("Cannot build migrator for '{}': {}", self.graph_name, e);
            e
        })?;

        let mut handlers = self.handlers;
        if self.config.end_predecessor {
            handlers.push(Arc::new(EndPredecessorHandler));
        }

        log::info!(
            "Built migrator for '{}' from {} steps ({} mappings)",
            self.graph_name,
            step_names.len(),
            remap.len()
        );

        Ok(ProcessMigrator {
            graph_name: self.graph_name,
            repository: self.repository,
            remap,
            step_names,
            sub_migrators: SubMigrators::new(self.sub_migrators),
            handlers,
            resolvers: self.resolvers,
            config: Arc::new(self.config),
        })
    }
}
