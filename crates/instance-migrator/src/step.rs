//! Migration steps and the step registry
//!
//! A migration step contributes a fragment of the composite remap table,
//! typically one step per graph revision. Steps are folded into the composite
//! table in canonical order (ascending by name), so the same set of steps
//! always produces the same table whatever order they were supplied in.
//!
//! # Registration
//!
//! Steps can be registered explicitly on a `StepRegistry`, loaded from JSON
//! files as `DeclaredStep`s, or submitted at link time:
//!
//! ```ignore
//! inventory::submit!(instance_migrator::StepDescriptor {
//!     name: "order001",
//!     create: || Box::new(RenameReviewStates),
//! });
//!
//! let registry = StepRegistry::discover();
//! let steps = registry.lookup_numbered("order");
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::steps::{MAX_REVISION, REVISION_WIDTH};
use crate::error::{ConflictError, MigrationError, Result};
use crate::remap::NodeRemapTable;

/// A unit of migration contributing node mappings
pub trait MigrationStep: Send + Sync {
    /// Name used for canonical ordering.
    ///
    /// Defaults to the implementing type's fully-qualified name.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// The mappings this step contributes
    fn node_map(&self) -> std::result::Result<NodeRemapTable, ConflictError>;
}

/// Sort steps by name, dropping later steps whose name repeats an earlier one
pub fn canonical_order(mut steps: Vec<Box<dyn MigrationStep>>) -> Vec<Box<dyn MigrationStep>> {
    steps.sort_by(|a, b| a.name().cmp(b.name()));

    let mut seen = HashSet::new();
    steps.retain(|step| {
        let first = seen.insert(step.name().to_string());
        if !first {
            log::warn!("Ignoring duplicate migration step '{}'", step.name());
        }
        first
    });
    steps
}

/// Fold steps into one composite table, in canonical order.
///
/// Returns the table and the names of the steps it was built from.
pub fn compose(steps: Vec<Box<dyn MigrationStep>>) -> Result<(NodeRemapTable, Vec<String>)> {
    let mut table = NodeRemapTable::new();
    let mut names = Vec::new();

    for step in canonical_order(steps) {
        let conflict = |source| MigrationError::Conflict {
            step: step.name().to_string(),
            source,
        };
        let fragment = step.node_map().map_err(conflict)?;
        table.merge(&fragment).map_err(conflict)?;

        log::debug!(
            "Folded migration step '{}' ({} mappings) into composite table",
            step.name(),
            fragment.len()
        );
        names.push(step.name().to_string());
    }

    Ok((table, names))
}

/// A migration step defined as data
///
/// ```json
/// { "name": "order001", "mappings": [["A", "first"], ["B", "second"]] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredStep {
    pub name: String,
    /// `(deprecated, current)` pairs
    #[serde(default)]
    pub mappings: Vec<(String, String)>,
}

impl DeclaredStep {
    /// Create a step with no mappings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mappings: Vec::new(),
        }
    }

    /// Add a mapping (builder style)
    pub fn map(mut self, deprecated: impl Into<String>, current: impl Into<String>) -> Self {
        self.mappings.push((deprecated.into(), current.into()));
        self
    }

    /// Load a step from a JSON file
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load every JSON step file in a directory, ordered by file name.
    ///
    /// Files that fail to parse are skipped with a warning.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<Self>> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|e| e == "json"))
            .collect();
        paths.sort();

        let mut steps = Vec::new();
        for path in paths {
            match Self::load_file(&path) {
                Ok(step) => {
                    log::info!("Loaded migration step '{}' from {:?}", step.name, path);
                    steps.push(step);
                }
                Err(e) => {
                    log::warn!("Skipping migration step file {:?}: {}", path, e);
                }
            }
        }
        Ok(steps)
    }
}

impl MigrationStep for DeclaredStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_map(&self) -> std::result::Result<NodeRemapTable, ConflictError> {
        NodeRemapTable::from_pairs(
            self.mappings
                .iter()
                .map(|(deprecated, current)| (deprecated.as_str(), current.as_str())),
        )
    }
}

/// Link-time registration of a migration step.
///
/// # Example
///
/// ```ignore
/// inventory::submit!(instance_migrator::StepDescriptor {
///     name: "order001",
///     create: || Box::new(RenameReviewStates),
/// });
/// ```
pub struct StepDescriptor {
    /// Registry name, usually `<graph><revision>`
    pub name: &'static str,
    /// Factory function that creates the step
    pub create: fn() -> Box<dyn MigrationStep>,
}

inventory::collect!(StepDescriptor);

/// Factory producing a fresh step instance
pub type StepFactory = Arc<dyn Fn() -> Box<dyn MigrationStep> + Send + Sync>;

/// Registry of migration steps by name
#[derive(Default)]
pub struct StepRegistry {
    factories: HashMap<String, StepFactory>,
}

impl StepRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every `StepDescriptor` submitted at link time
    pub fn discover() -> Self {
        let mut registry = Self::new();
        for descriptor in inventory::iter::<StepDescriptor> {
            let create = descriptor.create;
            registry.register(descriptor.name, move || create());
        }
        registry
    }

    /// Register a step factory under a name
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn MigrationStep> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Register a declared step under its own name
    pub fn register_declared(&mut self, step: DeclaredStep) {
        let name = step.name.clone();
        self.register(name, move || Box::new(step.clone()));
    }

    /// Create the step registered under `name`
    pub fn create(&self, name: &str) -> Option<Box<dyn MigrationStep>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Steps registered as `<base>001`, `<base>002`, ... up to the first gap
    pub fn lookup_numbered(&self, base: &str) -> Vec<Box<dyn MigrationStep>> {
        let mut steps = Vec::new();
        for revision in 1..=MAX_REVISION {
            let name = format!("{}{:0width$}", base, revision, width = REVISION_WIDTH);
            match self.create(&name) {
                Some(step) => steps.push(step),
                None => break,
            }
        }

        if steps.is_empty() {
            log::info!("No numbered migration steps found for '{}'", base);
        } else {
            log::debug!("Found {} numbered migration steps for '{}'", steps.len(), base);
        }
        steps
    }

    /// Check if a step is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered step names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` with the same name.
    pub fn merge(&mut self, other: StepRegistry) {
        self.factories.extend(other.factories);
    }
}
