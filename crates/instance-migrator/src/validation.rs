//! Offline validation of a migrator against a process graph
//!
//! Run at deployment or test time to catch migration configuration defects
//! before a migrator is pointed at live executions.

use process_graph::{GraphNode, NodeKind, ProcessGraph};

use crate::migrator::ProcessMigrator;
use crate::resolver::is_dynamic;

/// A defect in a migrator's configuration relative to a graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The migrator is configured for a different graph
    NotApplicable { migrator: String, graph: String },
    /// A deprecated node still exists in the graph
    DeprecatedNodePresent { node: String },
    /// A current node does not exist in the graph
    MissingCurrentNode { node: String },
    /// A current node cannot hold a pointer between migrations
    UnstableCurrentNode { node: String, kind: NodeKind },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotApplicable { migrator, graph } => {
                write!(f, "Migrator for '{}' does not apply to graph '{}'", migrator, graph)
            }
            Self::DeprecatedNodePresent { node } => {
                write!(f, "Deprecated node '{}' is still present in the graph", node)
            }
            Self::MissingCurrentNode { node } => {
                write!(f, "Current node '{}' is missing from the graph", node)
            }
            Self::UnstableCurrentNode { node, kind } => {
                write!(
                    f,
                    "Current node '{}' is a {} node, which is not a wait state",
                    node, kind
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Resolve an identifier against nested super-states.
///
/// A missing intermediate super-state is reported as not found.
pub fn find_node<'a>(graph: &'a ProcessGraph, id: &str) -> Option<&'a GraphNode> {
    graph.find_node(id)
}

/// Deprecated identifiers of the migrator's table that still resolve in `graph`
pub fn find_deprecated_nodes_still_present(
    graph: &ProcessGraph,
    migrator: &ProcessMigrator,
) -> Vec<String> {
    migrator
        .remap()
        .deprecated_ids()
        .filter(|id| find_node(graph, id).is_some())
        .map(str::to_string)
        .collect()
}

/// Current identifiers of the migrator's table that do not resolve in `graph`.
///
/// Dynamic identifiers are skipped.
pub fn find_missing_current_nodes(graph: &ProcessGraph, migrator: &ProcessMigrator) -> Vec<String> {
    migrator
        .remap()
        .current_ids()
        .into_iter()
        .filter(|id| !is_dynamic(id) && find_node(graph, id).is_none())
        .map(str::to_string)
        .collect()
}

/// Current identifiers whose node in `graph` is not a wait state.
///
/// Dynamic and missing identifiers are skipped.
pub fn find_current_nodes_with_unstable_kind(
    graph: &ProcessGraph,
    migrator: &ProcessMigrator,
) -> Vec<(String, NodeKind)> {
    migrator
        .remap()
        .current_ids()
        .into_iter()
        .filter(|id| !is_dynamic(id))
        .filter_map(|id| find_node(graph, id).map(|node| (id, node.kind)))
        .filter(|(_, kind)| !kind.is_wait_state())
        .map(|(id, kind)| (id.to_string(), kind))
        .collect()
}

/// Validate a migrator against the graph it migrates to
///
/// Returns all validation errors found (not just the first).
pub fn validate_migrator(graph: &ProcessGraph, migrator: &ProcessMigrator) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !migrator.will_migrate(&graph.name) {
        errors.push(ValidationError::NotApplicable {
            migrator: migrator.graph_name().to_string(),
            graph: graph.name.clone(),
        });
    }

    errors.extend(
        find_deprecated_nodes_still_present(graph, migrator)
            .into_iter()
            .map(|node| ValidationError::DeprecatedNodePresent { node }),
    );
    errors.extend(
        find_missing_current_nodes(graph, migrator)
            .into_iter()
            .map(|node| ValidationError::MissingCurrentNode { node }),
    );
    errors.extend(
        find_current_nodes_with_unstable_kind(graph, migrator)
            .into_iter()
            .map(|(node, kind)| ValidationError::UnstableCurrentNode { node, kind }),
    );

    for error in &errors {
        log::warn!("Migrator for '{}': {}", migrator.graph_name(), error);
    }
    errors
}
