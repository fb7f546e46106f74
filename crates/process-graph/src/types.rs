//! Core types for versioned process graphs
//!
//! A process graph is a named, versioned tree of typed nodes. Super-state
//! nodes nest further nodes, so a node is addressed by its fully-qualified
//! path (`"parentState/childNode"`).

use serde::{Deserialize, Serialize};

use crate::execution::ProcessExecution;

/// Fully-qualified node identifier (`"superState/child"`)
pub type NodeId = String;

/// Separator between the segments of a nested node identifier
pub const PATH_SEPARATOR: char = '/';

/// The kind of a node in a process graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Entry point of the process
    Start,
    /// Terminal node
    End,
    /// Generic wait state
    State,
    /// Splits control into concurrent child pointers
    Fork,
    /// Rejoins concurrent child pointers
    Join,
    /// Calls a sub-process and waits for it
    ProcessState,
    /// Composite state containing nested nodes
    SuperState,
    /// Waits for one or more human tasks
    Task,
    /// Routes control immediately to one transition
    Decision,
    /// Executes an action and leaves immediately
    Action,
    /// Sends a notification and leaves immediately
    Mail,
}

impl NodeKind {
    /// Whether control may rest at a node of this kind between signals.
    ///
    /// Only these kinds are valid destinations of a node remapping.
    pub fn is_wait_state(&self) -> bool {
        matches!(
            self,
            NodeKind::Start
                | NodeKind::End
                | NodeKind::State
                | NodeKind::Fork
                | NodeKind::Join
                | NodeKind::ProcessState
                | NodeKind::SuperState
                | NodeKind::Task
        )
    }

    /// Whether a pointer resting at this kind may own a sub-process execution
    pub fn can_own_sub_execution(&self) -> bool {
        matches!(self, NodeKind::ProcessState)
    }

    /// Get a human-readable label for this node kind.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Start => "Start",
            NodeKind::End => "End",
            NodeKind::State => "State",
            NodeKind::Fork => "Fork",
            NodeKind::Join => "Join",
            NodeKind::ProcessState => "Process State",
            NodeKind::SuperState => "Super State",
            NodeKind::Task => "Task",
            NodeKind::Decision => "Decision",
            NodeKind::Action => "Action",
            NodeKind::Mail => "Mail",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A node in a process graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Name of this node, unique among its siblings
    pub name: String,
    /// Kind of this node
    pub kind: NodeKind,
    /// Nested nodes (super-states only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<GraphNode>,
    /// Name of the graph started by this node (process-states only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_process: Option<String>,
}

impl GraphNode {
    /// Create a leaf node
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            children: Vec::new(),
            sub_process: None,
        }
    }

    /// Create a super-state containing the given nodes
    pub fn super_state(name: impl Into<String>, children: Vec<GraphNode>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::SuperState,
            children,
            sub_process: None,
        }
    }

    /// Create a process-state that calls the named sub-process graph
    pub fn process_state(name: impl Into<String>, sub_process: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::ProcessState,
            children: Vec::new(),
            sub_process: Some(sub_process.into()),
        }
    }

    /// Find a direct child by name
    pub fn child(&self, name: &str) -> Option<&GraphNode> {
        self.children.iter().find(|n| n.name == name)
    }
}

/// A named, versioned process graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessGraph {
    /// Name shared by every version of this graph
    pub name: String,
    /// Version number, assigned on deployment
    #[serde(default)]
    pub version: u32,
    /// Top-level nodes
    pub nodes: Vec<GraphNode>,
}

impl ProcessGraph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
            nodes: Vec::new(),
        }
    }

    /// Resolve a fully-qualified identifier against nested super-states.
    ///
    /// Returns `None` when any segment is missing, including a missing
    /// intermediate super-state.
    pub fn find_node(&self, id: &str) -> Option<&GraphNode> {
        if id.is_empty() {
            return None;
        }
        let mut segments = id.split(PATH_SEPARATOR);
        let first = segments.next()?;
        let mut node = self.nodes.iter().find(|n| n.name == first)?;
        for segment in segments {
            node = node.child(segment)?;
        }
        Some(node)
    }

    /// Check whether an identifier resolves to a node
    pub fn contains_node(&self, id: &str) -> bool {
        self.find_node(id).is_some()
    }

    /// Find the Start node of this graph
    pub fn start_node(&self) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.kind == NodeKind::Start)
    }

    /// All fully-qualified node identifiers, parents before their children
    pub fn node_ids(&self) -> Vec<NodeId> {
        fn collect(prefix: Option<&str>, nodes: &[GraphNode], out: &mut Vec<NodeId>) {
            for node in nodes {
                let id = match prefix {
                    Some(parent) => format!("{}{}{}", parent, PATH_SEPARATOR, node.name),
                    None => node.name.clone(),
                };
                out.push(id.clone());
                collect(Some(&id), &node.children, out);
            }
        }

        let mut ids = Vec::new();
        collect(None, &self.nodes, &mut ids);
        ids
    }

    /// Create a fresh execution of this graph version with its root pointer
    /// on the Start node.
    ///
    /// Persisting the execution is the caller's responsibility.
    pub fn create_execution(&self) -> ProcessExecution {
        let start = self
            .start_node()
            .or_else(|| self.nodes.first())
            .map(|n| n.name.clone())
            .unwrap_or_default();
        ProcessExecution::new(&self.name, self.version, start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested_graph() -> ProcessGraph {
        let mut graph = ProcessGraph::new("order", 1);
        graph.nodes.push(GraphNode::new("start", NodeKind::Start));
        graph.nodes.push(GraphNode::super_state(
            "review",
            vec![
                GraphNode::new("first", NodeKind::State),
                GraphNode::super_state("inner", vec![GraphNode::new("deep", NodeKind::Task)]),
            ],
        ));
        graph.nodes.push(GraphNode::new("route", NodeKind::Decision));
        graph.nodes.push(GraphNode::new("end", NodeKind::End));
        graph
    }

    #[test]
    fn test_wait_state_kinds() {
        assert!(NodeKind::State.is_wait_state());
        assert!(NodeKind::SuperState.is_wait_state());
        assert!(NodeKind::Task.is_wait_state());
        assert!(!NodeKind::Decision.is_wait_state());
        assert!(!NodeKind::Action.is_wait_state());
        assert!(!NodeKind::Mail.is_wait_state());
    }

    #[test]
    fn test_find_nested_node() {
        let graph = nested_graph();
        assert_eq!(graph.find_node("review/first").unwrap().kind, NodeKind::State);
        assert_eq!(graph.find_node("review/inner/deep").unwrap().kind, NodeKind::Task);
        assert_eq!(graph.find_node("review").unwrap().kind, NodeKind::SuperState);
    }

    #[test]
    fn test_find_node_with_missing_super_state() {
        let graph = nested_graph();
        assert!(graph.find_node("nonexistent/anything").is_none());
        assert!(graph.find_node("route/child").is_none());
        assert!(graph.find_node("").is_none());
    }

    #[test]
    fn test_node_ids_are_pre_order() {
        let graph = nested_graph();
        assert_eq!(
            graph.node_ids(),
            vec![
                "start",
                "review",
                "review/first",
                "review/inner",
                "review/inner/deep",
                "route",
                "end"
            ]
        );
    }

    #[test]
    fn test_create_execution_starts_at_start_node() {
        let graph = nested_graph();
        let execution = graph.create_execution();
        assert_eq!(execution.graph_name, "order");
        assert_eq!(execution.graph_version, 1);
        assert_eq!(execution.root.node, "start");
        assert!(execution.root.is_root());
    }

    #[test]
    fn test_graph_serialization() {
        let graph = nested_graph();
        let json = serde_json::to_string(&graph).unwrap();
        assert!(json.contains("super_state"));
        let parsed: ProcessGraph = serde_json::from_str(&json).unwrap();
        assert!(parsed.contains_node("review/inner/deep"));
    }
}
