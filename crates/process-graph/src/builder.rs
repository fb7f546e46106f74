//! Fluent builder for process graphs
//!
//! Provides a compact API for constructing graphs programmatically, mostly
//! useful for tests and for hosts that define graphs in code.

use crate::types::{GraphNode, NodeKind, ProcessGraph};

/// Fluent builder for constructing process graphs
///
/// # Example
///
/// ```ignore
/// let graph = GraphBuilder::new("order")
///     .version(2)
///     .start("start")
///     .super_state("review", |s| s.state("first").task("approve"))
///     .process_state("bill", "billing")
///     .end("end")
///     .build();
/// ```
pub struct GraphBuilder {
    name: String,
    version: u32,
    nodes: Vec<GraphNode>,
}

impl GraphBuilder {
    /// Create a new graph builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 0,
            nodes: Vec::new(),
        }
    }

    /// Set the version number (normally assigned by the store on deployment)
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Add a leaf node of any kind
    pub fn add_node(mut self, name: impl Into<String>, kind: NodeKind) -> Self {
        self.nodes.push(GraphNode::new(name, kind));
        self
    }

    /// Add a Start node
    pub fn start(self, name: impl Into<String>) -> Self {
        self.add_node(name, NodeKind::Start)
    }

    /// Add an End node
    pub fn end(self, name: impl Into<String>) -> Self {
        self.add_node(name, NodeKind::End)
    }

    /// Add a generic wait state
    pub fn state(self, name: impl Into<String>) -> Self {
        self.add_node(name, NodeKind::State)
    }

    /// Add a task node
    pub fn task(self, name: impl Into<String>) -> Self {
        self.add_node(name, NodeKind::Task)
    }

    /// Add a Fork node
    pub fn fork(self, name: impl Into<String>) -> Self {
        self.add_node(name, NodeKind::Fork)
    }

    /// Add a Join node
    pub fn join(self, name: impl Into<String>) -> Self {
        self.add_node(name, NodeKind::Join)
    }

    /// Add a Decision node
    pub fn decision(self, name: impl Into<String>) -> Self {
        self.add_node(name, NodeKind::Decision)
    }

    /// Add an Action node
    pub fn action(self, name: impl Into<String>) -> Self {
        self.add_node(name, NodeKind::Action)
    }

    /// Add a process-state calling the named sub-process graph
    pub fn process_state(mut self, name: impl Into<String>, sub_process: impl Into<String>) -> Self {
        self.nodes.push(GraphNode::process_state(name, sub_process));
        self
    }

    /// Add a super-state whose children are built by `build`
    pub fn super_state(
        mut self,
        name: impl Into<String>,
        build: impl FnOnce(GraphBuilder) -> GraphBuilder,
    ) -> Self {
        let name = name.into();
        let inner = build(GraphBuilder::new(name.clone()));
        self.nodes.push(GraphNode::super_state(name, inner.nodes));
        self
    }

    /// Build the graph
    pub fn build(self) -> ProcessGraph {
        let mut graph = ProcessGraph::new(self.name, self.version);
        graph.nodes = self.nodes;
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_nests_super_states() {
        let graph = GraphBuilder::new("order")
            .version(3)
            .start("start")
            .super_state("review", |s| s.state("first").super_state("inner", |i| i.task("approve")))
            .process_state("bill", "billing")
            .action("notify")
            .end("end")
            .build();

        assert_eq!(graph.version, 3);
        assert_eq!(graph.find_node("notify").unwrap().kind, NodeKind::Action);
        assert!(!graph.find_node("notify").unwrap().kind.is_wait_state());
        assert_eq!(graph.find_node("review/inner/approve").unwrap().kind, NodeKind::Task);
        assert_eq!(
            graph.find_node("bill").unwrap().sub_process.as_deref(),
            Some("billing")
        );
    }
}
