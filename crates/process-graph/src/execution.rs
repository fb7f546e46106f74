//! Live execution trees
//!
//! A `ProcessExecution` is one run of a specific graph version. Its control
//! state is a tree of `ExecutionPointer`s: the root pointer, one child per
//! concurrent path (e.g. after a fork), and optionally a nested sub-process
//! execution owned by a pointer resting on a process-state node.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{NodeId, PATH_SEPARATOR};

/// Unique identifier for an execution
pub type ExecutionId = Uuid;

/// Name reported for the root pointer, which has no name of its own
pub const ROOT_POINTER_NAME: &str = "Root pointer";

/// Execution variables
///
/// Persisted variables survive serialization; transient variables live only
/// as long as the in-memory execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Variables {
    #[serde(default)]
    persisted: HashMap<String, serde_json::Value>,
    #[serde(skip)]
    transient: HashMap<String, serde_json::Value>,
}

impl Variables {
    /// Create an empty variable store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a persisted variable
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.persisted.get(key)
    }

    /// Set a persisted variable, returning the previous value
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) -> Option<serde_json::Value> {
        self.persisted.insert(key.into(), value)
    }

    /// Get a transient variable
    pub fn get_transient(&self, key: &str) -> Option<&serde_json::Value> {
        self.transient.get(key)
    }

    /// Set a transient variable, returning the previous value
    pub fn set_transient(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Option<serde_json::Value> {
        self.transient.insert(key.into(), value)
    }

    /// All persisted variables
    pub fn persisted(&self) -> &HashMap<String, serde_json::Value> {
        &self.persisted
    }

    /// All transient variables
    pub fn transient(&self) -> &HashMap<String, serde_json::Value> {
        &self.transient
    }

    /// Replace every persisted variable
    pub fn set_persisted_all(&mut self, variables: HashMap<String, serde_json::Value>) {
        self.persisted = variables;
    }

    /// Replace every transient variable
    pub fn set_transient_all(&mut self, variables: HashMap<String, serde_json::Value>) {
        self.transient = variables;
    }

    /// Whether both maps are empty
    pub fn is_empty(&self) -> bool {
        self.persisted.is_empty() && self.transient.is_empty()
    }
}

/// Non-owning back-reference from a sub-execution to the pointer that owns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperPointer {
    /// Execution that owns the pointer
    pub execution_id: ExecutionId,
    /// Names of the pointers leading from the root to the owning pointer
    /// (empty for the root)
    pub pointer_path: Vec<String>,
}

/// A cursor into a process graph, one per concurrent path of control
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPointer {
    /// Pointer name; `None` only for the root pointer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Fully-qualified identifier of the node this pointer rests on
    pub node: NodeId,
    /// When the pointer entered its current node
    pub node_entered_at: DateTime<Utc>,
    /// Set once the pointer has ended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Sub-process execution started by this pointer's process-state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_execution: Option<Box<ProcessExecution>>,
    /// Child pointers, keyed by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, ExecutionPointer>,
}

impl ExecutionPointer {
    /// Create a root pointer resting on `node`
    pub fn root(node: impl Into<NodeId>) -> Self {
        Self {
            name: None,
            node: node.into(),
            node_entered_at: Utc::now(),
            ended_at: None,
            sub_execution: None,
            children: BTreeMap::new(),
        }
    }

    /// Create a named (child) pointer resting on `node`
    pub fn new(name: impl Into<String>, node: impl Into<NodeId>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::root(node)
        }
    }

    /// Add a child pointer (builder style)
    pub fn with_child(mut self, child: ExecutionPointer) -> Self {
        self.add_child(child);
        self
    }

    /// Attach a sub-process execution (builder style)
    pub fn with_sub_execution(mut self, execution: ProcessExecution) -> Self {
        self.sub_execution = Some(Box::new(execution));
        self
    }

    /// Whether this is the root pointer
    pub fn is_root(&self) -> bool {
        self.name.is_none()
    }

    /// The pointer name, or `root_name` for the root pointer
    pub fn display_name<'a>(&'a self, root_name: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(root_name)
    }

    /// Add a child pointer, replacing any child of the same name
    pub fn add_child(&mut self, child: ExecutionPointer) -> &mut ExecutionPointer {
        let key = child.name.clone().unwrap_or_default();
        match self.children.entry(key) {
            Entry::Occupied(mut entry) => {
                entry.insert(child);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(child),
        }
    }

    /// Get a direct child by name
    pub fn child(&self, name: &str) -> Option<&ExecutionPointer> {
        self.children.get(name)
    }

    /// Get a direct child by name (mutable)
    pub fn child_mut(&mut self, name: &str) -> Option<&mut ExecutionPointer> {
        self.children.get_mut(name)
    }

    /// Find a descendant by path (`""` is this pointer, `"a/b"` a grandchild)
    pub fn find(&self, path: &str) -> Option<&ExecutionPointer> {
        if path.is_empty() {
            return Some(self);
        }
        path.split(PATH_SEPARATOR)
            .try_fold(self, |pointer, name| pointer.child(name))
    }

    /// Find a descendant by path (mutable)
    pub fn find_mut(&mut self, path: &str) -> Option<&mut ExecutionPointer> {
        if path.is_empty() {
            return Some(self);
        }
        path.split(PATH_SEPARATOR)
            .try_fold(self, |pointer, name| pointer.child_mut(name))
    }

    /// Find a descendant by the names leading to it (empty is this pointer).
    ///
    /// Unlike `find`, names may contain the path separator.
    pub fn descend<S: AsRef<str>>(&self, names: &[S]) -> Option<&ExecutionPointer> {
        names
            .iter()
            .try_fold(self, |pointer, name| pointer.child(name.as_ref()))
    }

    /// Every pointer in this subtree with its path, parents before children
    pub fn pointers(&self) -> Vec<(String, &ExecutionPointer)> {
        fn walk<'a>(path: String, pointer: &'a ExecutionPointer, out: &mut Vec<(String, &'a ExecutionPointer)>) {
            for (name, child) in &pointer.children {
                let child_path = join_path(&path, name);
                out.push((child_path.clone(), child));
                walk(child_path, child, out);
            }
        }

        let mut out = vec![(String::new(), self)];
        walk(String::new(), self, &mut out);
        out
    }

    /// Whether this pointer has ended
    pub fn has_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    fn end(&mut self, at: DateTime<Utc>) {
        if self.ended_at.is_none() {
            self.ended_at = Some(at);
        }
        if let Some(sub) = self.sub_execution.as_deref_mut() {
            sub.end_at(at);
        }
        for child in self.children.values_mut() {
            child.end(at);
        }
    }
}

/// Join a parent pointer path and a child name
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", parent, PATH_SEPARATOR, name)
    }
}

/// One run of a specific process graph version
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessExecution {
    /// Unique identifier for this execution
    pub id: ExecutionId,
    /// Name of the graph this execution was started from
    pub graph_name: String,
    /// Version of the graph this execution was started from
    pub graph_version: u32,
    /// Root of the pointer tree
    pub root: ExecutionPointer,
    /// Execution variables
    #[serde(default)]
    pub variables: Variables,
    /// When the execution was created
    pub started_at: DateTime<Utc>,
    /// Set once the execution has ended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Owning pointer, for sub-process executions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_pointer: Option<SuperPointer>,
}

impl ProcessExecution {
    /// Create a new execution with its root pointer on `root_node`
    pub fn new(graph_name: impl Into<String>, graph_version: u32, root_node: impl Into<NodeId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            graph_name: graph_name.into(),
            graph_version,
            root: ExecutionPointer::root(root_node),
            variables: Variables::new(),
            started_at: Utc::now(),
            ended_at: None,
            super_pointer: None,
        }
    }

    /// Replace the root pointer (builder style)
    pub fn with_root(mut self, root: ExecutionPointer) -> Self {
        self.root = root;
        self
    }

    /// Find a pointer by path (`""` for the root)
    pub fn pointer(&self, path: &str) -> Option<&ExecutionPointer> {
        self.root.find(path)
    }

    /// Find a pointer by path (mutable)
    pub fn pointer_mut(&mut self, path: &str) -> Option<&mut ExecutionPointer> {
        self.root.find_mut(path)
    }

    /// Find the pointer a `SuperPointer` path names
    pub fn pointer_at<S: AsRef<str>>(&self, names: &[S]) -> Option<&ExecutionPointer> {
        self.root.descend(names)
    }

    /// Every sub-process execution nested anywhere below this execution
    pub fn sub_executions(&self) -> Vec<&ProcessExecution> {
        fn collect<'a>(pointer: &'a ExecutionPointer, out: &mut Vec<&'a ProcessExecution>) {
            if let Some(sub) = pointer.sub_execution.as_deref() {
                out.push(sub);
                collect(&sub.root, out);
            }
            for child in pointer.children.values() {
                collect(child, out);
            }
        }

        let mut out = Vec::new();
        collect(&self.root, &mut out);
        out
    }

    /// Whether this execution has ended
    pub fn has_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    /// End this execution, every pointer and every nested sub-execution
    pub fn end(&mut self) {
        self.end_at(Utc::now());
    }

    fn end_at(&mut self, at: DateTime<Utc>) {
        if self.ended_at.is_none() {
            self.ended_at = Some(at);
        }
        self.root.end(at);
    }
}
