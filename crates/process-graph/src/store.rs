//! Versioned graph storage with file persistence.
//!
//! The store keeps every deployed version of every process graph, so that
//! executions started from an older version can still be inspected while the
//! latest version is what new executions (and migrations) bind to.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{GraphError, Result};
use crate::types::ProcessGraph;

/// Read access to deployed process graphs.
///
/// This is the only view of graph storage the migrator depends on.
pub trait GraphRepository: Send + Sync {
    /// Get the most recently deployed version of the named graph
    fn find_latest_graph(&self, name: &str) -> Result<Arc<ProcessGraph>>;

    /// Get a specific version of the named graph
    fn find_graph(&self, name: &str, version: u32) -> Result<Arc<ProcessGraph>>;
}

/// Metadata for a stored graph (for listing).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMetadata {
    pub name: String,
    pub latest_version: u32,
    pub version_count: usize,
    pub node_count: usize,
}

/// In-memory, versioned graph store with optional file persistence.
///
/// Each deployment of a graph name gets the next version number. With
/// persistence enabled every version is written to
/// `<dir>/<name>-v<version>.json`.
///
/// # Example
///
/// ```ignore
/// let store = GraphStore::with_persistence(".graphs");
/// store.load_from_disk()?;
/// let v2 = store.deploy(GraphBuilder::new("order").start("start").build())?;
/// ```
#[derive(Debug, Default)]
pub struct GraphStore {
    /// Deployed graphs, keyed by name then version.
    graphs: RwLock<HashMap<String, BTreeMap<u32, Arc<ProcessGraph>>>>,
    /// Optional path for file persistence.
    persist_path: Option<PathBuf>,
}

impl GraphStore {
    /// Create a new in-memory store without persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that persists to the given directory.
    ///
    /// The directory will be created if it doesn't exist when saving.
    pub fn with_persistence(path: impl AsRef<Path>) -> Self {
        Self {
            graphs: RwLock::new(HashMap::new()),
            persist_path: Some(path.as_ref().to_path_buf()),
        }
    }

    /// Load all graph versions from the persistence directory.
    ///
    /// Returns the number of graph versions loaded.
    pub fn load_from_disk(&self) -> Result<usize> {
        let Some(ref path) = self.persist_path else {
            return Ok(0);
        };

        if !path.exists() {
            return Ok(0);
        }

        let mut graphs = self.graphs.write();
        let mut count = 0;
        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();

            if file_path.extension().is_some_and(|e| e == "json") {
                let content = std::fs::read_to_string(&file_path)?;
                match serde_json::from_str::<ProcessGraph>(&content) {
                    Ok(graph) => {
                        log::info!(
                            "Loaded process graph '{}' v{} from {:?}",
                            graph.name,
                            graph.version,
                            file_path
                        );
                        graphs
                            .entry(graph.name.clone())
                            .or_default()
                            .insert(graph.version, Arc::new(graph));
                        count += 1;
                    }
                    Err(e) => {
                        log::warn!("Failed to parse process graph from {:?}: {}", file_path, e);
                    }
                }
            }
        }
        Ok(count)
    }

    /// Save a graph version to disk (if persistence is enabled).
    fn save_to_disk(&self, graph: &ProcessGraph) -> Result<()> {
        let Some(ref path) = self.persist_path else {
            return Ok(());
        };

        std::fs::create_dir_all(path)?;
        let file_path = path.join(format!("{}-v{}.json", graph.name, graph.version));
        let content = serde_json::to_string_pretty(graph)?;
        std::fs::write(&file_path, content)?;
        log::debug!("Saved process graph '{}' v{} to {:?}", graph.name, graph.version, file_path);
        Ok(())
    }

    /// Deploy a graph as the next version of its name.
    ///
    /// The version carried by `graph` is ignored and replaced.
    pub fn deploy(&self, mut graph: ProcessGraph) -> Result<Arc<ProcessGraph>> {
        let mut graphs = self.graphs.write();
        let versions = graphs.entry(graph.name.clone()).or_default();
        graph.version = versions.keys().next_back().map_or(1, |latest| latest + 1);

        self.save_to_disk(&graph)?;
        log::info!("Deployed process graph '{}' v{}", graph.name, graph.version);

        let graph = Arc::new(graph);
        versions.insert(graph.version, graph.clone());
        Ok(graph)
    }

    /// Latest deployed version of the named graph
    pub fn latest_version(&self, name: &str) -> Option<u32> {
        self.graphs
            .read()
            .get(name)
            .and_then(|versions| versions.keys().next_back().copied())
    }

    /// Every deployed version of the named graph, oldest first
    pub fn versions(&self, name: &str) -> Vec<u32> {
        self.graphs
            .read()
            .get(name)
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default()
    }

    /// List all stored graphs, sorted by name.
    pub fn list_graphs(&self) -> Vec<GraphMetadata> {
        let graphs = self.graphs.read();
        let mut list: Vec<GraphMetadata> = graphs
            .iter()
            .filter_map(|(name, versions)| {
                versions.values().next_back().map(|latest| GraphMetadata {
                    name: name.clone(),
                    latest_version: latest.version,
                    version_count: versions.len(),
                    node_count: latest.node_ids().len(),
                })
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Check if any version of a graph exists.
    pub fn contains(&self, name: &str) -> bool {
        self.graphs.read().contains_key(name)
    }
}

impl GraphRepository for GraphStore {
    fn find_latest_graph(&self, name: &str) -> Result<Arc<ProcessGraph>> {
        self.graphs
            .read()
            .get(name)
            .and_then(|versions| versions.values().next_back().cloned())
            .ok_or_else(|| GraphError::not_found(name))
    }

    fn find_graph(&self, name: &str, version: u32) -> Result<Arc<ProcessGraph>> {
        let graphs = self.graphs.read();
        let versions = graphs.get(name).ok_or_else(|| GraphError::not_found(name))?;
        versions
            .get(&version)
            .cloned()
            .ok_or_else(|| GraphError::VersionNotFound {
                name: name.to_string(),
                version,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use tempfile::TempDir;

    fn order_graph(first_state: &str) -> ProcessGraph {
        GraphBuilder::new("order")
            .start("start")
            .state(first_state)
            .end("end")
            .build()
    }

    #[test]
    fn test_deploy_assigns_versions() {
        let store = GraphStore::new();

        let v1 = store.deploy(order_graph("A")).unwrap();
        let v2 = store.deploy(order_graph("first")).unwrap();

        assert_eq!(v1.version, 1);
        assert_eq!(v2.version, 2);
        assert_eq!(store.latest_version("order"), Some(2));
        assert_eq!(store.versions("order"), vec![1, 2]);

        let latest = store.find_latest_graph("order").unwrap();
        assert!(latest.contains_node("first"));
        let old = store.find_graph("order", 1).unwrap();
        assert!(old.contains_node("A"));
    }

    #[test]
    fn test_missing_graph_and_version() {
        let store = GraphStore::new();
        store.deploy(order_graph("A")).unwrap();

        assert!(matches!(
            store.find_latest_graph("billing"),
            Err(GraphError::GraphNotFound(name)) if name == "billing"
        ));
        assert!(matches!(
            store.find_graph("order", 7),
            Err(GraphError::VersionNotFound { version: 7, .. })
        ));
    }

    #[test]
    fn test_list_graphs() {
        let store = GraphStore::new();
        store.deploy(order_graph("A")).unwrap();
        store.deploy(order_graph("B")).unwrap();
        store
            .deploy(GraphBuilder::new("billing").start("start").build())
            .unwrap();

        let list = store.list_graphs();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "billing");
        assert_eq!(list[1].name, "order");
        assert_eq!(list[1].latest_version, 2);
        assert_eq!(list[1].version_count, 2);
        assert_eq!(list[1].node_count, 3);
    }

    #[test]
    fn test_persistent_store() {
        let temp_dir = TempDir::new().unwrap();
        let persist_path = temp_dir.path().join("graphs");

        {
            let store = GraphStore::with_persistence(&persist_path);
            store.deploy(order_graph("A")).unwrap();
            store.deploy(order_graph("first")).unwrap();
        }

        {
            let store = GraphStore::with_persistence(&persist_path);
            let count = store.load_from_disk().unwrap();
            assert_eq!(count, 2);
            assert_eq!(store.latest_version("order"), Some(2));
            assert!(store.find_graph("order", 1).unwrap().contains_node("A"));

            let v3 = store.deploy(order_graph("second")).unwrap();
            assert_eq!(v3.version, 3);
        }
    }

    #[test]
    fn test_load_skips_unparsable_files() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("broken.json"), "{ not json").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let store = GraphStore::with_persistence(temp_dir.path());
        assert_eq!(store.load_from_disk().unwrap(), 0);
        assert!(store.list_graphs().is_empty());
    }
}
