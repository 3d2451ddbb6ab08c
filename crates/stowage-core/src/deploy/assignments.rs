//! Deploy folder side table
//!
//! Deployers record here where they copied each node. The graph itself stays
//! untouched; consumers of the graph ask the table for a node's effective
//! folder, which falls back to the original package folder.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;

use crate::graph::{DependencyGraph, NodeId};

/// Mapping from graph node to the folder its files were deployed to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployAssignments {
    folders: HashMap<NodeId, Utf8PathBuf>,
}

impl DeployAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a deploy folder, returning the one it replaces
    pub fn set(&mut self, node: NodeId, folder: Utf8PathBuf) -> Option<Utf8PathBuf> {
        self.folders.insert(node, folder)
    }

    /// Assigned deploy folder, if any deployer set one
    pub fn get(&self, node: NodeId) -> Option<&Utf8Path> {
        self.folders.get(&node).map(|p| p.as_path())
    }

    /// Assigned folder, or the node's original package folder
    pub fn effective_folder<'a>(
        &'a self,
        graph: &'a DependencyGraph,
        node: NodeId,
    ) -> Option<&'a Utf8Path> {
        self.get(node).or_else(|| graph.node(node).package_folder())
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// Assignments ordered by node id
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Utf8Path)> {
        let mut entries: Vec<_> = self
            .folders
            .iter()
            .map(|(id, folder)| (*id, folder.as_path()))
            .collect();
        entries.sort_by_key(|(id, _)| id.index());
        entries.into_iter()
    }
}
