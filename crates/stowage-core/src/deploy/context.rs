//! Execution context handed to deployers

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;

use crate::graph::{Dependency, DependencyGraph, Node, NodeId};
use crate::{Error, Result};

use super::assignments::DeployAssignments;

/// Open-ended options passed to every deployer.
///
/// Deployers read the keys they know and must ignore unknown keys, so new
/// options can be introduced without breaking existing deployers.
pub type DeployOptions = BTreeMap<String, serde_json::Value>;

/// View of the resolved graph plus the deploy folder side table
pub struct DeployContext<'a> {
    graph: &'a DependencyGraph,
    assignments: &'a mut DeployAssignments,
    messages: &'a mut Vec<String>,
}

impl<'a> DeployContext<'a> {
    pub fn new(
        graph: &'a DependencyGraph,
        assignments: &'a mut DeployAssignments,
        messages: &'a mut Vec<String>,
    ) -> Self {
        Self {
            graph,
            assignments,
            messages,
        }
    }

    pub fn graph(&self) -> &DependencyGraph {
        self.graph
    }

    pub fn root(&self) -> NodeId {
        self.graph.root()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.graph.node(id)
    }

    /// Direct and transitive dependencies of the root
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.graph.root_dependencies()
    }

    /// Direct dependencies of the root
    pub fn direct_dependencies(&self) -> Vec<NodeId> {
        self.graph.direct_dependencies(self.graph.root())
    }

    /// Folder a node's files currently live in: its deploy folder if one was
    /// assigned by an earlier deployer, otherwise its package folder
    pub fn package_folder(&self, id: NodeId) -> Option<&Utf8Path> {
        self.assignments.effective_folder(self.graph, id)
    }

    /// Deploy folder assigned so far, if any
    pub fn deploy_folder(&self, id: NodeId) -> Option<&Utf8Path> {
        self.assignments.get(id)
    }

    /// Record that the files of `id` now live in `folder`
    pub fn set_deploy_folder(&mut self, id: NodeId, folder: Utf8PathBuf) -> Result<()> {
        let node = self.graph.get(id).ok_or_else(|| {
            Error::deploy(
                format!("Node {} does not exist in the dependency graph", id.index()),
                "Only nodes listed in the deploy request can be reassigned",
            )
        })?;
        if id == self.graph.root() {
            return Err(Error::deploy(
                format!("Cannot assign a deploy folder to the consumer {}", node.label),
                "Assign deploy folders to dependencies only",
            ));
        }

        tracing::debug!(package = %node.label, folder = %folder, "Assigned deploy folder");
        self.assignments.set(id, folder);
        Ok(())
    }

    /// Emit a progress message tagged with the root's identity
    pub fn info(&mut self, message: impl AsRef<str>) {
        let line = format!("{}: {}", self.graph.root_node().label, message.as_ref());
        tracing::info!("{}", line);
        self.messages.push(line);
    }
}
