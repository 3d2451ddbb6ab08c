//! Resolved dependency graph
//!
//! Nodes are resolved package instances; edges are requirements in declaration
//! order. The graph is immutable once resolution finishes: deployers record
//! relocations in a separate side table keyed by [`NodeId`].

use camino::{Utf8Path, Utf8PathBuf};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

use crate::reference::{Context, Options, PackageRef, Settings};

/// Identity of a node within one graph
pub type NodeId = NodeIndex;

/// Where a node's files come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A local recipe file being installed
    Consumer,
    /// The implicit consumer of `--requires` installs
    Virtual,
    /// A binary stored in the package cache
    Cache,
    /// A package backed by a live source folder
    Editable,
}

/// Folders a package exposes to consumers, relative to its package folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CppInfo {
    pub includedirs: Vec<String>,
    pub libdirs: Vec<String>,
    pub bindirs: Vec<String>,
    pub build_modules: Vec<String>,
}

impl Default for CppInfo {
    fn default() -> Self {
        Self {
            includedirs: vec!["include".to_string()],
            libdirs: vec!["lib".to_string()],
            bindirs: vec!["bin".to_string()],
            build_modules: Vec::new(),
        }
    }
}

/// A resolved package instance
#[derive(Debug, Clone)]
pub struct Node {
    /// Identity used to tag messages (`hello/0.1`, `stowfile.toml`, `cli`)
    pub label: String,
    /// Package reference; `None` only for unnamed consumers
    pub reference: Option<PackageRef>,
    pub kind: NodeKind,
    pub context: Context,
    /// Settings the binary was built with
    pub settings: Settings,
    pub options: Options,
    pub package_id: Option<String>,
    /// Absolute package folder; `None` only for the root consumer
    pub package_folder: Option<Utf8PathBuf>,
    pub cpp_info: CppInfo,
}

impl Node {
    /// Root node for a recipe file
    pub fn consumer(label: impl Into<String>, reference: Option<PackageRef>, settings: Settings) -> Self {
        Self {
            label: label.into(),
            reference,
            kind: NodeKind::Consumer,
            context: Context::Host,
            settings,
            options: Options::new(),
            package_id: None,
            package_folder: None,
            cpp_info: CppInfo::default(),
        }
    }

    /// Root node for `--requires` installs
    pub fn virtual_root(settings: Settings) -> Self {
        Self {
            kind: NodeKind::Virtual,
            ..Self::consumer("cli", None, settings)
        }
    }

    /// A node with a package folder
    pub fn package(
        reference: PackageRef,
        kind: NodeKind,
        context: Context,
        package_folder: Utf8PathBuf,
    ) -> Self {
        Self {
            label: reference.to_string(),
            reference: Some(reference),
            kind,
            context,
            settings: Settings::new(),
            options: Options::new(),
            package_id: None,
            package_folder: Some(package_folder),
            cpp_info: CppInfo::default(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.reference.as_ref().map(|r| r.name.as_str())
    }

    pub fn package_folder(&self) -> Option<&Utf8Path> {
        self.package_folder.as_deref()
    }

    pub fn is_editable(&self) -> bool {
        self.kind == NodeKind::Editable
    }
}

/// Requirement edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    /// Build-time requirement (tool), resolved in the build context
    pub build: bool,
    /// Whether the dependency propagates to consumers of the requirer
    pub visible: bool,
}

impl Requirement {
    /// Regular library requirement
    pub fn host() -> Self {
        Self {
            build: false,
            visible: true,
        }
    }

    /// Tool requirement
    pub fn tool() -> Self {
        Self {
            build: true,
            visible: false,
        }
    }
}

/// A dependency of some node as seen from that node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub node: NodeId,
    /// Required directly by the node
    pub direct: bool,
    /// Reached through a tool requirement
    pub build: bool,
}

/// Resolved dependency graph with a single root
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<Node, Requirement>,
    root: NodeId,
}

impl DependencyGraph {
    /// Create a graph holding only the root
    pub fn new(root: Node) -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(root);
        Self { graph, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_node(&self) -> &Node {
        &self.graph[self.root]
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        self.graph.add_node(node)
    }

    /// Record that `from` requires `to`; edges keep insertion order
    pub fn add_requirement(&mut self, from: NodeId, to: NodeId, requirement: Requirement) {
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, requirement);
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.graph[id]
    }

    /// Look up a node id, returning `None` when it does not belong to this graph
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.graph.node_weight(id)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// All nodes, root first
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.graph
            .node_indices()
            .map(move |idx| (idx, &self.graph[idx]))
    }

    /// Find a node by package name and context
    pub fn find(&self, name: &str, context: Context) -> Option<NodeId> {
        self.nodes()
            .find(|(_, node)| node.name() == Some(name) && node.context == context)
            .map(|(id, _)| id)
    }

    /// Direct requirements of a node, in declaration order
    pub fn requirements(&self, id: NodeId) -> Vec<(NodeId, Requirement)> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(id, Direction::Outgoing)
            .map(|e| (e.id(), e.target(), *e.weight()))
            .collect();
        edges.sort_by_key(|(edge, _, _)| edge.index());
        edges
            .into_iter()
            .map(|(_, target, requirement)| (target, requirement))
            .collect()
    }

    /// Direct dependencies of a node, in declaration order
    pub fn direct_dependencies(&self, id: NodeId) -> Vec<NodeId> {
        self.requirements(id).into_iter().map(|(n, _)| n).collect()
    }

    /// Direct and transitive dependencies of a node.
    ///
    /// Direct requirements are always included. Deeper nodes are reached only
    /// through visible, non-build requirements, so the dependencies of a tool
    /// are not dependencies of its user. Order is breadth-first, direct ones first.
    pub fn dependencies(&self, id: NodeId) -> Vec<Dependency> {
        let mut seen: HashSet<NodeId> = HashSet::from([id]);
        let mut result = Vec::new();
        let mut queue = VecDeque::new();

        for (child, requirement) in self.requirements(id) {
            if seen.insert(child) {
                result.push(Dependency {
                    node: child,
                    direct: true,
                    build: requirement.build,
                });
                if !requirement.build {
                    queue.push_back(child);
                }
            }
        }

        while let Some(current) = queue.pop_front() {
            for (child, requirement) in self.requirements(current) {
                if requirement.visible && !requirement.build && seen.insert(child) {
                    result.push(Dependency {
                        node: child,
                        direct: false,
                        build: false,
                    });
                    queue.push_back(child);
                }
            }
        }

        result
    }

    /// Dependencies of the root node
    pub fn root_dependencies(&self) -> Vec<Dependency> {
        self.dependencies(self.root)
    }
}
