//! Graph resolution against the local package cache
//!
//! Only exact versions are supported. A reference resolves to its editable
//! folder when one is registered, otherwise to the first cached binary whose
//! settings and options agree with the profile of its context.

use std::collections::HashMap;

use crate::cache::{CachedPackage, PackageCache};
use crate::graph::{DependencyGraph, Node, NodeId, NodeKind, Requirement};
use crate::recipe::{Recipe, RECIPE_FILE};
use crate::reference::{Context, PackageRef, Profile};
use crate::{Error, Result};

/// Whether a cached binary was built for `profile`
pub fn binary_matches(package: &CachedPackage, profile: &Profile) -> bool {
    let info = &package.info;
    let settings_match = info
        .settings
        .iter()
        .all(|(key, value)| profile.settings.get(key) == Some(value));
    let options_match = info.options.iter().all(|(key, value)| {
        profile
            .option_value(&info.reference.name, key)
            .map_or(true, |wanted| wanted == value)
    });
    settings_match && options_match
}

#[derive(Default)]
struct State {
    index: HashMap<(String, Context), NodeId>,
    /// Nodes whose requirements are being expanded, outermost first
    stack: Vec<NodeId>,
}

/// Builds dependency graphs from the cache
#[derive(Debug)]
pub struct Resolver<'a> {
    cache: &'a PackageCache,
    host: &'a Profile,
    build: &'a Profile,
}

impl<'a> Resolver<'a> {
    pub fn new(cache: &'a PackageCache, host: &'a Profile, build: &'a Profile) -> Self {
        Self { cache, host, build }
    }

    fn profile(&self, context: Context) -> &Profile {
        match context {
            Context::Host => self.host,
            Context::Build => self.build,
        }
    }

    /// Resolve `root` with its requirements; tool requirements resolve in the
    /// build context
    pub fn resolve(
        &self,
        root: Node,
        requires: &[PackageRef],
        tool_requires: &[PackageRef],
    ) -> Result<DependencyGraph> {
        let root_name = root.name().map(|n| n.to_string());
        let mut graph = DependencyGraph::new(root);
        let mut state = State::default();
        let root_id = graph.root();
        if let Some(name) = root_name {
            state.index.insert((name, Context::Host), root_id);
        }

        state.stack.push(root_id);
        for reference in requires {
            self.require(&mut graph, &mut state, root_id, reference, Context::Host, Requirement::host())?;
        }
        for reference in tool_requires {
            self.require(&mut graph, &mut state, root_id, reference, Context::Build, Requirement::tool())?;
        }
        state.stack.pop();

        tracing::debug!(nodes = graph.len(), "Resolved dependency graph");
        Ok(graph)
    }

    fn require(
        &self,
        graph: &mut DependencyGraph,
        state: &mut State,
        from: NodeId,
        reference: &PackageRef,
        context: Context,
        requirement: Requirement,
    ) -> Result<()> {
        let key = (reference.name.clone(), context);
        if let Some(&existing) = state.index.get(&key) {
            if let Some(position) = state.stack.iter().position(|id| *id == existing) {
                let mut packages: Vec<String> = state.stack[position..]
                    .iter()
                    .map(|id| graph.node(*id).label.clone())
                    .collect();
                packages.push(graph.node(existing).label.clone());
                return Err(Error::circular_dependency(packages));
            }

            let node = graph.node(existing);
            if let Some(resolved) = node.reference.as_ref() {
                if resolved.version != reference.version
                    || resolved.user != reference.user
                    || resolved.channel != reference.channel
                {
                    return Err(Error::resolution(
                        format!(
                            "Version conflict for {} in {} context: {} required by {}, but {} is already in the graph",
                            reference.name,
                            context,
                            reference,
                            graph.node(from).label,
                            resolved
                        ),
                        "Align the requirements so every package asks for the same version",
                    ));
                }
            }

            graph.add_requirement(from, existing, requirement);
            return Ok(());
        }

        let (node, requires) = self.load(reference, context)?;
        tracing::debug!(package = %node.label, %context, kind = ?node.kind, "Resolved package");
        let id = graph.add_node(node);
        state.index.insert(key, id);
        graph.add_requirement(from, id, requirement);

        state.stack.push(id);
        for dependency in &requires {
            self.require(graph, state, id, dependency, context, Requirement::host())?;
        }
        state.stack.pop();

        Ok(())
    }

    /// Build the node for a reference and return its own requirements
    fn load(&self, reference: &PackageRef, context: Context) -> Result<(Node, Vec<PackageRef>)> {
        if let Some(folder) = self.cache.editable(reference)? {
            let recipe_path = folder.join(RECIPE_FILE);
            let requires = if recipe_path.is_file() {
                Recipe::load(&recipe_path)?.requires
            } else {
                Vec::new()
            };
            let node = Node::package(reference.clone(), NodeKind::Editable, context, folder);
            return Ok((node, requires));
        }

        let binaries = self.cache.binaries(reference)?;
        if binaries.is_empty() {
            return Err(Error::resolution(
                format!("Package {} not found in the cache", reference),
                format!(
                    "Add it with: stowage cache add <folder> --name {} --version {}",
                    reference.name, reference.version
                ),
            ));
        }

        let profile = self.profile(context);
        let Some(binary) = binaries.iter().find(|b| binary_matches(b, profile)) else {
            let available: Vec<&str> = binaries.iter().map(|b| b.package_id.as_str()).collect();
            return Err(Error::resolution(
                format!(
                    "No binary of {} matches the {} profile settings and options",
                    reference, context
                ),
                format!(
                    "Available package IDs: {}. Adjust -s/-o or add a matching binary",
                    available.join(", ")
                ),
            ));
        };

        let mut node = Node::package(
            reference.clone(),
            NodeKind::Cache,
            context,
            binary.package_folder.clone(),
        );
        node.settings = binary.info.settings.clone();
        node.options = binary.info.options.clone();
        node.package_id = Some(binary.package_id.clone());
        node.cpp_info = binary.info.cpp_info.clone();
        Ok((node, binary.info.requires.clone()))
    }
}
