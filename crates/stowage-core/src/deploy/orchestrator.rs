//! Runs a chain of deployers against one resolved graph

use camino::{Utf8Path, Utf8PathBuf};

use crate::graph::DependencyGraph;
use crate::{Error, Result};

use super::assignments::DeployAssignments;
use super::context::{DeployContext, DeployOptions};
use super::deployer::DeployerOrigin;
use super::resolver::DeployerResolver;

/// Outcome of a deployment run
#[derive(Debug, Clone, Default)]
pub struct DeploymentReport {
    /// Canonical output folder
    pub output_folder: Utf8PathBuf,
    /// Final deploy folder of every relocated node
    pub assignments: DeployAssignments,
    /// Progress messages, each tagged with the root identity
    pub messages: Vec<String>,
    /// Deployers that ran, in order
    pub deployers: Vec<(String, DeployerOrigin)>,
}

/// Create `folder` if needed and return its canonical form
pub fn prepare_output_folder(folder: &Utf8Path) -> Result<Utf8PathBuf> {
    std::fs::create_dir_all(folder)?;
    let canonical = folder.canonicalize_utf8().map_err(|e| {
        Error::deploy(
            format!("Failed to canonicalize output folder {}: {}", folder, e),
            "Check that the output folder is accessible",
        )
    })?;
    Ok(canonical)
}

/// Runs deployers in command-line order
#[derive(Debug)]
pub struct DeployOrchestrator<'a> {
    resolver: DeployerResolver<'a>,
}

impl<'a> DeployOrchestrator<'a> {
    pub fn new(resolver: DeployerResolver<'a>) -> Self {
        Self { resolver }
    }

    /// Resolve every name, then run the deployers one after the other.
    ///
    /// Unknown names fail before the output folder is touched. A failing
    /// deployer stops the chain; files it or earlier deployers already wrote
    /// stay in place.
    pub fn run(
        &self,
        graph: &DependencyGraph,
        names: &[String],
        output_folder: &Utf8Path,
        options: &DeployOptions,
    ) -> Result<DeploymentReport> {
        let deployers = self.resolver.resolve_all(names)?;
        let output_folder = prepare_output_folder(output_folder)?;

        let mut assignments = DeployAssignments::new();
        let mut messages = Vec::new();
        let mut ran = Vec::with_capacity(deployers.len());

        for resolved in deployers {
            let span = tracing::info_span!("deploy", deployer = %resolved.name);
            let _enter = span.enter();
            tracing::info!(origin = %resolved.origin, "Running deployer {}", resolved.name);

            let mut ctx = DeployContext::new(graph, &mut assignments, &mut messages);
            resolved
                .deployer
                .deploy(&mut ctx, &output_folder, options)
                .map_err(|e| Error::deployer_execution(&resolved.name, e))?;

            ran.push((resolved.name, resolved.origin));
        }

        Ok(DeploymentReport {
            output_folder,
            assignments,
            messages,
            deployers: ran,
        })
    }
}
