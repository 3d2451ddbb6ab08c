//! Built-in deployers
//!
//! `full_deploy` copies every dependency of the root into a folder tree that
//! encodes context, name, version and configuration, so several
//! configurations can share one output folder. `direct_deploy` copies only
//! the root's direct dependencies, one flat folder per package name.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::graph::{Node, NodeId};
use crate::{Error, Result};

use super::context::{DeployContext, DeployOptions};
use super::deployer::Deployer;
use super::utils::{is_same_folder, replace_dir};

/// Options key overriding the number of parallel copies
pub const JOBS_OPTION: &str = "jobs";

/// Destination of a node below `output_folder` for `full_deploy`.
///
/// `full_deploy/<context>/<name>/<version>[/<build_type>][/<arch>]`, using the
/// node's own settings; missing settings drop their segment.
pub fn full_deploy_folder(output_folder: &Utf8Path, node: &Node) -> Option<Utf8PathBuf> {
    let reference = node.reference.as_ref()?;
    let mut folder = output_folder
        .join("full_deploy")
        .join(node.context.to_string())
        .join(&reference.name)
        .join(&reference.version);
    if let Some(build_type) = node.settings.get("build_type") {
        folder.push(build_type);
    }
    if let Some(arch) = node.settings.get("arch") {
        folder.push(arch);
    }
    Some(folder)
}

/// One folder copy; several nodes may share a destination
#[derive(Debug, Clone)]
struct CopyJob {
    nodes: Vec<NodeId>,
    source: Utf8PathBuf,
    destination: Utf8PathBuf,
}

/// Group copies by destination. When nodes collide the last one's files win
/// and every colliding node is assigned the shared folder.
fn plan_copies(ctx: &DeployContext<'_>, sources: Vec<(NodeId, Utf8PathBuf, Utf8PathBuf)>) -> Vec<CopyJob> {
    let mut jobs: Vec<CopyJob> = Vec::new();
    let mut by_destination: BTreeMap<Utf8PathBuf, usize> = BTreeMap::new();

    for (id, source, destination) in sources {
        match by_destination.get(&destination) {
            Some(&index) => {
                let job = &mut jobs[index];
                tracing::warn!(
                    destination = %destination,
                    kept = %ctx.node(id).label,
                    replaced = %ctx.node(job.nodes[job.nodes.len() - 1]).label,
                    "Packages deploy to the same folder; keeping the last one"
                );
                job.nodes.push(id);
                job.source = source;
            }
            None => {
                by_destination.insert(destination.clone(), jobs.len());
                jobs.push(CopyJob {
                    nodes: vec![id],
                    source,
                    destination,
                });
            }
        }
    }

    jobs
}

/// Copy one package folder. A node already living at its destination, for
/// example after the same deployer ran earlier in the chain, is left as is.
fn copy_package(source: &Utf8Path, destination: &Utf8Path) -> Result<()> {
    if is_same_folder(source, destination) {
        tracing::debug!(folder = %destination, "Package already deployed in place");
        return Ok(());
    }
    tracing::debug!(from = %source, to = %destination, "Copying package");
    replace_dir(source, destination)
}

fn assign(ctx: &mut DeployContext<'_>, job: &CopyJob) -> Result<()> {
    for &id in &job.nodes {
        ctx.set_deploy_folder(id, job.destination.clone())?;
    }
    Ok(())
}

/// Copy each job's folder, recording assignments as copies complete
fn run_copies(ctx: &mut DeployContext<'_>, jobs: Vec<CopyJob>, parallel: usize) -> Result<()> {
    if parallel <= 1 || jobs.len() <= 1 {
        for job in &jobs {
            copy_package(&job.source, &job.destination)?;
            assign(ctx, job)?;
        }
        return Ok(());
    }

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(parallel)
        .enable_all()
        .build()
        .map_err(|e| {
            Error::deploy(
                format!("Failed to create async runtime: {}", e),
                "Try again with jobs=1",
            )
        })?;

    rt.block_on(async {
        let semaphore = Arc::new(Semaphore::new(parallel));
        let mut tasks = JoinSet::new();

        for (index, job) in jobs.iter().enumerate() {
            let semaphore = semaphore.clone();
            let source = job.source.clone();
            let destination = job.destination.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|e| {
                    Error::deploy(format!("Copy scheduler closed: {}", e), "Try again with jobs=1")
                })?;
                tokio::task::spawn_blocking(move || copy_package(&source, &destination))
                    .await
                    .map_err(|e| Error::deploy(format!("Copy task failed: {}", e), "Try again with jobs=1"))??;
                Ok::<usize, Error>(index)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let finished = joined
                .map_err(|e| Error::deploy(format!("Copy task failed: {}", e), "Try again with jobs=1"))
                .and_then(|r| r);
            match finished {
                Ok(index) => assign(&mut *ctx, &jobs[index])?,
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        Ok(())
    })
}

fn jobs_from_options(options: &DeployOptions, default: usize) -> usize {
    options
        .get(JOBS_OPTION)
        .and_then(|v| match v {
            serde_json::Value::String(s) => s.parse::<usize>().ok(),
            other => other.as_u64().map(|n| n as usize),
        })
        .unwrap_or(default)
        .max(1)
}

/// Copies all dependencies into a configuration-aware folder tree
#[derive(Debug, Clone)]
pub struct FullDeploy {
    jobs: usize,
}

impl FullDeploy {
    /// `jobs` bounds the number of concurrent folder copies
    pub fn new(jobs: usize) -> Self {
        Self { jobs: jobs.max(1) }
    }
}

impl Deployer for FullDeploy {
    fn name(&self) -> &str {
        "full_deploy"
    }

    fn deploy(
        &self,
        ctx: &mut DeployContext<'_>,
        output_folder: &Utf8Path,
        options: &DeployOptions,
    ) -> Result<()> {
        ctx.info(format!("built-in full deployer to {}", output_folder));

        let mut sources = Vec::new();
        for dep in ctx.dependencies() {
            let node = ctx.node(dep.node);
            let Some(source) = ctx.package_folder(dep.node) else {
                continue;
            };
            let Some(destination) = full_deploy_folder(output_folder, node) else {
                continue;
            };
            sources.push((dep.node, source.to_path_buf(), destination));
        }

        let jobs = plan_copies(ctx, sources);
        run_copies(ctx, jobs, jobs_from_options(options, self.jobs))
    }
}

/// Copies the root's direct dependencies into `direct_deploy/<name>`
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectDeploy;

impl Deployer for DirectDeploy {
    fn name(&self) -> &str {
        "direct_deploy"
    }

    fn deploy(
        &self,
        ctx: &mut DeployContext<'_>,
        output_folder: &Utf8Path,
        _options: &DeployOptions,
    ) -> Result<()> {
        let output_folder = output_folder.join("direct_deploy");
        ctx.info(format!("built-in direct deployer to {}", output_folder));

        let mut sources = Vec::new();
        for id in ctx.direct_dependencies() {
            let node = ctx.node(id);
            let (Some(name), Some(source)) = (node.name(), ctx.package_folder(id)) else {
                continue;
            };
            sources.push((id, source.to_path_buf(), output_folder.join(name)));
        }

        let jobs = plan_copies(ctx, sources);
        run_copies(ctx, jobs, 1)
    }
}
