//! Deployer scripts
//!
//! A script runs as `<shell> <script> <output_folder>` inside the output
//! folder. It learns about the graph from environment variables and protocol
//! files, and hands deploy folder assignments back by appending
//! `id<TAB>folder` lines to the file named by `STOWAGE_DEPLOY_ASSIGNMENTS`.

use camino::{Utf8Path, Utf8PathBuf};
use petgraph::graph::NodeIndex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::process::{ExitStatus, Stdio};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::graph::NodeId;
use crate::reference::{Context, Settings};
use crate::{Error, Result};

use super::context::{DeployContext, DeployOptions};
use super::deployer::Deployer;

pub const OUTPUT_FOLDER_ENV: &str = "STOWAGE_OUTPUT_FOLDER";
pub const ROOT_ENV: &str = "STOWAGE_ROOT";
pub const REQUEST_ENV: &str = "STOWAGE_DEPLOY_REQUEST";
pub const DEPENDENCIES_ENV: &str = "STOWAGE_DEPENDENCIES";
pub const ASSIGNMENTS_ENV: &str = "STOWAGE_DEPLOY_ASSIGNMENTS";
/// Prefix of per-option variables, followed by the upper-cased key
pub const OPTION_ENV_PREFIX: &str = "STOWAGE_OPTION_";

/// A node as described to scripts
#[derive(Debug, Serialize)]
struct NodeView<'a> {
    id: usize,
    reference: Option<String>,
    name: Option<&'a str>,
    version: Option<&'a str>,
    user: Option<&'a str>,
    channel: Option<&'a str>,
    context: Context,
    settings: &'a Settings,
    package_id: Option<&'a str>,
    package_folder: Option<&'a Utf8Path>,
    deploy_folder: Option<&'a Utf8Path>,
    editable: bool,
    dependencies: Vec<usize>,
}

/// Contents of the `STOWAGE_DEPLOY_REQUEST` file
#[derive(Debug, Serialize)]
struct DeployRequest<'a> {
    root: usize,
    nodes: Vec<NodeView<'a>>,
    output_folder: &'a Utf8Path,
    options: &'a DeployOptions,
}

fn deploy_request<'a>(
    ctx: &'a DeployContext<'_>,
    output_folder: &'a Utf8Path,
    options: &'a DeployOptions,
) -> DeployRequest<'a> {
    let graph = ctx.graph();
    let nodes = graph
        .nodes()
        .map(|(id, node)| {
            let reference = node.reference.as_ref();
            NodeView {
                id: id.index(),
                reference: reference.map(|r| r.to_string()),
                name: reference.map(|r| r.name.as_str()),
                version: reference.map(|r| r.version.as_str()),
                user: reference.and_then(|r| r.user.as_deref()),
                channel: reference.and_then(|r| r.channel.as_deref()),
                context: node.context,
                settings: &node.settings,
                package_id: node.package_id.as_deref(),
                package_folder: node.package_folder(),
                deploy_folder: ctx.deploy_folder(id),
                editable: node.is_editable(),
                dependencies: graph
                    .direct_dependencies(id)
                    .into_iter()
                    .map(|d| d.index())
                    .collect(),
            }
        })
        .collect();

    DeployRequest {
        root: graph.root().index(),
        nodes,
        output_folder,
        options,
    }
}

/// `id name version context direct folder` per root dependency
fn dependency_lines(ctx: &DeployContext<'_>) -> String {
    let mut lines = String::new();
    for dep in ctx.dependencies() {
        let node = ctx.node(dep.node);
        let Some(reference) = node.reference.as_ref() else {
            continue;
        };
        let folder = ctx
            .package_folder(dep.node)
            .map(|f| f.as_str())
            .unwrap_or_default();
        let _ = writeln!(
            lines,
            "{}\t{}\t{}\t{}\t{}\t{}",
            dep.node.index(),
            reference.name,
            reference.version,
            node.context,
            dep.direct,
            folder
        );
    }
    lines
}

/// Environment variable name for an option key
fn option_env_name(key: &str) -> String {
    let key: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{}{}", OPTION_ENV_PREFIX, key)
}

fn scalar_option(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse the assignments a script wrote
fn parse_assignments(
    content: &str,
    output_folder: &Utf8Path,
) -> Result<Vec<(NodeId, Utf8PathBuf)>> {
    let mut assignments = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let invalid = || {
            Error::deploy(
                format!("Invalid deploy assignment on line {}: '{}'", index + 1, line),
                format!("Append lines of the form <id><TAB><folder> to ${}", ASSIGNMENTS_ENV),
            )
        };
        let (id, folder) = line.split_once('\t').ok_or_else(invalid)?;
        let id: usize = id.trim().parse().map_err(|_| invalid())?;
        if folder.is_empty() {
            return Err(invalid());
        }

        let folder = Utf8Path::new(folder);
        let folder = if folder.is_absolute() {
            folder.to_path_buf()
        } else {
            output_folder.join(folder)
        };
        assignments.push((NodeIndex::new(id), folder));
    }
    Ok(assignments)
}

/// Deployer backed by a script file
#[derive(Debug, Clone)]
pub struct ScriptDeployer {
    name: String,
    path: Utf8PathBuf,
    shell: String,
}

impl ScriptDeployer {
    pub fn new(name: impl Into<String>, path: impl Into<Utf8PathBuf>, shell: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            shell: shell.into(),
        }
    }
}

/// Feed each line of `stream` to `on_line` as it arrives
async fn for_each_line<R>(stream: R, mut on_line: impl FnMut(&str))
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).split(b'\n');
    while let Ok(Some(line)) = lines.next_segment().await {
        let line = String::from_utf8_lossy(&line);
        on_line(line.trim_end_matches('\r'));
    }
}

impl ScriptDeployer {
    /// Run the script, turning stdout lines into progress messages and
    /// logging stderr lines while the script is still running
    fn run_streaming(&self, mut cmd: Command, ctx: &mut DeployContext<'_>) -> Result<ExitStatus> {
        let spawn_error = |e: std::io::Error| {
            Error::deploy(
                format!("Failed to run deployer {} with '{}': {}", self.path, self.shell, e),
                "Check that the configured deploy shell is installed",
            )
        };

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(spawn_error)?;

        rt.block_on(async {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            let mut child = cmd.spawn().map_err(spawn_error)?;
            let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
                return Err(Error::deploy(
                    format!("Output of deployer {} could not be captured", self.path),
                    "Try running the script by hand",
                ));
            };

            let name = self.name.clone();
            let stderr_task = tokio::spawn(for_each_line(stderr, move |line| {
                tracing::warn!(deployer = %name, "{}", line);
            }));
            for_each_line(stdout, |line| ctx.info(line)).await;

            let status = child.wait().await.map_err(spawn_error)?;
            let _ = stderr_task.await;
            Ok(status)
        })
    }
}

impl Deployer for ScriptDeployer {
    fn name(&self) -> &str {
        &self.name
    }

    fn deploy(
        &self,
        ctx: &mut DeployContext<'_>,
        output_folder: &Utf8Path,
        options: &DeployOptions,
    ) -> Result<()> {
        let protocol_dir = TempDir::new()?;
        let protocol = Utf8Path::from_path(protocol_dir.path()).ok_or_else(|| {
            Error::deploy(
                format!("Temporary folder is not valid UTF-8: {:?}", protocol_dir.path()),
                "Set TMPDIR to a folder with a UTF-8 path",
            )
        })?;
        let request_path = protocol.join("request.json");
        let dependencies_path = protocol.join("dependencies.tsv");
        let assignments_path = protocol.join("assignments.tsv");

        let request = deploy_request(ctx, output_folder, options);
        std::fs::write(&request_path, serde_json::to_string_pretty(&request)?)?;
        std::fs::write(&dependencies_path, dependency_lines(ctx))?;
        std::fs::write(&assignments_path, "")?;

        let mut cmd = Command::new(&self.shell);
        cmd.arg(&self.path)
            .arg(output_folder)
            .current_dir(output_folder)
            .env(OUTPUT_FOLDER_ENV, output_folder)
            .env(ROOT_ENV, &ctx.graph().root_node().label)
            .env(REQUEST_ENV, &request_path)
            .env(DEPENDENCIES_ENV, &dependencies_path)
            .env(ASSIGNMENTS_ENV, &assignments_path);
        let scalars: BTreeMap<String, String> = options
            .iter()
            .filter_map(|(key, value)| scalar_option(value).map(|v| (option_env_name(key), v)))
            .collect();
        cmd.envs(&scalars);

        tracing::debug!("Running: {:?}", cmd);

        let status = self.run_streaming(cmd, ctx)?;
        if !status.success() {
            return Err(Error::deploy(
                format!(
                    "Deployer script {} failed with exit code: {:?}",
                    self.path,
                    status.code()
                ),
                "Check the deployer script's output above",
            ));
        }

        let content = std::fs::read_to_string(&assignments_path)?;
        for (id, folder) in parse_assignments(&content, output_folder)? {
            ctx.set_deploy_folder(id, folder)?;
        }

        Ok(())
    }
}
