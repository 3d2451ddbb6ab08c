//! Run environment script
//!
//! `stowage_run.sh` prepends the binary and library folders of every runtime
//! dependency to `PATH` and `LD_LIBRARY_PATH`. Source it before running
//! executables that link against deployed packages.

use camino::{Utf8Path, Utf8PathBuf};
use std::fmt::Write as _;

use crate::deploy::DeployAssignments;
use crate::graph::DependencyGraph;
use crate::reference::Context;
use crate::Result;

use super::rewriter::{PathRewriter, SHELL_MARKER};
use super::Generator;

/// File written by [`RunEnv`]
pub const RUN_ENV_SCRIPT: &str = "stowage_run.sh";

fn under(package_folder: &str, dir: &str) -> String {
    if Utf8Path::new(dir).is_absolute() {
        dir.to_string()
    } else {
        format!("{}/{}", package_folder, dir)
    }
}

/// `run_env` generator
#[derive(Debug, Clone, Copy, Default)]
pub struct RunEnv;

impl Generator for RunEnv {
    fn name(&self) -> &'static str {
        "run_env"
    }

    fn generate(
        &self,
        graph: &DependencyGraph,
        assignments: &DeployAssignments,
        folder: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>> {
        let rewriter = PathRewriter::new(graph, assignments, folder, SHELL_MARKER);

        let mut bin_paths = Vec::new();
        let mut lib_paths = Vec::new();
        for dep in graph.root_dependencies() {
            let node = graph.node(dep.node);
            if dep.build || node.context != Context::Host {
                continue;
            }
            let Some(package_folder) = rewriter.package_folder(dep.node) else {
                continue;
            };
            bin_paths.extend(node.cpp_info.bindirs.iter().map(|d| under(&package_folder, d)));
            lib_paths.extend(node.cpp_info.libdirs.iter().map(|d| under(&package_folder, d)));
        }

        let mut content = String::from("#!/bin/sh\n# Generated by stowage\n# Source this file to set up the run environment\n\n");
        content.push_str("script_folder=\"$(cd \"$(dirname \"${BASH_SOURCE:-$0}\")\" && pwd)\"\n");
        if !bin_paths.is_empty() {
            let _ = writeln!(content, "export PATH=\"{}:$PATH\"", bin_paths.join(":"));
        }
        if !lib_paths.is_empty() {
            let _ = writeln!(
                content,
                "export LD_LIBRARY_PATH=\"{}${{LD_LIBRARY_PATH:+:$LD_LIBRARY_PATH}}\"",
                lib_paths.join(":")
            );
        }

        let script = folder.join(RUN_ENV_SCRIPT);
        std::fs::write(&script, rewriter.relativize(&content))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&script)?.permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&script, perms)?;
        }

        Ok(vec![script])
    }
}
