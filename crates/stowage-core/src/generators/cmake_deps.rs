//! CMake package data files
//!
//! One `<pkg>[-<build_type>][-<arch>]-data.cmake` per host dependency of the
//! root. The configuration comes from the root's settings, so Release and
//! Debug installs into the same folder produce separate files.

use camino::{Utf8Path, Utf8PathBuf};
use std::fmt::Write as _;

use crate::deploy::DeployAssignments;
use crate::graph::{DependencyGraph, Node};
use crate::reference::Context;
use crate::Result;

use super::rewriter::{PathRewriter, CMAKE_MARKER};
use super::Generator;

/// File name for a package's data file under the given root settings
pub fn data_file_name(package: &str, build_type: Option<&str>, arch: Option<&str>) -> String {
    let mut name = package.to_string();
    if let Some(build_type) = build_type {
        name.push('-');
        name.push_str(&build_type.to_lowercase());
    }
    if let Some(arch) = arch {
        name.push('-');
        name.push_str(arch);
    }
    name.push_str("-data.cmake");
    name
}

/// Relative dirs hang off the package folder variable; absolute ones are
/// kept and left to [`PathRewriter::relativize`]
fn quoted_dirs(folder_var: &str, dirs: &[String]) -> String {
    dirs.iter()
        .map(|dir| {
            if Utf8Path::new(dir).is_absolute() {
                format!("\"{}\"", dir)
            } else {
                format!("\"${{{}}}/{}\"", folder_var, dir)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn data_file(name: &str, suffix: &str, folder: &str, node: &Node) -> String {
    let folder_var = format!("{}_PACKAGE_FOLDER{}", name, suffix);
    let version = node
        .reference
        .as_ref()
        .map(|r| r.version.as_str())
        .unwrap_or_default();
    let info = &node.cpp_info;

    let mut out = String::new();
    let _ = writeln!(out, "# Generated by stowage for {}", node.label);
    let _ = writeln!(out, "set({} \"{}\")", folder_var, folder);
    let _ = writeln!(out, "set({}_VERSION{} \"{}\")", name, suffix, version);
    let _ = writeln!(out, "set({}_INCLUDE_DIRS{} {})", name, suffix, quoted_dirs(&folder_var, &info.includedirs));
    let _ = writeln!(out, "set({}_LIB_DIRS{} {})", name, suffix, quoted_dirs(&folder_var, &info.libdirs));
    let _ = writeln!(out, "set({}_BIN_DIRS{} {})", name, suffix, quoted_dirs(&folder_var, &info.bindirs));
    let _ = writeln!(
        out,
        "set({}_BUILD_MODULES_PATHS{} {})",
        name,
        suffix,
        quoted_dirs(&folder_var, &info.build_modules)
    );
    out
}

/// `cmake_deps` generator
#[derive(Debug, Clone, Copy, Default)]
pub struct CMakeDeps;

impl Generator for CMakeDeps {
    fn name(&self) -> &'static str {
        "cmake_deps"
    }

    fn generate(
        &self,
        graph: &DependencyGraph,
        assignments: &DeployAssignments,
        folder: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>> {
        let settings = &graph.root_node().settings;
        let build_type = settings.get("build_type");
        let arch = settings.get("arch");
        let suffix = build_type
            .map(|b| format!("_{}", b.to_uppercase()))
            .unwrap_or_default();
        let rewriter = PathRewriter::new(graph, assignments, folder, CMAKE_MARKER);

        let mut written = Vec::new();
        for dep in graph.root_dependencies() {
            let node = graph.node(dep.node);
            if dep.build || node.context != Context::Host {
                continue;
            }
            let (Some(name), Some(package_folder)) = (node.name(), rewriter.package_folder(dep.node)) else {
                continue;
            };

            let path = folder.join(data_file_name(name, build_type, arch));
            let content = data_file(name, &suffix, &package_folder, node);
            std::fs::write(&path, rewriter.relativize(&content))?;
            tracing::debug!(package = %node.label, file = %path, "Wrote CMake data file");
            written.push(path);
        }

        Ok(written)
    }
}
