//! Path expressions relative to a relocatable root
//!
//! A generated file refers to a deployed package through a marker that the
//! consuming tool expands to the file's own folder (`${CMAKE_CURRENT_LIST_DIR}`
//! for CMake, `$script_folder` for shell scripts). Packages that were never
//! deployed keep their absolute package folder.

use camino::{Utf8Path, Utf8PathBuf};

use crate::deploy::{make_relative_path, DeployAssignments};
use crate::graph::{DependencyGraph, NodeId};

/// Marker expanded by CMake to the folder of the current list file
pub const CMAKE_MARKER: &str = "${CMAKE_CURRENT_LIST_DIR}";

/// Marker set by generated shell scripts to their own folder
pub const SHELL_MARKER: &str = "$script_folder";

fn forward_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// Rewrites package folders for one generated file
#[derive(Debug)]
pub struct PathRewriter<'a> {
    graph: &'a DependencyGraph,
    assignments: &'a DeployAssignments,
    file_folder: Utf8PathBuf,
    marker: &'a str,
}

impl<'a> PathRewriter<'a> {
    /// `file_folder` is the folder the generated file will be written to
    pub fn new(
        graph: &'a DependencyGraph,
        assignments: &'a DeployAssignments,
        file_folder: impl Into<Utf8PathBuf>,
        marker: &'a str,
    ) -> Self {
        Self {
            graph,
            assignments,
            file_folder: file_folder.into(),
            marker,
        }
    }

    /// Expression for a deploy folder seen from the generated file
    fn relative_expr(&self, folder: &Utf8Path) -> String {
        let relative = make_relative_path(&self.file_folder, folder);
        if relative.as_str().is_empty() {
            self.marker.to_string()
        } else {
            format!("{}/{}", self.marker, forward_slashes(relative.as_str()))
        }
    }

    /// Folder expression for a node, or `None` for nodes without files
    pub fn package_folder(&self, id: NodeId) -> Option<String> {
        match self.assignments.get(id) {
            Some(folder) => Some(self.relative_expr(folder)),
            None => self
                .graph
                .node(id)
                .package_folder()
                .map(|f| forward_slashes(f.as_str())),
        }
    }

    /// Replace every absolute deploy folder in `text` with its marker
    /// expression, longest folders first.
    ///
    /// A match only counts when it ends at a path boundary, so `/out/a` does
    /// not rewrite part of `/out/ab`.
    pub fn relativize(&self, text: &str) -> String {
        let mut folders: Vec<&Utf8Path> = self.assignments.iter().map(|(_, f)| f).collect();
        folders.sort_by_key(|f| std::cmp::Reverse(f.as_str().len()));
        folders.dedup();

        let mut result = text.to_string();
        for folder in folders {
            let needle = forward_slashes(folder.as_str());
            if needle.is_empty() {
                continue;
            }
            result = replace_at_boundaries(&result, &needle, &self.relative_expr(folder));
        }
        result
    }
}

fn is_path_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '+')
}

fn replace_at_boundaries(text: &str, needle: &str, replacement: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(needle) {
        let end = pos + needle.len();
        let at_boundary = rest[end..].chars().next().map_or(true, |c| !is_path_char(c));
        result.push_str(&rest[..pos]);
        if at_boundary {
            result.push_str(replacement);
        } else {
            result.push_str(needle);
        }
        rest = &rest[end..];
    }
    result.push_str(rest);
    result
}
