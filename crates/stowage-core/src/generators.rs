//! Build-integration file generators
//!
//! Generators run after all deployers and describe each dependency's folders
//! to a build tool. Paths to deployed packages go through the
//! [`PathRewriter`], so the generated files keep working after the output
//! tree is moved.

mod cmake_deps;
mod rewriter;
mod run_env;

use camino::{Utf8Path, Utf8PathBuf};

use crate::deploy::DeployAssignments;
use crate::graph::DependencyGraph;
use crate::{Error, Result};

pub use cmake_deps::CMakeDeps;
pub use rewriter::{PathRewriter, CMAKE_MARKER, SHELL_MARKER};
pub use run_env::{RunEnv, RUN_ENV_SCRIPT};

/// Writes build-integration files for a deployed graph
pub trait Generator {
    fn name(&self) -> &'static str;

    /// Write files into `folder`, returning the paths written
    fn generate(
        &self,
        graph: &DependencyGraph,
        assignments: &DeployAssignments,
        folder: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>>;
}

/// Names accepted by [`generator_by_name`]
pub const GENERATOR_NAMES: &[&str] = &["cmake_deps", "CMakeDeps", "run_env", "RunEnv"];

/// Look up a generator by name or alias
pub fn generator_by_name(name: &str) -> Result<Box<dyn Generator>> {
    match name {
        "cmake_deps" | "CMakeDeps" => Ok(Box::new(CMakeDeps)),
        "run_env" | "RunEnv" => Ok(Box::new(RunEnv)),
        _ => Err(Error::generator(
            format!("Unknown generator '{}'", name),
            format!("Available generators: {}", GENERATOR_NAMES.join(", ")),
        )),
    }
}

/// Look up every name, failing on the first unknown one
pub fn generators_by_name(names: &[String]) -> Result<Vec<Box<dyn Generator>>> {
    names.iter().map(|name| generator_by_name(name)).collect()
}

/// Run generators into `folder`, creating it if needed
pub fn write_generators(
    generators: &[Box<dyn Generator>],
    graph: &DependencyGraph,
    assignments: &DeployAssignments,
    folder: &Utf8Path,
) -> Result<Vec<Utf8PathBuf>> {
    if generators.is_empty() {
        return Ok(Vec::new());
    }
    std::fs::create_dir_all(folder)?;

    let mut written = Vec::new();
    for generator in generators {
        let files = generator.generate(graph, assignments, folder)?;
        tracing::info!(generator = generator.name(), files = files.len(), "Generated files in {}", folder);
        written.extend(files);
    }
    Ok(written)
}
