//! Consumer recipe (`stowfile.toml`)
//!
//! ```toml
//! name = "app"            # optional
//! version = "1.0"         # optional
//! requires = ["hello/0.1"]
//! tool_requires = ["cmake/3.28"]
//! generators = ["cmake_deps"]
//! layout = "cmake"        # generators go to build/<build_type>/generators
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::reference::{PackageRef, Settings};
use crate::{Error, Result};

/// Recipe file name looked up in folders
pub const RECIPE_FILE: &str = "stowfile.toml";

/// Where generated files are placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// `build/<build_type>/generators`
    Cmake,
}

/// Parsed `stowfile.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recipe {
    pub name: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub requires: Vec<PackageRef>,
    #[serde(default)]
    pub tool_requires: Vec<PackageRef>,
    #[serde(default)]
    pub generators: Vec<String>,
    pub layout: Option<Layout>,
}

impl Recipe {
    /// Load a recipe file
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::recipe(
                format!("Failed to read {}: {}", path, e),
                format!("Pass a {} file or a folder containing one", RECIPE_FILE),
            )
        })?;
        Self::parse(&content).map_err(|e| match e {
            Error::Recipe { message, help } => Error::Recipe {
                message: format!("{}: {}", path, message),
                help,
            },
            other => other,
        })
    }

    /// Parse recipe text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            Error::recipe(
                e.message().to_string(),
                "Valid keys are name, version, requires, tool_requires, generators and layout",
            )
        })
    }

    /// Reference of the recipe itself, when it declares both name and version
    pub fn reference(&self) -> Option<PackageRef> {
        match (&self.name, &self.version) {
            (Some(name), Some(version)) => Some(PackageRef::new(name.clone(), version.clone())),
            _ => None,
        }
    }

    /// Folder generated files go to, given the install's output folder
    pub fn generators_folder(&self, output_folder: &Utf8Path, settings: &Settings) -> Utf8PathBuf {
        match self.layout {
            Some(Layout::Cmake) => {
                let mut folder = output_folder.join("build");
                if let Some(build_type) = settings.get("build_type") {
                    folder.push(build_type);
                }
                folder.join("generators")
            }
            None => output_folder.to_path_buf(),
        }
    }
}

/// Resolve a recipe argument: a file, or a folder containing `stowfile.toml`
pub fn locate(path: &Utf8Path) -> Result<Utf8PathBuf> {
    let candidate = if path.is_dir() {
        path.join(RECIPE_FILE)
    } else {
        path.to_path_buf()
    };
    if !candidate.is_file() {
        return Err(Error::recipe(
            format!("No recipe found at {}", candidate),
            format!("Create a {} or pass --requires instead", RECIPE_FILE),
        ));
    }
    candidate.canonicalize_utf8().map_err(|e| {
        Error::recipe(
            format!("Failed to canonicalize {}: {}", candidate, e),
            "Ensure the path exists and is accessible",
        )
    })
}
