//! Deployer lookup
//!
//! A deployer name is searched, in order:
//! 1. relative to the invocation's base folder (subfolders allowed)
//! 2. in the cache's `extensions/deploy` folder
//! 3. among the registered built-ins
//!
//! Names without the script extension are tried with it first and then as
//! given. Resolution only inspects the filesystem; nothing is executed.

use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;

use crate::{Error, Result};

use super::deployer::{DeployerOrigin, DeployerRegistry, ResolvedDeployer};
use super::script::ScriptDeployer;

/// Extension of deployer scripts
pub const SCRIPT_EXTENSION: &str = "sh";

/// Locates deployers by name
#[derive(Debug)]
pub struct DeployerResolver<'a> {
    base_folder: &'a Utf8Path,
    extensions_folder: Utf8PathBuf,
    registry: &'a DeployerRegistry,
    shell: String,
}

impl<'a> DeployerResolver<'a> {
    pub fn new(
        base_folder: &'a Utf8Path,
        extensions_folder: impl Into<Utf8PathBuf>,
        registry: &'a DeployerRegistry,
    ) -> Self {
        Self {
            base_folder,
            extensions_folder: extensions_folder.into(),
            registry,
            shell: "sh".to_string(),
        }
    }

    /// Interpreter for the scripts this resolver finds
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// File names to try for `name`, preferred first
    fn candidates(name: &str) -> Vec<String> {
        if Utf8Path::new(name).extension() == Some(SCRIPT_EXTENSION) {
            vec![name.to_string()]
        } else {
            vec![format!("{}.{}", name, SCRIPT_EXTENSION), name.to_string()]
        }
    }

    /// Resolve one deployer name
    pub fn resolve(&self, name: &str) -> Result<ResolvedDeployer> {
        let candidates = Self::candidates(name);
        let mut searched = Vec::new();

        for candidate in &candidates {
            let path = self.base_folder.join(candidate);
            if path.is_file() {
                tracing::debug!(deployer = name, path = %path, "Found local deployer");
                return Ok(self.script(name, path.clone(), DeployerOrigin::Local(path)));
            }
            searched.push(path);
        }

        for candidate in &candidates {
            let path = self.extensions_folder.join(candidate);
            if path.is_file() {
                tracing::debug!(deployer = name, path = %path, "Found cache deployer extension");
                return Ok(self.script(name, path.clone(), DeployerOrigin::CacheExtension(path)));
            }
            searched.push(path);
        }

        let builtin_name = name
            .strip_suffix(&format!(".{}", SCRIPT_EXTENSION))
            .unwrap_or(name);
        if let Some(deployer) = self.registry.get(builtin_name) {
            tracing::debug!(deployer = name, "Using built-in deployer");
            return Ok(ResolvedDeployer {
                name: name.to_string(),
                origin: DeployerOrigin::Builtin,
                deployer,
            });
        }

        Err(Error::deployer_not_found(name, searched))
    }

    /// Resolve every name, failing on the first unknown one
    pub fn resolve_all(&self, names: &[String]) -> Result<Vec<ResolvedDeployer>> {
        names.iter().map(|name| self.resolve(name)).collect()
    }

    fn script(&self, name: &str, path: Utf8PathBuf, origin: DeployerOrigin) -> ResolvedDeployer {
        ResolvedDeployer {
            name: name.to_string(),
            origin,
            deployer: Arc::new(ScriptDeployer::new(name, path, self.shell.clone())),
        }
    }
}
