//! Deployer interface and registry

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::Result;

use super::builtin::{DirectDeploy, FullDeploy};
use super::context::{DeployContext, DeployOptions};

/// A deployment strategy.
///
/// Implementations copy or reorganize package files below `output_folder`
/// and may reassign deploy folders through the context.
pub trait Deployer: Send + Sync {
    /// Name used in messages and errors
    fn name(&self) -> &str;

    fn deploy(
        &self,
        ctx: &mut DeployContext<'_>,
        output_folder: &Utf8Path,
        options: &DeployOptions,
    ) -> Result<()>;
}

/// Named deployers available without a script file
#[derive(Clone, Default)]
pub struct DeployerRegistry {
    deployers: BTreeMap<String, Arc<dyn Deployer>>,
}

impl DeployerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `full_deploy` and `direct_deploy`
    pub fn with_builtins(jobs: usize) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FullDeploy::new(jobs)));
        registry.register(Arc::new(DirectDeploy));
        registry
    }

    /// Register a deployer under its own name, replacing any previous one
    pub fn register(&mut self, deployer: Arc<dyn Deployer>) {
        self.deployers.insert(deployer.name().to_string(), deployer);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Deployer>> {
        self.deployers.get(name).cloned()
    }
}

impl fmt::Debug for DeployerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.deployers.keys()).finish()
    }
}

/// Where a resolved deployer was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployerOrigin {
    /// Script relative to the invocation's base folder
    Local(Utf8PathBuf),
    /// Script in the cache's deploy extensions folder
    CacheExtension(Utf8PathBuf),
    /// Registered implementation
    Builtin,
}

impl fmt::Display for DeployerOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployerOrigin::Local(path) => write!(f, "local {}", path),
            DeployerOrigin::CacheExtension(path) => write!(f, "cache extension {}", path),
            DeployerOrigin::Builtin => write!(f, "built-in"),
        }
    }
}

/// A deployer located for one invocation
#[derive(Clone)]
pub struct ResolvedDeployer {
    /// Name as requested
    pub name: String,
    pub origin: DeployerOrigin,
    pub deployer: Arc<dyn Deployer>,
}

impl fmt::Debug for ResolvedDeployer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedDeployer")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .finish()
    }
}
