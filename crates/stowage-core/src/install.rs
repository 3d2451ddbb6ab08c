//! End-to-end install: resolve, deploy, generate

use camino::{Utf8Path, Utf8PathBuf};

use crate::cache::PackageCache;
use crate::config::Config;
use crate::deploy::{
    prepare_output_folder, DeployOptions, DeployOrchestrator, DeployerRegistry, DeployerResolver,
    DeploymentReport,
};
use crate::generators::{generators_by_name, write_generators};
use crate::graph::{DependencyGraph, Node};
use crate::recipe::{self, Recipe};
use crate::reference::{PackageRef, Profile};
use crate::resolve::Resolver;
use crate::Result;

/// What is being installed
#[derive(Debug, Clone)]
pub enum InstallSource {
    /// A recipe file, or a folder containing `stowfile.toml`
    Recipe(Utf8PathBuf),
    /// Plain references consumed by a virtual `cli` root
    Requires(Vec<PackageRef>),
}

/// Parameters of one install invocation
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub source: InstallSource,
    /// Extra tool requirements on top of the recipe's
    pub tool_requires: Vec<PackageRef>,
    /// Deployer names, run in this order
    pub deployers: Vec<String>,
    /// Defaults to the recipe folder, or the base folder for `Requires`
    pub output_folder: Option<Utf8PathBuf>,
    /// Extra generators on top of the recipe's
    pub generators: Vec<String>,
    /// `key=value` setting overrides for the host profile
    pub settings: Vec<String>,
    /// `pattern:key=value` option overrides for the host profile
    pub options: Vec<String>,
    pub deploy_options: DeployOptions,
    /// Folder relative paths and local deployers are resolved against
    pub base_folder: Utf8PathBuf,
}

impl InstallRequest {
    pub fn new(source: InstallSource, base_folder: impl Into<Utf8PathBuf>) -> Self {
        Self {
            source,
            tool_requires: Vec::new(),
            deployers: Vec::new(),
            output_folder: None,
            generators: Vec::new(),
            settings: Vec::new(),
            options: Vec::new(),
            deploy_options: DeployOptions::new(),
            base_folder: base_folder.into(),
        }
    }
}

/// Result of a successful install
#[derive(Debug)]
pub struct InstallOutcome {
    pub graph: DependencyGraph,
    pub report: DeploymentReport,
    /// Generated build-integration files
    pub generated: Vec<Utf8PathBuf>,
    pub output_folder: Utf8PathBuf,
    pub generators_folder: Utf8PathBuf,
}

/// The root of an install before resolution
struct RootSpec {
    node: Node,
    recipe: Option<Recipe>,
    requires: Vec<PackageRef>,
    tool_requires: Vec<PackageRef>,
    generators: Vec<String>,
    default_output: Utf8PathBuf,
}

/// Runs installs against one home folder
#[derive(Debug, Clone)]
pub struct Installer {
    config: Config,
    cache: PackageCache,
}

impl Installer {
    pub fn new(home: &Utf8Path, config: Config) -> Self {
        let cache = PackageCache::new(config.cache_folder(home));
        Self { config, cache }
    }

    /// Load `global.toml` from `home` and open its cache
    pub fn from_home(home: &Utf8Path) -> Result<Self> {
        Ok(Self::new(home, Config::load(home)?))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &PackageCache {
        &self.cache
    }

    fn root_spec(&self, request: &InstallRequest, host: &Profile) -> Result<RootSpec> {
        match &request.source {
            InstallSource::Recipe(path) => {
                let path = recipe::locate(&absolute(&request.base_folder, path))?;
                let recipe = Recipe::load(&path)?;
                let reference = recipe.reference();
                let label = match (&reference, path.file_name()) {
                    (Some(reference), _) => reference.to_string(),
                    (None, Some(file_name)) => file_name.to_string(),
                    (None, None) => path.to_string(),
                };
                let default_output = path
                    .parent()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| request.base_folder.clone());

                let mut tool_requires = recipe.tool_requires.clone();
                tool_requires.extend(request.tool_requires.iter().cloned());
                let mut generators = recipe.generators.clone();
                generators.extend(request.generators.iter().cloned());

                Ok(RootSpec {
                    node: Node::consumer(label, reference, host.settings.clone()),
                    requires: recipe.requires.clone(),
                    tool_requires,
                    generators,
                    recipe: Some(recipe),
                    default_output,
                })
            }
            InstallSource::Requires(requires) => Ok(RootSpec {
                node: Node::virtual_root(host.settings.clone()),
                recipe: None,
                requires: requires.clone(),
                tool_requires: request.tool_requires.clone(),
                generators: request.generators.clone(),
                default_output: request.base_folder.clone(),
            }),
        }
    }

    /// Resolve the graph, run the deployers, then write generators.
    ///
    /// Unknown generators and deployers are rejected before anything is
    /// written to the output folder.
    pub fn install(&self, request: &InstallRequest) -> Result<InstallOutcome> {
        let host = self
            .config
            .host_profile()?
            .with_overrides(&request.settings, &request.options)?;
        let build = self.config.build_profile()?;

        let root = self.root_spec(request, &host)?;
        let mut names: Vec<String> = Vec::new();
        for name in &root.generators {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        let generators = generators_by_name(&names)?;

        let graph = Resolver::new(&self.cache, &host, &build).resolve(
            root.node,
            &root.requires,
            &root.tool_requires,
        )?;
        tracing::info!(root = %graph.root_node().label, packages = graph.len() - 1, "Resolved graph");

        let output_folder = match &request.output_folder {
            Some(folder) => absolute(&request.base_folder, folder),
            None => root.default_output,
        };

        let registry = DeployerRegistry::with_builtins(self.config.effective_jobs());
        let resolver = DeployerResolver::new(&request.base_folder, self.cache.deployers_folder(), &registry)
            .with_shell(self.config.deploy.shell.clone());
        let report = if request.deployers.is_empty() {
            DeploymentReport {
                output_folder: prepare_output_folder(&output_folder)?,
                ..DeploymentReport::default()
            }
        } else {
            DeployOrchestrator::new(resolver).run(
                &graph,
                &request.deployers,
                &output_folder,
                &request.deploy_options,
            )?
        };
        let output_folder = report.output_folder.clone();

        let generators_folder = match &root.recipe {
            Some(recipe) => recipe.generators_folder(&output_folder, &graph.root_node().settings),
            None => output_folder.clone(),
        };
        let generated = write_generators(&generators, &graph, &report.assignments, &generators_folder)?;

        Ok(InstallOutcome {
            graph,
            report,
            generated,
            output_folder,
            generators_folder,
        })
    }
}

fn absolute(base: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
