//! Deployment engine
//!
//! This module provides:
//! - Deployer lookup across local scripts, cache extensions and built-ins
//! - The execution context deployers use to read the graph and relocate nodes
//! - The built-in `full_deploy` and `direct_deploy` strategies
//! - Script deployers driven through environment variables and protocol files
//! - The orchestrator that chains deployers for one install

mod assignments;
mod builtin;
mod context;
mod deployer;
mod orchestrator;
mod resolver;
mod script;
mod utils;

pub use assignments::DeployAssignments;
pub use builtin::{full_deploy_folder, DirectDeploy, FullDeploy, JOBS_OPTION};
pub use context::{DeployContext, DeployOptions};
pub use deployer::{Deployer, DeployerOrigin, DeployerRegistry, ResolvedDeployer};
pub use orchestrator::{prepare_output_folder, DeployOrchestrator, DeploymentReport};
pub use resolver::{DeployerResolver, SCRIPT_EXTENSION};
pub use script::{
    ScriptDeployer, ASSIGNMENTS_ENV, DEPENDENCIES_ENV, OPTION_ENV_PREFIX, OUTPUT_FOLDER_ENV,
    REQUEST_ENV, ROOT_ENV,
};
pub use utils::{copy_dir_recursive, make_relative_path, replace_dir};
