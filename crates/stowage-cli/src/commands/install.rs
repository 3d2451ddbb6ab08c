//! Install command implementation

use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use miette::{IntoDiagnostic, Result};
use stowage_core::deploy::DeployOptions;
use stowage_core::install::{InstallRequest, InstallSource, Installer};
use stowage_core::reference::{parse_key_value, PackageRef};

/// Arguments for the install command
#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Recipe file or folder containing stowfile.toml
    pub path: Option<Utf8PathBuf>,

    /// Install these references instead of a recipe
    #[arg(long = "requires", value_name = "REF")]
    pub requires: Vec<PackageRef>,

    /// Additional tool requirements
    #[arg(long = "tool-requires", value_name = "REF")]
    pub tool_requires: Vec<PackageRef>,

    /// Deployers to run, in order
    #[arg(long = "deploy", value_name = "NAME")]
    pub deploy: Vec<String>,

    /// Output folder (defaults to the recipe folder or the current folder)
    #[arg(long = "output-folder", visible_alias = "of", value_name = "DIR")]
    pub output_folder: Option<Utf8PathBuf>,

    /// Generators to run after deploying
    #[arg(short = 'g', long = "generator", value_name = "GEN")]
    pub generators: Vec<String>,

    /// Host setting override
    #[arg(short = 's', long = "settings", value_name = "KEY=VALUE")]
    pub settings: Vec<String>,

    /// Host option override
    #[arg(short = 'o', long = "options", value_name = "PATTERN:KEY=VALUE")]
    pub options: Vec<String>,

    /// Extra parameter passed to every deployer (JSON values accepted)
    #[arg(long = "deploy-option", value_name = "KEY=VALUE")]
    pub deploy_options: Vec<String>,
}

/// Parse `--deploy-option` values; values that are not valid JSON are strings
fn parse_deploy_options(args: &[String]) -> Result<DeployOptions> {
    let mut options = DeployOptions::new();
    for arg in args {
        let (key, value) = parse_key_value(arg).into_diagnostic()?;
        let value = serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
        options.insert(key, value);
    }
    Ok(options)
}

/// Run the install command
pub fn run(home: &Utf8Path, current_dir: &Utf8Path, args: InstallArgs) -> Result<()> {
    let source = match (args.path, args.requires.is_empty()) {
        (Some(_), false) => {
            return Err(miette::miette!(
                help = "Install either a recipe or --requires references",
                "A recipe path cannot be combined with --requires"
            ));
        }
        (Some(path), true) => InstallSource::Recipe(path),
        (None, false) => InstallSource::Requires(args.requires),
        (None, true) => InstallSource::Recipe(Utf8PathBuf::from(".")),
    };

    let mut request = InstallRequest::new(source, current_dir);
    request.tool_requires = args.tool_requires;
    request.deployers = args.deploy;
    request.output_folder = args.output_folder;
    request.generators = args.generators;
    request.settings = args.settings;
    request.options = args.options;
    request.deploy_options = parse_deploy_options(&args.deploy_options)?;

    let installer = Installer::from_home(home).into_diagnostic()?;
    let outcome = installer.install(&request).into_diagnostic()?;

    for (name, origin) in &outcome.report.deployers {
        tracing::debug!("Deployer {} ({})", name, origin);
    }
    if !outcome.report.assignments.is_empty() {
        tracing::info!(
            "Deployed {} packages to {}",
            outcome.report.assignments.len(),
            outcome.output_folder
        );
    }
    for file in &outcome.generated {
        tracing::info!("Generated {}", file);
    }

    Ok(())
}
