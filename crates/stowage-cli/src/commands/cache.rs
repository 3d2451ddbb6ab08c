//! Cache command implementation

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Subcommand};
use miette::{IntoDiagnostic, Result};
use stowage_core::cache::PackageInfo;
use stowage_core::graph::CppInfo;
use stowage_core::install::Installer;
use stowage_core::reference::{parse_key_value, PackageRef};

/// Cache subcommands
#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Store a prebuilt package folder in the cache
    Add(AddArgs),

    /// Remove packages matching a pattern (`*`, `name`, `name/version`)
    Remove {
        /// Pattern to match
        pattern: String,
    },

    /// Print the cache folder
    Path,
}

/// Arguments for `cache add`
#[derive(Debug, Args)]
pub struct AddArgs {
    /// Folder with the package contents
    pub folder: Utf8PathBuf,

    /// Package name
    #[arg(long)]
    pub name: String,

    /// Package version
    #[arg(long)]
    pub version: String,

    /// Setting the binary was built with
    #[arg(short = 's', long = "settings", value_name = "KEY=VALUE")]
    pub settings: Vec<String>,

    /// Option the binary was built with
    #[arg(short = 'o', long = "options", value_name = "KEY=VALUE")]
    pub options: Vec<String>,

    /// Requirement of the package
    #[arg(long = "requires", value_name = "REF")]
    pub requires: Vec<PackageRef>,

    /// Include folder relative to the package (default: include)
    #[arg(long = "include-dir", value_name = "DIR")]
    pub include_dirs: Vec<String>,

    /// Library folder relative to the package (default: lib)
    #[arg(long = "lib-dir", value_name = "DIR")]
    pub lib_dirs: Vec<String>,

    /// Binary folder relative to the package (default: bin)
    #[arg(long = "bin-dir", value_name = "DIR")]
    pub bin_dirs: Vec<String>,

    /// CMake module shipped by the package
    #[arg(long = "build-module", value_name = "PATH")]
    pub build_modules: Vec<String>,
}

fn package_info(args: &AddArgs) -> Result<PackageInfo> {
    let reference: PackageRef = format!("{}/{}", args.name, args.version)
        .parse()
        .into_diagnostic()?;
    let mut info = PackageInfo::new(reference);
    info.requires = args.requires.clone();
    for arg in &args.settings {
        let (key, value) = parse_key_value(arg).into_diagnostic()?;
        info.settings.set(key, value);
    }
    for arg in &args.options {
        let (key, value) = parse_key_value(arg).into_diagnostic()?;
        info.options.set(key, value);
    }

    let defaults = CppInfo::default();
    let pick = |given: &[String], default: Vec<String>| {
        if given.is_empty() {
            default
        } else {
            given.to_vec()
        }
    };
    info.cpp_info = CppInfo {
        includedirs: pick(&args.include_dirs, defaults.includedirs),
        libdirs: pick(&args.lib_dirs, defaults.libdirs),
        bindirs: pick(&args.bin_dirs, defaults.bindirs),
        build_modules: args.build_modules.clone(),
    };
    Ok(info)
}

/// Run a cache subcommand
pub fn run(home: &Utf8Path, current_dir: &Utf8Path, command: CacheCommand) -> Result<()> {
    let installer = Installer::from_home(home).into_diagnostic()?;
    let cache = installer.cache();

    match command {
        CacheCommand::Add(args) => {
            let info = package_info(&args)?;
            let folder = if args.folder.is_absolute() {
                args.folder.clone()
            } else {
                current_dir.join(&args.folder)
            };
            let stored = cache.add_package(info, &folder).into_diagnostic()?;
            println!("{}:{}", stored.info.reference, stored.package_id);
        }
        CacheCommand::Remove { pattern } => {
            let removed = cache.remove(&pattern).into_diagnostic()?;
            if removed.is_empty() {
                tracing::warn!("No packages match '{}'", pattern);
            }
            for reference in removed {
                println!("Removed {}", reference);
            }
        }
        CacheCommand::Path => {
            println!("{}", cache.root());
        }
    }

    Ok(())
}
