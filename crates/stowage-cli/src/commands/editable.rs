//! Editable command implementation

use camino::{Utf8Path, Utf8PathBuf};
use clap::Subcommand;
use miette::{IntoDiagnostic, Result};
use stowage_core::install::Installer;
use stowage_core::reference::PackageRef;

/// Editable subcommands
#[derive(Debug, Subcommand)]
pub enum EditableCommand {
    /// Use a source folder in place of cached binaries
    Add {
        /// Source folder
        path: Utf8PathBuf,

        /// Package name
        #[arg(long)]
        name: String,

        /// Package version
        #[arg(long)]
        version: String,
    },

    /// Stop using the source folder of a reference
    Remove {
        /// Reference (name/version)
        reference: PackageRef,
    },
}

/// Run an editable subcommand
pub fn run(home: &Utf8Path, current_dir: &Utf8Path, command: EditableCommand) -> Result<()> {
    let installer = Installer::from_home(home).into_diagnostic()?;
    let cache = installer.cache();

    match command {
        EditableCommand::Add {
            path,
            name,
            version,
        } => {
            let reference: PackageRef = format!("{}/{}", name, version).parse().into_diagnostic()?;
            let path = if path.is_absolute() {
                path
            } else {
                current_dir.join(path)
            };
            let path = cache.add_editable(&reference, &path).into_diagnostic()?;
            println!("{} -> {}", reference, path);
        }
        EditableCommand::Remove { reference } => {
            if cache.remove_editable(&reference).into_diagnostic()? {
                println!("Removed editable {}", reference);
            } else {
                tracing::warn!("{} is not in editable mode", reference);
            }
        }
    }

    Ok(())
}
