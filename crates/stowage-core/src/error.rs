//! Error types for stowage

// This warning is a false positive from thiserror macro expansion
#![allow(unused_assignments)]

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for stowage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for stowage
#[derive(Debug, Error, Diagnostic)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[help]
        help: String,
    },

    /// Malformed package reference, setting or option
    #[error("Invalid reference: {message}")]
    Reference {
        message: String,
        #[help]
        help: String,
    },

    /// Recipe (stowfile.toml) error
    #[error("Recipe error: {message}")]
    Recipe {
        message: String,
        #[help]
        help: String,
    },

    /// Package cache error
    #[error("Cache error: {message}")]
    Cache {
        message: String,
        #[help]
        help: String,
    },

    /// Dependency resolution error
    #[error("Dependency resolution error: {message}")]
    Resolution {
        message: String,
        #[help]
        help: String,
    },

    /// Circular dependency detected
    #[error("Circular dependency detected: {}", .packages.join(" -> "))]
    #[diagnostic(help("Check the requires declared by these packages"))]
    CircularDependency {
        /// Packages involved in the cycle, in traversal order
        packages: Vec<String>,
    },

    /// No deployer matched the requested name
    #[error("Deployer '{name}' not found")]
    DeployerNotFound {
        /// Name as given on the command line
        name: String,
        /// Candidate files that were checked
        searched: Vec<Utf8PathBuf>,
        #[help]
        help: String,
    },

    /// A deployer failed while running
    #[error("Deployer '{name}' failed: {source}")]
    DeployerExecution {
        /// Name of the failing deployer
        name: String,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// Deploy error
    #[error("Deploy error: {message}")]
    Deploy {
        message: String,
        #[help]
        help: String,
    },

    /// Generator error
    #[error("Generator error: {message}")]
    Generator {
        message: String,
        #[help]
        help: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a reference error
    pub fn reference(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Reference {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a recipe error
    pub fn recipe(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Recipe {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a cache error
    pub fn cache(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a dependency resolution error
    pub fn resolution(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Resolution {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a circular dependency error
    pub fn circular_dependency(packages: Vec<String>) -> Self {
        Self::CircularDependency { packages }
    }

    /// Create a deployer-not-found error
    pub fn deployer_not_found(name: impl Into<String>, searched: Vec<Utf8PathBuf>) -> Self {
        let help = format!(
            "Searched {}; built-in deployers are full_deploy and direct_deploy",
            searched
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Self::DeployerNotFound {
            name: name.into(),
            searched,
            help,
        }
    }

    /// Wrap an error raised while a deployer was running
    pub fn deployer_execution(name: impl Into<String>, source: Error) -> Self {
        Self::DeployerExecution {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Create a deploy error
    pub fn deploy(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Deploy {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a generator error
    pub fn generator(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Generator {
            message: message.into(),
            help: help.into(),
        }
    }
}
