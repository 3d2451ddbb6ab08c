//! Configuration file parsing and merging
//!
//! This module handles parsing of `global.toml` and `global.local.toml` in the
//! stowage home folder. The local file is merged on top of the base file.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::reference::{OptionOverride, Profile, Settings};
use crate::{Error, Result};

/// Environment variable overriding the home folder
pub const HOME_ENV: &str = "STOWAGE_HOME";

/// Configuration file in the home folder
pub const CONFIG_FILE: &str = "global.toml";

/// Machine-local overrides of [`CONFIG_FILE`]
pub const LOCAL_CONFIG_FILE: &str = "global.local.toml";

/// Main configuration structure for stowage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Package cache settings
    pub cache: CacheConfig,

    /// Deployment settings
    pub deploy: DeployConfig,

    /// Default host profile
    pub profile: ProfileConfig,

    /// Build-context profile (defaults to the host profile)
    pub build_profile: Option<ProfileConfig>,
}

/// Package cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache folder, relative to the home folder (default: "p")
    pub folder: Utf8PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            folder: Utf8PathBuf::from("p"),
        }
    }
}

/// Deployment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Number of parallel copies (default: number of logical CPUs)
    pub jobs: Option<usize>,

    /// Interpreter used to run deployer scripts (default: "sh")
    pub shell: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            jobs: None,
            shell: "sh".to_string(),
        }
    }
}

/// Profile section: settings and option overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub settings: BTreeMap<String, String>,

    /// Keys are `pattern:option` (or a bare option name), values the option value
    pub options: BTreeMap<String, String>,
}

impl ProfileConfig {
    fn to_profile(&self) -> Result<Profile> {
        let mut settings = default_settings();
        for (key, value) in &self.settings {
            settings.set(key.clone(), value.clone());
        }

        let options = self
            .options
            .iter()
            .map(|(key, value)| OptionOverride::parse(&format!("{}={}", key, value)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Profile { settings, options })
    }
}

/// Settings used when the configuration does not define them
pub fn default_settings() -> Settings {
    let mut settings = Settings::new();
    settings.set("build_type", "Release");
    settings.set("arch", std::env::consts::ARCH);
    settings
}

impl Config {
    /// Load `global.toml` from a home folder, with `global.local.toml`
    /// layered on top when present. Missing files mean defaults.
    pub fn load(home: &Utf8Path) -> Result<Self> {
        let layers = [home.join(CONFIG_FILE), home.join(LOCAL_CONFIG_FILE)];

        let mut merged = toml::Value::Table(toml::map::Map::new());
        for path in &layers {
            if let Some(layer) = read_toml(path)? {
                tracing::debug!(path = %path, "Loaded configuration layer");
                merged = merge_toml_values(merged, layer);
            }
        }

        Ok(merged.try_into()?)
    }

    /// Parse a single configuration document
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Get the effective number of parallel copies
    pub fn effective_jobs(&self) -> usize {
        self.deploy
            .jobs
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()))
            .max(1)
    }

    /// Cache folder for a given home folder
    pub fn cache_folder(&self, home: &Utf8Path) -> Utf8PathBuf {
        if self.cache.folder.is_absolute() {
            self.cache.folder.clone()
        } else {
            home.join(&self.cache.folder)
        }
    }

    /// Host profile with defaults filled in
    pub fn host_profile(&self) -> Result<Profile> {
        self.profile.to_profile().map_err(invalid_profile)
    }

    /// Build-context profile; falls back to the host profile
    pub fn build_profile(&self) -> Result<Profile> {
        match self.build_profile {
            Some(ref profile) => profile.to_profile().map_err(invalid_profile),
            None => self.host_profile(),
        }
    }
}

fn invalid_profile(e: Error) -> Error {
    Error::config(
        format!("Invalid profile: {}", e),
        "Option keys in [profile.options] look like \"pattern:option\"",
    )
}

/// Resolve the stowage home folder: explicit value, then `STOWAGE_HOME`, then `~/.stowage`
pub fn resolve_home(explicit: Option<&Utf8Path>) -> Result<Utf8PathBuf> {
    if let Some(home) = explicit {
        return Ok(home.to_path_buf());
    }
    if let Ok(home) = std::env::var(HOME_ENV) {
        if !home.is_empty() {
            return Ok(Utf8PathBuf::from(home));
        }
    }

    let user_home = dirs::home_dir().ok_or_else(|| {
        Error::config(
            "Cannot determine the user's home directory",
            format!("Set {} or pass --home", HOME_ENV),
        )
    })?;
    let user_home = Utf8PathBuf::try_from(user_home).map_err(|e| {
        Error::config(
            format!("Home directory is not valid UTF-8: {}", e),
            format!("Set {} to a UTF-8 path", HOME_ENV),
        )
    })?;
    Ok(user_home.join(".stowage"))
}

fn read_toml(path: &Utf8Path) -> Result<Option<toml::Value>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(toml::from_str(&content)?))
}

/// Layer `local` over `base`. Tables merge key by key; any other value in
/// `local`, arrays included, replaces the one in `base`.
fn merge_toml_values(base: toml::Value, local: toml::Value) -> toml::Value {
    match (base, local) {
        (toml::Value::Table(mut merged), toml::Value::Table(overrides)) => {
            for (key, value) in overrides {
                let value = match merged.remove(&key) {
                    Some(existing) => merge_toml_values(existing, value),
                    None => value,
                };
                merged.insert(key, value);
            }
            toml::Value::Table(merged)
        }
        (_, local) => local,
    }
}
