//! Package cache storage
//!
//! Layout under the cache folder:
//!
//! ```text
//! p/<name>/<version>/<user|_>/<channel|_>/<package_id>/info.toml
//! p/<name>/<version>/<user|_>/<channel|_>/<package_id>/p/        package folder
//! editable_packages.toml
//! extensions/deploy/                                            deployer extensions
//! ```
//!
//! Package folders are treated as read-only once stored; deployers copy out
//! of them and never write into them.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use walkdir::WalkDir;

use crate::deploy::copy_dir_recursive;
use crate::graph::CppInfo;
use crate::reference::{Options, PackageRef, Settings};
use crate::{Error, Result};

/// Metadata file stored next to each package folder
pub const PACKAGE_INFO_FILE: &str = "info.toml";

/// Registry of editable packages
pub const EDITABLES_FILE: &str = "editable_packages.toml";

/// Length of the hex package ID
const PACKAGE_ID_LEN: usize = 40;

/// Metadata describing one binary package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub reference: PackageRef,
    #[serde(default)]
    pub requires: Vec<PackageRef>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub cpp_info: CppInfo,
}

impl PackageInfo {
    pub fn new(reference: PackageRef) -> Self {
        Self {
            reference,
            requires: Vec::new(),
            settings: Settings::new(),
            options: Options::new(),
            cpp_info: CppInfo::default(),
        }
    }

    /// Binary identity: hash of the settings, options and requirements that
    /// went into the binary. Two binaries of one recipe differ in ID exactly
    /// when one of those differs.
    pub fn package_id(&self) -> String {
        let mut hasher = blake3::Hasher::new();

        hasher.update(b"[settings]\n");
        for (key, value) in self.settings.iter() {
            hasher.update(format!("{}={}\n", key, value).as_bytes());
        }
        hasher.update(b"[options]\n");
        for (key, value) in self.options.iter() {
            hasher.update(format!("{}={}\n", key, value).as_bytes());
        }
        hasher.update(b"[requires]\n");
        let mut requires: Vec<String> = self.requires.iter().map(|r| r.to_string()).collect();
        requires.sort();
        for r in requires {
            hasher.update(r.as_bytes());
            hasher.update(b"\n");
        }

        let mut id = hasher.finalize().to_hex().to_string();
        id.truncate(PACKAGE_ID_LEN);
        id
    }
}

/// A binary package stored in the cache
#[derive(Debug, Clone)]
pub struct CachedPackage {
    pub info: PackageInfo,
    pub package_id: String,
    pub package_folder: Utf8PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EditableRegistry {
    #[serde(default)]
    packages: BTreeMap<String, EditableEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EditableEntry {
    path: Utf8PathBuf,
}

/// File-based package cache
#[derive(Debug, Clone)]
pub struct PackageCache {
    root: Utf8PathBuf,
}

impl PackageCache {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Folder searched for cache deployer extensions
    pub fn deployers_folder(&self) -> Utf8PathBuf {
        self.root.join("extensions").join("deploy")
    }

    fn packages_folder(&self) -> Utf8PathBuf {
        self.root.join("p")
    }

    fn recipe_folder(&self, reference: &PackageRef) -> Utf8PathBuf {
        self.packages_folder()
            .join(&reference.name)
            .join(&reference.version)
            .join(reference.user.as_deref().unwrap_or("_"))
            .join(reference.channel.as_deref().unwrap_or("_"))
    }

    /// Store a prebuilt package folder, replacing a previous binary with the same ID
    pub fn add_package(&self, info: PackageInfo, source: &Utf8Path) -> Result<CachedPackage> {
        if !source.is_dir() {
            return Err(Error::cache(
                format!("Package source folder {} does not exist", source),
                "Pass the folder containing the built package contents",
            ));
        }

        let package_id = info.package_id();
        let binary_folder = self.recipe_folder(&info.reference).join(&package_id);
        if binary_folder.exists() {
            tracing::debug!(package = %info.reference, package_id, "Replacing existing binary");
            std::fs::remove_dir_all(&binary_folder)?;
        }
        std::fs::create_dir_all(&binary_folder)?;

        let content = toml::to_string_pretty(&info).map_err(|e| {
            Error::cache(
                format!("Failed to serialize package info for {}: {}", info.reference, e),
                "This is likely a bug in stowage",
            )
        })?;
        std::fs::write(binary_folder.join(PACKAGE_INFO_FILE), content)?;

        let package_folder = binary_folder.join("p");
        copy_dir_recursive(source, &package_folder)?;

        tracing::info!(package = %info.reference, package_id, "Stored package in cache");
        Ok(CachedPackage {
            info,
            package_id,
            package_folder,
        })
    }

    /// All binaries stored for a reference, ordered by package ID
    pub fn binaries(&self, reference: &PackageRef) -> Result<Vec<CachedPackage>> {
        let recipe_folder = self.recipe_folder(reference);
        if !recipe_folder.is_dir() {
            return Ok(Vec::new());
        }

        let mut binaries = Vec::new();
        for entry in recipe_folder.read_dir_utf8()? {
            let entry = entry?;
            let info_path = entry.path().join(PACKAGE_INFO_FILE);
            if !info_path.is_file() {
                continue;
            }
            let info = load_info(&info_path)?;
            binaries.push(CachedPackage {
                package_id: entry.file_name().to_string(),
                package_folder: entry.path().join("p"),
                info,
            });
        }

        binaries.sort_by(|a, b| a.package_id.cmp(&b.package_id));
        Ok(binaries)
    }

    /// Every reference with at least one stored binary
    pub fn references(&self) -> Result<Vec<PackageRef>> {
        let packages_folder = self.packages_folder();
        if !packages_folder.is_dir() {
            return Ok(Vec::new());
        }

        let mut references = Vec::new();
        // p/name/version/user/channel/package_id/info.toml
        for entry in WalkDir::new(&packages_folder).min_depth(6).max_depth(6) {
            let entry = entry.map_err(|e| {
                Error::cache(
                    format!("Failed to read cache entry: {}", e),
                    "Check permissions of the cache folder",
                )
            })?;
            if entry.file_name() != PACKAGE_INFO_FILE {
                continue;
            }
            let path = Utf8Path::from_path(entry.path()).ok_or_else(|| {
                Error::cache(
                    format!("Path is not valid UTF-8: {:?}", entry.path()),
                    "Ensure the cache folder path is valid UTF-8",
                )
            })?;
            let info = load_info(path)?;
            if !references.contains(&info.reference) {
                references.push(info.reference);
            }
        }

        references.sort();
        Ok(references)
    }

    /// Remove every reference matching `pattern` (`*`, `name`, `name/version`, or a trailing-`*` glob)
    pub fn remove(&self, pattern: &str) -> Result<Vec<PackageRef>> {
        let mut removed = Vec::new();
        for reference in self.references()? {
            if !reference_matches(&reference, pattern) {
                continue;
            }
            let folder = self.recipe_folder(&reference);
            if folder.exists() {
                std::fs::remove_dir_all(&folder)?;
            }
            tracing::info!(package = %reference, "Removed from cache");
            removed.push(reference);
        }
        Ok(removed)
    }

    fn editables_path(&self) -> Utf8PathBuf {
        self.root.join(EDITABLES_FILE)
    }

    fn load_editables(&self) -> Result<EditableRegistry> {
        let path = self.editables_path();
        if !path.exists() {
            return Ok(EditableRegistry::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    fn save_editables(&self, registry: &EditableRegistry) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let content = toml::to_string_pretty(registry).map_err(|e| {
            Error::cache(
                format!("Failed to serialize editable registry: {}", e),
                "This is likely a bug in stowage",
            )
        })?;
        std::fs::write(self.editables_path(), content)?;
        Ok(())
    }

    /// Register `path` as the live source folder of `reference`
    pub fn add_editable(&self, reference: &PackageRef, path: &Utf8Path) -> Result<Utf8PathBuf> {
        let path = path.canonicalize_utf8().map_err(|e| {
            Error::cache(
                format!("Editable folder {} is not accessible: {}", path, e),
                "Pass an existing folder",
            )
        })?;

        let mut registry = self.load_editables()?;
        registry.packages.insert(
            reference.to_string(),
            EditableEntry { path: path.clone() },
        );
        self.save_editables(&registry)?;

        tracing::info!(package = %reference, path = %path, "Added editable package");
        Ok(path)
    }

    /// Unregister an editable; returns whether it was registered
    pub fn remove_editable(&self, reference: &PackageRef) -> Result<bool> {
        let mut registry = self.load_editables()?;
        let removed = registry.packages.remove(&reference.to_string()).is_some();
        if removed {
            self.save_editables(&registry)?;
        }
        Ok(removed)
    }

    /// Source folder of an editable reference
    pub fn editable(&self, reference: &PackageRef) -> Result<Option<Utf8PathBuf>> {
        let registry = self.load_editables()?;
        Ok(registry
            .packages
            .into_iter()
            .find(|(key, _)| {
                key.parse::<PackageRef>()
                    .map(|r| r.same_recipe(reference))
                    .unwrap_or(false)
            })
            .map(|(_, entry)| entry.path))
    }
}

fn load_info(path: &Utf8Path) -> Result<PackageInfo> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| {
        Error::cache(
            format!("Failed to parse {}: {}", path, e),
            "The cache entry may be corrupted. Remove the package and add it again.",
        )
    })
}

fn glob_matches(value: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => value == pattern,
    }
}

fn reference_matches(reference: &PackageRef, pattern: &str) -> bool {
    if pattern.contains('/') {
        glob_matches(&reference.to_string(), pattern)
    } else {
        glob_matches(&reference.name, pattern)
    }
}
