//! Filesystem helpers shared by deployers and the cache

use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

use crate::{Error, Result};

/// Path that leads from folder `from` to `to`; empty when they are equal
pub fn make_relative_path(from: &Utf8Path, to: &Utf8Path) -> Utf8PathBuf {
    let shared = from
        .components()
        .zip(to.components())
        .take_while(|(a, b)| a == b)
        .count();

    let ups = from.components().skip(shared).map(|_| "..");
    let downs = to.components().skip(shared).map(|c| c.as_str());
    ups.chain(downs).collect()
}

fn walk_error(root: &Utf8Path, e: walkdir::Error) -> Error {
    Error::deploy(
        format!("Cannot walk {}: {}", root, e),
        "Check that the package folder is readable",
    )
}

/// Copy the tree under `src` into `dst`, keeping symlinks as symlinks.
/// Existing files in `dst` are overwritten, other files are left alone.
pub fn copy_dir_recursive(src: &Utf8Path, dst: &Utf8Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|e| walk_error(src, e))?;
        let path = Utf8Path::from_path(entry.path()).ok_or_else(|| {
            Error::deploy(
                format!("Package file {:?} has a non UTF-8 name", entry.path()),
                "Rename the file or keep it out of the package",
            )
        })?;
        // WalkDir only yields paths below its root
        let Ok(relative) = path.strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);
        let kind = entry.file_type();

        if kind.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if target.is_symlink() || target.is_file() {
            std::fs::remove_file(&target)?;
        }
        if kind.is_symlink() {
            create_symlink(&std::fs::read_link(path)?, &target)?;
        } else {
            std::fs::copy(path, &target)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn create_symlink(points_to: &std::path::Path, link: &Utf8Path) -> Result<()> {
    std::os::unix::fs::symlink(points_to, link)?;
    Ok(())
}

#[cfg(windows)]
fn create_symlink(points_to: &std::path::Path, link: &Utf8Path) -> Result<()> {
    let is_dir = link
        .parent()
        .map(|p| p.as_std_path().join(points_to).is_dir())
        .unwrap_or(false);
    if is_dir {
        std::os::windows::fs::symlink_dir(points_to, link)?;
    } else {
        std::os::windows::fs::symlink_file(points_to, link)?;
    }
    Ok(())
}

/// Canonical form of `path`, which need not exist yet: the deepest existing
/// ancestor is canonicalized and the missing components are appended.
fn canonical_target(path: &Utf8Path) -> Option<Utf8PathBuf> {
    for ancestor in path.ancestors() {
        if let Ok(existing) = ancestor.canonicalize_utf8() {
            let missing = path.strip_prefix(ancestor).ok()?;
            return Some(existing.join(missing));
        }
    }
    None
}

/// Whether both paths name the same folder after resolving symlinks
pub fn is_same_folder(a: &Utf8Path, b: &Utf8Path) -> bool {
    match (a.canonicalize_utf8(), b.canonicalize_utf8()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Replace `dst` with a fresh copy of `src`
///
/// Anything previously deployed at `dst` is removed first, so files that
/// disappeared from the package do not linger in the deployment. The two
/// folders must not overlap.
pub fn replace_dir(src: &Utf8Path, dst: &Utf8Path) -> Result<()> {
    if !src.is_dir() {
        return Err(Error::deploy(
            format!("Package folder {} does not exist", src),
            "The package may have been removed from the cache; install it again",
        ));
    }

    if let (Ok(source), Some(target)) = (src.canonicalize_utf8(), canonical_target(dst)) {
        if source.starts_with(&target) || target.starts_with(&source) {
            return Err(Error::deploy(
                format!("Cannot replace {} with {}: the folders overlap", dst, src),
                "Deploy into a folder outside the package folder",
            ));
        }
    }

    if dst.is_symlink() || dst.is_file() {
        std::fs::remove_file(dst)?;
    } else if dst.exists() {
        tracing::debug!(path = %dst, "Removing previous deployment");
        std::fs::remove_dir_all(dst)?;
    }

    copy_dir_recursive(src, dst)
}
