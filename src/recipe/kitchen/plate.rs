// src/recipe/kitchen/plate.rs

//! Packaging of installed build output
//!
//! Turns the install staging tree into the final package layout:
//! `include/ lib/ bin/ res/ licenses/`. The package root is always rebuilt
//! from scratch in a sibling staging directory and only swapped into place
//! once every consistency check has passed.

use crate::error::{Error, Result};
use crate::recipe::format::PackageFiles;
use crate::recipe::options::{ResolvedOptions, SHARED};
use crate::settings::{Os, Settings};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Directories copied from the install prefix
const PACKAGE_DIRS: &[&str] = &["include", "lib", "bin", "res"];

/// Where license files land in the package
pub const LICENSES_DIR: &str = "licenses";

/// Build output handed to the packager
#[derive(Debug, Clone)]
pub struct BuildArtifacts {
    /// Install prefix the build tool wrote into
    pub install_dir: PathBuf,
    /// Patched source tree (license files live here)
    pub source_dir: PathBuf,
}

/// Final on-disk package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageLayout {
    pub root: PathBuf,
    /// Packaged files relative to `root`, sorted
    pub files: Vec<PathBuf>,
}

impl PackageLayout {
    /// Scan an existing package root
    pub fn scan(root: &Path) -> Result<Self> {
        Ok(Self {
            root: root.to_path_buf(),
            files: list_files(root)?,
        })
    }

    pub fn contains(&self, relative: impl AsRef<Path>) -> bool {
        let relative = relative.as_ref();
        self.files.iter().any(|f| f == relative)
    }

    /// Packaged license files
    pub fn licenses(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.iter().filter(|f| f.starts_with(LICENSES_DIR))
    }

    /// Files directly under `lib/`
    pub fn libraries(&self) -> impl Iterator<Item = &PathBuf> {
        self.files
            .iter()
            .filter(|f| f.parent() == Some(Path::new("lib")))
    }
}

/// Package the build output into `package_root`
///
/// `libs` are the library names the recipe promises to consumers; each must
/// be present under `lib/` in the form the target OS and link mode produce.
/// On error an existing package at `package_root` is left untouched.
pub fn package(
    artifacts: &BuildArtifacts,
    files: &PackageFiles,
    libs: &[String],
    options: &ResolvedOptions,
    settings: &Settings,
    package_root: &Path,
) -> Result<PackageLayout> {
    stage(artifacts, files, libs, options, settings, package_root)?.commit()
}

/// A checked package waiting in a sibling directory of its final root
#[derive(Debug)]
pub struct StagedPackage {
    staging: tempfile::TempDir,
    parent: PathBuf,
    root: PathBuf,
    files: Vec<PathBuf>,
}

/// Build and check the package next to `package_root` without touching it
pub fn stage(
    artifacts: &BuildArtifacts,
    files: &PackageFiles,
    libs: &[String],
    options: &ResolvedOptions,
    settings: &Settings,
    package_root: &Path,
) -> Result<StagedPackage> {
    let parent = package_root
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;

    let staging = tempfile::Builder::new()
        .prefix(".pantry-package-")
        .tempdir_in(parent)
        .map_err(|e| Error::IoError(format!("Failed to create staging directory: {}", e)))?;
    let stage = staging.path();

    for dir in PACKAGE_DIRS {
        let from = artifacts.install_dir.join(dir);
        if from.is_dir() {
            copy_tree(&from, &stage.join(dir))?;
        }
    }

    let license_count = copy_licenses(&artifacts.source_dir, &files.licenses, stage)?;
    if license_count == 0 {
        warn!(
            "No license files matched {:?} in {}",
            files.licenses,
            artifacts.source_dir.display()
        );
    }

    let mode = if options.contains(SHARED) {
        Some(options.shared())
    } else {
        None
    };
    if let Some(shared) = mode {
        filter_libraries(stage, shared)?;
    }

    remove_residue(stage, &files.remove)?;
    remove_empty_dirs(stage)?;

    let present = list_files(stage)?;
    check_expected(&present, &files.expected, libs, mode, settings.os)?;

    Ok(StagedPackage {
        staging,
        parent: parent.to_path_buf(),
        root: package_root.to_path_buf(),
        files: present,
    })
}

impl StagedPackage {
    /// Staging directory; extra files written here ship with the package
    pub fn path(&self) -> &Path {
        self.staging.path()
    }

    /// Layout the package will have once committed
    pub fn layout(&self) -> PackageLayout {
        PackageLayout {
            root: self.root.clone(),
            files: self.files.clone(),
        }
    }

    /// Swap the staged package into place
    ///
    /// A previous package is moved aside first and only deleted once the
    /// new one is in place. If the swap fails the previous package is
    /// restored.
    pub fn commit(self) -> Result<PackageLayout> {
        let layout = self.layout();
        let root = &self.root;

        let previous = if root.exists() {
            let aside = tempfile::Builder::new()
                .prefix(".pantry-previous-")
                .tempdir_in(&self.parent)
                .map_err(|e| Error::IoError(format!("Failed to create backup directory: {}", e)))?;
            let old = aside.path().join("package");
            fs::rename(root, &old).map_err(|e| {
                Error::PackagingError(format!(
                    "Failed to move previous package {} aside: {}",
                    root.display(),
                    e
                ))
            })?;
            Some((aside, old))
        } else {
            None
        };

        if let Err(e) = fs::rename(self.staging.path(), root) {
            if let Some((_, old)) = &previous {
                if let Err(restore) = fs::rename(old, root) {
                    warn!("Failed to restore previous package {}: {}", root.display(), restore);
                }
            }
            return Err(Error::PackagingError(format!(
                "Failed to move package into {}: {}",
                root.display(),
                e
            )));
        }
        // Moved away; nothing left for the guard to clean up
        let _ = self.staging.keep();

        if let Some((aside, _)) = previous {
            debug!("Removing previous package {}", root.display());
            if let Err(e) = aside.close() {
                warn!("Failed to remove previous package: {}", e);
            }
        }

        info!("Packaged {} files into {}", layout.files.len(), root.display());
        Ok(layout)
    }
}

/// Copy a directory tree in sorted order, preserving symlinks on unix
pub(crate) fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::IoError(format!("Failed to walk {}: {}", from.display(), e)))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| Error::IoError(e.to_string()))?;
        let target = to.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    let points_to = fs::read_link(link)?;
    std::os::unix::fs::symlink(points_to, target)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    fs::copy(link, target)?;
    Ok(())
}

/// Copy top-level license files matching `patterns` into `licenses/`
fn copy_licenses(source_dir: &Path, patterns: &[String], stage: &Path) -> Result<usize> {
    let mut found: Vec<PathBuf> = Vec::new();
    let base = glob::Pattern::escape(&source_dir.to_string_lossy());

    for pattern in patterns {
        let full = format!("{}/{}", base, pattern);
        let paths = glob::glob(&full)
            .map_err(|e| Error::ParseError(format!("Invalid license pattern '{}': {}", pattern, e)))?;
        for path in paths.flatten() {
            if path.is_file() && !found.contains(&path) {
                found.push(path);
            }
        }
    }
    found.sort();

    if found.is_empty() {
        return Ok(0);
    }

    let dest = stage.join(LICENSES_DIR);
    fs::create_dir_all(&dest)?;
    for path in &found {
        if let Some(name) = path.file_name() {
            fs::copy(path, dest.join(name))?;
        }
    }
    Ok(found.len())
}

/// Library flavor from a file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LibKind {
    Static,
    Shared,
    /// Windows `.lib`: static archive or import library
    Ambiguous,
    Other,
}

fn lib_kind(name: &str) -> LibKind {
    if name.ends_with(".dll.a")
        || name.ends_with(".dll")
        || name.ends_with(".dylib")
        || name.ends_with(".so")
        || name.contains(".so.")
    {
        LibKind::Shared
    } else if name.ends_with(".a") {
        LibKind::Static
    } else if name.ends_with(".lib") {
        LibKind::Ambiguous
    } else {
        LibKind::Other
    }
}

/// Drop libraries of the other link mode from `lib/` and `bin/`
fn filter_libraries(stage: &Path, shared: bool) -> Result<()> {
    for dir in ["lib", "bin"] {
        let dir = stage.join(dir);
        if !dir.is_dir() {
            continue;
        }
        let mut entries: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        entries.sort();

        for path in entries {
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => continue,
            };
            let kind = lib_kind(name);
            let unwanted = match (kind, shared) {
                (LibKind::Shared, false) => true,
                (LibKind::Static, true) => true,
                _ => false,
            };
            if unwanted {
                debug!("Dropping {} (shared={})", path.display(), shared);
                fs::remove_file(&path)?;
            }
        }
    }
    Ok(())
}

/// Delete everything matching the residue globs
fn remove_residue(stage: &Path, patterns: &[String]) -> Result<()> {
    let base = glob::Pattern::escape(&stage.to_string_lossy());
    for pattern in patterns {
        let full = format!("{}/{}", base, pattern);
        let mut matches: Vec<PathBuf> = glob::glob(&full)
            .map_err(|e| Error::ParseError(format!("Invalid remove pattern '{}': {}", pattern, e)))?
            .flatten()
            .collect();
        matches.sort();
        for path in matches {
            let meta = match fs::symlink_metadata(&path) {
                Ok(m) => m,
                Err(_) => continue,
            };
            debug!("Removing residue {}", path.display());
            if meta.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
    }
    Ok(())
}

/// Remove empty directories bottom-up (the root itself stays)
fn remove_empty_dirs(stage: &Path) -> Result<()> {
    let dirs: Vec<PathBuf> = WalkDir::new(stage)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();

    for dir in dirs {
        if fs::read_dir(&dir)?.next().is_none() {
            fs::remove_dir(&dir)?;
        }
    }
    Ok(())
}

/// Regular files and symlinks under `root`, relative and sorted
fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::IoError(format!("Failed to walk {}: {}", root.display(), e)))?;
        if entry.file_type().is_dir() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            files.push(relative.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// File names a library may take under `lib/` for one OS and link mode
pub fn library_file_names(lib: &str, os: Os, shared: Option<bool>) -> Vec<String> {
    let static_names = match os {
        Os::Windows => vec![format!("{}.lib", lib), format!("lib{}.lib", lib), format!("lib{}.a", lib)],
        _ => vec![format!("lib{}.a", lib)],
    };
    let shared_names = match os {
        Os::Windows => vec![format!("{}.lib", lib), format!("lib{}.lib", lib), format!("lib{}.dll.a", lib)],
        os if os.is_apple() => vec![format!("lib{}.dylib", lib)],
        _ => vec![format!("lib{}.so", lib)],
    };

    match shared {
        Some(false) => static_names,
        Some(true) => shared_names,
        None => {
            let mut all = static_names;
            for name in shared_names {
                if !all.contains(&name) {
                    all.push(name);
                }
            }
            all
        }
    }
}

fn check_expected(
    present: &[PathBuf],
    expected: &[String],
    libs: &[String],
    shared: Option<bool>,
    os: Os,
) -> Result<()> {
    for path in expected {
        let wanted = Path::new(path);
        let found = present
            .iter()
            .any(|p| p == wanted || p.starts_with(wanted));
        if !found {
            return Err(Error::MissingArtifact {
                path: wanted.to_path_buf(),
            });
        }
    }

    for lib in libs {
        let candidates = library_file_names(lib, os, shared);
        let found = candidates
            .iter()
            .any(|name| present.iter().any(|p| *p == Path::new("lib").join(name)));
        if !found {
            return Err(Error::MissingArtifact {
                path: Path::new("lib").join(&candidates[0]),
            });
        }
    }
    Ok(())
}
