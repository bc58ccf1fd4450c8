// src/recipe/kitchen/archive.rs

//! Archive and source file utilities for the Kitchen

use crate::error::{Error, Result};
use crate::recipe::build_system::Invocation;
use crate::recipe::kitchen::runner::ToolRunner;
use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tar::Archive;
use tracing::{debug, info, warn};
use xz2::read::XzDecoder;

/// Default timeout for HTTP requests
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Download a file from a URL
///
/// Single attempt. The body is streamed to `dest`; a progress bar is shown
/// when `progress` is set and the server reports a length.
pub fn download_file(url: &str, dest: &Path, progress: bool) -> Result<()> {
    let client = Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| Error::DownloadError(format!("Failed to create HTTP client: {e}")))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| Error::DownloadError(format!("Failed to fetch {}: {e}", url)))?;

    if !response.status().is_success() {
        return Err(Error::DownloadError(format!(
            "HTTP {} from {}",
            response.status(),
            url
        )));
    }

    let mut file = File::create(dest).map_err(|e| {
        Error::IoError(format!("Failed to create file {}: {e}", dest.display()))
    })?;

    let total = response.content_length().unwrap_or(0);
    let written = if progress && total > 0 {
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(
            dest.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        );
        let copied = io::copy(&mut pb.wrap_read(&mut response), &mut file);
        pb.finish_and_clear();
        copied
    } else {
        io::copy(&mut response, &mut file)
    }
    .map_err(|e| Error::DownloadError(format!("Failed to write downloaded data: {e}")))?;

    debug!("Downloaded {} bytes from {}", written, url);
    Ok(())
}

/// Resolve a non-HTTP source location to a local path
///
/// Accepts `file://` URLs and plain paths; relative paths resolve against
/// `base` (the recipe directory).
pub fn local_source_path(location: &str, base: Option<&Path>) -> PathBuf {
    let raw = location.strip_prefix("file://").unwrap_or(location);
    let path = PathBuf::from(raw);
    match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}

pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Archive compression, detected from the file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarXz,
    TarZst,
    Tar,
}

impl ArchiveFormat {
    pub fn detect(path: &Path) -> Result<Self> {
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

        if filename.ends_with(".tar.gz") || filename.ends_with(".tgz") {
            Ok(Self::TarGz)
        } else if filename.ends_with(".tar.xz") || filename.ends_with(".txz") {
            Ok(Self::TarXz)
        } else if filename.ends_with(".tar.zst") || filename.ends_with(".tzst") {
            Ok(Self::TarZst)
        } else if filename.ends_with(".tar") {
            Ok(Self::Tar)
        } else {
            Err(Error::ParseError(format!(
                "Unknown archive format: {} (supported: .tar.gz, .tgz, .tar.xz, .txz, .tar.zst, .tar)",
                filename
            )))
        }
    }
}

fn open_archive(path: &Path) -> Result<Archive<Box<dyn Read>>> {
    let format = ArchiveFormat::detect(path)?;
    let file = File::open(path)
        .map_err(|e| Error::IoError(format!("Failed to open {}: {}", path.display(), e)))?;

    let reader: Box<dyn Read> = match format {
        ArchiveFormat::TarGz => Box::new(GzDecoder::new(file)),
        ArchiveFormat::TarXz => Box::new(XzDecoder::new(file)),
        ArchiveFormat::TarZst => Box::new(
            zstd::Decoder::new(file)
                .map_err(|e| Error::IoError(format!("Failed to create zstd decoder: {}", e)))?,
        ),
        ArchiveFormat::Tar => Box::new(file),
    };

    Ok(Archive::new(reader))
}

/// Extract an archive to a destination directory
///
/// Anything already at `dest` is removed first, so a retried extraction
/// starts clean. With `strip_root`, a single top-level directory is dropped.
pub fn extract_archive(archive: &Path, dest: &Path, strip_root: bool) -> Result<()> {
    // Fail on unknown formats before touching dest
    ArchiveFormat::detect(archive)?;

    if dest.exists() {
        fs::remove_dir_all(dest)?;
    }
    let parent = dest.parent().ok_or_else(|| {
        Error::IoError(format!("Extraction target {} has no parent", dest.display()))
    })?;
    fs::create_dir_all(parent)?;

    let staging = tempfile::Builder::new()
        .prefix(".extract-")
        .tempdir_in(parent)
        .map_err(|e| Error::IoError(format!("Failed to create staging directory: {}", e)))?;

    open_archive(archive)?.unpack(staging.path()).map_err(|e| {
        Error::IoError(format!(
            "Failed to extract {}: {}",
            archive.display(),
            e
        ))
    })?;

    let entries: Vec<_> = fs::read_dir(staging.path())?
        .filter_map(|e| e.ok())
        .collect();

    let root = if strip_root {
        match entries.as_slice() {
            [single] if single.file_type().map(|t| t.is_dir()).unwrap_or(false) => single.path(),
            _ => {
                warn!(
                    "{} has no single top-level directory, extracting as-is",
                    archive.display()
                );
                staging.path().to_path_buf()
            }
        }
    } else {
        staging.path().to_path_buf()
    };

    if root == staging.path() {
        let staging = staging.keep();
        fs::rename(&staging, dest)?;
    } else {
        fs::rename(&root, dest)?;
    }

    debug!("Extracted {} to {}", archive.display(), dest.display());
    Ok(())
}

/// What a patch does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchKind {
    /// Unified diff applied with `patch -p<strip>`
    File { path: PathBuf, strip: u32 },
    /// In-place replacement inside one source file
    Replace {
        file: String,
        search: String,
        replace: String,
        regex: bool,
    },
}

/// A patch ready to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub kind: PatchKind,
    pub description: String,
    /// Failure aborts the cook instead of being skipped
    pub strict: bool,
}

/// Outcome of applying a patch list
#[derive(Debug, Clone, Default)]
pub struct PatchReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

/// Apply patches strictly in list order
///
/// File patches are dry-run first, so a failing patch writes nothing.
/// A failing strict patch aborts; a failing non-strict patch is skipped with
/// a warning.
pub fn apply_patches(
    source_dir: &Path,
    patches: &[Patch],
    runner: &dyn ToolRunner,
    timeout: Option<Duration>,
) -> Result<PatchReport> {
    let mut report = PatchReport::default();

    for patch in patches {
        info!("Applying patch: {}", patch.description);
        let outcome = match &patch.kind {
            PatchKind::File { path, strip } => {
                apply_patch_file(source_dir, path, *strip, runner, timeout)
            }
            PatchKind::Replace {
                file,
                search,
                replace,
                regex,
            } => replace_in_file(&source_dir.join(file), search, replace, *regex),
        };

        match outcome {
            Ok(()) => report.applied.push(patch.description.clone()),
            Err(e) if !patch.strict => {
                warn!("Skipping patch '{}': {}", patch.description, e);
                report
                    .skipped
                    .push(format!("patch '{}' skipped: {}", patch.description, e));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

/// Apply a patch to the source directory
fn apply_patch_file(
    source_dir: &Path,
    patch_path: &Path,
    strip: u32,
    runner: &dyn ToolRunner,
    timeout: Option<Duration>,
) -> Result<()> {
    if !patch_path.exists() {
        return Err(Error::NotFound(format!(
            "Patch file not found: {}",
            patch_path.display()
        )));
    }

    let base = Invocation::new("patch", source_dir)
        .arg("-p")
        .arg(strip.to_string())
        .arg("--batch")
        .arg("--forward")
        .arg("-i")
        .arg(patch_path.to_string_lossy());

    for invocation in [base.clone().arg("--dry-run"), base] {
        let output = runner.run(&invocation, timeout)?;
        if !output.success() {
            return Err(Error::ToolFailed {
                tool: "patch".to_string(),
                phase: "patch".to_string(),
                code: output.code,
                output: output.combined(),
            });
        }
    }
    Ok(())
}

/// Replace text in a file; the search text must be present
pub fn replace_in_file(path: &Path, search: &str, replace: &str, regex: bool) -> Result<()> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::PatchFailed(format!("Cannot read {}: {}", path.display(), e))
    })?;

    let updated = if regex {
        let re = Regex::new(search)
            .map_err(|e| Error::PatchFailed(format!("Bad pattern '{}': {}", search, e)))?;
        if !re.is_match(&content) {
            return Err(Error::PatchFailed(format!(
                "Pattern '{}' not found in {}",
                search,
                path.display()
            )));
        }
        re.replace_all(&content, replace).into_owned()
    } else {
        if !content.contains(search) {
            return Err(Error::PatchFailed(format!(
                "'{}' not found in {}",
                search,
                path.display()
            )));
        }
        content.replace(search, replace)
    };

    fs::write(path, updated)?;
    Ok(())
}
