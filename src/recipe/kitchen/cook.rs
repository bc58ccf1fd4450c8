// src/recipe/kitchen/cook.rs

//! Cook: the actual build execution for a single recipe

use crate::error::{Error, Result};
use crate::hash::Checksum;
use crate::recipe::build_system::{BuildConfiguration, BuildPaths, BuildStep, Invocation};
use crate::recipe::format::Recipe;
use crate::recipe::kitchen::config::Plan;
use crate::recipe::package_info::{self, PackageInfo, INFO_FILE};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::archive::{apply_patches, download_file, extract_archive, is_remote, local_source_path, Patch, PatchKind};
use super::plate::{self, BuildArtifacts, PackageLayout};
use super::Kitchen;

/// A single cook operation
pub struct Cook<'a> {
    pub(super) kitchen: &'a Kitchen,
    pub(super) recipe: &'a Recipe,
    pub(super) plan: &'a Plan,
    /// Temporary build directory
    pub(super) build_dir: TempDir,
    /// Source directory within build_dir
    pub(super) source_dir: PathBuf,
    /// Install prefix handed to the build tool
    pub(super) install_dir: PathBuf,
    /// Source archive copied into the build directory by prep
    archive: Option<PathBuf>,
    /// Patches with their files located by prep
    patches: Vec<Patch>,
    /// Derived on first use, then reused for every build step
    build_config: Option<BuildConfiguration>,
    /// Build log accumulator
    pub(super) log: String,
    /// Warnings
    pub(super) warnings: Vec<String>,
}

impl<'a> Cook<'a> {
    pub(super) fn new(kitchen: &'a Kitchen, recipe: &'a Recipe, plan: &'a Plan) -> Result<Self> {
        let prefix = format!("pantry-{}-", recipe.package.name);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let build_dir = match &kitchen.config.build_root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| Error::IoError(format!("Failed to create build directory: {}", e)))?;

        let source_dir = build_dir.path().join("source");
        let install_dir = build_dir.path().join("install");
        fs::create_dir_all(&install_dir)?;

        Ok(Self {
            kitchen,
            recipe,
            plan,
            build_dir,
            source_dir,
            install_dir,
            archive: None,
            patches: Vec::new(),
            build_config: None,
            log: String::new(),
            warnings: Vec::new(),
        })
    }

    /// Phase 1: Prep - fetch all sources
    pub(super) fn prep(&mut self) -> Result<()> {
        let (recipe, plan) = (self.recipe, self.plan);
        let version = plan.version.as_str();
        let base = recipe.recipe_dir.as_deref();

        if recipe.is_header_only() && !recipe.sources.contains_key(version) {
            self.log_line("No source archive declared");
        } else {
            let source = recipe.source_for(version)?;
            let url = recipe.archive_url(version)?;
            let checksum = Checksum::parse(&source.checksum)?;
            let cached = self.kitchen.fetch_source(&url, &checksum, base)?;

            // Cache entries are named by checksum; the copy keeps the real extension
            let local = self.build_dir.path().join(recipe.archive_filename(version)?);
            fs::copy(&cached, &local)?;
            self.archive = Some(local);
            self.log_line(&format!("Fetched source: {}", url));
        }

        let patch_dir = self.build_dir.path().join("patches");
        for (index, info) in recipe.patches_for(version).iter().enumerate() {
            let label = info.label();
            let kind = match (&info.file, &info.replace) {
                (Some(file), None) => {
                    let path = if is_remote(file) {
                        self.fetch_remote_patch(file, info.checksum.as_deref(), &patch_dir, index)?
                    } else {
                        let path = local_source_path(file, base);
                        if let Some(sum) = &info.checksum {
                            Checksum::parse(sum)?.verify_file(&path)?;
                            debug!("Verified patch {}", path.display());
                        }
                        path
                    };
                    PatchKind::File {
                        path,
                        strip: info.strip,
                    }
                }
                (None, Some(spec)) => PatchKind::Replace {
                    file: spec.file.clone(),
                    search: recipe.substitute(&spec.search, version),
                    replace: recipe.substitute(&spec.with, version),
                    regex: spec.regex,
                },
                _ => {
                    return Err(Error::ParseError(format!(
                        "patch '{}' must set exactly one of 'file' and 'replace'",
                        label
                    )));
                }
            };
            self.patches.push(Patch {
                kind,
                description: label,
                strict: info.strict,
            });
        }

        Ok(())
    }

    fn fetch_remote_patch(
        &mut self,
        url: &str,
        checksum: Option<&str>,
        patch_dir: &Path,
        index: usize,
    ) -> Result<PathBuf> {
        match checksum {
            Some(sum) => {
                let checksum = Checksum::parse(sum)?;
                let path = self.kitchen.fetch_source(url, &checksum, None)?;
                self.log_line(&format!("Fetched patch: {}", url));
                Ok(path)
            }
            None => {
                if self.kitchen.config.offline {
                    return Err(Error::DownloadError(format!(
                        "Patch {} has no checksum and cannot be cached for offline use",
                        url
                    )));
                }
                fs::create_dir_all(patch_dir)?;
                let dest = patch_dir.join(format!("{:03}.patch", index));
                download_file(url, &dest, self.kitchen.config.progress)?;
                let warning = format!("Patch {} was fetched without checksum verification", url);
                warn!("{}", warning);
                self.warnings.push(warning);
                self.log_line(&format!("Fetched patch: {}", url));
                Ok(dest)
            }
        }
    }

    /// Phase 2a: Unpack sources
    pub(super) fn unpack(&mut self) -> Result<()> {
        let archive = match &self.archive {
            Some(a) => a.clone(),
            None => {
                fs::create_dir_all(&self.source_dir)?;
                return Ok(());
            }
        };

        let strip_root = self
            .recipe
            .sources
            .get(&self.plan.version)
            .map(|s| s.strip_root)
            .unwrap_or(true);

        extract_archive(&archive, &self.source_dir, strip_root)?;
        self.log_line(&format!(
            "Extracted source to {}",
            self.source_dir.display()
        ));
        debug!("Source directory: {}", self.source_dir.display());

        Ok(())
    }

    /// Phase 2b: Apply patches
    pub(super) fn patch(&mut self) -> Result<()> {
        if self.patches.is_empty() {
            return Ok(());
        }

        let report = apply_patches(
            &self.source_dir,
            &self.patches,
            self.kitchen.runner.as_ref(),
            Some(self.kitchen.config.timeout),
        )?;

        for applied in &report.applied {
            self.log_line(&format!("Applied patch: {}", applied));
        }
        for skipped in report.skipped {
            self.log_line(&skipped);
            self.warnings.push(skipped);
        }

        Ok(())
    }

    /// Build configuration for this cook, derived once
    pub fn build_config(&mut self) -> &BuildConfiguration {
        let paths = BuildPaths {
            source_dir: self.source_dir.clone(),
            build_dir: self.build_dir.path().join("build"),
            install_dir: self.install_dir.clone(),
        };
        let (recipe, plan, jobs) = (self.recipe, self.plan, self.kitchen.config.jobs);
        self.build_config.get_or_insert_with(|| {
            BuildConfiguration::derive(
                recipe,
                &plan.version,
                &plan.options,
                &plan.settings,
                &paths,
                jobs,
            )
        })
    }

    /// Phase 3: Simmer - run the build
    ///
    /// Steps run in order `configure -> compile -> (test) -> install`; the
    /// first failing step aborts the cook.
    pub(super) fn simmer(&mut self) -> Result<()> {
        if self.recipe.is_header_only() {
            return self.stage_headers();
        }

        let config = self.build_config().clone();
        fs::create_dir_all(self.build_dir.path().join("build"))?;

        let mut step = BuildStep::Configure;
        while step != BuildStep::Done {
            if let Some(invocation) = config.invocation(step) {
                info!("Running {} phase", step);
                self.run_build_step(step, invocation)?;
            }
            step = step.next(config.runs_tests());
        }

        Ok(())
    }

    /// Header-only packages skip the build and install `include/` as shipped
    fn stage_headers(&mut self) -> Result<()> {
        let root = match &self.recipe.build.subdir {
            Some(sub) => self.source_dir.join(sub),
            None => self.source_dir.clone(),
        };
        let headers = root.join("include");
        if headers.is_dir() {
            plate::copy_tree(&headers, &self.install_dir.join("include"))?;
            self.log_line(&format!("Staged headers from {}", headers.display()));
        } else {
            self.log_line("Header-only package without an include/ directory");
        }
        Ok(())
    }

    /// Run a build step
    fn run_build_step(&mut self, step: BuildStep, invocation: &Invocation) -> Result<()> {
        let phase = step.to_string();
        debug!("Command: {}", invocation);

        let timeout = self.kitchen.config.timeout;
        let output = self.kitchen.runner.run(invocation, Some(timeout))?;

        self.log_build_output(&phase, &output.stdout, &output.stderr);

        if output.timed_out {
            return Err(Error::Timeout {
                tool: invocation.tool_name().to_string(),
                phase,
                seconds: timeout.as_secs(),
            });
        }

        if !output.success() {
            return Err(Error::ToolFailed {
                tool: invocation.tool_name().to_string(),
                phase,
                code: output.code,
                output: output.combined(),
            });
        }

        Ok(())
    }

    /// Phase 4: Plate - package the result and write its metadata
    pub(super) fn plate(&mut self, output_dir: &Path) -> Result<(PackageLayout, PackageInfo)> {
        let artifacts = BuildArtifacts {
            install_dir: self.install_dir.clone(),
            source_dir: self.source_dir.clone(),
        };

        let mut libs = self.recipe.info.libs.clone();
        for component in self.recipe.info.components.values() {
            libs.extend(component.libs.iter().cloned());
        }

        let staged = plate::stage(
            &artifacts,
            &self.recipe.package_files,
            &libs,
            &self.plan.options,
            &self.plan.settings,
            output_dir,
        )?;
        let layout = staged.layout();

        if layout.licenses().next().is_none() {
            self.warnings
                .push(format!("No license files packaged for {}", self.recipe.package.name));
        }

        let info = package_info::emit(
            self.recipe,
            &layout,
            &self.plan.options,
            &self.plan.settings,
            &self.plan.edges,
            &self.plan.version,
        )?;
        info.write_to(staged.path())?;
        staged.commit()?;
        let info_path = output_dir.join(INFO_FILE);

        self.log_line(&format!(
            "Packaged {} files into {}",
            layout.files.len(),
            layout.root.display()
        ));
        self.log_line(&format!("Wrote {}", info_path.display()));
        info!(
            "Cooked: {} ({} files)",
            layout.root.display(),
            layout.files.len()
        );

        Ok((layout, info))
    }

    /// Record the resolved options at the top of the log
    pub(super) fn log_options(&mut self) {
        let line = format!("Options: {}", self.plan.options);
        self.log_line(&line);
    }

    fn log_line(&mut self, line: &str) {
        self.log.push_str(line);
        self.log.push('\n');
    }

    /// Log build step output (stdout/stderr) with a phase header
    fn log_build_output(&mut self, phase: &str, stdout: &str, stderr: &str) {
        self.log_line(&format!("=== {} ===", phase));
        if !stdout.is_empty() {
            self.log.push_str(stdout);
            self.log.push('\n');
        }
        if !stderr.is_empty() {
            self.log.push_str(stderr);
            self.log.push('\n');
        }
    }
}
