// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use pantry::recipe::{Invocation, Kitchen, KitchenConfig, Recipe, ToolOutput, ToolRunner, parse_recipe_file};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Build step a simulated invocation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Patch,
    Configure,
    Compile,
    Test,
    Install,
}

/// Classify an invocation the way the kitchen issues them
pub fn classify(inv: &Invocation) -> Step {
    let has = |arg: &str| inv.args.iter().any(|a| a == arg);
    match inv.tool_name() {
        "patch" => Step::Patch,
        "ctest" => Step::Test,
        "cmake" if has("--build") => Step::Compile,
        "cmake" if has("--install") => Step::Install,
        "cmake" => Step::Configure,
        "meson" if has("setup") => Step::Configure,
        "meson" if has("compile") => Step::Compile,
        "meson" if has("test") => Step::Test,
        "meson" => Step::Install,
        "make" if has("install") => Step::Install,
        "make" if has("check") => Step::Test,
        "make" => Step::Compile,
        _ => Step::Configure,
    }
}

/// Tool runner that records invocations and simulates their effects
///
/// The install step writes `install_files` into the install prefix. A step
/// listed in `fail` exits with the given code and stderr instead.
#[derive(Default)]
pub struct RecordingRunner {
    pub calls: Mutex<Vec<Invocation>>,
    pub install_files: Vec<(String, String)>,
    pub fail: Option<(Step, i32, String)>,
}

impl RecordingRunner {
    pub fn installing(files: &[(&str, &str)]) -> Self {
        Self {
            install_files: files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    pub fn failing(mut self, step: Step, code: i32, stderr: &str) -> Self {
        self.fail = Some((step, code, stderr.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded invocations for one step
    pub fn calls_for(&self, step: Step) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|inv| classify(inv) == step)
            .collect()
    }

    fn install_prefix(inv: &Invocation) -> PathBuf {
        if let Some(prefix) = inv.args.iter().find_map(|a| a.strip_prefix("PREFIX=")) {
            return PathBuf::from(prefix);
        }
        // Build tree and install prefix are siblings in the build directory
        inv.cwd
            .parent()
            .map(|p| p.join("install"))
            .unwrap_or_else(|| inv.cwd.join("install"))
    }
}

impl ToolRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation, _timeout: Option<Duration>) -> pantry::Result<ToolOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        let step = classify(invocation);

        if let Some((fail_step, code, stderr)) = &self.fail
            && *fail_step == step
        {
            return Ok(ToolOutput::failed(*code, stderr.clone()));
        }

        if step == Step::Install {
            let prefix = Self::install_prefix(invocation);
            for (relative, content) in &self.install_files {
                let path = prefix.join(relative);
                fs::create_dir_all(path.parent().unwrap())?;
                fs::write(path, content)?;
            }
        }

        Ok(ToolOutput::ok(format!("simulated {}", invocation.tool_name())))
    }
}

/// Scratch area holding a recipe, its source archive and a source cache
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a gzipped source tarball with a single top-level directory
    ///
    /// Returns the archive path and its `sha256:` checksum.
    pub fn source_archive(&self, top: &str, files: &[(&str, &str)]) -> (PathBuf, String) {
        let path = self.path().join(format!("{}.tar.gz", top));
        let file = fs::File::create(&path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("{}/{}", top, name), content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();

        let checksum = format!("sha256:{}", pantry::hash::sha256_file(&path).unwrap());
        (path, checksum)
    }

    /// Write a recipe file and load it
    pub fn recipe(&self, content: &str) -> Recipe {
        let path = self.path().join("recipe.toml");
        fs::write(&path, content).unwrap();
        parse_recipe_file(&path).unwrap()
    }

    pub fn kitchen(&self, runner: Arc<RecordingRunner>) -> Kitchen {
        let config = KitchenConfig {
            source_cache: self.path().join("cache"),
            build_root: Some(self.path().join("builds")),
            offline: true,
            jobs: 2,
            ..KitchenConfig::default()
        };
        Kitchen::with_runner(config, runner)
    }

    pub fn output(&self) -> PathBuf {
        self.path().join("package")
    }
}

/// Library recipe with the usual shared/fPIC pair, built with CMake
pub fn zeromq_recipe(archive: &Path, checksum: &str) -> String {
    format!(
        r#"
[package]
name = "zeromq"
version = "4.3.5"
description = "ZeroMQ core engine in C++"
license = "MPL-2.0"
language = "cpp"

[sources."4.3.5"]
url = "{url}"
checksum = "{checksum}"

[options]
shared = {{ values = [true, false], default = false }}
fPIC = {{ values = [true, false], default = true }}
encryption = {{ values = [false, "libsodium", "tweetnacl"], default = "libsodium" }}
with_norm = {{ values = [true, false], default = false }}
with_tests = {{ values = [true, false], default = false }}

[[requires]]
ref = "libsodium/1.0.19"
when = {{ option = "encryption", value = "libsodium" }}

[[requires]]
ref = "norm/1.5.9"
when = {{ option = "with_norm" }}

[[invalid]]
when = {{ option = "with_norm", os = ["Windows"] }}
message = "norm is not compatible with Windows"

[build]
system = "cmake"
test_option = "with_tests"

[[build.flags]]
option = "encryption"
variable = "WITH_LIBSODIUM"
when = {{ option = "encryption", value = "libsodium" }}

[[build.flags]]
option = "with_norm"
variable = "WITH_NORM"

[build.variables]
ZMQ_BUILD_TESTS = false

[info]
libs = ["zmq"]

[[info.defines]]
define = "ZMQ_STATIC"
when = {{ option = "shared", value = false }}

[[info.system_libs]]
os = ["Linux"]
libs = ["pthread", "rt", "m"]

[[info.system_libs]]
os = ["Windows"]
libs = ["iphlpapi", "ws2_32"]
"#,
        url = archive.to_string_lossy(),
        checksum = checksum,
    )
}
