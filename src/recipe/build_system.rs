// src/recipe/build_system.rs

//! Build system translation
//!
//! Turns resolved options and settings into concrete tool invocations for
//! CMake, Autotools, Meson or plain Make. Each build system spells booleans
//! differently:
//!
//! | System    | true / false        | shared                         | fPIC                             |
//! |-----------|---------------------|--------------------------------|----------------------------------|
//! | CMake     | `ON` / `OFF`        | `-DBUILD_SHARED_LIBS`          | `-DCMAKE_POSITION_INDEPENDENT_CODE` |
//! | Autotools | `yes` / `no`        | `--enable-shared --enable-static` | `--with-pic` / `--without-pic` |
//! | Meson     | `true` / `false`    | `-Ddefault_library`            | `-Db_staticpic`                  |
//! | Make      | `1` / `0`           | `SHARED=`                      | `CFLAGS=-fPIC`                   |

use crate::recipe::format::{BuildFlag, Recipe};
use crate::recipe::options::{OptionValue, ResolvedOptions, FPIC, SHARED};
use crate::settings::{BuildType, Settings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use strum_macros::{Display, EnumString};

/// Supported build systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BuildSystem {
    #[default]
    CMake,
    Autotools,
    Meson,
    Make,
}

/// How an option is spelled on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagStyle {
    /// `VAR=<value>` in the system's native boolean spelling
    #[default]
    Value,
    /// `--enable-x` / `--disable-x`
    Enable,
    /// `--with-x` / `--without-x`
    With,
    /// Meson feature: `enabled` / `disabled`
    Feature,
}

/// Steps of the build state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum BuildStep {
    Configure,
    Compile,
    Test,
    Install,
    Done,
}

impl BuildStep {
    /// Next step; `Test` is skipped unless requested
    pub fn next(self, run_tests: bool) -> BuildStep {
        match self {
            BuildStep::Configure => BuildStep::Compile,
            BuildStep::Compile if run_tests => BuildStep::Test,
            BuildStep::Compile | BuildStep::Test => BuildStep::Install,
            BuildStep::Install | BuildStep::Done => BuildStep::Done,
        }
    }
}

/// One external tool invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: &Path) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Short tool name for error messages
    pub fn tool_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.program)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Directories a build works in
#[derive(Debug, Clone)]
pub struct BuildPaths {
    /// Extracted and patched sources
    pub source_dir: PathBuf,
    /// Out-of-tree build directory (unused by Make)
    pub build_dir: PathBuf,
    /// Install staging prefix
    pub install_dir: PathBuf,
}

/// Everything needed to run the build, derived once per cook
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildConfiguration {
    pub system: BuildSystem,
    /// Absent for plain Make
    pub configure: Option<Invocation>,
    pub compile: Invocation,
    /// Present only when the recipe's test option is enabled
    pub test: Option<Invocation>,
    pub install: Invocation,
    pub env: BTreeMap<String, String>,
}

impl BuildConfiguration {
    /// Derive the invocations from recipe, options and settings
    pub fn derive(
        recipe: &Recipe,
        version: &str,
        options: &ResolvedOptions,
        settings: &Settings,
        paths: &BuildPaths,
        jobs: u32,
    ) -> Self {
        let build = &recipe.build;
        let system = build.system;
        let jobs = build.jobs.unwrap_or(jobs).max(1);

        let source_dir = match &build.subdir {
            Some(sub) => paths.source_dir.join(sub),
            None => paths.source_dir.clone(),
        };

        let env: BTreeMap<String, String> = build
            .env
            .iter()
            .map(|(k, v)| (k.clone(), recipe.substitute(v, version)))
            .collect();

        let mut flags = standard_flags(system, options);
        flags.extend(option_flags(system, &build.flags, options, settings));
        for (name, value) in &build.variables {
            flags.push(render(system, FlagStyle::Value, name, value));
        }
        flags.extend(build.args.iter().map(|a| recipe.substitute(a, version)));

        let run_tests = build
            .test_option
            .as_deref()
            .is_some_and(|opt| options.is_enabled(opt));

        let install_prefix = paths.install_dir.to_string_lossy().to_string();
        let build_dir = paths.build_dir.to_string_lossy().to_string();
        let multi_config = settings.is_msvc();
        let build_type = settings.build_type.to_string();

        let (configure, compile, test, install) = match system {
            BuildSystem::CMake => {
                let mut configure = Invocation::new("cmake", &paths.build_dir)
                    .arg("-S")
                    .arg(source_dir.to_string_lossy())
                    .arg("-B")
                    .arg(&build_dir)
                    .arg(format!("-DCMAKE_INSTALL_PREFIX={}", install_prefix));
                if !multi_config {
                    configure = configure.arg(format!("-DCMAKE_BUILD_TYPE={}", build_type));
                }
                let configure = configure.args(flags);

                let with_config = |inv: Invocation| {
                    if multi_config {
                        inv.arg("--config").arg(&build_type)
                    } else {
                        inv
                    }
                };
                let compile = with_config(
                    Invocation::new("cmake", &paths.build_dir)
                        .arg("--build")
                        .arg(&build_dir)
                        .arg("--parallel")
                        .arg(jobs.to_string()),
                );
                let mut test = Invocation::new("ctest", &paths.build_dir)
                    .arg("--test-dir")
                    .arg(&build_dir)
                    .arg("--output-on-failure");
                if multi_config {
                    test = test.arg("-C").arg(&build_type);
                }
                let install = with_config(
                    Invocation::new("cmake", &paths.build_dir)
                        .arg("--install")
                        .arg(&build_dir),
                );
                (Some(configure), compile, test, install)
            }
            BuildSystem::Autotools => {
                let configure = Invocation::new(
                    source_dir.join("configure").to_string_lossy(),
                    &paths.build_dir,
                )
                .arg(format!("--prefix={}", install_prefix))
                .args(flags);
                let compile =
                    Invocation::new("make", &paths.build_dir).arg(format!("-j{}", jobs));
                let test = Invocation::new("make", &paths.build_dir).arg("check");
                let install = Invocation::new("make", &paths.build_dir).arg("install");
                (Some(configure), compile, test, install)
            }
            BuildSystem::Meson => {
                let configure = Invocation::new("meson", &paths.build_dir)
                    .arg("setup")
                    .arg(&build_dir)
                    .arg(source_dir.to_string_lossy())
                    .arg(format!("--prefix={}", install_prefix))
                    .arg(format!("--buildtype={}", meson_buildtype(settings.build_type)))
                    .args(flags);
                let compile = Invocation::new("meson", &paths.build_dir)
                    .arg("compile")
                    .arg("-C")
                    .arg(&build_dir)
                    .arg("-j")
                    .arg(jobs.to_string());
                let test = Invocation::new("meson", &paths.build_dir)
                    .arg("test")
                    .arg("-C")
                    .arg(&build_dir);
                let install = Invocation::new("meson", &paths.build_dir)
                    .arg("install")
                    .arg("-C")
                    .arg(&build_dir);
                (Some(configure), compile, test, install)
            }
            BuildSystem::Make => {
                let compile = Invocation::new("make", &source_dir)
                    .arg(format!("-j{}", jobs))
                    .args(flags.clone());
                let test = Invocation::new("make", &source_dir)
                    .arg("check")
                    .args(flags.clone());
                let install = Invocation::new("make", &source_dir)
                    .arg("install")
                    .arg(format!("PREFIX={}", install_prefix))
                    .args(flags);
                (None, compile, test, install)
            }
        };

        Self {
            system,
            configure: configure.map(|inv| inv.envs(&env)),
            compile: compile.envs(&env),
            test: run_tests.then(|| test.envs(&env)),
            install: install.envs(&env),
            env,
        }
    }

    /// Invocation for a step, if that step runs
    pub fn invocation(&self, step: BuildStep) -> Option<&Invocation> {
        match step {
            BuildStep::Configure => self.configure.as_ref(),
            BuildStep::Compile => Some(&self.compile),
            BuildStep::Test => self.test.as_ref(),
            BuildStep::Install => Some(&self.install),
            BuildStep::Done => None,
        }
    }

    pub fn runs_tests(&self) -> bool {
        self.test.is_some()
    }
}

fn meson_buildtype(build_type: BuildType) -> &'static str {
    match build_type {
        BuildType::Debug => "debug",
        BuildType::Release => "release",
        BuildType::RelWithDebInfo => "debugoptimized",
        BuildType::MinSizeRel => "minsize",
    }
}

/// Native spelling of a boolean
fn native_bool(system: BuildSystem, value: bool) -> &'static str {
    match (system, value) {
        (BuildSystem::CMake, true) => "ON",
        (BuildSystem::CMake, false) => "OFF",
        (BuildSystem::Autotools, true) => "yes",
        (BuildSystem::Autotools, false) => "no",
        (BuildSystem::Meson, true) => "true",
        (BuildSystem::Meson, false) => "false",
        (BuildSystem::Make, true) => "1",
        (BuildSystem::Make, false) => "0",
    }
}

/// Flags for the well-known `shared` and `fPIC` options
///
/// Only options still present after resolution produce flags.
pub fn standard_flags(system: BuildSystem, options: &ResolvedOptions) -> Vec<String> {
    let mut flags = Vec::new();

    if let Some(shared) = options.get(SHARED) {
        let shared = shared.is_truthy();
        match system {
            BuildSystem::CMake => flags.push(format!(
                "-DBUILD_SHARED_LIBS={}",
                native_bool(system, shared)
            )),
            BuildSystem::Autotools => {
                flags.push(format!("--enable-shared={}", native_bool(system, shared)));
                flags.push(format!("--enable-static={}", native_bool(system, !shared)));
            }
            BuildSystem::Meson => flags.push(format!(
                "-Ddefault_library={}",
                if shared { "shared" } else { "static" }
            )),
            BuildSystem::Make => flags.push(format!("SHARED={}", native_bool(system, shared))),
        }
    }

    if let Some(fpic) = options.get(FPIC) {
        let fpic = fpic.is_truthy();
        match system {
            BuildSystem::CMake => flags.push(format!(
                "-DCMAKE_POSITION_INDEPENDENT_CODE={}",
                native_bool(system, fpic)
            )),
            BuildSystem::Autotools => flags.push(
                if fpic { "--with-pic" } else { "--without-pic" }.to_string(),
            ),
            BuildSystem::Meson => {
                flags.push(format!("-Db_staticpic={}", native_bool(system, fpic)))
            }
            BuildSystem::Make => {
                if fpic {
                    flags.push("CFLAGS=-fPIC".to_string());
                }
            }
        }
    }

    flags
}

/// Flags declared in `[[build.flags]]`
pub fn option_flags(
    system: BuildSystem,
    flags: &[BuildFlag],
    options: &ResolvedOptions,
    settings: &Settings,
) -> Vec<String> {
    flags
        .iter()
        .filter(|flag| {
            flag.when
                .as_ref()
                .is_none_or(|cond| cond.holds(options, settings))
        })
        .filter_map(|flag| {
            options
                .get(&flag.option)
                .map(|value| render(system, flag.style, flag.variable_name(), value))
        })
        .collect()
}

/// Render one option in the build system's native syntax
pub fn render(system: BuildSystem, style: FlagStyle, name: &str, value: &OptionValue) -> String {
    match system {
        BuildSystem::CMake => match value {
            OptionValue::Bool(b) => format!("-D{}={}", name, native_bool(system, *b)),
            OptionValue::Str(s) => format!("-D{}={}", name, s),
        },
        BuildSystem::Autotools => match (style, value) {
            (FlagStyle::Enable | FlagStyle::Feature, OptionValue::Bool(true)) => {
                format!("--enable-{}", name)
            }
            (FlagStyle::Enable | FlagStyle::Feature, OptionValue::Bool(false)) => {
                format!("--disable-{}", name)
            }
            (FlagStyle::Enable | FlagStyle::Feature, OptionValue::Str(s)) => {
                if value.is_truthy() {
                    format!("--enable-{}={}", name, s)
                } else {
                    format!("--disable-{}", name)
                }
            }
            (FlagStyle::With, OptionValue::Bool(true)) => format!("--with-{}", name),
            (FlagStyle::With, OptionValue::Bool(false)) => format!("--without-{}", name),
            (FlagStyle::With, OptionValue::Str(s)) => {
                if value.is_truthy() {
                    format!("--with-{}={}", name, s)
                } else {
                    format!("--without-{}", name)
                }
            }
            (FlagStyle::Value, OptionValue::Bool(b)) => {
                format!("--{}={}", name, native_bool(system, *b))
            }
            (FlagStyle::Value, OptionValue::Str(s)) => format!("--{}={}", name, s),
        },
        BuildSystem::Meson => match (style, value) {
            (FlagStyle::Feature, _) => format!(
                "-D{}={}",
                name,
                if value.is_truthy() { "enabled" } else { "disabled" }
            ),
            (_, OptionValue::Bool(b)) => format!("-D{}={}", name, native_bool(system, *b)),
            (_, OptionValue::Str(s)) => format!("-D{}={}", name, s),
        },
        BuildSystem::Make => match value {
            OptionValue::Bool(b) => format!("{}={}", name, native_bool(system, *b)),
            OptionValue::Str(s) => format!("{}={}", name, s),
        },
    }
}
