// src/settings.rs

//! Target environment settings
//!
//! Settings describe the machine a library is being built for: operating
//! system, architecture, compiler and build type. They are supplied by the
//! caller and are read-only for the whole cook.
//!
//! Settings are parsed from `key=value` pairs:
//!
//! ```text
//! os=Linux arch=x86_64 compiler=gcc compiler.version=12 compiler.cppstd=17 build_type=Release
//! ```

use crate::error::{Error, Result};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};

/// Target operating system
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Os {
    Linux,
    Windows,
    Macos,
    FreeBSD,
    Android,
    #[serde(rename = "iOS")]
    #[strum(serialize = "iOS")]
    Ios,
    Emscripten,
    Neutrino,
}

impl Os {
    /// Apple platforms (dylib naming, no `-fPIC` distinction for shared libs)
    pub fn is_apple(&self) -> bool {
        matches!(self, Os::Macos | Os::Ios)
    }

    /// Platforms where "position independent code" is not a meaningful toggle
    pub fn ignores_pic(&self) -> bool {
        matches!(self, Os::Windows)
    }
}

/// Target CPU architecture
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    #[strum(serialize = "x86")]
    X86,
    #[strum(serialize = "x86_64")]
    X86_64,
    #[strum(serialize = "armv7")]
    Armv7,
    #[strum(serialize = "armv8")]
    Armv8,
    #[strum(serialize = "ppc64le")]
    Ppc64le,
    #[strum(serialize = "s390x")]
    S390x,
    #[strum(serialize = "wasm")]
    Wasm,
}

/// Compiler family
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum CompilerName {
    #[strum(serialize = "gcc")]
    Gcc,
    #[strum(serialize = "clang")]
    Clang,
    #[strum(serialize = "apple-clang")]
    AppleClang,
    #[strum(serialize = "msvc")]
    Msvc,
    #[strum(serialize = "intel-cc")]
    IntelCc,
}

/// Build type passed through to the underlying build system
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum BuildType {
    Debug,
    #[default]
    Release,
    RelWithDebInfo,
    MinSizeRel,
}

/// Compiler identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compiler {
    pub name: CompilerName,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cppstd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub libcxx: Option<String>,
}

impl Compiler {
    pub fn new(name: CompilerName, version: impl Into<String>) -> Self {
        Self {
            name,
            version: version.into(),
            cppstd: None,
            libcxx: None,
        }
    }

    /// Parsed compiler version (None when the version text is unusable)
    pub fn parsed_version(&self) -> Option<Version> {
        Version::parse(&self.version).ok()
    }
}

/// Target environment descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub os: Os,
    pub arch: Arch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler: Option<Compiler>,
    #[serde(default)]
    pub build_type: BuildType,
}

impl Default for Settings {
    fn default() -> Self {
        Self::detect()
    }
}

impl Settings {
    /// Settings for the given OS with host architecture and no compiler
    pub fn for_os(os: Os) -> Self {
        Self {
            os,
            arch: host_arch(),
            compiler: None,
            build_type: BuildType::Release,
        }
    }

    /// Best-effort description of the host machine
    pub fn detect() -> Self {
        let os = match std::env::consts::OS {
            "windows" => Os::Windows,
            "macos" => Os::Macos,
            "freebsd" => Os::FreeBSD,
            "android" => Os::Android,
            "ios" => Os::Ios,
            _ => Os::Linux,
        };

        let compiler = match os {
            Os::Windows => Compiler::new(CompilerName::Msvc, "193"),
            Os::Macos | Os::Ios => Compiler::new(CompilerName::AppleClang, "15"),
            _ => Compiler::new(CompilerName::Gcc, "12"),
        };

        Self {
            os,
            arch: host_arch(),
            compiler: Some(compiler),
            build_type: BuildType::Release,
        }
    }

    /// Start from host settings and apply `key=value` pairs
    pub fn from_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<Self> {
        let mut settings = Self::detect();
        for pair in pairs {
            settings.set(pair.as_ref())?;
        }
        Ok(settings)
    }

    /// Apply a single `key=value` pair
    pub fn set(&mut self, pair: &str) -> Result<()> {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            Error::invalid(format!("setting '{}' must be key=value", pair))
        })?;
        let (key, value) = (key.trim(), value.trim());

        let bad_value = |what: &str| {
            Error::invalid(format!("'{}' is not a valid value for setting '{}'", value, what))
        };

        match key {
            "os" => self.os = Os::from_str(value).map_err(|_| bad_value("os"))?,
            "arch" => self.arch = Arch::from_str(value).map_err(|_| bad_value("arch"))?,
            "build_type" => {
                self.build_type = BuildType::from_str(value).map_err(|_| bad_value("build_type"))?
            }
            "compiler" => {
                let name = CompilerName::from_str(value).map_err(|_| bad_value("compiler"))?;
                let version = self
                    .compiler
                    .as_ref()
                    .map(|c| c.version.clone())
                    .unwrap_or_default();
                self.compiler = Some(Compiler::new(name, version));
            }
            "compiler.version" | "compiler.cppstd" | "compiler.libcxx" => {
                let compiler = self.compiler.as_mut().ok_or_else(|| {
                    Error::invalid(format!("'{}' given without 'compiler'", key))
                })?;
                match key {
                    "compiler.version" => compiler.version = value.to_string(),
                    "compiler.cppstd" => compiler.cppstd = Some(value.to_string()),
                    _ => compiler.libcxx = Some(value.to_string()),
                }
            }
            other => return Err(Error::invalid(format!("unknown setting '{}'", other))),
        }
        Ok(())
    }

    /// Copy of these settings with C++-only compiler subsettings removed
    ///
    /// Plain C libraries do not depend on the C++ standard or runtime.
    pub fn without_cpp_subsettings(&self) -> Self {
        let mut settings = self.clone();
        if let Some(compiler) = settings.compiler.as_mut() {
            compiler.cppstd = None;
            compiler.libcxx = None;
        }
        settings
    }

    pub fn compiler_name(&self) -> Option<CompilerName> {
        self.compiler.as_ref().map(|c| c.name)
    }

    pub fn is_msvc(&self) -> bool {
        self.compiler_name() == Some(CompilerName::Msvc)
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "os={} arch={} build_type={}", self.os, self.arch, self.build_type)?;
        if let Some(c) = &self.compiler {
            write!(f, " compiler={} compiler.version={}", c.name, c.version)?;
            if let Some(std) = &c.cppstd {
                write!(f, " compiler.cppstd={}", std)?;
            }
        }
        Ok(())
    }
}

fn host_arch() -> Arch {
    match std::env::consts::ARCH {
        "x86" => Arch::X86,
        "aarch64" => Arch::Armv8,
        "arm" => Arch::Armv7,
        "powerpc64" => Arch::Ppc64le,
        "s390x" => Arch::S390x,
        "wasm32" => Arch::Wasm,
        _ => Arch::X86_64,
    }
}
