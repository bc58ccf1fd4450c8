// src/recipe/condition.rs

//! Conditions attached to requirements, flags, defines and validation rules
//!
//! A condition is a conjunction of optional clauses. Every clause that is
//! present must hold; an empty condition always holds.
//!
//! ```toml
//! when = { option = "with_ssl", value = "openssl" }
//! when = { option = "shared", enabled = false }
//! when = { option = "with_norm", os = ["Windows"] }
//! when = { not_os = ["Windows"], compiler = ["gcc", "clang"] }
//! ```

use crate::recipe::options::{OptionValue, ResolvedOptions};
use crate::settings::{Arch, BuildType, CompilerName, Os, Settings};
use serde::{Deserialize, Serialize};

/// A predicate over resolved options and settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Condition {
    /// Option the `value`/`enabled` clause refers to
    #[serde(default)]
    pub option: Option<String>,
    /// Option must equal this value
    #[serde(default)]
    pub value: Option<OptionValue>,
    /// Option truthiness must match (defaults to `true` when only `option` is given)
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub os: Vec<Os>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_os: Vec<Os>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arch: Vec<Arch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compiler: Vec<CompilerName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_type: Vec<BuildType>,
}

impl Condition {
    /// Condition that holds when `option` is enabled
    pub fn option_enabled(option: impl Into<String>) -> Self {
        Self {
            option: Some(option.into()),
            ..Default::default()
        }
    }

    /// Condition that holds when `option` equals `value`
    pub fn option_equals(option: impl Into<String>, value: OptionValue) -> Self {
        Self {
            option: Some(option.into()),
            value: Some(value),
            ..Default::default()
        }
    }

    /// Condition that holds on the given operating systems
    pub fn on_os(os: &[Os]) -> Self {
        Self {
            os: os.to_vec(),
            ..Default::default()
        }
    }

    /// Evaluate the settings-only clauses
    ///
    /// Used by the option model before options are resolved.
    pub fn settings_match(&self, settings: &Settings) -> bool {
        if !self.os.is_empty() && !self.os.contains(&settings.os) {
            return false;
        }
        if self.not_os.contains(&settings.os) {
            return false;
        }
        if !self.arch.is_empty() && !self.arch.contains(&settings.arch) {
            return false;
        }
        if !self.compiler.is_empty() {
            match settings.compiler_name() {
                Some(name) if self.compiler.contains(&name) => {}
                _ => return false,
            }
        }
        if !self.build_type.is_empty() && !self.build_type.contains(&settings.build_type) {
            return false;
        }
        true
    }

    /// Evaluate the option clause against a value lookup
    ///
    /// `lookup` returns `None` for options that are absent or not applicable;
    /// an absent option is never equal to anything and is never enabled.
    pub fn option_match<'a>(&self, lookup: impl Fn(&str) -> Option<&'a OptionValue>) -> bool {
        let name = match &self.option {
            Some(name) => name,
            None => return true,
        };
        let current = lookup(name);

        if let Some(expected) = &self.value {
            if current.map(|v| v.loosely_equals(expected)) != Some(true) {
                return false;
            }
        }

        let wants_enabled = match (self.value.is_some(), self.enabled) {
            (_, Some(flag)) => Some(flag),
            (false, None) => Some(true),
            (true, None) => None,
        };
        if let Some(flag) = wants_enabled {
            let is_enabled = current.map(OptionValue::is_truthy).unwrap_or(false);
            if is_enabled != flag {
                return false;
            }
        }
        true
    }

    /// Evaluate the whole condition
    pub fn holds(&self, options: &ResolvedOptions, settings: &Settings) -> bool {
        self.settings_match(settings) && self.option_match(|name| options.get(name))
    }

    /// Option referenced by this condition, if any
    pub fn referenced_option(&self) -> Option<&str> {
        self.option.as_deref()
    }

    /// Short human-readable rendering for error messages
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(option) = &self.option {
            match (&self.value, self.enabled) {
                (Some(v), _) => parts.push(format!("{}={}", option, v)),
                (None, Some(false)) => parts.push(format!("{} disabled", option)),
                _ => parts.push(format!("{} enabled", option)),
            }
        }
        if !self.os.is_empty() {
            let list: Vec<String> = self.os.iter().map(|o| o.to_string()).collect();
            parts.push(format!("os in [{}]", list.join(", ")));
        }
        if !self.not_os.is_empty() {
            let list: Vec<String> = self.not_os.iter().map(|o| o.to_string()).collect();
            parts.push(format!("os not in [{}]", list.join(", ")));
        }
        if !self.compiler.is_empty() {
            let list: Vec<String> = self.compiler.iter().map(|c| c.to_string()).collect();
            parts.push(format!("compiler in [{}]", list.join(", ")));
        }
        if parts.is_empty() {
            "always".to_string()
        } else {
            parts.join(" and ")
        }
    }
}
