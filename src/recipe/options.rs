// src/recipe/options.rs

//! Option model
//!
//! Every recipe declares a finite set of named options, each with a value
//! domain and a default. Resolution runs in two phases against the target
//! settings:
//!
//! 1. *config_options*: options that make no sense on the target platform
//!    are removed (`exclude_os`, `only_os`, and `fPIC` on Windows).
//! 2. *configure*: options that become meaningless given other option values
//!    are removed (`fPIC` when `shared` is on, `remove_when` conditions,
//!    `shared`/`fPIC` for header-only packages).
//!
//! A removed option is *absent*, which is different from being `false`.
//! [`ResolvedOptions`] keeps both states observable.

use crate::error::{Error, Result};
use crate::recipe::format::{OptionDecl, PackageType, Recipe};
use crate::settings::Settings;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

/// Name of the shared/static toggle
pub const SHARED: &str = "shared";

/// Name of the position-independent-code toggle
pub const FPIC: &str = "fPIC";

/// Strings that read as false
const FALSY: &[&str] = &["", "False", "false", "None", "none", "0", "OFF", "off"];

/// Value of a single option
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Str(String),
}

impl OptionValue {
    /// Truthiness used by conditions and boolean translation
    pub fn is_truthy(&self) -> bool {
        match self {
            OptionValue::Bool(b) => *b,
            OptionValue::Str(s) => !FALSY.contains(&s.as_str()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            OptionValue::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Bool(_) => None,
            OptionValue::Str(s) => Some(s),
        }
    }

    /// Equality that lets `"True"` match `true`
    pub fn loosely_equals(&self, other: &OptionValue) -> bool {
        match (self, other) {
            (OptionValue::Bool(a), OptionValue::Bool(b)) => a == b,
            (OptionValue::Str(a), OptionValue::Str(b)) => a == b,
            (OptionValue::Bool(b), OptionValue::Str(s))
            | (OptionValue::Str(s), OptionValue::Bool(b)) => parse_bool(s) == Some(*b),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(true) => f.write_str("True"),
            OptionValue::Bool(false) => f.write_str("False"),
            OptionValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Bool(b)
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Str(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::Str(s)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "True" | "true" | "1" | "ON" | "on" | "yes" => Some(true),
        "False" | "false" | "0" | "OFF" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Set of values an option may take
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDomain", into = "RawDomain")]
pub enum OptionDomain {
    /// `[true, false]`
    Boolean,
    /// Enumerated values, possibly mixing `false` with strings
    Choice(Vec<OptionValue>),
    /// Free-form (`"ANY"`)
    Any,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawDomain {
    Keyword(String),
    List(Vec<OptionValue>),
}

impl TryFrom<RawDomain> for OptionDomain {
    type Error = String;

    fn try_from(raw: RawDomain) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawDomain::Keyword(k) if k.eq_ignore_ascii_case("ANY") => Ok(OptionDomain::Any),
            RawDomain::Keyword(k) => Err(format!(
                "option values must be a list or \"ANY\", got \"{}\"",
                k
            )),
            RawDomain::List(values) if values.is_empty() => {
                Err("option values list is empty".to_string())
            }
            RawDomain::List(values) => {
                let is_boolean = values.len() == 2
                    && values.contains(&OptionValue::Bool(true))
                    && values.contains(&OptionValue::Bool(false));
                if is_boolean {
                    Ok(OptionDomain::Boolean)
                } else {
                    Ok(OptionDomain::Choice(values))
                }
            }
        }
    }
}

impl From<OptionDomain> for RawDomain {
    fn from(domain: OptionDomain) -> Self {
        match domain {
            OptionDomain::Boolean => RawDomain::List(vec![true.into(), false.into()]),
            OptionDomain::Choice(values) => RawDomain::List(values),
            OptionDomain::Any => RawDomain::Keyword("ANY".to_string()),
        }
    }
}

impl OptionDomain {
    pub fn contains(&self, value: &OptionValue) -> bool {
        match self {
            OptionDomain::Boolean => value.as_bool().is_some(),
            OptionDomain::Choice(values) => values.contains(value),
            OptionDomain::Any => true,
        }
    }

    /// Parse override text into a value of this domain
    pub fn parse_value(&self, text: &str) -> Option<OptionValue> {
        match self {
            OptionDomain::Boolean => parse_bool(text).map(OptionValue::Bool),
            OptionDomain::Choice(values) => values
                .iter()
                .find(|allowed| match allowed {
                    OptionValue::Str(s) => s == text,
                    OptionValue::Bool(b) => parse_bool(text) == Some(*b),
                })
                .cloned(),
            OptionDomain::Any => Some(OptionValue::Str(text.to_string())),
        }
    }

    /// Human-readable list of allowed values
    pub fn describe(&self) -> String {
        match self {
            OptionDomain::Boolean => "[True, False]".to_string(),
            OptionDomain::Choice(values) => {
                let list: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                format!("[{}]", list.join(", "))
            }
            OptionDomain::Any => "ANY".to_string(),
        }
    }
}

/// User-supplied `name=value` option overrides, in the order given
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    entries: Vec<(String, String)>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `name=value` pairs
    pub fn parse<S: AsRef<str>>(pairs: &[S]) -> Result<Self> {
        let mut overrides = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                Error::invalid(format!("option override '{}' must be name=value", pair))
            })?;
            overrides.set(name.trim(), value.trim());
        }
        Ok(overrides)
    }

    /// Add an override; a later value for the same name wins
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Declared options plus the values chosen so far
#[derive(Debug, Clone)]
pub struct OptionModel {
    decls: BTreeMap<String, OptionDecl>,
    values: BTreeMap<String, OptionValue>,
    overridden: BTreeSet<String>,
    header_only: bool,
}

impl OptionModel {
    /// Start from the recipe's declared defaults
    pub fn from_recipe(recipe: &Recipe) -> Self {
        let values = recipe
            .options
            .iter()
            .map(|(name, decl)| (name.clone(), decl.default.clone()))
            .collect();
        Self {
            decls: recipe.options.clone(),
            values,
            overridden: BTreeSet::new(),
            header_only: recipe.package.package_type == PackageType::HeaderLibrary,
        }
    }

    /// Validate and apply overrides
    ///
    /// Unknown names and out-of-domain values are configuration errors that
    /// name the option and its allowed values. Nothing is applied on error.
    pub fn apply_overrides(&mut self, overrides: &Overrides) -> Result<()> {
        let mut staged = Vec::new();
        for (name, text) in overrides.iter() {
            let decl = self.decls.get(name).ok_or_else(|| {
                let known: Vec<&str> = self.decls.keys().map(String::as_str).collect();
                Error::invalid(format!(
                    "unknown option '{}' (declared options: {})",
                    name,
                    known.join(", ")
                ))
            })?;
            let value = decl.values.parse_value(text).ok_or_else(|| {
                Error::invalid(format!(
                    "'{}' is not a valid value for option '{}' (possible values: {})",
                    text,
                    name,
                    decl.values.describe()
                ))
            })?;
            staged.push((name.to_string(), value));
        }

        for (name, value) in staged {
            debug!("Option override {}={}", name, value);
            self.overridden.insert(name.clone());
            self.values.insert(name, value);
        }
        Ok(())
    }

    /// Current value before platform/configure pruning
    pub fn value(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    /// Resolve options against the target settings
    ///
    /// Pure: the same model and settings always give the same result.
    pub fn resolve(&self, settings: &Settings) -> ResolvedOptions {
        let mut resolved = ResolvedOptions {
            values: self
                .values
                .iter()
                .map(|(k, v)| (k.clone(), Some(v.clone())))
                .collect(),
            notes: Vec::new(),
        };

        // config_options: platform applicability
        for (name, decl) in &self.decls {
            let reason = if decl.exclude_os.contains(&settings.os)
                || (!decl.only_os.is_empty() && !decl.only_os.contains(&settings.os))
            {
                Some(format!("not available on {}", settings.os))
            } else if name == FPIC && settings.os.ignores_pic() {
                Some(format!("meaningless on {}", settings.os))
            } else {
                None
            };
            if let Some(reason) = reason {
                self.remove(&mut resolved, name, &reason);
            }
        }

        // configure: options made irrelevant by other options
        if self.header_only {
            self.remove(&mut resolved, SHARED, "header-only package");
            self.remove(&mut resolved, FPIC, "header-only package");
        }
        if resolved.is_enabled(SHARED) {
            self.remove(&mut resolved, FPIC, "implied by shared=True");
        }
        self.prune_removed_when(&mut resolved, settings);

        resolved
    }

    /// Apply `remove_when` conditions until nothing changes
    ///
    /// Each round evaluates every condition against the same state and only
    /// then removes the hits, so the outcome never depends on option names.
    /// A removal can satisfy conditions of other options (`enabled = false`),
    /// which the next round picks up. Options only ever leave the map, so this
    /// terminates.
    fn prune_removed_when(&self, resolved: &mut ResolvedOptions, settings: &Settings) {
        loop {
            let hits: Vec<(&String, String)> = self
                .decls
                .iter()
                .filter(|(name, _)| resolved.contains(name))
                .filter_map(|(name, decl)| {
                    decl.remove_when
                        .iter()
                        .find(|cond| {
                            cond.settings_match(settings)
                                && cond.option_match(|opt| resolved.get(opt))
                        })
                        .map(|cond| (name, format!("removed when {}", cond.describe())))
                })
                .collect();
            if hits.is_empty() {
                break;
            }
            for (name, reason) in hits {
                self.remove(resolved, name, &reason);
            }
        }
    }

    fn remove(&self, resolved: &mut ResolvedOptions, name: &str, reason: &str) {
        if let Some(slot) = resolved.values.get_mut(name) {
            if slot.take().is_some() {
                debug!("Option '{}' removed: {}", name, reason);
                if self.overridden.contains(name) {
                    let note = format!("override of option '{}' ignored: {}", name, reason);
                    warn!("{}", note);
                    resolved.notes.push(note);
                }
            }
        }
    }
}

/// Final option values for one cook
///
/// Only [`OptionModel::resolve`] produces this type, so anything taking a
/// `&ResolvedOptions` runs after both resolution phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOptions {
    values: BTreeMap<String, Option<OptionValue>>,
    notes: Vec<String>,
}

impl ResolvedOptions {
    /// Value of a present option
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name).and_then(Option::as_ref)
    }

    /// Declared and not removed
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Declared by the recipe (present or removed)
    pub fn is_declared(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Declared but removed during resolution
    pub fn is_removed(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(None))
    }

    /// Present and truthy
    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name).map(OptionValue::is_truthy).unwrap_or(false)
    }

    /// Shared-library build
    pub fn shared(&self) -> bool {
        self.is_enabled(SHARED)
    }

    /// Present options in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.as_str(), v)))
    }

    /// Removed options in name order
    pub fn removed(&self) -> impl Iterator<Item = &str> {
        self.values
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k.as_str())
    }

    /// Warnings produced during resolution
    pub fn notes(&self) -> &[String] {
        &self.notes
    }
}

impl Serialize for ResolvedOptions {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let present: Vec<_> = self.iter().collect();
        let mut map = serializer.serialize_map(Some(present.len()))?;
        for (name, value) in present {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl fmt::Display for ResolvedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        f.write_str(&pairs.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::parser::parse_recipe;
    use crate::settings::Os;

    const RECIPE: &str = r#"
[package]
name = "zeromq"
version = "4.3.5"

[sources."4.3.5"]
url = "https://example.com/zeromq-4.3.5.tar.gz"
checksum = "sha256:6653ef5910f17954861fe72332e68b03ca6e4d9c7160eb3a8de5a5a913bfab43"

[options]
shared = { values = [true, false], default = false }
fPIC = { values = [true, false], default = true }
encryption = { values = [false, "libsodium", "tweetnacl"], default = "libsodium" }
with_norm = { values = [true, false], default = false, exclude_os = ["Windows"] }
poller = { values = "ANY", default = "" }
with_draft_api = { values = [true, false], default = false, remove_when = [{ option = "encryption", enabled = false }] }
"#;

    fn model() -> OptionModel {
        OptionModel::from_recipe(&parse_recipe(RECIPE).unwrap())
    }

    #[test]
    fn test_truthiness() {
        assert!(OptionValue::Bool(true).is_truthy());
        assert!(!OptionValue::Bool(false).is_truthy());
        assert!(OptionValue::from("openssl").is_truthy());
        for falsy in ["", "False", "false", "None", "none", "0", "OFF", "off"] {
            assert!(!OptionValue::from(falsy).is_truthy(), "{falsy:?}");
        }
        assert!(OptionValue::from("True").loosely_equals(&OptionValue::Bool(true)));
    }

    #[test]
    fn test_domains_from_toml() {
        let m = model();
        assert_eq!(m.decls["shared"].values, OptionDomain::Boolean);
        assert_eq!(m.decls["poller"].values, OptionDomain::Any);
        assert!(matches!(m.decls["encryption"].values, OptionDomain::Choice(_)));
        assert_eq!(
            m.decls["encryption"].values.describe(),
            "[False, libsodium, tweetnacl]"
        );
    }

    #[test]
    fn test_defaults_on_linux() {
        let resolved = model().resolve(&Settings::for_os(Os::Linux));
        assert_eq!(resolved.get("shared"), Some(&OptionValue::Bool(false)));
        assert_eq!(resolved.get("fPIC"), Some(&OptionValue::Bool(true)));
        assert!(resolved.contains("with_norm"));
        assert!(resolved.contains("with_draft_api"));
    }

    #[test]
    fn test_fpic_absent_on_windows() {
        let resolved = model().resolve(&Settings::for_os(Os::Windows));
        assert!(!resolved.contains("fPIC"));
        assert!(resolved.is_removed("fPIC"));
        assert!(resolved.is_removed("with_norm"));
        assert!(resolved.is_declared("fPIC"));
    }

    #[test]
    fn test_fpic_absent_when_shared() {
        let mut m = model();
        m.apply_overrides(&Overrides::parse(&["shared=True"]).unwrap())
            .unwrap();
        let resolved = m.resolve(&Settings::for_os(Os::Linux));
        assert!(resolved.shared());
        assert_eq!(resolved.get("fPIC"), None);
        assert!(resolved.is_removed("fPIC"));
    }

    #[test]
    fn test_fpic_false_is_not_removed() {
        let mut m = model();
        m.apply_overrides(&Overrides::parse(&["fPIC=False"]).unwrap())
            .unwrap();
        let resolved = m.resolve(&Settings::for_os(Os::Linux));
        assert_eq!(resolved.get("fPIC"), Some(&OptionValue::Bool(false)));
        assert!(!resolved.is_removed("fPIC"));
    }

    #[test]
    fn test_remove_when_condition() {
        let mut m = model();
        m.apply_overrides(&Overrides::parse(&["encryption=False", "with_draft_api=True"]).unwrap())
            .unwrap();
        let resolved = m.resolve(&Settings::for_os(Os::Linux));
        assert_eq!(resolved.get("encryption"), Some(&OptionValue::Bool(false)));
        assert!(resolved.is_removed("with_draft_api"));
        assert_eq!(resolved.notes().len(), 1);
        assert!(resolved.notes()[0].contains("with_draft_api"));
    }

    fn chained(first: &str) -> OptionModel {
        let recipe = parse_recipe(&format!(
            r#"
[package]
name = "chain"
version = "1.0"

[options]
{first} = {{ values = [true, false], default = true, remove_when = [{{ option = "beta" }}] }}
beta = {{ values = [true, false], default = true, remove_when = [{{ os = ["Windows"] }}] }}
gamma = {{ values = [true, false], default = true, remove_when = [{{ option = "beta", enabled = false }}] }}
"#
        ))
        .unwrap();
        OptionModel::from_recipe(&recipe)
    }

    #[test]
    fn test_remove_when_ignores_option_names() {
        let windows = Settings::for_os(Os::Windows);
        for first in ["alpha", "zeta"] {
            let resolved = chained(first).resolve(&windows);
            assert!(resolved.is_removed(first), "{first}");
            assert!(resolved.is_removed("beta"), "{first}");
        }
    }

    #[test]
    fn test_remove_when_chains() {
        // gamma only goes once beta is gone
        let resolved = chained("alpha").resolve(&Settings::for_os(Os::Windows));
        assert!(resolved.is_removed("gamma"));

        let resolved = chained("alpha").resolve(&Settings::for_os(Os::Linux));
        assert!(resolved.is_removed("alpha"));
        assert!(resolved.contains("beta"));
        assert!(resolved.contains("gamma"));
    }

    #[test]
    fn test_unknown_option_rejected() {
        let mut m = model();
        let err = m
            .apply_overrides(&Overrides::parse(&["with_zmq=True"]).unwrap())
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("with_zmq"));
    }

    #[test]
    fn test_out_of_domain_value_rejected() {
        let mut m = model();
        let err = m
            .apply_overrides(&Overrides::parse(&["shared=True", "encryption=wolfssl"]).unwrap())
            .unwrap_err();
        let msg = err.to_string();
        assert!(err.is_configuration());
        assert!(msg.contains("encryption"));
        assert!(msg.contains("libsodium"));
        // Nothing applied on error
        assert_eq!(m.value("shared"), Some(&OptionValue::Bool(false)));
    }

    #[test]
    fn test_any_domain_keeps_text() {
        let mut m = model();
        m.apply_overrides(&Overrides::parse(&["poller=epoll"]).unwrap())
            .unwrap();
        let resolved = m.resolve(&Settings::for_os(Os::Linux));
        assert_eq!(resolved.get("poller"), Some(&OptionValue::from("epoll")));
    }

    #[test]
    fn test_serialization_omits_removed() {
        let resolved = model().resolve(&Settings::for_os(Os::Windows));
        let json = serde_json::to_value(&resolved).unwrap();
        assert!(json.get("fPIC").is_none());
        assert_eq!(json["shared"], serde_json::json!(false));
        assert_eq!(json["encryption"], serde_json::json!("libsodium"));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let m = model();
        let settings = Settings::for_os(Os::Macos);
        assert_eq!(m.resolve(&settings), m.resolve(&settings));
    }
}
