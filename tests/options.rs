// tests/options.rs

//! Option resolution and dependency declaration through the public API

mod common;

use common::{RecordingRunner, Workspace};
use pantry::recipe::{CookRequest, DependencyContext, Overrides, parse_recipe};
use pantry::settings::Os;
use pantry::{ErrorKind, Kitchen, KitchenConfig, Recipe, Settings};
use std::sync::Arc;

const CURL_LIKE: &str = r#"
[package]
name = "libcurl"
version = "8.6.0"
language = "c"

[options]
shared = { values = [true, false], default = false }
fPIC = { values = [true, false], default = true }
with_ssl = { values = [false, "openssl", "wolfssl"], default = "openssl" }
with_zlib = { values = [true, false], default = true }
with_unix_sockets = { values = [true, false], default = true, exclude_os = ["Windows"] }

[[requires]]
ref = "openssl/[>=1.1 <4]"
when = { option = "with_ssl", value = "openssl" }
provides = "tls"

[[requires]]
ref = "wolfssl/5.6.6"
when = { option = "with_ssl", value = "wolfssl" }
provides = "tls"

[[requires]]
ref = "zlib/[>=1.2.11 <2]"
when = { option = "with_zlib" }
transitive_headers = true

[[tool_requires]]
ref = "libtool/2.4.7"
"#;

fn recipe() -> Recipe {
    parse_recipe(CURL_LIKE).unwrap()
}

fn kitchen() -> Kitchen {
    Kitchen::with_runner(
        KitchenConfig::default(),
        Arc::new(RecordingRunner::default()),
    )
}

fn request(os: Os, overrides: &[&str]) -> CookRequest {
    CookRequest::new(Settings::for_os(os)).with_overrides(Overrides::parse(overrides).unwrap())
}

#[test]
fn test_linux_defaults_keep_fpic() {
    let plan = kitchen().prepare(&recipe(), &request(Os::Linux, &[])).unwrap();

    assert!(plan.options.is_enabled("fPIC"));
    assert!(!plan.options.shared());
    assert!(plan.options.contains("with_unix_sockets"));
}

#[test]
fn test_windows_removes_fpic_entirely() {
    let plan = kitchen().prepare(&recipe(), &request(Os::Windows, &[])).unwrap();

    assert!(!plan.options.contains("fPIC"));
    assert!(plan.options.is_removed("fPIC"));
    assert!(plan.options.is_declared("fPIC"));
    assert!(plan.options.get("fPIC").is_none());
    assert!(plan.options.is_removed("with_unix_sockets"));
    assert!(plan.options.iter().all(|(name, _)| name != "fPIC"));
}

#[test]
fn test_shared_removes_fpic() {
    let plan = kitchen()
        .prepare(&recipe(), &request(Os::Linux, &["shared=True"]))
        .unwrap();

    assert!(plan.options.shared());
    assert!(!plan.options.contains("fPIC"));
}

#[test]
fn test_fpic_override_on_windows_is_noted() {
    let plan = kitchen()
        .prepare(&recipe(), &request(Os::Windows, &["fPIC=False"]))
        .unwrap();

    assert!(!plan.options.contains("fPIC"));
    assert_eq!(plan.options.notes().len(), 1);
    assert!(plan.options.notes()[0].contains("fPIC"));
}

#[test]
fn test_unknown_option_is_configuration_error() {
    let err = kitchen()
        .prepare(&recipe(), &request(Os::Linux, &["with_brotli=True"]))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("with_brotli"));
}

#[test]
fn test_out_of_domain_value_names_allowed_values() {
    let err = kitchen()
        .prepare(&recipe(), &request(Os::Linux, &["with_ssl=gnutls"]))
        .unwrap_err();

    assert!(err.is_configuration());
    let message = err.to_string();
    assert!(message.contains("with_ssl"));
    assert!(message.contains("openssl"));
    assert!(message.contains("wolfssl"));
}

#[test]
fn test_ssl_backend_selects_one_edge() {
    let plan = kitchen().prepare(&recipe(), &request(Os::Linux, &[])).unwrap();
    let ssl: Vec<_> = plan
        .edges
        .iter()
        .filter(|e| e.provides.as_deref() == Some("tls"))
        .collect();
    assert_eq!(ssl.len(), 1);
    assert_eq!(ssl[0].name, "openssl");

    let plan = kitchen()
        .prepare(&recipe(), &request(Os::Linux, &["with_ssl=wolfssl"]))
        .unwrap();
    let names: Vec<&str> = plan.edges.iter().map(|e| e.name.as_str()).collect();
    assert!(names.contains(&"wolfssl"));
    assert!(!names.contains(&"openssl"));
}

#[test]
fn test_ssl_disabled_declares_no_ssl_edge() {
    let plan = kitchen()
        .prepare(&recipe(), &request(Os::Linux, &["with_ssl=False", "with_zlib=False"]))
        .unwrap();

    let host: Vec<_> = plan.edges.iter().filter(|e| e.is_host()).collect();
    assert!(host.is_empty());

    // Tool requirements do not depend on options
    assert_eq!(plan.edges.len(), 1);
    assert_eq!(plan.edges[0].name, "libtool");
    assert_eq!(plan.edges[0].context, DependencyContext::Build);
}

#[test]
fn test_prepare_is_deterministic() {
    let k = kitchen();
    let r = recipe();
    let req = request(Os::Macos, &["with_ssl=wolfssl"]);

    let first = k.prepare(&r, &req).unwrap();
    let second = k.prepare(&r, &req).unwrap();

    assert_eq!(first.options.to_string(), second.options.to_string());
    assert_eq!(first.edges, second.edges);
}

#[test]
fn test_prepare_touches_nothing() {
    let ws = Workspace::new();
    let runner = Arc::new(RecordingRunner::default());
    let k = ws.kitchen(runner.clone());

    k.prepare(&recipe(), &request(Os::Linux, &[])).unwrap();

    assert!(runner.calls().is_empty());
    assert!(!ws.path().join("cache").exists());
    assert!(!ws.path().join("builds").exists());
}
