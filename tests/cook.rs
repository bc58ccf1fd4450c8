// tests/cook.rs

//! End-to-end cooks with a simulated build tool

mod common;

use common::{RecordingRunner, Step, Workspace, zeromq_recipe};
use pantry::recipe::package_info::{INFO_FILE, PackageInfo};
use pantry::recipe::{CookRequest, Overrides};
use pantry::settings::Os;
use pantry::{Error, ErrorKind, Kitchen, KitchenConfig, Settings};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

const SOURCES: &[(&str, &str)] = &[
    ("CMakeLists.txt", "project(zeromq CXX)\n"),
    ("COPYING", "Mozilla Public License 2.0\n"),
    ("include/zmq.h", "int zmq_version(int*, int*, int*);\n"),
];

const LINUX_INSTALL: &[(&str, &str)] = &[
    ("include/zmq.h", "int zmq_version(int*, int*, int*);\n"),
    ("lib/libzmq.a", "!<arch>\n"),
    ("lib/libzmq.so", "\x7fELF"),
    ("lib/pkgconfig/libzmq.pc", "Name: libzmq\n"),
];

fn request(os: Os, overrides: &[&str]) -> CookRequest {
    CookRequest::new(Settings::for_os(os)).with_overrides(Overrides::parse(overrides).unwrap())
}

fn configure_args(runner: &RecordingRunner) -> Vec<String> {
    let configure = runner.calls_for(Step::Configure);
    assert_eq!(configure.len(), 1);
    configure[0].args.clone()
}

/// Relative path and content of every file under `root`
fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            (
                e.path().strip_prefix(root).unwrap().to_path_buf(),
                fs::read(e.path()).unwrap(),
            )
        })
        .collect()
}

#[test]
fn test_linux_defaults_build_static_with_pic() {
    let ws = Workspace::new();
    let (archive, checksum) = ws.source_archive("zeromq-4.3.5", SOURCES);
    let recipe = ws.recipe(&zeromq_recipe(&archive, &checksum));
    let runner = Arc::new(RecordingRunner::installing(LINUX_INSTALL));

    let result = ws
        .kitchen(runner.clone())
        .cook(&recipe, &request(Os::Linux, &[]), &ws.output())
        .unwrap();

    assert!(result.options.is_enabled("fPIC"));
    let args = configure_args(&runner);
    assert!(args.contains(&"-DCMAKE_POSITION_INDEPENDENT_CODE=ON".to_string()));
    assert!(args.contains(&"-DBUILD_SHARED_LIBS=OFF".to_string()));
    assert!(args.contains(&"-DWITH_LIBSODIUM=libsodium".to_string()));
    assert!(args.contains(&"-DWITH_NORM=OFF".to_string()));

    // configure, compile, install; no tests requested
    let steps: Vec<Step> = runner.calls().iter().map(common::classify).collect();
    assert_eq!(steps, vec![Step::Configure, Step::Compile, Step::Install]);

    let files: Vec<PathBuf> = result.layout.files.clone();
    assert_eq!(
        files,
        vec![
            PathBuf::from("include/zmq.h"),
            PathBuf::from("lib/libzmq.a"),
            PathBuf::from("licenses/COPYING"),
        ]
    );

    let info = PackageInfo::read_from(&ws.output()).unwrap();
    assert_eq!(info, result.info);
    assert_eq!(info.libs, vec!["zmq"]);
    assert_eq!(info.defines, vec!["ZMQ_STATIC"]);
    assert_eq!(info.system_libs, vec!["pthread", "rt", "m"]);
    assert_eq!(info.include_dirs, vec!["include"]);
    assert_eq!(info.options.get("fPIC").map(String::as_str), Some("True"));
    assert_eq!(info.components["_default"].requires, vec!["libsodium"]);
}

#[test]
fn test_windows_build_drops_pic_flag() {
    let ws = Workspace::new();
    let (archive, checksum) = ws.source_archive("zeromq-4.3.5", SOURCES);
    let recipe = ws.recipe(&zeromq_recipe(&archive, &checksum));
    let runner = Arc::new(RecordingRunner::installing(&[
        ("include/zmq.h", "int zmq_version(int*, int*, int*);\n"),
        ("lib/zmq.lib", "!<arch>\n"),
    ]));

    let result = ws
        .kitchen(runner.clone())
        .cook(&recipe, &request(Os::Windows, &[]), &ws.output())
        .unwrap();

    assert!(!result.options.contains("fPIC"));
    assert!(result.options.is_removed("fPIC"));
    let args = configure_args(&runner);
    assert!(!args.iter().any(|a| a.contains("POSITION_INDEPENDENT_CODE")));
    assert!(!result.info.options.contains_key("fPIC"));
    assert_eq!(result.info.system_libs, vec!["iphlpapi", "ws2_32"]);
    assert!(result.layout.contains("lib/zmq.lib"));
}

#[test]
fn test_shared_build_keeps_only_shared_libraries() {
    let ws = Workspace::new();
    let (archive, checksum) = ws.source_archive("zeromq-4.3.5", SOURCES);
    let recipe = ws.recipe(&zeromq_recipe(&archive, &checksum));
    let runner = Arc::new(RecordingRunner::installing(LINUX_INSTALL));

    let result = ws
        .kitchen(runner.clone())
        .cook(&recipe, &request(Os::Linux, &["shared=True"]), &ws.output())
        .unwrap();

    let args = configure_args(&runner);
    assert!(args.contains(&"-DBUILD_SHARED_LIBS=ON".to_string()));
    assert!(!args.iter().any(|a| a.contains("POSITION_INDEPENDENT_CODE")));
    assert!(result.layout.contains("lib/libzmq.so"));
    assert!(!result.layout.contains("lib/libzmq.a"));
    assert!(result.info.defines.is_empty());
}

#[test]
fn test_encryption_choice_controls_edge() {
    let ws = Workspace::new();
    let (archive, checksum) = ws.source_archive("zeromq-4.3.5", SOURCES);
    let recipe = ws.recipe(&zeromq_recipe(&archive, &checksum));
    let kitchen = ws.kitchen(Arc::new(RecordingRunner::default()));

    let plan = kitchen.prepare(&recipe, &request(Os::Linux, &[])).unwrap();
    let sodium: Vec<_> = plan.edges.iter().filter(|e| e.name == "libsodium").collect();
    assert_eq!(sodium.len(), 1);
    assert_eq!(sodium[0].reason.as_deref(), Some("encryption"));

    let plan = kitchen
        .prepare(&recipe, &request(Os::Linux, &["encryption=False"]))
        .unwrap();
    assert!(plan.edges.is_empty());

    let plan = kitchen
        .prepare(&recipe, &request(Os::Linux, &["encryption=tweetnacl"]))
        .unwrap();
    assert!(plan.edges.is_empty());
}

#[test]
fn test_missing_artifact_leaves_no_package() {
    let ws = Workspace::new();
    let (archive, checksum) = ws.source_archive("zeromq-4.3.5", SOURCES);
    let recipe = ws.recipe(&zeromq_recipe(&archive, &checksum));
    // Install "succeeds" but produces no library
    let runner = Arc::new(RecordingRunner::installing(&[(
        "include/zmq.h",
        "int zmq_version(int*, int*, int*);\n",
    )]));

    let err = ws
        .kitchen(runner.clone())
        .cook(&recipe, &request(Os::Linux, &[]), &ws.output())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Packaging);
    match err {
        Error::MissingArtifact { path } => assert_eq!(path, PathBuf::from("lib/libzmq.a")),
        other => panic!("expected MissingArtifact, got {other}"),
    }
    assert!(!ws.output().exists());
    assert!(!ws.output().join(INFO_FILE).exists());

    // No staging directories left beside the output
    let leftovers: Vec<_> = fs::read_dir(ws.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".pantry-package-"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_tool_failure_reports_phase_and_output() {
    let ws = Workspace::new();
    let (archive, checksum) = ws.source_archive("zeromq-4.3.5", SOURCES);
    let recipe = ws.recipe(&zeromq_recipe(&archive, &checksum));
    let runner = Arc::new(
        RecordingRunner::installing(LINUX_INSTALL).failing(
            Step::Compile,
            2,
            "src/ctx.cpp:42: error: 'zmq_ctx' was not declared",
        ),
    );

    let err = ws
        .kitchen(runner.clone())
        .cook(&recipe, &request(Os::Linux, &[]), &ws.output())
        .unwrap_err();

    match err {
        Error::ToolFailed {
            tool,
            phase,
            code,
            output,
        } => {
            assert_eq!(tool, "cmake");
            assert_eq!(phase, "compile");
            assert_eq!(code, Some(2));
            assert!(output.contains("'zmq_ctx' was not declared"));
        }
        other => panic!("expected ToolFailed, got {other}"),
    }
    assert!(runner.calls_for(Step::Install).is_empty());
    assert!(!ws.output().exists());
}

#[test]
fn test_invalid_combination_fails_before_any_work() {
    let ws = Workspace::new();
    let (archive, checksum) = ws.source_archive("zeromq-4.3.5", SOURCES);
    let recipe = ws.recipe(&zeromq_recipe(&archive, &checksum));
    let runner = Arc::new(RecordingRunner::installing(LINUX_INSTALL));

    let err = ws
        .kitchen(runner.clone())
        .cook(&recipe, &request(Os::Windows, &["with_norm=True"]), &ws.output())
        .unwrap_err();

    assert!(err.is_configuration());
    assert!(err.to_string().contains("norm is not compatible with Windows"));
    assert!(runner.calls().is_empty());
    assert!(!ws.output().exists());
    assert!(!ws.path().join("cache").exists());
}

#[test]
fn test_exclusive_backends_are_rejected() {
    let ws = Workspace::new();
    let (archive, checksum) = ws.source_archive("libstrophe-0.12.3", SOURCES);
    let recipe = ws.recipe(&format!(
        r#"
[package]
name = "libstrophe"
version = "0.12.3"
language = "c"

[sources."0.12.3"]
url = "{}"
checksum = "{}"

[options]
with_openssl = {{ values = [true, false], default = true }}
with_gnutls = {{ values = [true, false], default = false }}

[[requires]]
ref = "openssl/[>=1.1 <4]"
when = {{ option = "with_openssl" }}
provides = "tls"

[[requires]]
ref = "gnutls/3.8.2"
when = {{ option = "with_gnutls" }}
provides = "tls"

[build]
system = "autotools"
"#,
        archive.display(),
        checksum
    ));
    let runner = Arc::new(RecordingRunner::default());
    let kitchen = ws.kitchen(runner.clone());

    let err = kitchen
        .cook(&recipe, &request(Os::Linux, &["with_gnutls=True"]), &ws.output())
        .unwrap_err();
    assert!(err.is_configuration());
    let message = err.to_string();
    assert!(message.contains("with_openssl"));
    assert!(message.contains("with_gnutls"));
    assert!(runner.calls().is_empty());

    let plan = kitchen
        .prepare(
            &recipe,
            &request(Os::Linux, &["with_gnutls=True", "with_openssl=False"]),
        )
        .unwrap();
    assert_eq!(plan.edges.len(), 1);
    assert_eq!(plan.edges[0].name, "gnutls");
}

#[test]
fn test_patches_apply_in_declared_order() {
    let ws = Workspace::new();
    let (archive, checksum) = ws.source_archive(
        "zeromq-4.3.5",
        &[
            ("CMakeLists.txt", "project(zeromq CXX)\n"),
            ("COPYING", "MPL-2.0\n"),
            ("src/version.txt", "stage0\n"),
        ],
    );
    fs::create_dir_all(ws.path().join("patches")).unwrap();
    fs::write(ws.path().join("patches/0001-first.patch"), "--- a\n+++ b\n").unwrap();
    fs::write(ws.path().join("patches/0002-second.patch"), "--- a\n+++ b\n").unwrap();

    let mut content = zeromq_recipe(&archive, &checksum);
    content.push_str(
        r#"
[[patches."4.3.5"]]
file = "patches/0001-first.patch"

[[patches."4.3.5"]]
replace = { file = "src/version.txt", search = "stage0", with = "stage1" }

[[patches."4.3.5"]]
file = "patches/0002-second.patch"

[[patches."4.3.5"]]
replace = { file = "src/version.txt", search = "stage1", with = "stage2" }
"#,
    );
    let recipe = ws.recipe(&content);
    let runner = Arc::new(RecordingRunner::installing(LINUX_INSTALL));
    let config = KitchenConfig {
        source_cache: ws.path().join("cache"),
        build_root: Some(ws.path().join("builds")),
        offline: true,
        keep_builddir: true,
        ..KitchenConfig::default()
    };

    let result = Kitchen::with_runner(config, runner.clone())
        .cook(&recipe, &request(Os::Linux, &[]), &ws.output())
        .unwrap();

    let applied: Vec<String> = runner
        .calls_for(Step::Patch)
        .iter()
        .filter(|inv| !inv.args.iter().any(|a| a == "--dry-run"))
        .map(|inv| {
            Path::new(inv.args.last().unwrap())
                .file_name()
                .unwrap()
                .to_string_lossy()
                .to_string()
        })
        .collect();
    assert_eq!(applied, vec!["0001-first.patch", "0002-second.patch"]);

    // The second replacement only matches after the first one ran
    let build_dir = result.build_dir.unwrap();
    let version = fs::read_to_string(build_dir.join("source/src/version.txt")).unwrap();
    assert_eq!(version, "stage2\n");
    fs::remove_dir_all(build_dir).unwrap();
}

#[test]
fn test_local_patch_checksum_is_verified() {
    let ws = Workspace::new();
    let (archive, checksum) = ws.source_archive("zeromq-4.3.5", SOURCES);
    fs::create_dir_all(ws.path().join("patches")).unwrap();
    fs::write(ws.path().join("patches/0001-fix.patch"), "--- a\n+++ b\n").unwrap();

    let with_patch = |sum: &str| {
        let mut content = zeromq_recipe(&archive, &checksum);
        content.push_str(&format!(
            r#"
[[patches."4.3.5"]]
file = "patches/0001-fix.patch"
checksum = "{sum}"
"#
        ));
        ws.recipe(&content)
    };

    let runner = Arc::new(RecordingRunner::installing(LINUX_INSTALL));
    let err = ws
        .kitchen(runner.clone())
        .cook(
            &with_patch(&format!("sha256:{}", "0".repeat(64))),
            &request(Os::Linux, &[]),
            &ws.output(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { .. }));
    assert!(runner.calls().is_empty());
    assert!(!ws.output().exists());

    let runner = Arc::new(RecordingRunner::installing(LINUX_INSTALL));
    ws.kitchen(runner.clone())
        .cook(
            &with_patch("sha256:6e53bf2ad8f234c60294a05a013874a211fe3c03653f48df43ac4ec085ab9a24"),
            &request(Os::Linux, &[]),
            &ws.output(),
        )
        .unwrap();
    assert_eq!(runner.calls_for(Step::Patch).len(), 2);
}

#[test]
fn test_recooking_gives_identical_package() {
    let ws = Workspace::new();
    let (archive, checksum) = ws.source_archive("zeromq-4.3.5", SOURCES);
    let recipe = ws.recipe(&zeromq_recipe(&archive, &checksum));
    let kitchen = ws.kitchen(Arc::new(RecordingRunner::installing(LINUX_INSTALL)));
    let req = request(Os::Linux, &[]);

    let first = kitchen.cook(&recipe, &req, &ws.output()).unwrap();
    let before = snapshot(&ws.output());

    let second = kitchen.cook(&recipe, &req, &ws.output()).unwrap();
    let after = snapshot(&ws.output());

    assert_eq!(first.layout.files, second.layout.files);
    assert_eq!(first.info, second.info);
    assert_eq!(before, after);
    assert!(after.iter().any(|(path, _)| path == Path::new(INFO_FILE)));
}

#[test]
fn test_failed_recook_keeps_previous_package() {
    let ws = Workspace::new();
    let (archive, checksum) = ws.source_archive("zeromq-4.3.5", SOURCES);
    let recipe = ws.recipe(&zeromq_recipe(&archive, &checksum));
    let req = request(Os::Linux, &[]);

    ws.kitchen(Arc::new(RecordingRunner::installing(LINUX_INSTALL)))
        .cook(&recipe, &req, &ws.output())
        .unwrap();
    let before = snapshot(&ws.output());

    // Second build loses its library
    let runner = Arc::new(RecordingRunner::installing(&[(
        "include/zmq.h",
        "int zmq_version(int*, int*, int*);\n",
    )]));
    let err = ws
        .kitchen(runner)
        .cook(&recipe, &req, &ws.output())
        .unwrap_err();

    assert!(matches!(err, Error::MissingArtifact { .. }));
    assert_eq!(snapshot(&ws.output()), before);
    assert!(PackageInfo::read_from(&ws.output()).is_ok());

    let leftovers: Vec<_> = fs::read_dir(ws.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".pantry-"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_refuses_foreign_output_directory() {
    let ws = Workspace::new();
    let (archive, checksum) = ws.source_archive("zeromq-4.3.5", SOURCES);
    let recipe = ws.recipe(&zeromq_recipe(&archive, &checksum));
    let runner = Arc::new(RecordingRunner::installing(LINUX_INSTALL));

    fs::create_dir_all(ws.output()).unwrap();
    fs::write(ws.output().join("notes.txt"), "keep me").unwrap();

    let result = ws
        .kitchen(runner.clone())
        .cook(&recipe, &request(Os::Linux, &[]), &ws.output());

    assert!(result.is_err());
    assert!(runner.calls().is_empty());
    assert_eq!(
        fs::read_to_string(ws.output().join("notes.txt")).unwrap(),
        "keep me"
    );
}

#[test]
fn test_test_option_runs_ctest() {
    let ws = Workspace::new();
    let (archive, checksum) = ws.source_archive("zeromq-4.3.5", SOURCES);
    let recipe = ws.recipe(&zeromq_recipe(&archive, &checksum));
    let runner = Arc::new(RecordingRunner::installing(LINUX_INSTALL));

    ws.kitchen(runner.clone())
        .cook(&recipe, &request(Os::Linux, &["with_tests=True"]), &ws.output())
        .unwrap();

    let steps: Vec<Step> = runner.calls().iter().map(common::classify).collect();
    assert_eq!(
        steps,
        vec![Step::Configure, Step::Compile, Step::Test, Step::Install]
    );
    assert_eq!(runner.calls_for(Step::Test)[0].program, "ctest");
}

#[test]
fn test_checksum_mismatch_stops_before_build() {
    let ws = Workspace::new();
    let (archive, _) = ws.source_archive("zeromq-4.3.5", SOURCES);
    let wrong = format!("sha256:{}", "0".repeat(64));
    let recipe = ws.recipe(&zeromq_recipe(&archive, &wrong));
    let runner = Arc::new(RecordingRunner::installing(LINUX_INSTALL));

    let err = ws
        .kitchen(runner.clone())
        .cook(&recipe, &request(Os::Linux, &[]), &ws.output())
        .unwrap_err();

    assert!(matches!(err, Error::ChecksumMismatch { .. }));
    assert!(runner.calls().is_empty());
    assert!(!ws.output().exists());
}
