// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Positional argument: recipe file
fn recipe_arg() -> Arg {
    Arg::new("recipe")
        .required(true)
        .value_name("RECIPE")
        .help("Path to the recipe file")
}

/// Repeatable target setting
fn setting_arg() -> Arg {
    Arg::new("setting")
        .short('s')
        .long("setting")
        .value_name("KEY=VALUE")
        .action(ArgAction::Append)
        .help("Target setting (os, arch, compiler, compiler.version, compiler.cppstd, build_type)")
}

/// Repeatable option override
fn option_arg() -> Arg {
    Arg::new("option")
        .short('o')
        .long("option")
        .value_name("NAME=VALUE")
        .action(ArgAction::Append)
        .help("Option override")
}

fn version_arg() -> Arg {
    Arg::new("pkg_version")
        .long("pkg-version")
        .value_name("VERSION")
        .help("Upstream version to build (default: the recipe's version)")
}

fn source_cache_arg() -> Arg {
    Arg::new("source_cache")
        .long("source-cache")
        .value_name("DIR")
        .help("Directory for caching downloaded sources")
}

fn build_cli() -> Command {
    Command::new("pantry")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Pantry Contributors")
        .about("Build C/C++ libraries from declarative recipes")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Verbose output (debug logging)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Kitchen configuration file (default: ~/.config/pantry/config.toml)"),
        )
        .subcommand(
            Command::new("cook")
                .about("Build and package a library from a recipe")
                .arg(recipe_arg())
                .arg(setting_arg())
                .arg(option_arg())
                .arg(version_arg())
                .arg(
                    Arg::new("output")
                        .long("output")
                        .value_name("DIR")
                        .help("Package output directory (default: ./<name>-<version>)"),
                )
                .arg(source_cache_arg())
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .help("Number of parallel build jobs"),
                )
                .arg(
                    Arg::new("keep_builddir")
                        .long("keep-builddir")
                        .action(ArgAction::SetTrue)
                        .help("Keep build directory after completion"),
                )
                .arg(
                    Arg::new("offline")
                        .long("offline")
                        .action(ArgAction::SetTrue)
                        .help("Fail instead of downloading sources that are not cached"),
                ),
        )
        .subcommand(
            Command::new("resolve")
                .about("Print resolved options and dependencies as JSON")
                .arg(recipe_arg())
                .arg(setting_arg())
                .arg(option_arg())
                .arg(version_arg()),
        )
        .subcommand(
            Command::new("validate")
                .about("Check a recipe for errors and warnings")
                .arg(recipe_arg()),
        )
        .subcommand(
            Command::new("fetch")
                .about("Download and verify sources without building")
                .arg(recipe_arg())
                .arg(version_arg())
                .arg(source_cache_arg()),
        )
        .subcommand(
            Command::new("order")
                .about("Print the build order of all recipes in a directory")
                .arg(
                    Arg::new("dir")
                        .required(true)
                        .value_name("DIR")
                        .help("Directory containing *.toml recipes"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let cmd = build_cli();

    // Main page plus one page per subcommand
    let mut pages = vec![("pantry".to_string(), cmd.clone())];
    for sub in cmd.get_subcommands() {
        pages.push((format!("pantry-{}", sub.get_name()), sub.clone()));
    }

    for (name, page) in pages {
        let mut buffer = Vec::new();
        if let Err(e) = Man::new(page).render(&mut buffer) {
            println!("cargo:warning=Failed to render man page {}: {}", name, e);
            return;
        }
        let man_path = man_dir.join(format!("{}.1", name));
        if let Err(e) = fs::write(&man_path, buffer) {
            println!("cargo:warning=Failed to write man page: {}", e);
            return;
        }
    }
}
