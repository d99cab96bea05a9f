//! Runs the `sketchy` binary against temporary projects.

mod common;

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;

use common::{read, write_project};

const MACROS: &str = "#macro SPEED 4\n";
const PLAYER: &str = "const STEP = SPEED * 2\nx += STEP;\n";
const PLAIN: &str = "x = 1;\n";

fn sketchy(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sketchy").unwrap();
    cmd.arg(root)
        .env_remove("YYMACROS_project_cache_directory_name")
        .env_remove("YYMACROS_ide_cache_directory")
        .env_remove("YYtempFolder")
        .env_remove("RUST_LOG");
    cmd
}

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_project(
        dir.path(),
        &[
            ("scripts/macros/macros.gml", MACROS),
            ("scripts/player/player.gml", PLAYER),
            ("scripts/plain/plain.gml", PLAIN),
            ("extensions/ext/ext.gml", "const IGNORED = 1\n"),
        ],
    );
    dir
}

#[test]
fn pre_rewrites_and_post_restores() {
    let dir = project();
    let root = dir.path();
    let player = root.join("scripts/player/player.gml");

    sketchy(root)
        .arg("--pre")
        .assert()
        .success()
        .stdout(contains("[Sketchy] Loaded 1 macros"))
        .stdout(contains("Pre complete. Modified 2 files"));

    assert_eq!(read(&player), "//const STEP = SPEED * 2\nx += 8;\n");
    assert_eq!(read(&root.join("scripts/player/player.gml_bak")), PLAYER);
    assert_eq!(
        read(&root.join("scripts/player/player.gml_mod")),
        "//const STEP = SPEED * 2\nx += 8;\n"
    );
    assert_eq!(read(&root.join("scripts/macros/macros.gml")), "//#macro SPEED 4\n");
    assert!(!root.join("scripts/plain/plain.gml_mod").exists());
    assert_eq!(read(&root.join("extensions/ext/ext.gml")), "const IGNORED = 1\n");

    sketchy(root)
        .arg("--post")
        .assert()
        .success()
        .stdout(contains("[Sketchy] Restore originals"));

    assert_eq!(read(&player), PLAYER);
    assert!(!root.join("scripts/player/player.gml_bak").exists());
    assert!(root.join("scripts/player/player.gml_mod").exists());
}

#[test]
fn pre_twice_restores_leftovers_first() {
    let dir = project();
    let root = dir.path();

    sketchy(root).arg("--pre").assert().success();
    sketchy(root)
        .arg("--pre")
        .assert()
        .success()
        .stdout(contains("Modified 2 files"));

    assert_eq!(read(&root.join("scripts/player/player.gml_bak")), PLAYER);
}

#[test]
fn clean_removes_cached_rewrites() {
    let dir = project();
    let root = dir.path();

    sketchy(root).arg("--pre").assert().success();
    sketchy(root)
        .arg("--clean")
        .assert()
        .success()
        .stdout(contains("[Sketchy] Clean cache"));

    assert_eq!(read(&root.join("scripts/player/player.gml")), PLAYER);
    assert!(!root.join("scripts/player/player.gml_mod").exists());
    assert!(!root.join("scripts/macros/macros.gml_mod").exists());
}

#[test]
fn post_archives_backups_into_temp_folder() {
    let dir = project();
    let root = dir.path();
    let temp = tempfile::tempdir().unwrap();

    sketchy(root).arg("--pre").assert().success();
    sketchy(root)
        .arg("--post")
        .env("YYtempFolder", temp.path())
        .assert()
        .success();

    let archived: Vec<String> = fs::read_dir(temp.path().join("Sketchy"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(archived.len(), 2);
    assert!(archived.iter().any(|name| name.starts_with("player.gml_")));
}

#[test]
fn dry_run_prints_diff_and_writes_nothing() {
    let dir = project();
    let root = dir.path();

    sketchy(root)
        .args(["--pre", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("+x += 8;"))
        .stdout(contains("-x += STEP;"))
        .stdout(contains("2 of 2 files would change"));

    assert_eq!(read(&root.join("scripts/player/player.gml")), PLAYER);
    assert!(!root.join("scripts/player/player.gml_mod").exists());
}

#[test]
fn list_macros_prints_json() {
    let dir = project();
    sketchy(dir.path())
        .arg("--list-macros")
        .assert()
        .success()
        .stdout(contains("\"name\": \"SPEED\"").and(contains("\"body\": \"4\"")));
}

#[test]
fn failures_render_diagnostics_and_exit_nonzero() {
    let dir = project();
    let root = dir.path();
    write_project(root, &[("scripts/other/other.gml", "#macro SPEED 5\n")]);

    sketchy(root)
        .arg("--pre")
        .assert()
        .failure()
        .code(1)
        .stderr(contains("sketchy::definition::duplicate_macro"));

    assert_eq!(read(&root.join("scripts/player/player.gml")), PLAYER);
}

#[test]
fn a_mode_flag_is_required() {
    let dir = project();
    sketchy(dir.path()).assert().failure();
    sketchy(dir.path()).args(["--pre", "--clean"]).assert().failure();
}
