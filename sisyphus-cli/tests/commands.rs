//! Offline CLI behaviour: init, cursor control and config errors.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use sisyphus_core::{config, UserId};

fn sisyphus_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sisyphus"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("SISYPHUS_CONFIG")
        .env_remove("SISYPHUS_OSM_USERNAME")
        .env_remove("SISYPHUS_OSM_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

fn config_file(home: &TempDir) -> PathBuf {
    home.path().join(".sisyphus").join("config.yaml")
}

#[test]
fn init_writes_config_under_home() {
    let home = TempDir::new().expect("home");
    sisyphus_cmd(home.path())
        .args(["init", "--user", "7", "--user", "9", "--fail-mail", "ops@example.org"])
        .assert()
        .success()
        .stdout(contains("Wrote"));

    let config = config::read_at(&config_file(&home)).expect("read config");
    assert!(config.users.contains(UserId(7)));
    assert!(config.users.contains(UserId(9)));
    assert_eq!(config.fail_mail, "ops@example.org");
    assert_eq!(config.state_file, home.path().join(".sisyphus").join("state.txt"));
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let home = TempDir::new().expect("home");
    sisyphus_cmd(home.path()).args(["init", "--user", "7"]).assert().success();
    sisyphus_cmd(home.path())
        .args(["init", "--user", "8"])
        .assert()
        .failure()
        .stderr(contains("--force"));
    sisyphus_cmd(home.path())
        .args(["init", "--user", "8", "--force"])
        .assert()
        .success();

    let config = config::read_at(&config_file(&home)).expect("read config");
    assert!(config.users.contains(UserId(8)));
    assert!(!config.users.contains(UserId(7)));
}

#[test]
fn explicit_config_path_is_honoured() {
    let home = TempDir::new().expect("home");
    let path = home.path().join("elsewhere.yaml");
    sisyphus_cmd(home.path())
        .arg("--config")
        .arg(&path)
        .args(["init", "--user", "7"])
        .assert()
        .success();
    assert!(path.exists());
    assert!(!config_file(&home).exists());
}

#[test]
fn run_without_config_points_at_init() {
    let home = TempDir::new().expect("home");
    sisyphus_cmd(home.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(contains("sisyphus init"));
}

#[test]
fn run_with_empty_watch_list_is_rejected() {
    let home = TempDir::new().expect("home");
    sisyphus_cmd(home.path()).arg("init").assert().success();
    sisyphus_cmd(home.path())
        .args(["run", "--dry-run"])
        .assert()
        .failure()
        .stderr(contains("watch-list is empty"));
}

#[test]
fn revert_without_credentials_fails_before_any_request() {
    let home = TempDir::new().expect("home");
    sisyphus_cmd(home.path()).args(["init", "--user", "7"]).assert().success();
    sisyphus_cmd(home.path())
        .args(["revert", "101"])
        .assert()
        .failure()
        .stderr(contains("credentials"));
}

#[test]
fn revert_requires_numeric_ids() {
    let home = TempDir::new().expect("home");
    sisyphus_cmd(home.path())
        .args(["revert", "abc"])
        .assert()
        .failure();
}

#[test]
fn cursor_set_then_show() {
    let home = TempDir::new().expect("home");
    sisyphus_cmd(home.path()).arg("init").assert().success();

    sisyphus_cmd(home.path())
        .args(["cursor", "show"])
        .assert()
        .success()
        .stdout(contains("not set"));

    sisyphus_cmd(home.path())
        .args(["cursor", "set", "5981203"])
        .assert()
        .success();
    sisyphus_cmd(home.path())
        .args(["cursor", "show"])
        .assert()
        .success()
        .stdout(contains("5981203"));

    let state = fs::read_to_string(home.path().join(".sisyphus").join("state.txt")).expect("state");
    assert_eq!(state.trim(), "5981203");
}

#[test]
fn cursor_does_not_move_back_without_force() {
    let home = TempDir::new().expect("home");
    sisyphus_cmd(home.path()).arg("init").assert().success();
    sisyphus_cmd(home.path()).args(["cursor", "set", "100"]).assert().success();

    sisyphus_cmd(home.path())
        .args(["cursor", "set", "90"])
        .assert()
        .failure()
        .stderr(contains("--force"));
    sisyphus_cmd(home.path())
        .args(["cursor", "set", "90", "--force"])
        .assert()
        .success();
    sisyphus_cmd(home.path())
        .args(["cursor", "show"])
        .assert()
        .success()
        .stdout(contains("90"));
}
