//! `sisyphus run` / `status` / `revert` against a stub feed and a stub OSM API.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use sisyphus_core::{config, Config, WatchList};
use sisyphus_test_utils::{gzip, Recorded, StubServer};

const UNIT_969: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
  <changeset id="101" open="false" user="vandal" uid="7"/>
  <changeset id="102" open="false" user="mapper" uid="9"/>
</osm>"#;

fn routes(req: &Recorded) -> (u16, Vec<u8>) {
    let body: &str = match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/replication/state.yaml") => {
            "---\nlast_run: 2024-03-01 10:15:02.517000000 +00:00\nsequence: 1000\n"
        }
        ("GET", "/replication/000/000/969.osm.gz") => return (200, gzip(UNIT_969)),
        ("GET", "/api/0.6/changeset/101") => {
            r#"<osm><changeset id="101" user="vandal" uid="7" open="false"/></osm>"#
        }
        ("GET", "/api/0.6/changeset/101/download") => {
            r#"<osmChange version="0.6">
  <modify>
    <node id="1" version="2" changeset="101" lat="1.0000000" lon="2.0000000">
      <tag k="name" v="LOL"/>
    </node>
  </modify>
</osmChange>"#
        }
        ("GET", "/api/0.6/node/1") => {
            r#"<osm><node id="1" version="2" visible="true" lat="1.0000000" lon="2.0000000"><tag k="name" v="LOL"/></node></osm>"#
        }
        ("GET", "/api/0.6/node/1/1") => {
            r#"<osm><node id="1" version="1" visible="true" lat="1.0000000" lon="2.0000000"><tag k="name" v="Main Street"/></node></osm>"#
        }
        ("PUT", "/api/0.6/changeset/create") => "900",
        ("POST", "/api/0.6/changeset/900/upload") => "",
        ("PUT", "/api/0.6/changeset/900/close") => "",
        _ => return (404, Vec::new()),
    };
    (200, body.as_bytes().to_vec())
}

struct Fixture {
    _home: TempDir,
    config_path: PathBuf,
    state_file: PathBuf,
    server: StubServer,
}

fn fixture() -> Fixture {
    let home = TempDir::new().expect("home");
    let server = StubServer::start(routes);
    let state_file = home.path().join("state.txt");
    let config = Config {
        users: WatchList::from_iter([7]),
        osm_username: "bot".into(),
        osm_password: "secret".into(),
        api_endpoint: server.base_url().to_string(),
        replication_url: server.url("/replication"),
        state_file: state_file.clone(),
        http_timeout_secs: 5,
        ..Config::default()
    };
    let config_path = home.path().join("config.yaml");
    config::save_at(&config_path, &config).expect("save config");
    Fixture {
        _home: home,
        config_path,
        state_file,
        server,
    }
}

fn sisyphus_cmd(config_path: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sisyphus"));
    cmd.arg("--config")
        .arg(config_path)
        .env_remove("SISYPHUS_OSM_USERNAME")
        .env_remove("SISYPHUS_OSM_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

fn paths(server: &StubServer) -> Vec<String> {
    server
        .requests()
        .iter()
        .map(|r| format!("{} {}", r.method, r.path))
        .collect()
}

#[test]
fn run_reverts_watched_changeset_and_persists_cursor() {
    let fx = fixture();
    sisyphus_cmd(&fx.config_path)
        .arg("run")
        .assert()
        .success()
        .stdout(contains("101 reverted in 900"));

    let state = fs::read_to_string(&fx.state_file).expect("state file");
    assert_eq!(state.trim(), "969");

    let paths = paths(&fx.server);
    assert!(paths.contains(&"POST /api/0.6/changeset/900/upload".to_string()));
    assert_eq!(paths.last().map(String::as_str), Some("PUT /api/0.6/changeset/900/close"));
    assert!(!paths.iter().any(|p| p.contains("/changeset/102")), "{paths:?}");
}

#[test]
fn dry_run_uploads_nothing_and_leaves_cursor() {
    let fx = fixture();
    sisyphus_cmd(&fx.config_path)
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("would revert 1 changes"));

    assert!(!fx.state_file.exists());
    assert!(!paths(&fx.server)
        .iter()
        .any(|p| p.starts_with("PUT") || p.starts_with("POST")));
}

#[test]
fn status_json_reports_plan() {
    let fx = fixture();
    let assert = sisyphus_cmd(&fx.config_path)
        .args(["status", "--json"])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("stdout utf8");
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("status json");
    assert_eq!(json["head"], 1000);
    assert_eq!(json["plan"]["start"], 969);
    assert_eq!(json["plan"]["end"], 970);
    assert_eq!(json["pending"], 1);
    assert!(json["cursor"].is_null());
}

#[test]
fn direct_revert_does_not_touch_cursor() {
    let fx = fixture();
    sisyphus_cmd(&fx.config_path)
        .args(["revert", "101"])
        .assert()
        .success()
        .stdout(contains("101 reverted in 900"));
    assert!(!fx.state_file.exists());
}

#[test]
fn failed_revert_exits_non_zero() {
    let fx = fixture();
    sisyphus_cmd(&fx.config_path)
        .args(["revert", "555"])
        .assert()
        .failure()
        .stdout(contains("DownloadError"))
        .stderr(contains("could not be reverted"));
}
