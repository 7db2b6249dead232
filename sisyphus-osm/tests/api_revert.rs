//! OsmApi + HistoryRevertEngine + run_transaction against a stub API.

use std::time::Duration;

use sisyphus_core::ChangesetId;
use sisyphus_osm::{
    changeset_tags, run_transaction, ChangesetApi, ElementSource, ElementType,
    HistoryRevertEngine, OsmApi, RevertEngine, RevertError,
};
use sisyphus_test_utils::{Recorded, StubServer};

fn osm_routes(upload_status: u16) -> impl Fn(&Recorded) -> (u16, Vec<u8>) + Send + Sync {
    move |req: &Recorded| {
        let body: &str = match (req.method.as_str(), req.path.as_str()) {
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
            ("POST", "/api/0.6/changeset/900/upload") => {
                return (upload_status, b"Version mismatch: Provided 2, server had: 3".to_vec())
            }
            ("PUT", "/api/0.6/changeset/900/close") => "",
            _ => return (404, Vec::new()),
        };
        (200, body.as_bytes().to_vec())
    }
}

fn api(server: &StubServer) -> OsmApi {
    OsmApi::new(server.base_url(), Duration::from_secs(5), "Sisyphus test")
        .with_basic_auth("bot", "secret")
}

fn paths(server: &StubServer) -> Vec<String> {
    server
        .requests()
        .iter()
        .map(|r| format!("{} {}", r.method, r.path))
        .collect()
}

#[test]
fn full_revert_round_trip() {
    let server = StubServer::start(osm_routes(200));
    let api = api(&server);
    let engine = HistoryRevertEngine::new(&api);

    let (diffs, authors) = engine.download_changesets(&[ChangesetId(101)]).expect("download");
    assert_eq!(diffs.len(), 1);
    assert_eq!(authors[&ChangesetId(101)], "vandal");

    let changes = engine.compute_reverts(&diffs).expect("compute");
    assert_eq!(changes.len(), 1);

    let tags = changeset_tags("Sisyphus test", &[ChangesetId(101)], &authors);
    let id = run_transaction(&api, &tags, &changes).expect("transaction");
    assert_eq!(id, ChangesetId(900));

    let requests = server.requests();
    let create = requests
        .iter()
        .find(|r| r.path.ends_with("/changeset/create"))
        .expect("create request");
    assert!(create.body_text().contains(r#"v="Reverting 101 by vandal""#));
    assert_eq!(create.header("Authorization"), Some("Basic Ym90OnNlY3JldA=="));

    let upload = requests
        .iter()
        .find(|r| r.path.ends_with("/upload"))
        .expect("upload request");
    let osc = upload.body_text();
    assert!(osc.contains(r#"<node id="1" version="2" changeset="900""#), "{osc}");
    assert!(osc.contains(r#"v="Main Street""#), "{osc}");

    assert_eq!(
        paths(&server).last().map(String::as_str),
        Some("PUT /api/0.6/changeset/900/close")
    );
}

#[test]
fn rejected_upload_closes_and_reports_server_reason() {
    let server = StubServer::start(osm_routes(409));
    let api = api(&server);
    let engine = HistoryRevertEngine::new(&api);
    let (diffs, authors) = engine.download_changesets(&[ChangesetId(101)]).expect("download");
    let changes = engine.compute_reverts(&diffs).expect("compute");

    let tags = changeset_tags("Sisyphus test", &[ChangesetId(101)], &authors);
    let err = run_transaction(&api, &tags, &changes).unwrap_err();
    match &err {
        RevertError::Upload { changeset, reason } => {
            assert_eq!(*changeset, ChangesetId(900));
            assert!(reason.contains("409"), "{reason}");
            assert!(reason.contains("Version mismatch"), "{reason}");
        }
        other => panic!("expected upload error, got {other:?}"),
    }

    let closes = paths(&server)
        .into_iter()
        .filter(|p| p == "PUT /api/0.6/changeset/900/close")
        .count();
    assert_eq!(closes, 1);
}

#[test]
fn gone_element_reads_as_deleted() {
    let server = StubServer::start(|req| match req.path.as_str() {
        "/api/0.6/way/5" => (410, Vec::new()),
        _ => (404, Vec::new()),
    });
    let current = api(&server).current(ElementType::Way, 5).expect("current");
    assert!(current.is_none());
}

#[test]
fn unauthorized_create_is_a_create_error() {
    let server = StubServer::start(|_| (401, b"Couldn't authenticate you".to_vec()));
    let err = api(&server).create(&Default::default()).unwrap_err();
    assert!(matches!(err, RevertError::Create(_)), "got: {err}");
    assert_eq!(server.requests().len(), 1);
}
