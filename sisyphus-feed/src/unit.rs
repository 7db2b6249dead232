//! Replication unit addressing and parsing.
//!
//! # Addressing
//!
//! A sequence number is split into three zero-padded groups of three digits:
//!
//! | sequence   | path               |
//! |------------|--------------------|
//! | 42         | `000/000/042.osm.gz` |
//! | 5981203    | `005/981/203.osm.gz` |
//!
//! # Content
//!
//! Each unit is a gzip-compressed `<osm>` document with one `<changeset>`
//! element per changeset closed during that minute. Only the `id` and `uid`
//! attributes are used; nested `<tag>` and `<discussion>` elements are skipped.

use std::collections::HashSet;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use sisyphus_core::{ChangesetId, SequenceNumber, UserId, WatchList};

use crate::error::FeedError;

/// Relative path of unit `n` under the feed's base URL: pure.
pub fn unit_path(n: SequenceNumber) -> String {
    let n = n.0;
    format!(
        "{:03}/{:03}/{:03}.osm.gz",
        n / 1_000_000,
        (n / 1_000) % 1_000,
        n % 1_000
    )
}

/// Absolute URL of unit `n` under `base_url`.
pub fn unit_url(base_url: &str, n: SequenceNumber) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), unit_path(n))
}

/// Stream-parse a decompressed unit and return the ids of changesets authored
/// by a member of `watch`.
///
/// Ids come back in document order with later duplicates dropped. Changesets
/// without a `uid` (anonymous edits from before 2008) never match.
pub fn parse_unit<R: BufRead>(source: R, watch: &WatchList) -> Result<Vec<ChangesetId>, FeedError> {
    let mut reader = Reader::from_reader(source);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut depth: usize = 0;
    let mut has_root = false;
    let mut seen = HashSet::new();
    let mut matched = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| FeedError::Xml(format!("at byte {}: {e}", reader.buffer_position())))?;
        match event {
            Event::Start(e) => {
                if depth == 0 {
                    expect_root(&e, &mut has_root)?;
                }
                depth += 1;
                if e.name().as_ref() == b"changeset" {
                    collect_match(&e, watch, &mut seen, &mut matched)?;
                }
            }
            Event::Empty(e) => {
                if depth == 0 {
                    expect_root(&e, &mut has_root)?;
                }
                if e.name().as_ref() == b"changeset" {
                    collect_match(&e, watch, &mut seen, &mut matched)?;
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !has_root {
        return Err(FeedError::Xml("no root element".into()));
    }
    if depth != 0 {
        return Err(FeedError::Xml(format!(
            "document truncated with {depth} unclosed element(s)"
        )));
    }
    Ok(matched)
}

/// A unit holds exactly one top-level element and it is `<osm>`.
fn expect_root(element: &BytesStart<'_>, has_root: &mut bool) -> Result<(), FeedError> {
    let name = element.name();
    if *has_root {
        return Err(FeedError::Xml(format!(
            "second root element <{}>",
            String::from_utf8_lossy(name.as_ref())
        )));
    }
    if name.as_ref() != b"osm" {
        return Err(FeedError::Xml(format!(
            "root element is <{}>, expected <osm>",
            String::from_utf8_lossy(name.as_ref())
        )));
    }
    *has_root = true;
    Ok(())
}

fn collect_match(
    element: &BytesStart<'_>,
    watch: &WatchList,
    seen: &mut HashSet<ChangesetId>,
    matched: &mut Vec<ChangesetId>,
) -> Result<(), FeedError> {
    let Some(uid) = numeric_attr(element, b"uid")? else {
        return Ok(());
    };
    if !watch.contains(UserId(uid)) {
        return Ok(());
    }
    let id = numeric_attr(element, b"id")?
        .map(ChangesetId)
        .ok_or_else(|| FeedError::Xml(format!("changeset by uid {uid} has no id")))?;
    if seen.insert(id) {
        matched.push(id);
    }
    Ok(())
}

fn numeric_attr(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<u64>, FeedError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| FeedError::Xml(e.to_string()))?;
        if attr.key.as_ref() != name {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|e| FeedError::Xml(e.to_string()))?;
        return value.trim().parse::<u64>().map(Some).map_err(|_| {
            FeedError::Xml(format!(
                "attribute {} is not a number: {value:?}",
                String::from_utf8_lossy(name)
            ))
        });
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn watch(uids: &[u64]) -> WatchList {
        uids.iter().copied().collect()
    }

    #[rstest]
    #[case(0, "000/000/000.osm.gz")]
    #[case(42, "000/000/042.osm.gz")]
    #[case(1_000, "000/001/000.osm.gz")]
    #[case(2_004_560, "002/004/560.osm.gz")]
    #[case(5_981_203, "005/981/203.osm.gz")]
    fn unit_paths(#[case] n: u64, #[case] expected: &str) {
        assert_eq!(unit_path(SequenceNumber(n)), expected);
    }

    #[test]
    fn unit_url_tolerates_trailing_slash() {
        assert_eq!(
            unit_url("https://planet.example/replication/changesets/", SequenceNumber(42)),
            "https://planet.example/replication/changesets/000/000/042.osm.gz"
        );
    }

    #[test]
    fn filters_by_watch_list_in_document_order() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="replicate_changesets.rb">
  <changeset id="103" uid="7" user="a" open="false"/>
  <changeset id="101" uid="7" user="a" open="false">
    <tag k="comment" v="fix"/>
  </changeset>
  <changeset id="102" uid="9" user="b" open="false"/>
</osm>"#;
        let ids = parse_unit(xml.as_bytes(), &watch(&[7])).unwrap();
        assert_eq!(ids, vec![ChangesetId(103), ChangesetId(101)]);
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let xml = r#"<osm>
  <changeset id="5" uid="1"/>
  <changeset id="6" uid="1"/>
  <changeset id="5" uid="1"/>
</osm>"#;
        let ids = parse_unit(xml.as_bytes(), &watch(&[1])).unwrap();
        assert_eq!(ids, vec![ChangesetId(5), ChangesetId(6)]);
    }

    #[test]
    fn anonymous_changesets_never_match() {
        let xml = r#"<osm><changeset id="5" user="anon"/></osm>"#;
        assert!(parse_unit(xml.as_bytes(), &watch(&[1])).unwrap().is_empty());
    }

    #[test]
    fn non_numeric_uid_is_malformed() {
        let xml = r#"<osm><changeset id="5" uid="seven"/></osm>"#;
        let err = parse_unit(xml.as_bytes(), &watch(&[7])).unwrap_err();
        assert!(matches!(err, FeedError::Xml(_)), "got: {err}");
    }

    #[test]
    fn mismatched_tags_are_malformed() {
        let xml = r#"<osm><changeset id="5" uid="7"></osm>"#;
        assert!(parse_unit(xml.as_bytes(), &watch(&[7])).is_err());
    }

    #[test]
    fn truncated_document_is_malformed() {
        let xml = r#"<osm><changeset id="5" uid="7"/>"#;
        assert!(parse_unit(xml.as_bytes(), &watch(&[7])).is_err());
    }

    #[rstest]
    #[case::empty("")]
    #[case::prolog_only(r#"<?xml version="1.0" encoding="UTF-8"?>"#)]
    #[case::plain_text("Service temporarily unavailable")]
    fn document_without_root_is_malformed(#[case] body: &str) {
        let err = parse_unit(body.as_bytes(), &watch(&[7])).unwrap_err();
        assert!(matches!(&err, FeedError::Xml(m) if m == "no root element"), "got: {err}");
    }

    #[rstest]
    #[case::html("<html><body>Bad Gateway</body></html>")]
    #[case::two_roots(r#"<osm></osm><osm><changeset id="5" uid="7"/></osm>"#)]
    fn foreign_or_repeated_root_is_malformed(#[case] body: &str) {
        let err = parse_unit(body.as_bytes(), &watch(&[7])).unwrap_err();
        assert!(matches!(err, FeedError::Xml(_)), "got: {err}");
    }

    #[test]
    fn self_closing_root_is_an_empty_unit() {
        assert!(parse_unit(&b"<osm/>"[..], &watch(&[7])).unwrap().is_empty());
    }

    #[test]
    fn empty_unit_yields_nothing() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?><osm version="0.6"></osm>"#;
        assert!(parse_unit(xml.as_bytes(), &watch(&[7])).unwrap().is_empty());
    }
}
