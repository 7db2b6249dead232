//! OSM XML codec.
//!
//! Reading handles both `<osm>` documents (element and changeset queries) and
//! `<osmChange>` documents (changeset downloads). Writing produces the two
//! bodies the write API accepts: the changeset metadata document and the
//! osmChange upload.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::BufRead;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use sisyphus_core::ChangesetId;

use crate::element::{Action, Element, ElementType, Member};
use crate::error::XmlError;

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Parse every node, way and relation in `source`.
///
/// Each element is paired with the osmChange section it appeared in, or
/// `None` for plain `<osm>` documents.
pub fn parse_elements<R: BufRead>(source: R) -> Result<Vec<(Option<Action>, Element)>, XmlError> {
    let mut reader = Reader::from_reader(source);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut section: Option<Action> = None;
    let mut current: Option<Element> = None;
    let mut out = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| XmlError(e.to_string()))?;
        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"create" => section = Some(Action::Create),
                b"modify" => section = Some(Action::Modify),
                b"delete" => section = Some(Action::Delete),
                b"node" | b"way" | b"relation" => current = Some(element_start(&e)?),
                _ => child(&e, current.as_mut())?,
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"node" | b"way" | b"relation" => out.push((section, element_start(&e)?)),
                _ => child(&e, current.as_mut())?,
            },
            Event::End(e) => match e.name().as_ref() {
                b"create" | b"modify" | b"delete" => section = None,
                b"node" | b"way" | b"relation" => {
                    if let Some(element) = current.take() {
                        out.push((section, element));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if current.is_some() {
        return Err(XmlError("document ended inside an element".into()));
    }
    Ok(out)
}

/// `user` attribute of the first `<changeset>` in `source`.
pub fn parse_changeset_user<R: BufRead>(source: R) -> Result<Option<String>, XmlError> {
    let mut reader = Reader::from_reader(source);
    reader.trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| XmlError(e.to_string()))?
        {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"changeset" => {
                return Ok(attributes(&e)?.remove("user"));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

fn attributes(e: &BytesStart<'_>) -> Result<BTreeMap<String, String>, XmlError> {
    let mut map = BTreeMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| XmlError(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| XmlError(err.to_string()))?
            .into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

fn required<T: std::str::FromStr>(
    attrs: &BTreeMap<String, String>,
    key: &str,
    tag: &str,
) -> Result<T, XmlError> {
    let raw = attrs
        .get(key)
        .ok_or_else(|| XmlError(format!("<{tag}> without `{key}`")))?;
    raw.parse()
        .map_err(|_| XmlError(format!("<{tag}> has invalid `{key}`: {raw:?}")))
}

fn element_start(e: &BytesStart<'_>) -> Result<Element, XmlError> {
    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let kind: ElementType = tag.parse().map_err(XmlError)?;
    let attrs = attributes(e)?;
    let mut element = Element::new(
        kind,
        required(&attrs, "id", &tag)?,
        required(&attrs, "version", &tag)?,
    );
    element.visible = attrs.get("visible").map_or(true, |v| v != "false");
    if kind == ElementType::Node {
        if let (Some(_), Some(_)) = (attrs.get("lat"), attrs.get("lon")) {
            element.coords = Some((
                required(&attrs, "lat", &tag)?,
                required(&attrs, "lon", &tag)?,
            ));
        }
    }
    Ok(element)
}

fn child(e: &BytesStart<'_>, current: Option<&mut Element>) -> Result<(), XmlError> {
    let Some(element) = current else {
        return Ok(());
    };
    match e.name().as_ref() {
        b"tag" => {
            let mut attrs = attributes(e)?;
            let k = attrs.remove("k").unwrap_or_default();
            let v = attrs.remove("v").unwrap_or_default();
            element.tags.insert(k, v);
        }
        b"nd" => {
            let attrs = attributes(e)?;
            element.nodes.push(required(&attrs, "ref", "nd")?);
        }
        b"member" => {
            let mut attrs = attributes(e)?;
            let kind = attrs
                .get("type")
                .ok_or_else(|| XmlError("<member> without `type`".into()))?
                .parse()
                .map_err(XmlError)?;
            let id = required(&attrs, "ref", "member")?;
            let role = attrs.remove("role").unwrap_or_default();
            element.members.push(Member { kind, id, role });
        }
        _ => {}
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// `<osm><changeset>` body for `PUT /changeset/create`.
pub fn changeset_xml(tags: &BTreeMap<String, String>) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<osm>\n  <changeset>\n");
    for (k, v) in tags {
        let _ = writeln!(out, "    <tag k=\"{}\" v=\"{}\"/>", escape(k.as_str()), escape(v.as_str()));
    }
    out.push_str("  </changeset>\n</osm>\n");
    out
}

/// osmChange body for `POST /changeset/{id}/upload`.
///
/// Sections are written create → modify → delete; element order inside a
/// section is preserved.
pub fn osc_xml<'a>(
    changes: impl IntoIterator<Item = (Action, &'a Element)>,
    changeset: ChangesetId,
    generator: &str,
) -> String {
    let mut sections: BTreeMap<Action, Vec<&Element>> = BTreeMap::new();
    for (action, element) in changes {
        sections.entry(action).or_default().push(element);
    }

    let mut out = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<osmChange version=\"0.6\" generator=\"{}\">\n",
        escape(generator)
    );
    for (action, elements) in &sections {
        let _ = writeln!(out, "  <{action}>");
        for element in elements {
            write_element(&mut out, element, changeset);
        }
        let _ = writeln!(out, "  </{action}>");
    }
    out.push_str("</osmChange>\n");
    out
}

fn write_element(out: &mut String, element: &Element, changeset: ChangesetId) {
    let _ = write!(
        out,
        "    <{} id=\"{}\" version=\"{}\" changeset=\"{}\"",
        element.kind, element.id, element.version, changeset
    );
    if let Some((lat, lon)) = element.coords {
        let _ = write!(out, " lat=\"{lat:.7}\" lon=\"{lon:.7}\"");
    }
    if element.tags.is_empty() && element.nodes.is_empty() && element.members.is_empty() {
        out.push_str("/>\n");
        return;
    }
    out.push_str(">\n");
    for node in &element.nodes {
        let _ = writeln!(out, "      <nd ref=\"{node}\"/>");
    }
    for member in &element.members {
        let _ = writeln!(
            out,
            "      <member type=\"{}\" ref=\"{}\" role=\"{}\"/>",
            member.kind,
            member.id,
            escape(member.role.as_str())
        );
    }
    for (k, v) in &element.tags {
        let _ = writeln!(out, "      <tag k=\"{}\" v=\"{}\"/>", escape(k.as_str()), escape(v.as_str()));
    }
    let _ = writeln!(out, "    </{}>", element.kind);
}
