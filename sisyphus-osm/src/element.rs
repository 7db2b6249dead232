//! OSM element model: nodes, ways and relations at one version.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Coordinates are published with seven decimals.
const COORD_EPSILON: f64 = 0.5e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementType {
    Node,
    Way,
    Relation,
}

impl ElementType {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Node => "node",
            ElementType::Way => "way",
            ElementType::Relation => "relation",
        }
    }

    /// Position when referenced objects must exist first (modify/create).
    pub(crate) fn build_rank(self) -> u8 {
        match self {
            ElementType::Node => 0,
            ElementType::Way => 1,
            ElementType::Relation => 2,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(ElementType::Node),
            "way" => Ok(ElementType::Way),
            "relation" => Ok(ElementType::Relation),
            other => Err(format!("unknown element type '{other}'")),
        }
    }
}

/// Section of an osmChange document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    Create,
    Modify,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Modify => "modify",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub kind: ElementType,
    pub id: i64,
    pub role: String,
}

/// One version of a node, way or relation.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: ElementType,
    pub id: i64,
    pub version: u64,
    pub visible: bool,
    /// `(lat, lon)`; nodes only, absent on deleted versions.
    pub coords: Option<(f64, f64)>,
    pub tags: BTreeMap<String, String>,
    /// Way node references, in order.
    pub nodes: Vec<i64>,
    pub members: Vec<Member>,
}

impl Element {
    pub fn new(kind: ElementType, id: i64, version: u64) -> Self {
        Self {
            kind,
            id,
            version,
            visible: true,
            coords: None,
            tags: BTreeMap::new(),
            nodes: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn key(&self) -> (ElementType, i64) {
        (self.kind, self.id)
    }

    /// Equal map data, ignoring version and changeset metadata.
    pub fn same_content(&self, other: &Element) -> bool {
        let coords_match = match (self.coords, other.coords) {
            (Some((a_lat, a_lon)), Some((b_lat, b_lon))) => {
                (a_lat - b_lat).abs() < COORD_EPSILON && (a_lon - b_lon).abs() < COORD_EPSILON
            }
            (None, None) => true,
            _ => false,
        };
        self.kind == other.kind
            && self.id == other.id
            && self.visible == other.visible
            && coords_match
            && self.tags == other.tags
            && self.nodes == other.nodes
            && self.members == other.members
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} v{}", self.kind, self.id, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn node(lat: f64, lon: f64) -> Element {
        Element {
            coords: Some((lat, lon)),
            ..Element::new(ElementType::Node, 1, 1)
        }
    }

    #[test]
    fn content_ignores_version() {
        let a = node(51.5, -0.12);
        let mut b = a.clone();
        b.version = 7;
        assert!(a.same_content(&b));
    }

    #[rstest]
    #[case::identical(51.5, -0.12, true)]
    #[case::below_precision(51.50000001, -0.12, true)]
    #[case::lon_below_precision(51.5, -0.12000004, true)]
    #[case::lat_moved(51.5000002, -0.12, false)]
    #[case::lon_moved(51.5, -0.1200001, false)]
    fn content_tolerates_rounding_noise(#[case] lat: f64, #[case] lon: f64, #[case] same: bool) {
        assert_eq!(node(51.5, -0.12).same_content(&node(lat, lon)), same);
    }

    #[test]
    fn content_compares_tags() {
        let a = node(0.0, 0.0);
        let mut b = a.clone();
        b.tags.insert("name".into(), "x".into());
        assert!(!a.same_content(&b));
    }
}
