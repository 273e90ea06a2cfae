//! Core data models used throughout osm-ingest.
//!
//! [`RawElement`] is what the XML reader hands to the shaper; it lives for
//! one element of the streaming pass. [`ShapedRecord`] is the normalized
//! document written to the JSON-lines file and loaded into the store.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The two OSM element kinds that produce records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Node,
    Way,
}

impl ElementKind {
    /// Map an XML element name to a kind. Anything other than `node` or
    /// `way` (`relation`, `bounds`, `tag`, ...) yields `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "node" => Some(ElementKind::Node),
            "way" => Some(ElementKind::Way),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One XML element as read from the source, with its `tag` and `nd`
/// descendants collected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawElement {
    /// XML element name (`node`, `way`, `relation`, ...).
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    /// `k`/`v` pairs in document order.
    pub tags: Vec<(String, String)>,
    /// `nd/@ref` values in document order.
    pub node_refs: Vec<String>,
}

impl RawElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    pub fn with_node_ref(mut self, node_ref: impl Into<String>) -> Self {
        self.node_refs.push(node_ref.into());
        self
    }
}

/// Edit provenance, copied verbatim from the element's attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Created {
    pub version: String,
    pub changeset: String,
    pub timestamp: String,
    pub user: String,
    pub uid: String,
}

/// Address sub-fields extracted from `addr:*` tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub housenumber: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        self.housenumber.is_none() && self.postcode.is_none() && self.street.is_none()
    }
}

/// Field names owned by the record structure. Generic tags with these
/// keys are not copied onto the record.
pub const RESERVED_FIELDS: &[&str] = &[
    "id",
    "type",
    "visible",
    "created",
    "pos",
    "address",
    "node_refs",
];

/// Normalized document produced from one `node` or `way`.
///
/// Serializes with the structural fields first, followed by the generic
/// tag keys in lexical order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapedRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub visible: String,
    pub created: Created,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_refs: Option<Vec<String>>,
    #[serde(flatten)]
    pub tags: BTreeMap<String, String>,
}
