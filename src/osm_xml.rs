//! Streaming OpenStreetMap XML reader.
//!
//! [`OsmReader`] walks the document with a forward-only quick-xml event
//! reader and yields one [`RawElement`] per child of the root (`node`,
//! `way`, `relation`, `bounds`, ...), with its `tag` and `nd` descendants
//! collected. Only the element being assembled is held in memory.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use osm_ingest_core::models::RawElement;

/// Element name -> occurrences across the whole document.
pub type TagCounts = BTreeMap<String, u64>;

#[derive(Debug, Error)]
pub enum OsmReadError {
    #[error("XML error at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("<{element}> at byte {position} has no '{attribute}' attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
        position: u64,
    },
}

/// An opened element, copied out of the reader's buffer.
struct Opened {
    name: String,
    attributes: BTreeMap<String, String>,
}

impl Opened {
    fn from_start(e: &BytesStart<'_>) -> Result<Self, quick_xml::Error> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut attributes = BTreeMap::new();
        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.insert(key, value);
        }
        Ok(Self { name, attributes })
    }
}

enum Step {
    Open(Opened),
    Leaf(Opened),
    Close,
    Eof,
}

/// Forward-only iterator over the root's child elements.
pub struct OsmReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    depth: usize,
    current: Option<RawElement>,
}

impl<R: BufRead> OsmReader<R> {
    pub fn new(inner: R) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            depth: 0,
            current: None,
        }
    }

    fn byte_position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    /// Read until the next complete root child, or `None` at end of input.
    pub fn next_element(&mut self) -> Result<Option<RawElement>, OsmReadError> {
        loop {
            self.buf.clear();
            let position = self.byte_position();
            let step = match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) => Step::Open(
                    Opened::from_start(&e).map_err(|source| OsmReadError::Xml { position, source })?,
                ),
                Ok(Event::Empty(e)) => Step::Leaf(
                    Opened::from_start(&e).map_err(|source| OsmReadError::Xml { position, source })?,
                ),
                Ok(Event::End(_)) => Step::Close,
                Ok(Event::Eof) => Step::Eof,
                Ok(_) => continue,
                Err(source) => return Err(OsmReadError::Xml { position, source }),
            };

            match step {
                Step::Open(opened) => {
                    let depth = self.depth;
                    self.depth += 1;
                    if let Some(done) = self.absorb(opened, depth, false, position)? {
                        return Ok(Some(done));
                    }
                }
                Step::Leaf(opened) => {
                    if let Some(done) = self.absorb(opened, self.depth, true, position)? {
                        return Ok(Some(done));
                    }
                }
                Step::Close => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 1 {
                        if let Some(done) = self.current.take() {
                            return Ok(Some(done));
                        }
                    }
                }
                Step::Eof => return Ok(self.current.take()),
            }
        }
    }

    /// Fold an opened element into the one being assembled, or start a new
    /// one if it is a direct child of the root.
    fn absorb(
        &mut self,
        opened: Opened,
        depth: usize,
        empty: bool,
        position: u64,
    ) -> Result<Option<RawElement>, OsmReadError> {
        if let Some(current) = self.current.as_mut() {
            match opened.name.as_str() {
                "tag" => {
                    let mut attrs = opened.attributes;
                    let k = take_required(&mut attrs, "tag", "k", position)?;
                    let v = take_required(&mut attrs, "tag", "v", position)?;
                    current.tags.push((k, v));
                }
                "nd" => {
                    let mut attrs = opened.attributes;
                    let node_ref = take_required(&mut attrs, "nd", "ref", position)?;
                    current.node_refs.push(node_ref);
                }
                _ => {}
            }
            return Ok(None);
        }

        if depth != 1 {
            return Ok(None);
        }
        let element = RawElement {
            name: opened.name,
            attributes: opened.attributes,
            tags: Vec::new(),
            node_refs: Vec::new(),
        };
        if empty {
            Ok(Some(element))
        } else {
            self.current = Some(element);
            Ok(None)
        }
    }
}

fn take_required(
    attrs: &mut BTreeMap<String, String>,
    element: &'static str,
    attribute: &'static str,
    position: u64,
) -> Result<String, OsmReadError> {
    attrs
        .remove(attribute)
        .ok_or(OsmReadError::MissingAttribute {
            element,
            attribute,
            position,
        })
}

impl<R: BufRead> Iterator for OsmReader<R> {
    type Item = Result<RawElement, OsmReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_element().transpose()
    }
}

/// Open an OSM file for streaming.
pub fn open_osm(path: &Path) -> Result<OsmReader<BufReader<File>>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open OSM file: {}", path.display()))?;
    Ok(OsmReader::new(BufReader::new(file)))
}

/// Count every element name in the document, at any depth.
pub fn count_tags<R: BufRead>(inner: R) -> Result<TagCounts, OsmReadError> {
    let mut reader = Reader::from_reader(inner);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut counts = TagCounts::new();
    loop {
        buf.clear();
        let position = reader.buffer_position() as u64;
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                *counts.entry(name).or_insert(0) += 1;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(source) => return Err(OsmReadError::Xml { position, source }),
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="test">
  <bounds minlat="-34.0" minlon="151.0" maxlat="-33.0" maxlon="152.0"/>
  <node id="1" lat="-33.8" lon="151.2" version="2" changeset="10" timestamp="2014-01-01T00:00:00Z" user="ann" uid="7"/>
  <node id="2" lat="-33.9" lon="151.1" version="1" changeset="11" timestamp="2014-01-02T00:00:00Z" user="bob" uid="8">
    <tag k="amenity" v="pub"/>
    <tag k="addr:street" v="George St"/>
  </node>
  <way id="3" version="1" changeset="12" timestamp="2014-01-03T00:00:00Z" user="ann" uid="7">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="highway" v="residential"/>
  </way>
  <relation id="4" version="1" changeset="13" timestamp="2014-01-04T00:00:00Z" user="ann" uid="7">
    <member type="way" ref="3" role="outer"/>
    <tag k="type" v="multipolygon"/>
  </relation>
</osm>"#;

    fn read_all(xml: &str) -> Vec<RawElement> {
        OsmReader::new(xml.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_yields_root_children_in_order() {
        let names: Vec<String> = read_all(SAMPLE).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["bounds", "node", "node", "way", "relation"]);
    }

    #[test]
    fn test_collects_tags_and_refs() {
        let elements = read_all(SAMPLE);
        let node = &elements[2];
        assert_eq!(node.attr("id"), Some("2"));
        assert_eq!(
            node.tags,
            vec![
                ("amenity".to_string(), "pub".to_string()),
                ("addr:street".to_string(), "George St".to_string()),
            ]
        );
        let way = &elements[3];
        assert_eq!(way.node_refs, vec!["1", "2"]);
        assert_eq!(way.tags.len(), 1);
    }

    #[test]
    fn test_self_closing_node_has_attributes() {
        let elements = read_all(SAMPLE);
        let node = &elements[1];
        assert_eq!(node.attr("lat"), Some("-33.8"));
        assert!(node.tags.is_empty());
    }

    #[test]
    fn test_unescapes_values() {
        let xml = r#"<osm><node id="1"><tag k="name" v="Fish &amp; Chips"/></node></osm>"#;
        let elements = read_all(xml);
        assert_eq!(elements[0].tags[0].1, "Fish & Chips");
    }

    #[test]
    fn test_tag_without_value_is_an_error() {
        let xml = r#"<osm><node id="1"><tag k="name"/></node></osm>"#;
        let result: Result<Vec<_>, _> = OsmReader::new(xml.as_bytes()).collect();
        assert!(matches!(
            result,
            Err(OsmReadError::MissingAttribute {
                element: "tag",
                attribute: "v",
                ..
            })
        ));
    }

    #[test]
    fn test_missing_ref_reports_byte_position() {
        let xml = r#"<osm><way id="1"><nd ref="1"/><nd/></way></osm>"#;
        let mut reader = OsmReader::new(xml.as_bytes());
        match reader.next_element() {
            Err(OsmReadError::MissingAttribute {
                element: "nd",
                attribute: "ref",
                position,
            }) => assert_eq!(position, xml.find("<nd/>").unwrap() as u64),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let xml = r#"<osm><node id="1"></way></osm>"#;
        let result: Result<Vec<_>, _> = OsmReader::new(xml.as_bytes()).collect();
        assert!(result.is_err());
    }

    #[test]
    fn test_count_tags() {
        let counts = count_tags(SAMPLE.as_bytes()).unwrap();
        assert_eq!(counts.get("osm"), Some(&1));
        assert_eq!(counts.get("bounds"), Some(&1));
        assert_eq!(counts.get("node"), Some(&2));
        assert_eq!(counts.get("way"), Some(&1));
        assert_eq!(counts.get("relation"), Some(&1));
        assert_eq!(counts.get("tag"), Some(&4));
        assert_eq!(counts.get("nd"), Some(&2));
        assert_eq!(counts.get("member"), Some(&1));
    }
}
