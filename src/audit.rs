//! Pre-conversion audit of an OSM export.
//!
//! Two independent streaming passes over the file: one counts every element
//! name, the other collects `addr:street` values whose suffix is outside the
//! street vocabulary. The report also previews what normalization would do
//! to each collected name.

use std::io::BufRead;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use osm_ingest_core::models::ElementKind;
use osm_ingest_core::street::{NamePreview, StreetSuffixIndex, StreetVocabulary};

use crate::config::Config;
use crate::osm_xml::{count_tags, open_osm, OsmReader, TagCounts};

const STREET_KEY: &str = "addr:street";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    pub tag_counts: TagCounts,
    pub street_types: StreetSuffixIndex,
    pub preview: Vec<NamePreview>,
}

/// Collect unexpected street suffixes from every node and way.
pub fn audit_streets<R: BufRead>(
    input: OsmReader<R>,
    vocab: &StreetVocabulary,
) -> Result<StreetSuffixIndex> {
    let mut index = StreetSuffixIndex::new();
    for element in input {
        let element = element?;
        if ElementKind::from_name(&element.name).is_none() {
            continue;
        }
        for (key, value) in &element.tags {
            if key == STREET_KEY {
                vocab.audit(&mut index, value);
            }
        }
    }
    Ok(index)
}

/// Run both passes over the file at `path`.
pub fn audit_file(path: &Path, vocab: &StreetVocabulary) -> Result<AuditReport> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open OSM file: {}", path.display()))?;
    let tag_counts = count_tags(std::io::BufReader::new(file))?;
    let street_types = audit_streets(open_osm(path)?, vocab)?;
    let preview = vocab.preview(&street_types);
    Ok(AuditReport {
        tag_counts,
        street_types,
        preview,
    })
}

/// Run the audit command and print the report.
pub fn run_audit(config: &Config, path: &Path, json: bool) -> Result<AuditReport> {
    let report = audit_file(path, &config.streets.vocabulary())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report);
    }

    println!("Element counts");
    println!("==============");
    for (name, count) in &report.tag_counts {
        println!("  {:<12} {}", name, count);
    }

    println!();
    println!("Unexpected street suffixes");
    println!("==========================");
    if report.street_types.is_empty() {
        println!("  (none)");
    }
    for (suffix, names) in report.street_types.iter() {
        println!("  {} ({})", suffix, names.len());
        for name in names {
            println!("    {}", name);
        }
    }

    println!();
    println!("Normalization preview");
    println!("=====================");
    for entry in &report.preview {
        match &entry.fixed {
            Some(fixed) => println!("  {} => {}", entry.original, fixed),
            None => println!("  not fixed: {}", entry.original),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"<osm>
  <node id="1" version="1" changeset="1" timestamp="t" user="a" uid="1">
    <tag k="addr:street" v="George St"/>
  </node>
  <node id="2" version="1" changeset="1" timestamp="t" user="a" uid="1">
    <tag k="addr:street" v="Pitt Street"/>
  </node>
  <way id="3" version="1" changeset="1" timestamp="t" user="a" uid="1">
    <tag k="addr:street" v="King St"/>
    <tag k="name" v="Queen St"/>
  </way>
  <relation id="4" version="1" changeset="1" timestamp="t" user="a" uid="1">
    <tag k="addr:street" v="Relation Rd"/>
  </relation>
  <node id="5" version="1" changeset="1" timestamp="t" user="a" uid="1">
    <tag k="addr:street" v="The Esplanade"/>
  </node>
</osm>"#;

    #[test]
    fn test_audit_streets_collects_unexpected_suffixes() {
        let index =
            audit_streets(OsmReader::new(SAMPLE.as_bytes()), &StreetVocabulary::default()).unwrap();
        let st: Vec<&String> = index.get("St").unwrap().iter().collect();
        assert_eq!(st, vec!["George St", "King St"]);
        assert!(!index.contains_suffix("Street"));
        // relations are not audited
        assert!(!index.contains_suffix("Rd"));
        assert!(index.contains_suffix("Esplanade"));
    }

    #[test]
    fn test_audit_file_report() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let report = audit_file(file.path(), &StreetVocabulary::default()).unwrap();
        assert_eq!(report.tag_counts.get("node"), Some(&3));
        assert_eq!(report.tag_counts.get("tag"), Some(&6));
        assert_eq!(report.street_types.len(), 2);

        let fixed: Vec<(&str, Option<&str>)> = report
            .preview
            .iter()
            .map(|p| (p.original.as_str(), p.fixed.as_deref()))
            .collect();
        assert!(fixed.contains(&("George St", Some("George Street"))));
        assert!(fixed.contains(&("The Esplanade", None)));
    }
}
