//! XML to JSON document conversion.
//!
//! Streams an OSM export through [`OsmReader`], shapes each element with
//! [`shape_element`], and writes one JSON document per node or way in the
//! order they appear. Compact output is one document per line; pretty
//! output is an indented document followed by a newline.
//!
//! # Malformed elements
//!
//! A shaping error either aborts the conversion ([`MalformedPolicy::Abort`],
//! the default) or is logged and counted ([`MalformedPolicy::Skip`]). XML
//! syntax errors always abort.

use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use osm_ingest_core::models::ElementKind;
use osm_ingest_core::shape::shape_element;
use osm_ingest_core::street::StreetVocabulary;

use crate::config::{Config, ConvertConfig, MalformedPolicy};
use crate::osm_xml::{open_osm, OsmReader};
use crate::progress::{ProgressEvent, ProgressMode, ProgressReporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    pub pretty: bool,
    pub on_malformed: MalformedPolicy,
    /// Report progress every N elements; 0 disables.
    pub progress_every: u64,
}

impl From<&ConvertConfig> for ConvertOptions {
    fn from(config: &ConvertConfig) -> Self {
        Self {
            pretty: config.pretty,
            on_malformed: config.on_malformed,
            progress_every: config.progress_every,
        }
    }
}

/// Counts from one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConvertSummary {
    /// Root children read, including ones that produce no record.
    pub elements: u64,
    pub records: u64,
    pub nodes: u64,
    pub ways: u64,
    pub skipped: u64,
}

/// Convert an OSM document from `input` into JSON documents on `out`.
pub fn convert<R: BufRead, W: Write>(
    input: OsmReader<R>,
    out: &mut W,
    vocab: &StreetVocabulary,
    options: ConvertOptions,
    progress: &dyn ProgressReporter,
) -> Result<ConvertSummary> {
    let mut summary = ConvertSummary::default();

    for element in input {
        let element = element?;
        summary.elements += 1;

        let record = match shape_element(&element, vocab) {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(e) => match options.on_malformed {
                MalformedPolicy::Abort => {
                    return Err(e).with_context(|| {
                        format!("Failed to convert element #{}", summary.elements)
                    });
                }
                MalformedPolicy::Skip => {
                    warn!(element = summary.elements, error = %e, "skipping malformed element");
                    summary.skipped += 1;
                    continue;
                }
            },
        };

        if options.pretty {
            serde_json::to_writer_pretty(&mut *out, &record)?;
        } else {
            serde_json::to_writer(&mut *out, &record)?;
        }
        out.write_all(b"\n")?;

        summary.records += 1;
        match record.kind {
            ElementKind::Node => summary.nodes += 1,
            ElementKind::Way => summary.ways += 1,
        }

        if options.progress_every > 0 && summary.elements % options.progress_every == 0 {
            progress.report(ProgressEvent::Converting {
                elements: summary.elements,
                records: summary.records,
            });
        }
    }

    out.flush()?;
    Ok(summary)
}

/// `<input>.json`, next to the input file.
pub fn default_output_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}

/// Run the convert command: read `input`, write `output` (or the default
/// path), print a summary to stdout.
pub fn run_convert(
    config: &Config,
    input: &Path,
    output: Option<PathBuf>,
    pretty: bool,
    skip_malformed: bool,
    progress: ProgressMode,
) -> Result<(PathBuf, ConvertSummary)> {
    let output = output.unwrap_or_else(|| default_output_path(input));
    let mut options = ConvertOptions::from(&config.convert);
    options.pretty |= pretty;
    if skip_malformed {
        options.on_malformed = MalformedPolicy::Skip;
    }

    let reader = open_osm(input)?;
    let file = File::create(&output)
        .with_context(|| format!("Failed to create output file: {}", output.display()))?;
    let mut writer = BufWriter::new(file);

    info!(input = %input.display(), output = %output.display(), "converting");
    let reporter = progress.reporter();
    let summary = convert(
        reader,
        &mut writer,
        &config.streets.vocabulary(),
        options,
        reporter.as_ref(),
    )?;

    println!(
        "Converted {} elements: {} records ({} nodes, {} ways), {} skipped -> {}",
        summary.elements,
        summary.records,
        summary.nodes,
        summary.ways,
        summary.skipped,
        output.display()
    );
    Ok((output, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use serde_json::Value;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
  <bounds minlat="-34.0" minlon="151.0" maxlat="-33.0" maxlon="152.0"/>
  <node id="10" lat="-33.87" lon="151.21" version="1" changeset="5" timestamp="2015-03-01T00:00:00Z" user="kim" uid="42">
    <tag k="amenity" v="cafe"/>
    <tag k="addr:street" v="Pitt St"/>
    <tag k="addr:postcode" v="2000"/>
  </node>
  <way id="20" version="3" changeset="6" timestamp="2015-03-02T00:00:00Z" user="lee" uid="43">
    <nd ref="10"/>
    <nd ref="11"/>
    <tag k="highway" v="primary"/>
  </way>
  <relation id="30" version="1" changeset="7" timestamp="2015-03-03T00:00:00Z" user="kim" uid="42"/>
</osm>"#;

    const BAD_NODE: &str = r#"<osm>
  <node id="1" version="1" changeset="1" timestamp="t" user="a" uid="1"/>
  <node id="2" lat="north" lon="151.0" version="1" changeset="1" timestamp="t" user="a" uid="1"/>
  <node id="3" version="1" changeset="1" timestamp="t" user="a" uid="1"/>
</osm>"#;

    fn options(pretty: bool, on_malformed: MalformedPolicy) -> ConvertOptions {
        ConvertOptions {
            pretty,
            on_malformed,
            progress_every: 0,
        }
    }

    fn run(xml: &str, opts: ConvertOptions) -> Result<(String, ConvertSummary)> {
        let mut out = Vec::new();
        let summary = convert(
            OsmReader::new(xml.as_bytes()),
            &mut out,
            &StreetVocabulary::default(),
            opts,
            &NoProgress,
        )?;
        Ok((String::from_utf8(out).unwrap(), summary))
    }

    #[test]
    fn test_compact_one_line_per_record() {
        let (out, summary) = run(SAMPLE, options(false, MalformedPolicy::Abort)).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            summary,
            ConvertSummary {
                elements: 4,
                records: 2,
                nodes: 1,
                ways: 1,
                skipped: 0
            }
        );

        let node: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(node["id"], "10");
        assert_eq!(node["type"], "node");
        assert_eq!(node["address"]["street"], "Pitt Street");
        assert_eq!(node["address"]["postcode"], "2000");
        assert_eq!(node["amenity"], "cafe");

        let way: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(way["node_refs"], serde_json::json!(["10", "11"]));
        assert!(way.get("pos").is_none());
    }

    #[test]
    fn test_field_order() {
        let (out, _) = run(SAMPLE, options(false, MalformedPolicy::Abort)).unwrap();
        let first = out.lines().next().unwrap();
        let id = first.find("\"id\"").unwrap();
        let kind = first.find("\"type\"").unwrap();
        let created = first.find("\"created\"").unwrap();
        let pos = first.find("\"pos\"").unwrap();
        let address = first.find("\"address\"").unwrap();
        let amenity = first.find("\"amenity\"").unwrap();
        assert!(id < kind && kind < created && created < pos && pos < address && address < amenity);
    }

    #[test]
    fn test_pretty_output_parses_as_stream() {
        let (out, summary) = run(SAMPLE, options(true, MalformedPolicy::Abort)).unwrap();
        assert!(out.lines().count() > summary.records as usize);
        assert!(out.contains("\n  \"id\": \"10\""));
        let docs: Vec<Value> = serde_json::Deserializer::from_str(&out)
            .into_iter::<Value>()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn test_abort_on_malformed() {
        let err = run(BAD_NODE, options(false, MalformedPolicy::Abort)).unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("element #2"), "{}", msg);
        assert!(msg.contains("north"), "{}", msg);
    }

    #[test]
    fn test_skip_malformed() {
        let (out, summary) = run(BAD_NODE, options(false, MalformedPolicy::Skip)).unwrap();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.skipped, 1);
        let ids: Vec<String> = out
            .lines()
            .map(|l| serde_json::from_str::<Value>(l).unwrap()["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_xml_error_aborts_even_when_skipping() {
        let xml = "<osm><node id=\"1\"></way></osm>";
        assert!(run(xml, options(false, MalformedPolicy::Skip)).is_err());
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("data/sydney.osm")),
            PathBuf::from("data/sydney.osm.json")
        );
    }
}
