use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use osm_ingest_core::analytics::AnalyticsOptions;
use osm_ingest_core::repair::RepairOptions;
use osm_ingest_core::street::{StreetVocabulary, DEFAULT_EXPECTED, DEFAULT_MAPPING};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub convert: ConvertConfig,
    #[serde(default)]
    pub streets: StreetsConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub repair: RepairConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// What the converter does with an element that fails to shape.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    #[default]
    Abort,
    Skip,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConvertConfig {
    #[serde(default)]
    pub pretty: bool,
    #[serde(default)]
    pub on_malformed: MalformedPolicy,
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            pretty: false,
            on_malformed: MalformedPolicy::Abort,
            progress_every: default_progress_every(),
        }
    }
}

fn default_progress_every() -> u64 {
    100_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreetsConfig {
    #[serde(default = "default_expected")]
    pub expected: Vec<String>,
    #[serde(default = "default_mapping")]
    pub mapping: BTreeMap<String, String>,
}

impl Default for StreetsConfig {
    fn default() -> Self {
        Self {
            expected: default_expected(),
            mapping: default_mapping(),
        }
    }
}

fn default_expected() -> Vec<String> {
    DEFAULT_EXPECTED.iter().map(|s| s.to_string()).collect()
}

fn default_mapping() -> BTreeMap<String, String> {
    DEFAULT_MAPPING
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl StreetsConfig {
    pub fn vocabulary(&self) -> StreetVocabulary {
        StreetVocabulary::new(self.expected.clone(), self.mapping.clone())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_top_amenities")]
    pub top_amenities: usize,
    #[serde(default = "default_focus_amenities")]
    pub focus_amenities: Vec<String>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            top_amenities: default_top_amenities(),
            focus_amenities: default_focus_amenities(),
        }
    }
}

fn default_top_n() -> usize {
    5
}
fn default_top_amenities() -> usize {
    10
}
fn default_focus_amenities() -> Vec<String> {
    vec!["school".to_string(), "pub".to_string()]
}

impl AnalyticsConfig {
    pub fn options(&self) -> AnalyticsOptions {
        AnalyticsOptions {
            top_n: self.top_n,
            top_amenities: self.top_amenities,
            focus_amenities: self.focus_amenities.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepairConfig {
    #[serde(default = "default_region_prefix")]
    pub region_prefix: String,
    #[serde(default = "default_postcode_len")]
    pub postcode_len: usize,
    #[serde(default = "default_amenity_typos")]
    pub amenity_typos: BTreeMap<String, String>,
    #[serde(default = "default_amenity_separator")]
    pub amenity_separator: char,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            region_prefix: default_region_prefix(),
            postcode_len: default_postcode_len(),
            amenity_typos: default_amenity_typos(),
            amenity_separator: default_amenity_separator(),
        }
    }
}

fn default_region_prefix() -> String {
    "NSW ".to_string()
}
fn default_postcode_len() -> usize {
    4
}
fn default_amenity_typos() -> BTreeMap<String, String> {
    BTreeMap::from([("scol".to_string(), "school".to_string())])
}
fn default_amenity_separator() -> char {
    '+'
}

impl RepairConfig {
    pub fn options(&self) -> Result<RepairOptions> {
        RepairOptions::new(
            self.region_prefix.clone(),
            self.postcode_len,
            self.amenity_typos.clone(),
            self.amenity_separator,
        )
        .with_context(|| "Invalid pattern in repair.amenity_typos")
    }
}

impl Config {
    /// Defaults for commands that run without a config file.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/osm.sqlite"),
            },
            convert: ConvertConfig::default(),
            streets: StreetsConfig::default(),
            analytics: AnalyticsConfig::default(),
            repair: RepairConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate streets
    if let Some(key) = config.streets.mapping.keys().find(|k| k.trim().is_empty()) {
        anyhow::bail!("streets.mapping contains an empty key: {:?}", key);
    }
    if let Some(key) = config
        .streets
        .mapping
        .keys()
        .find(|k| k.contains(char::is_whitespace))
    {
        anyhow::bail!(
            "streets.mapping key '{}' contains whitespace; keys match a single trailing token",
            key
        );
    }

    // Validate analytics
    if config.analytics.top_n == 0 || config.analytics.top_amenities == 0 {
        anyhow::bail!("analytics.top_n and analytics.top_amenities must be >= 1");
    }

    // Validate repair
    if config.repair.postcode_len == 0 {
        anyhow::bail!("repair.postcode_len must be >= 1");
    }
    config.repair.options()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let file = write_config("[db]\npath = \"/tmp/osm.sqlite\"\n");
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.convert.on_malformed, MalformedPolicy::Abort);
        assert!(!cfg.convert.pretty);
        assert_eq!(cfg.analytics.top_n, 5);
        assert_eq!(cfg.repair.region_prefix, "NSW ");
        assert_eq!(cfg.streets.vocabulary(), StreetVocabulary::default());
    }

    #[test]
    fn test_overrides() {
        let file = write_config(
            r#"
[db]
path = "/tmp/osm.sqlite"

[convert]
pretty = true
on_malformed = "skip"

[streets]
expected = ["Street"]

[streets.mapping]
Strt = "Street"

[analytics]
focus_amenities = ["cafe"]

[repair]
region_prefix = "VIC "
"#,
        );
        let cfg = load_config(file.path()).unwrap();
        assert!(cfg.convert.pretty);
        assert_eq!(cfg.convert.on_malformed, MalformedPolicy::Skip);
        let vocab = cfg.streets.vocabulary();
        assert_eq!(vocab.normalize("Main Strt"), "Main Street");
        assert_eq!(vocab.normalize("Main St"), "Main St");
        assert_eq!(cfg.analytics.options().focus_amenities, vec!["cafe"]);
        assert_eq!(cfg.repair.options().unwrap().region_prefix, "VIC ");
    }

    #[test]
    fn test_rejects_bad_typo_pattern() {
        let file = write_config(
            "[db]\npath = \"/tmp/osm.sqlite\"\n[repair.amenity_typos]\n\"(\" = \"x\"\n",
        );
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_rejects_multi_token_mapping_key() {
        let file = write_config(
            "[db]\npath = \"/tmp/osm.sqlite\"\n[streets.mapping]\n\"Main St\" = \"Main Street\"\n",
        );
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(load_config(Path::new("/nonexistent/osmi.toml")).is_err());
    }
}
