//! Street-name suffix auditing and normalization.
//!
//! Both operations share one [`StreetVocabulary`]: the set of suffixes that
//! are already canonical, and a mapping from known abbreviations and typos
//! to their canonical form. The defaults reproduce the tables the Sydney
//! extract was cleaned with; configuration may replace them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Trailing token of a street name, optionally ending in a period.
static SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b\S+\.?$").unwrap());

pub const DEFAULT_EXPECTED: &[&str] = &[
    "Street", "Avenue", "Boulevard", "Drive", "Road", "Court", "Place", "Circuit", "Lane",
    "Parade", "Crescent", "Highway", "Way", "Close",
];

pub const DEFAULT_MAPPING: &[(&str, &str)] = &[
    ("St", "Street"),
    ("St.", "Street"),
    ("st", "Street"),
    ("street", "Street"),
    ("Ave", "Avenue"),
    ("Av.", "Avenue"),
    ("Rd", "Road"),
    ("Rd.", "Road"),
    ("road", "Road"),
    ("Hwy", "Highway"),
    ("place", "Place"),
];

/// Canonical suffixes plus the abbreviation mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreetVocabulary {
    expected: BTreeSet<String>,
    mapping: BTreeMap<String, String>,
}

impl Default for StreetVocabulary {
    fn default() -> Self {
        Self {
            expected: DEFAULT_EXPECTED.iter().map(|s| s.to_string()).collect(),
            mapping: DEFAULT_MAPPING
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl StreetVocabulary {
    pub fn new(
        expected: impl IntoIterator<Item = String>,
        mapping: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            expected: expected.into_iter().collect(),
            mapping: mapping.into_iter().collect(),
        }
    }

    pub fn is_expected(&self, suffix: &str) -> bool {
        self.expected.contains(suffix)
    }

    pub fn canonical_for(&self, token: &str) -> Option<&str> {
        self.mapping.get(token).map(String::as_str)
    }

    pub fn expected(&self) -> impl Iterator<Item = &str> {
        self.expected.iter().map(String::as_str)
    }

    pub fn mapping(&self) -> impl Iterator<Item = (&str, &str)> {
        self.mapping.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Replace the trailing token with its canonical form if the mapping
    /// knows it; otherwise return the name unchanged.
    ///
    /// The replacement is spliced in at the trailing token's own byte
    /// range, so an earlier occurrence of the same text (`"Forest st"`)
    /// is left alone. Trailing whitespace is preserved.
    pub fn normalize(&self, name: &str) -> String {
        let trimmed = name.trim_end();
        let start = trimmed
            .rfind(char::is_whitespace)
            .map(|i| i + trimmed[i..].chars().next().map_or(1, char::len_utf8))
            .unwrap_or(0);
        let token = &trimmed[start..];
        if token.is_empty() {
            return name.to_string();
        }
        match self.canonical_for(token) {
            Some(canonical) => {
                let mut fixed = String::with_capacity(name.len() + canonical.len());
                fixed.push_str(&name[..start]);
                fixed.push_str(canonical);
                fixed.push_str(&name[trimmed.len()..]);
                fixed
            }
            None => name.to_string(),
        }
    }

    /// Record `name` under its suffix if that suffix is not canonical.
    pub fn audit(&self, index: &mut StreetSuffixIndex, name: &str) {
        if let Some(suffix) = street_suffix(name) {
            if !self.is_expected(suffix) {
                index.insert(suffix, name);
            }
        }
    }

    /// Show what [`normalize`](Self::normalize) would do to every name in
    /// the index.
    pub fn preview(&self, index: &StreetSuffixIndex) -> Vec<NamePreview> {
        index
            .iter()
            .flat_map(|(_, names)| names.iter())
            .map(|name| {
                let fixed = self.normalize(name);
                NamePreview {
                    original: name.clone(),
                    fixed: (fixed != *name).then_some(fixed),
                }
            })
            .collect()
    }
}

/// The trailing suffix of a street name, or `None` when the name ends in
/// whitespace or has no word-boundary token at its end.
pub fn street_suffix(name: &str) -> Option<&str> {
    SUFFIX_RE.find(name).map(|m| m.as_str())
}

/// Non-canonical suffix -> full street names seen with it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StreetSuffixIndex {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl StreetSuffixIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, suffix: &str, name: &str) {
        self.entries
            .entry(suffix.to_string())
            .or_default()
            .insert(name.to_string());
    }

    pub fn get(&self, suffix: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(suffix)
    }

    pub fn contains_suffix(&self, suffix: &str) -> bool {
        self.entries.contains_key(suffix)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One line of the normalization preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamePreview {
    pub original: String,
    /// `None` when no mapping applied.
    pub fixed: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_known_abbreviation() {
        let vocab = StreetVocabulary::default();
        assert_eq!(vocab.normalize("12 Main St"), "12 Main Street");
        assert_eq!(vocab.normalize("Pacific Hwy"), "Pacific Highway");
        assert_eq!(vocab.normalize("Parramatta Rd."), "Parramatta Road");
    }

    #[test]
    fn test_normalize_canonical_is_identity() {
        let vocab = StreetVocabulary::default();
        assert_eq!(vocab.normalize("12 Main Street"), "12 Main Street");
        let once = vocab.normalize("George St");
        assert_eq!(vocab.normalize(&once), once);
    }

    #[test]
    fn test_normalize_unmapped_is_identity() {
        let vocab = StreetVocabulary::default();
        assert_eq!(vocab.normalize("The Corso"), "The Corso");
        assert_eq!(vocab.normalize("Broadway"), "Broadway");
    }

    #[test]
    fn test_normalize_anchors_to_trailing_token() {
        let vocab = StreetVocabulary::default();
        assert_eq!(vocab.normalize("Forest st"), "Forest Street");
        assert_eq!(vocab.normalize("Rd Rd"), "Rd Road");
    }

    #[test]
    fn test_normalize_keeps_trailing_whitespace() {
        let vocab = StreetVocabulary::default();
        assert_eq!(vocab.normalize("Main St  "), "Main Street  ");
    }

    #[test]
    fn test_normalize_empty_and_blank() {
        let vocab = StreetVocabulary::default();
        assert_eq!(vocab.normalize(""), "");
        assert_eq!(vocab.normalize("   "), "   ");
    }

    #[test]
    fn test_normalize_single_token() {
        let vocab = StreetVocabulary::default();
        assert_eq!(vocab.normalize("St"), "Street");
    }

    #[test]
    fn test_normalize_unicode_whitespace() {
        let vocab = StreetVocabulary::default();
        assert_eq!(vocab.normalize("Crown\u{a0}St"), "Crown\u{a0}Street");
    }

    #[test]
    fn test_street_suffix() {
        assert_eq!(street_suffix("Main Rd"), Some("Rd"));
        assert_eq!(street_suffix("Main St."), Some("St."));
        assert_eq!(street_suffix("Broadway"), Some("Broadway"));
        assert_eq!(street_suffix("Main St "), None);
        assert_eq!(street_suffix(""), None);
    }

    #[test]
    fn test_audit_records_non_canonical_only() {
        let vocab = StreetVocabulary::default();
        let mut index = StreetSuffixIndex::new();
        vocab.audit(&mut index, "Main Rd");
        vocab.audit(&mut index, "Old Rd");
        vocab.audit(&mut index, "George Street");
        vocab.audit(&mut index, "Main Rd");

        assert_eq!(index.len(), 1);
        let names = index.get("Rd").unwrap();
        assert_eq!(names.len(), 2);
        assert!(names.contains("Main Rd"));
        assert!(!index.contains_suffix("Street"));
    }

    #[test]
    fn test_custom_vocabulary() {
        let vocab = StreetVocabulary::new(
            vec!["Rd".to_string()],
            vec![("Str".to_string(), "Strasse".to_string())],
        );
        let mut index = StreetSuffixIndex::new();
        vocab.audit(&mut index, "Main Rd");
        assert!(index.is_empty());
        assert_eq!(vocab.normalize("Haupt Str"), "Haupt Strasse");
        assert_eq!(vocab.normalize("Main St"), "Main St");
    }

    #[test]
    fn test_preview() {
        let vocab = StreetVocabulary::default();
        let mut index = StreetSuffixIndex::new();
        vocab.audit(&mut index, "King St");
        vocab.audit(&mut index, "The Corso");

        let preview = vocab.preview(&index);
        assert_eq!(preview.len(), 2);
        let king = preview.iter().find(|p| p.original == "King St").unwrap();
        assert_eq!(king.fixed.as_deref(), Some("King Street"));
        let corso = preview.iter().find(|p| p.original == "The Corso").unwrap();
        assert_eq!(corso.fixed, None);
    }
}
