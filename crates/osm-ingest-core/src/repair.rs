//! In-place data-quality fixes for a loaded collection.
//!
//! Each rule finds matching documents, computes the corrected value, and
//! writes it back one document at a time with
//! [`DocumentStore::update_field_if`], so a document that changed since it
//! was read is left alone and counted as skipped.
//!
//! A dry run writes nothing but keeps each planned body in memory, so later
//! rules see the values earlier rules would have written.

use std::collections::BTreeMap;

use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::query::{lookup, set_path, Filter};
use crate::store::{DocId, DocumentStore, StoredDocument};

const POSTCODE_PATH: &str = "address.postcode";
const AMENITY_PATH: &str = "amenity";

/// A misspelled amenity pattern and the literal that replaces the whole value.
#[derive(Debug, Clone)]
pub struct AmenityTypo {
    pub pattern: Regex,
    pub replacement: String,
}

#[derive(Debug, Clone)]
pub struct RepairOptions {
    /// Substring marking a postcode carrying a regional prefix.
    pub region_prefix: String,
    /// How many trailing characters of such a postcode to keep.
    pub postcode_len: usize,
    pub amenity_typos: Vec<AmenityTypo>,
    /// Character in amenity values to turn into a space.
    pub amenity_separator: char,
}

impl RepairOptions {
    /// Build options from `(pattern, replacement)` pairs; fails on an
    /// invalid pattern.
    pub fn new(
        region_prefix: impl Into<String>,
        postcode_len: usize,
        typos: impl IntoIterator<Item = (String, String)>,
        amenity_separator: char,
    ) -> Result<Self, regex::Error> {
        let amenity_typos = typos
            .into_iter()
            .map(|(pattern, replacement)| {
                Ok(AmenityTypo {
                    pattern: Regex::new(&pattern)?,
                    replacement,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self {
            region_prefix: region_prefix.into(),
            postcode_len,
            amenity_typos,
            amenity_separator,
        })
    }
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            region_prefix: "NSW ".to_string(),
            postcode_len: 4,
            amenity_typos: vec![AmenityTypo {
                pattern: Regex::new("scol").unwrap(),
                replacement: "school".to_string(),
            }],
            amenity_separator: '+',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairRule {
    RegionalPostcode,
    AmenityTypo,
    AmenitySeparator,
}

/// One rewritten (or, in a dry run, rewritable) field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepairChange {
    pub rule: RepairRule,
    pub doc: DocId,
    /// The OSM `id` field of the document, when present.
    pub osm_id: Option<String>,
    pub field: &'static str,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepairReport {
    pub dry_run: bool,
    pub changes: Vec<RepairChange>,
    /// Documents whose field changed between read and write.
    pub skipped: u64,
}

impl RepairReport {
    pub fn count(&self, rule: RepairRule) -> usize {
        self.changes.iter().filter(|c| c.rule == rule).count()
    }
}

/// Keep the trailing `len` characters of a postcode containing `prefix`.
pub fn strip_region_prefix(postcode: &str, prefix: &str, len: usize) -> Option<String> {
    if prefix.is_empty() || !postcode.contains(prefix) {
        return None;
    }
    let chars = postcode.chars().count();
    let fixed: String = postcode.chars().skip(chars.saturating_sub(len)).collect();
    (fixed != postcode).then_some(fixed)
}

pub fn fix_amenity_typo(amenity: &str, typos: &[AmenityTypo]) -> Option<String> {
    typos
        .iter()
        .find(|t| t.pattern.is_match(amenity))
        .map(|t| t.replacement.clone())
        .filter(|fixed| fixed != amenity)
}

pub fn fix_amenity_separator(amenity: &str, separator: char) -> Option<String> {
    amenity
        .contains(separator)
        .then(|| amenity.replace(separator, " "))
}

/// Run every repair rule in order: postcodes, amenity typos, amenity
/// separators.
pub async fn run_repairs<S: DocumentStore + ?Sized>(
    store: &S,
    opts: &RepairOptions,
    dry_run: bool,
) -> Result<RepairReport> {
    let mut report = RepairReport {
        dry_run,
        ..Default::default()
    };
    let mut planned = Planned::new();

    if !opts.region_prefix.is_empty() {
        let filter = Filter::contains(POSTCODE_PATH, &opts.region_prefix);
        apply_rule(
            store,
            &mut report,
            &mut planned,
            RepairRule::RegionalPostcode,
            POSTCODE_PATH,
            &filter,
            |value| strip_region_prefix(value, &opts.region_prefix, opts.postcode_len),
        )
        .await?;
    }

    for typo in &opts.amenity_typos {
        let filter = Filter::Regex(AMENITY_PATH.to_string(), typo.pattern.clone());
        apply_rule(
            store,
            &mut report,
            &mut planned,
            RepairRule::AmenityTypo,
            AMENITY_PATH,
            &filter,
            |value| fix_amenity_typo(value, std::slice::from_ref(typo)),
        )
        .await?;
    }

    let filter = Filter::contains(AMENITY_PATH, &opts.amenity_separator.to_string());
    apply_rule(
        store,
        &mut report,
        &mut planned,
        RepairRule::AmenitySeparator,
        AMENITY_PATH,
        &filter,
        |value| fix_amenity_separator(value, opts.amenity_separator),
    )
    .await?;

    Ok(report)
}

/// Bodies a dry run would have written, by document.
type Planned = BTreeMap<DocId, Value>;

/// Documents matching `filter`, with planned bodies standing in for stored
/// ones. Store ids grow with insertion, so id order is insertion order.
async fn candidates<S: DocumentStore + ?Sized>(
    store: &S,
    filter: &Filter,
    planned: &Planned,
) -> Result<Vec<StoredDocument>> {
    let mut docs: BTreeMap<DocId, Value> = store
        .find(filter)
        .await?
        .into_iter()
        .map(|doc| (doc.id, doc.body))
        .collect();
    for (id, body) in planned {
        docs.insert(*id, body.clone());
    }
    Ok(docs
        .into_iter()
        .filter(|(_, body)| filter.matches(body))
        .map(|(id, body)| StoredDocument { id, body })
        .collect())
}

async fn apply_rule<S, F>(
    store: &S,
    report: &mut RepairReport,
    planned: &mut Planned,
    rule: RepairRule,
    path: &'static str,
    filter: &Filter,
    fix: F,
) -> Result<()>
where
    S: DocumentStore + ?Sized,
    F: Fn(&str) -> Option<String>,
{
    for mut doc in candidates(store, filter, planned).await? {
        let Some(before) = lookup(&doc.body, path).and_then(Value::as_str) else {
            continue;
        };
        let Some(after) = fix(before) else {
            continue;
        };
        let change = RepairChange {
            rule,
            doc: doc.id,
            osm_id: doc.body.get("id").and_then(Value::as_str).map(str::to_string),
            field: path,
            before: before.to_string(),
            after,
        };

        if report.dry_run {
            set_path(&mut doc.body, path, Value::String(change.after.clone()));
            planned.insert(doc.id, doc.body);
        } else {
            let written = store
                .update_field_if(
                    doc.id,
                    path,
                    &Value::String(change.before.clone()),
                    Value::String(change.after.clone()),
                )
                .await?;
            if !written {
                warn!(doc = doc.id, field = path, "document changed during repair, skipped");
                report.skipped += 1;
                continue;
            }
        }
        debug!(doc = doc.id, field = path, "{:?}: {} => {}", rule, change.before, change.after);
        report.changes.push(change);
    }
    Ok(())
}
