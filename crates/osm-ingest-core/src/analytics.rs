//! Read-only reporting over a loaded collection.
//!
//! Every figure in [`AnalyticsReport`] is computed through the
//! [`DocumentStore`] trait (counts, distinct values and aggregation
//! pipelines), so the report is identical for every backend.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::pipeline::{Accumulator, GroupKey, Pipeline};
use crate::query::Filter;
use crate::store::DocumentStore;

/// Knobs for the report.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsOptions {
    /// Rows in the contributor and postcode tables.
    pub top_n: usize,
    /// Rows in the amenity table and in each focus-amenity postcode table.
    pub top_amenities: usize,
    /// Amenities whose postcode distribution is reported.
    pub focus_amenities: Vec<String>,
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self {
            top_n: 5,
            top_amenities: 10,
            focus_amenities: vec!["school".to_string(), "pub".to_string()],
        }
    }
}

/// A grouped key and its document count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyCount {
    pub key: Value,
    pub count: u64,
}

/// A grouped key and its share of all documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyShare {
    pub key: Value,
    pub percent: f64,
}

/// Postcode distribution for one amenity value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FocusPostcodes {
    pub amenity: String,
    pub postcodes: Vec<KeyCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub total_nodes: u64,
    pub total_ways: u64,
    pub total_documents: u64,
    pub top_contributors: Vec<KeyCount>,
    pub top_contributor_shares: Vec<KeyShare>,
    /// Postcodes sorted high to low, for spotting out-of-range values.
    pub highest_postcodes: Vec<KeyCount>,
    pub distinct_amenities: usize,
    pub distinct_contributors: usize,
    /// Amenity values used by exactly one document.
    pub single_use_amenities: Vec<KeyCount>,
    pub total_amenities: u64,
    pub top_amenities: Vec<KeyCount>,
    pub focus_postcodes: Vec<FocusPostcodes>,
}

pub async fn run_analytics<S: DocumentStore + ?Sized>(
    store: &S,
    opts: &AnalyticsOptions,
) -> Result<AnalyticsReport> {
    let total_nodes = store.count(&Filter::eq("type", "node")).await?;
    let total_ways = store.count(&Filter::eq("type", "way")).await?;
    let total_documents = store.count(&Filter::All).await?;

    let top_contributors = key_counts(
        store
            .aggregate(
                &Pipeline::new()
                    .group_by("created.user")
                    .sort_desc("count")
                    .limit(opts.top_n),
            )
            .await?,
    );

    let top_contributor_shares = store
        .aggregate(
            &Pipeline::new()
                .group_by("created.user")
                .project_ratio("count", total_documents as f64, "percent")
                .sort_desc("percent")
                .limit(opts.top_n),
        )
        .await?
        .into_iter()
        .map(|row| KeyShare {
            key: row.get("_id").cloned().unwrap_or(Value::Null),
            percent: row.get("percent").and_then(Value::as_f64).unwrap_or(0.0),
        })
        .collect();

    let highest_postcodes = key_counts(
        store
            .aggregate(
                &Pipeline::new()
                    .filter(Filter::exists("address.postcode"))
                    .group_by("address.postcode")
                    .sort_desc("_id")
                    .limit(opts.top_n),
            )
            .await?,
    );

    let distinct_amenities = store.distinct("amenity").await?.len();
    let distinct_contributors = store.distinct("created.user").await?.len();

    let single_use_amenities = key_counts(
        store
            .aggregate(
                &Pipeline::new()
                    .filter(Filter::exists("amenity"))
                    .group_by("amenity")
                    .sort_asc("count")
                    .filter(Filter::eq("count", 1)),
            )
            .await?,
    );

    let total_amenities = key_counts(
        store
            .aggregate(
                &Pipeline::new()
                    .filter(Filter::exists("amenity"))
                    .group_by("amenity")
                    .group(
                        GroupKey::Constant("total amenity".to_string()),
                        Accumulator::Sum("count".to_string()),
                    ),
            )
            .await?,
    )
    .first()
    .map(|row| row.count)
    .unwrap_or(0);

    let top_amenities = key_counts(
        store
            .aggregate(
                &Pipeline::new()
                    .filter(Filter::exists("amenity"))
                    .group_by("amenity")
                    .sort_desc("count")
                    .limit(opts.top_amenities),
            )
            .await?,
    );

    let mut focus_postcodes = Vec::with_capacity(opts.focus_amenities.len());
    for amenity in &opts.focus_amenities {
        let postcodes = key_counts(
            store
                .aggregate(
                    &Pipeline::new()
                        .filter(Filter::eq("amenity", amenity.as_str()))
                        .group_by("address.postcode")
                        .sort_desc("count")
                        .limit(opts.top_amenities),
                )
                .await?,
        );
        focus_postcodes.push(FocusPostcodes {
            amenity: amenity.clone(),
            postcodes,
        });
    }

    Ok(AnalyticsReport {
        total_nodes,
        total_ways,
        total_documents,
        top_contributors,
        top_contributor_shares,
        highest_postcodes,
        distinct_amenities,
        distinct_contributors,
        single_use_amenities,
        total_amenities,
        top_amenities,
        focus_postcodes,
    })
}

fn key_counts(rows: Vec<Value>) -> Vec<KeyCount> {
    rows.into_iter()
        .map(|row| KeyCount {
            key: row.get("_id").cloned().unwrap_or(Value::Null),
            count: row.get("count").and_then(Value::as_u64).unwrap_or(0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use serde_json::json;

    async fn fixture() -> InMemoryStore {
        let store = InMemoryStore::new();
        let docs = [
            json!({"id": "1", "type": "node", "amenity": "pub", "created": {"user": "ann"},
                   "address": {"postcode": "2000"}}),
            json!({"id": "2", "type": "node", "amenity": "pub", "created": {"user": "ann"},
                   "address": {"postcode": "2010"}}),
            json!({"id": "3", "type": "node", "amenity": "school", "created": {"user": "bob"},
                   "address": {"postcode": "2770"}}),
            json!({"id": "4", "type": "way", "amenity": "pub", "created": {"user": "ann"},
                   "address": {"postcode": "2000"}}),
            json!({"id": "5", "type": "way", "created": {"user": "cat"}}),
        ];
        for doc in &docs {
            store.insert_one(doc).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_report_counts() {
        let store = fixture().await;
        let report = run_analytics(&store, &AnalyticsOptions::default())
            .await
            .unwrap();

        assert_eq!(report.total_nodes, 3);
        assert_eq!(report.total_ways, 2);
        assert_eq!(report.total_documents, 5);
        assert_eq!(report.distinct_amenities, 2);
        assert_eq!(report.distinct_contributors, 3);
        assert_eq!(report.total_amenities, 4);
    }

    #[tokio::test]
    async fn test_report_rankings() {
        let store = fixture().await;
        let report = run_analytics(&store, &AnalyticsOptions::default())
            .await
            .unwrap();

        assert_eq!(report.top_contributors[0].key, json!("ann"));
        assert_eq!(report.top_contributors[0].count, 3);
        assert_eq!(report.top_contributor_shares[0].percent, 0.6);

        let postcodes: Vec<_> = report.highest_postcodes.iter().map(|r| r.key.clone()).collect();
        assert_eq!(postcodes, vec![json!("2770"), json!("2010"), json!("2000")]);

        assert_eq!(
            report.single_use_amenities,
            vec![KeyCount {
                key: json!("school"),
                count: 1
            }]
        );
        assert_eq!(report.top_amenities[0].key, json!("pub"));
        assert_eq!(report.top_amenities[0].count, 3);
    }

    #[tokio::test]
    async fn test_focus_postcodes() {
        let store = fixture().await;
        let report = run_analytics(&store, &AnalyticsOptions::default())
            .await
            .unwrap();

        let pubs = report
            .focus_postcodes
            .iter()
            .find(|f| f.amenity == "pub")
            .unwrap();
        assert_eq!(pubs.postcodes[0].key, json!("2000"));
        assert_eq!(pubs.postcodes[0].count, 2);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = InMemoryStore::new();
        let report = run_analytics(&store, &AnalyticsOptions::default())
            .await
            .unwrap();
        assert_eq!(report.total_documents, 0);
        assert_eq!(report.total_amenities, 0);
        assert!(report.top_contributors.is_empty());
    }
}
