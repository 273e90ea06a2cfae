//! In-memory aggregation pipeline.
//!
//! A small subset of document-store aggregation: match, group with a sum,
//! project a ratio, sort, and limit. Grouped rows have the shape
//! `{"_id": <key>, "count": <sum>}`.

use std::collections::HashMap;

use serde_json::{json, Map, Number, Value};

use crate::query::{compare_values, lookup, Filter};

/// What a group stage groups by.
#[derive(Debug, Clone)]
pub enum GroupKey {
    /// The value at a field path; documents without it group under `null`.
    Field(String),
    /// Everything into a single group with this `_id`.
    Constant(String),
}

/// What a group stage adds up into `count`.
#[derive(Debug, Clone)]
pub enum Accumulator {
    /// One per document.
    Count,
    /// The numeric value at a field path (non-numbers count as zero).
    Sum(String),
}

#[derive(Debug, Clone)]
pub enum Stage {
    Match(Filter),
    Group { key: GroupKey, sum: Accumulator },
    /// `{"_id": _id, output: field / divisor}`.
    ProjectRatio {
        field: String,
        divisor: f64,
        output: String,
    },
    Sort { field: String, descending: bool },
    Limit(usize),
}

/// An ordered list of stages.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.stages.push(Stage::Match(filter));
        self
    }

    pub fn group_by(mut self, path: impl Into<String>) -> Self {
        self.stages.push(Stage::Group {
            key: GroupKey::Field(path.into()),
            sum: Accumulator::Count,
        });
        self
    }

    pub fn group(mut self, key: GroupKey, sum: Accumulator) -> Self {
        self.stages.push(Stage::Group { key, sum });
        self
    }

    pub fn project_ratio(
        mut self,
        field: impl Into<String>,
        divisor: f64,
        output: impl Into<String>,
    ) -> Self {
        self.stages.push(Stage::ProjectRatio {
            field: field.into(),
            divisor,
            output: output.into(),
        });
        self
    }

    pub fn sort_asc(mut self, field: impl Into<String>) -> Self {
        self.stages.push(Stage::Sort {
            field: field.into(),
            descending: false,
        });
        self
    }

    pub fn sort_desc(mut self, field: impl Into<String>) -> Self {
        self.stages.push(Stage::Sort {
            field: field.into(),
            descending: true,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.stages.push(Stage::Limit(n));
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// The leading match filter, if any, and the stages after it.
    ///
    /// Stores use this to push the first filter down into their own query.
    pub fn split_leading_match(&self) -> (Option<&Filter>, &[Stage]) {
        match self.stages.first() {
            Some(Stage::Match(filter)) => (Some(filter), &self.stages[1..]),
            _ => (None, &self.stages[..]),
        }
    }

    /// Run every stage over `docs`.
    pub fn run(&self, docs: Vec<Value>) -> Vec<Value> {
        run_stages(&self.stages, docs)
    }
}

/// Run a slice of stages over `docs`.
pub fn run_stages(stages: &[Stage], mut docs: Vec<Value>) -> Vec<Value> {
    for stage in stages {
        docs = match stage {
            Stage::Match(filter) => docs.into_iter().filter(|d| filter.matches(d)).collect(),
            Stage::Group { key, sum } => group(docs, key, sum),
            Stage::ProjectRatio {
                field,
                divisor,
                output,
            } => docs
                .into_iter()
                .map(|d| project_ratio(&d, field, *divisor, output))
                .collect(),
            Stage::Sort { field, descending } => {
                docs.sort_by(|a, b| {
                    let l = lookup(a, field).unwrap_or(&Value::Null);
                    let r = lookup(b, field).unwrap_or(&Value::Null);
                    let ord = compare_values(l, r);
                    if *descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                });
                docs
            }
            Stage::Limit(n) => {
                docs.truncate(*n);
                docs
            }
        };
    }
    docs
}

struct GroupAcc {
    key: Value,
    int_total: i64,
    float_total: f64,
    all_int: bool,
}

fn group(docs: Vec<Value>, key: &GroupKey, sum: &Accumulator) -> Vec<Value> {
    let mut order: Vec<GroupAcc> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();

    for doc in &docs {
        let key_value = match key {
            GroupKey::Field(path) => lookup(doc, path).cloned().unwrap_or(Value::Null),
            GroupKey::Constant(label) => Value::String(label.clone()),
        };
        let slot_key = key_value.to_string();
        let idx = *slots.entry(slot_key).or_insert_with(|| {
            order.push(GroupAcc {
                key: key_value.clone(),
                int_total: 0,
                float_total: 0.0,
                all_int: true,
            });
            order.len() - 1
        });
        let acc = &mut order[idx];
        match sum {
            Accumulator::Count => {
                acc.int_total += 1;
                acc.float_total += 1.0;
            }
            Accumulator::Sum(path) => match lookup(doc, path).and_then(Value::as_number) {
                Some(n) => {
                    if let Some(i) = n.as_i64() {
                        acc.int_total += i;
                    } else {
                        acc.all_int = false;
                    }
                    acc.float_total += n.as_f64().unwrap_or(0.0);
                }
                None => {}
            },
        }
    }

    order
        .into_iter()
        .map(|acc| {
            let count = if acc.all_int {
                Value::from(acc.int_total)
            } else {
                Number::from_f64(acc.float_total)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            };
            json!({"_id": acc.key, "count": count})
        })
        .collect()
}

fn project_ratio(doc: &Value, field: &str, divisor: f64, output: &str) -> Value {
    let ratio = lookup(doc, field)
        .and_then(Value::as_f64)
        .filter(|_| divisor != 0.0)
        .and_then(|n| Number::from_f64(n / divisor))
        .map(Value::Number)
        .unwrap_or(Value::Null);
    let mut out = Map::new();
    out.insert(
        "_id".to_string(),
        doc.get("_id").cloned().unwrap_or(Value::Null),
    );
    out.insert(output.to_string(), ratio);
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<Value> {
        vec![
            json!({"type": "node", "amenity": "pub", "created": {"user": "ann"}}),
            json!({"type": "node", "amenity": "cafe", "created": {"user": "bob"}}),
            json!({"type": "way", "amenity": "pub", "created": {"user": "ann"}}),
            json!({"type": "node", "created": {"user": "ann"}}),
        ]
    }

    #[test]
    fn test_group_sort_limit() {
        let rows = Pipeline::new()
            .group_by("created.user")
            .sort_desc("count")
            .limit(1)
            .run(docs());
        assert_eq!(rows, vec![json!({"_id": "ann", "count": 3})]);
    }

    #[test]
    fn test_match_then_group() {
        let rows = Pipeline::new()
            .filter(Filter::exists("amenity"))
            .group_by("amenity")
            .sort_asc("count")
            .run(docs());
        assert_eq!(
            rows,
            vec![
                json!({"_id": "cafe", "count": 1}),
                json!({"_id": "pub", "count": 2}),
            ]
        );
    }

    #[test]
    fn test_missing_field_groups_under_null() {
        let rows = Pipeline::new().group_by("amenity").sort_asc("_id").run(docs());
        assert_eq!(rows[0], json!({"_id": null, "count": 1}));
    }

    #[test]
    fn test_group_of_groups() {
        let rows = Pipeline::new()
            .filter(Filter::exists("amenity"))
            .group_by("amenity")
            .group(
                GroupKey::Constant("total amenity".to_string()),
                Accumulator::Sum("count".to_string()),
            )
            .run(docs());
        assert_eq!(rows, vec![json!({"_id": "total amenity", "count": 3})]);
    }

    #[test]
    fn test_project_ratio() {
        let rows = Pipeline::new()
            .group_by("created.user")
            .project_ratio("count", 4.0, "percent")
            .sort_desc("percent")
            .run(docs());
        assert_eq!(rows[0], json!({"_id": "ann", "percent": 0.75}));
        assert_eq!(rows[1], json!({"_id": "bob", "percent": 0.25}));
    }

    #[test]
    fn test_match_on_group_output() {
        let rows = Pipeline::new()
            .filter(Filter::exists("amenity"))
            .group_by("amenity")
            .filter(Filter::eq("count", 1))
            .run(docs());
        assert_eq!(rows, vec![json!({"_id": "cafe", "count": 1})]);
    }

    #[test]
    fn test_split_leading_match() {
        let p = Pipeline::new().filter(Filter::All).limit(3);
        let (filter, rest) = p.split_leading_match();
        assert!(filter.is_some());
        assert_eq!(rest.len(), 1);

        let p = Pipeline::new().limit(3);
        let (filter, rest) = p.split_leading_match();
        assert!(filter.is_none());
        assert_eq!(rest.len(), 1);
    }
}
