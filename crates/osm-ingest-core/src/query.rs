//! Document filters and field-path helpers.
//!
//! Field paths use dots to descend into objects (`address.postcode`,
//! `created.user`). A [`Filter`] is evaluated against a JSON document in
//! memory; backends may translate part of it into their own query
//! language but must agree with [`Filter::matches`].

use std::cmp::Ordering;

use regex::Regex;
use serde_json::Value;

/// A predicate over stored documents.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Every document.
    All,
    /// Field equals the value.
    Eq(String, Value),
    /// Field is present (any value, including null).
    Exists(String),
    /// Field is a string matched by the pattern (unanchored).
    Regex(String, Regex),
    /// Every sub-filter matches.
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(path.into(), value.into())
    }

    pub fn exists(path: impl Into<String>) -> Self {
        Filter::Exists(path.into())
    }

    /// Build a regex filter; fails on an invalid pattern.
    pub fn regex(path: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Filter::Regex(path.into(), Regex::new(pattern)?))
    }

    /// Filter that matches strings containing `needle` literally.
    pub fn contains(path: impl Into<String>, needle: &str) -> Self {
        let pattern = regex::escape(needle);
        // An escaped literal is always a valid pattern.
        Filter::Regex(path.into(), Regex::new(&pattern).unwrap())
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(path, expected) => lookup(doc, path)
                .map(|actual| values_equal(actual, expected))
                .unwrap_or(false),
            Filter::Exists(path) => lookup(doc, path).is_some(),
            Filter::Regex(path, re) => lookup(doc, path)
                .and_then(Value::as_str)
                .map(|s| re.is_match(s))
                .unwrap_or(false),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }
}

/// Resolve a dotted field path inside a document.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        _ => None,
    })
}

/// Set a dotted field path, creating intermediate objects as needed.
///
/// Returns `false` when a non-object value sits in the way.
pub fn set_path(doc: &mut Value, path: &str, value: Value) -> bool {
    let mut segments = path.split('.').peekable();
    let mut current = doc;
    while let Some(segment) = segments.next() {
        let map = match current {
            Value::Object(map) => map,
            _ => return false,
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return true;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
    }
    false
}

/// Equality that treats `1` and `1.0` as the same number.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

// null < numbers < strings < objects < arrays < booleans
fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order over JSON values, used by sort stages.
///
/// Values of different types order by type rank; numbers compare
/// numerically, strings lexically, arrays element-wise.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
