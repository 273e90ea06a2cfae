//! SQLite-backed [`DocumentStore`] implementation.
//!
//! Documents are stored as JSON text in a single `documents` table. Filters
//! are translated to `json_extract`/`json_type` predicates where SQLite can
//! evaluate them exactly; regex filters are narrowed in SQL and finished in
//! Rust with [`Filter::matches`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqliteArguments;
use sqlx::query::Query;
use sqlx::{Row, Sqlite, SqlitePool};

use osm_ingest_core::error::StoreUnavailable;
use osm_ingest_core::query::Filter;
use osm_ingest_core::store::{replace_field_if, DocId, DocumentStore, StoredDocument};

use crate::config::Config;
use crate::{db, migrate};

/// SQLite implementation of the [`DocumentStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database, creating the schema if needed.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn unavailable(e: sqlx::Error) -> anyhow::Error {
    StoreUnavailable(e.to_string()).into()
}

/// A bound parameter of a translated filter.
#[derive(Debug, Clone, PartialEq)]
enum Bind {
    Text(String),
    Real(f64),
}

/// SQL predicate for a filter. `exact` is false when the predicate only
/// narrows the candidates and [`Filter::matches`] must finish the job.
#[derive(Debug, Clone, PartialEq)]
struct Predicate {
    sql: String,
    binds: Vec<Bind>,
    exact: bool,
}

/// SQLite JSON path for a dotted field path, as a quoted SQL literal.
///
/// Plain identifiers are emitted as `$.a.b` so the expression matches the
/// indexes created by the schema; other segments are double-quoted.
fn json_path_literal(path: &str) -> String {
    let mut out = String::from("'$");
    for segment in path.split('.') {
        out.push('.');
        if !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            out.push_str(segment);
        } else {
            out.push('"');
            out.push_str(&segment.replace('\'', "''"));
            out.push('"');
        }
    }
    out.push('\'');
    out
}

fn translate(filter: &Filter) -> Predicate {
    match filter {
        Filter::All => Predicate {
            sql: "1 = 1".to_string(),
            binds: Vec::new(),
            exact: true,
        },
        Filter::Eq(path, Value::String(s)) => {
            let p = json_path_literal(path);
            Predicate {
                sql: format!("(json_type(body, {p}) = 'text' AND json_extract(body, {p}) = ?)"),
                binds: vec![Bind::Text(s.clone())],
                exact: true,
            }
        }
        Filter::Eq(path, Value::Number(n)) if n.as_f64().is_some() => {
            let p = json_path_literal(path);
            Predicate {
                sql: format!(
                    "(json_type(body, {p}) IN ('integer', 'real') AND json_extract(body, {p}) = ?)"
                ),
                binds: vec![Bind::Real(n.as_f64().unwrap_or_default())],
                exact: true,
            }
        }
        Filter::Eq(path, _) | Filter::Regex(path, _) => Predicate {
            sql: format!("json_type(body, {}) IS NOT NULL", json_path_literal(path)),
            binds: Vec::new(),
            exact: false,
        },
        Filter::Exists(path) => Predicate {
            sql: format!("json_type(body, {}) IS NOT NULL", json_path_literal(path)),
            binds: Vec::new(),
            exact: true,
        },
        Filter::And(filters) if filters.is_empty() => translate(&Filter::All),
        Filter::And(filters) => {
            let parts: Vec<Predicate> = filters.iter().map(translate).collect();
            Predicate {
                sql: parts
                    .iter()
                    .map(|p| p.sql.as_str())
                    .collect::<Vec<_>>()
                    .join(" AND "),
                exact: parts.iter().all(|p| p.exact),
                binds: parts.into_iter().flat_map(|p| p.binds).collect(),
            }
        }
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    binds: &[Bind],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for bind in binds {
        query = match bind {
            Bind::Text(s) => query.bind(s.clone()),
            Bind::Real(f) => query.bind(*f),
        };
    }
    query
}

fn parse_body(id: DocId, body: &str) -> Result<Value> {
    serde_json::from_str(body).with_context(|| format!("document {} has an unreadable body", id))
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert_one(&self, doc: &Value) -> Result<DocId> {
        let body = serde_json::to_string(doc)?;
        let result = sqlx::query("INSERT INTO documents (body) VALUES (?)")
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.last_insert_rowid())
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<StoredDocument>> {
        let predicate = translate(filter);
        let sql = format!(
            "SELECT id, body FROM documents WHERE {} ORDER BY id",
            predicate.sql
        );
        let rows = bind_all(sqlx::query(&sql), &predicate.binds)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: DocId = row.get("id");
            let body: String = row.get("body");
            let body = parse_body(id, &body)?;
            if predicate.exact || filter.matches(&body) {
                docs.push(StoredDocument { id, body });
            }
        }
        Ok(docs)
    }

    async fn get(&self, id: DocId) -> Result<Option<StoredDocument>> {
        let body: Option<String> = sqlx::query_scalar("SELECT body FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        match body {
            Some(body) => Ok(Some(StoredDocument {
                id,
                body: parse_body(id, &body)?,
            })),
            None => Ok(None),
        }
    }

    async fn replace_one(&self, id: DocId, doc: &Value) -> Result<bool> {
        let body = serde_json::to_string(doc)?;
        let result = sqlx::query("UPDATE documents SET body = ? WHERE id = ?")
            .bind(body)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM documents")
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected())
    }

    async fn count(&self, filter: &Filter) -> Result<u64> {
        let predicate = translate(filter);
        if !predicate.exact {
            return Ok(self.find(filter).await?.len() as u64);
        }
        let sql = format!("SELECT COUNT(*) AS n FROM documents WHERE {}", predicate.sql);
        let row = bind_all(sqlx::query(&sql), &predicate.binds)
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?;
        let n: i64 = row.get("n");
        Ok(n as u64)
    }

    /// String-to-string updates run as a single conditional `UPDATE`, so a
    /// concurrent writer cannot be overwritten. Anything else falls back to
    /// read-modify-replace.
    async fn update_field_if(
        &self,
        id: DocId,
        path: &str,
        expected: &Value,
        new: Value,
    ) -> Result<bool> {
        let texts = match (expected.as_str(), new.as_str()) {
            (Some(e), Some(n)) => Some((e.to_string(), n.to_string())),
            _ => None,
        };
        let Some((expected_text, new_text)) = texts else {
            return replace_field_if(self, id, path, expected, new).await;
        };
        let p = json_path_literal(path);
        let sql = format!(
            "UPDATE documents SET body = json_set(body, {p}, ?) \
             WHERE id = ? AND json_type(body, {p}) = 'text' AND json_extract(body, {p}) = ?"
        );
        let result = sqlx::query(&sql)
            .bind(new_text)
            .bind(id)
            .bind(expected_text)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected() > 0)
    }
}
