use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the document collection. Safe to run repeatedly.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // One row per loaded document; the body is the JSON text as loaded.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            body TEXT NOT NULL CHECK (json_valid(body))
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Lookups by OSM id (`osmi get`) and by element type (report counts)
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_osm_id ON documents(json_extract(body, '$.id'))",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_type ON documents(json_extract(body, '$.type'))",
    )
    .execute(pool)
    .await?;

    Ok(())
}
