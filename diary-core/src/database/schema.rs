//! Schema migrations
//!
//! Connection settings (WAL journal, foreign keys, busy timeout) come from the
//! pool's connect options. This module only brings the schema up to date,
//! recording each applied version in the `migrations` table.

use crate::error::Result;
use sqlx::sqlite::SqlitePool;

/// Versioned migration scripts, oldest first
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("migrations/001_initial_schema.sql"))];

/// Apply every migration newer than the recorded schema version
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM migrations")
        .fetch_one(pool)
        .await?;

    let pending: Vec<(i64, &str)> = MIGRATIONS
        .iter()
        .copied()
        .filter(|(version, _)| *version > current)
        .collect();

    if pending.is_empty() {
        tracing::debug!("Database schema up to date at version {}", current);
        return Ok(());
    }

    tracing::info!("Migrating database from version {} ({} pending)", current, pending.len());
    for (version, script) in pending {
        apply_migration(pool, version, script).await?;
    }

    Ok(())
}

/// Run one script and record its version in the same transaction
async fn apply_migration(pool: &SqlitePool, version: i64, script: &str) -> Result<()> {
    let mut tx = pool.begin().await?;

    // Trigger bodies contain semicolons, so the script runs as a whole
    sqlx::raw_sql(script).execute(&mut *tx).await?;

    sqlx::query("INSERT INTO migrations (version) VALUES (?)")
        .bind(version)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!("Applied migration version {}", version);
    Ok(())
}
