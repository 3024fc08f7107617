//! Embedded schema migrations
//!
//! Migrations are compiled into the binary and applied in name order. Each
//! applied version is recorded in `schema_migrations`, so running twice is a
//! no-op.

use anyhow::{Context, Result};
use deadpool_postgres::Pool;

/// A single forward migration
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: &'static str,
    pub sql: &'static str,
}

/// All known migrations, sorted by version
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: "0001_init",
    sql: include_str!("../../migrations/0001_init.up.sql"),
}];

const CREATE_LEDGER: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

/// Apply every pending migration, returning how many were applied
pub async fn run(pool: &Pool) -> Result<usize> {
    let mut client = pool
        .get()
        .await
        .context("Failed to get connection for migrations")?;

    client
        .batch_execute(CREATE_LEDGER)
        .await
        .context("Failed to create schema_migrations table")?;

    let mut pending: Vec<&Migration> = MIGRATIONS.iter().collect();
    pending.sort_by_key(|m| m.version);

    let mut applied = 0;
    for migration in pending {
        let tx = client
            .transaction()
            .await
            .context("Failed to begin migration transaction")?;

        let done = tx
            .query_opt(
                "SELECT 1 FROM schema_migrations WHERE version = $1",
                &[&migration.version],
            )
            .await?
            .is_some();

        if done {
            tx.rollback().await?;
            tracing::debug!(version = migration.version, "Migration already applied");
            continue;
        }

        tx.batch_execute(migration.sql)
            .await
            .with_context(|| format!("Failed to apply migration {}", migration.version))?;
        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES ($1)",
            &[&migration.version],
        )
        .await?;
        tx.commit()
            .await
            .with_context(|| format!("Failed to commit migration {}", migration.version))?;

        tracing::info!(version = migration.version, "Applied migration");
        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_sorted_and_unique() {
        let versions: Vec<_> = MIGRATIONS.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(versions, sorted);
    }

    #[test]
    fn test_init_creates_core_tables() {
        let sql = MIGRATIONS[0].sql;
        for table in ["teams", "users", "pull_requests", "pull_request_reviewers"] {
            assert!(
                sql.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")),
                "missing table {table}"
            );
        }
    }
}
