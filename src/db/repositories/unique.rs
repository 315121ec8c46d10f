//! Uniqueness lookup
//!
//! Backs the `unique:<table>,<column>` validation rule. Table and column
//! names come from rule strings, so they are checked against a strict
//! identifier pattern before being spliced into SQL; the value is always
//! bound.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Answers whether a value is already taken in a table column
#[async_trait]
pub trait UniqueLookup: Send + Sync {
    /// True if some row of `table` has `column = value`
    async fn exists(&self, table: &str, column: &str, value: &str) -> Result<bool>;
}

/// SQLx-based uniqueness lookup
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUniqueLookup {
    pool: DynDatabasePool,
}

impl SqlxUniqueLookup {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UniqueLookup> {
        Arc::new(Self::new(pool))
    }
}

/// `[A-Za-z0-9_]+`
pub fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[async_trait]
impl UniqueLookup for SqlxUniqueLookup {
    async fn exists(&self, table: &str, column: &str, value: &str) -> Result<bool> {
        if !is_safe_identifier(table) || !is_safe_identifier(column) {
            bail!("Invalid identifier in unique rule: {}.{}", table, column);
        }

        let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?", table, column);
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(&sql)
                .bind(value)
                .fetch_one(self.pool.sqlite()?)
                .await
                .with_context(|| format!("Failed to check uniqueness of {}.{}", table, column))?,
            DatabaseDriver::Mysql => sqlx::query_scalar(&sql)
                .bind(value)
                .fetch_one(self.pool.mysql()?)
                .await
                .with_context(|| format!("Failed to check uniqueness of {}.{}", table, column))?,
        };

        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_lookup() -> (DynDatabasePool, SqlxUniqueLookup) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let lookup = SqlxUniqueLookup::new(pool.clone());
        (pool, lookup)
    }

    #[test]
    fn test_is_safe_identifier() {
        assert!(is_safe_identifier("posts"));
        assert!(is_safe_identifier("post_tag"));
        assert!(!is_safe_identifier(""));
        assert!(!is_safe_identifier("posts; DROP TABLE users"));
        assert!(!is_safe_identifier("posts.slug"));
    }

    #[tokio::test]
    async fn test_exists() {
        let (pool, lookup) = setup_lookup().await;
        sqlx::query("INSERT INTO users (name, email) VALUES ('Ada', 'ada@example.com')")
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap();

        assert!(lookup.exists("users", "email", "ada@example.com").await.unwrap());
        assert!(!lookup.exists("users", "email", "bob@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_rejects_unsafe_identifiers() {
        let (_pool, lookup) = setup_lookup().await;
        assert!(lookup.exists("posts--", "slug", "x").await.is_err());
        assert!(lookup.exists("posts", "slug or 1=1", "x").await.is_err());
    }
}
