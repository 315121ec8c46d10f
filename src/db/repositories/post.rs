//! Post repository
//!
//! Database operations for posts and their tag associations.
//!
//! This module provides:
//! - `PostRepository` trait defining the interface for post data access
//! - `SqlxPostRepository` implementing the trait for SQLite and MySQL
//!
//! Tag links live in `post_tag`. Syncing them runs inside a single
//! transaction so readers never observe a half-applied tag set.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, Post, PostRecord, TagSyncChanges};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a new post
    async fn create(&self, record: &PostRecord) -> Result<Post>;

    /// Get post by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// List posts, newest first
    async fn list(&self, params: &ListParams) -> Result<Vec<Post>>;

    /// Count all posts
    async fn count(&self) -> Result<i64>;

    /// Overwrite a post's columns. Returns `None` if the post does not exist.
    async fn update(&self, id: i64, record: &PostRecord) -> Result<Option<Post>>;

    /// Delete a post. Returns whether a row was removed.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Reconcile the post's tag links with `tag_ids`.
    ///
    /// With `detaching` set, links not in `tag_ids` are removed. Ids that do
    /// not name an existing tag are skipped.
    async fn sync_tags(&self, post_id: i64, tag_ids: &[i64], detaching: bool)
        -> Result<TagSyncChanges>;

    /// Remove every tag link of the post. Returns the number of links removed.
    async fn detach_all_tags(&self, post_id: i64) -> Result<u64>;

    /// Tag ids linked to the post, ascending
    async fn tag_ids(&self, post_id: i64) -> Result<Vec<i64>>;
}

/// SQLx-based post repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    /// Create a new SQLx post repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, record: &PostRecord) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(self.pool.sqlite()?, record).await,
            DatabaseDriver::Mysql => create_post_mysql(self.pool.mysql()?, record).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_post_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_post_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list(&self, params: &ListParams) -> Result<Vec<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_posts_sqlite(self.pool.sqlite()?, params).await,
            DatabaseDriver::Mysql => list_posts_mysql(self.pool.mysql()?, params).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar("SELECT COUNT(*) FROM posts")
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count posts")?,
            DatabaseDriver::Mysql => sqlx::query_scalar("SELECT COUNT(*) FROM posts")
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count posts")?,
        };
        Ok(count)
    }

    async fn update(&self, id: i64, record: &PostRecord) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_post_sqlite(self.pool.sqlite()?, id, record).await,
            DatabaseDriver::Mysql => update_post_mysql(self.pool.mysql()?, id, record).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn sync_tags(
        &self,
        post_id: i64,
        tag_ids: &[i64],
        detaching: bool,
    ) -> Result<TagSyncChanges> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sync_tags_sqlite(self.pool.sqlite()?, post_id, tag_ids, detaching).await
            }
            DatabaseDriver::Mysql => {
                sync_tags_mysql(self.pool.mysql()?, post_id, tag_ids, detaching).await
            }
        }
    }

    async fn detach_all_tags(&self, post_id: i64) -> Result<u64> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM post_tag WHERE post_id = ?")
                .bind(post_id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to detach tags")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM post_tag WHERE post_id = ?")
                .bind(post_id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to detach tags")?
                .rows_affected(),
        };
        Ok(affected)
    }

    async fn tag_ids(&self, post_id: i64) -> Result<Vec<i64>> {
        let sql = "SELECT tag_id FROM post_tag WHERE post_id = ? ORDER BY tag_id";
        let ids: Vec<i64> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql)
                .bind(post_id)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to get post tag ids")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql)
                .bind(post_id)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to get post tag ids")?,
        };
        Ok(ids)
    }
}

/// Work out which links to drop and which to add.
///
/// Both lists are ascending and free of duplicates.
fn plan_tag_sync(current: &[i64], wanted: &[i64], detaching: bool) -> (Vec<i64>, Vec<i64>) {
    let current: BTreeSet<i64> = current.iter().copied().collect();
    let wanted: BTreeSet<i64> = wanted.iter().copied().collect();

    let to_detach = if detaching {
        current.difference(&wanted).copied().collect()
    } else {
        Vec::new()
    };
    let to_attach = wanted.difference(&current).copied().collect();

    (to_detach, to_attach)
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, record: &PostRecord) -> Result<Post> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, slug, category_id, body, image, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.title)
    .bind(&record.slug)
    .bind(record.category_id)
    .bind(&record.body)
    .bind(&record.image)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        title: record.title.clone(),
        slug: record.slug.clone(),
        category_id: record.category_id,
        body: record.body.clone(),
        image: record.image.clone(),
        created_at: now,
        updated_at: now,
    })
}

async fn get_post_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, slug, category_id, body, image, created_at, updated_at
        FROM posts
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get post by ID")?;

    row.as_ref().map(row_to_post_sqlite).transpose()
}

async fn list_posts_sqlite(pool: &SqlitePool, params: &ListParams) -> Result<Vec<Post>> {
    let rows = sqlx::query(
        r#"
        SELECT id, title, slug, category_id, body, image, created_at, updated_at
        FROM posts
        ORDER BY id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list posts")?;

    rows.iter().map(row_to_post_sqlite).collect()
}

async fn update_post_sqlite(pool: &SqlitePool, id: i64, record: &PostRecord) -> Result<Option<Post>> {
    let result = sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, slug = ?, category_id = ?, body = ?, image = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&record.title)
    .bind(&record.slug)
    .bind(record.category_id)
    .bind(&record.body)
    .bind(&record.image)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_post_by_id_sqlite(pool, id).await
}

async fn sync_tags_sqlite(
    pool: &SqlitePool,
    post_id: i64,
    tag_ids: &[i64],
    detaching: bool,
) -> Result<TagSyncChanges> {
    let mut tx = pool.begin().await.context("Failed to begin tag sync")?;

    let current: Vec<i64> = sqlx::query_scalar("SELECT tag_id FROM post_tag WHERE post_id = ?")
        .bind(post_id)
        .fetch_all(&mut *tx)
        .await
        .context("Failed to read current tags")?;

    let (to_detach, to_attach) = plan_tag_sync(&current, tag_ids, detaching);
    let mut changes = TagSyncChanges::default();

    for tag_id in to_detach {
        sqlx::query("DELETE FROM post_tag WHERE post_id = ? AND tag_id = ?")
            .bind(post_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .context("Failed to detach tag")?;
        changes.detached.push(tag_id);
    }

    for tag_id in to_attach {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO post_tag (post_id, tag_id)
            SELECT ?, id FROM tags WHERE id = ?
            "#,
        )
        .bind(post_id)
        .bind(tag_id)
        .execute(&mut *tx)
        .await
        .context("Failed to attach tag")?;
        if result.rows_affected() > 0 {
            changes.attached.push(tag_id);
        }
    }

    tx.commit().await.context("Failed to commit tag sync")?;
    Ok(changes)
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        category_id: row.try_get("category_id")?,
        body: row.try_get("body")?,
        image: row.try_get("image")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, record: &PostRecord) -> Result<Post> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, slug, category_id, body, image, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.title)
    .bind(&record.slug)
    .bind(record.category_id)
    .bind(&record.body)
    .bind(&record.image)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_id() as i64,
        title: record.title.clone(),
        slug: record.slug.clone(),
        category_id: record.category_id,
        body: record.body.clone(),
        image: record.image.clone(),
        created_at: now,
        updated_at: now,
    })
}

async fn get_post_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, slug, category_id, body, image, created_at, updated_at
        FROM posts
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get post by ID")?;

    row.as_ref().map(row_to_post_mysql).transpose()
}

async fn list_posts_mysql(pool: &MySqlPool, params: &ListParams) -> Result<Vec<Post>> {
    let rows = sqlx::query(
        r#"
        SELECT id, title, slug, category_id, body, image, created_at, updated_at
        FROM posts
        ORDER BY id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list posts")?;

    rows.iter().map(row_to_post_mysql).collect()
}

async fn update_post_mysql(pool: &MySqlPool, id: i64, record: &PostRecord) -> Result<Option<Post>> {
    // MySQL reports zero affected rows when nothing changed, so existence
    // is checked separately.
    if get_post_by_id_mysql(pool, id).await?.is_none() {
        return Ok(None);
    }

    sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, slug = ?, category_id = ?, body = ?, image = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&record.title)
    .bind(&record.slug)
    .bind(record.category_id)
    .bind(&record.body)
    .bind(&record.image)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    get_post_by_id_mysql(pool, id).await
}

async fn sync_tags_mysql(
    pool: &MySqlPool,
    post_id: i64,
    tag_ids: &[i64],
    detaching: bool,
) -> Result<TagSyncChanges> {
    let mut tx = pool.begin().await.context("Failed to begin tag sync")?;

    let current: Vec<i64> =
        sqlx::query_scalar("SELECT tag_id FROM post_tag WHERE post_id = ? FOR UPDATE")
            .bind(post_id)
            .fetch_all(&mut *tx)
            .await
            .context("Failed to read current tags")?;

    let (to_detach, to_attach) = plan_tag_sync(&current, tag_ids, detaching);
    let mut changes = TagSyncChanges::default();

    for tag_id in to_detach {
        sqlx::query("DELETE FROM post_tag WHERE post_id = ? AND tag_id = ?")
            .bind(post_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await
            .context("Failed to detach tag")?;
        changes.detached.push(tag_id);
    }

    for tag_id in to_attach {
        let result = sqlx::query(
            r#"
            INSERT IGNORE INTO post_tag (post_id, tag_id)
            SELECT ?, id FROM tags WHERE id = ?
            "#,
        )
        .bind(post_id)
        .bind(tag_id)
        .execute(&mut *tx)
        .await
        .context("Failed to attach tag")?;
        if result.rows_affected() > 0 {
            changes.attached.push(tag_id);
        }
    }

    tx.commit().await.context("Failed to commit tag sync")?;
    Ok(changes)
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        category_id: row.try_get("category_id")?,
        body: row.try_get("body")?,
        image: row.try_get("image")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
