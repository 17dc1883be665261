//! Blog repository
//!
//! Database operations for blog posts. Reads join the author's public
//! profile so handlers never issue a second query per row.

use super::{decode_list, encode_list, owner_summary_mysql, owner_summary_sqlite, OWNER_COLUMNS};
use crate::db::{Backend, DynDatabasePool};
use crate::models::{Blog, BlogWithAuthor, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const BLOG_COLUMNS: &str = "b.id, b.title, b.content, b.excerpt, b.tags, b.read_time, \
     b.author_id, b.created_at, b.updated_at";

/// Blog repository trait
#[async_trait]
pub trait BlogRepository: Send + Sync {
    /// Create a new blog
    async fn create(&self, blog: &Blog) -> Result<Blog>;

    /// Get blog by ID
    async fn get_by_id(&self, id: &str) -> Result<Option<Blog>>;

    /// Get blog by ID together with its author
    async fn get_with_author(&self, id: &str) -> Result<Option<BlogWithAuthor>>;

    /// List blogs newest first, optionally restricted to one author
    async fn list(&self, params: &ListParams, author_id: Option<&str>)
        -> Result<Vec<BlogWithAuthor>>;

    /// Count blogs, optionally restricted to one author
    async fn count(&self, author_id: Option<&str>) -> Result<i64>;

    /// Persist the editable fields of a blog
    async fn update(&self, blog: &Blog) -> Result<Blog>;

    /// Delete a blog, returning whether it existed
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// SQLx-based blog repository implementation
pub struct SqlxBlogRepository {
    pool: DynDatabasePool,
}

impl SqlxBlogRepository {
    /// Create a new SQLx blog repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BlogRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl BlogRepository for SqlxBlogRepository {
    async fn create(&self, blog: &Blog) -> Result<Blog> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_blog_sqlite(pool, blog).await,
            Backend::Mysql(pool) => create_blog_mysql(pool, blog).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Blog>> {
        let found = self.get_with_author(id).await?;
        Ok(found.map(|b| b.blog))
    }

    async fn get_with_author(&self, id: &str) -> Result<Option<BlogWithAuthor>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_blog_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_blog_mysql(pool, id).await,
        }
    }

    async fn list(
        &self,
        params: &ListParams,
        author_id: Option<&str>,
    ) -> Result<Vec<BlogWithAuthor>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_blogs_sqlite(pool, params, author_id).await,
            Backend::Mysql(pool) => list_blogs_mysql(pool, params, author_id).await,
        }
    }

    async fn count(&self, author_id: Option<&str>) -> Result<i64> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => count_blogs_sqlite(pool, author_id).await,
            Backend::Mysql(pool) => count_blogs_mysql(pool, author_id).await,
        }
    }

    async fn update(&self, blog: &Blog) -> Result<Blog> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => update_blog_sqlite(pool, blog).await,
            Backend::Mysql(pool) => update_blog_mysql(pool, blog).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query("DELETE FROM blogs WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete blog")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query("DELETE FROM blogs WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete blog")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

fn select_sql(filter: &str, paged: bool) -> String {
    let mut sql = format!(
        "SELECT {}, {} FROM blogs b INNER JOIN users u ON u.id = b.author_id",
        BLOG_COLUMNS, OWNER_COLUMNS
    );
    if !filter.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    if paged {
        sql.push_str(" ORDER BY b.created_at DESC LIMIT ? OFFSET ?");
    }
    sql
}

fn count_sql(author_id: Option<&str>) -> &'static str {
    match author_id {
        Some(_) => "SELECT COUNT(*) FROM blogs WHERE author_id = ?",
        None => "SELECT COUNT(*) FROM blogs",
    }
}

const UPDATE_SQL: &str = r#"
    UPDATE blogs
    SET title = ?, content = ?, excerpt = ?, tags = ?, read_time = ?, updated_at = ?
    WHERE id = ?
"#;

const INSERT_SQL: &str = r#"
    INSERT INTO blogs (id, title, content, excerpt, tags, read_time, author_id, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_blog_sqlite(pool: &SqlitePool, blog: &Blog) -> Result<Blog> {
    sqlx::query(INSERT_SQL)
        .bind(&blog.id)
        .bind(&blog.title)
        .bind(&blog.content)
        .bind(&blog.excerpt)
        .bind(encode_list(&blog.tags)?)
        .bind(blog.read_time)
        .bind(&blog.author_id)
        .bind(blog.created_at)
        .bind(blog.updated_at)
        .execute(pool)
        .await
        .context("Failed to create blog")?;

    Ok(blog.clone())
}

async fn get_blog_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<BlogWithAuthor>> {
    let row = sqlx::query(&select_sql("b.id = ?", false))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get blog by ID")?;

    row.as_ref().map(row_to_blog_sqlite).transpose()
}

async fn list_blogs_sqlite(
    pool: &SqlitePool,
    params: &ListParams,
    author_id: Option<&str>,
) -> Result<Vec<BlogWithAuthor>> {
    let rows = match author_id {
        Some(author_id) => {
            sqlx::query(&select_sql("b.author_id = ?", true))
                .bind(author_id)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
        }
        None => {
            sqlx::query(&select_sql("", true))
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
        }
    }
    .context("Failed to list blogs")?;

    rows.iter().map(row_to_blog_sqlite).collect()
}

async fn count_blogs_sqlite(pool: &SqlitePool, author_id: Option<&str>) -> Result<i64> {
    let mut query = sqlx::query_scalar::<_, i64>(count_sql(author_id));
    if let Some(author_id) = author_id {
        query = query.bind(author_id);
    }
    query.fetch_one(pool).await.context("Failed to count blogs")
}

async fn update_blog_sqlite(pool: &SqlitePool, blog: &Blog) -> Result<Blog> {
    sqlx::query(UPDATE_SQL)
        .bind(&blog.title)
        .bind(&blog.content)
        .bind(&blog.excerpt)
        .bind(encode_list(&blog.tags)?)
        .bind(blog.read_time)
        .bind(blog.updated_at)
        .bind(&blog.id)
        .execute(pool)
        .await
        .context("Failed to update blog")?;

    Ok(blog.clone())
}

fn row_to_blog_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<BlogWithAuthor> {
    let tags: String = row.get("tags");
    Ok(BlogWithAuthor {
        blog: Blog {
            id: row.get("id"),
            title: row.get("title"),
            content: row.get("content"),
            excerpt: row.get("excerpt"),
            tags: decode_list(&tags)?,
            read_time: row.get("read_time"),
            author_id: row.get("author_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        },
        author: owner_summary_sqlite(row)?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_blog_mysql(pool: &MySqlPool, blog: &Blog) -> Result<Blog> {
    sqlx::query(INSERT_SQL)
        .bind(&blog.id)
        .bind(&blog.title)
        .bind(&blog.content)
        .bind(&blog.excerpt)
        .bind(encode_list(&blog.tags)?)
        .bind(blog.read_time)
        .bind(&blog.author_id)
        .bind(blog.created_at)
        .bind(blog.updated_at)
        .execute(pool)
        .await
        .context("Failed to create blog")?;

    Ok(blog.clone())
}

async fn get_blog_mysql(pool: &MySqlPool, id: &str) -> Result<Option<BlogWithAuthor>> {
    let row = sqlx::query(&select_sql("b.id = ?", false))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get blog by ID")?;

    row.as_ref().map(row_to_blog_mysql).transpose()
}

async fn list_blogs_mysql(
    pool: &MySqlPool,
    params: &ListParams,
    author_id: Option<&str>,
) -> Result<Vec<BlogWithAuthor>> {
    let rows = match author_id {
        Some(author_id) => {
            sqlx::query(&select_sql("b.author_id = ?", true))
                .bind(author_id)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
        }
        None => {
            sqlx::query(&select_sql("", true))
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
        }
    }
    .context("Failed to list blogs")?;

    rows.iter().map(row_to_blog_mysql).collect()
}

async fn count_blogs_mysql(pool: &MySqlPool, author_id: Option<&str>) -> Result<i64> {
    let mut query = sqlx::query_scalar::<_, i64>(count_sql(author_id));
    if let Some(author_id) = author_id {
        query = query.bind(author_id);
    }
    query.fetch_one(pool).await.context("Failed to count blogs")
}

async fn update_blog_mysql(pool: &MySqlPool, blog: &Blog) -> Result<Blog> {
    sqlx::query(UPDATE_SQL)
        .bind(&blog.title)
        .bind(&blog.content)
        .bind(&blog.excerpt)
        .bind(encode_list(&blog.tags)?)
        .bind(blog.read_time)
        .bind(blog.updated_at)
        .bind(&blog.id)
        .execute(pool)
        .await
        .context("Failed to update blog")?;

    Ok(blog.clone())
}

fn row_to_blog_mysql(row: &sqlx::mysql::MySqlRow) -> Result<BlogWithAuthor> {
    let tags: String = row.get("tags");
    Ok(BlogWithAuthor {
        blog: Blog {
            id: row.get("id"),
            title: row.get("title"),
            content: row.get("content"),
            excerpt: row.get("excerpt"),
            tags: decode_list(&tags)?,
            read_time: row.get("read_time"),
            author_id: row.get("author_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        },
        author: owner_summary_mysql(row)?,
    })
}
