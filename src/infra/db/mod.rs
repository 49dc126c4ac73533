//! Postgres-backed post storage.

mod rows;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::{
    Postgres, Transaction,
    postgres::{PgPool, PgPoolOptions},
    query, query_as,
};
use tracing::debug;

use crate::application::repos::{PostBackend, RepoError};
use crate::domain::posts::Post;

use super::uploads::FileStore;
use rows::{CategoryRow, PostRow, assemble_posts};

#[derive(Clone)]
pub struct PostgresBackend {
    pool: Arc<PgPool>,
    files: FileStore,
}

impl PostgresBackend {
    pub fn new(pool: PgPool, files: FileStore) -> Self {
        Self {
            pool: Arc::new(pool),
            files,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    async fn write_post(tx: &mut Transaction<'_, Postgres>, post: &Post) -> Result<(), sqlx::Error> {
        query(
            r#"
            INSERT INTO posts (id, slug, title, excerpt, content, pub_date, last_modified, is_published)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                slug = EXCLUDED.slug,
                title = EXCLUDED.title,
                excerpt = EXCLUDED.excerpt,
                content = EXCLUDED.content,
                pub_date = EXCLUDED.pub_date,
                last_modified = EXCLUDED.last_modified,
                is_published = EXCLUDED.is_published
            "#,
        )
        .bind(&post.id)
        .bind(&post.slug)
        .bind(&post.title)
        .bind(&post.excerpt)
        .bind(&post.content)
        .bind(post.pub_date)
        .bind(post.last_modified)
        .bind(post.is_published)
        .execute(&mut **tx)
        .await?;

        query("DELETE FROM post_categories WHERE post_id = $1")
            .bind(&post.id)
            .execute(&mut **tx)
            .await?;

        for (position, name) in post.categories.iter().enumerate() {
            query("INSERT INTO post_categories (post_id, position, name) VALUES ($1, $2, $3)")
                .bind(&post.id)
                .bind(i32::try_from(position).unwrap_or(i32::MAX))
                .bind(name)
                .execute(&mut **tx)
                .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl PostBackend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn load_all(&self) -> Result<Vec<Post>, RepoError> {
        let rows: Vec<PostRow> = query_as(
            "SELECT id, slug, title, excerpt, content, pub_date, last_modified, is_published \
             FROM posts",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let categories: Vec<CategoryRow> =
            query_as("SELECT post_id, name FROM post_categories ORDER BY post_id, position")
                .fetch_all(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        debug!(posts = rows.len(), categories = categories.len(), "loaded post rows");
        Ok(assemble_posts(rows, categories))
    }

    async fn persist(&self, post: &Post) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Self::write_post(&mut tx, post)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn erase(&self, post: &Post) -> Result<(), RepoError> {
        query("DELETE FROM posts WHERE lower(id) = lower($1)")
            .bind(&post.id)
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }

    async fn store_file(
        &self,
        bytes: Bytes,
        file_name: &str,
        suffix: Option<&str>,
    ) -> Result<String, RepoError> {
        Ok(self.files.store(file_name, suffix, bytes).await?)
    }
}
