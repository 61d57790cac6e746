use async_trait::async_trait;

use crate::{
    application::repos::{LinksRepo, LinksWriteRepo, RepoError},
    domain::entities::LinkRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct LinkRow {
    url: String,
    title: String,
    sort_order: i64,
}

impl From<LinkRow> for LinkRecord {
    fn from(row: LinkRow) -> Self {
        Self {
            title: row.title,
            url: row.url,
            order: row.sort_order,
        }
    }
}

#[async_trait]
impl LinksRepo for PostgresRepositories {
    async fn list_links(&self) -> Result<Vec<LinkRecord>, RepoError> {
        let rows = sqlx::query_as::<_, LinkRow>(
            "SELECT url, title, sort_order FROM links ORDER BY sort_order ASC, title ASC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl LinksWriteRepo for PostgresRepositories {
    async fn put_link(&self, link: &LinkRecord) -> Result<(), RepoError> {
        if link.url.is_empty() {
            return Err(RepoError::InvalidInput {
                message: "link url must not be empty".into(),
            });
        }

        sqlx::query(
            "INSERT INTO links (url, title, sort_order) VALUES ($1, $2, $3) \
             ON CONFLICT (url) DO UPDATE SET title = EXCLUDED.title, sort_order = EXCLUDED.sort_order",
        )
        .bind(&link.url)
        .bind(&link.title)
        .bind(link.order)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
