use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use tracing::debug;

use crate::{
    application::repos::{EntriesRepo, EntriesWriteRepo, EntryFilter, RepoError},
    domain::entities::EntryRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

const ENTRY_COLUMNS: &str = "e.slug, e.author, e.is_hidden, e.is_page, e.allow_comments, \
     e.publish_date, e.title, e.content, e.relative_url";

#[derive(sqlx::FromRow)]
struct EntryRow {
    slug: String,
    author: String,
    is_hidden: bool,
    is_page: bool,
    allow_comments: bool,
    publish_date: OffsetDateTime,
    title: String,
    content: Vec<u8>,
    relative_url: String,
}

impl From<EntryRow> for EntryRecord {
    fn from(row: EntryRow) -> Self {
        Self {
            author: row.author,
            is_hidden: row.is_hidden,
            is_page: row.is_page,
            allow_comments: row.allow_comments,
            publish_date: row.publish_date,
            title: row.title,
            content: row.content,
            slug: row.slug,
            relative_url: row.relative_url,
        }
    }
}

#[async_trait]
impl EntriesRepo for PostgresRepositories {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<EntryRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {ENTRY_COLUMNS} FROM entries e WHERE e.slug = "));
        qb.push_bind(slug);

        let row = qb
            .build_query_as::<EntryRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn list_entries(
        &self,
        filter: &EntryFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<EntryRecord>, RepoError> {
        let limit = Self::convert_bound(limit, "limit")?;
        let offset = Self::convert_bound(offset, "offset")?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {ENTRY_COLUMNS} FROM entries e WHERE 1=1"));
        Self::apply_entry_filter(&mut qb, filter);
        qb.push(" ORDER BY e.publish_date DESC, e.slug ASC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<EntryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(|err| {
                debug!(
                    target = "verbalize::infra::db::entries",
                    ?filter,
                    limit,
                    offset,
                    error = %err,
                    "entry listing failed"
                );
                map_sqlx_error(err)
            })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl EntriesWriteRepo for PostgresRepositories {
    async fn put_entry(&self, entry: &EntryRecord) -> Result<(), RepoError> {
        if entry.slug.is_empty() {
            return Err(RepoError::InvalidInput {
                message: "entry slug must not be empty".into(),
            });
        }

        sqlx::query(
            "INSERT INTO entries \
             (slug, author, is_hidden, is_page, allow_comments, publish_date, title, content, relative_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (slug) DO UPDATE SET \
             author = EXCLUDED.author, \
             is_hidden = EXCLUDED.is_hidden, \
             is_page = EXCLUDED.is_page, \
             allow_comments = EXCLUDED.allow_comments, \
             publish_date = EXCLUDED.publish_date, \
             title = EXCLUDED.title, \
             content = EXCLUDED.content, \
             relative_url = EXCLUDED.relative_url",
        )
        .bind(&entry.slug)
        .bind(&entry.author)
        .bind(entry.is_hidden)
        .bind(entry.is_page)
        .bind(entry.allow_comments)
        .bind(entry.publish_date)
        .bind(&entry.title)
        .bind(&entry.content)
        .bind(&entry.relative_url)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
