//! Postgres-backed repository implementations.

mod entries;
mod links;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
};

use crate::application::repos::{EntryFilter, RepoError};

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
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

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    fn apply_entry_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &EntryFilter) {
        qb.push(" AND e.is_page = ");
        qb.push_bind(filter.is_page);

        if !filter.include_hidden {
            qb.push(" AND e.is_hidden = FALSE");
        }
        if let Some(start) = filter.published_from {
            qb.push(" AND e.publish_date >= ");
            qb.push_bind(start);
        }
        if let Some(end) = filter.published_before {
            qb.push(" AND e.publish_date < ");
            qb.push_bind(end);
        }
    }

    fn convert_bound(value: usize, what: &str) -> Result<i64, RepoError> {
        value.try_into().map_err(|_| RepoError::InvalidInput {
            message: format!("{what} exceeds supported range"),
        })
    }
}
