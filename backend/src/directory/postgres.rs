//! PostgreSQL directory source.
//!
//! Queries must return text-compatible columns named as in
//! [`super::columns`]. Defaults are embedded; deployments point
//! `DIRECTORY_SQL_PATH` / `AUTH_SQL_PATH` at their own queries.

use std::path::Path;

use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row};

use super::source::DirectorySource;
use super::{AuthMember, RawRecord};
use crate::api::logs::log_info;
use crate::error::DirectoryResult;

const DEFAULT_DIRECTORY_SQL: &str = include_str!("../../sql/directory.sql");
const DEFAULT_AUTH_SQL: &str = include_str!("../../sql/auth_members.sql");

#[derive(Debug, Clone)]
pub struct PgDirectorySource {
    pool: PgPool,
    directory_sql: String,
    auth_sql: String,
}

impl PgDirectorySource {
    pub async fn connect(
        url: &str,
        directory_sql: Option<&Path>,
        auth_sql: Option<&Path>,
    ) -> DirectoryResult<Self> {
        let load = |path: Option<&Path>, default: &str| -> DirectoryResult<String> {
            match path {
                Some(p) => Ok(std::fs::read_to_string(p)?),
                None => Ok(default.to_string()),
            }
        };

        let directory_sql = load(directory_sql, DEFAULT_DIRECTORY_SQL)?;
        let auth_sql = load(auth_sql, DEFAULT_AUTH_SQL)?;

        log_info("Connecting to the personnel database");
        let pool = PgPoolOptions::new().max_connections(1).connect(url).await?;

        Ok(Self {
            pool,
            directory_sql,
            auth_sql,
        })
    }

    async fn query(&self, sql: &str) -> DirectoryResult<Vec<RawRecord>> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        let records: Vec<RawRecord> = rows.iter().map(row_to_record).collect();
        log_info(format!("Query returned {} records", records.len()));
        Ok(records)
    }
}

fn row_to_record(row: &PgRow) -> RawRecord {
    row.columns()
        .iter()
        .map(|column| {
            let value: Option<String> = row.try_get(column.ordinal()).ok().flatten();
            (column.name().to_string(), value.unwrap_or_default())
        })
        .collect()
}

impl DirectorySource for PgDirectorySource {
    async fn fetch_directory(&self) -> DirectoryResult<Vec<RawRecord>> {
        self.query(&self.directory_sql).await
    }

    async fn fetch_auth_members(&self) -> DirectoryResult<Vec<AuthMember>> {
        let records = self.query(&self.auth_sql).await?;
        Ok(records.iter().filter_map(AuthMember::from_record).collect())
    }
}
