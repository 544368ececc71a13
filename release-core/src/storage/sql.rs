//! `SqlDriver` - Releases in a relational database
//!
//! TigerStyle: Real database storage, connection checked at construction.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS releases_v1 (
//!     key TEXT NOT NULL,
//!     namespace TEXT NOT NULL,
//!     body TEXT NOT NULL,
//!     name TEXT NOT NULL,
//!     version BIGINT NOT NULL,
//!     status TEXT NOT NULL,
//!     owner TEXT NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL,
//!     modified_at TIMESTAMPTZ NOT NULL,
//!     PRIMARY KEY (key, namespace)
//! );
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::{Executor, QueryBuilder, Row};

use crate::constants::{
    RELEASE_OWNER, SQL_CONNECT_TIMEOUT_MS, SQL_POOL_CONNECTIONS_MAX, SQL_TABLE_NAME,
};

use super::codec::{decode_release, encode_release};
use super::driver::{Driver, ReleaseFilter, Releases};
use super::error::{StorageError, StorageResult};
use super::release::{Release, ReleaseKey};

// =============================================================================
// SqlDriver
// =============================================================================

/// PostgreSQL release storage.
#[derive(Debug)]
pub struct SqlDriver {
    pool: PgPool,
    namespace: String,
}

impl SqlDriver {
    /// Driver name reported in logs.
    pub const NAME: &'static str = "SQL";

    /// Connect and prepare the schema.
    ///
    /// # Errors
    /// Returns `Connection` if the string is empty, is not a postgres URL, or
    /// the database cannot be reached.
    pub async fn new(connection_string: &str, namespace: impl Into<String>) -> StorageResult<Self> {
        validate_connection_string(connection_string)?;

        let pool = PgPoolOptions::new()
            .max_connections(SQL_POOL_CONNECTIONS_MAX)
            .acquire_timeout(Duration::from_millis(SQL_CONNECT_TIMEOUT_MS))
            .connect(connection_string)
            .await
            .map_err(|e| StorageError::connection(format!("failed to connect: {e}")))?;

        Self::from_pool(pool, namespace).await
    }

    /// Create from an existing pool.
    ///
    /// # Errors
    /// Returns `Connection` if the schema cannot be created.
    pub async fn from_pool(pool: PgPool, namespace: impl Into<String>) -> StorageResult<Self> {
        let driver = Self {
            pool,
            namespace: namespace.into(),
        };
        driver.init_schema().await?;
        Ok(driver)
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let schema = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {SQL_TABLE_NAME} (
                key TEXT NOT NULL,
                namespace TEXT NOT NULL,
                body TEXT NOT NULL,
                name TEXT NOT NULL,
                version BIGINT NOT NULL,
                status TEXT NOT NULL,
                owner TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                modified_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (key, namespace)
            );
            CREATE INDEX IF NOT EXISTS idx_{SQL_TABLE_NAME}_name ON {SQL_TABLE_NAME}(name);
            CREATE INDEX IF NOT EXISTS idx_{SQL_TABLE_NAME}_status ON {SQL_TABLE_NAME}(status);
            "#
        );

        // no bind arguments: runs over the simple protocol, which allows several statements
        self.pool
            .execute(schema.as_str())
            .await
            .map_err(|e| StorageError::connection(format!("failed to create schema: {e}")))?;

        Ok(())
    }

    /// Get the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close all connections in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn target_namespace<'a>(&'a self, release: &'a Release) -> &'a str {
        if release.namespace.is_empty() {
            &self.namespace
        } else {
            &release.namespace
        }
    }

    fn encode_for(&self, release: &Release) -> StorageResult<(String, String)> {
        let namespace = self.target_namespace(release).to_string();
        let mut stored = release.clone();
        stored.namespace.clone_from(&namespace);
        Ok((namespace, encode_release(&stored)?))
    }
}

/// Reject connection strings that can never work.
///
/// # Errors
/// Returns `Connection` for an empty or non-postgres string.
pub fn validate_connection_string(connection_string: &str) -> StorageResult<()> {
    if connection_string.trim().is_empty() {
        return Err(StorageError::connection("sql connection string is empty"));
    }
    if !(connection_string.starts_with("postgres://")
        || connection_string.starts_with("postgresql://"))
    {
        return Err(StorageError::connection(
            "sql connection string must be a postgres URL",
        ));
    }
    Ok(())
}

fn body_of(row: &sqlx::postgres::PgRow) -> StorageResult<Release> {
    let body: String = row
        .try_get("body")
        .map_err(|e| StorageError::query(e.to_string()))?;
    decode_release(&body)
}

// =============================================================================
// Driver Implementation
// =============================================================================

#[async_trait]
impl Driver for SqlDriver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn namespace(&self) -> String {
        self.namespace.clone()
    }

    #[tracing::instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &ReleaseKey) -> StorageResult<Release> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT body FROM {SQL_TABLE_NAME} WHERE key = "
        ));
        query.push_bind(key.object_name());
        if !self.namespace.is_empty() {
            query.push(" AND namespace = ").push_bind(self.namespace.clone());
        }
        query.push(" ORDER BY namespace LIMIT 1");

        let row = query
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::query(format!("failed to get release: {e}")))?
            .ok_or_else(|| StorageError::not_found(key.object_name()))?;
        body_of(&row)
    }

    async fn list(&self, filter: &ReleaseFilter) -> StorageResult<Releases> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT body FROM {SQL_TABLE_NAME} WHERE owner = "
        ));
        query.push_bind(RELEASE_OWNER);
        if let Some(namespace) = filter.namespace.resolve(&self.namespace) {
            query.push(" AND namespace = ").push_bind(namespace);
        }
        if let Some(name) = &filter.name {
            query.push(" AND name = ").push_bind(name.clone());
        }
        if !filter.statuses.is_empty() {
            let statuses: Vec<String> = filter
                .statuses
                .iter()
                .map(|s| s.as_str().to_string())
                .collect();
            query.push(" AND status = ANY(").push_bind(statuses).push(")");
        }
        query.push(" ORDER BY namespace, name, version");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::query(format!("failed to list releases: {e}")))?;
        tracing::debug!(count = rows.len(), "sql: list");

        let current = self.namespace.clone();
        let filter = filter.clone();
        let releases = rows
            .into_iter()
            .filter_map(|row| match body_of(&row) {
                Ok(release) => Some(release),
                Err(e) => {
                    tracing::warn!(error = %e, "list: failed to decode release");
                    None
                }
            })
            .filter(move |release| filter.matches(release, &current));
        Ok(Releases::new(releases))
    }

    #[tracing::instrument(skip(self, release), fields(key = %release.key()))]
    async fn create(&self, release: &Release) -> StorageResult<()> {
        release.validate()?;
        let (namespace, body) = self.encode_for(release)?;
        let now = Utc::now();

        let result = sqlx::query(&format!(
            r#"
            INSERT INTO {SQL_TABLE_NAME}
                (key, namespace, body, name, version, status, owner, created_at, modified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            ON CONFLICT (key, namespace) DO NOTHING
            "#
        ))
        .bind(release.key().object_name())
        .bind(&namespace)
        .bind(&body)
        .bind(&release.name)
        .bind(i64::from(release.version))
        .bind(release.status.as_str())
        .bind(RELEASE_OWNER)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::query(format!("failed to create release: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::already_exists(release.key().object_name()));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, release), fields(key = %release.key()))]
    async fn update(&self, release: &Release) -> StorageResult<()> {
        release.validate()?;
        let (namespace, body) = self.encode_for(release)?;

        let result = sqlx::query(&format!(
            r#"
            UPDATE {SQL_TABLE_NAME}
            SET body = $3, status = $4, modified_at = $5
            WHERE key = $1 AND namespace = $2
            "#
        ))
        .bind(release.key().object_name())
        .bind(&namespace)
        .bind(&body)
        .bind(release.status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::query(format!("failed to update release: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(release.key().object_name()));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &ReleaseKey) -> StorageResult<Release> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "DELETE FROM {SQL_TABLE_NAME} WHERE (key, namespace) IN \
             (SELECT key, namespace FROM {SQL_TABLE_NAME} WHERE key = "
        ));
        query.push_bind(key.object_name());
        if !self.namespace.is_empty() {
            query.push(" AND namespace = ").push_bind(self.namespace.clone());
        }
        query.push(" ORDER BY namespace LIMIT 1) RETURNING body");

        let row = query
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::query(format!("failed to delete release: {e}")))?
            .ok_or_else(|| StorageError::not_found(key.object_name()))?;
        body_of(&row)
    }
}

// =============================================================================
// Tests (require running Postgres)
// =============================================================================
