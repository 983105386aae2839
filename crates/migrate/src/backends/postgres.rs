//! PostgreSQL Backend Implementation
//!
//! Database-level commands run through an administrative connection to the
//! `postgres` maintenance database. The migration lock is a session-level
//! advisory lock held on a connection detached from the pool.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, Executor, PgConnection};
use std::time::Duration;
use url::Url;

use super::core::*;
use super::BackendKind;
use crate::config::{database_name, redacted};
use crate::error::{MigrateError, MigrateResult};

/// Advisory lock key shared by every process migrating the same server
pub const ADVISORY_LOCK_KEY: i64 = 48372615;

const MAINTENANCE_DATABASE: &str = "postgres";

/// PostgreSQL database backend implementation
#[derive(Debug, Default)]
pub struct PostgresBackend;

impl PostgresBackend {
    pub fn new() -> Self {
        Self
    }

    /// Same server and credentials, pointed at the maintenance database
    pub fn admin_url(target: &Url) -> Url {
        let mut admin = target.clone();
        admin.set_path(MAINTENANCE_DATABASE);
        admin
    }

    async fn connect_admin(target: &Url) -> MigrateResult<PgConnection> {
        let admin = Self::admin_url(target);
        PgConnection::connect(admin.as_str())
            .await
            .map_err(|e| MigrateError::sql(format!("connecting to {}", redacted(&admin)), e))
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::PostgreSQL
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }

    async fn open(&self, target: &Url) -> MigrateResult<DatabasePool> {
        let pool = PgPoolOptions::new()
            .max_connections(POOL_MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(30))
            .connect(target.as_str())
            .await
            .map_err(|e| MigrateError::sql(format!("connecting to {}", redacted(target)), e))?;
        Ok(DatabasePool::Postgres(pool))
    }

    async fn database_exists(&self, target: &Url) -> MigrateResult<bool> {
        let name = database_name(target)?;
        let mut conn = Self::connect_admin(target).await?;
        let found = sqlx::query("select 1 from pg_database where datname = $1")
            .bind(name.as_str())
            .fetch_optional(&mut conn)
            .await
            .map_err(|e| MigrateError::sql("checking database existence", e));
        let _ = conn.close().await;
        Ok(found?.is_some())
    }

    async fn create_database(&self, target: &Url) -> MigrateResult<()> {
        let name = database_name(target)?;
        let sql = format!("create database {}", self.dialect().quote_identifier(&name));
        tracing::info!("Creating: {}", name);

        let mut conn = Self::connect_admin(target).await?;
        let result = conn.execute(sql.as_str()).await;
        let _ = conn.close().await;
        result
            .map(|_| ())
            .map_err(|e| MigrateError::sql(format!("creating database {}", name), e))
    }

    async fn drop_database(&self, target: &Url) -> MigrateResult<()> {
        let name = database_name(target)?;
        let sql = format!(
            "drop database if exists {}",
            self.dialect().quote_identifier(&name)
        );
        tracing::info!("Dropping: {}", name);

        let mut conn = Self::connect_admin(target).await?;
        let result = conn.execute(sql.as_str()).await;
        let _ = conn.close().await;
        result
            .map(|_| ())
            .map_err(|e| MigrateError::sql(format!("dropping database {}", name), e))
    }

    async fn read_ledger(
        &self,
        pool: &DatabasePool,
        limit: Option<usize>,
        project: &str,
    ) -> MigrateResult<Vec<String>> {
        let sql = self.dialect().select_versions_sql(limit);
        sqlx::query_scalar::<_, String>(&sql)
            .bind(project)
            .fetch_all(pool.as_postgres()?)
            .await
            .map_err(|e| MigrateError::sql("reading applied migrations", e))
    }

    async fn record_apply(
        &self,
        tx: &mut DatabaseTransaction,
        version: &str,
        project: &str,
    ) -> MigrateResult<()> {
        let sql = self.dialect().insert_version_sql();
        let tx = tx.as_postgres()?;
        sqlx::query(&sql)
            .bind(version)
            .bind(project)
            .execute(&mut **tx)
            .await
            .map_err(|e| MigrateError::sql(format!("recording migration {}", version), e))?;
        Ok(())
    }

    async fn record_revert(
        &self,
        tx: &mut DatabaseTransaction,
        version: &str,
        project: &str,
    ) -> MigrateResult<()> {
        let sql = self.dialect().delete_version_sql();
        let tx = tx.as_postgres()?;
        sqlx::query(&sql)
            .bind(version)
            .bind(project)
            .execute(&mut **tx)
            .await
            .map_err(|e| MigrateError::sql(format!("removing migration {}", version), e))?;
        Ok(())
    }

    async fn acquire_lock(&self, pool: &DatabasePool) -> MigrateResult<LockToken> {
        let mut session = pool
            .as_postgres()?
            .acquire()
            .await
            .map_err(|e| MigrateError::sql("opening lock session", e))?
            .detach();

        sqlx::query("select pg_advisory_lock($1)")
            .bind(ADVISORY_LOCK_KEY)
            .execute(&mut session)
            .await
            .map_err(|e| MigrateError::sql("acquiring migration lock", e))?;

        Ok(LockToken::PostgresSession(session))
    }

    async fn release_lock(&self, token: LockToken) -> MigrateResult<()> {
        let mut session = match token {
            LockToken::PostgresSession(session) => session,
            LockToken::Noop => return Ok(()),
        };

        let released = sqlx::query_scalar::<_, bool>("select pg_advisory_unlock($1)")
            .bind(ADVISORY_LOCK_KEY)
            .fetch_one(&mut session)
            .await
            .map_err(|e| MigrateError::sql("releasing migration lock", e));

        // The server drops session locks on disconnect, so close regardless.
        let closed = session
            .close()
            .await
            .map_err(|e| MigrateError::sql("closing lock session", e));

        if !released? {
            tracing::warn!("migration lock was not held by the releasing session");
        }
        closed
    }
}
