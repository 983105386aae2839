//! MySQL Backend Implementation
//!
//! MySQL has no transactional DDL and no lock that survives the way the
//! PostgreSQL advisory lock does, so locking here is a no-op.

use async_trait::async_trait;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{Connection, Executor, MySqlConnection};
use std::time::Duration;
use url::Url;

use super::core::*;
use super::BackendKind;
use crate::config::{database_name, redacted};
use crate::error::{MigrateError, MigrateResult};

pub const DEFAULT_PORT: u16 = 3306;

/// MySQL database backend implementation
#[derive(Debug, Default)]
pub struct MySqlBackend;

impl MySqlBackend {
    pub fn new() -> Self {
        Self
    }

    /// Fill in the default port when the URL omits it
    pub fn normalize_url(target: &Url) -> Url {
        let mut normalized = target.clone();
        if normalized.port().is_none() {
            let _ = normalized.set_port(Some(DEFAULT_PORT));
        }
        normalized
    }

    /// Same server and credentials with no database selected
    pub fn admin_url(target: &Url) -> Url {
        let mut admin = Self::normalize_url(target);
        admin.set_path("/");
        admin
    }

    async fn connect_admin(target: &Url) -> MigrateResult<MySqlConnection> {
        let admin = Self::admin_url(target);
        MySqlConnection::connect(admin.as_str())
            .await
            .map_err(|e| MigrateError::sql(format!("connecting to {}", redacted(&admin)), e))
    }

    async fn run_admin(&self, target: &Url, sql: &str, context: String) -> MigrateResult<()> {
        let mut conn = Self::connect_admin(target).await?;
        let result = conn.execute(sql).await;
        let _ = conn.close().await;
        result.map(|_| ()).map_err(|e| MigrateError::sql(context, e))
    }
}

#[async_trait]
impl Backend for MySqlBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::MySQL
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::MySQL
    }

    async fn open(&self, target: &Url) -> MigrateResult<DatabasePool> {
        let url = Self::normalize_url(target);
        let pool = MySqlPoolOptions::new()
            .max_connections(POOL_MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(30))
            .connect(url.as_str())
            .await
            .map_err(|e| MigrateError::sql(format!("connecting to {}", redacted(&url)), e))?;
        Ok(DatabasePool::MySql(pool))
    }

    async fn database_exists(&self, target: &Url) -> MigrateResult<bool> {
        let name = database_name(target)?;
        let mut conn = Self::connect_admin(target).await?;
        let found = sqlx::query("select 1 from information_schema.schemata where schema_name = ?")
            .bind(name.as_str())
            .fetch_optional(&mut conn)
            .await
            .map_err(|e| MigrateError::sql("checking database existence", e));
        let _ = conn.close().await;
        Ok(found?.is_some())
    }

    async fn create_database(&self, target: &Url) -> MigrateResult<()> {
        let name = database_name(target)?;
        tracing::info!("Creating: {}", name);
        let sql = format!("create database {}", self.dialect().quote_identifier(&name));
        self.run_admin(target, &sql, format!("creating database {}", name))
            .await
    }

    async fn drop_database(&self, target: &Url) -> MigrateResult<()> {
        let name = database_name(target)?;
        tracing::info!("Dropping: {}", name);
        let sql = format!(
            "drop database if exists {}",
            self.dialect().quote_identifier(&name)
        );
        self.run_admin(target, &sql, format!("dropping database {}", name))
            .await
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
            .fetch_all(pool.as_mysql()?)
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
        let tx = tx.as_mysql()?;
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
        let tx = tx.as_mysql()?;
        sqlx::query(&sql)
            .bind(version)
            .bind(project)
            .execute(&mut **tx)
            .await
            .map_err(|e| MigrateError::sql(format!("removing migration {}", version), e))?;
        Ok(())
    }

    async fn acquire_lock(&self, _pool: &DatabasePool) -> MigrateResult<LockToken> {
        tracing::debug!("mysql backend does not lock migrations");
        Ok(LockToken::Noop)
    }

    async fn release_lock(&self, _token: LockToken) -> MigrateResult<()> {
        Ok(())
    }
}
