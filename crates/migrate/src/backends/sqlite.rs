//! SQLite Backend Implementation
//!
//! A SQLite "database" is a file. The URL path, minus one leading slash,
//! names that file: `sqlite:db/app.sqlite3` and `sqlite:///db/app.sqlite3`
//! are relative, `sqlite:////var/lib/app.sqlite3` is absolute.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use super::core::*;
use super::BackendKind;
use crate::config::decoded_path;
use crate::error::{MigrateError, MigrateResult};

/// SQLite database backend implementation
#[derive(Debug, Default)]
pub struct SqliteBackend;

impl SqliteBackend {
    pub fn new() -> Self {
        Self
    }

    /// Database file named by the URL
    pub fn database_path(target: &Url) -> MigrateResult<PathBuf> {
        let path = decoded_path(target)?;
        Ok(PathBuf::from(path.strip_prefix('/').unwrap_or(&path)))
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::SQLite
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
    }

    async fn open(&self, target: &Url) -> MigrateResult<DatabasePool> {
        let path = Self::database_path(target)?;
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(POOL_MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::sql(format!("opening {}", path.display()), e))?;
        Ok(DatabasePool::Sqlite(pool))
    }

    async fn database_exists(&self, target: &Url) -> MigrateResult<bool> {
        let path = Self::database_path(target)?;
        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MigrateError::file_system(path, e)),
        }
    }

    /// Opening the file creates it
    async fn create_database(&self, target: &Url) -> MigrateResult<()> {
        tracing::info!("Creating: {}", Self::database_path(target)?.display());
        let pool = self.open(target).await?;
        let ping = pool.execute_batch("select 1").await;
        pool.close().await;
        ping
    }

    async fn drop_database(&self, target: &Url) -> MigrateResult<()> {
        let path = Self::database_path(target)?;
        if !self.database_exists(target).await? {
            return Ok(());
        }
        tracing::info!("Dropping: {}", path.display());
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| MigrateError::file_system(path, e))
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
            .fetch_all(pool.as_sqlite()?)
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
        let tx = tx.as_sqlite()?;
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
        let tx = tx.as_sqlite()?;
        sqlx::query(&sql)
            .bind(version)
            .bind(project)
            .execute(&mut **tx)
            .await
            .map_err(|e| MigrateError::sql(format!("removing migration {}", version), e))?;
        Ok(())
    }

    async fn acquire_lock(&self, _pool: &DatabasePool) -> MigrateResult<LockToken> {
        Ok(LockToken::Noop)
    }

    async fn release_lock(&self, _token: LockToken) -> MigrateResult<()> {
        Ok(())
    }
}
