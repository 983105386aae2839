//! Core Database Backend Traits
//!
//! This module defines the contract every database engine implements to plug
//! into the migration engine, plus the pooled connection and transaction
//! handles that flow between the engine and a backend.

use async_trait::async_trait;
use sqlx::{Executor, MySql, MySqlPool, PgConnection, PgPool, Postgres, Sqlite, SqlitePool};
use url::Url;

use super::BackendKind;
use crate::error::{MigrateError, MigrateResult};

/// Name of the ledger table shared by every backend
pub const MIGRATIONS_TABLE: &str = "schema_migrations";

/// Upper bound on pooled connections opened for a migration run
pub const POOL_MAX_CONNECTIONS: u32 = 4;

/// Pooled connection to the target database
///
/// Returned by [`Backend::open`]. Each variant wraps the typed sqlx pool of
/// the engine that opened it.
#[derive(Debug, Clone)]
pub enum DatabasePool {
    Postgres(PgPool),
    MySql(MySqlPool),
    Sqlite(SqlitePool),
}

impl DatabasePool {
    /// Engine this pool talks to
    pub fn kind(&self) -> BackendKind {
        match self {
            DatabasePool::Postgres(_) => BackendKind::PostgreSQL,
            DatabasePool::MySql(_) => BackendKind::MySQL,
            DatabasePool::Sqlite(_) => BackendKind::SQLite,
        }
    }

    /// Run one or more statements outside any explicit transaction
    ///
    /// The text is sent unprepared, so it may hold several `;`-separated
    /// statements.
    pub async fn execute_batch(&self, sql: &str) -> MigrateResult<()> {
        let result = match self {
            DatabasePool::Postgres(pool) => pool.execute(sql).await.map(|_| ()),
            DatabasePool::MySql(pool) => pool.execute(sql).await.map(|_| ()),
            DatabasePool::Sqlite(pool) => pool.execute(sql).await.map(|_| ()),
        };
        result.map_err(|e| MigrateError::sql("executing statement", e))
    }

    /// Begin a transaction on a pooled connection
    pub async fn begin(&self) -> MigrateResult<DatabaseTransaction> {
        let tx = match self {
            DatabasePool::Postgres(pool) => pool.begin().await.map(DatabaseTransaction::Postgres),
            DatabasePool::MySql(pool) => pool.begin().await.map(DatabaseTransaction::MySql),
            DatabasePool::Sqlite(pool) => pool.begin().await.map(DatabaseTransaction::Sqlite),
        };
        tx.map_err(|e| MigrateError::sql("starting transaction", e))
    }

    /// Close every connection in the pool
    pub async fn close(&self) {
        match self {
            DatabasePool::Postgres(pool) => pool.close().await,
            DatabasePool::MySql(pool) => pool.close().await,
            DatabasePool::Sqlite(pool) => pool.close().await,
        }
    }

    pub(crate) fn as_postgres(&self) -> MigrateResult<&PgPool> {
        match self {
            DatabasePool::Postgres(pool) => Ok(pool),
            other => Err(mismatch(BackendKind::PostgreSQL, other.kind())),
        }
    }

    pub(crate) fn as_mysql(&self) -> MigrateResult<&MySqlPool> {
        match self {
            DatabasePool::MySql(pool) => Ok(pool),
            other => Err(mismatch(BackendKind::MySQL, other.kind())),
        }
    }

    pub(crate) fn as_sqlite(&self) -> MigrateResult<&SqlitePool> {
        match self {
            DatabasePool::Sqlite(pool) => Ok(pool),
            other => Err(mismatch(BackendKind::SQLite, other.kind())),
        }
    }
}

/// Open transaction on one pooled connection
///
/// Dropping it without [`commit`](Self::commit) rolls it back.
#[derive(Debug)]
pub enum DatabaseTransaction {
    Postgres(sqlx::Transaction<'static, Postgres>),
    MySql(sqlx::Transaction<'static, MySql>),
    Sqlite(sqlx::Transaction<'static, Sqlite>),
}

impl DatabaseTransaction {
    pub fn kind(&self) -> BackendKind {
        match self {
            DatabaseTransaction::Postgres(_) => BackendKind::PostgreSQL,
            DatabaseTransaction::MySql(_) => BackendKind::MySQL,
            DatabaseTransaction::Sqlite(_) => BackendKind::SQLite,
        }
    }

    /// Run one or more unprepared statements inside the transaction
    pub async fn execute_batch(&mut self, sql: &str) -> MigrateResult<()> {
        let result = match self {
            DatabaseTransaction::Postgres(tx) => (&mut **tx).execute(sql).await.map(|_| ()),
            DatabaseTransaction::MySql(tx) => (&mut **tx).execute(sql).await.map(|_| ()),
            DatabaseTransaction::Sqlite(tx) => (&mut **tx).execute(sql).await.map(|_| ()),
        };
        result.map_err(|e| MigrateError::sql("executing migration", e))
    }

    pub async fn commit(self) -> MigrateResult<()> {
        let result = match self {
            DatabaseTransaction::Postgres(tx) => tx.commit().await,
            DatabaseTransaction::MySql(tx) => tx.commit().await,
            DatabaseTransaction::Sqlite(tx) => tx.commit().await,
        };
        result.map_err(|e| MigrateError::sql("committing transaction", e))
    }

    pub async fn rollback(self) -> MigrateResult<()> {
        let result = match self {
            DatabaseTransaction::Postgres(tx) => tx.rollback().await,
            DatabaseTransaction::MySql(tx) => tx.rollback().await,
            DatabaseTransaction::Sqlite(tx) => tx.rollback().await,
        };
        result.map_err(|e| MigrateError::sql("rolling back transaction", e))
    }

    pub(crate) fn as_postgres(&mut self) -> MigrateResult<&mut sqlx::Transaction<'static, Postgres>> {
        match self {
            DatabaseTransaction::Postgres(tx) => Ok(tx),
            other => Err(mismatch(BackendKind::PostgreSQL, other.kind())),
        }
    }

    pub(crate) fn as_mysql(&mut self) -> MigrateResult<&mut sqlx::Transaction<'static, MySql>> {
        match self {
            DatabaseTransaction::MySql(tx) => Ok(tx),
            other => Err(mismatch(BackendKind::MySQL, other.kind())),
        }
    }

    pub(crate) fn as_sqlite(&mut self) -> MigrateResult<&mut sqlx::Transaction<'static, Sqlite>> {
        match self {
            DatabaseTransaction::Sqlite(tx) => Ok(tx),
            other => Err(mismatch(BackendKind::SQLite, other.kind())),
        }
    }
}

fn mismatch(expected: BackendKind, actual: BackendKind) -> MigrateError {
    MigrateError::configuration(format!(
        "{} backend was handed a {} connection",
        expected, actual
    ))
}

/// Proof that the migration lock is held
///
/// PostgreSQL keeps the advisory lock on a session detached from the pool;
/// dropping the token closes that session, which releases the lock
/// server-side. The other backends hand out [`LockToken::Noop`].
#[derive(Debug)]
pub enum LockToken {
    Noop,
    PostgresSession(PgConnection),
}

impl LockToken {
    pub fn is_noop(&self) -> bool {
        matches!(self, LockToken::Noop)
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl SqlDialect {
    /// Get the parameter placeholder style for this dialect
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::MySQL | SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Quote an identifier, doubling any embedded quote character
    pub fn quote_identifier(&self, ident: &str) -> String {
        match self {
            SqlDialect::PostgreSQL | SqlDialect::SQLite => {
                format!("\"{}\"", ident.replace('"', "\"\""))
            }
            SqlDialect::MySQL => format!("`{}`", ident.replace('`', "``")),
        }
    }

    /// Applied versions for one project, newest first
    pub fn select_versions_sql(&self, limit: Option<usize>) -> String {
        let mut sql = format!(
            "select version from {} where project = {} order by version desc",
            MIGRATIONS_TABLE,
            self.parameter_placeholder(0)
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" limit {}", limit));
        }
        sql
    }

    pub fn insert_version_sql(&self) -> String {
        format!(
            "insert into {} (version, project) values ({}, {})",
            MIGRATIONS_TABLE,
            self.parameter_placeholder(0),
            self.parameter_placeholder(1)
        )
    }

    pub fn delete_version_sql(&self) -> String {
        format!(
            "delete from {} where version = {} and project = {}",
            MIGRATIONS_TABLE,
            self.parameter_placeholder(0),
            self.parameter_placeholder(1)
        )
    }
}

/// Statement creating a fresh ledger table
///
/// New tables key on `(version, project)` so that projects sharing one
/// database keep independent histories.
pub fn create_migrations_table_sql() -> String {
    format!(
        "create table if not exists {} (\
         version varchar(255) not null, \
         project varchar(255) not null default 'default', \
         primary key (version, project))",
        MIGRATIONS_TABLE
    )
}

/// Statement probing for the `project` column on a pre-existing table
pub fn probe_project_column_sql() -> String {
    format!("select project from {} limit 1", MIGRATIONS_TABLE)
}

/// Statement upgrading a ledger table created before projects existed
pub fn add_project_column_sql() -> String {
    format!(
        "alter table {} add column project varchar(255) default 'default'",
        MIGRATIONS_TABLE
    )
}

/// Database backend trait that provides engine-specific implementations
///
/// All three backends present this same contract even though only
/// PostgreSQL offers a real cross-process lock.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Get the backend type
    fn kind(&self) -> BackendKind;

    /// Get the SQL dialect used by this backend
    fn dialect(&self) -> SqlDialect;

    /// Open a connection pool for the target database
    async fn open(&self, target: &Url) -> MigrateResult<DatabasePool>;

    /// Check whether the target database exists
    ///
    /// May fail when the caller lacks permission to list databases; callers
    /// must treat that as "unknown", not as "absent".
    async fn database_exists(&self, target: &Url) -> MigrateResult<bool>;

    async fn create_database(&self, target: &Url) -> MigrateResult<()>;

    /// Drop the target database; a no-op when it does not exist
    async fn drop_database(&self, target: &Url) -> MigrateResult<()>;

    /// Create the ledger table if needed and upgrade it to carry `project`
    async fn ensure_migrations_table(&self, pool: &DatabasePool) -> MigrateResult<()> {
        pool.execute_batch(&create_migrations_table_sql())
            .await
            .map_err(|e| reword(e, "creating migrations table"))?;

        if pool.execute_batch(&probe_project_column_sql()).await.is_err() {
            tracing::debug!("ledger table has no project column, adding it");
            pool.execute_batch(&add_project_column_sql())
                .await
                .map_err(|e| reword(e, "adding project column to migrations table"))?;
        }

        Ok(())
    }

    /// Applied versions for `project`, newest first, at most `limit` of them
    async fn read_ledger(
        &self,
        pool: &DatabasePool,
        limit: Option<usize>,
        project: &str,
    ) -> MigrateResult<Vec<String>>;

    /// Record `version` as applied, inside the caller's transaction
    async fn record_apply(
        &self,
        tx: &mut DatabaseTransaction,
        version: &str,
        project: &str,
    ) -> MigrateResult<()>;

    /// Remove the ledger row for `version`, inside the caller's transaction
    async fn record_revert(
        &self,
        tx: &mut DatabaseTransaction,
        version: &str,
        project: &str,
    ) -> MigrateResult<()>;

    /// Block until the migration lock is held
    async fn acquire_lock(&self, pool: &DatabasePool) -> MigrateResult<LockToken>;

    async fn release_lock(&self, token: LockToken) -> MigrateResult<()>;
}

/// Replace the context of a SQL error, keeping its source
pub(crate) fn reword(err: MigrateError, context: &str) -> MigrateError {
    match err {
        MigrateError::Sql { source, .. } => MigrateError::sql(context, source),
        other => other,
    }
}
