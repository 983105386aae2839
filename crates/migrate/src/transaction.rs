//! Scoped transactions for migration steps
//!
//! A [`MigrationTransaction`] commits only when [`finish`] is handed a
//! successful outcome. Every other exit rolls back: an error outcome, an
//! early return, a panic, or a cancelled future.
//!
//! [`finish`]: MigrationTransaction::finish

use tracing::warn;

use crate::backends::{DatabasePool, DatabaseTransaction};
use crate::error::{MigrateError, MigrateResult};

/// Transaction wrapper with guaranteed rollback on every non-commit path
pub struct MigrationTransaction {
    inner: Option<DatabaseTransaction>,
}

impl MigrationTransaction {
    /// Begin a new transaction on a pooled connection
    pub async fn begin(pool: &DatabasePool) -> MigrateResult<Self> {
        let inner = pool.begin().await?;
        Ok(Self { inner: Some(inner) })
    }

    /// The open transaction, for backend ledger writes
    pub fn connection(&mut self) -> MigrateResult<&mut DatabaseTransaction> {
        self.inner
            .as_mut()
            .ok_or_else(|| MigrateError::configuration("transaction has already finished"))
    }

    /// Execute a migration body inside the transaction
    ///
    /// Whitespace-only bodies are skipped, since some drivers reject an
    /// empty query.
    pub async fn execute(&mut self, sql: &str) -> MigrateResult<()> {
        if sql.trim().is_empty() {
            return Ok(());
        }
        self.connection()?.execute_batch(sql).await
    }

    pub async fn commit(mut self) -> MigrateResult<()> {
        match self.inner.take() {
            Some(tx) => tx.commit().await,
            None => Ok(()),
        }
    }

    pub async fn rollback(mut self) -> MigrateResult<()> {
        match self.inner.take() {
            Some(tx) => tx.rollback().await,
            None => Ok(()),
        }
    }

    /// Commit on `Ok`, roll back on `Err`
    ///
    /// A failed rollback replaces the original error.
    pub async fn finish<T>(self, outcome: MigrateResult<T>) -> MigrateResult<T> {
        match outcome {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                self.rollback().await?;
                Err(err)
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }
}

impl Drop for MigrationTransaction {
    fn drop(&mut self) {
        if self.inner.is_some() {
            // sqlx rolls the transaction back in its own Drop
            warn!("migration transaction dropped without commit or rollback, rolling back");
        }
    }
}
