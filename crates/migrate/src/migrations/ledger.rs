//! Migration ledger
//!
//! The `schema_migrations` table records which versions have been applied,
//! one row per version per project. A [`Ledger`] binds a backend, a pool and
//! a project so the engine never has to thread the project name around.

use std::collections::HashSet;

use crate::backends::{Backend, DatabasePool};
use crate::error::MigrateResult;
use crate::transaction::MigrationTransaction;

pub struct Ledger<'a> {
    backend: &'a dyn Backend,
    pool: &'a DatabasePool,
    project: &'a str,
}

impl<'a> Ledger<'a> {
    pub fn new(backend: &'a dyn Backend, pool: &'a DatabasePool, project: &'a str) -> Self {
        Self {
            backend,
            pool,
            project,
        }
    }

    pub fn project(&self) -> &str {
        self.project
    }

    /// Create or upgrade the ledger table
    pub async fn ensure(&self) -> MigrateResult<()> {
        self.backend.ensure_migrations_table(self.pool).await
    }

    /// Every applied version for this project
    pub async fn applied(&self) -> MigrateResult<HashSet<String>> {
        let versions = self.backend.read_ledger(self.pool, None, self.project).await?;
        Ok(versions.into_iter().collect())
    }

    /// Most recently applied version, if any
    pub async fn latest(&self) -> MigrateResult<Option<String>> {
        let mut versions = self
            .backend
            .read_ledger(self.pool, Some(1), self.project)
            .await?;
        Ok(versions.pop())
    }

    pub async fn record_apply(
        &self,
        tx: &mut MigrationTransaction,
        version: &str,
    ) -> MigrateResult<()> {
        self.backend
            .record_apply(tx.connection()?, version, self.project)
            .await
    }

    pub async fn record_revert(
        &self,
        tx: &mut MigrationTransaction,
        version: &str,
    ) -> MigrateResult<()> {
        self.backend
            .record_revert(tx.connection()?, version, self.project)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SqliteBackend;
    use tempfile::TempDir;
    use url::Url;

    #[tokio::test]
    async fn test_latest_and_applied() {
        let dir = TempDir::new().unwrap();
        let url = Url::parse(&format!("sqlite:///{}", dir.path().join("l.sqlite3").display())).unwrap();
        let backend = SqliteBackend::new();
        let pool = backend.open(&url).await.unwrap();

        let ledger = Ledger::new(&backend, &pool, "default");
        ledger.ensure().await.unwrap();
        assert_eq!(ledger.latest().await.unwrap(), None);

        let mut tx = MigrationTransaction::begin(&pool).await.unwrap();
        ledger.record_apply(&mut tx, "20200101000000").await.unwrap();
        ledger.record_apply(&mut tx, "20200102000000").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(ledger.latest().await.unwrap().as_deref(), Some("20200102000000"));
        let applied = ledger.applied().await.unwrap();
        assert_eq!(applied.len(), 2);
        assert!(applied.contains("20200101000000"));

        let other = Ledger::new(&backend, &pool, "other");
        assert_eq!(other.latest().await.unwrap(), None);

        let mut tx = MigrationTransaction::begin(&pool).await.unwrap();
        ledger.record_revert(&mut tx, "20200102000000").await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(ledger.latest().await.unwrap().as_deref(), Some("20200101000000"));

        pool.close().await;
    }
}
