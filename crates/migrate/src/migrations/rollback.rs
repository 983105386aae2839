//! Migration Rollback - reverts the most recently applied migration

use std::time::Instant;
use tracing::info;

use super::definitions::RollbackResult;
use super::ledger::Ledger;
use super::parser::parse_file;
use super::runner::Migrator;
use super::store::locate;
use crate::backends::DatabasePool;
use crate::error::{MigrateError, MigrateResult};
use crate::transaction::MigrationTransaction;

impl Migrator {
    /// Revert the latest applied migration for the configured project
    ///
    /// Runs without the migration lock.
    pub async fn rollback(&self) -> MigrateResult<RollbackResult> {
        let started = Instant::now();

        let pool = self.open().await?;
        let outcome = self.rollback_with_pool(&pool).await;
        pool.close().await;

        let (version, filename) = outcome?;
        Ok(RollbackResult {
            version,
            filename,
            execution_time_ms: started.elapsed().as_millis(),
        })
    }

    async fn rollback_with_pool(&self, pool: &DatabasePool) -> MigrateResult<(String, String)> {
        let ledger = Ledger::new(self.backend(), pool, &self.config().project);
        ledger.ensure().await?;

        let version = ledger
            .latest()
            .await?
            .ok_or(MigrateError::NothingToRollback)?;

        let file = locate(&self.config().migrations_dir, &version)?;
        info!("Rolling back: {}", file.filename);
        let migration = parse_file(&file.path)?;

        let mut tx = MigrationTransaction::begin(pool).await?;
        let outcome = match tx.execute(migration.down()).await {
            Ok(()) => ledger.record_revert(&mut tx, &version).await,
            Err(e) => Err(e),
        };
        tx.finish(outcome).await?;

        Ok((version, file.filename))
    }
}
