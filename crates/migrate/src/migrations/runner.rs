//! Migration Runner - Executes migrations against the database
//!
//! [`Migrator`] sequences the file store, the ledger, the lock and the
//! backend for one configured target database.

use std::time::Instant;
use tracing::{debug, info, warn};

use super::definitions::{MigrationFile, MigrationRunResult, MigrationStatus};
use super::ledger::Ledger;
use super::parser::parse_file;
use super::store::discover;
use crate::backends::{backend_for, Backend, DatabasePool};
use crate::config::{redacted, MigrateConfig};
use crate::error::{MigrateError, MigrateResult};
use crate::lock::with_lock;
use crate::transaction::MigrationTransaction;

/// Migration engine bound to one database and one project
pub struct Migrator {
    config: MigrateConfig,
    backend: Box<dyn Backend>,
}

impl Migrator {
    /// Create a migrator, picking the backend from the URL scheme
    pub fn new(config: MigrateConfig) -> MigrateResult<Self> {
        config.validate()?;
        let backend = backend_for(&config.database_url)?;
        Ok(Self { config, backend })
    }

    /// Create a migrator around an explicit backend
    pub fn with_backend(config: MigrateConfig, backend: Box<dyn Backend>) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &MigrateConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub async fn create_database(&self) -> MigrateResult<()> {
        self.backend.create_database(&self.config.database_url).await
    }

    pub async fn drop_database(&self) -> MigrateResult<()> {
        self.backend.drop_database(&self.config.database_url).await
    }

    /// Create the database unless it is known to exist
    ///
    /// A failed existence check (for instance, no privilege to list
    /// databases) is logged and creation is skipped.
    pub async fn ensure_database(&self) -> MigrateResult<()> {
        match self.backend.database_exists(&self.config.database_url).await {
            Ok(true) => {
                debug!("database already exists");
                Ok(())
            }
            Ok(false) => self.create_database().await,
            Err(e) => {
                warn!(error = %e, "could not check whether the database exists, skipping create");
                Ok(())
            }
        }
    }

    /// Create the database if needed, then apply pending migrations
    pub async fn up(&self) -> MigrateResult<MigrationRunResult> {
        self.ensure_database().await?;
        self.migrate().await
    }

    /// Apply every pending migration, in version order, under the lock
    pub async fn migrate(&self) -> MigrateResult<MigrationRunResult> {
        let started = Instant::now();

        let files = discover(&self.config.migrations_dir)?;
        if files.is_empty() {
            return Err(MigrateError::NoMigrationsFound {
                dir: self.config.migrations_dir.clone(),
            });
        }

        let pool = self.open().await?;
        let outcome = self.migrate_with_pool(&pool, &files).await;
        pool.close().await;

        let mut result = outcome?;
        result.execution_time_ms = started.elapsed().as_millis();
        Ok(result)
    }

    async fn migrate_with_pool(
        &self,
        pool: &DatabasePool,
        files: &[MigrationFile],
    ) -> MigrateResult<MigrationRunResult> {
        let ledger = Ledger::new(self.backend.as_ref(), pool, &self.config.project);
        ledger.ensure().await?;

        with_lock(self.backend.as_ref(), pool, self.config.lock_timeout, || {
            self.apply_pending(&ledger, pool, files)
        })
        .await
    }

    async fn apply_pending(
        &self,
        ledger: &Ledger<'_>,
        pool: &DatabasePool,
        files: &[MigrationFile],
    ) -> MigrateResult<MigrationRunResult> {
        let applied = ledger.applied().await?;
        let mut result = MigrationRunResult::default();

        for file in files {
            if applied.contains(&file.version) {
                debug!(version = %file.version, "already applied, skipping");
                result.skipped_count += 1;
                continue;
            }

            self.apply(ledger, pool, file).await?;
            result.applied_migrations.push(file.filename.clone());
        }

        if result.applied_migrations.is_empty() {
            info!(project = %ledger.project(), "database is up to date");
        }
        Ok(result)
    }

    /// Run one "up" body and record it, atomically
    async fn apply(
        &self,
        ledger: &Ledger<'_>,
        pool: &DatabasePool,
        file: &MigrationFile,
    ) -> MigrateResult<()> {
        info!("Applying: {}", file.filename);
        let migration = parse_file(&file.path)?;

        let mut tx = MigrationTransaction::begin(pool).await?;
        let outcome = match tx.execute(migration.up()).await {
            Ok(()) => ledger.record_apply(&mut tx, &file.version).await,
            Err(e) => Err(e),
        };
        tx.finish(outcome).await
    }

    /// Applied or pending state of every migration file
    pub async fn status(&self) -> MigrateResult<Vec<MigrationStatus>> {
        let files = discover(&self.config.migrations_dir)?;

        let pool = self.open().await?;
        let ledger = Ledger::new(self.backend.as_ref(), &pool, &self.config.project);
        let applied = match ledger.ensure().await {
            Ok(()) => ledger.applied().await,
            Err(e) => Err(e),
        };
        pool.close().await;
        let applied = applied?;

        Ok(files
            .into_iter()
            .map(|file| MigrationStatus {
                applied: applied.contains(&file.version),
                version: file.version,
                filename: file.filename,
            })
            .collect())
    }

    /// Open a pool on the target database
    pub(crate) async fn open(&self) -> MigrateResult<DatabasePool> {
        debug!(
            backend = %self.backend.kind(),
            url = %redacted(&self.config.database_url),
            "connecting"
        );
        self.backend.open(&self.config.database_url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{BackendKind, DatabaseTransaction, LockToken, SqlDialect, SqliteBackend};
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;
    use url::Url;

    /// SQLite backend that cannot tell whether the database exists
    struct UncheckableSqlite {
        inner: SqliteBackend,
        creates: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Backend for UncheckableSqlite {
        fn kind(&self) -> BackendKind {
            self.inner.kind()
        }

        fn dialect(&self) -> SqlDialect {
            self.inner.dialect()
        }

        async fn open(&self, target: &Url) -> MigrateResult<DatabasePool> {
            self.inner.open(target).await
        }

        async fn database_exists(&self, _target: &Url) -> MigrateResult<bool> {
            Err(MigrateError::sql(
                "checking database existence",
                sqlx::Error::Protocol("permission denied".to_string()),
            ))
        }

        async fn create_database(&self, target: &Url) -> MigrateResult<()> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.inner.create_database(target).await
        }

        async fn drop_database(&self, target: &Url) -> MigrateResult<()> {
            self.inner.drop_database(target).await
        }

        async fn read_ledger(
            &self,
            pool: &DatabasePool,
            limit: Option<usize>,
            project: &str,
        ) -> MigrateResult<Vec<String>> {
            self.inner.read_ledger(pool, limit, project).await
        }

        async fn record_apply(
            &self,
            tx: &mut DatabaseTransaction,
            version: &str,
            project: &str,
        ) -> MigrateResult<()> {
            self.inner.record_apply(tx, version, project).await
        }

        async fn record_revert(
            &self,
            tx: &mut DatabaseTransaction,
            version: &str,
            project: &str,
        ) -> MigrateResult<()> {
            self.inner.record_revert(tx, version, project).await
        }

        async fn acquire_lock(&self, pool: &DatabasePool) -> MigrateResult<LockToken> {
            self.inner.acquire_lock(pool).await
        }

        async fn release_lock(&self, token: LockToken) -> MigrateResult<()> {
            self.inner.release_lock(token).await
        }
    }

    fn sqlite_config(dir: &TempDir) -> MigrateConfig {
        let url = Url::parse(&format!("sqlite:///{}", dir.path().join("test.sqlite3").display())).unwrap();
        MigrateConfig::new(url).with_migrations_dir(dir.path().join("migrations"))
    }

    #[test]
    fn test_new_selects_backend() {
        let dir = TempDir::new().unwrap();
        let migrator = Migrator::new(sqlite_config(&dir)).unwrap();
        assert_eq!(migrator.backend().kind(), BackendKind::SQLite);
    }

    #[test]
    fn test_new_rejects_unknown_scheme() {
        let config = MigrateConfig::new(Url::parse("oracle://localhost/app").unwrap());
        let err = Migrator::new(config).err().unwrap();
        assert_eq!(err.to_string(), "unknown driver: oracle");
    }

    #[tokio::test]
    async fn test_up_proceeds_when_existence_check_fails() {
        let dir = TempDir::new().unwrap();
        let config = sqlite_config(&dir);
        fs::create_dir_all(&config.migrations_dir).unwrap();
        fs::write(
            config.migrations_dir.join("001_one.sql"),
            "-- migrate:up\ncreate table one (id integer);\n-- migrate:down\ndrop table one;\n",
        )
        .unwrap();

        let creates = Arc::new(AtomicUsize::new(0));
        let backend = UncheckableSqlite {
            inner: SqliteBackend::new(),
            creates: creates.clone(),
        };
        let migrator = Migrator::with_backend(config, Box::new(backend));

        let result = migrator.up().await.unwrap();
        assert_eq!(result.applied_migrations, vec!["001_one.sql"]);
        assert_eq!(creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_migrate_without_files() {
        let dir = TempDir::new().unwrap();
        let config = sqlite_config(&dir);
        fs::create_dir_all(&config.migrations_dir).unwrap();

        let err = Migrator::new(config).unwrap().migrate().await.unwrap_err();
        assert!(matches!(err, MigrateError::NoMigrationsFound { .. }));
    }

    #[tokio::test]
    async fn test_status_reports_pending_and_applied() {
        let dir = TempDir::new().unwrap();
        let config = sqlite_config(&dir);
        fs::create_dir_all(&config.migrations_dir).unwrap();
        fs::write(
            config.migrations_dir.join("001_one.sql"),
            "-- migrate:up\ncreate table one (id integer);\n-- migrate:down\ndrop table one;\n",
        )
        .unwrap();

        let migrator = Migrator::new(config.clone()).unwrap();
        migrator.migrate().await.unwrap();

        fs::write(
            config.migrations_dir.join("002_two.sql"),
            "-- migrate:up\ncreate table two (id integer);\n",
        )
        .unwrap();

        let status = migrator.status().await.unwrap();
        assert_eq!(status.len(), 2);
        assert!(status[0].applied);
        assert_eq!(status[0].filename, "001_one.sql");
        assert!(!status[1].applied);
        assert_eq!(status[1].version, "002");
    }
}
