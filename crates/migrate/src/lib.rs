//! # dbshift-migrate: versioned SQL migrations
//!
//! Applies plain `.sql` migration files to PostgreSQL, MySQL or SQLite and
//! records what ran in a `schema_migrations` ledger, namespaced by project.
//!
//! ```no_run
//! use dbshift_migrate::{MigrateConfig, Migrator};
//!
//! # async fn run() -> dbshift_migrate::MigrateResult<()> {
//! let config = MigrateConfig::from_env()?;
//! let result = Migrator::new(config)?.up().await?;
//! println!("applied {} migrations", result.applied_count());
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod lock;
pub mod migrations;
pub mod transaction;

pub use backends::{backend_for, Backend, BackendKind, DatabasePool, DatabaseTransaction, LockToken};
pub use config::MigrateConfig;
pub use error::{MigrateError, MigrateResult};
pub use lock::with_lock;
pub use migrations::{
    MigrationFile, MigrationManager, MigrationRunResult, MigrationStatus, Migrator, RollbackResult,
};
pub use transaction::MigrationTransaction;
