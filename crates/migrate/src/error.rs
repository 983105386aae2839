//! Error types for the migration engine
//!
//! Every fallible operation in this crate returns [`MigrateResult`]. None of
//! these errors are retried internally; the operator re-runs the command.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("{message}")]
    Configuration { message: String },

    #[error("unknown driver: {scheme}")]
    UnknownDriver { scheme: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("no migration files found in `{}`", dir.display())]
    NoMigrationsFound { dir: PathBuf },

    #[error("can't rollback: no migrations have been applied")]
    NothingToRollback,

    #[error("timeout waiting for database migration lock (waited {} seconds)", waited.as_secs())]
    LockTimeout { waited: Duration },

    #[error("{context}: {source}")]
    Sql {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("{}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MigrateError {
    /// Create a new configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Wrap a database error with a short description of what was running
    pub fn sql(context: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Sql {
            context: context.into(),
            source,
        }
    }

    /// Wrap an I/O error with the path it concerns
    pub fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Check if the error stems from bad or missing configuration
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::UnknownDriver { .. })
    }

    /// Check if the error is a lock timeout
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    /// Check if the error came from the database
    pub fn is_sql(&self) -> bool {
        matches!(self, Self::Sql { .. })
    }
}
