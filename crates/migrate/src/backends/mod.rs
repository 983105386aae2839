//! Database Backend Abstractions
//!
//! One [`Backend`] implementation per supported engine, selected from the
//! scheme of the database URL.

pub mod core;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use self::core::*;
pub use self::mysql::MySqlBackend;
pub use self::postgres::PostgresBackend;
pub use self::sqlite::SqliteBackend;

use url::Url;

use crate::error::{MigrateError, MigrateResult};

/// Database backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl BackendKind {
    /// Resolve the backend for a URL scheme
    pub fn from_scheme(scheme: &str) -> MigrateResult<Self> {
        scheme.parse()
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::PostgreSQL => write!(f, "postgresql"),
            BackendKind::MySQL => write!(f, "mysql"),
            BackendKind::SQLite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" | "postgresql" => Ok(BackendKind::PostgreSQL),
            "mysql" => Ok(BackendKind::MySQL),
            "sqlite" | "sqlite3" => Ok(BackendKind::SQLite),
            _ => Err(MigrateError::UnknownDriver {
                scheme: s.to_string(),
            }),
        }
    }
}

/// Pick the backend implementation for a database URL
pub fn backend_for(url: &Url) -> MigrateResult<Box<dyn Backend>> {
    let backend: Box<dyn Backend> = match BackendKind::from_scheme(url.scheme())? {
        BackendKind::PostgreSQL => Box::new(PostgresBackend::new()),
        BackendKind::MySQL => Box::new(MySqlBackend::new()),
        BackendKind::SQLite => Box::new(SqliteBackend::new()),
    };
    Ok(backend)
}
