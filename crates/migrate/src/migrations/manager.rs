//! Migration Manager - creates new migration files

use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{MigrateError, MigrateResult};

/// Skeleton written into every new migration file
pub const MIGRATION_TEMPLATE: &str = "-- migrate:up\n\n\n-- migrate:down\n\n";

/// Migration manager for creating migration files
pub struct MigrationManager {
    migrations_dir: PathBuf,
}

impl MigrationManager {
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
        }
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Write a new, empty migration named `<UTC timestamp>_<name>.sql`
    ///
    /// The directory is created when missing. Never overwrites.
    pub fn create_migration(&self, name: &str) -> MigrateResult<PathBuf> {
        if name.trim().is_empty() {
            return Err(MigrateError::configuration(
                "please specify a name for the new migration",
            ));
        }

        fs::create_dir_all(&self.migrations_dir)
            .map_err(|e| MigrateError::file_system(&self.migrations_dir, e))?;

        let timestamp = Utc::now().format("%Y%m%d%H%M%S");
        let path = self.migrations_dir.join(format!("{}_{}.sql", timestamp, name));

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    MigrateError::configuration(format!("file already exists: {}", path.display()))
                } else {
                    MigrateError::file_system(&path, e)
                }
            })?;
        file.write_all(MIGRATION_TEMPLATE.as_bytes())
            .map_err(|e| MigrateError::file_system(&path, e))?;

        tracing::info!("Creating migration: {}", path.display());
        Ok(path)
    }
}
