//! Migration Definitions - Core types shared across the migration system

use serde::Serialize;
use std::path::PathBuf;

/// A migration file discovered on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFile {
    /// Leading digits of the filename, used as the ledger key
    pub version: String,
    pub filename: String,
    #[serde(skip)]
    pub path: PathBuf,
}

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    /// Apply the migration (run UP statements)
    Up,
    /// Rollback the migration (run DOWN statements)
    Down,
}

impl MigrationDirection {
    /// Direction name as written after `-- migrate:` in a file
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationDirection::Up => "up",
            MigrationDirection::Down => "down",
        }
    }
}

impl std::fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a migration file has been applied for the configured project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub version: String,
    pub filename: String,
    pub applied: bool,
}

/// Result of running migrations
#[derive(Debug, Default, Serialize)]
pub struct MigrationRunResult {
    /// Filenames of migrations that were applied, in order
    pub applied_migrations: Vec<String>,
    /// Number of migrations that were skipped (already applied)
    pub skipped_count: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    pub fn applied_count(&self) -> usize {
        self.applied_migrations.len()
    }
}

/// Result of rolling back a migration
#[derive(Debug, Serialize)]
pub struct RollbackResult {
    pub version: String,
    pub filename: String,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}
