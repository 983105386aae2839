//! Migration file store
//!
//! Finds migration files in a directory. A migration file is any regular
//! entry whose name starts with a digit and ends in `.sql`; its version is
//! the run of leading digits.

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use super::definitions::MigrationFile;
use crate::error::{MigrateError, MigrateResult};

fn migration_file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9].*\.sql$").expect("valid migration file pattern"))
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]+").expect("valid version pattern"))
}

/// Leading digits of a migration filename
pub fn migration_version(filename: &str) -> String {
    version_pattern()
        .find(filename)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// List every migration file in `dir`, ordered by version
///
/// Files sharing a version are ordered by filename.
pub fn discover(dir: &Path) -> MigrateResult<Vec<MigrationFile>> {
    let mut files = scan(dir, migration_file_pattern())?;
    files.sort_by(|a, b| {
        a.version
            .cmp(&b.version)
            .then_with(|| a.filename.cmp(&b.filename))
    });
    Ok(files)
}

/// Find the migration file for a version read from the ledger
///
/// Any file whose name starts with `version` and ends in `.sql` matches;
/// when several do, the lexically first filename wins.
pub fn locate(dir: &Path, version: &str) -> MigrateResult<MigrationFile> {
    if version.is_empty() {
        return Err(MigrateError::configuration("migration version is required"));
    }

    let pattern = Regex::new(&format!(r"^{}.*\.sql$", regex::escape(version)))
        .map_err(|e| MigrateError::configuration(format!("invalid version `{}`: {}", version, e)))?;

    scan(dir, &pattern)?
        .into_iter()
        .min_by(|a, b| a.filename.cmp(&b.filename))
        .ok_or_else(|| {
            MigrateError::not_found(format!(
                "can't find migration file: {}*.sql in `{}`",
                version,
                dir.display()
            ))
        })
}

fn scan(dir: &Path, pattern: &Regex) -> MigrateResult<Vec<MigrationFile>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MigrateError::not_found(format!(
                "could not find migrations directory `{}`",
                dir.display()
            ))
        } else {
            MigrateError::file_system(dir, e)
        }
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| MigrateError::file_system(dir, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| MigrateError::file_system(entry.path(), e))?;
        if file_type.is_dir() {
            continue;
        }

        // Names that are not valid UTF-8 cannot match the pattern anyway
        let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !pattern.is_match(&filename) {
            continue;
        }

        files.push(MigrationFile {
            version: migration_version(&filename),
            path: entry.path(),
            filename,
        });
    }
    Ok(files)
}
