//! Migration configuration
//!
//! A [`MigrateConfig`] is built once per invocation, either programmatically
//! or from environment variables, and handed to the [`Migrator`](crate::Migrator).

use percent_encoding::percent_decode_str;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::{MigrateError, MigrateResult};

/// Directory searched for migration files when none is configured
pub const DEFAULT_MIGRATIONS_DIR: &str = "./db/migrations";

/// Project name recorded in the ledger when none is configured
pub const DEFAULT_PROJECT: &str = "default";

/// Seconds to wait for the migration lock when none is configured
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 60;

/// Environment variable holding the database URL by default
pub const DEFAULT_DATABASE_URL_VAR: &str = "DATABASE_URL";

pub const MIGRATIONS_DIR_VAR: &str = "DBSHIFT_MIGRATIONS_DIR";
pub const PROJECT_VAR: &str = "DBSHIFT_PROJECT";
pub const LOCK_TIMEOUT_VAR: &str = "DBSHIFT_LOCK_TIMEOUT";

/// Configuration for one migration run
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    /// Connection target; its scheme selects the backend
    pub database_url: Url,
    /// Directory where migration files are stored
    pub migrations_dir: PathBuf,
    /// Ledger namespace for this run
    pub project: String,
    /// How long `migrate` waits for the migration lock
    pub lock_timeout: Duration,
}

impl MigrateConfig {
    /// Create a configuration with default directory, project and timeout
    pub fn new(database_url: Url) -> Self {
        Self {
            database_url,
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            project: DEFAULT_PROJECT.to_string(),
            lock_timeout: Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS),
        }
    }

    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Load configuration from `DATABASE_URL` and the `DBSHIFT_*` variables
    pub fn from_env() -> MigrateResult<Self> {
        Self::from_env_var(DEFAULT_DATABASE_URL_VAR)
    }

    /// Load configuration, reading the database URL from `url_var`
    pub fn from_env_var(url_var: &str) -> MigrateResult<Self> {
        let raw_url = env::var(url_var).map_err(|_| {
            MigrateError::configuration(format!("environment variable `{}` is not set", url_var))
        })?;
        let mut config = Self::new(parse_database_url(&raw_url)?);

        if let Ok(dir) = env::var(MIGRATIONS_DIR_VAR) {
            config.migrations_dir = PathBuf::from(dir);
        }
        if let Ok(project) = env::var(PROJECT_VAR) {
            config.project = project;
        }
        if let Ok(timeout) = env::var(LOCK_TIMEOUT_VAR) {
            let secs = timeout.parse::<u64>().map_err(|_| {
                MigrateError::configuration(format!(
                    "invalid value for {}: `{}` (expected whole seconds)",
                    LOCK_TIMEOUT_VAR, timeout
                ))
            })?;
            config.lock_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> MigrateResult<()> {
        if self.project.trim().is_empty() {
            return Err(MigrateError::configuration("project name must not be empty"));
        }
        if self.lock_timeout.is_zero() {
            return Err(MigrateError::configuration("lock timeout must be at least one second"));
        }
        if database_name(&self.database_url)?.is_empty() {
            return Err(MigrateError::configuration(format!(
                "database URL `{}` does not name a database",
                redacted(&self.database_url)
            )));
        }
        Ok(())
    }
}

/// Parse a URL-shaped connection string
pub fn parse_database_url(raw: &str) -> MigrateResult<Url> {
    if raw.trim().is_empty() {
        return Err(MigrateError::configuration("database URL must not be empty"));
    }
    Url::parse(raw).map_err(|e| MigrateError::configuration(format!("invalid database URL: {}", e)))
}

/// URL path with percent escapes decoded
pub fn decoded_path(url: &Url) -> MigrateResult<String> {
    percent_decode_str(url.path())
        .decode_utf8()
        .map(|path| path.into_owned())
        .map_err(|e| {
            MigrateError::configuration(format!(
                "database URL `{}` has an invalid path: {}",
                redacted(url),
                e
            ))
        })
}

/// Database name carried in the URL path (leading slash stripped)
pub fn database_name(url: &Url) -> MigrateResult<String> {
    Ok(decoded_path(url)?.trim_start_matches('/').to_string())
}

/// Render a URL with its password masked, for logs and error messages
pub fn redacted(url: &Url) -> String {
    let mut masked = url.clone();
    if masked.password().is_some() {
        let _ = masked.set_password(Some("****"));
    }
    masked.to_string()
}
