pub mod database;
pub mod migrate;
pub mod new;
pub mod status;

use anyhow::{anyhow, Result};
use dbshift_migrate::config::parse_database_url;
use dbshift_migrate::{MigrateConfig, Migrator};
use std::time::Duration;

use crate::GlobalArgs;

/// Resolve the database URL: `--url` first, then the variable named by `--env`
pub fn database_url(global: &GlobalArgs) -> Result<String> {
    if let Some(url) = global.url.as_deref().filter(|u| !u.trim().is_empty()) {
        return Ok(url.to_string());
    }
    std::env::var(&global.env_var)
        .ok()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| {
            anyhow!(
                "no database URL: set `{}` or pass --url",
                global.env_var
            )
        })
}

/// Build the engine configuration from global flags
pub fn migrate_config(global: &GlobalArgs) -> Result<MigrateConfig> {
    let url = parse_database_url(&database_url(global)?)?;
    Ok(MigrateConfig::new(url)
        .with_migrations_dir(&global.migrations_dir)
        .with_project(global.project.clone())
        .with_lock_timeout(Duration::from_secs(global.lock_timeout)))
}

pub fn migrator(global: &GlobalArgs) -> Result<Migrator> {
    Ok(Migrator::new(migrate_config(global)?)?)
}
