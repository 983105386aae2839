use anyhow::Result;
use dbshift_migrate::MigrationManager;

use crate::GlobalArgs;

/// Write an empty migration file into the migrations directory
pub fn run(global: &GlobalArgs, name: Option<&str>) -> Result<()> {
    let manager = MigrationManager::new(&global.migrations_dir);
    let path = manager.create_migration(name.unwrap_or(""))?;
    println!("Created migration: {}", path.display());
    Ok(())
}
