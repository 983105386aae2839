use anyhow::Result;
use dbshift_migrate::MigrationRunResult;

use crate::GlobalArgs;

/// Create the database if needed, then apply pending migrations
pub async fn up(global: &GlobalArgs) -> Result<()> {
    let result = super::migrator(global)?.up().await?;
    report(&result);
    Ok(())
}

pub async fn run(global: &GlobalArgs) -> Result<()> {
    let result = super::migrator(global)?.migrate().await?;
    report(&result);
    Ok(())
}

/// Revert the most recently applied migration
pub async fn rollback(global: &GlobalArgs) -> Result<()> {
    let result = super::migrator(global)?.rollback().await?;
    println!(
        "Rolled back: {} ({} ms)",
        result.filename, result.execution_time_ms
    );
    Ok(())
}

fn report(result: &MigrationRunResult) {
    for filename in &result.applied_migrations {
        println!("Applied: {}", filename);
    }
    println!(
        "{} applied, {} already up to date ({} ms)",
        result.applied_count(),
        result.skipped_count,
        result.execution_time_ms
    );
}
