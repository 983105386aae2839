use anyhow::Result;

use crate::GlobalArgs;

/// List every migration file with its applied state
pub async fn run(global: &GlobalArgs, json: bool) -> Result<()> {
    let statuses = super::migrator(global)?.status().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    for status in &statuses {
        let mark = if status.applied { "X" } else { " " };
        println!("[{}] {}", mark, status.filename);
    }

    let applied = statuses.iter().filter(|s| s.applied).count();
    println!();
    println!("Applied: {}", applied);
    println!("Pending: {}", statuses.len() - applied);
    Ok(())
}
