use anyhow::Result;

use crate::GlobalArgs;

pub async fn create(global: &GlobalArgs) -> Result<()> {
    super::migrator(global)?.create_database().await?;
    Ok(())
}

pub async fn drop(global: &GlobalArgs) -> Result<()> {
    super::migrator(global)?.drop_database().await?;
    Ok(())
}
