use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::DatabaseManager;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::main_pool().await?;
    DatabaseManager::migrate(&pool).await?;
    output_success(output_format, "Migrations applied", &json!({ "migrated": true }))
}
