use anyhow::{Context, Result};

use changegate_core::config::AppConfig;
use changegate_db::{migrations, SEED_REFERENCES};

pub async fn run(config: &AppConfig) -> Result<String> {
    let pool = changegate_db::connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .with_context(|| format!("connecting to {}", config.database.url))?;
    migrations::run_pending(&pool).await.context("running migrations")?;

    let mut lines = vec![format!("database ready at {}", config.database.url)];
    lines.push("seeded change references:".to_string());
    for reference in SEED_REFERENCES {
        lines.push(format!("  {reference}"));
    }
    Ok(lines.join("\n"))
}
