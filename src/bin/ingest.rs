use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gamekeys_api::{
    catalog::{self, sources::{GamevaultSource, KeyhubSource}},
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    pricing::RateTable,
};

/// Catalog ingestion entry point, meant to run on a schedule (cron or a
/// systemd timer). Fetches both marketplace feeds and replaces the sales
/// snapshot in one transaction.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gamekeys_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let rates = RateTable::with_defaults();
    let keyhub = KeyhubSource::new(&config.keyhub_url)?;
    let gamevault = GamevaultSource::new(&config.gamevault_url)?;

    let outcome = catalog::run_ingestion(&orm, &rates, &keyhub, &gamevault)
        .await
        .map_err(|e| anyhow::anyhow!("ingestion failed: {e}"))?;

    tracing::info!(
        items = outcome.items,
        skipped = outcome.skipped,
        "catalog snapshot replaced"
    );
    Ok(())
}
