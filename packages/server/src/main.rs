//! Render queue process.
//!
//! Boots the engine from the environment and keeps it running until Ctrl-C.
//! Transport adapters attach to the engine and its notifier.

use engine::{EngineConfig, start};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "render_queue=info,engine=info,db=info,notifier=info,storage=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env()?;
    let runtime = start(config).await?;

    let engine = runtime.engine();
    let stats = engine.get_stats().await?;
    tracing::info!("Queue holds {} jobs", stats.total());
    for (status, count) in stats.iter() {
        tracing::info!("  {}: {}", status, count);
    }

    let health = engine.health().await;
    tracing::info!("Health: {} (database {})", health.status, health.database);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl-C");

    runtime.shutdown().await;
    Ok(())
}
