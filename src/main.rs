use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ontoflow::config::Config;
use ontoflow::monitoring::MonitoringTick;
use ontoflow::services::MonitoringStore;
use ontoflow::{AppState, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    init_tracing(&config)?;

    tracing::info!("Starting ontoflow");

    let pool = db::init_pool(&config.database.url).await?;
    let state = AppState::build(&config, pool);

    let monitoring = if config.monitoring.enabled {
        let tick = MonitoringTick::new(
            state.monitoring_executor.clone(),
            MonitoringStore::new(state.db.clone()),
            Duration::from_secs(config.monitoring.tick_secs),
        );
        let shutdown = tick.shutdown_handle();
        tracing::info!(
            "Monitoring sweep scheduled every {}s",
            config.monitoring.tick_secs
        );
        Some((shutdown, tokio::spawn(tick.run())))
    } else {
        tracing::info!("Monitoring executor disabled by configuration");
        None
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    if let Some((shutdown, handle)) = monitoring {
        shutdown.notify_one();
        handle.await.ok();
    }
    Ok(())
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));

    match &config.logging.file {
        Some(path) => {
            let appender = tracing_appender::rolling::daily(".", path);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(appender).with_ansi(false))
                .init();
        },
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        },
    }
    Ok(())
}
