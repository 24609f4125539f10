use std::sync::Arc;

use tokio::{net::TcpListener, signal};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use foundry_gateway::{AppConfig, FoundryClient, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();
    init_tracing(config.as_ref().map_or(LevelFilter::INFO, |c| c.log_level));
    let config = config.inspect_err(|err| tracing::error!(%err, "invalid configuration"))?;
    let config = Arc::new(config);
    tracing::info!(
        endpoint = %config.endpoint,
        deployment = %config.deployment,
        api_version = %config.api_version,
        "configuration loaded"
    );

    let backend = Arc::new(FoundryClient::new(config.as_ref())?);
    let router = build_router(config.clone(), backend);

    let listener = TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "REST server ready");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}

fn init_tracing(level: LevelFilter) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{level},hyper=warn,axum::rejection=trace").into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
