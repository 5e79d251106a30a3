use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use subscription_service::api::{self, ApiState, SERVICE_NAME};
use subscription_service::config::SubscriptionConfig;
use subscription_service::storage::SqliteGatewayFactory;

const BUILD_HASH: &str = match option_env!("BUILD_HASH") {
    Some(hash) => hash,
    None => "none",
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = SubscriptionConfig::from_env()?;
    init_tracing(&config.log_level)?;

    info!(
        service = SERVICE_NAME,
        version = env!("CARGO_PKG_VERSION"),
        hash = BUILD_HASH,
        "starting subscription service"
    );
    info!(
        listen = %config.listen_addr(),
        data_dir = %config.data_dir.display(),
        database = %config.database,
        collection = %config.collection,
        minimum_agents = config.minimum_agents,
        minimum_grandfathered_agents = config.minimum_grandfathered_agents,
        development = config.development,
        "subscription service configured"
    );

    let addr: SocketAddr = config
        .listen_addr()
        .parse()
        .with_context(|| format!("invalid listen address {}", config.listen_addr()))?;
    let state = Arc::new(ApiState::new(Arc::new(SqliteGatewayFactory), config));
    let router = api::create_router(Arc::clone(&state));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("unable to bind {addr}"))?;
    info!(%addr, "http listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("subscription service shutting down");
    Ok(())
}

fn init_tracing(fallback_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_level));
    fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow::anyhow!("unable to initialize tracing: {err}"))?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
