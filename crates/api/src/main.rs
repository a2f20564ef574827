use std::sync::Arc;

use anyhow::Context;

use portcullis_infra::GatewayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env().context("invalid configuration")?;
    portcullis_observability::init(&config.log_level);
    tracing::info!(config = ?config, "starting");

    let services = Arc::new(portcullis_api::app::build_services(&config).await?);
    let app = portcullis_api::app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
