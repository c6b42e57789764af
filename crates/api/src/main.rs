use std::sync::Arc;

use anyhow::Context;

use notas_api::app::{AppServices, build_app};
use notas_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("invalid configuration")?;
    notas_observability::init(config.log_format);
    tracing::info!(config = ?config, "configuration loaded");

    let services = AppServices::from_config(&config).await?;
    services.bootstrap_admin(&config).await?;

    let app = build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
