use anyhow::Context as _;

use eventwire_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env()?;
    eventwire_observability::init(config.log_format);

    tracing::info!(
        bind_addr = %config.bind_addr,
        max_body_bytes = config.max_body_bytes,
        separate_server_faults = config.separate_server_faults,
        strict_aggregate_id = config.strict_aggregate_id,
        log_format = ?config.log_format,
        "configuration loaded"
    );

    let app = eventwire_api::app::build_app(&config)?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
