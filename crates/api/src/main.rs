use std::sync::Arc;

use anyhow::Context;

use riskwatch_api::app::{AppServices, build_app};
use riskwatch_infra::{RiskwatchConfig, RiskwatchServices};

// Services are built and dropped outside the async runtime: the source and
// webhook clients are blocking clients with their own internal runtime.
fn main() -> anyhow::Result<()> {
    riskwatch_observability::init();

    let config = RiskwatchConfig::load().context("invalid configuration")?;
    tracing::info!(
        suppliers = config.suppliers.len(),
        poll_interval_secs = config.poll_interval_secs,
        webhook = config.webhook_url.is_some(),
        "configuration loaded"
    );

    let services = RiskwatchServices::build(&config).context("failed to build services")?;
    let services = Arc::new(AppServices::start(services).context("failed to start background workers")?);
    let app = build_app(services.clone());

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(&config.bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", config.bind_addr))?;
        tracing::info!(addr = %listener.local_addr()?, "listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutdown requested");
            })
            .await
            .context("server error")
    })?;
    drop(runtime);

    services.shutdown();
    Ok(())
}
