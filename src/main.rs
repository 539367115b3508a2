//! Clinic server binary.

use clinic::middleware::LoggingMiddleware;
use clinic::observability::init_tracing;
use clinic::{api, AppConfig, AppContext, ClinicServer};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging);

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "configuration validation failed");
        return Err(e.into());
    }

    let addr: SocketAddr = config.server_addr().parse()?;
    tracing::info!(
        environment = ?config.environment,
        database = %config.database.url,
        cache = ?config.cache.backend,
        "starting clinic server"
    );

    let ctx = Arc::new(AppContext::build(config).await?);
    let router = api::routes(&ctx);

    ClinicServer::new(router, ctx)
        .with_middleware(Box::new(LoggingMiddleware))
        .run(addr, async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
            }
        })
        .await?;

    Ok(())
}
