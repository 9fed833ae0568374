use anyhow::Context;
use db::DBService;
use server::{DeploymentImpl, app, config::ServerConfig};
use services::services::database_validator::DatabaseValidator;
use tracing::{info, warn};
use utils::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    let _logging = logging::init(
        config.default_log_level(),
        config.log_format,
        config.sentry_dsn.as_deref(),
        &config.env.to_string(),
    );
    info!(
        env = %config.env,
        anchor = %config.elevation.anchor,
        unit_px = config.elevation.unit_px,
        "Starting DCIM inventory server"
    );

    let db = DBService::new(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    let validation = DatabaseValidator::new(db.pool.clone()).validate().await?;
    if validation.is_ok() {
        info!("{}", validation.summary());
    } else {
        warn!("{}", validation.summary());
    }

    let addr = (config.host.clone(), config.port);
    let deployment = DeploymentImpl::new(db, config);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %listener.local_addr()?, "Server listening");

    axum::serve(listener, app(&deployment))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
