use mimalloc::MiMalloc;
use tracing::{error, info};

use video_qc::api::ApiServer;
use video_qc::config::AppConfig;
use video_qc::database;
use video_qc::logging;
use video_qc::services::ServiceContainer;
use video_qc::utils::http_client::install_rustls_provider;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env_or_default();
    let (logging_config, _log_guard) = logging::init_logging(&config.log_dir)?;
    config.validate()?;

    install_rustls_provider();

    // Initialize database
    let pool_size = config
        .database
        .max_connections
        .unwrap_or_else(database::default_pool_size);
    let pool = database::init_pool_with_size(&config.database.url, pool_size).await?;
    database::run_migrations(&pool).await?;

    let container = ServiceContainer::new(pool, &config);
    // The API keeps serving even when the consumer cannot subscribe.
    if let Err(e) = container.initialize().await {
        error!("Failed to start QC request consumer: {}", e);
    }

    let cancel_token = container.cancellation_token();
    logging_config.start_retention_cleanup(cancel_token.child_token());

    let server = ApiServer::new(
        config.server.clone(),
        container.app_state(),
        cancel_token.child_token(),
    );

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        shutdown_token.cancel();
    });

    info!(version = env!("CARGO_PKG_VERSION"), "video-qc initialized successfully");

    let result = server.run().await;
    container.shutdown().await?;
    result?;

    Ok(())
}
