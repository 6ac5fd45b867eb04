use std::error::Error;
use std::sync::Arc;

use dotenv::dotenv;
use tracing::info;

use request_logger::config::AppConfig;
use request_logger::logging::{self, AppEnv, RequestLogger, TracingLogger};
use request_logger::router::router::create_router;
use request_logger::router::store::OrderStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    let config = AppConfig::from_env()?;
    logging::init_logging(config.log_format);

    info!(
        "Request logging at {} (time limit: {:?}, catch errors: {})",
        config.request_logger.level,
        config.request_logger.time_limit,
        config.request_logger.catch_errors
    );

    let request_logger = RequestLogger::new(TracingLogger::new(), config.request_logger.clone());
    let app = create_router(Arc::new(OrderStore::new()), request_logger, AppEnv::new(config.env.clone()));

    info!("Server starting on port {}", config.port);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
