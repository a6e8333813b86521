use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::domain::error::{AppError, Result};
use crate::infrastructure::bootstrap::build_state;
use crate::infrastructure::config::AppConfig;
use crate::interfaces::http::{add_log, start_server, LogEntry};

/// Load configuration, start logging and serve the HTTP API until shutdown.
///
/// `AUDITDASH_CONFIG` points at an alternative configuration file.
pub fn run() -> Result<()> {
    let config_path = std::env::var_os("AUDITDASH_CONFIG").map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config))
}

async fn serve(config: AppConfig) -> Result<()> {
    let logs: Arc<Mutex<Vec<LogEntry>>> = Arc::new(Mutex::new(Vec::new()));
    let state = build_state(&config, &logs).await?;

    let server = start_server(
        state,
        logs.clone(),
        &config.server.host,
        config.server.port,
    )
    .map_err(|err| {
        error!(
            error = %err,
            host = %config.server.host,
            port = config.server.port,
            "Failed to bind HTTP server"
        );
        AppError::IoError(format!("Failed to start HTTP server: {}", err))
    })?;

    add_log(
        &logs,
        "INFO",
        "System",
        &format!(
            "Backend initialized and HTTP server started on {}:{}",
            config.server.host, config.server.port
        ),
    );
    info!(host = %config.server.host, port = config.server.port, "HTTP server started");

    server.await?;
    Ok(())
}
